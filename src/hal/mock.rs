//! In-memory port doubles for tests and scripted runs.
//!
//! Each double is a cheap handle over shared state, so a test can keep a
//! clone for inspection after handing the original to the core.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Clock, MotorPort, PulseCounter, SensorPort};
use crate::sensing::Frame;

/// Clock that only moves when told to. `sleep` advances it instantly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, secs: f64) {
        self.now.set(self.now.get() + secs.max(0.0));
    }

    pub fn set(&self, t: f64) {
        self.now.set(t);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sleep(&self, secs: f64) {
        self.advance(secs);
    }
}

#[derive(Debug, Default)]
struct Script {
    frames: VecDeque<Frame>,
    last: Option<Frame>,
    reads: usize,
}

/// Sensor that replays a queue of frames, then repeats the last one.
/// An empty script reads all-white.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    script: Rc<RefCell<Script>>,
}

impl ScriptedSensor {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        let sensor = Self::default();
        sensor.extend(frames);
        sensor
    }

    /// Append frames to the end of the script.
    pub fn extend(&self, frames: impl IntoIterator<Item = Frame>) {
        self.script.borrow_mut().frames.extend(frames);
    }

    pub fn push_repeated(&self, frame: Frame, times: usize) {
        self.extend(std::iter::repeat(frame).take(times));
    }

    /// Frames still queued.
    pub fn remaining(&self) -> usize {
        self.script.borrow().frames.len()
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.script.borrow().reads
    }
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Frame {
        let mut script = self.script.borrow_mut();
        script.reads += 1;
        match script.frames.pop_front() {
            Some(frame) => {
                script.last = Some(frame);
                frame
            }
            None => script.last.unwrap_or_else(Frame::zeros),
        }
    }
}

/// Motor that records every command it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    commands: Rc<RefCell<Vec<(f64, f64)>>>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<(f64, f64)> {
        self.commands.borrow().clone()
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.commands.borrow().last().copied()
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl MotorPort for RecordingMotor {
    fn set_speeds(&mut self, left: f64, right: f64) {
        self.commands.borrow_mut().push((left, right));
    }
}

/// Encoder whose count is bumped by hand.
#[derive(Debug, Clone, Default)]
pub struct MockEncoder {
    count: Rc<Cell<u64>>,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pulses: u64) {
        self.count.set(self.count.get() + pulses);
    }
}

impl PulseCounter for MockEncoder {
    fn count(&mut self) -> u64 {
        self.count.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_sensor_repeats_last_frame() {
        let a = Frame::from_element(1.0);
        let mut sensor = ScriptedSensor::new([Frame::zeros(), a]);
        assert_eq!(sensor.read(), Frame::zeros());
        assert_eq!(sensor.read(), a);
        assert_eq!(sensor.read(), a);
        assert_eq!(sensor.reads(), 3);
    }

    #[test]
    fn recording_motor_shares_log_between_clones() {
        let log = RecordingMotor::new();
        let mut motor = log.clone();
        motor.set_speeds(0.5, -0.5);
        motor.stop();
        assert_eq!(log.commands(), vec![(0.5, -0.5), (0.0, 0.0)]);
    }

    #[test]
    fn manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        clock.sleep(0.25);
        clock.sleep(-1.0);
        assert!((clock.now() - 0.25).abs() < 1e-12);
    }
}
