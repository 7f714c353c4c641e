//! Host-backed port implementations.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Clock, SensorPort, StopSignal};
use crate::sensing::{Frame, SENSOR_COUNT};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep(&self, secs: f64) {
        if secs > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}

// ---------------------------------------------------------------------------
// Digital reflectance array
// ---------------------------------------------------------------------------

/// Adapts an array of digital comparator outputs to a [`Frame`].
///
/// `line_high` selects the polarity: `true` when a high pin means "black".
/// Many modules pull low on black, in which case pass `false`.
pub struct DigitalArray<F> {
    read_pins: F,
    line_high: bool,
}

impl<F> DigitalArray<F>
where
    F: FnMut() -> [bool; SENSOR_COUNT],
{
    pub fn new(read_pins: F, line_high: bool) -> Self {
        Self { read_pins, line_high }
    }
}

impl<F> SensorPort for DigitalArray<F>
where
    F: FnMut() -> [bool; SENSOR_COUNT],
{
    fn read(&mut self) -> Frame {
        let pins = (self.read_pins)();
        let line_high = self.line_high;
        Frame::from_fn(|i, _| if pins[i] == line_high { 1.0 } else { 0.0 })
    }
}

// ---------------------------------------------------------------------------
// Stop signals
// ---------------------------------------------------------------------------

/// Run until the track ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn stop_requested(&mut self) -> bool {
        false
    }
}

/// Stop after a fixed run duration.
pub struct Deadline {
    clock: Rc<dyn Clock>,
    until: f64,
}

impl Deadline {
    /// Deadline `duration` seconds after the clock's current time.
    pub fn after(clock: Rc<dyn Clock>, duration: f64) -> Self {
        let until = clock.now() + duration;
        Self { clock, until }
    }
}

impl StopSignal for Deadline {
    fn stop_requested(&mut self) -> bool {
        self.clock.now() >= self.until
    }
}

/// Shared flag, typically set from a signal handler or a button task.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(pub Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl StopSignal for StopFlag {
    fn stop_requested(&mut self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stops when any of its inputs does.
#[derive(Default)]
pub struct AnyStop(pub Vec<Box<dyn StopSignal>>);

impl AnyStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, signal: Box<dyn StopSignal>) -> Self {
        self.0.push(signal);
        self
    }
}

impl StopSignal for AnyStop {
    fn stop_requested(&mut self) -> bool {
        // poll every input so deadlines and flags all see the call
        self.0.iter_mut().fold(false, |any, s| s.stop_requested() || any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ManualClock;

    #[test]
    fn digital_array_polarity() {
        let pins = [true, false, false, false, false, false, false, true];
        let mut high = DigitalArray::new(move || pins, true);
        let mut low = DigitalArray::new(move || pins, false);
        let a = high.read();
        let b = low.read();
        assert_eq!(a[0], 1.0);
        assert_eq!(a[3], 0.0);
        assert_eq!(b[0], 0.0);
        assert_eq!(b[3], 1.0);
    }

    #[test]
    fn deadline_fires_after_duration() {
        let clock = ManualClock::new();
        let mut deadline = Deadline::after(Rc::new(clock.clone()), 1.0);
        assert!(!deadline.stop_requested());
        clock.advance(0.5);
        assert!(!deadline.stop_requested());
        clock.advance(0.6);
        assert!(deadline.stop_requested());
    }

    #[test]
    fn any_stop_combines_inputs() {
        let flag = StopFlag::new();
        let mut any = AnyStop::new().with(Box::new(NeverStop)).with(Box::new(flag.clone()));
        assert!(!any.stop_requested());
        flag.request();
        assert!(any.stop_requested());
        assert!(!AnyStop::new().stop_requested());
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let mut observer = flag.clone();
        assert!(!observer.stop_requested());
        flag.request();
        assert!(observer.stop_requested());
    }
}
