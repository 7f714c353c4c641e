use std::rc::Rc;

use log::trace;

use super::encoder::RateEstimator;
use super::{clamp_fraction, Drive};
use crate::config::DriveConfig;
use crate::control::{Pid, WheelCommand};
use crate::hal::{Clock, MotorPort, PulseCounter};

// ---------------------------------------------------------------------------
// Per-wheel rate loop
// ---------------------------------------------------------------------------

struct WheelLoop {
    counter: Box<dyn PulseCounter>,
    estimator: RateEstimator,
    pid: Pid,
}

impl WheelLoop {
    /// Feed-forward `request` plus a PID correction on the rate error.
    /// Single-channel encoders cannot sense direction, so the measured rate
    /// takes the sign of the request.
    fn regulate(&mut self, request: f64, max_rpm: f64, now: f64, dt: f64) -> f64 {
        let rpm = self.estimator.update(self.counter.count(), now);
        if request == 0.0 {
            self.pid.reset();
            return 0.0;
        }
        let measured = rpm * request.signum();
        let target = request * max_rpm;
        let correction = self.pid.update(target, measured, dt);
        clamp_fraction(request + correction)
    }

    fn rpm(&self) -> f64 {
        self.estimator.rpm()
    }
}

/// Drive that regulates each wheel's measured rate toward a target
/// proportional to the requested fraction.
pub struct ClosedLoopDrive<M> {
    motor: M,
    left: WheelLoop,
    right: WheelLoop,
    clock: Rc<dyn Clock>,
    max_rpm: f64,
    max_dt: f64,
    last_update: Option<f64>,
    last: WheelCommand,
}

impl<M: MotorPort> ClosedLoopDrive<M> {
    pub fn new(
        motor: M,
        left_counter: Box<dyn PulseCounter>,
        right_counter: Box<dyn PulseCounter>,
        clock: Rc<dyn Clock>,
        config: &DriveConfig,
    ) -> Self {
        let wheel = |counter: Box<dyn PulseCounter>| WheelLoop {
            counter,
            estimator: RateEstimator::new(config.counts_per_rev, config.idle_timeout),
            pid: Pid::from_gains(config.wheel_gains, config.wheel_integral_limit),
        };
        Self {
            motor,
            left: wheel(left_counter),
            right: wheel(right_counter),
            clock,
            max_rpm: config.max_rpm,
            max_dt: config.max_dt,
            last_update: None,
            last: WheelCommand::STOP,
        }
    }

    fn step_dt(&mut self, now: f64) -> f64 {
        let dt = self.last_update.map_or(0.0, |t| (now - t).clamp(0.0, self.max_dt));
        self.last_update = Some(now);
        dt
    }
}

impl<M: MotorPort> Drive for ClosedLoopDrive<M> {
    fn set_speeds(&mut self, left: f64, right: f64) {
        let now = self.clock.now();
        let dt = self.step_dt(now);
        let l = self.left.regulate(clamp_fraction(left), self.max_rpm, now, dt);
        let r = self.right.regulate(clamp_fraction(right), self.max_rpm, now, dt);
        trace!(
            "rate loop: req=({:.2},{:.2}) rpm=({:.0},{:.0}) out=({:.2},{:.2})",
            left,
            right,
            self.left.rpm(),
            self.right.rpm(),
            l,
            r
        );
        self.motor.set_speeds(l, r);
        self.last = WheelCommand::new(l, r);
    }

    fn stop(&mut self) {
        self.motor.stop();
        self.left.pid.reset();
        self.right.pid.reset();
        self.last = WheelCommand::STOP;
    }

    fn rates(&mut self) -> Option<(f64, f64)> {
        let now = self.clock.now();
        let l = self.left.estimator.update(self.left.counter.count(), now);
        let r = self.right.estimator.update(self.right.counter.count(), now);
        Some((l, r))
    }

    fn last_command(&self) -> WheelCommand {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::PidGains;
    use crate::hal::{ManualClock, MockEncoder, RecordingMotor};

    fn setup() -> (ClosedLoopDrive<RecordingMotor>, RecordingMotor, MockEncoder, MockEncoder, ManualClock) {
        let motor = RecordingMotor::new();
        let left = MockEncoder::new();
        let right = MockEncoder::new();
        let clock = ManualClock::new();
        let config = DriveConfig {
            closed_loop: true,
            counts_per_rev: 12.0,
            idle_timeout: 0.5,
            max_rpm: 600.0,
            wheel_gains: PidGains::new(0.001, 0.0, 0.0),
            wheel_integral_limit: Some(100.0),
            max_dt: 0.05,
        };
        let drive = ClosedLoopDrive::new(
            motor.clone(),
            Box::new(left.clone()),
            Box::new(right.clone()),
            Rc::new(clock.clone()),
            &config,
        );
        (drive, motor, left, right, clock)
    }

    #[test]
    fn slow_wheel_gets_boosted() {
        let (mut drive, motor, left, right, clock) = setup();
        drive.set_speeds(0.5, 0.5);
        clock.advance(0.1);
        // left at target (300 rpm = 6 pulses / 0.1 s), right stalled
        left.add(6);
        drive.set_speeds(0.5, 0.5);
        let (l, r) = motor.last().unwrap();
        assert!((l - 0.5).abs() < 1e-9);
        assert!(r > 0.5, "stalled wheel should be pushed harder, got {}", r);
        let _ = right;
    }

    #[test]
    fn stop_resets_rate_pids() {
        let (mut drive, motor, _left, _right, clock) = setup();
        drive.set_speeds(0.5, 0.5);
        clock.advance(0.05);
        drive.set_speeds(0.5, 0.5);
        assert!(!drive.left.pid.is_fresh());
        drive.stop();
        assert!(drive.left.pid.is_fresh());
        assert!(drive.right.pid.is_fresh());
        assert_eq!(motor.last(), Some((0.0, 0.0)));
    }

    #[test]
    fn zero_request_is_zero_output() {
        let (mut drive, motor, _l, _r, _clock) = setup();
        drive.set_speeds(0.0, -0.4);
        let (l, r) = motor.last().unwrap();
        assert_eq!(l, 0.0);
        assert!(r < 0.0);
    }
}
