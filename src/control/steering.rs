use crate::config::SteeringConfig;
use super::pid::{Pid, PidGains};

// ---------------------------------------------------------------------------
// Steering: line error -> differential wheel command
// ---------------------------------------------------------------------------

/// Differential wheel command, each side a signed fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

impl WheelCommand {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn straight(speed: f64) -> Self {
        Self { left: speed, right: speed }
    }

    /// In-place rotation; positive `speed` spins clockwise (to the right).
    pub fn spin(speed: f64) -> Self {
        Self { left: speed, right: -speed }
    }

    pub const STOP: WheelCommand = WheelCommand { left: 0.0, right: 0.0 };
}

/// PID on line error with a capped correction, split symmetrically across
/// the two sides around the segment speed.
#[derive(Debug, Clone)]
pub struct SteeringController {
    pid: Pid,
    max_correction: f64,
    last_correction: f64,
}

impl SteeringController {
    pub fn new(pid: Pid, max_correction: f64) -> Self {
        Self { pid, max_correction: max_correction.abs(), last_correction: 0.0 }
    }

    pub fn from_config(config: &SteeringConfig) -> Self {
        Self::new(Pid::from_gains(config.gains, config.integral_limit), config.max_correction)
    }

    /// Compute the command for one tick.
    ///
    /// A line to the right (positive error) yields a negative correction,
    /// which speeds up the left wheel and turns the vehicle right.
    pub fn steer(&mut self, speed: f64, line_error: f64, dt: f64) -> WheelCommand {
        let correction = self
            .pid
            .update(0.0, line_error, dt)
            .clamp(-self.max_correction, self.max_correction);
        self.last_correction = correction;
        WheelCommand::new(speed - correction, speed + correction)
    }

    pub fn last_correction(&self) -> f64 {
        self.last_correction
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.pid.set_gains(gains);
    }

    pub fn reset(&mut self) {
        self.pid.reset();
        self.last_correction = 0.0;
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}
