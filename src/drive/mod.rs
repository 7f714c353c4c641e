//! Drive actuation: symmetric normalised commands to the motor port,
//! optionally closed around measured wheel rates.

pub mod closed_loop;
pub mod encoder;

pub use closed_loop::ClosedLoopDrive;
pub use encoder::RateEstimator;

use crate::control::WheelCommand;
use crate::hal::MotorPort;

/// What the sequencer and maneuvers drive through.
pub trait Drive {
    /// Command both sides; each value is a fraction in [-1, 1] and is
    /// clamped before use.
    fn set_speeds(&mut self, left: f64, right: f64);

    fn stop(&mut self);

    fn command(&mut self, cmd: WheelCommand) {
        self.set_speeds(cmd.left, cmd.right);
    }

    /// Measured wheel rates in rpm, when the drive has feedback.
    fn rates(&mut self) -> Option<(f64, f64)> {
        None
    }

    /// Last command actually sent to the motors.
    fn last_command(&self) -> WheelCommand;
}

/// Clamp a requested fraction into [-1, 1]; non-finite requests become 0.
pub fn clamp_fraction(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Straight pass-through to the motor port.
pub struct OpenLoopDrive<M> {
    motor: M,
    last: WheelCommand,
}

impl<M: MotorPort> OpenLoopDrive<M> {
    pub fn new(motor: M) -> Self {
        Self { motor, last: WheelCommand::STOP }
    }

    pub fn into_inner(self) -> M {
        self.motor
    }
}

impl<M: MotorPort> Drive for OpenLoopDrive<M> {
    fn set_speeds(&mut self, left: f64, right: f64) {
        let cmd = WheelCommand::new(clamp_fraction(left), clamp_fraction(right));
        self.motor.set_speeds(cmd.left, cmd.right);
        self.last = cmd;
    }

    fn stop(&mut self) {
        self.motor.stop();
        self.last = WheelCommand::STOP;
    }

    fn last_command(&self) -> WheelCommand {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::RecordingMotor;

    #[test]
    fn commands_are_clamped() {
        let log = RecordingMotor::new();
        let mut drive = OpenLoopDrive::new(log.clone());
        drive.set_speeds(1.4, -2.0);
        drive.set_speeds(f64::NAN, 0.3);
        assert_eq!(log.commands(), vec![(1.0, -1.0), (0.0, 0.3)]);
        assert_eq!(drive.last_command(), WheelCommand::new(0.0, 0.3));
    }

    #[test]
    fn stop_sends_zero_pair() {
        let log = RecordingMotor::new();
        let mut drive = OpenLoopDrive::new(log.clone());
        drive.set_speeds(0.5, 0.5);
        drive.stop();
        assert_eq!(log.last(), Some((0.0, 0.0)));
        assert_eq!(drive.last_command(), WheelCommand::STOP);
    }
}
