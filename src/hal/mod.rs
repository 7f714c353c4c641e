//! Hardware abstraction: the capabilities the navigation core consumes.
//!
//! Pin configuration, PWM, radio transport and the calibration UI live
//! outside this crate. They plug in by implementing these traits, and the
//! same core logic runs against [`mock`] doubles or the [`crate::sim`] world.

pub mod mock;
pub mod system;

use crate::sensing::Frame;

pub use mock::{ManualClock, MockEncoder, RecordingMotor, ScriptedSensor};
pub use system::{AnyStop, Deadline, DigitalArray, NeverStop, StopFlag, SystemClock};

/// Reflectance array, leftmost sensor first. Values are expected in [0, 1]
/// with 1.0 meaning maximal contrast ("black").
pub trait SensorPort {
    fn read(&mut self) -> Frame;
}

/// Two-channel motor driver taking signed duty fractions.
pub trait MotorPort {
    fn set_speeds(&mut self, left: f64, right: f64);

    fn stop(&mut self) {
        self.set_speeds(0.0, 0.0);
    }
}

/// Monotonic rising-edge counter attached to a wheel encoder.
pub trait PulseCounter {
    fn count(&mut self) -> u64;
}

/// Monotonic time source in seconds plus a blocking sleep.
pub trait Clock {
    fn now(&self) -> f64;
    fn sleep(&self, secs: f64);
}

/// Operator run/stop input, polled cooperatively.
pub trait StopSignal {
    fn stop_requested(&mut self) -> bool;
}

impl<P: SensorPort + ?Sized> SensorPort for Box<P> {
    fn read(&mut self) -> Frame {
        (**self).read()
    }
}

impl<M: MotorPort + ?Sized> MotorPort for Box<M> {
    fn set_speeds(&mut self, left: f64, right: f64) {
        (**self).set_speeds(left, right)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

impl<C: PulseCounter + ?Sized> PulseCounter for Box<C> {
    fn count(&mut self) -> u64 {
        (**self).count()
    }
}
