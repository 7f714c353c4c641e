//! Port implementations backed by a shared [`SimWorld`].
//!
//! The clock is the only thing that moves the world: `sleep` integrates the
//! physics forward, so control code that paces itself with the clock drives
//! the simulation exactly as it would drive hardware.

use std::cell::RefCell;
use std::rc::Rc;

use super::world::SimWorld;
use crate::hal::{Clock, MotorPort, PulseCounter, SensorPort};
use crate::sensing::Frame;

pub type SharedWorld = Rc<RefCell<SimWorld>>;

pub struct SimSensor(pub SharedWorld);

impl SensorPort for SimSensor {
    fn read(&mut self) -> Frame {
        self.0.borrow_mut().read_frame()
    }
}

pub struct SimMotor(pub SharedWorld);

impl MotorPort for SimMotor {
    fn set_speeds(&mut self, left: f64, right: f64) {
        self.0.borrow_mut().set_command(left, right);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Left,
    Right,
}

pub struct SimEncoder {
    world: SharedWorld,
    wheel: Wheel,
}

impl SimEncoder {
    pub fn new(world: SharedWorld, wheel: Wheel) -> Self {
        Self { world, wheel }
    }
}

impl PulseCounter for SimEncoder {
    fn count(&mut self) -> u64 {
        let (l, r) = self.world.borrow().pulses();
        match self.wheel {
            Wheel::Left => l,
            Wheel::Right => r,
        }
    }
}

#[derive(Clone)]
pub struct SimClock(pub SharedWorld);

impl Clock for SimClock {
    fn now(&self) -> f64 {
        self.0.borrow().time()
    }

    fn sleep(&self, secs: f64) {
        if secs > 0.0 {
            self.0.borrow_mut().advance(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::course::Course;
    use crate::sim::world::VehicleParams;

    #[test]
    fn clock_sleep_moves_the_vehicle() {
        let world = Rc::new(RefCell::new(SimWorld::new(Course::straight(1.0), VehicleParams::default(), 1)));
        let clock = SimClock(world.clone());
        let mut motor = SimMotor(world.clone());
        let mut left = SimEncoder::new(world.clone(), Wheel::Left);

        let x0 = world.borrow().pose().position.x;
        motor.set_speeds(0.6, 0.6);
        clock.sleep(0.5);
        assert!((clock.now() - 0.5).abs() < 1e-9);
        assert!(world.borrow().pose().position.x > x0 + 0.05);
        assert!(left.count() > 0);

        motor.stop();
        assert_eq!(world.borrow().command(), (0.0, 0.0));
    }

    #[test]
    fn sensor_reads_the_course() {
        let world = Rc::new(RefCell::new(SimWorld::new(Course::straight(1.0), VehicleParams::default(), 1)));
        let mut sensor = SimSensor(world);
        let frame = sensor.read();
        assert!(frame[3] > 0.5);
        assert!(frame[0] < 0.5);
    }
}
