pub mod pid;
pub mod steering;

pub use pid::{Pid, PidGains};
pub use steering::{SteeringController, WheelCommand};
