pub mod calibration;
pub mod frame;
pub mod frontend;

pub use calibration::CalibrationRange;
pub use frame::{frame_from, Frame, SENSOR_COUNT};
pub use frontend::SensorFrontend;
