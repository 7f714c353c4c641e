use log::debug;

use super::calibration::CalibrationRange;
use super::frame::{self, Frame, LEFT_EDGE, RIGHT_EDGE};
use crate::config::SensorConfig;
use crate::detect::Debouncer;
use crate::hal::SensorPort;

/// Turns raw array readings into frames, a line error and bar/gap flags.
///
/// Every read widens the calibration range. Line error follows a
/// sticky-memory rule: with no active sensor the last computed error is
/// returned, so the vehicle keeps turning the way it last saw the line.
pub struct SensorFrontend {
    port: Box<dyn SensorPort>,
    config: SensorConfig,
    calibration: CalibrationRange,
    last_error: f64,
    filtered_error: f64,
    bar_detector: Debouncer,
    last_frame: Frame,
}

impl SensorFrontend {
    pub fn new(port: Box<dyn SensorPort>, config: SensorConfig) -> Self {
        let bar_detector = config.bar_debounce.build();
        Self {
            port,
            config,
            calibration: CalibrationRange::new(),
            last_error: 0.0,
            filtered_error: 0.0,
            bar_detector,
            last_frame: Frame::zeros(),
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationRange {
        &self.calibration
    }

    /// Most recent frame returned by [`Self::read_calibrated`].
    pub fn last_frame(&self) -> &Frame {
        &self.last_frame
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    pub fn read_calibrated(&mut self) -> Frame {
        let raw = self.port.read();
        self.calibration.observe(&raw);
        let frame = if self.config.normalize {
            self.calibration.normalize(&raw)
        } else {
            frame::clamp_unit(&raw)
        };
        self.last_frame = frame;
        frame
    }

    /// Read a fresh frame and compute its line error.
    pub fn line_error(&mut self) -> f64 {
        let frame = self.read_calibrated();
        self.error_of(&frame)
    }

    /// Line error of an already-read frame, in [-1, 1]; negative means the
    /// line is to the left.
    pub fn error_of(&mut self, frame: &Frame) -> f64 {
        let err = match self.raw_error(frame) {
            Some(e) => {
                self.last_error = e;
                e
            }
            None => self.last_error,
        };

        match self.config.ema_alpha {
            Some(alpha) => {
                self.filtered_error = alpha * err + (1.0 - alpha) * self.filtered_error;
                self.filtered_error
            }
            None => err,
        }
    }

    /// Centroid error of `frame` alone, without touching the sticky or
    /// smoothed state; `None` when no sensor is active.
    pub fn raw_error(&self, frame: &Frame) -> Option<f64> {
        frame::centroid(frame, self.config.active_level, self.config.min_denominator)
    }

    /// Last unfiltered error the centroid produced.
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// Forget the sticky error and the smoothing state.
    pub fn reset_error_memory(&mut self) {
        self.last_error = 0.0;
        self.filtered_error = 0.0;
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    pub fn black_count(&self, frame: &Frame) -> usize {
        frame::active_count(frame, self.config.bar_level)
    }

    /// Transverse marker under the array.
    pub fn is_bar(&self, frame: &Frame) -> bool {
        if self.black_count(frame) < self.config.bar_min_count {
            return false;
        }
        if !self.config.bar_requires_edge {
            return true;
        }
        let level = self.config.bar_level;
        frame::is_active(frame, LEFT_EDGE, level) || frame::is_active(frame, RIGHT_EDGE, level)
    }

    /// Total loss of line.
    pub fn is_gap(&self, frame: &Frame) -> bool {
        frame::max_value(frame) < self.config.gap_threshold
    }

    /// At least one sensor sees the line.
    pub fn sees_line(&self, frame: &Frame) -> bool {
        frame::active_count(frame, self.config.active_level) > 0
    }

    /// Debounced [`Self::is_bar`]; true on the sample that confirms a bar.
    pub fn is_bar_confirmed(&mut self, frame: &Frame) -> bool {
        let hit = self.is_bar(frame);
        let fired = self.bar_detector.update(hit);
        if fired {
            debug!("bar confirmed after {} hits", self.bar_detector.threshold());
        }
        fired
    }

    pub fn bar_hits(&self) -> u32 {
        self.bar_detector.count()
    }

    pub fn reset_bar_detector(&mut self) {
        self.bar_detector.reset();
    }
}
