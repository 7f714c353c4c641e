use super::frame::{Frame, SENSOR_COUNT};

/// Spans narrower than this are treated as uncalibrated.
const MIN_SPAN: f64 = 1e-3;

/// Per-sensor running (min, max) of raw readings.
///
/// The range only ever widens. It is process-lifetime state and is not
/// persisted.
#[derive(Debug, Clone)]
pub struct CalibrationRange {
    min: Frame,
    max: Frame,
    samples: usize,
}

impl CalibrationRange {
    pub fn new() -> Self {
        Self {
            min: Frame::from_element(1.0),
            max: Frame::from_element(0.0),
            samples: 0,
        }
    }

    pub fn observe(&mut self, raw: &Frame) {
        self.min = self.min.zip_map(raw, f64::min);
        self.max = self.max.zip_map(raw, f64::max);
        self.samples += 1;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn span(&self, index: usize) -> f64 {
        (self.max[index] - self.min[index]).max(0.0)
    }

    /// True when every sensor has seen both a light and a dark surface.
    pub fn is_complete(&self) -> bool {
        (0..SENSOR_COUNT).all(|i| self.span(i) > MIN_SPAN)
    }

    /// Rescale `raw` into [0, 1] through the observed range. Sensors with
    /// no usable span pass through clamped.
    pub fn normalize(&self, raw: &Frame) -> Frame {
        Frame::from_fn(|i, _| {
            let span = self.span(i);
            let v = if span > MIN_SPAN { (raw[i] - self.min[i]) / span } else { raw[i] };
            v.clamp(0.0, 1.0)
        })
    }

    pub fn ranges(&self) -> Vec<(f64, f64)> {
        (0..SENSOR_COUNT).map(|i| (self.min[i], self.max[i])).collect()
    }
}

impl Default for CalibrationRange {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::frame::frame_from;
    use approx::assert_relative_eq;

    #[test]
    fn range_widens_monotonically() {
        let mut cal = CalibrationRange::new();
        cal.observe(&Frame::from_element(0.4));
        cal.observe(&Frame::from_element(0.6));
        let before = cal.ranges();
        cal.observe(&Frame::from_element(0.5));
        assert_eq!(before, cal.ranges(), "a reading inside the range must not shrink it");
        assert_relative_eq!(cal.span(0), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn normalize_uses_span_when_available() {
        let mut cal = CalibrationRange::new();
        cal.observe(&Frame::from_element(0.2));
        cal.observe(&frame_from([0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.2]));
        let n = cal.normalize(&Frame::from_element(0.5));
        assert_relative_eq!(n[0], 0.5, epsilon = 1e-12);
        // no span on the last sensor: raw value passes through
        assert_relative_eq!(n[7], 0.5, epsilon = 1e-12);
        assert!(!cal.is_complete());
    }
}
