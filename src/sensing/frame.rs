use nalgebra::SVector;

// ---------------------------------------------------------------------------
// Reflectance frame
// ---------------------------------------------------------------------------

/// Number of reflectance sensors across the array.
pub const SENSOR_COUNT: usize = 8;

/// One reading of the array. Index 0 is the leftmost sensor; 1.0 is
/// maximal contrast ("black").
pub type Frame = SVector<f64, SENSOR_COUNT>;

/// Centroid weights, symmetric about the centre and skipping zero.
pub const CENTROID_WEIGHTS: [f64; SENSOR_COUNT] = [-4.0, -3.0, -2.0, -1.0, 1.0, 2.0, 3.0, 4.0];

/// Largest weight magnitude; divides the centroid into [-1, 1].
pub const MAX_WEIGHT: f64 = 4.0;

/// Index of the leftmost and rightmost sensors.
pub const LEFT_EDGE: usize = 0;
pub const RIGHT_EDGE: usize = SENSOR_COUNT - 1;

/// The two sensors straddling the centre line.
pub const CENTER_PAIR: (usize, usize) = (SENSOR_COUNT / 2 - 1, SENSOR_COUNT / 2);

pub fn weights() -> Frame {
    Frame::from_row_slice(&CENTROID_WEIGHTS)
}

/// Build a frame from a slice of exactly [`SENSOR_COUNT`] values.
pub fn frame_from(values: [f64; SENSOR_COUNT]) -> Frame {
    Frame::from_row_slice(&values)
}

/// Clamp every reading into [0, 1].
pub fn clamp_unit(frame: &Frame) -> Frame {
    frame.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
}

/// Readings at or above `level`, zero elsewhere.
pub fn active_values(frame: &Frame, level: f64) -> Frame {
    frame.map(|v| if v >= level { v } else { 0.0 })
}

pub fn active_count(frame: &Frame, level: f64) -> usize {
    frame.iter().filter(|&&v| v >= level).count()
}

pub fn is_active(frame: &Frame, index: usize, level: f64) -> bool {
    frame[index] >= level
}

/// Total activation across the array.
pub fn activation_sum(frame: &Frame) -> f64 {
    frame.sum()
}

pub fn max_value(frame: &Frame) -> f64 {
    frame.iter().copied().fold(0.0_f64, f64::max)
}

/// Activation mass of the left and right halves.
pub fn half_masses(frame: &Frame) -> (f64, f64) {
    let half = SENSOR_COUNT / 2;
    let left = frame.rows(0, half).sum();
    let right = frame.rows(half, SENSOR_COUNT - half).sum();
    (left, right)
}

/// Weighted centroid of the active sensors normalised to [-1, 1], or
/// `None` when the active mass is below `floor`.
pub fn centroid(frame: &Frame, level: f64, floor: f64) -> Option<f64> {
    let active = active_values(frame, level);
    let den = active.sum();
    if den < floor.max(f64::EPSILON) {
        return None;
    }
    let num = active.dot(&weights());
    Some((num / den / MAX_WEIGHT).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_are_antisymmetric() {
        let w = weights();
        for i in 0..SENSOR_COUNT {
            assert_eq!(w[i], -w[SENSOR_COUNT - 1 - i]);
            assert!(w[i] != 0.0);
        }
    }

    #[test]
    fn centroid_of_single_edges() {
        let mut left = Frame::zeros();
        left[LEFT_EDGE] = 1.0;
        let mut right = Frame::zeros();
        right[RIGHT_EDGE] = 1.0;
        assert_relative_eq!(centroid(&left, 0.5, 1e-6).unwrap(), -1.0);
        assert_relative_eq!(centroid(&right, 0.5, 1e-6).unwrap(), 1.0);
    }

    #[test]
    fn centroid_of_symmetric_pair_is_zero() {
        let mut f = Frame::zeros();
        f[CENTER_PAIR.0] = 0.8;
        f[CENTER_PAIR.1] = 0.8;
        assert_relative_eq!(centroid(&f, 0.5, 1e-6).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn centroid_ignores_sub_threshold_readings() {
        let f = frame_from([0.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(centroid(&f, 0.5, 1e-6).is_none());
    }

    #[test]
    fn half_masses_split_the_array() {
        let f = frame_from([1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5]);
        let (l, r) = half_masses(&f);
        assert_relative_eq!(l, 2.0);
        assert_relative_eq!(r, 0.5);
    }

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        let f = frame_from([-0.5, 1.5, f64::NAN, 0.25, 0.0, 0.0, 0.0, 0.0]);
        let c = clamp_unit(&f);
        assert_eq!(c[0], 0.0);
        assert_eq!(c[1], 1.0);
        assert_eq!(c[2], 0.0);
        assert_eq!(c[3], 0.25);
    }
}
