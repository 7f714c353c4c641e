use nalgebra::{Point2, Vector2};

// ---------------------------------------------------------------------------
// Differential-drive kinematics with RK4 over a constant wheel-speed step
// ---------------------------------------------------------------------------

/// Planar body pose integrated by [`rk4_step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Point2<f64>,
    pub heading: f64,
}

/// Time derivative of [`BodyState`].
#[derive(Debug, Clone, Copy)]
pub struct BodyDeriv {
    pub dpos: Vector2<f64>,
    pub dheading: f64,
}

impl BodyState {
    fn apply(&self, d: &BodyDeriv, dt: f64) -> BodyState {
        BodyState { position: self.position + d.dpos * dt, heading: self.heading + d.dheading * dt }
    }
}

/// Unicycle derivatives for left/right ground speeds (m/s) on a given
/// track width (m). Positive yaw rate is counter-clockwise.
pub fn derivatives(state: &BodyState, left: f64, right: f64, track_width: f64) -> BodyDeriv {
    let v = 0.5 * (left + right);
    let omega = (right - left) / track_width;
    BodyDeriv { dpos: Vector2::new(v * state.heading.cos(), v * state.heading.sin()), dheading: omega }
}

/// Single RK4 step with wheel speeds held constant over the step.
pub fn rk4_step(state: &BodyState, left: f64, right: f64, track_width: f64, dt: f64) -> BodyState {
    let k1 = derivatives(state, left, right, track_width);
    let k2 = derivatives(&state.apply(&k1, dt * 0.5), left, right, track_width);
    let k3 = derivatives(&state.apply(&k2, dt * 0.5), left, right, track_width);
    let k4 = derivatives(&state.apply(&k3, dt), left, right, track_width);

    BodyState {
        position: state.position + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        heading: state.heading + (k1.dheading + 2.0 * k2.dheading + 2.0 * k3.dheading + k4.dheading) * (dt / 6.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn equal_speeds_drive_straight() {
        let s = BodyState { position: Point2::origin(), heading: 0.0 };
        let n = rk4_step(&s, 0.5, 0.5, 0.1, 2.0);
        assert_relative_eq!(n.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(n.position.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(n.heading, 0.0);
    }

    #[test]
    fn opposite_speeds_spin_in_place() {
        let s = BodyState { position: Point2::new(1.0, 2.0), heading: 0.0 };
        let n = rk4_step(&s, -0.1, 0.1, 0.1, PI / 2.0 / 2.0);
        assert_relative_eq!(n.heading, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(n.position.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_turn_follows_circle() {
        // radius = b/2 * (r+l)/(r-l) = 0.05 * 3 = 0.15
        let mut s = BodyState { position: Point2::origin(), heading: 0.0 };
        let omega = (0.2 - 0.1) / 0.1;
        let steps = 1000;
        let dt = PI / omega / steps as f64;
        for _ in 0..steps {
            s = rk4_step(&s, 0.1, 0.2, 0.1, dt);
        }
        // half a circle counter-clockwise ends at (0, 2r)
        assert_relative_eq!(s.position.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.position.y, 0.3, epsilon = 1e-9);
    }
}
