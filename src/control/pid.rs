use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PID Controller (single axis)
// ---------------------------------------------------------------------------

/// Gain set, kept separate from controller state so segment profiles can
/// swap gains without touching the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

#[derive(Debug, Clone)]
pub struct Pid {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Symmetric clamp on the accumulated integral.
    pub integral_limit: Option<f64>,
    integral: f64,
    prev_error: f64,
    first: bool,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd, integral_limit: None, integral: 0.0, prev_error: 0.0, first: true }
    }

    pub fn with_limit(kp: f64, ki: f64, kd: f64, integral_limit: f64) -> Self {
        Self { integral_limit: Some(integral_limit.abs()), ..Self::new(kp, ki, kd) }
    }

    pub fn from_gains(gains: PidGains, integral_limit: Option<f64>) -> Self {
        Self { integral_limit: integral_limit.map(f64::abs), ..Self::new(gains.kp, gains.ki, gains.kd) }
    }

    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    /// Replace the gains; integrator state is kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.kp = gains.kp;
        self.ki = gains.ki;
        self.kd = gains.kd;
    }

    pub fn update(&mut self, setpoint: f64, measurement: f64, dt: f64) -> f64 {
        let error = setpoint - measurement;

        self.integral += error * dt;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        // First sample after construction/reset has no history to difference.
        let derivative = if self.first || dt <= 0.0 {
            0.0
        } else {
            (error - self.prev_error) / dt
        };
        self.first = false;
        self.prev_error = error;

        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.first = true;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    /// True until the next `update` after construction or `reset`.
    pub fn is_fresh(&self) -> bool {
        self.first
    }
}
