/// Wheel speed from a single-channel pulse counter.
///
/// rpm = pulses / interval * 60 / counts_per_rev. The interval runs from the
/// last update that saw new pulses, so slow wheels still average correctly.
/// With no pulses for longer than `idle_timeout` the rate drops to zero.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    counts_per_rev: f64,
    idle_timeout: f64,
    last_count: u64,
    last_time: Option<f64>,
    rpm: f64,
}

impl RateEstimator {
    pub fn new(counts_per_rev: f64, idle_timeout: f64) -> Self {
        Self {
            counts_per_rev: counts_per_rev.max(1.0),
            idle_timeout,
            last_count: 0,
            last_time: None,
            rpm: 0.0,
        }
    }

    pub fn update(&mut self, count: u64, now: f64) -> f64 {
        let Some(last_time) = self.last_time else {
            self.last_count = count;
            self.last_time = Some(now);
            return self.rpm;
        };

        let dt = now - last_time;
        if dt <= 0.0 {
            return self.rpm;
        }

        let delta = count.wrapping_sub(self.last_count);
        self.last_count = count;

        if delta > 0 {
            let revs = delta as f64 / self.counts_per_rev;
            self.rpm = revs / dt * 60.0;
            self.last_time = Some(now);
        } else if dt > self.idle_timeout {
            self.rpm = 0.0;
        }
        self.rpm
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    pub fn reset(&mut self) {
        self.last_time = None;
        self.rpm = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rate_from_pulses() {
        let mut est = RateEstimator::new(12.0, 0.5);
        est.update(0, 0.0);
        // 12 pulses in 0.1 s = 1 rev / 0.1 s = 600 rpm
        assert_relative_eq!(est.update(12, 0.1), 600.0, epsilon = 1e-9);
    }

    #[test]
    fn rate_holds_inside_timeout_and_decays_after() {
        let mut est = RateEstimator::new(12.0, 0.5);
        est.update(0, 0.0);
        est.update(6, 0.1);
        let held = est.update(6, 0.3);
        assert_relative_eq!(held, 300.0, epsilon = 1e-9);
        assert_eq!(est.update(6, 0.7), 0.0);
    }

    #[test]
    fn interval_spans_quiet_updates() {
        let mut est = RateEstimator::new(10.0, 1.0);
        est.update(0, 0.0);
        est.update(0, 0.1);
        est.update(0, 0.2);
        // 5 pulses over the whole 0.5 s since the last pulse-bearing update
        assert_relative_eq!(est.update(5, 0.5), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn non_positive_interval_keeps_rate() {
        let mut est = RateEstimator::new(12.0, 0.5);
        est.update(0, 1.0);
        est.update(12, 1.1);
        assert_relative_eq!(est.update(24, 1.1), 600.0, epsilon = 1e-9);
    }
}
