use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Debounce counters for noisy boolean events
// ---------------------------------------------------------------------------

/// How a miss affects the hit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebouncePolicy {
    /// Any miss drops the counter to zero; fires on N consecutive hits.
    ResetOnMiss,
    /// A miss decrements the counter (floored at zero); tolerates flicker.
    LeakyBucket,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        DebouncePolicy::ResetOnMiss
    }
}

/// Serialisable debounce settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebounceConfig {
    #[serde(default)]
    pub policy: DebouncePolicy,
    #[serde(default = "DebounceConfig::default_hits")]
    pub hits: u32,
}

impl DebounceConfig {
    fn default_hits() -> u32 {
        3
    }

    pub fn build(&self) -> Debouncer {
        Debouncer::new(self.policy, self.hits)
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { policy: DebouncePolicy::default(), hits: Self::default_hits() }
    }
}

/// Counter attached to a boolean sample stream.
///
/// Fires when the counter reaches the threshold, then re-arms from zero so
/// one sustained event is not reported twice in a row.
#[derive(Debug, Clone)]
pub struct Debouncer {
    policy: DebouncePolicy,
    threshold: u32,
    count: u32,
}

impl Debouncer {
    pub fn new(policy: DebouncePolicy, threshold: u32) -> Self {
        Self { policy, threshold: threshold.max(1), count: 0 }
    }

    pub fn reset_on_miss(threshold: u32) -> Self {
        Self::new(DebouncePolicy::ResetOnMiss, threshold)
    }

    pub fn leaky_bucket(threshold: u32) -> Self {
        Self::new(DebouncePolicy::LeakyBucket, threshold)
    }

    /// Feed one sample. Returns true on the sample that confirms the event.
    pub fn update(&mut self, hit: bool) -> bool {
        if hit {
            self.count += 1;
        } else {
            self.count = match self.policy {
                DebouncePolicy::ResetOnMiss => 0,
                DebouncePolicy::LeakyBucket => self.count.saturating_sub(1),
            };
        }

        if self.count >= self.threshold {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fires(det: &mut Debouncer, samples: &[bool]) -> usize {
        samples.iter().filter(|&&s| det.update(s)).count()
    }

    #[test]
    fn reset_on_miss_needs_consecutive_hits() {
        for n in 1..6u32 {
            let mut det = Debouncer::reset_on_miss(n);
            let mut samples = vec![true; (n - 1) as usize];
            samples.push(false);
            assert_eq!(fires(&mut det, &samples), 0, "N-1 hits then a miss fired for N={}", n);
            assert_eq!(det.count(), 0);

            let mut det = Debouncer::reset_on_miss(n);
            assert_eq!(fires(&mut det, &vec![true; n as usize]), 1);
        }
    }

    #[test]
    fn reset_on_miss_rearms_after_firing() {
        let mut det = Debouncer::reset_on_miss(3);
        assert_eq!(fires(&mut det, &[true, true, true, true]), 1);
        assert_eq!(det.count(), 1);
    }

    #[test]
    fn leaky_bucket_decrements_on_miss() {
        let mut det = Debouncer::leaky_bucket(4);
        det.update(true);
        det.update(true);
        det.update(true);
        assert_eq!(det.count(), 3);
        assert!(!det.update(false));
        assert_eq!(det.count(), 2, "single miss should only drop the count by one");
        assert!(!det.update(true));
        assert!(det.update(true));
    }

    #[test]
    fn leaky_bucket_floors_at_zero() {
        let mut det = Debouncer::leaky_bucket(2);
        for _ in 0..5 {
            det.update(false);
        }
        assert_eq!(det.count(), 0);
    }

    #[test]
    fn leaky_bucket_tolerates_flicker_where_reset_does_not() {
        let pattern = [true, true, true, false, true, true];
        let mut leaky = Debouncer::leaky_bucket(4);
        let mut strict = Debouncer::reset_on_miss(4);
        assert_eq!(fires(&mut leaky, &pattern), 1);
        assert_eq!(fires(&mut strict, &pattern), 0);
    }

    #[test]
    fn zero_threshold_is_treated_as_one() {
        let mut det = Debouncer::reset_on_miss(0);
        assert_eq!(det.threshold(), 1);
        assert!(det.update(true));
    }
}
