use crate::hal::Clock;

/// Shortest sampling interval accepted by [`stable`].
pub const MIN_SAMPLE_INTERVAL: f64 = 1e-4;

/// Outcome of one [`StableCondition`] observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StablePoll {
    Pending,
    Confirmed,
    TimedOut,
}

/// Incremental "condition held for N consecutive samples" check with a
/// deadline. Reset-on-miss semantics.
///
/// The timer starts at the first observation (or an explicit `start`), so
/// the condition can live inside a state machine that reads the clock once
/// per iteration.
#[derive(Debug, Clone)]
pub struct StableCondition {
    required_hits: u32,
    timeout: f64,
    hits: u32,
    started: Option<f64>,
}

impl StableCondition {
    pub fn new(required_hits: u32, timeout: f64) -> Self {
        Self { required_hits: required_hits.max(1), timeout, hits: 0, started: None }
    }

    pub fn start(&mut self, now: f64) {
        self.hits = 0;
        self.started = Some(now);
    }

    pub fn observe(&mut self, now: f64, hit: bool) -> StablePoll {
        let started = *self.started.get_or_insert(now);
        if now - started > self.timeout {
            return StablePoll::TimedOut;
        }

        if hit {
            self.hits += 1;
            if self.hits >= self.required_hits {
                return StablePoll::Confirmed;
            }
        } else {
            self.hits = 0;
        }
        StablePoll::Pending
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        self.started.map_or(0.0, |s| now - s)
    }
}

/// Poll `predicate` every `sample_interval` seconds until it holds for
/// `required_hits` consecutive samples (true) or `timeout` elapses (false).
pub fn stable<F>(
    clock: &dyn Clock,
    sample_interval: f64,
    required_hits: u32,
    timeout: f64,
    mut predicate: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let interval = sample_interval.max(MIN_SAMPLE_INTERVAL);
    let mut cond = StableCondition::new(required_hits, timeout);
    cond.start(clock.now());
    loop {
        let hit = predicate();
        match cond.observe(clock.now(), hit) {
            StablePoll::Confirmed => return true,
            StablePoll::TimedOut => return false,
            StablePoll::Pending => clock.sleep(interval),
        }
    }
}
