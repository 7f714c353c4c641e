//! Plan executor shared by every maneuver.
//!
//! A plan is a list of [`Step`]s. The runner reads the clock once per
//! iteration, advances one explicit phase, then sleeps a sample interval.
//! Every phase has a deadline, and a timed-out wait either starts the
//! recovery scan or is logged and skipped. Nothing here returns an error.

use log::debug;

use crate::config::{ManeuverConfig, RecoveryConfig};
use crate::context::NavContext;
use crate::control::WheelCommand;
use crate::detect::stable::MIN_SAMPLE_INTERVAL;
use crate::detect::{StableCondition, StablePoll};
use crate::sensing::frame::{self, Frame, CENTER_PAIR, LEFT_EDGE, RIGHT_EDGE};

// ---------------------------------------------------------------------------
// Plan vocabulary
// ---------------------------------------------------------------------------

/// Frame predicates a wait can confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// Total activation at or below the "mostly white" sum.
    MostlyWhite,
    /// Single line under the centre with a small error.
    Centered,
    /// Any sensor active.
    LineVisible,
    /// Fewer sensors than a bar's minimum count.
    OffMarker,
}

/// Drive `command` until `until` holds for `samples` consecutive frames.
#[derive(Debug, Clone)]
pub struct Wait {
    pub label: &'static str,
    pub command: WheelCommand,
    pub until: Until,
    pub samples: u32,
    pub timeout: f64,
    /// Samples taken before this much time has passed never count.
    pub min_time: f64,
    /// Count hits only after a mostly-white frame has been seen in this plan.
    pub gated: bool,
    /// Run the recovery scan on timeout.
    pub recover: bool,
}

impl Wait {
    pub fn new(label: &'static str, command: WheelCommand, until: Until, samples: u32, timeout: f64) -> Self {
        Self { label, command, until, samples, timeout, min_time: 0.0, gated: false, recover: false }
    }

    pub fn min_time(mut self, secs: f64) -> Self {
        self.min_time = secs;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn recover(mut self, on: bool) -> Self {
        self.recover = on;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    /// Time-based drive with no sensor feedback.
    Blind { label: &'static str, command: WheelCommand, duration: f64 },
    /// Motors stopped for a fixed time.
    Pause(f64),
    Wait(Wait),
    /// Pivot toward whichever edge sensor is dark until both are.
    Align { speed: f64, timeout: f64 },
}

/// What a plan run produced.
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub stopped: bool,
    pub warnings: Vec<String>,
    pub elapsed: f64,
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub fn mostly_white(frame: &Frame, config: &ManeuverConfig) -> bool {
    frame::activation_sum(frame) <= config.mostly_white_sum
}

/// Centre sensor dark, a normal single-line count, and a small error.
///
/// Uses the unfiltered centroid of this frame only; the steering error
/// memory and smoothing state are left alone.
pub fn centered(ctx: &NavContext, frame: &Frame) -> bool {
    let level = ctx.sensors.config().active_level;
    let (a, b) = CENTER_PAIR;
    let center = frame::is_active(frame, a, level) || frame::is_active(frame, b, level);
    let count = frame::active_count(frame, level);
    let normal = (ctx.maneuver.line_min_count..=ctx.maneuver.line_max_count).contains(&count);
    let small = ctx.sensors.raw_error(frame).is_some_and(|e| e.abs() < ctx.maneuver.center_error);
    center && normal && small
}

fn holds(ctx: &NavContext, until: Until, frame: &Frame) -> bool {
    match until {
        Until::MostlyWhite => mostly_white(frame, &ctx.maneuver),
        Until::Centered => centered(ctx, frame),
        Until::LineVisible => ctx.sensors.sees_line(frame),
        Until::OffMarker => ctx.sensors.black_count(frame) < ctx.sensors.config().bar_min_count,
    }
}

/// Recovery cycle: look left, sweep right past centre, come back, creep.
fn recovery_move(config: &RecoveryConfig, sub: usize) -> Option<(WheelCommand, f64)> {
    match sub {
        0 => Some((WheelCommand::spin(-config.pivot_speed), config.pivot_time)),
        1 => Some((WheelCommand::spin(config.pivot_speed), 2.0 * config.pivot_time)),
        2 => Some((WheelCommand::spin(-config.pivot_speed), config.pivot_time)),
        3 => Some((WheelCommand::straight(config.creep_speed), config.creep_time)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

enum Phase {
    Enter,
    Timed { until: f64 },
    Waiting { cond: StableCondition, entered: f64, recover: bool },
    Recovering { attempt: u32, sub: usize, until: f64, entered: f64 },
    Aligning { deadline: f64 },
}

enum Flow {
    /// Keep the phase and wait for the next sample.
    Hold(Phase),
    /// Move to another phase within this iteration.
    Switch(Phase),
    Advance,
}

struct PlanRunner<'a> {
    steps: &'a [Step],
    index: usize,
    phase: Phase,
    gap_seen: bool,
    outcome: PlanOutcome,
}

impl<'a> PlanRunner<'a> {
    fn new(steps: &'a [Step]) -> Self {
        Self { steps, index: 0, phase: Phase::Enter, gap_seen: false, outcome: PlanOutcome::default() }
    }

    fn warn(&mut self, ctx: &mut NavContext, message: String) {
        ctx.warn(&message);
        self.outcome.warnings.push(message);
    }

    /// Advance as far as possible at time `now`, reading at most one frame.
    /// Returns true once every step is done.
    fn poll(&mut self, ctx: &mut NavContext, now: f64) -> bool {
        let steps = self.steps;
        let mut sampled = false;
        loop {
            let Some(step) = steps.get(self.index) else {
                return true;
            };
            let phase = std::mem::replace(&mut self.phase, Phase::Enter);
            let flow = match phase {
                Phase::Enter => self.enter(ctx, step, now),
                Phase::Timed { until } => {
                    if now >= until {
                        Flow::Advance
                    } else {
                        Flow::Hold(Phase::Timed { until })
                    }
                }
                phase if sampled => Flow::Hold(phase),
                Phase::Waiting { cond, entered, recover } => {
                    sampled = true;
                    match step {
                        Step::Wait(wait) => self.sample_wait(ctx, wait, now, cond, entered, recover),
                        _ => Flow::Advance,
                    }
                }
                Phase::Recovering { attempt, sub, until, entered } => {
                    sampled = true;
                    match step {
                        Step::Wait(wait) => self.sample_recovery(ctx, wait, now, attempt, sub, until, entered),
                        _ => Flow::Advance,
                    }
                }
                Phase::Aligning { deadline } => {
                    sampled = true;
                    match step {
                        Step::Align { speed, .. } => self.sample_align(ctx, *speed, now, deadline),
                        _ => Flow::Advance,
                    }
                }
            };
            match flow {
                Flow::Hold(phase) => {
                    self.phase = phase;
                    return false;
                }
                Flow::Switch(phase) => self.phase = phase,
                Flow::Advance => {
                    self.index += 1;
                    self.phase = Phase::Enter;
                }
            }
        }
    }

    fn enter(&mut self, ctx: &mut NavContext, step: &Step, now: f64) -> Flow {
        match step {
            Step::Blind { label, command, duration } => {
                debug!("{}: blind {:.2}s at ({:.2},{:.2})", label, duration, command.left, command.right);
                ctx.drive.command(*command);
                Flow::Switch(Phase::Timed { until: now + duration })
            }
            Step::Pause(duration) => {
                ctx.drive.stop();
                Flow::Switch(Phase::Timed { until: now + duration })
            }
            Step::Wait(wait) => {
                debug!("{}: waiting for {:?} x{}", wait.label, wait.until, wait.samples);
                ctx.drive.command(wait.command);
                let mut cond = StableCondition::new(wait.samples, wait.timeout);
                cond.start(now);
                Flow::Switch(Phase::Waiting { cond, entered: now, recover: wait.recover })
            }
            Step::Align { timeout, .. } => Flow::Switch(Phase::Aligning { deadline: now + timeout }),
        }
    }

    fn sample_wait(
        &mut self,
        ctx: &mut NavContext,
        wait: &Wait,
        now: f64,
        mut cond: StableCondition,
        entered: f64,
        recover: bool,
    ) -> Flow {
        let frame = ctx.sensors.read_calibrated();
        let white = mostly_white(&frame, &ctx.maneuver);
        if white {
            self.gap_seen = true;
        }
        let armed = (!wait.gated || self.gap_seen) && now - entered >= wait.min_time;
        let hit = armed && holds(ctx, wait.until, &frame);

        match cond.observe(now, hit) {
            StablePoll::Pending => Flow::Hold(Phase::Waiting { cond, entered, recover }),
            StablePoll::Confirmed => {
                debug!("{}: confirmed after {:.3}s", wait.label, now - entered);
                Flow::Advance
            }
            StablePoll::TimedOut => {
                let attempts = ctx.maneuver.recovery.attempts;
                if recover && attempts > 0 {
                    self.warn(ctx, format!("{} timed out after {:.2}s, starting recovery", wait.label, wait.timeout));
                    self.start_recovery(ctx, 0, 0, now, entered)
                } else {
                    self.warn(ctx, format!("{} timed out after {:.2}s, proceeding", wait.label, now - entered));
                    Flow::Advance
                }
            }
        }
    }

    fn start_recovery(&mut self, ctx: &mut NavContext, attempt: u32, sub: usize, now: f64, entered: f64) -> Flow {
        match recovery_move(&ctx.maneuver.recovery, sub) {
            Some((command, duration)) => {
                ctx.drive.command(command);
                Flow::Hold(Phase::Recovering { attempt, sub, until: now + duration, entered })
            }
            None if attempt + 1 < ctx.maneuver.recovery.attempts => {
                debug!("recovery attempt {} found nothing", attempt + 1);
                self.start_recovery(ctx, attempt + 1, 0, now, entered)
            }
            None => {
                let attempts = ctx.maneuver.recovery.attempts;
                self.warn(ctx, format!("recovery gave up after {} attempts", attempts));
                ctx.drive.stop();
                Flow::Advance
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn sample_recovery(
        &mut self,
        ctx: &mut NavContext,
        wait: &Wait,
        now: f64,
        attempt: u32,
        sub: usize,
        until: f64,
        entered: f64,
    ) -> Flow {
        let frame = ctx.sensors.read_calibrated();
        if ctx.sensors.sees_line(&frame) {
            debug!("recovery spotted the line on attempt {}", attempt + 1);
            ctx.drive.command(wait.command);
            let mut cond = StableCondition::new(wait.samples, ctx.maneuver.recovery.reacquire_timeout);
            cond.start(now);
            return Flow::Hold(Phase::Waiting { cond, entered, recover: false });
        }
        if now < until {
            return Flow::Hold(Phase::Recovering { attempt, sub, until, entered });
        }
        self.start_recovery(ctx, attempt, sub + 1, now, entered)
    }

    fn sample_align(&mut self, ctx: &mut NavContext, speed: f64, now: f64, deadline: f64) -> Flow {
        let frame = ctx.sensors.read_calibrated();
        let level = ctx.sensors.config().active_level;
        let left = frame::is_active(&frame, LEFT_EDGE, level);
        let right = frame::is_active(&frame, RIGHT_EDGE, level);

        if left && right {
            debug!("aligned");
            return Flow::Advance;
        }
        if now >= deadline {
            self.warn(ctx, "align timed out, proceeding".to_string());
            return Flow::Advance;
        }
        // Dark left edge: the right side lags, so advance the right wheel.
        let command = match (left, right) {
            (true, false) => WheelCommand::new(0.0, speed),
            (false, true) => WheelCommand::new(speed, 0.0),
            _ => WheelCommand::straight(speed),
        };
        ctx.drive.command(command);
        Flow::Hold(Phase::Aligning { deadline })
    }
}

/// Execute `steps` to completion, a stop request, or the last deadline.
/// Motors are stopped on return.
pub fn run_plan(ctx: &mut NavContext, steps: &[Step]) -> PlanOutcome {
    let interval = ctx.maneuver.sample_dt.max(MIN_SAMPLE_INTERVAL);
    let start = ctx.clock.now();
    let mut runner = PlanRunner::new(steps);

    loop {
        if ctx.stop_requested() {
            debug!("plan interrupted by stop request");
            runner.outcome.stopped = true;
            break;
        }
        let now = ctx.clock.now();
        if runner.poll(ctx, now) {
            break;
        }
        ctx.clock.sleep(interval);
    }

    ctx.drive.stop();
    runner.outcome.elapsed = ctx.clock.now() - start;
    runner.outcome
}
