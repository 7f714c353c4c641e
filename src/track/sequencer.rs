use std::fmt;

use log::{debug, info};
use serde::Serialize;

use super::segment::{GapPolicy, Track, TrackSegment};
use crate::config::{SequencerConfig, SteeringConfig};
use crate::context::NavContext;
use crate::control::{SteeringController, WheelCommand};
use crate::error::Result;
use crate::maneuver::{self, Branch, ManeuverReport, Outcome, Step};

// ---------------------------------------------------------------------------
// State and records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Bar confirmed on the last segment.
    EndOfTrack,
    /// Entered a segment flagged `finish`.
    FinishMarker,
    StopRequested,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinishReason::EndOfTrack => "end of track",
            FinishReason::FinishMarker => "finish marker",
            FinishReason::StopRequested => "stop requested",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Following(usize),
    Transitioning,
    Finished(FinishReason),
}

impl SequencerState {
    fn label(&self) -> &'static str {
        match self {
            SequencerState::Following(_) => "following",
            SequencerState::Transitioning => "transitioning",
            SequencerState::Finished(_) => "finished",
        }
    }
}

/// One control tick.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub time: f64,
    pub segment: usize,
    pub state: &'static str,
    pub line_error: f64,
    pub correction: f64,
    pub left: f64,
    pub right: f64,
    /// `bar`, `gap`, `gap_stop`, `stop` or empty.
    pub event: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManeuverRecord {
    pub segment: usize,
    pub name: String,
    pub report: ManeuverReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub track: String,
    pub finish_reason: FinishReason,
    pub final_segment: usize,
    pub transitions: usize,
    pub ticks: u64,
    pub elapsed: f64,
    pub maneuvers: Vec<ManeuverRecord>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Top-level state machine: PID line following between bars, maneuvers and
/// profile changes at bars.
pub struct Sequencer {
    ctx: NavContext,
    track: Track,
    config: SequencerConfig,
    steering: SteeringController,
    speed: f64,
    max_dt: f64,
    tick_interval: f64,
    index: usize,
    state: SequencerState,
    started: Option<f64>,
    last_tick: Option<f64>,
    finished_at: Option<f64>,
    ticks: u64,
    transitions: usize,
    last_branch: Option<Branch>,
    maneuvers: Vec<ManeuverRecord>,
    warnings: Vec<String>,
    trace: Vec<TraceRecord>,
}

impl Sequencer {
    /// Validates the whole track up front; nothing is commanded on error.
    pub fn new(ctx: NavContext, track: Track, steering: &SteeringConfig, config: SequencerConfig) -> Result<Self> {
        track.validate()?;
        let mut seq = Self {
            ctx,
            track,
            config,
            steering: SteeringController::from_config(steering),
            speed: steering.base_speed,
            max_dt: steering.max_dt,
            tick_interval: steering.tick_interval,
            index: 0,
            state: SequencerState::Following(0),
            started: None,
            last_tick: None,
            finished_at: None,
            ticks: 0,
            transitions: 0,
            last_branch: None,
            maneuvers: Vec::new(),
            warnings: Vec::new(),
            trace: Vec::new(),
        };
        seq.apply_profile();
        Ok(seq)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SequencerState::Finished(_))
    }

    pub fn current_segment(&self) -> usize {
        self.index
    }

    pub fn segment(&self) -> Option<&TrackSegment> {
        self.track.segments.get(self.index)
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn steering(&self) -> &SteeringController {
        &self.steering
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_branch(&self) -> Option<Branch> {
        self.last_branch
    }

    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }

    pub fn context(&self) -> &NavContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut NavContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> NavContext {
        self.ctx
    }

    /// Pre-run calibration spin.
    pub fn calibrate(&mut self) -> usize {
        self.ctx.calibrate(self.config.calibration_time, self.config.calibration_speed)
    }

    // -----------------------------------------------------------------------
    // Control loop
    // -----------------------------------------------------------------------

    /// One read-classify-act iteration.
    pub fn tick(&mut self) -> Result<SequencerState> {
        if self.is_finished() {
            return Ok(self.state);
        }
        let now = self.ctx.clock.now();
        self.started.get_or_insert(now);

        if self.ctx.stop_requested() {
            self.finish(FinishReason::StopRequested, now);
            self.record(now, self.ctx.sensors.last_error(), "stop");
            return Ok(self.state);
        }

        let dt = self.last_tick.map_or(0.0, |t| (now - t).clamp(0.0, self.max_dt));
        self.last_tick = Some(now);
        self.ticks += 1;

        let frame = self.ctx.sensors.read_calibrated();
        if self.ctx.sensors.is_bar_confirmed(&frame) {
            self.transition(now)?;
            self.record(now, self.ctx.sensors.last_error(), "bar");
            return Ok(self.state);
        }

        let policy = self.track.segments[self.index].gap_policy;
        if self.ctx.sensors.is_gap(&frame) {
            match policy {
                GapPolicy::DriveThrough => {
                    let c = if self.config.heading_lock { self.steering.last_correction() } else { 0.0 };
                    self.ctx.drive.set_speeds(
                        (self.speed - c) * self.config.left_trim,
                        (self.speed + c) * self.config.right_trim,
                    );
                    self.record(now, self.ctx.sensors.last_error(), "gap");
                }
                GapPolicy::Stop => {
                    self.ctx.drive.stop();
                    self.record(now, self.ctx.sensors.last_error(), "gap_stop");
                }
            }
            return Ok(self.state);
        }

        let error = self.ctx.sensors.error_of(&frame);
        let cmd = self.steering.steer(self.speed, error, dt);
        self.ctx.drive.command(cmd);
        self.record(now, error, "");
        Ok(self.state)
    }

    /// Tick until finished, sleeping the configured interval between ticks.
    pub fn run(&mut self) -> Result<RunSummary> {
        info!("run starting on track '{}' ({} segments)", self.track.name, self.track.len());
        loop {
            if let SequencerState::Finished(_) = self.tick()? {
                break;
            }
            self.ctx.clock.sleep(self.tick_interval);
        }
        let summary = self.summary();
        info!(
            "run finished: {} after {:.2}s, {} transitions",
            summary.finish_reason, summary.elapsed, summary.transitions
        );
        Ok(summary)
    }

    /// Summary so far; `finish_reason` is only meaningful once finished.
    pub fn summary(&self) -> RunSummary {
        let finish_reason = match self.state {
            SequencerState::Finished(reason) => reason,
            _ => FinishReason::StopRequested,
        };
        let end = self.finished_at.unwrap_or_else(|| self.ctx.clock.now());
        RunSummary {
            track: self.track.name.clone(),
            finish_reason,
            final_segment: self.index.min(self.track.len().saturating_sub(1)),
            transitions: self.transitions,
            ticks: self.ticks,
            elapsed: self.started.map_or(0.0, |s| end - s),
            maneuvers: self.maneuvers.clone(),
            warnings: self.warnings.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn transition(&mut self, now: f64) -> Result<()> {
        self.ctx.drive.stop();
        self.state = SequencerState::Transitioning;
        let leaving = self.index;
        self.index += 1;
        self.transitions += 1;

        if self.index >= self.track.len() {
            self.finish(FinishReason::EndOfTrack, now);
            return Ok(());
        }
        let segment = self.track.segments[self.index].clone();
        self.ctx.note(&format!("segment {} -> {} '{}'", leaving, self.index, segment.name));

        let clear_time = if leaving == 0 { self.config.first_clear_time } else { self.config.clear_time };
        let clear = [
            Step::Pause(self.config.transition_pause),
            Step::Blind {
                label: "bar clear",
                command: WheelCommand::straight(self.config.clear_speed),
                duration: clear_time,
            },
        ];
        if maneuver::run_plan(&mut self.ctx, &clear).stopped {
            let t = self.ctx.clock.now();
            self.finish(FinishReason::StopRequested, t);
            return Ok(());
        }

        if segment.finish {
            let t = self.ctx.clock.now();
            self.finish(FinishReason::FinishMarker, t);
            return Ok(());
        }

        if let Some(spec) = &segment.maneuver {
            let report = match maneuver::perform(&mut self.ctx, spec, self.last_branch) {
                Ok(report) => report,
                Err(e) => {
                    self.ctx.drive.stop();
                    return Err(e);
                }
            };
            if report.branch.is_some() {
                self.last_branch = report.branch;
            }
            self.warnings.extend(report.warnings.iter().cloned());
            let stopped = report.outcome == Outcome::Stopped;
            self.maneuvers.push(ManeuverRecord { segment: self.index, name: segment.name.clone(), report });
            if stopped {
                let t = self.ctx.clock.now();
                self.finish(FinishReason::StopRequested, t);
                return Ok(());
            }
        }

        self.apply_profile();
        self.steering.reset();
        self.ctx.sensors.reset_bar_detector();
        self.ctx.sensors.reset_error_memory();
        self.last_tick = Some(self.ctx.clock.now());
        self.state = SequencerState::Following(self.index);
        Ok(())
    }

    fn apply_profile(&mut self) {
        if let Some(profile) = self.track.segments.get(self.index).and_then(|s| s.profile) {
            debug!(
                "profile: kp={} ki={} kd={} speed={}",
                profile.gains.kp, profile.gains.ki, profile.gains.kd, profile.speed
            );
            self.steering.set_gains(profile.gains);
            self.speed = profile.speed;
        }
    }

    fn finish(&mut self, reason: FinishReason, now: f64) {
        self.ctx.drive.stop();
        self.state = SequencerState::Finished(reason);
        self.finished_at = Some(now);
        self.ctx.note(&format!("run finished: {}", reason));
    }

    fn record(&mut self, now: f64, line_error: f64, event: &'static str) {
        if !self.config.record_trace {
            return;
        }
        let cmd = self.ctx.drive.last_command();
        self.trace.push(TraceRecord {
            time: now,
            segment: self.index,
            state: self.state.label(),
            line_error,
            correction: self.steering.last_correction(),
            left: cmd.left,
            right: cmd.right,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;
    use crate::drive::OpenLoopDrive;
    use crate::hal::{Clock, ManualClock, RecordingMotor, ScriptedSensor, StopFlag};
    use crate::maneuver::{ManeuverKind, ManeuverSpec};
    use crate::sensing::{frame_from, Frame, SensorFrontend};
    use crate::track::segment::SpeedProfile;
    use std::rc::Rc;

    fn line_at(i: usize) -> Frame {
        let mut f = Frame::zeros();
        f[i] = 1.0;
        f
    }

    fn centered() -> Frame {
        frame_from([0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0])
    }

    struct Rig {
        seq: Sequencer,
        sensor: ScriptedSensor,
        motor: RecordingMotor,
        clock: ManualClock,
    }

    fn rig(track: Track, config: SequencerConfig) -> Rig {
        let sensor = ScriptedSensor::default();
        let motor = RecordingMotor::new();
        let clock = ManualClock::new();
        let ctx = NavContext::new(
            SensorFrontend::new(Box::new(sensor.clone()), SensorConfig::default()),
            Box::new(OpenLoopDrive::new(motor.clone())),
            Rc::new(clock.clone()),
        );
        let seq = Sequencer::new(ctx, track, &SteeringConfig::default(), config).unwrap();
        Rig { seq, sensor, motor, clock }
    }

    fn plain(n: usize) -> Track {
        Track::new("plain", (0..n).map(|i| TrackSegment::new(&format!("s{}", i))).collect())
    }

    fn tick_n(r: &mut Rig, n: usize) {
        for _ in 0..n {
            r.seq.tick().unwrap();
            r.clock.advance(0.01);
        }
    }

    #[test]
    fn line_to_the_right_steers_right() {
        let mut r = rig(plain(2), SequencerConfig::default());
        r.sensor.extend([line_at(6)]);
        r.seq.tick().unwrap();
        let (l, rt) = r.motor.last().unwrap();
        assert!(l > rt);
    }

    #[test]
    fn dt_is_clamped_after_a_stall() {
        let mut r = rig(plain(2), SequencerConfig::default());
        r.sensor.push_repeated(line_at(5), 3);
        r.seq.tick().unwrap();
        r.clock.advance(5.0);
        r.seq.tick().unwrap();
        // a 5 s stall integrates at most max_dt worth of error
        let limit = SteeringConfig::default().max_dt * 0.5 + 1e-12;
        assert!(r.seq.steering().pid().integral().abs() <= limit);
    }

    #[test]
    fn last_bar_ends_the_track() {
        let mut r = rig(plain(1), SequencerConfig::default());
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        tick_n(&mut r, 3);
        assert_eq!(r.seq.state(), SequencerState::Finished(FinishReason::EndOfTrack));
        assert_eq!(r.motor.last(), Some((0.0, 0.0)));
    }

    #[test]
    fn transition_forgets_error_memory() {
        let mut r = rig(plain(3), SequencerConfig::default());
        // a bar seen left of centre keeps a negative error until it confirms
        let lopsided_bar = frame_from([1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        r.sensor.extend([line_at(1)]);
        r.sensor.push_repeated(lopsided_bar, 3);
        tick_n(&mut r, 3);
        assert!(r.seq.context().sensors.last_error() < 0.0);

        tick_n(&mut r, 1);
        assert_eq!(r.seq.current_segment(), 1);
        assert_eq!(r.seq.context().sensors.last_error(), 0.0);
    }

    #[test]
    fn finish_segment_stops_on_entry() {
        let track = Track::new("t", vec![TrackSegment::new("a"), TrackSegment::new("end").finish()]);
        let mut r = rig(track, SequencerConfig::default());
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        tick_n(&mut r, 3);
        assert_eq!(r.seq.state(), SequencerState::Finished(FinishReason::FinishMarker));
        assert_eq!(r.seq.current_segment(), 1);
    }

    #[test]
    fn stop_request_halts_immediately() {
        let stop = StopFlag::new();
        let mut r = rig(plain(3), SequencerConfig::default());
        r.seq.context_mut().stop = Box::new(stop.clone());
        r.sensor.extend([centered()]);
        r.seq.tick().unwrap();
        stop.request();
        let state = r.seq.tick().unwrap();
        assert_eq!(state, SequencerState::Finished(FinishReason::StopRequested));
        assert_eq!(r.motor.last(), Some((0.0, 0.0)));
        // further ticks are inert
        let before = r.motor.len();
        r.seq.tick().unwrap();
        assert_eq!(r.motor.len(), before);
    }

    #[test]
    fn heading_lock_holds_correction_with_trims() {
        let config = SequencerConfig { left_trim: 1.1, right_trim: 0.9, ..SequencerConfig::default() };
        let mut r = rig(plain(2), config);
        r.sensor.extend([line_at(1), Frame::zeros()]);
        r.seq.tick().unwrap();
        let c = r.seq.steering().last_correction();
        assert!(c > 0.0);
        r.clock.advance(0.01);
        r.seq.tick().unwrap();
        let speed = r.seq.speed();
        let (l, rt) = r.motor.last().unwrap();
        assert!((l - (speed - c) * 1.1).abs() < 1e-12);
        assert!((rt - (speed + c) * 0.9).abs() < 1e-12);
    }

    #[test]
    fn profile_applies_on_entry() {
        let track = Track::new(
            "t",
            vec![
                TrackSegment::new("a").with_profile(SpeedProfile::straight()),
                TrackSegment::new("b").with_profile(SpeedProfile::serpentine()),
            ],
        );
        let mut r = rig(track, SequencerConfig::default());
        assert_eq!(r.seq.speed(), 0.60);
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        tick_n(&mut r, 3);
        assert_eq!(r.seq.speed(), 0.45);
        assert_eq!(r.seq.steering().pid().gains(), SpeedProfile::serpentine().gains);
    }

    #[test]
    fn fork_branch_is_remembered() {
        let track = Track::new(
            "t",
            vec![
                TrackSegment::new("a"),
                TrackSegment::new("fork").with_maneuver(ManeuverSpec::new(ManeuverKind::Fork).direction("right")),
                TrackSegment::new("c"),
            ],
        );
        let mut r = rig(track, SequencerConfig { record_trace: true, ..SequencerConfig::default() });
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        r.sensor.push_repeated(centered(), 1);
        tick_n(&mut r, 3);
        assert_eq!(r.seq.last_branch(), Some(Branch::Right));
        let summary = r.seq.summary();
        assert_eq!(summary.maneuvers.len(), 1);
        assert_eq!(summary.maneuvers[0].report.branch, Some(Branch::Right));
        assert_eq!(r.seq.trace().last().map(|t| t.event), Some("bar"));
        assert_eq!(r.seq.state(), SequencerState::Following(1));
    }

    #[test]
    fn run_returns_summary() {
        let mut r = rig(plain(2), SequencerConfig::default());
        r.sensor.push_repeated(centered(), 5);
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        r.sensor.push_repeated(centered(), 5);
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        let summary = r.seq.run().unwrap();
        assert_eq!(summary.finish_reason, FinishReason::EndOfTrack);
        assert_eq!(summary.transitions, 2);
        assert!(summary.elapsed > 0.0);
        assert!(r.clock.now() > 0.0);
    }
}
