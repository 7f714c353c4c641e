use std::rc::Rc;

use line_nav::config::{SensorConfig, SequencerConfig, SteeringConfig};
use line_nav::drive::OpenLoopDrive;
use line_nav::hal::{ManualClock, RecordingMotor, ScriptedSensor};
use line_nav::maneuver::{self, ManeuverKind, ManeuverSpec};
use line_nav::sensing::{frame_from, Frame, SensorFrontend};
use line_nav::track::{GapPolicy, SequencerState};
use line_nav::{NavContext, NavError, Sequencer, Track, TrackSegment};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Bench {
    sensor: ScriptedSensor,
    motor: RecordingMotor,
    clock: ManualClock,
}

impl Bench {
    fn new() -> Self {
        Self { sensor: ScriptedSensor::default(), motor: RecordingMotor::new(), clock: ManualClock::new() }
    }

    fn context(&self) -> NavContext {
        NavContext::new(
            SensorFrontend::new(Box::new(self.sensor.clone()), SensorConfig::default()),
            Box::new(OpenLoopDrive::new(self.motor.clone())),
            Rc::new(self.clock.clone()),
        )
        .with_seed(3)
    }

    fn sequencer(&self, track: Track) -> line_nav::Result<Sequencer> {
        Sequencer::new(self.context(), track, &SteeringConfig::default(), SequencerConfig::default())
    }
}

fn centered() -> Frame {
    frame_from([0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0])
}

fn off_centre() -> Frame {
    frame_from([0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0])
}

fn bar() -> Frame {
    Frame::from_element(1.0)
}

fn plain(n: usize) -> Track {
    Track::new("plain", (0..n).map(|i| TrackSegment::new(&format!("seg{}", i))).collect())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn sustained_bar_advances_exactly_once() {
    let bench = Bench::new();
    let mut seq = bench.sequencer(plain(3)).unwrap();

    bench.sensor.push_repeated(off_centre(), 5);
    bench.sensor.push_repeated(bar(), 4);
    bench.sensor.push_repeated(centered(), 10);

    for _ in 0..5 {
        seq.tick().unwrap();
        bench.clock.advance(0.001);
    }
    assert!(!seq.steering().pid().is_fresh());

    // two bar frames build the debounce count
    for _ in 0..2 {
        seq.tick().unwrap();
        bench.clock.advance(0.001);
    }
    assert_eq!(seq.current_segment(), 0);

    let before = bench.motor.len();
    seq.tick().unwrap();
    assert_eq!(seq.current_segment(), 1);
    assert_eq!(seq.state(), SequencerState::Following(1));
    assert!(seq.steering().pid().is_fresh());
    assert_eq!(bench.motor.commands()[before], (0.0, 0.0));

    // the fourth bar frame and the line after it do not advance again
    for _ in 0..6 {
        bench.clock.advance(0.001);
        seq.tick().unwrap();
    }
    assert_eq!(seq.current_segment(), 1);
    assert_eq!(seq.transitions(), 1);
}

#[test]
fn invalid_fork_direction_is_rejected_before_motion() {
    let bench = Bench::new();
    let track = Track::new(
        "bad",
        vec![
            TrackSegment::new("start"),
            TrackSegment::new("fork").with_maneuver(ManeuverSpec::new(ManeuverKind::Fork).direction("up")),
        ],
    );
    let err = bench.sequencer(track).err().unwrap();
    assert!(matches!(err, NavError::InvalidConfig(_)));
    assert!(err.is_config_error());
    assert!(bench.motor.is_empty());

    let mut ctx = bench.context();
    let spec = ManeuverSpec::new(ManeuverKind::Fork).direction("diagonal");
    let err = maneuver::perform(&mut ctx, &spec, None).unwrap_err();
    assert!(matches!(err, NavError::InvalidConfig(_)));
    assert!(bench.motor.is_empty());
}

#[test]
fn invalid_track_file_is_rejected() {
    let err = Track::from_toml(
        r#"
        name = "typo"

        [[segments]]
        name = "start"

        [[segments]]
        name = "split"
        maneuver = { kind = "fork", direction = "lefft" }
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("segment 1 'split'"));
}

#[test]
fn gap_on_stop_segment_commands_exact_zero() {
    let bench = Bench::new();
    let track = Track::new(
        "stopping",
        vec![TrackSegment::new("careful").with_gap_policy(GapPolicy::Stop), TrackSegment::new("end")],
    );
    let mut seq = bench.sequencer(track).unwrap();
    bench.sensor.extend([off_centre(), Frame::zeros()]);

    seq.tick().unwrap();
    let (l, r) = bench.motor.last().unwrap();
    assert!(l != r);

    bench.clock.advance(0.001);
    seq.tick().unwrap();
    assert_eq!(bench.motor.last(), Some((0.0, 0.0)));
    assert_eq!(seq.state(), SequencerState::Following(0));
}

#[test]
fn gap_on_drive_through_segment_keeps_moving() {
    let bench = Bench::new();
    let mut seq = bench.sequencer(plain(2)).unwrap();
    bench.sensor.extend([centered(), Frame::zeros()]);

    seq.tick().unwrap();
    bench.clock.advance(0.001);
    seq.tick().unwrap();
    let (l, r) = bench.motor.last().unwrap();
    assert!(l > 0.0 && r > 0.0);
}
