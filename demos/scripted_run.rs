use std::rc::Rc;

use line_nav::config::{SensorConfig, SequencerConfig, SteeringConfig};
use line_nav::drive::OpenLoopDrive;
use line_nav::hal::{ManualClock, RecordingMotor, ScriptedSensor};
use line_nav::sensing::{frame_from, Frame, SensorFrontend};
use line_nav::telemetry::BufferTelemetry;
use line_nav::track::{GapPolicy, SpeedProfile};
use line_nav::{NavContext, Sequencer, Track, TrackSegment};

/// Drives the sequencer from a canned sensor script with no hardware and no
/// physics: every read pops the next frame and every sleep advances a
/// manual clock.
fn main() -> line_nav::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("line_nav=info")).init();

    let centre = frame_from([0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    let drift_right = frame_from([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    let bar = Frame::repeat(1.0);
    let white = Frame::zeros();

    let sensor = ScriptedSensor::default();
    sensor.push_repeated(centre, 50);
    sensor.push_repeated(drift_right, 30);
    sensor.push_repeated(centre, 20);
    sensor.push_repeated(bar, 4);
    sensor.push_repeated(white, 60); // bar clear runs blind; these are read after it
    sensor.push_repeated(centre, 40);
    sensor.push_repeated(bar, 4);

    let motor = RecordingMotor::new();
    let clock = ManualClock::new();
    let telemetry = BufferTelemetry::new();

    let ctx = NavContext::new(
        SensorFrontend::new(Box::new(sensor.clone()), SensorConfig::default()),
        Box::new(OpenLoopDrive::new(motor.clone())),
        Rc::new(clock.clone()),
    )
    .with_telemetry(Box::new(telemetry.clone()))
    .with_seed(42);

    let track = Track::new(
        "scripted",
        vec![
            TrackSegment::new("approach").with_profile(SpeedProfile::straight()),
            TrackSegment::new("blind_section")
                .with_gap_policy(GapPolicy::DriveThrough)
                .with_profile(SpeedProfile::serpentine()),
            TrackSegment::new("finish").finish(),
        ],
    );

    let config = SequencerConfig { record_trace: true, ..SequencerConfig::default() };
    let mut seq = Sequencer::new(ctx, track, &SteeringConfig::default(), config)?;
    let summary = seq.run()?;

    println!("Finished: {} after {:.3} s ({} ticks)", summary.finish_reason, summary.elapsed, summary.ticks);
    println!("Sensor reads: {}   motor commands: {}", sensor.reads(), motor.len());
    if let Some((l, r)) = motor.last() {
        println!("Last command: left={:.2} right={:.2}", l, r);
    }

    let gap_ticks = seq.trace().iter().filter(|t| t.event == "gap").count();
    let steer_right = seq.trace().iter().filter(|t| t.left > t.right).count();
    println!("Gap ticks: {}   ticks steering right: {}", gap_ticks, steer_right);

    println!("Telemetry:");
    for m in telemetry.messages() {
        println!("  {}", m);
    }
    Ok(())
}
