//! Simulated vehicle and course, wired into the same ports as hardware.

pub mod course;
pub mod event;
pub mod integrator;
pub mod ports;
pub mod world;

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

pub use course::{Course, CourseBuilder, Pose, COURSE_NAMES};
pub use event::{EventDetector, EventKind, SimEvent};
pub use integrator::rk4_step;
pub use ports::{SharedWorld, SimClock, SimEncoder, SimMotor, SimSensor, Wheel};
pub use world::{Sample, SimWorld, VehicleParams};

use crate::config::NavConfig;
use crate::context::NavContext;
use crate::drive::{ClosedLoopDrive, Drive, OpenLoopDrive};
use crate::error::Result;
use crate::hal::{AnyStop, Clock, Deadline, StopSignal};
use crate::sensing::SensorFrontend;
use crate::telemetry::LogTelemetry;
use crate::track::{RunSummary, Sequencer, Track, TraceRecord};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub params: VehicleParams,
    /// RNG seed for sensor noise and random forks; 0 means entropy.
    pub seed: u64,
    /// Simulated time limit (s).
    pub duration: f64,
    /// History sampling interval (s).
    pub sample_interval: f64,
    /// Spin-calibrate before starting.
    pub calibrate: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self { params: VehicleParams::default(), seed: 1, duration: 60.0, sample_interval: 0.01, calibrate: false }
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

/// A sequencer driving a simulated world.
pub struct SimRig {
    pub world: SharedWorld,
    pub sequencer: Sequencer,
}

impl SimRig {
    pub fn new(config: &NavConfig, track: Track, course: Course, options: &SimOptions) -> Result<Self> {
        Self::with_stop(config, track, course, options, None)
    }

    /// Like [`Self::new`], also stopping when `extra` asks to.
    pub fn with_stop(
        config: &NavConfig,
        track: Track,
        course: Course,
        options: &SimOptions,
        extra: Option<Box<dyn StopSignal>>,
    ) -> Result<Self> {
        config.validate()?;
        let mut world = SimWorld::new(course, options.params, options.seed).with_sample_interval(options.sample_interval);
        for det in event::default_detectors(world.course().line_width) {
            world.add_detector(det);
        }
        let world: SharedWorld = Rc::new(RefCell::new(world));
        let clock: Rc<dyn Clock> = Rc::new(SimClock(world.clone()));

        let drive: Box<dyn Drive> = if config.drive.closed_loop {
            Box::new(ClosedLoopDrive::new(
                SimMotor(world.clone()),
                Box::new(SimEncoder::new(world.clone(), Wheel::Left)),
                Box::new(SimEncoder::new(world.clone(), Wheel::Right)),
                clock.clone(),
                &config.drive,
            ))
        } else {
            Box::new(OpenLoopDrive::new(SimMotor(world.clone())))
        };

        let mut stop = AnyStop::new().with(Box::new(Deadline::after(clock.clone(), options.duration)));
        if let Some(extra) = extra {
            stop = stop.with(extra);
        }

        let sensors = SensorFrontend::new(Box::new(SimSensor(world.clone())), config.sensor.clone());
        let ctx = NavContext::new(sensors, drive, clock)
            .with_telemetry(Box::new(LogTelemetry))
            .with_stop(Box::new(stop))
            .with_seed(options.seed)
            .with_maneuver_config(config.maneuver.clone());

        let mut sequencer = Sequencer::new(ctx, track, &config.steering, config.sequencer.clone())?;
        if options.calibrate {
            sequencer.calibrate();
        }
        Ok(Self { world, sequencer })
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.sequencer.run()
    }
}

// ---------------------------------------------------------------------------
// One-shot run
// ---------------------------------------------------------------------------

/// Everything a finished simulated run leaves behind.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    pub summary: RunSummary,
    pub trace: Vec<TraceRecord>,
    pub history: Vec<Sample>,
    pub events: Vec<SimEvent>,
    pub final_pose: Pose,
}

/// Build a rig, run it to completion and collect the results.
pub fn simulate(config: &NavConfig, track: Track, course: Course, options: &SimOptions) -> Result<SimOutcome> {
    let mut rig = SimRig::new(config, track, course, options)?;
    let summary = rig.run()?;
    Ok(collect(rig, summary))
}

/// Gather the results of a rig that has finished running.
pub fn collect(rig: SimRig, summary: RunSummary) -> SimOutcome {
    let world = rig.world.borrow();
    info!("simulation ended at t={:.2}s with {} events", world.time(), world.events().len());
    SimOutcome {
        summary,
        trace: rig.sequencer.trace().to_vec(),
        history: world.history().to_vec(),
        events: world.events().to_vec(),
        final_pose: world.pose(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
