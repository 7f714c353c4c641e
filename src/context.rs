//! Everything a control loop touches, owned in one place and passed by
//! `&mut` into the sequencer and maneuvers.

use std::rc::Rc;

use log::{info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::ManeuverConfig;
use crate::control::WheelCommand;
use crate::detect::stable::{stable, MIN_SAMPLE_INTERVAL};
use crate::drive::Drive;
use crate::hal::{Clock, NeverStop, StopSignal};
use crate::sensing::SensorFrontend;
use crate::telemetry::{NullTelemetry, Telemetry};

/// Seeded generator; seed 0 draws from OS entropy.
pub fn seeded_rng(seed: u64) -> SmallRng {
    if seed == 0 {
        SmallRng::from_entropy()
    } else {
        SmallRng::seed_from_u64(seed)
    }
}

pub struct NavContext {
    pub sensors: SensorFrontend,
    pub drive: Box<dyn Drive>,
    pub clock: Rc<dyn Clock>,
    pub telemetry: Box<dyn Telemetry>,
    pub stop: Box<dyn StopSignal>,
    pub rng: SmallRng,
    pub maneuver: ManeuverConfig,
}

impl NavContext {
    /// Context with no telemetry, no stop input, an entropy-seeded RNG and
    /// default maneuver tuning.
    pub fn new(sensors: SensorFrontend, drive: Box<dyn Drive>, clock: Rc<dyn Clock>) -> Self {
        Self {
            sensors,
            drive,
            clock,
            telemetry: Box::new(NullTelemetry),
            stop: Box::new(NeverStop),
            rng: seeded_rng(0),
            maneuver: ManeuverConfig::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Box<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_stop(mut self, stop: Box<dyn StopSignal>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded_rng(seed);
        self
    }

    pub fn with_maneuver_config(mut self, config: ManeuverConfig) -> Self {
        self.maneuver = config;
        self
    }

    pub fn stop_requested(&mut self) -> bool {
        self.stop.stop_requested()
    }

    /// Degraded-but-continuing condition: logged and telemetered.
    pub fn warn(&mut self, message: &str) {
        warn!("{}", message);
        self.telemetry.send(&format!("WARN: {}", message));
    }

    pub fn note(&mut self, message: &str) {
        info!("{}", message);
        self.telemetry.send(message);
    }

    /// Spin in place for `duration` seconds, half each way, sampling the
    /// array so the calibration range covers both line and floor.
    /// Returns the number of frames observed.
    pub fn calibrate(&mut self, duration: f64, speed: f64) -> usize {
        let interval = self.maneuver.sample_dt.max(MIN_SAMPLE_INTERVAL);
        let start = self.clock.now();
        let half = duration / 2.0;
        let mut frames = 0;

        loop {
            if self.stop_requested() {
                break;
            }
            let elapsed = self.clock.now() - start;
            if elapsed >= duration {
                break;
            }
            let spin = if elapsed < half { speed } else { -speed };
            self.drive.command(WheelCommand::spin(spin));
            self.sensors.read_calibrated();
            frames += 1;
            self.clock.sleep(interval);
        }

        self.drive.stop();
        if !self.stop_requested() && !self.line_settles() {
            self.warn("calibration ended off the line");
        }
        let cal = self.sensors.calibration();
        info!(
            "calibration: {} frames, complete={}",
            cal.samples(),
            cal.is_complete()
        );
        frames
    }

    /// Standing still, wait for the array to report the line for the usual
    /// acquire count.
    fn line_settles(&mut self) -> bool {
        let clock = Rc::clone(&self.clock);
        let (interval, hits, timeout) =
            (self.maneuver.sample_dt, self.maneuver.acquire_samples, self.maneuver.acquire_timeout);
        let sensors = &mut self.sensors;
        stable(clock.as_ref(), interval, hits, timeout, || {
            let frame = sensors.read_calibrated();
            sensors.sees_line(&frame)
        })
    }
}
