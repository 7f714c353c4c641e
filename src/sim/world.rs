use log::debug;
use nalgebra::Point2;
use rand::rngs::SmallRng;
use rand::Rng;

use super::course::{Course, Pose};
use super::event::{EventDetector, SimEvent};
use super::integrator::{rk4_step, BodyState};
use crate::context::seeded_rng;
use crate::sensing::{Frame, SENSOR_COUNT};

// ---------------------------------------------------------------------------
// Vehicle parameters
// ---------------------------------------------------------------------------

/// Physical description of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParams {
    /// Distance between the wheels (m).
    pub track_width: f64,
    /// Ground speed at full duty (m/s).
    pub max_wheel_speed: f64,
    /// First-order motor time constant (s).
    pub motor_tau: f64,
    /// Multiplicative gain on each side; unequal values model drivetrain asymmetry.
    pub left_gain: f64,
    pub right_gain: f64,
    /// Sensor row distance ahead of the axle (m).
    pub sensor_ahead: f64,
    /// Lateral spacing between adjacent sensors (m).
    pub sensor_spacing: f64,
    /// Edge blur of a reading (m).
    pub blur: f64,
    pub wheel_circumference: f64,
    pub counts_per_rev: f64,
    /// Probability that a sensor reads inverted on a given sample.
    pub flip_noise: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            track_width: 0.10,
            max_wheel_speed: 0.5,
            motor_tau: 0.05,
            left_gain: 1.0,
            right_gain: 0.97,
            sensor_ahead: 0.06,
            sensor_spacing: 0.01,
            blur: 0.004,
            // 0.5 m/s over a 0.1 m wheel is 300 rpm
            wheel_circumference: 0.1,
            counts_per_rev: 12.0,
            flip_noise: 0.0,
        }
    }
}

/// Recorded vehicle state, taken every `sample_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub position: Point2<f64>,
    pub heading: f64,
    /// Duty command in force.
    pub command: (f64, f64),
    /// Distance from the sensor row centre to the nearest line centreline.
    pub line_distance: f64,
    /// Bar under the sensor row centre.
    pub bar: Option<usize>,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Substep ceiling used by [`SimWorld::advance`].
pub const MAX_SUBSTEP: f64 = 0.001;

/// Kinematic differential-drive vehicle on a [`Course`].
pub struct SimWorld {
    course: Course,
    params: VehicleParams,
    body: BodyState,
    time: f64,
    command: (f64, f64),
    wheel_speed: (f64, f64),
    wheel_travel: (f64, f64),
    rng: SmallRng,
    sample_interval: f64,
    next_sample: f64,
    history: Vec<Sample>,
    detectors: Vec<Box<dyn EventDetector>>,
    events: Vec<SimEvent>,
}

impl SimWorld {
    pub fn new(course: Course, params: VehicleParams, seed: u64) -> Self {
        let start = course.start;
        let mut world = Self {
            course,
            params,
            body: BodyState { position: start.position, heading: start.heading },
            time: 0.0,
            command: (0.0, 0.0),
            wheel_speed: (0.0, 0.0),
            wheel_travel: (0.0, 0.0),
            rng: seeded_rng(seed),
            sample_interval: 0.01,
            next_sample: 0.0,
            history: Vec::new(),
            detectors: Vec::new(),
            events: Vec::new(),
        };
        world.record();
        world
    }

    pub fn with_sample_interval(mut self, interval: f64) -> Self {
        self.sample_interval = interval.max(MAX_SUBSTEP);
        self
    }

    pub fn add_detector(&mut self, detector: Box<dyn EventDetector>) {
        self.detectors.push(detector);
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn pose(&self) -> Pose {
        Pose { position: self.body.position, heading: self.body.heading }
    }

    pub fn command(&self) -> (f64, f64) {
        self.command
    }

    pub fn wheel_speeds(&self) -> (f64, f64) {
        self.wheel_speed
    }

    pub fn history(&self) -> &[Sample] {
        &self.history
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Duty fractions, clamped to [-1, 1].
    pub fn set_command(&mut self, left: f64, right: f64) {
        self.command = (left.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0));
    }

    /// Encoder pulse counts. Single-channel encoders count in both directions.
    pub fn pulses(&self) -> (u64, u64) {
        let per_metre = self.params.counts_per_rev / self.params.wheel_circumference;
        ((self.wheel_travel.0 * per_metre) as u64, (self.wheel_travel.1 * per_metre) as u64)
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// One integration step of `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let p = &self.params;
        let alpha = if p.motor_tau > 0.0 { 1.0 - (-dt / p.motor_tau).exp() } else { 1.0 };
        let target_l = self.command.0 * p.max_wheel_speed * p.left_gain;
        let target_r = self.command.1 * p.max_wheel_speed * p.right_gain;
        let (l0, r0) = self.wheel_speed;
        let l = l0 + (target_l - l0) * alpha;
        let r = r0 + (target_r - r0) * alpha;

        self.body = rk4_step(&self.body, 0.5 * (l0 + l), 0.5 * (r0 + r), p.track_width, dt);
        self.wheel_travel.0 += 0.5 * (l0 + l).abs() * dt;
        self.wheel_travel.1 += 0.5 * (r0 + r).abs() * dt;
        self.wheel_speed = (l, r);
        self.time += dt;

        if self.time + 1e-12 >= self.next_sample {
            self.record();
        }
    }

    /// Advance by `duration` in substeps no longer than [`MAX_SUBSTEP`].
    pub fn advance(&mut self, duration: f64) {
        let mut remaining = duration;
        while remaining > 1e-12 {
            let h = remaining.min(MAX_SUBSTEP);
            self.step(h);
            remaining -= h;
        }
    }

    fn record(&mut self) {
        let row = self.pose().offset(self.params.sensor_ahead, 0.0);
        let sample = Sample {
            time: self.time,
            position: self.body.position,
            heading: self.body.heading,
            command: self.command,
            line_distance: self.course.distance_to_line(&row),
            bar: self.course.bar_at(&row),
        };
        if let Some(prev) = self.history.last().copied() {
            for det in self.detectors.iter_mut() {
                if let Some(kind) = det.check(&prev, &sample) {
                    debug!("sim event at t={:.3}: {}", sample.time, kind);
                    self.events.push(SimEvent { time: sample.time, kind, position: sample.position });
                }
            }
        }
        self.history.push(sample);
        self.next_sample = self.time + self.sample_interval;
    }

    // -----------------------------------------------------------------------
    // Sensing
    // -----------------------------------------------------------------------

    /// Sensor positions, leftmost first.
    pub fn sensor_positions(&self) -> [Point2<f64>; SENSOR_COUNT] {
        let pose = self.pose();
        let centre = (SENSOR_COUNT as f64 - 1.0) / 2.0;
        std::array::from_fn(|i| pose.offset(self.params.sensor_ahead, (centre - i as f64) * self.params.sensor_spacing))
    }

    pub fn read_frame(&mut self) -> Frame {
        let positions = self.sensor_positions();
        let mut frame = Frame::zeros();
        for (i, p) in positions.iter().enumerate() {
            let mut v = self.course.darkness(p, self.params.blur);
            if self.params.flip_noise > 0.0 && self.rng.gen::<f64>() < self.params.flip_noise {
                v = 1.0 - v;
            }
            frame[i] = v;
        }
        frame
    }
}
