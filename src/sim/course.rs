use nalgebra::{Point2, Rotation2, Vector2};

use crate::error::{NavError, Result};

// ---------------------------------------------------------------------------
// Geometry primitives
// ---------------------------------------------------------------------------

/// Position and heading (rad, counter-clockwise from +x).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point2<f64>,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { position: Point2::new(x, y), heading }
    }

    pub fn forward(&self) -> Vector2<f64> {
        Rotation2::new(self.heading) * Vector2::x()
    }

    /// Point at `ahead` along the heading and `left` to the left of it.
    pub fn offset(&self, ahead: f64, left: f64) -> Point2<f64> {
        self.position + Rotation2::new(self.heading) * Vector2::new(ahead, left)
    }
}

/// Straight piece of line centreline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSeg {
    pub a: Point2<f64>,
    pub b: Point2<f64>,
}

impl LineSeg {
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        let ab = self.b - self.a;
        let len2 = ab.norm_squared();
        if len2 < 1e-12 {
            return (p - self.a).norm();
        }
        let t = ((p - self.a).dot(&ab) / len2).clamp(0.0, 1.0);
        (p - (self.a + ab * t)).norm()
    }
}

/// Transverse marker: a dark rectangle across the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub center: Point2<f64>,
    /// Direction of travel across the bar (rad).
    pub heading: f64,
    /// Half extent across the track.
    pub half_length: f64,
    /// Half extent along the track.
    pub half_depth: f64,
}

impl Bar {
    /// Distance outside the rectangle; negative inside.
    pub fn outside_distance(&self, p: &Point2<f64>) -> f64 {
        let local = Rotation2::new(-self.heading) * (p - self.center);
        (local.x.abs() - self.half_depth).max(local.y.abs() - self.half_length)
    }
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

/// Lines and bars on a white floor.
#[derive(Debug, Clone)]
pub struct Course {
    pub name: String,
    pub line_width: f64,
    pub lines: Vec<LineSeg>,
    pub bars: Vec<Bar>,
    pub start: Pose,
}

/// Course names accepted by [`Course::preset`]; they mirror the track presets.
pub const COURSE_NAMES: [&str; 4] = ["straight", "competition", "oval", "fork_loop"];

impl Course {
    /// Distance from `p` to the nearest line centreline.
    pub fn distance_to_line(&self, p: &Point2<f64>) -> f64 {
        self.lines.iter().map(|l| l.distance(p)).fold(f64::INFINITY, f64::min)
    }

    /// Index of the bar under `p`, if any.
    pub fn bar_at(&self, p: &Point2<f64>) -> Option<usize> {
        self.bars.iter().position(|b| b.outside_distance(p) <= 0.0)
    }

    /// Reflectance contrast at `p` in [0, 1]. Edges ramp linearly over
    /// `blur` metres, which stands in for the sensor footprint.
    pub fn darkness(&self, p: &Point2<f64>, blur: f64) -> f64 {
        let line = self.distance_to_line(p) - self.line_width / 2.0;
        let bar = self.bars.iter().map(|b| b.outside_distance(p)).fold(f64::INFINITY, f64::min);
        let d = line.min(bar);
        if blur <= 0.0 {
            return if d <= 0.0 { 1.0 } else { 0.0 };
        }
        (0.5 - d / blur).clamp(0.0, 1.0)
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "straight" => Ok(Self::straight(2.0)),
            "competition" => Ok(Self::competition()),
            "oval" => Ok(Self::oval()),
            "fork_loop" => Ok(Self::fork_loop()),
            other => Err(NavError::invalid(format!(
                "unknown course '{}', expected one of {}",
                other,
                COURSE_NAMES.join(", ")
            ))),
        }
    }

    /// One straight line with a bar at the far end.
    pub fn straight(length: f64) -> Self {
        CourseBuilder::new("straight").start_here().straight(length).bar().straight(0.1).build()
    }

    pub fn competition() -> Self {
        CourseBuilder::new("competition")
            .start_here()
            .straight(0.6)
            .bar()
            .straight(0.06)
            .corner(90.0)
            .straight(0.5)
            .bar()
            .straight(0.6)
            .bar()
            .straight(0.06)
            .branch(-30.0, 0.3)
            .corner(30.0)
            .straight(0.3)
            .corner(-30.0)
            .straight(0.2)
            .bar()
            .serpentine(0.8, 0.04, 2)
            .bar()
            .straight(0.6)
            .bar()
            .straight(0.1)
            .build()
    }

    pub fn oval() -> Self {
        let mut b = CourseBuilder::new("oval").start_here().straight(0.8);
        for _ in 0..4 {
            b = b.bar().straight(0.06).corner(-90.0).straight(0.7);
        }
        b.bar().straight(0.1).build()
    }

    pub fn fork_loop() -> Self {
        CourseBuilder::new("fork_loop")
            .facing(0.0)
            .at(-0.35, 0.0)
            .bar()
            .straight(0.2)
            .bar()
            .straight(0.2)
            .start_here()
            .straight(0.5)
            .bar()
            .straight(0.06)
            .branch(30.0, 0.4)
            .corner(-30.0)
            .straight(0.3)
            .bar()
            .straight(0.08)
            .build()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Turtle-style course construction.
#[derive(Debug, Clone)]
pub struct CourseBuilder {
    name: String,
    pose: Pose,
    line_width: f64,
    lines: Vec<LineSeg>,
    bars: Vec<Bar>,
    start: Option<Pose>,
}

/// Typical electrical tape width (m).
pub const LINE_WIDTH: f64 = 0.019;
const BAR_HALF_LENGTH: f64 = 0.06;
const BAR_HALF_DEPTH: f64 = 0.01;
/// Distance from the axle to the sensor row on the reference vehicle.
const START_SETBACK: f64 = 0.08;

impl CourseBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pose: Pose::new(0.0, 0.0, 0.0),
            line_width: LINE_WIDTH,
            lines: Vec::new(),
            bars: Vec::new(),
            start: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.pose.position = Point2::new(x, y);
        self
    }

    pub fn facing(mut self, degrees: f64) -> Self {
        self.pose.heading = degrees.to_radians();
        self
    }

    /// Put the vehicle here with its sensor row just ahead on the line.
    pub fn start_here(mut self) -> Self {
        let mut start = self.pose;
        start.position = self.pose.offset(-START_SETBACK, 0.0);
        self.lines.push(LineSeg { a: start.position, b: self.pose.position });
        self.start = Some(start);
        self
    }

    pub fn straight(mut self, length: f64) -> Self {
        let a = self.pose.position;
        let b = a + self.pose.forward() * length;
        self.lines.push(LineSeg { a, b });
        self.pose.position = b;
        self
    }

    /// Sharp corner in place; positive turns left.
    pub fn corner(mut self, degrees: f64) -> Self {
        self.pose.heading += degrees.to_radians();
        self
    }

    /// Side line from here without moving along it.
    pub fn branch(mut self, degrees: f64, length: f64) -> Self {
        let mut side = self.pose;
        side.heading += degrees.to_radians();
        let b = side.position + side.forward() * length;
        self.lines.push(LineSeg { a: side.position, b });
        self
    }

    /// Sinusoidal wiggle about the current heading, built from short chords.
    pub fn serpentine(mut self, length: f64, amplitude: f64, waves: u32) -> Self {
        let origin = self.pose;
        let pieces = (waves.max(1) * 24) as usize;
        let mut prev = origin.position;
        for i in 1..=pieces {
            let s = length * i as f64 / pieces as f64;
            let phase = std::f64::consts::TAU * waves as f64 * s / length;
            let p = origin.offset(s, amplitude * phase.sin());
            self.lines.push(LineSeg { a: prev, b: p });
            prev = p;
        }
        self.pose.position = prev;
        self
    }

    pub fn bar(mut self) -> Self {
        self.bars.push(Bar {
            center: self.pose.position,
            heading: self.pose.heading,
            half_length: BAR_HALF_LENGTH,
            half_depth: BAR_HALF_DEPTH,
        });
        self
    }

    pub fn build(self) -> Course {
        let start = self.start.unwrap_or(Pose {
            position: self.lines.first().map_or(Point2::origin(), |l| l.a),
            heading: 0.0,
        });
        Course { name: self.name, line_width: self.line_width, lines: self.lines, bars: self.bars, start }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let l = LineSeg { a: Point2::new(0.0, 0.0), b: Point2::new(1.0, 0.0) };
        assert_relative_eq!(l.distance(&Point2::new(0.5, 0.2)), 0.2, epsilon = 1e-12);
        assert_relative_eq!(l.distance(&Point2::new(-0.3, 0.4)), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn bar_rectangle_follows_heading() {
        let bar = Bar { center: Point2::new(1.0, 1.0), heading: std::f64::consts::FRAC_PI_2, half_length: 0.06, half_depth: 0.01 };
        // travelling +y, so the bar spans x
        assert!(bar.outside_distance(&Point2::new(1.05, 1.0)) < 0.0);
        assert!(bar.outside_distance(&Point2::new(1.0, 1.05)) > 0.0);
    }

    #[test]
    fn darkness_ramps_across_edge() {
        let course = Course::straight(1.0);
        let on = course.darkness(&Point2::new(0.5, 0.0), 0.004);
        let edge = course.darkness(&Point2::new(0.5, LINE_WIDTH / 2.0), 0.004);
        let off = course.darkness(&Point2::new(0.5, 0.05), 0.004);
        assert_eq!(on, 1.0);
        assert_relative_eq!(edge, 0.5, epsilon = 1e-9);
        assert_eq!(off, 0.0);
    }

    #[test]
    fn turtle_corners_turn_left_for_positive_angles() {
        let course = CourseBuilder::new("t").straight(1.0).corner(90.0).straight(1.0).build();
        let end = course.lines.last().unwrap().b;
        assert_relative_eq!(end.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(end.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn presets_have_bars_and_a_start_on_the_line() {
        for name in COURSE_NAMES {
            let course = Course::preset(name).unwrap();
            assert!(!course.bars.is_empty(), "{}", name);
            assert!(course.distance_to_line(&course.start.position) < 1e-9, "{}", name);
        }
        assert!(Course::preset("moon").is_err());
    }

    #[test]
    fn oval_closes_on_itself() {
        let course = Course::oval();
        assert_eq!(course.bars.len(), 5);
        // the last side runs back along the first straight
        let end = course.lines.last().unwrap().b;
        assert!(end.y.abs() < 1e-9);
        assert!(course.distance_to_line(&Point2::new(0.4, 0.0)) < 1e-9);
    }
}
