use std::fmt;

use nalgebra::Point2;

use super::world::Sample;

// ---------------------------------------------------------------------------
// Simulation events
// ---------------------------------------------------------------------------

/// Kinds of simulation events.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    BarCrossed { bar: usize },
    LineLost,
    LineFound,
    OffCourse { distance: f64 },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BarCrossed { bar } => write!(f, "bar {} crossed", bar),
            Self::LineLost => f.write_str("line lost"),
            Self::LineFound => f.write_str("line found"),
            Self::OffCourse { distance } => write!(f, "off course by {:.3} m", distance),
        }
    }
}

/// A discrete event observed in the world.
#[derive(Debug, Clone)]
pub struct SimEvent {
    pub time: f64,
    pub kind: EventKind,
    pub position: Point2<f64>,
}

/// Passive detectors inspect consecutive samples and report events.
pub trait EventDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind>;
}

/// Reports entering a bar.
pub struct BarCrossingDetector;

impl EventDetector for BarCrossingDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind> {
        match (prev.bar, current.bar) {
            (p, Some(bar)) if p != Some(bar) => Some(EventKind::BarCrossed { bar }),
            _ => None,
        }
    }
}

/// Reports the sensor row centre leaving and regaining the line.
pub struct LineContactDetector {
    pub half_width: f64,
}

impl LineContactDetector {
    pub fn new(line_width: f64) -> Self {
        Self { half_width: line_width / 2.0 }
    }
}

impl EventDetector for LineContactDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind> {
        let was = prev.line_distance <= self.half_width || prev.bar.is_some();
        let is = current.line_distance <= self.half_width || current.bar.is_some();
        match (was, is) {
            (true, false) => Some(EventKind::LineLost),
            (false, true) => Some(EventKind::LineFound),
            _ => None,
        }
    }
}

/// Fires once when the vehicle strays further than `limit` from any line.
pub struct OffCourseDetector {
    pub limit: f64,
    fired: bool,
}

impl OffCourseDetector {
    pub fn new(limit: f64) -> Self {
        Self { limit, fired: false }
    }
}

impl EventDetector for OffCourseDetector {
    fn check(&mut self, prev: &Sample, current: &Sample) -> Option<EventKind> {
        if self.fired {
            return None;
        }
        if prev.line_distance <= self.limit && current.line_distance > self.limit {
            self.fired = true;
            Some(EventKind::OffCourse { distance: current.line_distance })
        } else {
            None
        }
    }
}

/// Detectors installed by [`crate::sim::SimRig`].
pub fn default_detectors(line_width: f64) -> Vec<Box<dyn EventDetector>> {
    vec![
        Box::new(BarCrossingDetector),
        Box::new(LineContactDetector::new(line_width)),
        Box::new(OffCourseDetector::new(0.1)),
    ]
}
