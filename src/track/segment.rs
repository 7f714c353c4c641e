use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::PidGains;
use crate::error::{NavError, Result};
use crate::maneuver::{ManeuverKind, ManeuverSpec};

// ---------------------------------------------------------------------------
// Segment descriptor
// ---------------------------------------------------------------------------

/// What to do when the line disappears inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Keep driving on the last heading.
    #[default]
    DriveThrough,
    /// Safety stop until the line returns.
    Stop,
}

/// Steering gains and cruise speed for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub gains: PidGains,
    pub speed: f64,
}

impl SpeedProfile {
    pub fn new(kp: f64, ki: f64, kd: f64, speed: f64) -> Self {
        Self { gains: PidGains::new(kp, ki, kd), speed }
    }

    /// Tight wiggles: soft gains, slower.
    pub fn serpentine() -> Self {
        Self::new(0.4, 0.01, 0.055, 0.45)
    }

    /// Long straights: stiff proportional, faster.
    pub fn straight() -> Self {
        Self::new(0.85, 0.0, 0.12, 0.60)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub name: String,
    /// Run on entering the segment.
    #[serde(default)]
    pub maneuver: Option<ManeuverSpec>,
    #[serde(default)]
    pub gap_policy: GapPolicy,
    /// Keeps the previous segment's profile when absent.
    #[serde(default)]
    pub profile: Option<SpeedProfile>,
    /// Entering this segment ends the run.
    #[serde(default)]
    pub finish: bool,
}

impl TrackSegment {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), maneuver: None, gap_policy: GapPolicy::default(), profile: None, finish: false }
    }

    pub fn with_maneuver(mut self, spec: ManeuverSpec) -> Self {
        self.maneuver = Some(spec);
        self
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn with_profile(mut self, profile: SpeedProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn finish(mut self) -> Self {
        self.finish = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// Ordered segment list, traversed by index and fixed for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub segments: Vec<TrackSegment>,
}

/// Names accepted by [`Track::preset`].
pub const PRESET_NAMES: [&str; 3] = ["competition", "oval", "fork_loop"];

impl Track {
    pub fn new(name: &str, segments: Vec<TrackSegment>) -> Self {
        Self { name: name.to_string(), segments }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| NavError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let track: Track = toml::from_str(content)?;
        track.validate()?;
        Ok(track)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve every maneuver and check every profile, so a defective
    /// track is rejected before the vehicle moves.
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(NavError::invalid(format!("track '{}' has no segments", self.name)));
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if let Some(spec) = &seg.maneuver {
                spec.resolve().map_err(|e| {
                    let detail = match e {
                        NavError::InvalidConfig(msg) => msg,
                        other => other.to_string(),
                    };
                    NavError::invalid(format!("segment {} '{}': {}", i, seg.name, detail))
                })?;
            }
            if let Some(p) = &seg.profile {
                if !(-1.0..=1.0).contains(&p.speed) {
                    return Err(NavError::invalid(format!(
                        "segment {} '{}': speed {} outside [-1, 1]",
                        i, seg.name, p.speed
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "competition" => Ok(Self::competition()),
            "oval" => Ok(Self::oval()),
            "fork_loop" => Ok(Self::fork_loop()),
            other => Err(NavError::invalid(format!(
                "unknown track preset '{}', expected one of {}",
                other,
                PRESET_NAMES.join(", ")
            ))),
        }
    }

    /// Straight, left T-turn, straight, fork, serpentine, straight, finish.
    pub fn competition() -> Self {
        Self::new(
            "competition",
            vec![
                TrackSegment::new("start").with_profile(SpeedProfile::straight()),
                TrackSegment::new("t_turn")
                    .with_maneuver(ManeuverSpec::new(ManeuverKind::Turn90).direction("left")),
                TrackSegment::new("straight").with_profile(SpeedProfile::straight()),
                TrackSegment::new("fork").with_maneuver(ManeuverSpec::new(ManeuverKind::Fork).direction("left")),
                TrackSegment::new("serpentine").with_profile(SpeedProfile::serpentine()),
                TrackSegment::new("home_straight")
                    .with_profile(SpeedProfile::straight())
                    .with_gap_policy(GapPolicy::Stop),
                TrackSegment::new("finish").finish(),
            ],
        )
    }

    /// A loop of four right-angle corners.
    pub fn oval() -> Self {
        let corner = |name: &str| {
            TrackSegment::new(name).with_maneuver(ManeuverSpec::new(ManeuverKind::Turn90).direction("right"))
        };
        Self::new(
            "oval",
            vec![
                TrackSegment::new("start").with_profile(SpeedProfile::straight()),
                corner("corner_1"),
                corner("corner_2"),
                corner("corner_3"),
                corner("corner_4"),
                TrackSegment::new("finish").finish(),
            ],
        )
    }

    /// Take a fork branch to a dead end, come back, and re-enter the trunk.
    pub fn fork_loop() -> Self {
        Self::new(
            "fork_loop",
            vec![
                TrackSegment::new("trunk").with_profile(SpeedProfile::straight()),
                TrackSegment::new("branch").with_maneuver(ManeuverSpec::new(ManeuverKind::Fork).direction("right")),
                TrackSegment::new("dead_end")
                    .with_maneuver(ManeuverSpec::new(ManeuverKind::Turn180).direction("auto"))
                    .with_profile(SpeedProfile::serpentine()),
                TrackSegment::new("rejoin").with_maneuver(ManeuverSpec::new(ManeuverKind::Recross)),
                TrackSegment::new("square_up")
                    .with_maneuver(ManeuverSpec::new(ManeuverKind::Align))
                    .with_profile(SpeedProfile::straight()),
                TrackSegment::new("finish").finish(),
            ],
        )
    }
}
