//! Configuration for the navigation core.
//!
//! Everything is static data supplied at startup. Defaults are the tuned
//! values of the reference vehicle; a TOML file only needs to name what it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::PidGains;
use crate::detect::DebounceConfig;
use crate::error::{NavError, Result};
use crate::sensing::SENSOR_COUNT;
use crate::track::Track;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub sensor: SensorConfig,
    pub steering: SteeringConfig,
    pub drive: DriveConfig,
    pub sequencer: SequencerConfig,
    pub maneuver: ManeuverConfig,
    /// Optional inline track; the binary falls back to a preset.
    pub track: Option<Track>,
}

/// Reflectance classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// A reading at or above this counts as "on the line"
    pub active_level: f64,
    /// Per-sensor level for bar counting
    pub bar_level: f64,
    /// Sensors at `bar_level` needed to call a bar
    pub bar_min_count: usize,
    /// Also require an edge sensor, rejecting tight inner turns
    pub bar_requires_edge: bool,
    /// Frame maximum below this is a gap
    pub gap_threshold: f64,
    /// Exponential smoothing factor for line error, in (0, 1]
    pub ema_alpha: Option<f64>,
    /// Rescale readings through the calibration range
    pub normalize: bool,
    /// Active mass below this means no line
    pub min_denominator: f64,
    pub bar_debounce: DebounceConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            active_level: 0.5,
            bar_level: 0.5,
            bar_min_count: 6,
            bar_requires_edge: false,
            gap_threshold: 0.2,
            ema_alpha: None,
            normalize: false,
            min_denominator: 1e-6,
            bar_debounce: DebounceConfig::default(),
        }
    }
}

/// Line-following loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub gains: PidGains,
    pub integral_limit: Option<f64>,
    /// Cap on the PID correction, avoids snap turns on straights
    pub max_correction: f64,
    /// Speed until a segment profile overrides it
    pub base_speed: f64,
    /// Upper bound on the tick interval fed to the PID (s)
    pub max_dt: f64,
    /// Sleep between ticks (s)
    pub tick_interval: f64,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            gains: PidGains::new(0.8, 0.0, 0.1),
            integral_limit: None,
            max_correction: 0.45,
            base_speed: 0.5,
            max_dt: 0.05,
            tick_interval: 0.001,
        }
    }
}

/// Motor drive and optional wheel-rate regulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub closed_loop: bool,
    pub counts_per_rev: f64,
    /// No pulses for this long forces the rate to zero (s)
    pub idle_timeout: f64,
    /// Wheel rate at full command (rpm)
    pub max_rpm: f64,
    pub wheel_gains: PidGains,
    pub wheel_integral_limit: Option<f64>,
    pub max_dt: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            closed_loop: false,
            counts_per_rev: 12.0,
            idle_timeout: 0.5,
            max_rpm: 300.0,
            wheel_gains: PidGains::new(0.001, 0.002, 0.0),
            wheel_integral_limit: Some(100.0),
            max_dt: 0.05,
        }
    }
}

/// Segment transitions and gap handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Blind forward drive after the start bar (s)
    pub first_clear_time: f64,
    /// Blind forward drive after interior bars (s)
    pub clear_time: f64,
    pub clear_speed: f64,
    /// Standstill after the bar-confirmed stop (s)
    pub transition_pause: f64,
    /// Hold the last steering correction while driving through a gap
    pub heading_lock: bool,
    /// Drivetrain asymmetry compensation for blind driving
    pub left_trim: f64,
    pub right_trim: f64,
    /// Pre-run calibration spin
    pub calibration_time: f64,
    pub calibration_speed: f64,
    /// Keep a per-tick trace in memory
    pub record_trace: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            first_clear_time: 0.2,
            clear_time: 0.1,
            clear_speed: 0.4,
            transition_pause: 0.05,
            heading_lock: true,
            left_trim: 1.0,
            right_trim: 1.0,
            calibration_time: 2.0,
            calibration_speed: 0.3,
            record_trace: false,
        }
    }
}

/// Recovery scan after a failed search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub attempts: u32,
    pub pivot_time: f64,
    pub pivot_speed: f64,
    pub creep_time: f64,
    pub creep_speed: f64,
    /// Search window granted after recovery spots the line (s)
    pub reacquire_timeout: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            pivot_time: 0.15,
            pivot_speed: 0.35,
            creep_time: 0.1,
            creep_speed: 0.3,
            reacquire_timeout: 1.0,
        }
    }
}

/// Maneuver tunables shared by every variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverConfig {
    /// Polling interval inside maneuvers (s)
    pub sample_dt: f64,
    pub base_speed: f64,
    pub turn_speed: f64,
    /// "Mostly white": total activation at or below this
    pub mostly_white_sum: f64,
    /// Consecutive samples to confirm leaving an intersection
    pub clear_samples: u32,
    pub clear_timeout: f64,
    /// Consecutive samples to confirm a centred line
    pub acquire_samples: u32,
    pub acquire_timeout: f64,
    /// |line error| below this counts as centred
    pub center_error: f64,
    /// Active-sensor count range of a single line
    pub line_min_count: usize,
    pub line_max_count: usize,
    /// Standstill between phases (s)
    pub settle_pause: f64,

    /// Start-bar shove before a 90 degree turn
    pub bar_blind_time: f64,
    pub bar_clear_samples: u32,
    pub bar_clear_timeout: f64,

    pub spin_clear_samples: u32,
    pub spin_clear_timeout: f64,

    pub turn180_min_spin: f64,
    pub turn180_timeout: f64,

    /// Straight drive from the junction marker to the split (s)
    pub fork_commit_time: f64,
    /// In-place spin onto a fork arm or back onto the trunk, slow enough
    /// to confirm centring
    pub fork_spin_speed: f64,
    /// Minimum left/right mass difference for a sensor-driven choice
    pub fork_sensor_margin: f64,

    pub align_speed: f64,
    pub align_timeout: f64,

    /// Longest pivot back toward the trunk (s)
    pub recross_pivot_time: f64,
    pub recross_verify_samples: u32,
    pub recross_timeout: f64,

    pub recovery: RecoveryConfig,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            sample_dt: 0.005,
            base_speed: 0.5,
            turn_speed: 0.5,
            mostly_white_sum: 1.0,
            clear_samples: 8,
            clear_timeout: 2.0,
            acquire_samples: 6,
            acquire_timeout: 3.0,
            center_error: 0.25,
            line_min_count: 1,
            line_max_count: 4,
            settle_pause: 0.08,
            bar_blind_time: 0.14,
            bar_clear_samples: 4,
            bar_clear_timeout: 0.8,
            spin_clear_samples: 6,
            spin_clear_timeout: 1.0,
            turn180_min_spin: 0.6,
            turn180_timeout: 4.0,
            fork_commit_time: 0.35,
            fork_spin_speed: 0.3,
            fork_sensor_margin: 0.5,
            align_speed: 0.25,
            align_timeout: 1.0,
            recross_pivot_time: 0.6,
            recross_verify_samples: 3,
            recross_timeout: 1.0,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| NavError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sensor;
        check_unit("sensor.active_level", s.active_level)?;
        check_unit("sensor.bar_level", s.bar_level)?;
        check_unit("sensor.gap_threshold", s.gap_threshold)?;
        if s.bar_min_count == 0 || s.bar_min_count > SENSOR_COUNT {
            return Err(NavError::invalid(format!(
                "sensor.bar_min_count must be in 1..={}, got {}",
                SENSOR_COUNT, s.bar_min_count
            )));
        }
        if let Some(alpha) = s.ema_alpha {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(NavError::invalid(format!("sensor.ema_alpha must be in (0, 1], got {}", alpha)));
            }
        }
        if s.bar_debounce.hits == 0 {
            return Err(NavError::invalid("sensor.bar_debounce.hits must be at least 1"));
        }

        let st = &self.steering;
        check_positive("steering.max_dt", st.max_dt)?;
        check_positive("steering.tick_interval", st.tick_interval)?;
        check_fraction("steering.base_speed", st.base_speed)?;
        if st.max_correction < 0.0 {
            return Err(NavError::invalid("steering.max_correction must be non-negative"));
        }

        let d = &self.drive;
        check_positive("drive.counts_per_rev", d.counts_per_rev)?;
        check_positive("drive.max_rpm", d.max_rpm)?;
        check_positive("drive.idle_timeout", d.idle_timeout)?;

        let q = &self.sequencer;
        check_fraction("sequencer.clear_speed", q.clear_speed)?;
        if q.left_trim <= 0.0 || q.right_trim <= 0.0 {
            return Err(NavError::invalid("sequencer trims must be positive"));
        }

        let m = &self.maneuver;
        check_positive("maneuver.sample_dt", m.sample_dt)?;
        check_fraction("maneuver.base_speed", m.base_speed)?;
        check_fraction("maneuver.turn_speed", m.turn_speed)?;
        check_fraction("maneuver.fork_spin_speed", m.fork_spin_speed)?;
        if m.line_min_count > m.line_max_count {
            return Err(NavError::invalid("maneuver.line_min_count exceeds line_max_count"));
        }

        if let Some(track) = &self.track {
            track.validate()?;
        }
        Ok(())
    }
}

fn check_unit(name: &str, v: f64) -> Result<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(NavError::invalid(format!("{} must be in [0, 1], got {}", name, v)))
    }
}

fn check_fraction(name: &str, v: f64) -> Result<()> {
    if (-1.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(NavError::invalid(format!("{} must be in [-1, 1], got {}", name, v)))
    }
}

fn check_positive(name: &str, v: f64) -> Result<()> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(NavError::invalid(format!("{} must be positive, got {}", name, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        NavConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = NavConfig::from_toml(
            r#"
            [sensor]
            bar_min_count = 5

            [sensor.bar_debounce]
            policy = "leaky_bucket"
            hits = 4

            [steering.gains]
            kp = 0.85
            kd = 0.12
            "#,
        )
        .unwrap();
        assert_eq!(config.sensor.bar_min_count, 5);
        assert_eq!(config.sensor.bar_debounce.hits, 4);
        assert_eq!(config.steering.gains.ki, 0.0);
        assert_eq!(config.steering.max_correction, 0.45);
        assert_eq!(config.maneuver.acquire_samples, 6);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = NavConfig::default();
        config.sensor.bar_min_count = 9;
        assert!(matches!(config.validate(), Err(NavError::InvalidConfig(_))));

        let mut config = NavConfig::default();
        config.sensor.ema_alpha = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = NavConfig::default();
        config.maneuver.sample_dt = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = NavConfig::from_toml("[sensor\nbar_min_count = ").unwrap_err();
        assert!(matches!(err, NavError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = NavConfig::load(Path::new("/nonexistent/line-nav.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/line-nav.toml"));
    }
}
