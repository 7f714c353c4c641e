//! Navigation core for a line-following vehicle.
//!
//! An eight-channel reflectance array feeds a PID steering loop. Transverse
//! bars mark segment boundaries; at each one the [`track::Sequencer`] runs
//! the next segment's maneuver and switches speed profile. Hardware plugs in
//! through the [`hal`] traits, and [`sim`] provides a simulated vehicle that
//! implements the same ports.

pub mod config;
pub mod context;
pub mod control;
pub mod detect;
pub mod drive;
pub mod error;
pub mod hal;
pub mod io;
pub mod maneuver;
pub mod sensing;
pub mod sim;
pub mod telemetry;
pub mod track;

pub use config::NavConfig;
pub use context::NavContext;
pub use error::{NavError, Result};
pub use maneuver::{ManeuverKind, ManeuverReport, ManeuverSpec};
pub use track::{FinishReason, RunSummary, Sequencer, Track, TrackSegment};
