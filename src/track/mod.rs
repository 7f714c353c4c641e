//! Track description and the top-level sequencer.

pub mod segment;
pub mod sequencer;

pub use segment::{GapPolicy, SpeedProfile, Track, TrackSegment, PRESET_NAMES};
pub use sequencer::{FinishReason, ManeuverRecord, RunSummary, Sequencer, SequencerState, TraceRecord};
