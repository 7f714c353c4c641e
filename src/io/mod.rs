//! Run trace CSV and summary JSON output.

pub mod csv;
pub mod json;

pub use csv::{write_path, write_path_file, write_trace, write_trace_file};
pub use json::{write_summary, write_summary_file, TrackingStats};
