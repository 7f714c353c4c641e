use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::track::{RunSummary, TraceRecord};

/// Tracking statistics computed from a run trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingStats {
    /// Ticks spent steering on the line.
    pub following_ticks: usize,
    pub gap_ticks: usize,
    pub mean_abs_error: f64,
    pub max_abs_error: f64,
    pub max_abs_correction: f64,
}

impl TrackingStats {
    pub fn from_trace(trace: &[TraceRecord]) -> Self {
        let following: Vec<&TraceRecord> =
            trace.iter().filter(|r| r.state == "following" && r.event.is_empty()).collect();
        let gap_ticks = trace.iter().filter(|r| r.event.starts_with("gap")).count();

        let mean_abs_error = if following.is_empty() {
            0.0
        } else {
            following.iter().map(|r| r.line_error.abs()).sum::<f64>() / following.len() as f64
        };

        TrackingStats {
            following_ticks: following.len(),
            gap_ticks,
            mean_abs_error,
            max_abs_error: following.iter().map(|r| r.line_error.abs()).fold(0.0_f64, f64::max),
            max_abs_correction: following.iter().map(|r| r.correction.abs()).fold(0.0_f64, f64::max),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    run: &'a RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking: Option<&'a TrackingStats>,
}

/// Write the run summary, and tracking stats when a trace was kept, as
/// pretty-printed JSON.
pub fn write_summary<W: Write>(writer: &mut W, summary: &RunSummary, stats: Option<&TrackingStats>) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &Report { run: summary, tracking: stats })?;
    writeln!(writer)?;
    Ok(())
}

/// Write the run summary JSON to a file.
pub fn write_summary_file(path: &str, summary: &RunSummary, stats: Option<&TrackingStats>) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_summary(&mut file, summary, stats)
}
