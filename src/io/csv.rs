use std::io::{self, Write};

use crate::sim::Sample;
use crate::track::TraceRecord;

/// Write a run trace in CSV format.
///
/// Columns: time, segment, state, line_error, correction, left, right, event
pub fn write_trace<W: Write>(writer: &mut W, trace: &[TraceRecord]) -> io::Result<()> {
    writeln!(writer, "time,segment,state,line_error,correction,left,right,event")?;

    for r in trace {
        writeln!(
            writer,
            "{:.4},{},{},{:.4},{:.4},{:.4},{:.4},{}",
            r.time, r.segment, r.state, r.line_error, r.correction, r.left, r.right, r.event,
        )?;
    }

    Ok(())
}

/// Write a run trace to a CSV file at the given path.
pub fn write_trace_file(path: &str, trace: &[TraceRecord]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_trace(&mut file, trace)
}

/// Write the simulated vehicle path.
///
/// Columns: time, x, y, heading_deg, cmd_left, cmd_right, line_distance, bar
pub fn write_path<W: Write>(writer: &mut W, history: &[Sample]) -> io::Result<()> {
    writeln!(writer, "time,x,y,heading_deg,cmd_left,cmd_right,line_distance,bar")?;

    for s in history {
        let bar = s.bar.map_or(String::new(), |b| b.to_string());
        writeln!(
            writer,
            "{:.4},{:.5},{:.5},{:.2},{:.3},{:.3},{:.5},{}",
            s.time,
            s.position.x,
            s.position.y,
            s.heading.to_degrees(),
            s.command.0,
            s.command.1,
            s.line_distance,
            bar,
        )?;
    }

    Ok(())
}

pub fn write_path_file(path: &str, history: &[Sample]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_path(&mut file, history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn trace_output_has_header_and_rows() {
        let trace = vec![
            TraceRecord {
                time: 0.0,
                segment: 0,
                state: "following",
                line_error: 0.0,
                correction: 0.0,
                left: 0.5,
                right: 0.5,
                event: "",
            },
            TraceRecord {
                time: 0.001,
                segment: 1,
                state: "following",
                line_error: -0.25,
                correction: 0.2,
                left: 0.3,
                right: 0.7,
                event: "bar",
            },
        ];

        let mut buf = Vec::new();
        write_trace(&mut buf, &trace).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("time,"));
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].starts_with("0.0000,0,following,"));
        assert!(lines[2].ends_with(",bar"));
    }

    #[test]
    fn path_leaves_bar_column_empty_off_bars() {
        let history = vec![Sample {
            time: 0.0,
            position: Point2::new(0.1, -0.2),
            heading: 0.0,
            command: (0.0, 0.0),
            line_distance: 0.0,
            bar: None,
        }];
        let mut buf = Vec::new();
        write_path(&mut buf, &history).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output.lines().nth(1), Some("0.0000,0.10000,-0.20000,0.00,0.000,0.000,0.00000,"));
    }
}
