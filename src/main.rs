use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;
use signal_hook::consts::{SIGINT, SIGTERM};

use line_nav::hal::StopFlag;
use line_nav::io::{self, TrackingStats};
use line_nav::maneuver::Outcome;
use line_nav::sim::{self, Course, EventKind, SimOptions, SimRig, VehicleParams, COURSE_NAMES};
use line_nav::{NavConfig, Result, Track};

/// Run a track on the simulated vehicle and print a run report.
#[derive(Parser, Debug)]
#[command(name = "line-nav")]
#[command(about = "Line-following navigation core on a simulated course", long_about = None)]
struct Args {
    /// TOML tuning file; defaults apply to anything it leaves out
    #[arg(long)]
    config: Option<PathBuf>,

    /// Track preset name or TOML file
    #[arg(long, default_value = "competition")]
    track: String,

    /// Course geometry; defaults to the preset matching the track
    #[arg(long)]
    course: Option<String>,

    /// RNG seed for noise and random forks (0 = entropy)
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Simulated run time limit (s)
    #[arg(long, default_value = "90")]
    duration: f64,

    /// Regulate wheel rates from the encoders
    #[arg(long)]
    closed_loop: bool,

    /// Spin-calibrate the array before starting
    #[arg(long)]
    calibrate: bool,

    /// Per-sample probability of a flipped sensor reading
    #[arg(long, default_value = "0")]
    noise: f64,

    /// Write the per-tick trace CSV here
    #[arg(long)]
    trace: Option<String>,

    /// Write the vehicle path CSV here
    #[arg(long)]
    path: Option<String>,

    /// Write the run summary JSON here
    #[arg(long)]
    summary: Option<String>,
}

fn load_track(spec: &str, config: &NavConfig) -> Result<Track> {
    if Path::new(spec).is_file() {
        return Track::load(Path::new(spec));
    }
    if spec == "config" {
        if let Some(track) = &config.track {
            return Ok(track.clone());
        }
    }
    Track::preset(spec)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("line_nav=info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };
    if args.closed_loop {
        config.drive.closed_loop = true;
    }
    config.sequencer.record_trace = true;

    let track = load_track(&args.track, &config)?;
    let course_name = args.course.clone().unwrap_or_else(|| {
        if COURSE_NAMES.contains(&track.name.as_str()) {
            track.name.clone()
        } else {
            "straight".to_string()
        }
    });
    let course = Course::preset(&course_name)?;

    let options = SimOptions {
        params: VehicleParams { flip_noise: args.noise.clamp(0.0, 1.0), ..VehicleParams::default() },
        seed: args.seed,
        duration: args.duration,
        calibrate: args.calibrate,
        ..SimOptions::default()
    };

    let stop = StopFlag::new();
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, stop.0.clone())?;
    }

    info!("track '{}' on course '{}', seed {}", track.name, course_name, args.seed);
    let mut rig = SimRig::with_stop(&config, track.clone(), course, &options, Some(Box::new(stop)))?;
    let summary = rig.run()?;
    let outcome = sim::collect(rig, summary);
    let stats = TrackingStats::from_trace(&outcome.trace);

    if let Some(path) = &args.trace {
        io::write_trace_file(path, &outcome.trace)?;
        info!("trace written to {}", path);
    }
    if let Some(path) = &args.path {
        io::write_path_file(path, &outcome.history)?;
        info!("path written to {}", path);
    }
    if let Some(path) = &args.summary {
        io::write_summary_file(path, &outcome.summary, Some(&stats))?;
        info!("summary written to {}", path);
    }

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    let s = &outcome.summary;
    println!();
    println!("====================================================================");
    println!("  LINE-FOLLOWER RUN: {}", s.track);
    println!("====================================================================");
    println!();
    println!("  Configuration");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Course:        {:>12}     Segments:     {:>8}",
        course_name,
        track.len()
    );
    println!(
        "  Drive:         {:>12}     Seed:         {:>8}",
        if config.drive.closed_loop { "closed-loop" } else { "open-loop" },
        args.seed
    );
    println!(
        "  Base speed:    {:>12.2}     Sensor noise: {:>8.3}",
        config.steering.base_speed, options.params.flip_noise
    );
    println!();

    println!("  Segment Transitions");
    println!("  ──────────────────────────────────────────────────────────────────");
    if s.maneuvers.is_empty() {
        println!("  (no maneuvers run)");
    }
    for m in &s.maneuvers {
        let outcome = match m.report.outcome {
            Outcome::Completed => "ok",
            Outcome::Degraded => "DEGRADED",
            Outcome::Stopped => "STOPPED",
        };
        let branch = m.report.branch.map_or(String::new(), |b| format!(" branch={:?}", b));
        println!(
            "  SEG {:>2} {:<14} {:<8} {:>6.2}s  {}{}",
            m.segment,
            m.name,
            m.report.kind.to_string(),
            m.report.elapsed,
            outcome,
            branch
        );
    }
    println!();

    println!("  World Events");
    println!("  ──────────────────────────────────────────────────────────────────");
    let bars = outcome.events.iter().filter(|e| matches!(e.kind, EventKind::BarCrossed { .. })).count();
    let lost = outcome.events.iter().filter(|e| e.kind == EventKind::LineLost).count();
    println!("  Bars crossed:  {:>8}       Line lost:    {:>8}", bars, lost);
    if let Some(off) = outcome.events.iter().find(|e| matches!(e.kind, EventKind::OffCourse { .. })) {
        println!(
            "  OFF COURSE at t={:.2}s  ({:.3}, {:.3})",
            off.time, off.position.x, off.position.y
        );
    }
    println!();

    println!("  Performance Summary");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!("  Finish:        {}", s.finish_reason);
    println!(
        "  Elapsed:       {:>8.2} s     Ticks:        {:>8}",
        s.elapsed, s.ticks
    );
    println!(
        "  Transitions:   {:>8}       Final seg:    {:>8}",
        s.transitions, s.final_segment
    );
    println!(
        "  Mean |error|:  {:>8.3}       Max |error|:  {:>8.3}",
        stats.mean_abs_error, stats.max_abs_error
    );
    println!(
        "  Gap ticks:     {:>8}       Max |corr|:   {:>8.3}",
        stats.gap_ticks, stats.max_abs_correction
    );
    println!(
        "  Final pose:    ({:.3}, {:.3}) heading {:.1} deg",
        outcome.final_pose.position.x,
        outcome.final_pose.position.y,
        outcome.final_pose.heading.to_degrees()
    );
    if !s.warnings.is_empty() {
        println!();
        println!("  Warnings");
        println!("  ──────────────────────────────────────────────────────────────────");
        for w in &s.warnings {
            println!("  {}", w);
        }
    }
    println!("====================================================================");
    println!();
    Ok(())
}
