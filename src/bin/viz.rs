use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, Points};

use line_nav::sim::{self, Course, SimOptions, SimOutcome};
use line_nav::{NavConfig, Track};

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("line_nav=warn")).init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "competition".to_string());
    let mut config = NavConfig::default();
    config.sequencer.record_trace = true;

    let run = Track::preset(&name)
        .and_then(|track| Ok((track, Course::preset(&name)?)))
        .and_then(|(track, course)| {
            let course_copy = course.clone();
            let options = SimOptions { duration: 90.0, ..SimOptions::default() };
            Ok((sim::simulate(&config, track, course, &options)?, course_copy))
        });
    let (outcome, course) = match run {
        Ok(r) => r,
        Err(e) => {
            eprintln!("line-nav-viz: {}", e);
            std::process::exit(1);
        }
    };

    let app = RunViz { outcome, course };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native("Line Follower Run", options, Box::new(|_| Ok(Box::new(app))))
}

struct RunViz {
    outcome: SimOutcome,
    course: Course,
}

impl eframe::App for RunViz {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let trace = &self.outcome.trace;
        let step = (trace.len() / 4000).max(1);
        let sampled: Vec<_> = trace.iter().step_by(step).collect();
        let summary = &self.outcome.summary;

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.heading(format!("Track: {}", summary.track));
            ui.label(format!(
                "Finish: {}  |  Elapsed: {:.2} s  |  Transitions: {}  |  Warnings: {}",
                summary.finish_reason,
                summary.elapsed,
                summary.transitions,
                summary.warnings.len(),
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let half_w = available.x / 2.0 - 8.0;
            let half_h = available.y / 2.0 - 8.0;

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Line error");
                    let points: PlotPoints = sampled.iter().map(|r| [r.time, r.line_error]).collect();
                    Plot::new("error")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Error", points));
                        });
                });

                ui.vertical(|ui| {
                    ui.label("Wheel commands");
                    let left: PlotPoints = sampled.iter().map(|r| [r.time, r.left]).collect();
                    let right: PlotPoints = sampled.iter().map(|r| [r.time, r.right]).collect();
                    Plot::new("commands")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Left", left));
                            plot_ui.line(Line::new("Right", right));
                        });
                });
            });

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Steering correction");
                    let points: PlotPoints = sampled.iter().map(|r| [r.time, r.correction]).collect();
                    Plot::new("correction")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Correction", points));
                        });
                });

                ui.vertical(|ui| {
                    ui.label("Course and path (m)");
                    Plot::new("course")
                        .width(half_w)
                        .height(half_h)
                        .data_aspect(1.0)
                        .show(ui, |plot_ui| {
                            for (i, seg) in self.course.lines.iter().enumerate() {
                                let pts: PlotPoints = vec![[seg.a.x, seg.a.y], [seg.b.x, seg.b.y]].into();
                                plot_ui.line(Line::new(format!("line {}", i), pts));
                            }
                            let bars: PlotPoints =
                                self.course.bars.iter().map(|b| [b.center.x, b.center.y]).collect();
                            plot_ui.points(Points::new("Bars", bars).radius(4.0));
                            let path: PlotPoints = self
                                .outcome
                                .history
                                .iter()
                                .map(|s| [s.position.x, s.position.y])
                                .collect();
                            plot_ui.line(Line::new("Path", path));
                        });
                });
            });
        });
    }
}
