//! Bounded maneuvers run at segment transitions.
//!
//! A [`ManeuverSpec`] is the static description carried by a track
//! segment. It is resolved into a [`Maneuver`] before the vehicle moves,
//! so a bad parameter surfaces as [`NavError::InvalidConfig`] with the
//! motors untouched. Execution builds a step plan and hands it to
//! [`engine::run_plan`]; timeouts end up as warnings on the report.

pub mod align;
pub mod engine;
pub mod fork;
pub mod turn;

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::context::NavContext;
use crate::error::{NavError, Result};

pub use engine::{run_plan, PlanOutcome, Step, Until, Wait};

// ---------------------------------------------------------------------------
// Static description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    Fork,
    Turn90,
    Turn180,
    Align,
    Recross,
}

impl fmt::Display for ManeuverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManeuverKind::Fork => "fork",
            ManeuverKind::Turn90 => "turn90",
            ManeuverKind::Turn180 => "turn180",
            ManeuverKind::Align => "align",
            ManeuverKind::Recross => "recross",
        };
        f.write_str(s)
    }
}

/// Maneuver reference as written in a track file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManeuverSpec {
    pub kind: ManeuverKind,
    /// Free-form direction word, checked by [`ManeuverSpec::resolve`].
    #[serde(default)]
    pub direction: Option<String>,
    /// Override for the maneuver's drive and turn speed.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Shove off a start bar before a 90 degree turn (default true).
    #[serde(default)]
    pub clear_start_bar: Option<bool>,
    /// Run the recovery scan when the search times out (default true).
    #[serde(default)]
    pub recover: Option<bool>,
}

impl ManeuverSpec {
    pub fn new(kind: ManeuverKind) -> Self {
        Self { kind, direction: None, speed: None, clear_start_bar: None, recover: None }
    }

    pub fn direction(mut self, direction: &str) -> Self {
        self.direction = Some(direction.to_string());
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Check every parameter and produce an executable maneuver.
    pub fn resolve(&self) -> Result<Maneuver> {
        let word = self.direction.as_deref().map(|d| d.trim().to_ascii_lowercase());
        let word = word.as_deref();

        let action = match self.kind {
            ManeuverKind::Fork => Action::Fork(match word {
                None | Some("sensor") => ForkChoice::Sensor,
                Some("random") => ForkChoice::Random,
                Some(w) => ForkChoice::Fixed(parse_branch(w).ok_or_else(|| {
                    NavError::invalid(format!(
                        "fork direction '{}' is not one of left, right, straight, random, sensor",
                        w
                    ))
                })?),
            }),
            ManeuverKind::Turn90 | ManeuverKind::Turn180 => {
                let direction = match word {
                    None | Some("auto") => TurnDirection::Auto,
                    Some("left") => TurnDirection::Left,
                    Some("right") => TurnDirection::Right,
                    Some(w) => {
                        return Err(NavError::invalid(format!(
                            "{} direction '{}' is not one of left, right, auto",
                            self.kind, w
                        )))
                    }
                };
                if self.kind == ManeuverKind::Turn90 {
                    Action::Turn90 { direction, clear_start_bar: self.clear_start_bar.unwrap_or(true) }
                } else {
                    Action::Turn180 { direction }
                }
            }
            ManeuverKind::Align => match word {
                None => Action::Align,
                Some(w) => return Err(NavError::invalid(format!("align takes no direction, got '{}'", w))),
            },
            ManeuverKind::Recross => Action::Recross(match word {
                None | Some("auto") => None,
                Some(w) => Some(parse_branch(w).ok_or_else(|| {
                    NavError::invalid(format!(
                        "recross direction '{}' is not one of left, right, straight, auto",
                        w
                    ))
                })?),
            }),
        };

        if let Some(speed) = self.speed {
            if !(speed > 0.0 && speed <= 1.0) {
                return Err(NavError::invalid(format!("{} speed must be in (0, 1], got {}", self.kind, speed)));
            }
        }

        Ok(Maneuver { kind: self.kind, action, speed: self.speed, recover: self.recover.unwrap_or(true) })
    }
}

fn parse_branch(word: &str) -> Option<Branch> {
    match word {
        "left" => Some(Branch::Left),
        "right" => Some(Branch::Right),
        "straight" | "center" => Some(Branch::Straight),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Resolved maneuver
// ---------------------------------------------------------------------------

/// Branch taken at a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Left,
    Straight,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkChoice {
    Fixed(Branch),
    Random,
    /// Whichever half of the array shows more activation.
    Sensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fork(ForkChoice),
    Turn90 { direction: TurnDirection, clear_start_bar: bool },
    Turn180 { direction: TurnDirection },
    Align,
    /// `None` re-crosses based on the remembered fork branch.
    Recross(Option<Branch>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maneuver {
    pub kind: ManeuverKind,
    pub action: Action,
    pub speed: Option<f64>,
    pub recover: bool,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// Finished, but at least one phase timed out.
    Degraded,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManeuverReport {
    pub kind: ManeuverKind,
    pub outcome: Outcome,
    pub branch: Option<Branch>,
    pub warnings: Vec<String>,
    pub elapsed: f64,
}

/// Resolve `spec` and run it. Invalid parameters return before any motor
/// command.
pub fn perform(ctx: &mut NavContext, spec: &ManeuverSpec, last_branch: Option<Branch>) -> Result<ManeuverReport> {
    let maneuver = spec.resolve()?;
    Ok(execute(ctx, &maneuver, last_branch))
}

/// Run an already-resolved maneuver.
pub fn execute(ctx: &mut NavContext, maneuver: &Maneuver, last_branch: Option<Branch>) -> ManeuverReport {
    info!("maneuver {} starting", maneuver.kind);
    let (plan, branch) = match maneuver.action {
        Action::Fork(choice) => {
            let branch = fork::choose(ctx, choice);
            (fork::plan(&ctx.maneuver, maneuver, branch), Some(branch))
        }
        Action::Turn90 { direction, clear_start_bar } => (turn::plan_90(ctx, maneuver, direction, clear_start_bar), None),
        Action::Turn180 { direction } => (turn::plan_180(ctx, maneuver, direction), None),
        Action::Align => (align::plan_align(&ctx.maneuver, maneuver), None),
        Action::Recross(from) => (align::plan_recross(&ctx.maneuver, maneuver, from.or(last_branch)), None),
    };

    let out = run_plan(ctx, &plan);
    let outcome = if out.stopped {
        Outcome::Stopped
    } else if out.warnings.is_empty() {
        Outcome::Completed
    } else {
        Outcome::Degraded
    };
    ctx.note(&format!("maneuver {} {:?} in {:.2}s", maneuver.kind, outcome, out.elapsed));

    ManeuverReport { kind: maneuver.kind, outcome, branch, warnings: out.warnings, elapsed: out.elapsed }
}
