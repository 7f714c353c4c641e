use log::debug;

use super::engine::{Step, Until, Wait};
use super::{Maneuver, TurnDirection};
use crate::context::NavContext;
use crate::control::WheelCommand;
use crate::sensing::frame::{self, LEFT_EDGE, RIGHT_EDGE};

/// Standstill after shoving off the start bar (s).
const BAR_SETTLE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// In-place spin toward this side.
    pub fn spin(self, speed: f64) -> WheelCommand {
        match self {
            Side::Left => WheelCommand::spin(-speed),
            Side::Right => WheelCommand::spin(speed),
        }
    }
}

/// 90 degree auto direction: the hot edge sensor, falling back to the
/// heavier half when both or neither edge is dark.
fn side_from_edges(ctx: &mut NavContext) -> Side {
    let f = ctx.sensors.read_calibrated();
    let level = ctx.sensors.config().active_level;
    match (frame::is_active(&f, LEFT_EDGE, level), frame::is_active(&f, RIGHT_EDGE, level)) {
        (true, false) => Side::Left,
        (false, true) => Side::Right,
        _ => side_from_mass(&f),
    }
}

/// Heavier half of the frame; ties go left.
fn side_from_mass(f: &frame::Frame) -> Side {
    let (left, right) = frame::half_masses(f);
    if right > left {
        Side::Right
    } else {
        Side::Left
    }
}

/// Drive off a start bar (if on one), clear the intersection, spin away
/// from the old line, then spin until a new line is centred.
pub fn plan_90(ctx: &mut NavContext, maneuver: &Maneuver, direction: TurnDirection, clear_start_bar: bool) -> Vec<Step> {
    let cfg = ctx.maneuver.clone();
    let base = maneuver.speed.unwrap_or(cfg.base_speed);
    let turn = maneuver.speed.unwrap_or(cfg.turn_speed);
    let mut steps = Vec::new();

    if clear_start_bar {
        ctx.sensors.reset_bar_detector();
        let f = ctx.sensors.read_calibrated();
        if ctx.sensors.is_bar(&f) {
            debug!("turn90: on start bar, shoving off");
            steps.push(Step::Blind { label: "start bar", command: WheelCommand::straight(base), duration: cfg.bar_blind_time });
            steps.push(Step::Wait(Wait::new(
                "start bar clear",
                WheelCommand::straight(base),
                Until::OffMarker,
                cfg.bar_clear_samples,
                cfg.bar_clear_timeout,
            )));
            steps.push(Step::Pause(BAR_SETTLE));
        }
    }

    let side = match direction {
        TurnDirection::Left => Side::Left,
        TurnDirection::Right => Side::Right,
        TurnDirection::Auto => side_from_edges(ctx),
    };
    debug!("turn90 toward {:?}", side);

    steps.extend([
        Step::Wait(Wait::new(
            "intersection clear",
            WheelCommand::straight(base),
            Until::MostlyWhite,
            cfg.clear_samples,
            cfg.clear_timeout,
        )),
        Step::Pause(cfg.settle_pause),
        Step::Wait(Wait::new(
            "spin clear",
            side.spin(turn),
            Until::MostlyWhite,
            cfg.spin_clear_samples,
            cfg.spin_clear_timeout,
        )),
        Step::Wait(
            Wait::new("turn acquire", side.spin(turn), Until::Centered, cfg.acquire_samples, cfg.acquire_timeout)
                .gated()
                .recover(maneuver.recover),
        ),
        Step::Pause(cfg.settle_pause),
    ]);
    steps
}

/// Spin in place for at least the minimum spin time, then until a line is
/// centred again.
pub fn plan_180(ctx: &mut NavContext, maneuver: &Maneuver, direction: TurnDirection) -> Vec<Step> {
    let cfg = &ctx.maneuver;
    let turn = maneuver.speed.unwrap_or(cfg.turn_speed);
    let (settle, spin_samples, spin_timeout) = (cfg.settle_pause, cfg.spin_clear_samples, cfg.spin_clear_timeout);
    let (acquire_samples, min_spin, timeout) = (cfg.acquire_samples, cfg.turn180_min_spin, cfg.turn180_timeout);

    let side = match direction {
        TurnDirection::Left => Side::Left,
        TurnDirection::Right => Side::Right,
        TurnDirection::Auto => {
            let f = ctx.sensors.read_calibrated();
            side_from_mass(&f)
        }
    };
    debug!("turn180 toward {:?}", side);

    vec![
        Step::Pause(settle),
        Step::Wait(Wait::new("spin clear", side.spin(turn), Until::MostlyWhite, spin_samples, spin_timeout)),
        Step::Wait(
            Wait::new("turn acquire", side.spin(turn), Until::Centered, acquire_samples, timeout)
                .min_time(min_spin)
                .gated()
                .recover(maneuver.recover),
        ),
        Step::Pause(settle),
    ]
}
