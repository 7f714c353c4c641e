use super::engine::{Step, Until, Wait};
use super::turn::Side;
use super::{Branch, Maneuver};
use crate::config::ManeuverConfig;
use crate::control::WheelCommand;

/// Square up on a bar: wiggle toward the dark edge until both edges are dark.
pub fn plan_align(config: &ManeuverConfig, maneuver: &Maneuver) -> Vec<Step> {
    let speed = maneuver.speed.unwrap_or(config.align_speed);
    vec![Step::Align { speed, timeout: config.align_timeout }]
}

/// Re-enter the main line after a fork branch.
///
/// Coming back from the left branch the vehicle points too far left, so it
/// pivots right until the trunk is centred (and vice versa); an already
/// centred trunk ends the pivot at once. It then checks the line is under
/// the array and drives forward until the junction marker is behind it.
pub fn plan_recross(config: &ManeuverConfig, maneuver: &Maneuver, from: Option<Branch>) -> Vec<Step> {
    let base = maneuver.speed.unwrap_or(config.base_speed);
    let spin = maneuver.speed.unwrap_or(config.fork_spin_speed);
    let mut steps = Vec::new();

    let pivot = match from {
        Some(Branch::Left) => Some(Side::Right),
        Some(Branch::Right) => Some(Side::Left),
        Some(Branch::Straight) | None => None,
    };
    if let Some(side) = pivot {
        steps.push(Step::Wait(Wait::new(
            "recross pivot",
            side.spin(spin),
            Until::Centered,
            config.acquire_samples,
            config.recross_pivot_time,
        )));
        steps.push(Step::Pause(config.settle_pause));
    }

    steps.push(Step::Wait(
        Wait::new(
            "recross verify",
            WheelCommand::STOP,
            Until::LineVisible,
            config.recross_verify_samples,
            config.recross_timeout,
        )
        .recover(maneuver.recover),
    ));
    steps.push(Step::Wait(Wait::new(
        "recross marker",
        WheelCommand::straight(base),
        Until::OffMarker,
        config.bar_clear_samples,
        config.recross_timeout,
    )));
    steps
}

#[cfg(test)]
mod tests {
    use super::super::testing::{centered, rig};
    use super::super::{execute, ManeuverKind, ManeuverSpec, Outcome};
    use super::*;
    use crate::sensing::Frame;

    fn recross() -> Maneuver {
        ManeuverSpec::new(ManeuverKind::Recross).resolve().unwrap()
    }

    #[test]
    fn pivot_opposes_remembered_branch() {
        let config = ManeuverConfig::default();
        let from_left = plan_recross(&config, &recross(), Some(Branch::Left));
        match &from_left[0] {
            Step::Wait(w) => {
                assert_eq!(w.command, WheelCommand::spin(config.fork_spin_speed));
                assert_eq!(w.until, Until::Centered);
            }
            other => panic!("expected a pivot, got {:?}", other),
        }
        let straight = plan_recross(&config, &recross(), Some(Branch::Straight));
        assert_eq!(straight.len(), 2);
    }

    #[test]
    fn recross_uses_memory_when_auto() {
        let mut r = rig();
        r.sensor.push_repeated(Frame::from_element(1.0), 4);
        r.sensor.push_repeated(centered(), 1);
        let report = execute(&mut r.ctx, &recross(), Some(Branch::Right));

        assert_eq!(report.outcome, Outcome::Completed, "{:?}", report.warnings);
        let cmds = r.motor.commands();
        assert_eq!(cmds[0], (-0.3, 0.3));
        assert!(cmds.contains(&(0.5, 0.5)));
    }

    #[test]
    fn pivot_stops_once_trunk_is_centred() {
        let mut r = rig();
        let pivot_limit = r.ctx.maneuver.recross_pivot_time;
        r.sensor.push_repeated(centered(), 1);
        let report = execute(&mut r.ctx, &recross(), Some(Branch::Left));

        assert_eq!(report.outcome, Outcome::Completed, "{:?}", report.warnings);
        assert!(report.elapsed < pivot_limit);
        // samples taken while pivoting, then a settle stop
        let cmds = r.motor.commands();
        assert_eq!(&cmds[..2], &[(0.3, -0.3), (0.0, 0.0)]);
    }

    #[test]
    fn explicit_direction_overrides_memory() {
        let mut r = rig();
        r.sensor.push_repeated(centered(), 1);
        let m = ManeuverSpec::new(ManeuverKind::Recross).direction("left").resolve().unwrap();
        execute(&mut r.ctx, &m, Some(Branch::Right));
        assert_eq!(r.motor.commands()[0], (0.3, -0.3));
    }

    #[test]
    fn align_speed_defaults_from_config() {
        let config = ManeuverConfig { align_speed: 0.2, ..ManeuverConfig::default() };
        let m = ManeuverSpec::new(ManeuverKind::Align).resolve().unwrap();
        match plan_align(&config, &m)[0] {
            Step::Align { speed, timeout } => {
                assert_eq!(speed, 0.2);
                assert_eq!(timeout, config.align_timeout);
            }
            ref other => panic!("unexpected step {:?}", other),
        }
    }
}
