use log::debug;
use rand::Rng;

use super::engine::{Step, Until, Wait};
use super::turn::Side;
use super::{Branch, ForkChoice, Maneuver};
use crate::config::ManeuverConfig;
use crate::context::NavContext;
use crate::control::WheelCommand;
use crate::sensing::frame;

/// Pick the branch to take. Random choice is uniform over the two arms of
/// a Y fork; the sensor choice follows the heavier half of the array and
/// goes straight when the halves are within the configured margin.
pub fn choose(ctx: &mut NavContext, choice: ForkChoice) -> Branch {
    match choice {
        ForkChoice::Fixed(branch) => branch,
        ForkChoice::Random => {
            if ctx.rng.gen_bool(0.5) {
                Branch::Left
            } else {
                Branch::Right
            }
        }
        ForkChoice::Sensor => {
            let f = ctx.sensors.read_calibrated();
            let (left, right) = frame::half_masses(&f);
            debug!("fork halves: left={:.2} right={:.2}", left, right);
            if (left - right).abs() < ctx.maneuver.fork_sensor_margin {
                Branch::Straight
            } else if left > right {
                Branch::Left
            } else {
                Branch::Right
            }
        }
    }
}

/// Search command for `branch`: a slow in-place spin toward a side arm, or
/// a straight creep onto a centre arm.
pub fn search(branch: Branch, creep: f64, spin: f64) -> WheelCommand {
    match branch {
        Branch::Left => Side::Left.spin(spin),
        Branch::Straight => WheelCommand::straight(creep),
        Branch::Right => Side::Right.spin(spin),
    }
}

/// Drive straight off the junction marker to the split, stop there, then
/// turn onto the chosen arm.
///
/// The arms of a Y fork stay under the edge sensors at the split, so the
/// array never reads mostly white there; the acquire phase is not gated.
/// The spin pivots on the axle, which sits near the split, so the chosen
/// arm sweeps through the array centre.
pub fn plan(config: &ManeuverConfig, maneuver: &Maneuver, branch: Branch) -> Vec<Step> {
    let speed = maneuver.speed.unwrap_or(config.base_speed);
    let spin = maneuver.speed.unwrap_or(config.fork_spin_speed);
    let ahead = WheelCommand::straight(speed);
    vec![
        Step::Blind { label: "fork commit", command: ahead, duration: config.fork_commit_time },
        Step::Wait(Wait::new("fork clear", ahead, Until::OffMarker, config.bar_clear_samples, config.clear_timeout)),
        Step::Pause(config.settle_pause),
        Step::Wait(
            Wait::new(
                "fork acquire",
                search(branch, speed, spin),
                Until::Centered,
                config.acquire_samples,
                config.acquire_timeout,
            )
            .recover(maneuver.recover),
        ),
        Step::Pause(config.settle_pause),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::testing::{centered, rig};
    use super::super::{execute, ManeuverKind, ManeuverSpec, Outcome};
    use super::*;
    use crate::sensing::{frame_from, Frame};

    #[test]
    fn sensor_choice_follows_heavier_half() {
        let mut r = rig();
        r.sensor.extend([
            frame_from([1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            frame_from([0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0]),
            frame_from([0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]),
        ]);
        assert_eq!(choose(&mut r.ctx, ForkChoice::Sensor), Branch::Left);
        assert_eq!(choose(&mut r.ctx, ForkChoice::Sensor), Branch::Right);
        assert_eq!(choose(&mut r.ctx, ForkChoice::Sensor), Branch::Straight);
    }

    #[test]
    fn random_choice_is_reproducible_and_two_armed() {
        let picks = |seed: u64| {
            let mut r = rig();
            r.ctx = r.ctx.with_seed(seed);
            (0..32).map(|_| choose(&mut r.ctx, ForkChoice::Random)).collect::<Vec<_>>()
        };
        let a = picks(11);
        assert_eq!(a, picks(11));
        assert!(a.contains(&Branch::Left));
        assert!(a.contains(&Branch::Right));
        assert!(!a.contains(&Branch::Straight));
    }

    #[test]
    fn search_spins_toward_side_arms() {
        assert_eq!(search(Branch::Left, 0.5, 0.3), WheelCommand::new(-0.3, 0.3));
        assert_eq!(search(Branch::Right, 0.5, 0.3), WheelCommand::new(0.3, -0.3));
        assert_eq!(search(Branch::Straight, 0.5, 0.3), WheelCommand::straight(0.5));
    }

    #[test]
    fn plan_stops_before_searching() {
        let config = ManeuverConfig::default();
        let m = ManeuverSpec::new(ManeuverKind::Fork).direction("right").resolve().unwrap();
        let steps = plan(&config, &m, Branch::Right);
        match &steps[0] {
            Step::Blind { command, .. } => assert_eq!(*command, WheelCommand::straight(config.base_speed)),
            other => panic!("expected a straight commit, got {:?}", other),
        }
        assert!(matches!(steps[2], Step::Pause(_)));
        match &steps[3] {
            Step::Wait(w) => {
                assert_eq!(w.until, Until::Centered);
                assert_eq!(w.command, Side::Right.spin(config.fork_spin_speed));
                assert!(!w.gated);
            }
            other => panic!("expected the acquire wait, got {:?}", other),
        }
    }

    #[test]
    fn fixed_left_fork_spins_until_branch_is_centred() {
        let mut r = rig();
        r.sensor.push_repeated(Frame::from_element(1.0), 3);
        // both arms under the edge sensors at the split
        r.sensor.push_repeated(frame_from([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]), 10);
        r.sensor.push_repeated(centered(), 1);
        let m = ManeuverSpec::new(ManeuverKind::Fork).direction("left").resolve().unwrap();
        let report = execute(&mut r.ctx, &m, None);

        assert_eq!(report.outcome, Outcome::Completed, "{:?}", report.warnings);
        assert_eq!(report.branch, Some(Branch::Left));
        let cmds = r.motor.commands();
        assert_eq!(cmds[0], (0.5, 0.5));
        let stop = cmds.iter().position(|c| *c == (0.0, 0.0)).unwrap();
        let spin = cmds.iter().position(|c| *c == (-0.3, 0.3)).unwrap();
        assert!(stop < spin);
        assert!(!cmds.iter().any(|(left, right)| left > right));
        assert_eq!(cmds.last(), Some(&(0.0, 0.0)));
    }
}
