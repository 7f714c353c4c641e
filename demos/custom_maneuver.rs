use std::cell::RefCell;
use std::rc::Rc;

use line_nav::config::SensorConfig;
use line_nav::control::WheelCommand;
use line_nav::drive::OpenLoopDrive;
use line_nav::maneuver::{run_plan, Step, Until, Wait};
use line_nav::sensing::SensorFrontend;
use line_nav::sim::{Course, CourseBuilder, SimClock, SimMotor, SimSensor, SimWorld, VehicleParams};
use line_nav::NavContext;

/// Composes a maneuver from plan steps and runs it on the simulated world:
/// drive off a short stub, stop, then spin right until the vehicle is
/// centred on the perpendicular line it finds.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("line_nav=debug")).init();

    // A stub ending in a right-angle corner to the right.
    let course: Course = CourseBuilder::new("corner").start_here().straight(0.2).corner(-90.0).straight(0.4).build();
    let world = Rc::new(RefCell::new(SimWorld::new(course, VehicleParams::default(), 5)));

    let mut ctx = NavContext::new(
        SensorFrontend::new(Box::new(SimSensor(world.clone())), SensorConfig::default()),
        Box::new(OpenLoopDrive::new(SimMotor(world.clone()))),
        Rc::new(SimClock(world.clone())),
    )
    .with_seed(5);

    let cfg = ctx.maneuver.clone();
    let plan = [
        Step::Wait(Wait::new("run off stub", WheelCommand::straight(0.4), Until::MostlyWhite, 4, 3.0)),
        Step::Pause(0.1),
        Step::Blind { label: "back up", command: WheelCommand::straight(-0.3), duration: 0.15 },
        Step::Wait(
            Wait::new("spin onto corner", WheelCommand::spin(cfg.turn_speed), Until::Centered, cfg.acquire_samples, 2.0)
                .recover(true),
        ),
        Step::Pause(cfg.settle_pause),
    ];

    let outcome = run_plan(&mut ctx, &plan);
    let w = world.borrow();
    let pose = w.pose();
    println!(
        "plan finished in {:.2} s, stopped={}, warnings={}",
        outcome.elapsed,
        outcome.stopped,
        outcome.warnings.len()
    );
    for warning in &outcome.warnings {
        println!("  {}", warning);
    }
    println!(
        "pose: ({:.3}, {:.3}) heading {:.1} deg",
        pose.position.x,
        pose.position.y,
        pose.heading.to_degrees()
    );
}
