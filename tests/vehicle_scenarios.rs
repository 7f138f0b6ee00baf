// Whole-vehicle scenarios on the rapier backend.

use truck_server::backend::PhysicsBackend;
use truck_server::config::{simple_green, TruckSpec};
use truck_server::drivetrain::DriveInput;
use truck_server::physics::PhysicsWorld;
use truck_server::suspension::{travel_position, wheel_local_position};
use truck_server::vehicle::{Vehicle, DEFAULT_GROUP};

const DT: f32 = 1.0 / 60.0;

fn flat_world() -> PhysicsWorld {
    let mut world = PhysicsWorld::new([0.0, -9.81]);
    world.add_static_segment([-100.0, 1.0], [400.0, 1.0], 0.0, 1.0);
    world
}

fn run(world: &mut PhysicsWorld, truck: &mut Vehicle<PhysicsWorld>, input: DriveInput, seconds: f32) {
    let ticks = (seconds / DT).round() as usize;
    for _ in 0..ticks {
        truck.drive(world, input, DT);
        world.step(DT);
    }
}

fn assert_within_travel(world: &PhysicsWorld, truck: &Vehicle<PhysicsWorld>, spec: &TruckSpec, tol: f32) {
    let s = truck.states(world).unwrap();
    for (wheel, state) in [(&spec.wheel_rear, &s.rear), (&spec.wheel_front, &s.front)] {
        let y = travel_position(&s.chassis, state);
        let lo = wheel.offset[1] - wheel.suspension.down_travel - tol;
        let hi = wheel.offset[1] + wheel.suspension.up_travel + tol;
        assert!(y >= lo && y <= hi, "travel {y} outside [{lo}, {hi}]");

        let x = wheel_local_position(&s.chassis, state)[0];
        assert!((x - wheel.offset[0]).abs() <= tol, "wheel left its groove: x={x}");
    }
}

#[test]
fn flat_ground_spawn_settles_at_ride_height() {
    let spec = simple_green();
    let mut world = flat_world();
    let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 5.0], DEFAULT_GROUP);

    run(&mut world, &mut truck, DriveInput::default(), 4.0);
    let y_before = truck.states(&world).unwrap().chassis.position[1];
    run(&mut world, &mut truck, DriveInput::default(), 0.5);
    let s = truck.states(&world).unwrap();

    assert!(s.chassis.linvel[1].abs() < 0.05, "still bouncing: vy={}", s.chassis.linvel[1]);
    assert!((s.chassis.position[1] - y_before).abs() < 0.02);
    assert_within_travel(&world, &truck, &spec, 0.05);

    // resting on the wheels, chassis clear of the ground
    let bb = truck.bounding_box(&world).unwrap();
    assert!((bb.mins[1] - 1.0).abs() < 0.1, "wheels not on the ground: {bb:?}");
    assert!(s.chassis.position[1] - spec.chassis.dimensions[1] * 0.5 > 1.0);
}

#[test]
fn full_throttle_from_rest_never_exceeds_top_rate() {
    let spec = simple_green();
    let top_rate = spec.drivetrain.top_rate(spec.wheel_rear.radius);
    let mut world = flat_world();
    let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 1.0], DEFAULT_GROUP);
    run(&mut world, &mut truck, DriveInput::default(), 1.5);
    let x0 = truck.states(&world).unwrap().chassis.position[0];

    let mut samples = Vec::new();
    for tick in 0..(3 * 60) {
        truck.drive(&mut world, DriveInput::new(1, false), DT);
        world.step(DT);
        let w = truck.states(&world).unwrap().rear.angvel;
        assert!(w.abs() <= top_rate * 1.01, "tick {tick}: |w|={} > {top_rate}", w.abs());
        if tick % 30 == 29 {
            samples.push(w.abs());
        }
    }

    // coarse monotonic rise
    assert!(samples.windows(2).all(|p| p[1] >= p[0] - 0.25), "{samples:?}");
    let s = truck.states(&world).unwrap();
    assert!(s.rear.angvel < -5.0, "forward should spin the wheels clockwise");
    assert!(s.chassis.position[0] > x0 + 5.0, "truck did not move forward");
}

#[test]
fn emergency_brake_stops_the_truck_without_reversing() {
    let spec = simple_green();
    let mut world = flat_world();
    let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 1.0], DEFAULT_GROUP);
    run(&mut world, &mut truck, DriveInput::new(1, false), 3.0);
    assert!(truck.states(&world).unwrap().chassis.linvel[0] > 3.0);

    for _ in 0..(4 * 60) {
        truck.drive(&mut world, DriveInput::new(1, true), DT);
        world.step(DT);
        let w = truck.states(&world).unwrap().rear.angvel;
        assert!(w < 0.5, "brake spun the wheel backwards: {w}");
    }
    let s = truck.states(&world).unwrap();
    assert!(s.rear.angvel.abs() < 0.5);
    assert!(s.chassis.linvel[0].abs() < 0.5);
}

#[test]
fn gear_keeps_axles_locked_for_any_input() {
    let spec = simple_green();
    let mut world = flat_world();
    let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 1.5], DEFAULT_GROUP);

    let inputs = [
        DriveInput::new(1, false),
        DriveInput::new(-1, false),
        DriveInput::new(0, false),
        DriveInput::new(1, true),
    ];
    for (i, input) in inputs.iter().cycle().take(8).enumerate() {
        run(&mut world, &mut truck, *input, 0.4 + 0.1 * i as f32);
        let s = truck.states(&world).unwrap();
        let tol = 1e-3 * (1.0 + s.rear.angvel.abs());
        assert!((s.rear.angvel - s.front.angvel).abs() <= tol, "rear {} front {}", s.rear.angvel, s.front.angvel);
    }
}

#[test]
fn non_unit_gear_ratio_holds_in_the_air() {
    let mut spec = simple_green();
    spec.gear_ratio = 1.5;
    let mut world = PhysicsWorld::new([0.0, -9.81]);
    let mut truck = Vehicle::spawn(&mut world, &spec, [0.0, 100.0], DEFAULT_GROUP);

    for tick in 0..90 {
        let input = if tick < 45 { DriveInput::new(1, false) } else { DriveInput::new(-1, false) };
        truck.drive(&mut world, input, DT);
        world.step(DT);
        let s = truck.states(&world).unwrap();
        let tol = 1e-3 * (1.0 + s.rear.angvel.abs());
        assert!((s.rear.angvel - 1.5 * s.front.angvel).abs() <= tol);
    }
}

fn geared_truck_in_space(ratio: f32) -> (PhysicsWorld, Vehicle<PhysicsWorld>, TruckSpec) {
    let mut spec = simple_green();
    spec.gear_ratio = ratio;
    let mut world = PhysicsWorld::new([0.0, 0.0]);
    let truck = Vehicle::spawn(&mut world, &spec, [0.0, 0.0], DEFAULT_GROUP);
    (world, truck, spec)
}

#[test]
fn brake_on_slow_roll_stops_without_reversing_at_half_ratio() {
    let (mut world, mut truck, _) = geared_truck_in_space(0.5);
    for (body, w) in [(truck.rear, -0.2), (truck.front, -0.4)] {
        if let Some(rb) = world.bodies.get_mut(body) {
            rb.set_angvel(w, true);
        }
    }

    for _ in 0..30 {
        let pair = truck.drive(&mut world, DriveInput::new(0, true), DT);
        world.step(DT);
        let s = truck.states(&world).unwrap();
        assert!(s.rear.angvel <= 1e-4, "rear reversed to {} under {}", s.rear.angvel, pair.wheel);
        assert!(s.front.angvel <= 1e-4, "front reversed to {}", s.front.angvel);
    }
    assert!(truck.states(&world).unwrap().rear.angvel.abs() < 1e-3);
}

#[test]
fn full_throttle_never_exceeds_top_rate_at_half_ratio() {
    let (mut world, mut truck, spec) = geared_truck_in_space(0.5);
    let top_rate = spec.drivetrain.top_rate(spec.wheel_rear.radius);

    for tick in 0..(3 * 60) {
        truck.drive(&mut world, DriveInput::new(1, false), DT);
        world.step(DT);
        let w = truck.states(&world).unwrap().rear.angvel;
        assert!(w.abs() <= top_rate * 1.001, "tick {tick}: |w|={} > {top_rate}", w.abs());
    }
    // unloaded wheels reach the governor
    let w = truck.states(&world).unwrap().rear.angvel;
    assert!((w + top_rate).abs() < top_rate * 0.01, "w={w} top={top_rate}");
}

#[test]
fn suspension_travel_is_bounded_for_soft_and_stiff_springs() {
    for (stiffness, damping) in [(4_000.0, 0.0), (70_000.0, 9_000.0), (900_000.0, 500.0)] {
        let mut spec = simple_green();
        for wheel in [&mut spec.wheel_rear, &mut spec.wheel_front] {
            wheel.suspension.stiffness = stiffness;
            wheel.suspension.damping = damping;
        }
        let mut world = flat_world();
        let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 1.5], DEFAULT_GROUP);

        for tick in 0..(5 * 60) {
            let input = match (tick / 60) % 3 {
                0 => DriveInput::new(1, false),
                1 => DriveInput::new(1, true),
                _ => DriveInput::new(-1, false),
            };
            truck.drive(&mut world, input, DT);
            world.step(DT);
            assert_within_travel(&world, &truck, &spec, 0.05);
        }
    }
}

#[test]
fn spawn_places_bounding_box_lower_left_on_the_point() {
    let spec = simple_green();
    let mut world = flat_world();
    for point in [[10.0, 5.0], [-42.5, 17.25], [0.0, 1.0]] {
        let truck = Vehicle::spawn(&mut world, &spec, point, DEFAULT_GROUP);
        let bb = truck.bounding_box(&world).unwrap();
        assert!((bb.mins[0] - point[0]).abs() < 1e-3 && (bb.mins[1] - point[1]).abs() < 1e-3, "{bb:?}");
        // full wheel-to-wheel width
        let expected_w = spec.wheel_front.offset[0] - spec.wheel_rear.offset[0] + 2.0 * spec.wheel_rear.radius;
        assert!((bb.width() - expected_w.max(spec.chassis.dimensions[0])).abs() < 1e-3);
        truck.destroy(&mut world);
    }
}

#[test]
fn respawn_recreates_everything_at_rest() {
    let spec = simple_green();
    let mut world = flat_world();
    let mut truck = Vehicle::spawn(&mut world, &spec, [10.0, 1.5], DEFAULT_GROUP);
    run(&mut world, &mut truck, DriveInput::new(1, false), 2.0);

    let old = truck.bodies();
    let counts = (world.body_count(), world.joint_count(), world.spring_count(), world.gear_count());
    truck.respawn(&mut world, [40.0, 6.0]);

    assert_eq!((world.body_count(), world.joint_count(), world.spring_count(), world.gear_count()), counts);
    for body in old {
        assert!(world.body_state(body).is_none(), "old body {body:?} survived the reset");
    }
    let s = truck.states(&world).unwrap();
    for state in [s.chassis, s.rear, s.front] {
        assert_eq!(state.linvel, [0.0, 0.0]);
        assert_eq!(state.angvel, 0.0);
    }
    assert_eq!(s.chassis.angle, 0.0);
    let bb = truck.bounding_box(&world).unwrap();
    assert!((bb.mins[0] - 40.0).abs() < 1e-3 && (bb.mins[1] - 6.0).abs() < 1e-3);
}
