// ==============================================================================
// suspension.rs — WHEEL <-> CHASSIS: TRAVEL GROOVE + SPRING-DAMPER
// ------------------------------------------------------------------------------
// Chassis-local geometry (y is the chassis "up" axis):
//
//        offset + (0, up + spring_lift)   <- spring anchor (chassis side)
//        offset + (0, up)                 <- upper travel stop
//        offset                           <- nominal wheel position
//        offset - (0, down)               <- lower travel stop
//
// - travel: the wheel center slides between the stops, spins freely, and the
//   joint itself never produces chassis/wheel contacts
// - spring: chassis anchor -> wheel center, rest length = up + down
//
// The wheel center is the pivot: one joint pins it to the groove, so the wheel
// has exactly two relative DOFs (slide + spin).
//
// up = down = 0 is a rigid axle: the groove collapses to a point and no spring
// is created.
// ==============================================================================

use log::debug;

use crate::backend::{BodyState, PhysicsBackend, SpringDesc, TravelDesc, Vec2};
use crate::config::WheelSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspension<C> {
    pub travel: C,
    pub spring: Option<C>,
}

pub fn travel_desc(wheel: &WheelSpec) -> TravelDesc {
    let [ox, oy] = wheel.offset;
    let s = &wheel.suspension;
    TravelDesc {
        groove_a: [ox, oy + s.up_travel],
        groove_b: [ox, oy - s.down_travel],
        anchor: [0.0, 0.0],
    }
}

pub fn spring_desc(wheel: &WheelSpec) -> SpringDesc {
    let [ox, oy] = wheel.offset;
    let s = &wheel.suspension;
    SpringDesc {
        anchor_a: [ox, oy + s.up_travel + s.spring_lift],
        anchor_b: [0.0, 0.0],
        rest_length: s.rest_length(),
        stiffness: s.stiffness,
        damping: s.damping,
    }
}

pub fn attach<B: PhysicsBackend>(
    backend: &mut B,
    chassis: B::Body,
    wheel_body: B::Body,
    wheel: &WheelSpec,
) -> Suspension<B::Constraint> {
    let travel = backend.add_travel_constraint(chassis, wheel_body, &travel_desc(wheel));

    let spring = if wheel.suspension.is_rigid() {
        None
    } else {
        Some(backend.add_spring(chassis, wheel_body, &spring_desc(wheel)))
    };

    debug!(
        "suspension at {:?}: travel +{:.2}/-{:.2} m, k={} c={}{}",
        wheel.offset,
        wheel.suspension.up_travel,
        wheel.suspension.down_travel,
        wheel.suspension.stiffness,
        wheel.suspension.damping,
        if spring.is_none() { " (rigid)" } else { "" }
    );
    Suspension { travel, spring }
}

/// Wheel center expressed in the chassis frame.
pub fn wheel_local_position(chassis: &BodyState, wheel: &BodyState) -> Vec2 {
    let dx = wheel.position[0] - chassis.position[0];
    let dy = wheel.position[1] - chassis.position[1];
    let (s, c) = chassis.angle.sin_cos();
    [c * dx + s * dy, -s * dx + c * dy]
}

/// Current travel, chassis-local y of the wheel center. Within
/// `[offset.y - down, offset.y + up]` while the groove holds.
pub fn travel_position(chassis: &BodyState, wheel: &BodyState) -> f32 {
    wheel_local_position(chassis, wheel)[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::simple_green;

    #[test]
    fn groove_runs_along_local_vertical() {
        let wheel = simple_green().wheel_rear;
        let t = travel_desc(&wheel);
        assert_eq!(t.groove_a[0], wheel.offset[0]);
        assert_eq!(t.groove_b[0], wheel.offset[0]);
        assert!((t.groove_a[1] - (wheel.offset[1] + 0.2)).abs() < 1e-6);
        assert!((t.groove_b[1] - (wheel.offset[1] - 0.6)).abs() < 1e-6);
        assert_eq!(t.anchor, [0.0, 0.0]);
    }

    #[test]
    fn spring_sits_above_upper_stop_with_full_span_rest_length() {
        let wheel = simple_green().wheel_front;
        let s = spring_desc(&wheel);
        assert!((s.anchor_a[1] - (wheel.offset[1] + 0.4)).abs() < 1e-6);
        assert!((s.rest_length - 0.8).abs() < 1e-6);
        assert_eq!(s.stiffness, 70_000.0);
        assert_eq!(s.damping, 9_000.0);
    }

    #[test]
    fn local_position_undoes_chassis_rotation() {
        let chassis = BodyState { position: [1.0, 1.0], angle: std::f32::consts::FRAC_PI_2, ..Default::default() };
        // chassis rotated 90deg CCW: its local -y points along world +x
        let wheel = BodyState { position: [2.0, 1.0], ..Default::default() };
        let local = wheel_local_position(&chassis, &wheel);
        assert!(local[0].abs() < 1e-6 && (local[1] + 1.0).abs() < 1e-6, "{local:?}");
    }
}
