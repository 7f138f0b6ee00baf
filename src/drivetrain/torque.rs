// ==============================================================================
// torque.rs — TORQUE-MODE MOTOR: DIRECT WHEEL TORQUE, NO RATE STATE
// ------------------------------------------------------------------------------
// Sign convention: forward = negative angular rate (clockwise while rolling
// toward +x). All torques below are wheel torques in that frame.
//
//   brake  (|w| > BRAKE_DEADBAND):  -sign(w) * min(brake_torque, I|w|/dt)
//   drive  (direction != 0):        -direction * min(torque, I * headroom / dt)
//                                   headroom = top_rate - rate in commanded
//                                   direction, nothing once it reaches 0
//   coast  (w != 0):                -sign(w) * min(coeff * |w| * torque / top_rate,
//                                                  coeff * torque, I|w|/dt)
//
// The I|w|/dt caps keep a single tick from pushing the wheel through zero.
// ==============================================================================

use super::{DriveInput, MotorState};
use crate::config::DrivetrainSpec;

/// Below this wheel rate (rad/s) the brake lets go.
pub const BRAKE_DEADBAND: f32 = 0.1;

pub fn wheel_torque(
    spec: &DrivetrainSpec,
    top_rate: f32,
    input: DriveInput,
    angvel: f32,
    inertia: f32,
    dt: f32,
) -> (MotorState, f32) {
    let stop_cap = inertia * angvel.abs() / dt;

    if input.braking {
        if angvel.abs() > BRAKE_DEADBAND {
            return (MotorState::Braking, -angvel.signum() * spec.brake_torque.min(stop_cap));
        }
        return (MotorState::Braking, 0.0);
    }

    if input.direction != 0 {
        let dir = input.direction as f32;
        let rate_in_direction = -dir * angvel;
        let headroom = top_rate - rate_in_direction;
        let magnitude = if headroom > 0.0 {
            spec.torque.min(inertia * headroom / dt)
        } else {
            0.0
        };
        return (MotorState::Accelerating, -dir * magnitude);
    }

    if angvel == 0.0 {
        return (MotorState::Idle, 0.0);
    }
    let coeff = spec.rolling_resistance;
    let magnitude = (coeff * angvel.abs() * spec.torque / top_rate)
        .min(coeff * spec.torque)
        .min(stop_cap);
    (MotorState::Decelerating, -angvel.signum() * magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::simple_green;

    const DT: f32 = 1.0 / 60.0;
    const I: f32 = 2.0 * 0.5 * 600.0 * 0.81; // both wheels, r = 0.9

    fn spec() -> DrivetrainSpec {
        simple_green().drivetrain
    }

    #[test]
    fn forward_from_rest_is_full_negative_torque() {
        let s = spec();
        let (state, t) = wheel_torque(&s, s.top_rate(0.9), DriveInput::new(1, false), 0.0, I, DT);
        assert_eq!(state, MotorState::Accelerating);
        assert_eq!(t, -s.torque);
    }

    #[test]
    fn governor_cuts_drive_at_top_rate() {
        let s = spec();
        let top = s.top_rate(0.9);
        let (_, at_top) = wheel_torque(&s, top, DriveInput::new(1, false), -top, I, DT);
        assert_eq!(at_top, 0.0);
        // just below the top only what is needed to reach it in one tick
        let (_, near) = wheel_torque(&s, top, DriveInput::new(1, false), -(top - 0.01), I, DT);
        assert!((near + I * 0.01 / DT).abs() < 1.0, "{near}");
    }

    #[test]
    fn brake_opposes_spin_and_respects_deadband() {
        let s = spec();
        let top = s.top_rate(0.9);
        let (state, t) = wheel_torque(&s, top, DriveInput::new(0, true), -20.0, I, DT);
        assert_eq!(state, MotorState::Braking);
        assert_eq!(t, s.brake_torque);

        let (_, t) = wheel_torque(&s, top, DriveInput::new(0, true), 0.05, I, DT);
        assert_eq!(t, 0.0);

        // slow spin: capped so one tick cannot reverse it
        let (_, t) = wheel_torque(&s, top, DriveInput::new(0, true), 0.5, I, DT);
        assert!((t + I * 0.5 / DT).abs() < 1e-2, "{t}");
    }

    #[test]
    fn coasting_resistance_scales_with_rate_and_is_capped() {
        let s = spec();
        let top = s.top_rate(0.9);
        let (state, slow) = wheel_torque(&s, top, DriveInput::new(0, false), -5.0, I, DT);
        let (_, fast) = wheel_torque(&s, top, DriveInput::new(0, false), -10.0, I, DT);
        assert_eq!(state, MotorState::Decelerating);
        assert!(slow > 0.0 && fast > slow);
        let (_, huge) = wheel_torque(&s, top, DriveInput::new(0, false), -1000.0, I, DT);
        assert!((huge - s.rolling_resistance * s.torque).abs() < 1e-2);

        assert_eq!(wheel_torque(&s, top, DriveInput::new(0, false), 0.0, I, DT), (MotorState::Idle, 0.0));
    }
}
