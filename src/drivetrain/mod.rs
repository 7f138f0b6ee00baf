// ==============================================================================
// drivetrain — DRIVER INPUT -> WHEEL TORQUE (+ CHASSIS REACTION)
// ------------------------------------------------------------------------------
// One controller per vehicle. It drives the rear wheel; the gear coupling
// carries the motion to the front wheel, so `inertia` passed in is the
// effective rotational inertia the rear wheel sees.
//
// Two laws, picked by DrivetrainSpec::mode:
// - Torque (torque.rs): torque straight from input each tick
// - Rate   (slew.rs):   bounded-slew commanded rate, chased by a servo whose
//                      torque is limited by drive torque (brake torque while
//                      braking)
//
// Whatever the law produces for the wheel, the chassis gets the negative in
// the same tick.
// ==============================================================================

pub mod slew;
pub mod torque;

use serde::Serialize;

use crate::config::{DriveMode, DrivetrainSpec};
use slew::{RateController, SlewRates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotorState {
    Idle,
    Accelerating,
    Decelerating,
    Braking,
}

/// Per-tick driver input. Out-of-range directions are clamped to -1..=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveInput {
    pub direction: i8, // 1 forward, -1 reverse, 0 none
    pub braking: bool,
}

impl DriveInput {
    pub fn new(direction: i8, braking: bool) -> Self {
        Self { direction: direction.signum(), braking }
    }

    /// Analog axis (keys, sticks) to a direction with a small dead zone.
    pub fn from_axis(axis: f32, braking: bool) -> Self {
        let direction = if axis > 0.5 {
            1
        } else if axis < -0.5 {
            -1
        } else {
            0
        };
        Self { direction, braking }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TorquePair {
    pub wheel: f32,
    pub chassis: f32,
}

impl TorquePair {
    pub fn from_wheel(wheel: f32) -> Self {
        Self { wheel, chassis: -wheel }
    }
}

#[derive(Debug, Clone)]
pub struct Drivetrain {
    pub spec: DrivetrainSpec,
    pub top_rate: f32, // rad/s for the driven wheel
    rate: RateController,
    state: MotorState,
    last: TorquePair,
}

impl Drivetrain {
    pub fn new(spec: &DrivetrainSpec, wheel_radius: f32) -> Self {
        let top_rate = spec.top_rate(wheel_radius);
        let rates = SlewRates {
            accel: spec.accel_rate,
            decel: spec.decel_rate,
            brake: spec.brake_rate,
        };
        Self {
            spec: spec.clone(),
            top_rate,
            rate: RateController::new(rates, top_rate),
            state: MotorState::Idle,
            last: TorquePair::default(),
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Rate-mode commanded wheel rate (0 in torque mode).
    pub fn commanded_rate(&self) -> f32 {
        self.rate.current
    }

    pub fn last_torque(&self) -> TorquePair {
        self.last
    }

    /// One tick. `angvel` is the driven wheel's current rate, `inertia` the
    /// rotational inertia it drives.
    pub fn update(&mut self, input: DriveInput, angvel: f32, inertia: f32, dt: f32) -> TorquePair {
        if !(dt > 0.0 && dt.is_finite()) || !angvel.is_finite() {
            self.last = TorquePair::default();
            return self.last;
        }

        let wheel = match self.spec.mode {
            DriveMode::Torque => {
                let (state, t) = torque::wheel_torque(&self.spec, self.top_rate, input, angvel, inertia, dt);
                self.state = state;
                t
            }
            DriveMode::Rate => {
                let commanded = self.rate.step(input, dt);
                self.state = self.rate.state;
                let limit = if self.state == MotorState::Braking {
                    self.spec.brake_torque
                } else {
                    self.spec.torque
                };
                (inertia * (commanded - angvel) / dt).clamp(-limit, limit)
            }
        };

        self.last = TorquePair::from_wheel(wheel);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::simple_green;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn input_is_clamped() {
        assert_eq!(DriveInput::new(7, false).direction, 1);
        assert_eq!(DriveInput::new(-3, true).direction, -1);
        assert_eq!(DriveInput::from_axis(0.2, false).direction, 0);
        assert_eq!(DriveInput::from_axis(-1.0, false).direction, -1);
    }

    #[test]
    fn rate_mode_servo_is_torque_limited() {
        let mut spec = simple_green().drivetrain;
        spec.mode = DriveMode::Rate;
        let mut drive = Drivetrain::new(&spec, 0.9);

        let pair = drive.update(DriveInput::new(1, false), 0.0, 486.0, DT);
        // commanded rate after one tick is -12/60, servo wants I*0.2*60
        assert!(pair.wheel < 0.0);
        assert!(pair.wheel.abs() <= spec.torque);
        assert_eq!(drive.state(), MotorState::Accelerating);
        assert!((drive.commanded_rate() + 12.0 * DT).abs() < 1e-6);
    }

    #[test]
    fn torque_mode_keeps_no_rate_state() {
        let spec = simple_green().drivetrain;
        let mut d = Drivetrain::new(&spec, 0.9);
        d.update(DriveInput::new(1, false), 0.0, 486.0, DT);
        assert_eq!(d.commanded_rate(), 0.0);
        assert_eq!(d.last_torque().wheel, -spec.torque);
    }

    #[test]
    fn non_finite_inputs_apply_nothing() {
        let mut d = Drivetrain::new(&simple_green().drivetrain, 0.9);
        assert_eq!(d.update(DriveInput::new(1, false), f32::NAN, 486.0, DT), TorquePair::default());
        assert_eq!(d.update(DriveInput::new(1, false), 0.0, 486.0, -1.0), TorquePair::default());
    }

    proptest! {
        #[test]
        fn chassis_reaction_is_exact_negative(
            direction in -1i8..=1,
            braking in any::<bool>(),
            angvel in -60.0f32..60.0,
            rate_mode in any::<bool>(),
            ticks in 1usize..30,
        ) {
            let mut spec = simple_green().drivetrain;
            if rate_mode {
                spec.mode = DriveMode::Rate;
            }
            let mut d = Drivetrain::new(&spec, 0.9);
            for _ in 0..ticks {
                let pair = d.update(DriveInput::new(direction, braking), angvel, 486.0, DT);
                prop_assert_eq!(pair.wheel + pair.chassis, 0.0);
                prop_assert!(pair.wheel.abs() <= spec.torque.max(spec.brake_torque));
            }
        }
    }
}
