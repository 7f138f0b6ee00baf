// ==============================================================================
// slew.rs — RATE-MODE MOTOR: BOUNDED-SLEW COMMANDED WHEEL RATE
// ------------------------------------------------------------------------------
// target:  forward -> -top_rate, reverse -> +top_rate, neutral or brake -> 0
//
// slew rate per tick, first match wins:
//   braking                          -> brake_rate  (Braking)
//   current and target opposite sign -> brake_rate  (Braking, through zero)
//   target 0, current != 0           -> decel_rate  (Decelerating, coasting)
//   current == target == 0           -> none        (Idle)
//   otherwise                        -> accel_rate  (Accelerating)
//
// current moves toward target by at most rate * dt and snaps onto it once
// within SNAP_EPSILON. While current and target have opposite signs the move
// stops at zero, so the new direction always starts at accel_rate.
// ==============================================================================

use super::{DriveInput, MotorState};

pub const SNAP_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewRates {
    pub accel: f32, // rad/s^2
    pub decel: f32,
    pub brake: f32,
}

/// Moves `current` toward `target` by at most `max_step`. Never overshoots.
pub fn move_towards(current: f32, target: f32, max_step: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_step || delta.abs() < SNAP_EPSILON {
        target
    } else {
        current + delta.signum() * max_step
    }
}

pub fn target_rate(input: DriveInput, top_rate: f32) -> f32 {
    if input.braking {
        0.0
    } else {
        -(input.direction as f32) * top_rate
    }
}

/// Which case applies this tick, and the slew rate it uses.
pub fn select(current: f32, target: f32, braking: bool, rates: &SlewRates) -> (MotorState, f32) {
    if braking {
        (MotorState::Braking, rates.brake)
    } else if current * target < 0.0 {
        (MotorState::Braking, rates.brake)
    } else if target == 0.0 && current != 0.0 {
        (MotorState::Decelerating, rates.decel)
    } else if target == 0.0 {
        (MotorState::Idle, rates.decel)
    } else {
        (MotorState::Accelerating, rates.accel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateController {
    pub rates: SlewRates,
    pub top_rate: f32,
    pub current: f32,
    pub target: f32,
    pub state: MotorState,
}

impl RateController {
    pub fn new(rates: SlewRates, top_rate: f32) -> Self {
        Self {
            rates,
            top_rate,
            current: 0.0,
            target: 0.0,
            state: MotorState::Idle,
        }
    }

    /// Advances the commanded rate by one tick and returns it.
    pub fn step(&mut self, input: DriveInput, dt: f32) -> f32 {
        if !(dt > 0.0 && dt.is_finite()) {
            return self.current;
        }
        self.target = target_rate(input, self.top_rate);
        let (state, rate) = select(self.current, self.target, input.braking, &self.rates);
        self.state = state;
        let goal = if self.current * self.target < 0.0 { 0.0 } else { self.target };
        self.current = move_towards(self.current, goal, rate * dt);
        self.current
    }
}
