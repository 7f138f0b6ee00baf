// ==============================================================================
// telemetry.rs — HUD NUMBERS
// ------------------------------------------------------------------------------
// speed: chassis linear speed (m/s)
// rpm:   -w * 60 / 2PI, so forward rolling reads positive
//
// TelemetrySampler holds the displayed values and refreshes them every
// REFRESH_INTERVAL seconds of simulated time so the readout does not flicker.
// ==============================================================================

use std::f32::consts::TAU;

use serde::Serialize;

use crate::vehicle::VehicleStates;

pub const REFRESH_INTERVAL: f32 = 0.25; // seconds

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Telemetry {
    pub speed: f32,
    pub rpm_rear: f32,
    pub rpm_front: f32,
}

pub fn rad_per_sec_to_rpm(w: f32) -> f32 {
    -w * 60.0 / TAU
}

impl Telemetry {
    pub fn read(states: &VehicleStates) -> Self {
        let [vx, vy] = states.chassis.linvel;
        Self {
            speed: (vx * vx + vy * vy).sqrt(),
            rpm_rear: rad_per_sec_to_rpm(states.rear.angvel),
            rpm_front: rad_per_sec_to_rpm(states.front.angvel),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TelemetrySampler {
    timer: f32,
    display: Telemetry,
}

impl TelemetrySampler {
    /// Advances the timer; resamples once the interval has elapsed.
    pub fn step(&mut self, dt: f32, states: &VehicleStates) -> Telemetry {
        self.timer += dt;
        if self.timer >= REFRESH_INTERVAL {
            self.display = Telemetry::read(states);
            self.timer = 0.0;
        }
        self.display
    }

    pub fn display(&self) -> Telemetry {
        self.display
    }
}

/// "MM:SS", seconds truncated.
pub fn format_level_time(seconds: f32) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BodyState;

    fn rolling(w: f32) -> VehicleStates {
        VehicleStates {
            chassis: BodyState { linvel: [3.0, 4.0], ..Default::default() },
            rear: BodyState { angvel: w, ..Default::default() },
            front: BodyState { angvel: w, ..Default::default() },
        }
    }

    #[test]
    fn forward_roll_reads_positive_rpm() {
        let t = Telemetry::read(&rolling(-TAU));
        assert_eq!(t.speed, 5.0);
        assert!((t.rpm_rear - 60.0).abs() < 1e-4);
        assert!((t.rpm_front - 60.0).abs() < 1e-4);
    }

    #[test]
    fn sampler_holds_values_between_refreshes() {
        let mut s = TelemetrySampler::default();
        let dt = 1.0 / 60.0;
        // first 14 ticks stay at the initial zeros
        for _ in 0..14 {
            assert_eq!(s.step(dt, &rolling(-1.0)).speed, 0.0);
        }
        let mut refreshed = false;
        for _ in 0..2 {
            refreshed |= s.step(dt, &rolling(-1.0)).speed == 5.0;
        }
        assert!(refreshed);
        // new readings are ignored until the next interval
        assert_eq!(s.step(dt, &rolling(-50.0)).rpm_rear, s.display().rpm_rear);
        assert!((s.display().rpm_rear - rad_per_sec_to_rpm(-1.0)).abs() < 1e-4);
    }

    #[test]
    fn level_time_format() {
        assert_eq!(format_level_time(0.0), "00:00");
        assert_eq!(format_level_time(59.9), "00:59");
        assert_eq!(format_level_time(61.0), "01:01");
        assert_eq!(format_level_time(3600.0), "60:00");
        assert_eq!(format_level_time(-3.0), "00:00");
    }
}
