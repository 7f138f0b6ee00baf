// ==============================================================================
// transform.rs — LEVEL UNITS <-> WORLD METERS
// ------------------------------------------------------------------------------
// Level art is authored in its own units with its own Y convention:
// - SVG:       y grows downward          -> world y = -y / units_per_meter
// - heightmap: pixel rows from the top   -> world y = (height - y) / units_per_meter
// - course:    already y-up              -> world y =  y / units_per_meter
// World space is meters with y up.
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::backend::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum YAxis {
    Down,
    DownFrom(f32), // image height in source units
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelTransform {
    pub units_per_meter: f32,
    pub y_axis: YAxis,
}

impl LevelTransform {
    pub fn new(units_per_meter: f32, y_axis: YAxis) -> Self {
        Self { units_per_meter, y_axis }
    }

    pub fn to_world(&self, p: Vec2) -> Vec2 {
        let y = match self.y_axis {
            YAxis::Down => -p[1],
            YAxis::DownFrom(h) => h - p[1],
            YAxis::Up => p[1],
        };
        [p[0] / self.units_per_meter, y / self.units_per_meter]
    }

    pub fn to_level(&self, p: Vec2) -> Vec2 {
        let y = p[1] * self.units_per_meter;
        let y = match self.y_axis {
            YAxis::Down => -y,
            YAxis::DownFrom(h) => h - y,
            YAxis::Up => y,
        };
        [p[0] * self.units_per_meter, y]
    }

    /// Horizontal level coordinate (finish lines, checkpoints) to world x.
    pub fn x_to_world(&self, x: f32) -> f32 {
        x / self.units_per_meter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn svg_flip() {
        let t = LevelTransform::new(5.0, YAxis::Down);
        assert_eq!(t.to_world([230.0, 440.0]), [46.0, -88.0]);
    }

    #[test]
    fn image_flip() {
        let t = LevelTransform::new(10.0, YAxis::DownFrom(200.0));
        assert_eq!(t.to_world([50.0, 150.0]), [5.0, 5.0]);
        assert_eq!(t.to_world([0.0, 200.0]), [0.0, 0.0]);
    }

    fn close(a: f32, b: f32, scale: f32) -> bool {
        (a - b).abs() <= 1e-4 * (1.0 + scale)
    }

    proptest! {
        #[test]
        fn round_trip_returns_input(
            x in -1.0e5f32..1.0e5,
            y in -1.0e5f32..1.0e5,
            upm in 0.01f32..100.0,
            h in 0.0f32..1.0e4,
            mode in 0u8..3,
        ) {
            let y_axis = match mode {
                0 => YAxis::Down,
                1 => YAxis::DownFrom(h),
                _ => YAxis::Up,
            };
            let t = LevelTransform::new(upm, y_axis);
            let back = t.to_level(t.to_world([x, y]));
            // f32 rounding grows with the magnitudes involved
            let scale = x.abs() + y.abs() + h;
            prop_assert!(close(back[0], x, scale), "x {} -> {}", x, back[0]);
            prop_assert!(close(back[1], y, scale), "y {} -> {}", y, back[1]);
        }
    }
}
