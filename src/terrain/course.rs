// ==============================================================================
// course.rs — PROCEDURAL TEST COURSE (FLOOR + COSINE JUMPS)
// ------------------------------------------------------------------------------
// Level units are y-up here.
// - floor: one straight run (0, floor_y) -> (length, floor_y)
// - jump:  its own run, a cosine ramp sitting on the floor
//            y(t) = floor_y + amplitude * (1 - cos(t * PI/2)),  t in [0, cutoff]
//            x(t) = start_x + t * width
//          sampled at t = k/steps, stopping at the cutoff (partial ramps end
//          in a lip instead of reaching full height)
// - random_jumps: extra ramps from a seeded RNG, same seed -> same course
// ==============================================================================

use std::f32::consts::FRAC_PI_2;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::Vec2;
use crate::config::{CourseSpec, JumpSpec};

// Random jumps stay clear of the start and the end of the course (level units).
const RANDOM_MARGIN_START: f32 = 60.0;
const RANDOM_MARGIN_END: f32 = 40.0;

pub fn jump_points(floor_y: f32, jump: &JumpSpec) -> Vec<Vec2> {
    let steps = jump.steps.max(1);
    let mut points = Vec::with_capacity(steps + 2);

    for k in 0..=steps {
        let t = k as f32 / steps as f32;
        if t > jump.cutoff {
            break;
        }
        points.push(ramp_point(floor_y, jump, t));
    }
    // land exactly on the cutoff when it falls between samples
    let last_t = (points.len().saturating_sub(1)) as f32 / steps as f32;
    if jump.cutoff > last_t {
        points.push(ramp_point(floor_y, jump, jump.cutoff));
    }
    points
}

fn ramp_point(floor_y: f32, jump: &JumpSpec, t: f32) -> Vec2 {
    [
        jump.start_x + t * jump.width,
        floor_y + jump.amplitude * (1.0 - (t * FRAC_PI_2).cos()),
    ]
}

/// Fixed jumps followed by the seeded random ones, sorted by start.
pub fn all_jumps(course: &CourseSpec) -> Vec<JumpSpec> {
    let mut jumps = course.jumps.clone();

    let lo = RANDOM_MARGIN_START;
    let hi = course.length - RANDOM_MARGIN_END;
    if course.random_jumps > 0 && hi > lo {
        let mut rng = StdRng::seed_from_u64(course.seed);
        for _ in 0..course.random_jumps {
            jumps.push(JumpSpec {
                start_x: rng.gen_range(lo..hi),
                width: rng.gen_range(2.0..6.0),
                amplitude: rng.gen_range(0.5..2.5),
                cutoff: rng.gen_range(0.6..=1.0),
                steps: 16,
            });
        }
    }
    jumps.sort_by(|a, b| a.start_x.total_cmp(&b.start_x));
    jumps
}

/// Runs in level units (y up): the floor first, then one run per jump.
pub fn build(course: &CourseSpec) -> Vec<Vec<Vec2>> {
    let mut runs = vec![vec![[0.0, course.floor_y], [course.length, course.floor_y]]];
    for jump in all_jumps(course) {
        runs.push(jump_points(course.floor_y, &jump));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump(cutoff: f32) -> JumpSpec {
        JumpSpec { start_x: 20.0, width: 3.0, amplitude: 2.0, cutoff, steps: 16 }
    }

    #[test]
    fn full_ramp_spans_width_and_amplitude() {
        let pts = jump_points(1.0, &jump(1.0));
        assert_eq!(pts.len(), 17);
        assert_eq!(pts[0], [20.0, 1.0]);
        let last = pts[16];
        assert!((last[0] - 23.0).abs() < 1e-5);
        assert!((last[1] - 3.0).abs() < 1e-5);
        assert!(pts.windows(2).all(|w| w[1][1] >= w[0][1]));
    }

    #[test]
    fn partial_ramp_stops_at_cutoff() {
        let pts = jump_points(1.0, &jump(0.7));
        let last = *pts.last().unwrap();
        assert!((last[0] - (20.0 + 0.7 * 3.0)).abs() < 1e-5);
        assert!(last[1] < 3.0);
        // no repeated points at the lip
        assert!(pts.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn random_jumps_are_deterministic_and_inside_the_course() {
        let spec = CourseSpec { length: 400.0, floor_y: 1.0, jumps: vec![], random_jumps: 8, seed: 42 };
        let a = all_jumps(&spec);
        let b = all_jumps(&spec);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.windows(2).all(|w| w[0].start_x <= w[1].start_x));
        assert!(a.iter().all(|j| j.start_x >= 60.0 && j.start_x < 360.0));

        let other = all_jumps(&CourseSpec { seed: 43, ..spec });
        assert_ne!(a, other);
    }

    #[test]
    fn short_course_gets_no_random_jumps() {
        let spec = CourseSpec { length: 80.0, floor_y: 0.0, jumps: vec![], random_jumps: 5, seed: 1 };
        assert!(all_jumps(&spec).is_empty());
        assert_eq!(build(&spec).len(), 1);
    }
}
