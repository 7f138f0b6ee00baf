// ==============================================================================
// terrain — LEVEL GEOMETRY -> WORLD POLYLINES -> STATIC COLLISION SEGMENTS
// ------------------------------------------------------------------------------
// load():
//   1) read the level source (svg / heightmap / procedural course) into runs of
//      points in level units
//   2) map every point to world meters (LevelTransform: scale + Y flip)
//   3) drop points that coincide with their predecessor, drop runs left with
//      fewer than two points
// install():
//   one static segment per adjacent point pair, tagged with ground friction
//
// Terrain is built once per session and never mutated afterwards.
// ==============================================================================

pub mod course;
pub mod heightmap;
pub mod path;
pub mod svg;
pub mod transform;

use std::path::Path;

use log::info;
use serde::Serialize;

use crate::backend::{Aabb2, PhysicsBackend, Vec2};
use crate::config::{GeometrySource, LevelSpec};
use crate::error::{Error, Result};
pub use transform::{LevelTransform, YAxis};

/// One contiguous run of terrain points, world meters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub points: Vec<Vec2>,
}

impl Polyline {
    pub fn segments(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Longest distance between adjacent points.
    pub fn max_spacing(&self) -> f32 {
        self.segments()
            .map(|(a, b)| ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt())
            .fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone)]
pub struct Terrain {
    pub runs: Vec<Polyline>,
    pub transform: LevelTransform,
}

impl Terrain {
    /// Builds terrain from level-unit runs. Fails if no run keeps two points.
    pub fn from_level_runs(runs: Vec<Vec<Vec2>>, transform: LevelTransform, source_name: &str) -> Result<Self> {
        let mut out = Vec::with_capacity(runs.len());
        for run in runs {
            let mut points: Vec<Vec2> = Vec::with_capacity(run.len());
            for p in run {
                let w = transform.to_world(p);
                if points.last() != Some(&w) {
                    points.push(w);
                }
            }
            if points.len() >= 2 {
                out.push(Polyline { points });
            }
        }

        if out.is_empty() {
            return Err(Error::config("geometry", format!("{source_name} yields no terrain segments")));
        }
        Ok(Self { runs: out, transform })
    }

    /// Loads the level's geometry. Relative asset paths resolve against `asset_root`.
    pub fn load(level: &LevelSpec, asset_root: &Path) -> Result<Self> {
        let upm = level.units_per_meter;
        let terrain = match &level.geometry {
            GeometrySource::Svg { path } => {
                let full = asset_root.join(path);
                let name = full.display().to_string();
                let text = std::fs::read_to_string(&full)
                    .map_err(|e| Error::config("geometry.path", format!("cannot read {name}: {e}")))?;
                Self::from_svg_str(&text, &name, upm, level.samples_per_meter)?
            }
            GeometrySource::Heightmap { path, threshold } => {
                let full = asset_root.join(path);
                let (runs, height) = heightmap::load(&full, *threshold)?;
                let transform = LevelTransform::new(upm, YAxis::DownFrom(height as f32));
                Self::from_level_runs(runs, transform, &full.display().to_string())?
            }
            GeometrySource::Course(course) => {
                let transform = LevelTransform::new(upm, YAxis::Up);
                Self::from_level_runs(course::build(course), transform, &level.name)?
            }
        };

        info!(
            "🏔️ Terrain '{}': {} run(s), {} segment(s)",
            level.name,
            terrain.runs.len(),
            terrain.segment_count()
        );
        Ok(terrain)
    }

    pub fn from_svg_str(text: &str, source_name: &str, units_per_meter: f32, samples_per_meter: f32) -> Result<Self> {
        let subpaths = svg::path_elements(text, source_name)?;
        let runs = path::flatten(&subpaths, units_per_meter, samples_per_meter, source_name)?;
        Self::from_level_runs(runs, LevelTransform::new(units_per_meter, YAxis::Down), source_name)
    }

    pub fn segment_count(&self) -> usize {
        self.runs.iter().map(|r| r.points.len() - 1).sum()
    }

    pub fn max_spacing(&self) -> f32 {
        self.runs.iter().map(Polyline::max_spacing).fold(0.0, f32::max)
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.runs
            .iter()
            .flat_map(|r| r.points.iter())
            .map(|p| Aabb2 { mins: *p, maxs: *p })
            .reduce(|a, b| a.merged(&b))
    }

    /// Adds one static segment per adjacent point pair. Returns the count.
    pub fn install<B: PhysicsBackend>(&self, backend: &mut B, radius: f32, friction: f32) -> usize {
        let mut n = 0;
        for run in &self.runs {
            for (a, b) in run.segments() {
                backend.add_static_segment(a, b, radius, friction);
                n += 1;
            }
        }
        n
    }
}
