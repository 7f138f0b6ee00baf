// ==============================================================================
// heightmap.rs — GRAYSCALE IMAGE -> ISO-CONTOUR POLYLINES (MARCHING SQUARES)
// ------------------------------------------------------------------------------
// One sample per pixel, value = luma / 255. A grid point is "solid" when its
// value is above the threshold. Each 2x2 cell emits 0, 1 or 2 segments between
// crossing points on its edges; crossings are linearly interpolated. Saddles
// (diagonal corners solid) are resolved with the cell-center average.
//
// Segments are then chained through their shared edge crossings into runs:
// - open runs start at a crossing used once (image border)
// - closed loops repeat their first point at the end
// Every run is oriented left -> right (first.x <= last.x).
//
// Output is in pixel units, y down.
// ==============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use log::info;

use crate::backend::Vec2;
use crate::error::{Error, Result};

/// Pixel-grid luma samples in [0, 1].
pub struct Heightmap {
    pub width: u32,
    pub height: u32,
    samples: Vec<f32>,
}

impl Heightmap {
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Self {
        let mut samples = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self { width, height, samples }
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::config("geometry.path", format!("heightmap {} not found", path.display())));
        }
        let img = image::open(path)
            .map_err(|e| Error::parse(path.display().to_string(), None, e.to_string()))?
            .to_luma8();
        let (width, height) = img.dimensions();
        info!("🖼️ heightmap {} ({}x{})", path.display(), width, height);
        Ok(Self::from_fn(width, height, |x, y| img.get_pixel(x, y).0[0] as f32 / 255.0))
    }

    #[inline]
    fn at(&self, x: u32, y: u32) -> f32 {
        self.samples[(y * self.width + x) as usize]
    }

    /// Iso-contours at `threshold`, pixel units.
    pub fn contours(&self, threshold: f32) -> Vec<Vec<Vec2>> {
        if self.width < 2 || self.height < 2 {
            return Vec::new();
        }
        let mut graph = Graph::default();

        for j in 0..self.height - 1 {
            for i in 0..self.width - 1 {
                self.march_cell(i, j, threshold, &mut graph);
            }
        }
        graph.chain()
    }

    fn march_cell(&self, i: u32, j: u32, thr: f32, graph: &mut Graph) {
        let tl = self.at(i, j);
        let tr = self.at(i + 1, j);
        let br = self.at(i + 1, j + 1);
        let bl = self.at(i, j + 1);

        let case = ((tl > thr) as u8) << 3 | ((tr > thr) as u8) << 2 | ((br > thr) as u8) << 1 | (bl > thr) as u8;
        if case == 0 || case == 15 {
            return;
        }

        let (fi, fj) = (i as f32, j as f32);
        let cross = |va: f32, vb: f32| ((thr - va) / (vb - va)).clamp(0.0, 1.0);

        let top = (EdgeKey::H(i, j), [fi + cross(tl, tr), fj]);
        let bottom = (EdgeKey::H(i, j + 1), [fi + cross(bl, br), fj + 1.0]);
        let left = (EdgeKey::V(i, j), [fi, fj + cross(tl, bl)]);
        let right = (EdgeKey::V(i + 1, j), [fi + 1.0, fj + cross(tr, br)]);

        let center_solid = (tl + tr + br + bl) * 0.25 > thr;

        match case {
            1 | 14 => graph.add(left, bottom),
            2 | 13 => graph.add(bottom, right),
            3 | 12 => graph.add(left, right),
            4 | 11 => graph.add(top, right),
            6 | 9 => graph.add(top, bottom),
            7 | 8 => graph.add(left, top),
            5 => {
                // tr + bl solid
                if center_solid {
                    graph.add(left, top);
                    graph.add(bottom, right);
                } else {
                    graph.add(top, right);
                    graph.add(left, bottom);
                }
            }
            10 => {
                // tl + br solid
                if center_solid {
                    graph.add(top, right);
                    graph.add(left, bottom);
                } else {
                    graph.add(left, top);
                    graph.add(bottom, right);
                }
            }
            _ => {}
        }
    }
}

/// Horizontal edge (i,j)-(i+1,j) or vertical edge (i,j)-(i,j+1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeKey {
    H(u32, u32),
    V(u32, u32),
}

#[derive(Default)]
struct Graph {
    points: BTreeMap<EdgeKey, Vec2>,
    links: BTreeMap<EdgeKey, Vec<usize>>,
    segments: Vec<(EdgeKey, EdgeKey)>,
}

impl Graph {
    fn add(&mut self, a: (EdgeKey, Vec2), b: (EdgeKey, Vec2)) {
        let id = self.segments.len();
        self.segments.push((a.0, b.0));
        for (key, p) in [a, b] {
            self.points.insert(key, p);
            self.links.entry(key).or_default().push(id);
        }
    }

    fn chain(self) -> Vec<Vec<Vec2>> {
        let mut used = vec![false; self.segments.len()];
        let mut runs = Vec::new();

        // open runs first, from their dangling ends
        let ends: Vec<EdgeKey> = self.links.iter().filter(|(_, s)| s.len() == 1).map(|(k, _)| *k).collect();
        for start in ends {
            if let Some(run) = self.walk(start, &mut used) {
                runs.push(run);
            }
        }
        // what is left are closed loops
        for id in 0..self.segments.len() {
            if !used[id] {
                if let Some(run) = self.walk(self.segments[id].0, &mut used) {
                    runs.push(run);
                }
            }
        }

        for run in &mut runs {
            if let (Some(first), Some(last)) = (run.first(), run.last()) {
                if first[0] > last[0] {
                    run.reverse();
                }
            }
        }
        runs
    }

    fn walk(&self, start: EdgeKey, used: &mut [bool]) -> Option<Vec<Vec2>> {
        let mut keys = vec![start];
        let mut node = start;
        while let Some(&id) = self.links.get(&node).and_then(|s| s.iter().find(|&&id| !used[id])) {
            used[id] = true;
            let (a, b) = self.segments[id];
            node = if a == node { b } else { a };
            keys.push(node);
        }
        if keys.len() < 2 {
            return None;
        }
        Some(keys.iter().filter_map(|k| self.points.get(k).copied()).collect())
    }
}

/// Loads `path` and returns (contours in pixel units, image height in pixels).
pub fn load(path: &Path, threshold: f32) -> Result<(Vec<Vec<Vec2>>, u32)> {
    let map = Heightmap::open(path)?;
    let runs = map.contours(threshold);
    if runs.is_empty() {
        return Err(Error::config(
            "geometry",
            format!("{} has no contour at threshold {}", path.display(), threshold),
        ));
    }
    Ok((runs, map.height))
}
