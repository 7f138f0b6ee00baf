// ==============================================================================
// path.rs — SVG PATH DATA ("d" attribute) -> SUBPATHS -> SAMPLED POINTS
// ------------------------------------------------------------------------------
// parse_path_data():
//   M/m L/l H/h V/v C/c S/s Q/q T/t Z/z, absolute and relative, implicit
//   command repetition, compact number syntax ("1-2", ".5.5", "1e-3").
//   Quadratics are raised to cubics. Arcs are rejected.
//
// flatten():
//   Each subpath becomes one run of points in source units.
//   - the subpath start is emitted once
//   - a line contributes its end point
//   - a cubic contributes n points at t = 1/n .. n/n where
//       n = max(2, ceil(control_polygon_length / units_per_meter * samples_per_meter))
//     The control polygon length bounds the arc length from above, which is
//     all terrain smoothness needs. A curve needing more than
//     MAX_CURVE_SAMPLES points is a ParseError.
// ==============================================================================

use crate::backend::Vec2;
use crate::error::{Error, Result};

/// Per-cubic ceiling (50 km of curve at 2 samples/m).
pub const MAX_CURVE_SAMPLES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line { to: Vec2 },
    Cubic { from: Vec2, c1: Vec2, c2: Vec2, to: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub start: Vec2,
    pub segments: Vec<Segment>,
}

#[inline]
fn dist(a: Vec2, b: Vec2) -> f32 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt()
}

#[inline]
fn lerp(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Number of points a cubic contributes at the given sampling density.
pub fn cubic_sample_count(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, units_per_meter: f32, samples_per_meter: f32) -> usize {
    let length = (dist(p0, p1) + dist(p1, p2) + dist(p2, p3)) / units_per_meter;
    let n = (length * samples_per_meter).ceil();
    if n.is_finite() && n > 2.0 { n as usize } else { 2 }
}

pub fn cubic_point(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    let (b0, b1, b2, b3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    [
        b0 * p0[0] + b1 * p1[0] + b2 * p2[0] + b3 * p3[0],
        b0 * p0[1] + b1 * p1[1] + b2 * p2[1] + b3 * p3[1],
    ]
}

/// Runs of points in source units, one per subpath.
pub fn flatten(
    subpaths: &[Subpath],
    units_per_meter: f32,
    samples_per_meter: f32,
    source_name: &str,
) -> Result<Vec<Vec<Vec2>>> {
    let mut runs = Vec::with_capacity(subpaths.len());

    for sp in subpaths {
        let mut points = vec![sp.start];
        for seg in &sp.segments {
            match *seg {
                Segment::Line { to } => points.push(to),
                Segment::Cubic { from, c1, c2, to } => {
                    let n = cubic_sample_count(from, c1, c2, to, units_per_meter, samples_per_meter);
                    if n > MAX_CURVE_SAMPLES {
                        return Err(Error::parse(
                            source_name,
                            None,
                            format!("curve from {from:?} to {to:?} needs {n} samples (max {MAX_CURVE_SAMPLES})"),
                        ));
                    }
                    for k in 1..n {
                        points.push(cubic_point(from, c1, c2, to, k as f32 / n as f32));
                    }
                    points.push(to); // exact end, no t rounding
                }
            }
        }
        runs.push(points);
    }
    Ok(runs)
}

// --------------------------------------------------
// lexer
// --------------------------------------------------

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    source_name: &'a str,
}

impl<'a> Lexer<'a> {
    fn skip_separators(&mut self) {
        while let Some(&c) = self.src.get(self.pos) {
            if c.is_ascii_whitespace() || c == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.pos >= self.src.len()
    }

    fn peek_command(&mut self) -> Option<u8> {
        self.skip_separators();
        self.src.get(self.pos).copied().filter(|c| c.is_ascii_alphabetic())
    }

    fn has_number(&mut self) -> bool {
        self.skip_separators();
        matches!(self.src.get(self.pos), Some(c) if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.'))
    }

    fn error(&self, at: usize, reason: impl Into<String>) -> Error {
        Error::parse(self.source_name, Some(at), reason)
    }

    fn number(&mut self) -> Result<f32> {
        self.skip_separators();
        let start = self.pos;
        let s = self.src;
        let mut i = self.pos;

        if matches!(s.get(i), Some(b'-' | b'+')) {
            i += 1;
        }
        let mut digits = 0;
        while matches!(s.get(i), Some(c) if c.is_ascii_digit()) {
            i += 1;
            digits += 1;
        }
        if s.get(i) == Some(&b'.') {
            i += 1;
            while matches!(s.get(i), Some(c) if c.is_ascii_digit()) {
                i += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            return Err(self.error(start, "expected a number"));
        }
        // exponent only if digits follow, so "1e" never eats a command letter
        if matches!(s.get(i), Some(b'e' | b'E')) {
            let mut j = i + 1;
            if matches!(s.get(j), Some(b'-' | b'+')) {
                j += 1;
            }
            if matches!(s.get(j), Some(c) if c.is_ascii_digit()) {
                while matches!(s.get(j), Some(c) if c.is_ascii_digit()) {
                    j += 1;
                }
                i = j;
            }
        }

        // the slice is ASCII by construction
        let text = std::str::from_utf8(&s[start..i]).map_err(|_| self.error(start, "invalid number"))?;
        let v: f32 = text.parse().map_err(|_| self.error(start, format!("invalid number `{text}`")))?;
        if !v.is_finite() {
            return Err(self.error(start, format!("number out of range `{text}`")));
        }
        self.pos = i;
        Ok(v)
    }

    fn pair(&mut self) -> Result<Vec2> {
        Ok([self.number()?, self.number()?])
    }
}

// --------------------------------------------------
// parser
// --------------------------------------------------

#[inline]
fn offset(p: Vec2, base: Vec2, relative: bool) -> Vec2 {
    if relative { [p[0] + base[0], p[1] + base[1]] } else { p }
}

#[inline]
fn reflect(ctrl: Vec2, about: Vec2) -> Vec2 {
    [2.0 * about[0] - ctrl[0], 2.0 * about[1] - ctrl[1]]
}

pub fn parse_path_data(d: &str, source_name: &str) -> Result<Vec<Subpath>> {
    let mut lx = Lexer { src: d.as_bytes(), pos: 0, source_name };
    let mut subpaths: Vec<Subpath> = Vec::new();

    let mut current: Vec2 = [0.0, 0.0];
    let mut subpath_start: Vec2 = [0.0, 0.0];
    let mut last_cubic_ctrl: Option<Vec2> = None; // for S/s
    let mut last_quad_ctrl: Option<Vec2> = None; // for T/t

    while !lx.at_end() {
        let at = lx.pos;
        let Some(cmd) = lx.peek_command() else {
            let reason = if subpaths.is_empty() { "path data must start with a moveto" } else { "expected a command" };
            return Err(lx.error(at, reason));
        };
        lx.pos += 1;

        let relative = cmd.is_ascii_lowercase();
        let upper = cmd.to_ascii_uppercase();

        if subpaths.is_empty() && upper != b'M' {
            return Err(lx.error(at, "path data must start with a moveto"));
        }

        match upper {
            b'M' => {
                let p = offset(lx.pair()?, current, relative);
                current = p;
                subpath_start = p;
                subpaths.push(Subpath { start: p, segments: Vec::new() });
                // further pairs are implicit linetos
                while lx.has_number() {
                    let p = offset(lx.pair()?, current, relative);
                    push_segment(&mut subpaths, Segment::Line { to: p });
                    current = p;
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'L' | b'H' | b'V' => {
                loop {
                    let p = match upper {
                        b'L' => offset(lx.pair()?, current, relative),
                        b'H' => {
                            let x = lx.number()?;
                            [if relative { current[0] + x } else { x }, current[1]]
                        }
                        _ => {
                            let y = lx.number()?;
                            [current[0], if relative { current[1] + y } else { y }]
                        }
                    };
                    push_segment(&mut subpaths, Segment::Line { to: p });
                    current = p;
                    if !lx.has_number() {
                        break;
                    }
                }
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'C' | b'S' => {
                loop {
                    let c1 = if upper == b'C' {
                        offset(lx.pair()?, current, relative)
                    } else {
                        last_cubic_ctrl.map(|c| reflect(c, current)).unwrap_or(current)
                    };
                    let c2 = offset(lx.pair()?, current, relative);
                    let to = offset(lx.pair()?, current, relative);
                    push_segment(&mut subpaths, Segment::Cubic { from: current, c1, c2, to });
                    last_cubic_ctrl = Some(c2);
                    current = to;
                    if !lx.has_number() {
                        break;
                    }
                }
                last_quad_ctrl = None;
            }
            b'Q' | b'T' => {
                loop {
                    let q = if upper == b'Q' {
                        offset(lx.pair()?, current, relative)
                    } else {
                        last_quad_ctrl.map(|c| reflect(c, current)).unwrap_or(current)
                    };
                    let to = offset(lx.pair()?, current, relative);
                    // degree elevation: quadratic -> cubic
                    let c1 = lerp(current, q, 2.0 / 3.0);
                    let c2 = lerp(to, q, 2.0 / 3.0);
                    push_segment(&mut subpaths, Segment::Cubic { from: current, c1, c2, to });
                    last_quad_ctrl = Some(q);
                    current = to;
                    if !lx.has_number() {
                        break;
                    }
                }
                last_cubic_ctrl = None;
            }
            b'Z' => {
                if current != subpath_start {
                    push_segment(&mut subpaths, Segment::Line { to: subpath_start });
                }
                current = subpath_start;
                last_cubic_ctrl = None;
                last_quad_ctrl = None;
            }
            b'A' => return Err(lx.error(at, "elliptical arc commands are not supported")),
            other => return Err(lx.error(at, format!("unknown path command `{}`", other as char))),
        }
    }

    Ok(subpaths)
}

fn push_segment(subpaths: &mut [Subpath], seg: Segment) {
    // callers guarantee a moveto came first
    if let Some(sp) = subpaths.last_mut() {
        sp.segments.push(seg);
    }
}
