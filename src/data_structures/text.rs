//! Extruded 3D text built from a typeface font description.
//!
//! The font format is the JSON "typeface" layout: per glyph an advance width
//! (`ha`) and an outline string made of `m` (move), `l` (line), `q`
//! (quadratic) and `b` (cubic) commands in font units. Curve commands list the
//! end point first and the control points after it.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::data_structures::geometry::{Geometry, ModelVertex};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ha: f32,
    #[serde(default)]
    pub x_min: f32,
    #[serde(default)]
    pub x_max: f32,
    /// Absent for blank glyphs such as the space character.
    #[serde(default)]
    pub o: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typeface {
    #[serde(default)]
    pub family_name: String,
    pub glyphs: HashMap<String, Glyph>,
    pub resolution: f32,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub underline_thickness: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    /// Height of a glyph em box in scene units.
    pub size: f32,
    /// Extrusion depth along +Z.
    pub depth: f32,
    /// Points each curve is flattened into.
    pub curve_segments: u32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            size: 100.0,
            depth: 50.0,
            curve_segments: 12,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    #[error("glyph `{glyph}`: unknown outline command `{command}`")]
    UnknownCommand { glyph: String, command: String },
    #[error("glyph `{glyph}`: outline ends in the middle of a command")]
    Truncated { glyph: String },
    #[error("glyph `{glyph}`: `{token}` is not a number")]
    NotANumber { glyph: String, token: String },
}

type Point = [f32; 2];

impl Typeface {
    /// Flattens `text` into closed contours, laid out from the origin.
    /// Newlines move down by the font's line height.
    pub fn contours(&self, text: &str, options: &TextOptions) -> Result<Vec<Vec<Point>>, OutlineError> {
        let scale = options.size / self.resolution;
        let line_height = (self.bounding_box.y_max - self.bounding_box.y_min
            + self.underline_thickness)
            * scale;
        let mut offset = [0.0f32, 0.0f32];
        let mut contours = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                offset = [0.0, offset[1] - line_height];
                continue;
            }
            let key = ch.to_string();
            let Some(glyph) = self.glyphs.get(&key).or_else(|| self.glyphs.get("?")) else {
                warn!(
                    "Character `{}` does not exist in font family {}.",
                    ch, self.family_name
                );
                continue;
            };
            if let Some(outline) = &glyph.o {
                let mut glyph_contours =
                    flatten_outline(&key, outline, scale, offset, options.curve_segments)?;
                contours.append(&mut glyph_contours);
            }
            offset[0] += glyph.ha * scale;
        }
        Ok(contours)
    }
}

fn flatten_outline(
    glyph: &str,
    outline: &str,
    scale: f32,
    offset: Point,
    curve_segments: u32,
) -> Result<Vec<Vec<Point>>, OutlineError> {
    let mut tokens = outline.split_whitespace();
    let next_point = |tokens: &mut std::str::SplitWhitespace| -> Result<Point, OutlineError> {
        let mut coordinate = || {
            let token = tokens.next().ok_or_else(|| OutlineError::Truncated {
                glyph: glyph.to_string(),
            })?;
            token.parse::<f32>().map_err(|_| OutlineError::NotANumber {
                glyph: glyph.to_string(),
                token: token.to_string(),
            })
        };
        let x = coordinate()? * scale + offset[0];
        let y = coordinate()? * scale + offset[1];
        Ok([x, y])
    };

    let segments = curve_segments.max(1);
    let mut contours: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    while let Some(command) = tokens.next() {
        match command {
            "m" => {
                if current.len() > 2 {
                    contours.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(next_point(&mut tokens)?);
            }
            "l" => current.push(next_point(&mut tokens)?),
            "q" => {
                let end = next_point(&mut tokens)?;
                let control = next_point(&mut tokens)?;
                let start = *current.last().unwrap_or(&end);
                for step in 1..=segments {
                    let t = step as f32 / segments as f32;
                    current.push(quadratic(start, control, end, t));
                }
            }
            "b" => {
                let end = next_point(&mut tokens)?;
                let control1 = next_point(&mut tokens)?;
                let control2 = next_point(&mut tokens)?;
                let start = *current.last().unwrap_or(&end);
                for step in 1..=segments {
                    let t = step as f32 / segments as f32;
                    current.push(cubic(start, control1, control2, end, t));
                }
            }
            "z" => {}
            other => {
                return Err(OutlineError::UnknownCommand {
                    glyph: glyph.to_string(),
                    command: other.to_string(),
                });
            }
        }
    }
    if current.len() > 2 {
        contours.push(current);
    }

    Ok(contours
        .into_iter()
        .map(dedup_contour)
        .filter(|contour| contour.len() > 2)
        .collect())
}

fn quadratic(p0: Point, p1: Point, p2: Point, t: f32) -> Point {
    let k = 1.0 - t;
    [
        k * k * p0[0] + 2.0 * k * t * p1[0] + t * t * p2[0],
        k * k * p0[1] + 2.0 * k * t * p1[1] + t * t * p2[1],
    ]
}

fn cubic(p0: Point, p1: Point, p2: Point, p3: Point, t: f32) -> Point {
    let k = 1.0 - t;
    let (a, b, c, d) = (k * k * k, 3.0 * k * k * t, 3.0 * k * t * t, t * t * t);
    [
        a * p0[0] + b * p1[0] + c * p2[0] + d * p3[0],
        a * p0[1] + b * p1[1] + c * p2[1] + d * p3[1],
    ]
}

/// Drops consecutive duplicates and a closing point equal to the first one.
fn dedup_contour(mut contour: Vec<Point>) -> Vec<Point> {
    contour.dedup_by(|a, b| same_point(*a, *b));
    while contour.len() > 1 && same_point(contour[0], contour[contour.len() - 1]) {
        contour.pop();
    }
    contour
}

fn same_point(a: Point, b: Point) -> bool {
    (a[0] - b[0]).abs() <= f32::EPSILON && (a[1] - b[1]).abs() <= f32::EPSILON
}

/// Twice the signed area; positive for counter-clockwise contours.
pub fn signed_area(contour: &[Point]) -> f32 {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let (a, b) = (contour[i], contour[(i + 1) % n]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum()
}

fn contains(contour: &[Point], p: Point) -> bool {
    let n = contour.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (contour[i], contour[j]);
        if (a[1] > p[1]) != (b[1] > p[1])
            && p[0] < (b[0] - a[0]) * (p[1] - a[1]) / (b[1] - a[1]) + a[0]
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A filled outline (counter-clockwise) with its holes (clockwise).
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub outer: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

/// Groups contours by nesting: a contour inside an odd number of others is a
/// hole of the smallest solid contour around it.
pub fn shapes_from_contours(contours: Vec<Vec<Point>>) -> Vec<Shape> {
    let containers: Vec<Vec<usize>> = contours
        .iter()
        .enumerate()
        .map(|(i, contour)| {
            (0..contours.len())
                .filter(|&j| j != i && contains(&contours[j], contour[0]))
                .collect()
        })
        .collect();

    let mut shapes: Vec<(usize, Shape)> = Vec::new();
    for (i, contour) in contours.iter().enumerate() {
        if containers[i].len() % 2 == 0 {
            let mut outer = contour.clone();
            if signed_area(&outer) < 0.0 {
                outer.reverse();
            }
            shapes.push((
                i,
                Shape {
                    outer,
                    holes: Vec::new(),
                },
            ));
        }
    }
    for (i, contour) in contours.iter().enumerate() {
        if containers[i].len() % 2 == 1 {
            let parent = containers[i]
                .iter()
                .filter(|&&j| containers[j].len() % 2 == 0)
                .min_by(|&&a, &&b| {
                    signed_area(&contours[a])
                        .abs()
                        .total_cmp(&signed_area(&contours[b]).abs())
                })
                .copied();
            let Some(shape) = parent.and_then(|p| shapes.iter_mut().find(|(idx, _)| *idx == p))
            else {
                continue;
            };
            let mut hole = contour.clone();
            if signed_area(&hole) > 0.0 {
                hole.reverse();
            }
            shape.1.holes.push(hole);
        }
    }
    shapes.into_iter().map(|(_, shape)| shape).collect()
}

fn cross(o: Point, a: Point, b: Point) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn edges(contour: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    (0..contour.len()).map(move |i| (contour[i], contour[(i + 1) % contour.len()]))
}

/// Joins the holes into the outline through zero-width bridges so that the
/// result is one simple polygon an ear clipper can handle.
fn bridge_holes(shape: &Shape) -> Vec<Point> {
    let mut polygon = shape.outer.clone();
    let mut holes = shape.holes.clone();
    let max_x = |hole: &Vec<Point>| hole.iter().map(|p| p[0]).fold(f32::MIN, f32::max);
    holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));

    for (h, hole) in holes.iter().enumerate() {
        let m = (0..hole.len())
            .max_by(|&a, &b| hole[a][0].total_cmp(&hole[b][0]))
            .unwrap_or(0);
        let anchor = hole[m];
        let distance = |p: Point| (p[0] - anchor[0]).powi(2) + (p[1] - anchor[1]).powi(2);
        let mut candidates: Vec<usize> = (0..polygon.len()).collect();
        candidates.sort_by(|&a, &b| distance(polygon[a]).total_cmp(&distance(polygon[b])));

        let is_clear = |target: Point| {
            let blocked = |(c, d): (Point, Point)| segments_cross(anchor, target, c, d);
            !edges(&polygon).any(blocked) && !holes[h..].iter().any(|other| edges(other).any(blocked))
        };
        let v = candidates
            .iter()
            .copied()
            .find(|&v| is_clear(polygon[v]))
            .unwrap_or(candidates[0]);

        let mut merged = Vec::with_capacity(polygon.len() + hole.len() + 2);
        merged.extend_from_slice(&polygon[..=v]);
        merged.extend_from_slice(&hole[m..]);
        merged.extend_from_slice(&hole[..=m]);
        merged.extend_from_slice(&polygon[v..]);
        polygon = merged;
    }
    polygon
}

fn inside_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Triangulates a counter-clockwise simple polygon by ear clipping.
pub fn ear_clip(polygon: &[Point]) -> Vec<[usize; 3]> {
    let mut remaining: Vec<usize> = (0..polygon.len()).collect();
    let mut triangles = Vec::with_capacity(polygon.len().saturating_sub(2));
    let mut i = 0;
    let mut misses = 0;

    while remaining.len() > 3 {
        let n = remaining.len();
        i %= n;
        let (prev, cur, next) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
        let (a, b, c) = (polygon[prev], polygon[cur], polygon[next]);
        let turn = cross(a, b, c);

        if turn.abs() <= f32::EPSILON {
            // collinear or zero-length: no area to emit
            remaining.remove(i);
            misses = 0;
            continue;
        }
        let is_ear = turn > 0.0
            && !remaining.iter().any(|&k| {
                k != prev
                    && k != cur
                    && k != next
                    && !same_point(polygon[k], a)
                    && !same_point(polygon[k], b)
                    && !same_point(polygon[k], c)
                    && inside_triangle(polygon[k], a, b, c)
            });
        if is_ear || misses > n {
            triangles.push([prev, cur, next]);
            remaining.remove(i);
            misses = 0;
        } else {
            i += 1;
            misses += 1;
        }
    }
    if remaining.len() == 3 && cross(polygon[remaining[0]], polygon[remaining[1]], polygon[remaining[2]]).abs() > f32::EPSILON {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}

/// Builds the extruded mesh for `text`: a back cap at `z = 0`, a front cap at
/// `z = depth` and flat-shaded side walls.
pub fn text_geometry(
    text: &str,
    typeface: &Typeface,
    options: &TextOptions,
) -> Result<Geometry, OutlineError> {
    let contours = typeface.contours(text, options)?;
    let depth = options.depth;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for shape in shapes_from_contours(contours) {
        let polygon = bridge_holes(&shape);
        let triangles = ear_clip(&polygon);

        // Caps
        for (z, normal, flip) in [(depth, 1.0, false), (0.0, -1.0, true)] {
            let base = vertices.len() as u32;
            vertices.extend(polygon.iter().map(|p| ModelVertex {
                position: [p[0], p[1], z],
                tex_coords: [p[0], p[1]],
                normal: [0.0, 0.0, normal],
            }));
            for [a, b, c] in &triangles {
                if flip {
                    indices.extend_from_slice(&[base + *a as u32, base + *c as u32, base + *b as u32]);
                } else {
                    indices.extend_from_slice(&[base + *a as u32, base + *b as u32, base + *c as u32]);
                }
            }
        }

        // Walls follow the unbridged contours, not the bridged polygon
        for contour in std::iter::once(&shape.outer).chain(shape.holes.iter()) {
            for (p, q) in edges(contour) {
                let (dx, dy) = (q[0] - p[0], q[1] - p[1]);
                let length = (dx * dx + dy * dy).sqrt();
                if length <= f32::EPSILON {
                    continue;
                }
                // Outward for counter-clockwise outlines, into the hole for clockwise ones
                let normal = [dy / length, -dx / length, 0.0];
                let base = vertices.len() as u32;
                for (point, z, v) in [(p, 0.0, 0.0), (q, 0.0, 1.0), (q, depth, 1.0), (p, depth, 0.0)] {
                    vertices.push(ModelVertex {
                        position: [point[0], point[1], z],
                        tex_coords: [z, v],
                        normal,
                    });
                }
                indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
    }

    Ok(Geometry::new(text, vertices, indices))
}
