//! Tone curves.
//!
//! A [`Curve`] is a list of control points in [0,1]², kept sorted by x.
//! Filters sample it into a lookup table with one entry per representable
//! sample value (`max_value + 1` entries) and hand that table to the
//! brightness and grain kernels.
//!
//! Two points sample linearly, three or more through a piecewise cubic
//! bezier whose inner handles are derived from the neighbouring points.

use serde::{Deserialize, Serialize};

use crate::Point32F;

/// Handle length relative to the neighbour distance.
const HANDLE_FACTOR: f32 = 0.2;

/// Oversampling per lookup entry when walking a bezier segment.
const OVERSAMPLE: f32 = 4.0;

/// Sorted list of curve control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<Point32F>,
}

impl Default for Curve {
    /// Identity curve.
    fn default() -> Self {
        Self {
            points: vec![Point32F::new(0.0, 0.0), Point32F::new(1.0, 1.0)],
        }
    }
}

impl Curve {
    /// Builds a curve from arbitrary points, sorting them by x.
    pub fn new(points: Vec<Point32F>) -> Self {
        let mut curve = Self { points };
        curve.sort();
        curve
    }

    /// Control points, sorted by x.
    pub fn points(&self) -> &[Point32F] {
        &self.points
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Adds a point and re-sorts.
    pub fn add_point(&mut self, point: Point32F) {
        self.points.push(point);
        self.sort();
    }

    /// Inserts at `index` without re-sorting; out-of-range indices append.
    pub fn insert_point(&mut self, index: usize, point: Point32F) {
        let index = index.min(self.points.len());
        self.points.insert(index, point);
    }

    /// Removes the point at `index`.
    pub fn remove_point(&mut self, index: usize) -> Option<Point32F> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    /// Replaces all points.
    pub fn assign(&mut self, points: Vec<Point32F>) {
        self.points = points;
        self.sort();
    }

    /// Back to the identity curve.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Samples `count` y values; linear for two points, bezier otherwise.
    ///
    /// Returns an empty table for curves with fewer than two points.
    pub fn sample(&self, count: usize) -> Vec<f32> {
        match self.points.len() {
            0 | 1 => Vec::new(),
            2 => calc_linear(&self.points, count),
            _ => calc_bezier(&self.points, count),
        }
    }

    fn sort(&mut self) {
        self.points.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
}

/// Piecewise-linear sampling of sorted `points` into `count` y values.
///
/// Entry `i` corresponds to `x = i / (count - 1)`; results are clamped to [0,1].
///
/// ```rust
/// use blacksilk_core::{Point32F, calc_linear};
///
/// let lut = calc_linear(&[Point32F::new(0.0, 0.0), Point32F::new(1.0, 1.0)], 5);
/// assert_eq!(lut, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
pub fn calc_linear(points: &[Point32F], count: usize) -> Vec<f32> {
    if points.len() < 2 || count == 0 {
        return Vec::new();
    }
    let denom = (count.max(2) - 1) as f32;
    let last = points.len() - 1;

    (0..count)
        .map(|i| {
            let x = i as f32 / denom;
            let mut higher = 1;
            while higher < last && x > points[higher].x {
                higher += 1;
            }
            let lo = points[higher - 1];
            let hi = points[higher];
            let span = hi.x - lo.x;
            let part = if span.abs() < f32::EPSILON {
                1.0
            } else {
                ((x - lo.x) / span).clamp(0.0, 1.0)
            };
            (hi.y * part + lo.y * (1.0 - part)).clamp(0.0, 1.0)
        })
        .collect()
}

/// One cubic segment: start, two handles, end.
#[derive(Debug, Clone, Copy)]
struct Segment {
    a: Point32F,
    b: Point32F,
    c: Point32F,
    d: Point32F,
}

impl Segment {
    fn eval(&self, t: f32) -> Point32F {
        let u = 1.0 - t;
        self.a * (u * u * u)
            + self.b * (3.0 * u * u * t)
            + self.c * (3.0 * u * t * t)
            + self.d * (t * t * t)
    }
}

/// Builds one bezier segment per pair of neighbouring points.
///
/// Phantom points mirror the first and last point so the end segments get
/// handles pointing along the curve.
fn control_segments(points: &[Point32F]) -> Vec<Segment> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let mut ext = Vec::with_capacity(n + 2);
    ext.push(points[0] * 2.0 - points[1]);
    ext.extend_from_slice(points);
    ext.push(points[n - 1] * 2.0 - points[n - 2]);

    (1..n)
        .map(|i| {
            let (a, b, c, d) = (ext[i - 1], ext[i], ext[i + 1], ext[i + 2]);
            let mut b2 = b + (c - a) * HANDLE_FACTOR;
            let mut c2 = c + (b - d) * HANDLE_FACTOR;
            b2.y = b2.y.clamp(0.0, 1.0);
            c2.y = c2.y.clamp(0.0, 1.0);

            // keep handles inside [b.x, c.x] so x stays monotonic
            if b2.x > c.x {
                let y = (c.x - b.x) / (b2.x - b.x) * (b2.y - c.y);
                b2 = Point32F::new(c.x, c.y + y);
            }
            if c2.x < b.x {
                let y = (c.x - b.x) / (c.x - c2.x) * (c2.y - b.y);
                c2 = Point32F::new(b.x, b.y + y);
            }
            if c2.x < b2.x {
                let center = (b2.x + c2.x) * 0.5;
                let yc = if (c.x - c2.x).abs() > f32::EPSILON {
                    (center - c.x) / (c.x - c2.x) * (c.y - c2.y)
                } else {
                    0.0
                };
                let yb = if (b.x - b2.x).abs() > f32::EPSILON {
                    (center - b.x) / (b.x - b2.x) * (b.y - b2.y)
                } else {
                    0.0
                };
                c2 = Point32F::new(center, c.y + yc);
                b2 = Point32F::new(center, b.y + yb);
            }
            Segment { a: b, b: b2, c: c2, d: c }
        })
        .collect()
}

/// Bezier sampling of sorted `points` (three or more) into `count` y values.
///
/// Each segment is walked with 4x oversampling; entries no sample lands on
/// take the value of the nearest sampled entry to their left.
pub fn calc_bezier(points: &[Point32F], count: usize) -> Vec<f32> {
    let segments = control_segments(points);
    if segments.is_empty() || count == 0 {
        return Vec::new();
    }
    let scale = (count.max(2) - 1) as f32;
    let mut table: Vec<Option<f32>> = vec![None; count];
    let mut put = |p: Point32F| {
        let pos = (p.x * scale).round().clamp(0.0, scale) as usize;
        table[pos] = Some(p.y.clamp(0.0, 1.0));
    };

    for seg in &segments {
        let steps = (OVERSAMPLE * (seg.d.x - seg.a.x) * scale).max(1.0) as usize;
        for j in 0..steps {
            put(seg.eval(j as f32 / steps as f32));
        }
    }
    if let Some(last) = segments.last() {
        put(last.d);
    }

    let first = table.iter().flatten().next().copied().unwrap_or(0.0);
    let mut carry = first;
    table
        .into_iter()
        .map(|v| {
            if let Some(v) = v {
                carry = v;
            }
            carry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_identity() {
        let lut = Curve::default().sample(256);
        assert_eq!(lut.len(), 256);
        assert_abs_diff_eq!(lut[0], 0.0);
        assert_abs_diff_eq!(lut[255], 1.0);
        assert_abs_diff_eq!(lut[51], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_bezier_through_diagonal() {
        let curve = Curve::new(vec![
            Point32F::new(1.0, 1.0),
            Point32F::new(0.0, 0.0),
            Point32F::new(0.5, 0.5),
        ]);
        assert_eq!(curve.points()[1], Point32F::new(0.5, 0.5));
        let lut = curve.sample(256);
        assert_eq!(lut.len(), 256);
        for (i, v) in lut.iter().enumerate() {
            assert_abs_diff_eq!(*v, i as f32 / 255.0, epsilon = 0.02);
        }
    }

    #[test]
    fn test_bezier_monotonic_for_s_curve() {
        let curve = Curve::new(vec![
            Point32F::new(0.0, 0.0),
            Point32F::new(0.25, 0.15),
            Point32F::new(0.75, 0.85),
            Point32F::new(1.0, 1.0),
        ]);
        let lut = curve.sample(1024);
        assert!(lut.windows(2).all(|w| w[1] + 1e-3 >= w[0]));
        assert!(lut.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_degenerate_curves() {
        assert!(Curve::new(vec![Point32F::new(0.5, 0.5)]).sample(16).is_empty());
        assert!(calc_bezier(&[Point32F::new(0.0, 0.0), Point32F::new(1.0, 1.0)], 8).is_empty());
    }
}
