//! Geometric primitives for image operations.
//!
//! - [`Rect32I`] - integer rectangle, the `area` parameter of every operation
//! - [`Rect32F`] - float rectangle
//! - [`Point32I`], [`Point32F`] - positions and curve control points
//! - [`Line32F`] - two points
//!
//! # Coordinate System
//!
//! ```text
//! (0,0) ────────► X
//!   │
//!   │   ┌──────────┐
//!   │   │   area   │
//!   │   └──────────┘
//!   ▼
//!   Y
//! ```
//!
//! Rectangles are inclusive on the left/top edge and exclusive on the
//! right/bottom edge.

use serde::{Deserialize, Serialize};

/// Integer rectangle with origin and size.
///
/// # Example
///
/// ```rust
/// use blacksilk_core::Rect32I;
///
/// let rect = Rect32I::new(10, 20, 100, 50);
/// assert_eq!(rect.right(), 110);
/// assert_eq!(rect.bottom(), 70);
/// assert!(Rect32I::from_size(200, 100).contains_rect(&rect));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect32I {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect32I {
    /// Creates a rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin covering `width` x `height`.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Pixel count, 0 for empty or negative rectangles.
    #[inline]
    pub const fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }

    /// True if either dimension is zero or negative.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True if the point lies inside.
    #[inline]
    pub const fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// True if `other` lies fully inside this rectangle.
    #[inline]
    pub const fn contains_rect(&self, other: &Rect32I) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True if the rectangle is non-negative and fits inside a
    /// `width` x `height` buffer.
    #[inline]
    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && (self.right() as i64) <= width as i64
            && (self.bottom() as i64) <= height as i64
    }

    /// Intersection, `None` when the rectangles don't overlap.
    pub fn intersect(&self, other: &Rect32I) -> Option<Rect32I> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect32I::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// Bounding box of both rectangles.
    pub fn union(&self, other: &Rect32I) -> Rect32I {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect32I::new(x, y, right - x, bottom - y)
    }

    /// Moved by (dx, dy).
    #[inline]
    pub const fn translate(&self, dx: i32, dy: i32) -> Rect32I {
        Rect32I::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Float rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect32F {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect32F {
    /// Creates a rectangle.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<Rect32I> for Rect32F {
    fn from(r: Rect32I) -> Self {
        Self::new(r.x as f32, r.y as f32, r.width as f32, r.height as f32)
    }
}

/// Integer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point32I {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

impl Point32I {
    /// Creates a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Float point; also used as curve control point in [0,1]².
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point32F {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Point32F {
    /// Creates a point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    ///
    /// ```rust
    /// use blacksilk_core::Point32F;
    /// assert_eq!(Point32F::new(0.0, 0.0).distance_to(Point32F::new(3.0, 4.0)), 5.0);
    /// ```
    #[inline]
    pub fn distance_to(&self, other: Point32F) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add for Point32F {
    type Output = Point32F;
    fn add(self, rhs: Point32F) -> Point32F {
        Point32F::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point32F {
    type Output = Point32F;
    fn sub(self, rhs: Point32F) -> Point32F {
        Point32F::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Point32F {
    type Output = Point32F;
    fn mul(self, rhs: f32) -> Point32F {
        Point32F::new(self.x * rhs, self.y * rhs)
    }
}

/// Line segment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Line32F {
    /// Start point.
    pub start: Point32F,
    /// End point.
    pub end: Point32F,
}

impl Line32F {
    /// Creates a line.
    pub const fn new(start: Point32F, end: Point32F) -> Self {
        Self { start, end }
    }

    /// Segment length.
    pub fn length(&self) -> f32 {
        self.start.distance_to(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_within() {
        assert!(Rect32I::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(!Rect32I::new(1, 0, 4, 4).fits_within(4, 4));
        assert!(!Rect32I::new(-1, 0, 2, 2).fits_within(4, 4));
        assert!(Rect32I::new(4, 4, 0, 0).fits_within(4, 4));
    }

    #[test]
    fn test_intersect() {
        let a = Rect32I::new(0, 0, 100, 100);
        let b = Rect32I::new(50, 50, 100, 100);
        assert_eq!(a.intersect(&b), Some(Rect32I::new(50, 50, 50, 50)));
        assert_eq!(a.intersect(&Rect32I::new(200, 0, 5, 5)), None);
        assert_eq!(a.union(&b), Rect32I::new(0, 0, 150, 150));
    }

    #[test]
    fn test_empty_area() {
        assert_eq!(Rect32I::new(0, 0, -3, 4).area(), 0);
        assert_eq!(Rect32I::from_size(3, 4).area(), 12);
    }
}
