//! Geometric primitives.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A 2D point in canvas space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0, height: 0 };

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A 2D rectangle with floating point coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Convert to integer pixel coordinates for rasterization.
    pub fn to_pixel_rect(&self) -> PixelRect {
        PixelRect {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            width: self.width.ceil() as u32,
            height: self.height.ceil() as u32,
        }
    }
}

/// Integer rectangle for pixel operations and dirty tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        PixelRect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    pub fn intersection(&self, other: &PixelRect) -> Option<PixelRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > x && bottom > y {
            Some(PixelRect::new(x, y, (right - x) as u32, (bottom - y) as u32))
        } else {
            None
        }
    }

    /// Grow the rectangle outward on every side.
    pub fn inflate(&self, amount: u32) -> PixelRect {
        PixelRect::new(
            self.x - amount as i32,
            self.y - amount as i32,
            self.width + amount * 2,
            self.height + amount * 2,
        )
    }

    /// Clamp to a canvas of the given size, anchored at the origin.
    pub fn clamp_to(&self, size: Size) -> PixelRect {
        self.intersection(&PixelRect::from_size(size))
            .unwrap_or_default()
    }
}

/// Placement of a mask surface over the canvas: translate, scale, rotate
/// around the mask bounds origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskTransform {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for MaskTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl MaskTransform {
    pub const fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 0.0
            && self.y == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.rotation == 0.0
    }

    /// Map a canvas-space point back into mask-local space.
    ///
    /// Returns `None` when the transform is degenerate (zero scale).
    pub fn inverse_map(&self, point: Point) -> Option<Point> {
        if self.scale_x == 0.0 || self.scale_y == 0.0 {
            return None;
        }

        let px = point.x - self.x;
        let py = point.y - self.y;

        let (sin, cos) = (-self.rotation).sin_cos();
        let rx = px * cos - py * sin;
        let ry = px * sin + py * cos;

        Some(Point::new(rx / self.scale_x, ry / self.scale_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_rect_union() {
        let a = PixelRect::new(0, 0, 100, 100);
        let b = PixelRect::new(50, 50, 100, 100);
        let u = a.union(&b);
        assert_eq!(u, PixelRect::new(0, 0, 150, 150));
    }

    #[test]
    fn test_pixel_rect_union_with_empty() {
        let a = PixelRect::new(10, 10, 20, 20);
        assert_eq!(a.union(&PixelRect::default()), a);
        assert_eq!(PixelRect::default().union(&a), a);
    }

    #[test]
    fn test_pixel_rect_clamp() {
        let r = PixelRect::new(-10, -10, 50, 50);
        let clamped = r.clamp_to(Size::new(30, 30));
        assert_eq!(clamped, PixelRect::new(0, 0, 30, 30));
    }

    #[test]
    fn test_mask_transform_inverse_translation() {
        let t = MaskTransform {
            x: 10.0,
            y: 20.0,
            ..MaskTransform::identity()
        };
        let p = t.inverse_map(Point::new(15.0, 25.0)).unwrap();
        assert!((p.x - 5.0).abs() < 1e-5);
        assert!((p.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_mask_transform_inverse_scale() {
        let t = MaskTransform {
            scale_x: 2.0,
            scale_y: 2.0,
            ..MaskTransform::identity()
        };
        let p = t.inverse_map(Point::new(10.0, 10.0)).unwrap();
        assert!((p.x - 5.0).abs() < 1e-5);
        assert!((p.y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_transform() {
        let t = MaskTransform {
            scale_x: 0.0,
            ..MaskTransform::identity()
        };
        assert!(t.inverse_map(Point::new(1.0, 1.0)).is_none());
    }
}
