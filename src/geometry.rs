//! Geometry primitives shared by the painter, the node contract and viewports.
//!
//! Two families of types live here:
//!
//! - **Float geometry** (`Point`, `Rect`): the coordinate space shapes are
//!   described in, before the painter transform is applied.
//! - **Pixel geometry** (`PixelPoint`, `PixelSize`, `PixelRect`): integer,
//!   half-open rectangles used for bounding boxes, buffer sizes and compositing.
//!   A `PixelRect` covers `min.x..max.x` by `min.y..max.y`.

use std::ops::{Add, Sub};

use resvg::tiny_skia;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a: 1.0,
        }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Straight-alpha 8-bit channels.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        let [r, g, b, a] = self.to_rgba8();
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Grow the rect by `amount` on every side (negative values shrink it).
    pub fn outset(&self, amount: f32) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            width: (self.width + amount * 2.0).max(0.0),
            height: (self.height + amount * 2.0).max(0.0),
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Smallest rect enclosing all given points. Empty input yields a zero rect.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in iter {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// The four corners, clockwise from the top-left.
    pub fn corners(&self) -> [Point; 4] {
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [
            Point::new(self.x, self.y),
            Point::new(x1, self.y),
            Point::new(x1, y1),
            Point::new(self.x, y1),
        ]
    }
}

/// Integer point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const ZERO: PixelPoint = PixelPoint { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for PixelPoint {
    type Output = PixelPoint;

    fn add(self, rhs: PixelPoint) -> PixelPoint {
        PixelPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for PixelPoint {
    type Output = PixelPoint;

    fn sub(self, rhs: PixelPoint) -> PixelPoint {
        PixelPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Size of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Half-open integer rectangle, the bounding box type of the scene graph.
///
/// Mirrors the usual image-library rectangle: `min` is inclusive, `max` is
/// exclusive, and every empty rectangle compares as empty regardless of where
/// it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRect {
    pub min: PixelPoint,
    pub max: PixelPoint,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect {
        min: PixelPoint::ZERO,
        max: PixelPoint::ZERO,
    };

    /// Build a rect from two corners, swapping coordinates as needed so that
    /// `min <= max`.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: PixelPoint::new(x0.min(x1), y0.min(y1)),
            max: PixelPoint::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn from_size(size: PixelSize) -> Self {
        Self::from_origin_size(PixelPoint::ZERO, size)
    }

    pub fn from_origin_size(origin: PixelPoint, size: PixelSize) -> Self {
        Self {
            min: origin,
            max: PixelPoint::new(
                origin.x.saturating_add(size.width as i32),
                origin.y.saturating_add(size.height as i32),
            ),
        }
    }

    /// Smallest pixel rect covering `rect`.
    pub fn covering(rect: &Rect) -> Self {
        Self::new(
            rect.x.floor() as i32,
            rect.y.floor() as i32,
            (rect.x + rect.width).ceil() as i32,
            (rect.y + rect.height).ceil() as i32,
        )
    }

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y).max(0) as u32
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// Overlap of two rects; `EMPTY` when they do not overlap.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let r = PixelRect {
            min: PixelPoint::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: PixelPoint::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        };
        if r.is_empty() {
            PixelRect::EMPTY
        } else {
            r
        }
    }

    /// Smallest rect containing both. Empty rects do not contribute.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        PixelRect {
            min: PixelPoint::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: PixelPoint::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn translate(&self, delta: PixelPoint) -> PixelRect {
        PixelRect {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    pub fn contains(&self, p: PixelPoint) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.min.x as f32,
            self.min.y as f32,
            self.width() as f32,
            self.height() as f32,
        )
    }

    /// `None` for empty rects, which tiny-skia cannot represent.
    pub fn to_int_rect(&self) -> Option<tiny_skia::IntRect> {
        tiny_skia::IntRect::from_xywh(self.min.x, self.min.y, self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_rect_canonicalizes_corners() {
        let r = PixelRect::new(10, 20, 0, 5);
        assert_eq!(r.min, PixelPoint::new(0, 5));
        assert_eq!(r.max, PixelPoint::new(10, 20));
        assert_eq!(r.size(), PixelSize::new(10, 15));
    }

    #[test]
    fn test_pixel_rect_intersect() {
        let child = PixelRect::new(10, 10, 60, 60);
        let clip = PixelRect::new(0, 0, 40, 40);
        assert_eq!(child.intersect(&clip), PixelRect::new(10, 10, 40, 40));
    }

    #[test]
    fn test_disjoint_intersection_is_canonical_empty() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(20, 20, 30, 30);
        let r = a.intersect(&b);
        assert!(r.is_empty());
        assert_eq!(r, PixelRect::EMPTY);
    }

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(10, 0, 20, 10);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = PixelRect::new(5, 5, 10, 10);
        assert_eq!(a.union(&PixelRect::EMPTY), a);
        assert_eq!(PixelRect::EMPTY.union(&a), a);
        let b = PixelRect::new(0, 8, 6, 20);
        assert_eq!(a.union(&b), PixelRect::new(0, 5, 10, 20));
    }

    #[test]
    fn test_covering_rounds_outward() {
        let r = PixelRect::covering(&Rect::new(0.5, 1.2, 10.0, 3.5));
        assert_eq!(r, PixelRect::new(0, 1, 11, 5));
    }

    #[test]
    fn test_translate_and_contains() {
        let r = PixelRect::from_size(PixelSize::new(4, 4)).translate(PixelPoint::new(2, 3));
        assert!(r.contains(PixelPoint::new(2, 3)));
        assert!(r.contains(PixelPoint::new(5, 6)));
        assert!(!r.contains(PixelPoint::new(6, 6)));
    }

    #[test]
    fn test_empty_rect_has_no_int_rect() {
        assert!(PixelRect::EMPTY.to_int_rect().is_none());
        assert!(PixelRect::new(1, 1, 3, 3).to_int_rect().is_some());
    }

    #[test]
    fn test_color_from_hex_and_rgba8() {
        let c = Color::from_hex(0xFF8000);
        assert_eq!(c.to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(Color::TRANSPARENT.to_rgba8(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_rect_enclosing() {
        let r = Rect::enclosing([Point::new(3.0, 1.0), Point::new(-1.0, 4.0)]);
        assert_eq!(r, Rect::new(-1.0, 1.0, 4.0, 3.0));
        assert_eq!(Rect::enclosing([]), Rect::default());
    }
}
