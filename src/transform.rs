use resvg::tiny_skia;

use crate::geometry::{Point, Rect};

/// A 2D affine transformation.
///
/// Maps `(x, y)` to `(sx*x + kx*y + tx, ky*x + sy*y + ty)`. Transforms compose
/// parent→child through the painter's paint stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub sx: f32,
    pub ky: f32,
    pub kx: f32,
    pub sy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        sx: 1.0,
        ky: 0.0,
        kx: 0.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            tx: x,
            ty: y,
            ..Self::IDENTITY
        }
    }

    /// Rotation about the origin, clockwise on screen (y points down).
    pub fn rotate(angle_radians: f32) -> Self {
        let (sin, cos) = angle_radians.sin_cos();
        Self {
            sx: cos,
            ky: sin,
            kx: -sin,
            sy: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn rotate_degrees(angle_degrees: f32) -> Self {
        Self::rotate(angle_degrees.to_radians())
    }

    pub fn scale(s: f32) -> Self {
        Self::scale_xy(s, s)
    }

    pub fn scale_xy(sx: f32, sy: f32) -> Self {
        Self {
            sx,
            sy,
            ..Self::IDENTITY
        }
    }

    /// Matrix product `self * other`.
    /// Applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Transform {
        let a = self;
        let b = other;
        Transform {
            sx: a.sx * b.sx + a.kx * b.ky,
            ky: a.ky * b.sx + a.sy * b.ky,
            kx: a.sx * b.kx + a.kx * b.sy,
            sy: a.ky * b.kx + a.sy * b.sy,
            tx: a.sx * b.tx + a.kx * b.ty + a.tx,
            ty: a.ky * b.tx + a.sy * b.ty + a.ty,
        }
    }

    /// Inverse transform. Degenerate (non-invertible) matrices yield identity.
    pub fn inverse(&self) -> Transform {
        let det = self.sx * self.sy - self.kx * self.ky;
        if det.abs() < 1e-10 {
            return Self::IDENTITY;
        }
        let inv_det = 1.0 / det;
        Transform {
            sx: self.sy * inv_det,
            ky: -self.ky * inv_det,
            kx: -self.kx * inv_det,
            sy: self.sx * inv_det,
            tx: (self.kx * self.ty - self.sy * self.tx) * inv_det,
            ty: (self.ky * self.tx - self.sx * self.ty) * inv_det,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.sx * x + self.kx * y + self.tx,
            self.ky * x + self.sy * y + self.ty,
        )
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        if self.is_identity() {
            return *rect;
        }
        Rect::enclosing(rect.corners().map(|p| {
            let (x, y) = self.transform_point(p.x, p.y);
            Point::new(x, y)
        }))
    }

    /// Average scale factor, used to widen stroke bounds.
    pub fn mean_scale(&self) -> f32 {
        let x = (self.sx * self.sx + self.ky * self.ky).sqrt();
        let y = (self.kx * self.kx + self.sy * self.sy).sqrt();
        (x + y) * 0.5
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn to_skia(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(self.sx, self.ky, self.kx, self.sy, self.tx, self.ty)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_identity() {
        let t = Transform::identity();
        assert_eq!(t, Transform::IDENTITY);
        assert!(t.is_identity());
    }

    #[test]
    fn test_translate() {
        let t = Transform::translate(10.0, 20.0);
        let (x, y) = t.transform_point(5.0, 5.0);
        assert!(approx_eq(x, 15.0));
        assert!(approx_eq(y, 25.0));
    }

    #[test]
    fn test_rotate() {
        let t = Transform::rotate_degrees(90.0);
        let (x, y) = t.transform_point(1.0, 0.0);
        assert!(approx_eq(x, 0.0));
        assert!(approx_eq(y, 1.0));
    }

    #[test]
    fn test_scale_xy() {
        let t = Transform::scale_xy(2.0, 3.0);
        let (x, y) = t.transform_point(1.0, 1.0);
        assert!(approx_eq(x, 2.0));
        assert!(approx_eq(y, 3.0));
    }

    #[test]
    fn test_compose() {
        // translate first: (0,0) -> (10,0), then scale: (20,0)
        let composed = Transform::scale(2.0).then(&Transform::translate(10.0, 0.0));
        let (x, y) = composed.transform_point(0.0, 0.0);
        assert!(approx_eq(x, 20.0));
        assert!(approx_eq(y, 0.0));
    }

    #[test]
    fn test_inverse_rotate_scale() {
        let t = Transform::rotate_degrees(30.0)
            .then(&Transform::scale_xy(2.0, 0.5))
            .then(&Transform::translate(3.0, -4.0));
        let composed = t.then(&t.inverse());
        let (x, y) = composed.transform_point(3.0, 4.0);
        assert!(approx_eq(x, 3.0));
        assert!(approx_eq(y, 4.0));
    }

    #[test]
    fn test_map_rect_rotated() {
        let t = Transform::rotate_degrees(90.0);
        let r = t.map_rect(&Rect::new(0.0, 0.0, 10.0, 5.0));
        assert!(approx_eq(r.x, -5.0));
        assert!(approx_eq(r.y, 0.0));
        assert!(approx_eq(r.width, 5.0));
        assert!(approx_eq(r.height, 10.0));
    }

    #[test]
    fn test_to_skia_matches_transform_point() {
        let t = Transform::translate(2.0, 3.0).then(&Transform::scale(4.0));
        let mut p = [resvg::tiny_skia::Point::from_xy(1.0, 1.0)];
        t.to_skia().map_points(&mut p);
        let (x, y) = t.transform_point(1.0, 1.0);
        assert!(approx_eq(p[0].x, x));
        assert!(approx_eq(p[0].y, y));
    }
}
