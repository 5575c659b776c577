//! CPU painter bound to a single pixel buffer.
//!
//! The painter keeps three pieces of state alongside its buffer:
//!
//! - **Current path**: built with `move_to`/`line_to`/curve calls and consumed
//!   by `fill`/`stroke`. The `*_preserve` variants leave it intact so a shape
//!   can be filled and then stroked.
//! - **Paint stack**: transform plus resolved style, one entry per tree level.
//!   The base entry (depth 1) is never popped.
//! - **Bounds stack**: the pixel region drawing is clipped to. The base entry
//!   covers the whole buffer and is never popped.
//!
//! Both stacks are usually driven through [`Painter::with_paint`] and
//! [`Painter::with_bounds`], which pop on every exit from the closure.

use resvg::tiny_skia::{self, FillRule, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke};

use crate::error::{Error, Result};
use crate::geometry::{Color, PixelPoint, PixelRect, PixelSize, Point, Rect};
use crate::style::PaintStyle;
use crate::transform::Transform;

/// Cubic bezier constant for approximating a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// One level of the paint stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintState {
    pub transform: Transform,
    pub style: PaintStyle,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            style: PaintStyle::BASE,
        }
    }
}

/// Counters for path construction and rasterization calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawCounts {
    pub path_ops: u64,
    pub draw_ops: u64,
}

pub struct Painter {
    pixmap: Pixmap,
    path: Vec<PathOp>,
    paint_stack: Vec<PaintState>,
    bounds_stack: Vec<PixelRect>,
    /// Mask for the top of the bounds stack; `None` when it covers the buffer.
    clip_mask: Option<Mask>,
    counts: DrawCounts,
}

impl Painter {
    /// Allocate a transparent buffer of the given size.
    pub fn new(size: PixelSize) -> Result<Self> {
        let pixmap = Pixmap::new(size.width, size.height).ok_or(Error::Allocation {
            width: size.width,
            height: size.height,
        })?;
        Ok(Self::from_pixmap(pixmap))
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        let full = PixelRect::from_size(PixelSize::new(pixmap.width(), pixmap.height()));
        Self {
            pixmap,
            path: Vec::new(),
            paint_stack: vec![PaintState::default()],
            bounds_stack: vec![full],
            clip_mask: None,
            counts: DrawCounts::default(),
        }
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.pixmap.width(), self.pixmap.height())
    }

    /// Pixel bounds of the whole buffer.
    pub fn pixel_bounds(&self) -> PixelRect {
        PixelRect::from_size(self.size())
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn counts(&self) -> DrawCounts {
        self.counts
    }

    pub fn reset_counts(&mut self) {
        self.counts = DrawCounts::default();
    }

    // ---- Paint stack ----

    pub fn paint_depth(&self) -> usize {
        self.paint_stack.len()
    }

    pub fn current(&self) -> &PaintState {
        // The base entry is never popped.
        &self.paint_stack[self.paint_stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut PaintState {
        let top = self.paint_stack.len() - 1;
        &mut self.paint_stack[top]
    }

    pub fn transform(&self) -> Transform {
        self.current().transform
    }

    pub fn style(&self) -> &PaintStyle {
        &self.current().style
    }

    /// Push a new paint level. `local` composes with the current transform.
    pub fn push_paint(&mut self, local: &Transform, style: PaintStyle) {
        let transform = self.transform().then(local);
        self.paint_stack.push(PaintState { transform, style });
    }

    pub fn pop_paint(&mut self) {
        if self.paint_stack.len() <= 1 {
            log::error!("Painter::pop_paint: stack is empty -- programmer error");
            return;
        }
        self.paint_stack.pop();
    }

    /// Run `f` one paint level deeper; the level is popped when `f` returns.
    pub fn with_paint<R>(
        &mut self,
        local: &Transform,
        style: PaintStyle,
        f: impl FnOnce(&mut Painter) -> R,
    ) -> R {
        let depth = self.paint_depth();
        self.push_paint(local, style);
        let result = f(self);
        self.paint_stack.truncate(depth);
        result
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.concat(&Transform::translate(x, y));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.concat(&Transform::scale_xy(sx, sy));
    }

    pub fn rotate(&mut self, angle_radians: f32) {
        self.concat(&Transform::rotate(angle_radians));
    }

    pub fn identity(&mut self) {
        self.current_mut().transform = Transform::IDENTITY;
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.current_mut().transform = transform;
    }

    fn concat(&mut self, t: &Transform) {
        let state = self.current_mut();
        state.transform = state.transform.then(t);
    }

    // ---- Bounds stack ----

    pub fn bounds_depth(&self) -> usize {
        self.bounds_stack.len()
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds_stack[self.bounds_stack.len() - 1]
    }

    /// Clip subsequent drawing to `rect`, intersected with the current bounds.
    pub fn push_bounds(&mut self, rect: PixelRect) {
        let rect = rect.intersect(&self.bounds());
        self.bounds_stack.push(rect);
        self.rebuild_clip();
    }

    pub fn pop_bounds(&mut self) {
        if self.bounds_stack.len() <= 1 {
            log::error!("Painter::pop_bounds: stack is empty -- programmer error");
            return;
        }
        self.bounds_stack.pop();
        self.rebuild_clip();
    }

    /// Run `f` with drawing clipped to `rect`; the bounds are popped when `f` returns.
    pub fn with_bounds<R>(&mut self, rect: PixelRect, f: impl FnOnce(&mut Painter) -> R) -> R {
        let depth = self.bounds_depth();
        self.push_bounds(rect);
        let result = f(self);
        if self.bounds_depth() != depth + 1 {
            log::warn!(
                "Painter::with_bounds: unbalanced bounds inside scope ({} != {})",
                self.bounds_depth(),
                depth + 1
            );
        }
        self.bounds_stack.truncate(depth);
        self.rebuild_clip();
        result
    }

    fn rebuild_clip(&mut self) {
        let bounds = self.bounds();
        if bounds == self.pixel_bounds() {
            self.clip_mask = None;
            return;
        }
        let size = self.size();
        self.clip_mask = Mask::new(size.width, size.height).map(|mut mask| {
            if let Some(rect) = skia_rect(&bounds.to_rect()) {
                let path = PathBuilder::from_rect(rect);
                mask.fill_path(&path, FillRule::Winding, false, tiny_skia::Transform::identity());
            }
            mask
        });
    }

    // ---- Path construction ----

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.push_op(PathOp::MoveTo(Point::new(x, y)));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.push_op(PathOp::LineTo(Point::new(x, y)));
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.push_op(PathOp::QuadTo(Point::new(cx, cy), Point::new(x, y)));
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        self.push_op(PathOp::CubicTo(
            Point::new(c1x, c1y),
            Point::new(c2x, c2y),
            Point::new(x, y),
        ));
    }

    pub fn close_path(&mut self) {
        self.push_op(PathOp::Close);
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
    }

    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    fn push_op(&mut self, op: PathOp) {
        self.counts.path_ops += 1;
        self.path.push(op);
    }

    pub fn rect(&mut self, r: &Rect) {
        self.move_to(r.x, r.y);
        self.line_to(r.x + r.width, r.y);
        self.line_to(r.x + r.width, r.y + r.height);
        self.line_to(r.x, r.y + r.height);
        self.close_path();
    }

    /// Rectangle with circular corners; the radius is clamped to half the
    /// smaller side.
    pub fn rounded_rect(&mut self, r: &Rect, radius: f32) {
        let radius = radius.min(r.width.min(r.height) * 0.5).max(0.0);
        if radius == 0.0 {
            self.rect(r);
            return;
        }
        let k = radius * KAPPA;
        let (x0, y0, x1, y1) = (r.x, r.y, r.x + r.width, r.y + r.height);
        self.move_to(x0 + radius, y0);
        self.line_to(x1 - radius, y0);
        self.cubic_to(x1 - radius + k, y0, x1, y0 + radius - k, x1, y0 + radius);
        self.line_to(x1, y1 - radius);
        self.cubic_to(x1, y1 - radius + k, x1 - radius + k, y1, x1 - radius, y1);
        self.line_to(x0 + radius, y1);
        self.cubic_to(x0 + radius - k, y1, x0, y1 - radius + k, x0, y1 - radius);
        self.line_to(x0, y0 + radius);
        self.cubic_to(x0, y0 + radius - k, x0 + radius - k, y0, x0 + radius, y0);
        self.close_path();
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);
        self.move_to(cx + rx, cy);
        self.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
        self.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
        self.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
        self.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
        self.close_path();
    }

    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) {
        self.ellipse(cx, cy, r, r);
    }

    fn build_path(&self) -> Option<tiny_skia::Path> {
        let mut pb = PathBuilder::new();
        for op in &self.path {
            match *op {
                PathOp::MoveTo(p) => pb.move_to(p.x, p.y),
                PathOp::LineTo(p) => pb.line_to(p.x, p.y),
                PathOp::QuadTo(c, p) => pb.quad_to(c.x, c.y, p.x, p.y),
                PathOp::CubicTo(c1, c2, p) => pb.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
                PathOp::Close => pb.close(),
            }
        }
        pb.finish()
    }

    // ---- Painting ----

    /// Fill the current path and keep it.
    pub fn fill_preserve(&mut self, color: Color) {
        self.counts.draw_ops += 1;
        let Some(path) = self.build_path() else {
            return;
        };
        let paint = solid_paint(color);
        let transform = self.transform().to_skia();
        self.pixmap.fill_path(
            &path,
            &paint,
            FillRule::Winding,
            transform,
            self.clip_mask.as_ref(),
        );
    }

    /// Stroke the current path and keep it.
    pub fn stroke_preserve(&mut self, color: Color, width: f32) {
        self.counts.draw_ops += 1;
        let Some(path) = self.build_path() else {
            return;
        };
        let paint = solid_paint(color);
        let stroke = Stroke {
            width,
            ..Default::default()
        };
        let transform = self.transform().to_skia();
        self.pixmap
            .stroke_path(&path, &paint, &stroke, transform, self.clip_mask.as_ref());
    }

    pub fn fill(&mut self, color: Color) {
        self.fill_preserve(color);
        self.clear_path();
    }

    pub fn stroke(&mut self, color: Color, width: f32) {
        self.stroke_preserve(color, width);
        self.clear_path();
    }

    /// Fill and/or stroke the current path as `style` asks, then clear it.
    pub fn fill_stroke_clear(&mut self, style: &PaintStyle) {
        if let Some(fill) = style.fill_color() {
            self.fill_preserve(fill);
        }
        if style.has_stroke() {
            if let Some(stroke) = style.stroke_color() {
                self.stroke_preserve(stroke, style.stroke_width);
            }
        }
        self.clear_path();
    }

    /// Replace the pixels of `rect` (intersected with the current bounds) with `color`.
    pub fn fill_box(&mut self, rect: PixelRect, color: Color) {
        let rect = rect.intersect(&self.bounds());
        let Some(r) = skia_rect(&rect.to_rect()) else {
            return;
        };
        self.counts.draw_ops += 1;
        let mut paint = solid_paint(color);
        paint.blend_mode = tiny_skia::BlendMode::Source;
        self.pixmap
            .fill_rect(r, &paint, tiny_skia::Transform::identity(), None);
    }

    /// Replace every pixel with `color`, ignoring bounds.
    pub fn clear(&mut self, color: Color) {
        self.counts.draw_ops += 1;
        self.pixmap.fill(color.to_skia());
    }

    /// Draw `src_rect` of `src` over this buffer with its top-left at `dest`.
    pub fn draw_pixmap_region(&mut self, src: &Pixmap, src_rect: PixelRect, dest: PixelPoint) {
        self.blit(src, src_rect, dest, tiny_skia::BlendMode::SourceOver);
    }

    /// Like [`Painter::draw_pixmap_region`] but replaces the destination pixels.
    pub fn copy_pixmap_region(&mut self, src: &Pixmap, src_rect: PixelRect, dest: PixelPoint) {
        self.blit(src, src_rect, dest, tiny_skia::BlendMode::Source);
    }

    fn blit(
        &mut self,
        src: &Pixmap,
        src_rect: PixelRect,
        dest: PixelPoint,
        blend_mode: tiny_skia::BlendMode,
    ) {
        let Some(int_rect) = src_rect.to_int_rect() else {
            return;
        };
        let Some(region) = src.clone_rect(int_rect) else {
            log::debug!("blit: {:?} outside source buffer", src_rect);
            return;
        };
        self.counts.draw_ops += 1;
        let paint = PixmapPaint {
            blend_mode,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            dest.x,
            dest.y,
            region.as_ref(),
            &paint,
            tiny_skia::Transform::identity(),
            self.clip_mask.as_ref(),
        );
    }

    /// Render a parsed SVG document into `dest`, scaled to fit.
    pub fn draw_svg(&mut self, tree: &resvg::usvg::Tree, dest: &Rect) {
        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return;
        }
        self.counts.draw_ops += 1;
        let fit = Transform::translate(dest.x, dest.y).then(&Transform::scale_xy(
            dest.width / size.width(),
            dest.height / size.height(),
        ));
        let transform = self.transform().then(&fit);
        // resvg has no clip parameter; render into a scratch buffer and
        // composite it through the bounds mask.
        let Some(mut scratch) = Pixmap::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        resvg::render(tree, transform.to_skia(), &mut scratch.as_mut());
        self.pixmap.draw_pixmap(
            0,
            0,
            scratch.as_ref(),
            &PixmapPaint::default(),
            tiny_skia::Transform::identity(),
            self.clip_mask.as_ref(),
        );
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn skia_rect(r: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(r.x, r.y, r.width, r.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painter(w: u32, h: u32) -> Painter {
        Painter::new(PixelSize::new(w, h)).unwrap()
    }

    fn pixel(p: &Painter, x: u32, y: u32) -> [u8; 4] {
        let c = p.pixmap().pixel(x, y).unwrap();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn test_zero_size_allocation_fails() {
        assert!(matches!(
            Painter::new(PixelSize::new(0, 10)),
            Err(Error::Allocation { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_base_paint_level_never_popped() {
        let mut p = painter(4, 4);
        assert_eq!(p.paint_depth(), 1);
        p.pop_paint();
        p.pop_paint();
        assert_eq!(p.paint_depth(), 1);
        p.pop_bounds();
        assert_eq!(p.bounds_depth(), 1);
    }

    #[test]
    fn test_with_paint_composes_and_restores() {
        let mut p = painter(4, 4);
        p.with_paint(&Transform::translate(1.0, 0.0), PaintStyle::BASE, |p| {
            p.with_paint(&Transform::translate(0.0, 2.0), PaintStyle::BASE, |p| {
                assert_eq!(p.paint_depth(), 3);
                assert_eq!(p.transform().transform_point(0.0, 0.0), (1.0, 2.0));
            });
            assert_eq!(p.transform().transform_point(0.0, 0.0), (1.0, 0.0));
        });
        assert_eq!(p.paint_depth(), 1);
        assert!(p.transform().is_identity());
    }

    #[test]
    fn test_with_paint_restores_after_extra_push() {
        let mut p = painter(4, 4);
        p.with_paint(&Transform::IDENTITY, PaintStyle::BASE, |p| {
            // Leaked push inside the scope is discarded on exit.
            p.push_paint(&Transform::IDENTITY, PaintStyle::BASE);
        });
        assert_eq!(p.paint_depth(), 1);
    }

    #[test]
    fn test_preserve_keeps_path() {
        let mut p = painter(10, 10);
        p.rect(&Rect::new(0.0, 0.0, 5.0, 5.0));
        p.fill_preserve(Color::RED);
        assert!(p.has_path());
        p.stroke(Color::BLACK, 1.0);
        assert!(!p.has_path());
        assert_eq!(p.counts().draw_ops, 2);
    }

    #[test]
    fn test_fill_respects_bounds() {
        let mut p = painter(10, 10);
        p.with_bounds(PixelRect::new(0, 0, 5, 10), |p| {
            p.rect(&Rect::new(0.0, 0.0, 10.0, 10.0));
            p.fill(Color::RED);
        });
        assert_eq!(pixel(&p, 2, 2), [255, 0, 0, 255]);
        assert_eq!(pixel(&p, 7, 2), [0, 0, 0, 0]);
        assert_eq!(p.bounds_depth(), 1);
    }

    #[test]
    fn test_nested_bounds_intersect() {
        let mut p = painter(10, 10);
        p.with_bounds(PixelRect::new(0, 0, 5, 5), |p| {
            p.with_bounds(PixelRect::new(3, 3, 10, 10), |p| {
                assert_eq!(p.bounds(), PixelRect::new(3, 3, 5, 5));
                p.rect(&Rect::new(0.0, 0.0, 10.0, 10.0));
                p.fill(Color::RED);
            });
        });
        assert_eq!(pixel(&p, 4, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&p, 7, 7), [0, 0, 0, 0]);
        assert_eq!(pixel(&p, 1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_box_replaces_pixels() {
        let mut p = painter(4, 4);
        p.clear(Color::RED);
        p.fill_box(PixelRect::new(0, 0, 2, 2), Color::TRANSPARENT);
        assert_eq!(pixel(&p, 0, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&p, 3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn test_fill_stroke_clear_with_empty_style_draws_nothing() {
        let mut p = painter(4, 4);
        p.rect(&Rect::new(0.0, 0.0, 4.0, 4.0));
        p.fill_stroke_clear(&PaintStyle::BASE);
        assert!(!p.has_path());
        assert_eq!(p.counts().draw_ops, 0);
    }

    #[test]
    fn test_draw_pixmap_region_offsets_source() {
        let mut src = painter(4, 4);
        src.fill_box(PixelRect::new(2, 2, 4, 4), Color::BLUE);
        let mut dst = painter(4, 4);
        dst.draw_pixmap_region(src.pixmap(), PixelRect::new(2, 2, 4, 4), PixelPoint::new(0, 0));
        assert_eq!(pixel(&dst, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&dst, 1, 1), [0, 0, 255, 255]);
        assert_eq!(pixel(&dst, 2, 2), [0, 0, 0, 0]);
    }
}
