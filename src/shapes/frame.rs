use crate::error::Result;
use crate::geometry::{PixelRect, Rect};
use crate::node::Node;
use crate::painter::Painter;
use crate::transform::Transform;

use super::{impl_shape_builders, stroked_bbox, ShapeBase};

/// Layout container: a box at a fixed position whose children are laid out
/// relative to its top-left corner.
///
/// The box itself is painted with the frame's own fill/stroke; children
/// inherit that style unless they override it. Frames are the natural place
/// to put a re-render anchor: a frame marked with [`Frame::anchor`] absorbs
/// value changes from descendants that cannot repaint on their own.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rect: Rect,
    pub radius: f32,
    pub base: ShapeBase,
    anchor: bool,
    independent: bool,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            radius: 0.0,
            base: ShapeBase::new(),
            anchor: false,
            independent: true,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn anchor(mut self, anchor: bool) -> Self {
        self.anchor = anchor;
        self
    }

    /// Mark the frame as unable to repaint alone (e.g. its content depends on
    /// its siblings' layout).
    pub fn independent(mut self, independent: bool) -> Self {
        self.independent = independent;
        self
    }

    fn local_box(&self) -> Rect {
        Rect::new(0.0, 0.0, self.rect.width, self.rect.height)
    }
}

impl_shape_builders!(Frame);

impl Node for Frame {
    fn kind(&self) -> &'static str {
        "frame"
    }

    fn transform(&self) -> Transform {
        self.base
            .transform
            .then(&Transform::translate(self.rect.x, self.rect.y))
    }

    fn style(&self) -> &crate::style::PaintStyle {
        self.base.resolved()
    }

    fn apply_style(&mut self, parent: &crate::style::PaintStyle) {
        self.base.resolve(parent);
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        stroked_bbox(painter, &self.local_box(), self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        painter.rounded_rect(&self.local_box(), self.radius);
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }

    fn is_independently_rerenderable(&self) -> bool {
        self.independent
    }

    fn is_rerender_anchor(&self) -> bool {
        self.anchor
    }

    fn is_layout(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
