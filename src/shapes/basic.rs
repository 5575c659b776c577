use crate::error::Result;
use crate::geometry::{PixelRect, Point, Rect};
use crate::node::Node;
use crate::painter::Painter;

use super::{impl_shape_builders, impl_shape_node, stroked_bbox, ShapeBase};

/// Axis-aligned rectangle with optional rounded corners.
#[derive(Debug, Clone)]
pub struct RectShape {
    pub rect: Rect,
    pub radius: f32,
    pub base: ShapeBase,
}

impl RectShape {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            radius: 0.0,
            base: ShapeBase::new(),
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }
}

impl_shape_builders!(RectShape);

impl Node for RectShape {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "rect"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        stroked_bbox(painter, &self.rect, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        painter.rounded_rect(&self.rect, self.radius);
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Circle {
    pub center: Point,
    pub radius: f32,
    pub base: ShapeBase,
}

impl Circle {
    pub fn new(center: Point, radius: f32) -> Self {
        Self {
            center,
            radius,
            base: ShapeBase::new(),
        }
    }
}

impl_shape_builders!(Circle);

impl Node for Circle {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "circle"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        let r = self.radius;
        let local = Rect::new(self.center.x - r, self.center.y - r, r * 2.0, r * 2.0);
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        painter.circle(self.center.x, self.center.y, self.radius);
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Ellipse {
    pub center: Point,
    pub rx: f32,
    pub ry: f32,
    pub base: ShapeBase,
}

impl Ellipse {
    pub fn new(center: Point, rx: f32, ry: f32) -> Self {
        Self {
            center,
            rx,
            ry,
            base: ShapeBase::new(),
        }
    }
}

impl_shape_builders!(Ellipse);

impl Node for Ellipse {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "ellipse"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        let local = Rect::new(
            self.center.x - self.rx,
            self.center.y - self.ry,
            self.rx * 2.0,
            self.ry * 2.0,
        );
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        painter.ellipse(self.center.x, self.center.y, self.rx, self.ry);
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

/// A single segment. Lines have no interior, so only the stroke is drawn.
#[derive(Debug, Clone)]
pub struct Line {
    pub from: Point,
    pub to: Point,
    pub base: ShapeBase,
}

impl Line {
    pub fn new(from: Point, to: Point) -> Self {
        Self {
            from,
            to,
            base: ShapeBase::new(),
        }
    }
}

impl_shape_builders!(Line);

impl Node for Line {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "line"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        let local = Rect::enclosing([self.from, self.to]);
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        let style = *self.base.resolved();
        if !style.has_stroke() {
            return Ok(());
        }
        painter.move_to(self.from.x, self.from.y);
        painter.line_to(self.to.x, self.to.y);
        if let Some(color) = style.stroke_color() {
            painter.stroke_preserve(color, style.stroke_width);
        }
        painter.clear_path();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, PixelSize};
    use crate::shapes::style;
    use crate::style::PaintStyle;

    fn painter() -> Painter {
        Painter::new(PixelSize::new(32, 32)).unwrap()
    }

    #[test]
    fn test_unstyled_shapes_do_nothing() {
        let mut painter = painter();
        let mut shapes: Vec<Box<dyn Node>> = vec![
            Box::new(RectShape::new(Rect::new(2.0, 2.0, 10.0, 10.0))),
            Box::new(Circle::new(Point::new(16.0, 16.0), 5.0)),
            Box::new(Ellipse::new(Point::new(16.0, 16.0), 6.0, 3.0)),
            Box::new(Line::new(Point::new(0.0, 0.0), Point::new(31.0, 31.0))),
        ];
        for shape in &mut shapes {
            shape.apply_style(&PaintStyle::BASE);
            assert!(shape.render(&mut painter).is_ok());
        }
        assert_eq!(painter.counts().path_ops, 0);
        assert_eq!(painter.counts().draw_ops, 0);
    }

    #[test]
    fn test_bbox_includes_stroke() {
        let painter = painter();
        let mut rect = RectShape::new(Rect::new(4.0, 4.0, 8.0, 8.0))
            .with_style(style().stroke(Color::BLACK).stroke_width(2.0));
        rect.apply_style(&PaintStyle::BASE);
        assert_eq!(rect.compute_bbox(&painter), PixelRect::new(3, 3, 13, 13));
    }

    #[test]
    fn test_circle_fills_center() {
        let mut painter = painter();
        let mut circle =
            Circle::new(Point::new(16.0, 16.0), 6.0).with_style(style().fill(Color::RED));
        circle.apply_style(&PaintStyle::BASE);
        circle.render(&mut painter).unwrap();
        assert!(!painter.has_path());
        let px = painter.pixmap().pixel(16, 16).unwrap();
        assert_eq!((px.red(), px.green(), px.blue()), (255, 0, 0));
    }
}
