use crate::error::Result;
use crate::geometry::{PixelRect, Point, Rect};
use crate::node::Node;
use crate::painter::Painter;

use super::{impl_shape_builders, impl_shape_node, stroked_bbox, ShapeBase};

fn trace(painter: &mut Painter, points: &[Point]) {
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        painter.move_to(first.x, first.y);
    }
    for p in iter {
        painter.line_to(p.x, p.y);
    }
}

/// Open sequence of connected segments. Fewer than two points draws nothing.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub base: ShapeBase,
}

impl Polyline {
    pub fn new(points: impl IntoIterator<Item = Point>) -> Self {
        Self {
            points: points.into_iter().collect(),
            base: ShapeBase::new(),
        }
    }
}

impl_shape_builders!(Polyline);

impl Node for Polyline {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "polyline"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        if self.points.is_empty() {
            return PixelRect::EMPTY;
        }
        let local = Rect::enclosing(self.points.iter().copied());
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.points.len() < 2 || self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        trace(painter, &self.points);
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

/// Closed polygon. Fewer than two points draws nothing.
#[derive(Debug, Clone, Default)]
pub struct Polygon {
    pub points: Vec<Point>,
    pub base: ShapeBase,
}

impl Polygon {
    pub fn new(points: impl IntoIterator<Item = Point>) -> Self {
        Self {
            points: points.into_iter().collect(),
            base: ShapeBase::new(),
        }
    }
}

impl_shape_builders!(Polygon);

impl Node for Polygon {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "polygon"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        if self.points.is_empty() {
            return PixelRect::EMPTY;
        }
        let local = Rect::enclosing(self.points.iter().copied());
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.points.len() < 2 || self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        trace(painter, &self.points);
        painter.close_path();
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, PixelSize};
    use crate::style::{PaintStyle, StyleProps};

    fn styled<N: Node>(mut node: N) -> N {
        node.apply_style(&PaintStyle::BASE);
        node
    }

    #[test]
    fn test_single_point_polygon_is_noop() {
        let mut painter = Painter::new(PixelSize::new(8, 8)).unwrap();
        let mut polygon = Polygon::new([Point::new(2.0, 2.0)]);
        polygon.base.props = StyleProps::new().fill(Color::RED).stroke(Color::BLACK);
        let polygon = styled(polygon);

        assert!(polygon.render(&mut painter).is_ok());
        assert_eq!(painter.counts().path_ops, 0);
        assert_eq!(painter.counts().draw_ops, 0);
        assert!(painter.pixmap().pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn test_polyline_strokes_when_configured() {
        let mut painter = Painter::new(PixelSize::new(8, 8)).unwrap();
        let line = Polyline::new([Point::new(0.0, 4.0), Point::new(8.0, 4.0)])
            .with_style(StyleProps::new().stroke(Color::BLACK).stroke_width(2.0));
        let line = styled(line);
        line.render(&mut painter).unwrap();
        assert!(painter.counts().draw_ops > 0);
        assert!(!painter.has_path());
    }
}
