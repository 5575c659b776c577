use crate::error::{Error, Result};
use crate::geometry::{PixelRect, Point, Rect};
use crate::node::Node;
use crate::painter::Painter;

use svgtypes::SimplePathSegment;

use super::{impl_shape_builders, impl_shape_node, stroked_bbox, ShapeBase};

/// One absolute path segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

impl PathCommand {
    /// End point and control points.
    fn points(&self) -> Vec<Point> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => vec![p],
            PathCommand::QuadTo(c, p) => vec![c, p],
            PathCommand::CubicTo(c1, c2, p) => vec![c1, c2, p],
            PathCommand::Close => Vec::new(),
        }
    }
}

/// Arbitrary path built from [`PathCommand`]s.
#[derive(Debug, Clone, Default)]
pub struct PathShape {
    pub commands: Vec<PathCommand>,
    pub base: ShapeBase,
}

impl PathShape {
    pub fn new(commands: Vec<PathCommand>) -> Self {
        Self {
            commands,
            base: ShapeBase::new(),
        }
    }

    /// Build from SVG path data.
    pub fn from_data(d: &str) -> Result<Self> {
        Ok(Self::new(parse_path_data(d)?))
    }
}

impl_shape_builders!(PathShape);

impl Node for PathShape {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "path"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        if self.commands.is_empty() {
            return PixelRect::EMPTY;
        }
        // Control points bound the curves, which is enough for clipping.
        let local = Rect::enclosing(self.commands.iter().flat_map(|c| c.points()));
        stroked_bbox(painter, &local, self.base.resolved())
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        if self.commands.is_empty() || self.base.resolved().has_no_stroke_or_fill() {
            return Ok(());
        }
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) => painter.move_to(p.x, p.y),
                PathCommand::LineTo(p) => painter.line_to(p.x, p.y),
                PathCommand::QuadTo(c, p) => painter.quad_to(c.x, c.y, p.x, p.y),
                PathCommand::CubicTo(c1, c2, p) => {
                    painter.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y)
                }
                PathCommand::Close => painter.close_path(),
            }
        }
        painter.fill_stroke_clear(self.base.resolved());
        Ok(())
    }
}

/// Parse SVG path data into absolute commands.
///
/// Relative and shorthand segments are resolved by `svgtypes`; arcs come
/// back as cubic curves.
pub fn parse_path_data(d: &str) -> Result<Vec<PathCommand>> {
    let point = |x: f64, y: f64| Point::new(x as f32, y as f32);
    svgtypes::SimplifyingPathParser::from(d)
        .map(|segment| {
            let segment = segment.map_err(|err| Error::PathData(err.to_string()))?;
            Ok(match segment {
                SimplePathSegment::MoveTo { x, y } => PathCommand::MoveTo(point(x, y)),
                SimplePathSegment::LineTo { x, y } => PathCommand::LineTo(point(x, y)),
                SimplePathSegment::Quadratic { x1, y1, x, y } => {
                    PathCommand::QuadTo(point(x1, y1), point(x, y))
                }
                SimplePathSegment::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => PathCommand::CubicTo(point(x1, y1), point(x2, y2), point(x, y)),
                SimplePathSegment::ClosePath => PathCommand::Close,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_and_implicit_lineto() {
        let cmds = parse_path_data("M10 10 20 10 20,20 Z").unwrap();
        assert_eq!(
            cmds,
            vec![
                PathCommand::MoveTo(Point::new(10.0, 10.0)),
                PathCommand::LineTo(Point::new(20.0, 10.0)),
                PathCommand::LineTo(Point::new(20.0, 20.0)),
                PathCommand::Close,
            ]
        );
    }

    #[test]
    fn test_parse_relative_commands() {
        let cmds = parse_path_data("m5 5 h10 v-2 l-1-1 z").unwrap();
        assert_eq!(cmds[1], PathCommand::LineTo(Point::new(15.0, 5.0)));
        assert_eq!(cmds[2], PathCommand::LineTo(Point::new(15.0, 3.0)));
        assert_eq!(cmds[3], PathCommand::LineTo(Point::new(14.0, 2.0)));
        assert_eq!(cmds[4], PathCommand::Close);
    }

    #[test]
    fn test_parse_curves_and_exponents() {
        let cmds = parse_path_data("M0 0 C1e1 0 10 10 0 10 Q-5 5 0 0").unwrap();
        assert_eq!(
            cmds[1],
            PathCommand::CubicTo(
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0)
            )
        );
        assert_eq!(
            cmds[2],
            PathCommand::QuadTo(Point::new(-5.0, 5.0), Point::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_parse_shorthand_and_arc_segments() {
        let cmds = parse_path_data("M0 0 H10 S20 10 10 20 A5 5 0 0 1 0 20").unwrap();
        assert_eq!(cmds[1], PathCommand::LineTo(Point::new(10.0, 0.0)));
        assert!(matches!(cmds[2], PathCommand::CubicTo(_, _, p) if p == Point::new(10.0, 20.0)));
        let Some(PathCommand::CubicTo(_, _, end)) = cmds.last().copied() else {
            panic!("arc should end in a curve: {:?}", cmds);
        };
        assert!(end.x.abs() < 1e-3 && (end.y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_path_data("10 10"), Err(Error::PathData(_))));
        assert!(matches!(parse_path_data("M 1"), Err(Error::PathData(_))));
        assert!(matches!(parse_path_data("M 1 1 A 1 1"), Err(Error::PathData(_))));
        assert!(matches!(parse_path_data("L 1 1"), Err(Error::PathData(_))));
        assert!(matches!(parse_path_data("M # 1"), Err(Error::PathData(_))));
    }
}
