//! Concrete node types: vector shapes, groups, layout frames and SVG images.
//!
//! Stroke/fill shapes share a [`ShapeBase`] (style overrides, resolved style,
//! local transform) and follow the same render discipline: return early when
//! the resolved style neither fills nor strokes, otherwise build the path,
//! fill and/or stroke it, and clear it.

pub mod basic;
pub mod frame;
pub mod group;
pub mod path;
pub mod poly;
pub mod svg;

use crate::geometry::{PixelRect, Rect};
use crate::painter::Painter;
use crate::style::{PaintStyle, StyleProps};
use crate::transform::Transform;

/// State shared by every styled shape.
#[derive(Debug, Clone, Default)]
pub struct ShapeBase {
    pub props: StyleProps,
    pub transform: Transform,
    style: PaintStyle,
}

impl ShapeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved(&self) -> &PaintStyle {
        &self.style
    }

    fn resolve(&mut self, parent: &PaintStyle) {
        self.style = self.props.resolve(parent);
    }
}

/// Pixel box of `local` (in shape coordinates) under the painter transform,
/// widened by half the stroke width.
pub(crate) fn stroked_bbox(painter: &Painter, local: &Rect, style: &PaintStyle) -> PixelRect {
    let local = local.outset(style.stroke_extent());
    PixelRect::covering(&painter.transform().map_rect(&local))
}

/// Implements the style/transform half of [`crate::node::Node`] plus the
/// `Any` accessors for types with a `base: ShapeBase` field.
macro_rules! impl_shape_node {
    () => {
        fn transform(&self) -> crate::transform::Transform {
            self.base.transform
        }
        fn style(&self) -> &crate::style::PaintStyle {
            self.base.resolved()
        }
        fn apply_style(&mut self, parent: &crate::style::PaintStyle) {
            self.base.resolve(parent);
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}
pub(crate) use impl_shape_node;

/// Builder methods shared by every type with a `base: ShapeBase` field.
macro_rules! impl_shape_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_style(mut self, props: crate::style::StyleProps) -> Self {
                self.base.props = props;
                self
            }

            pub fn with_transform(mut self, transform: crate::transform::Transform) -> Self {
                self.base.transform = transform;
                self
            }

            pub fn props_mut(&mut self) -> &mut crate::style::StyleProps {
                &mut self.base.props
            }
        }
    };
}
pub(crate) use impl_shape_builders;

pub use basic::{Circle, Ellipse, Line, RectShape};
pub use frame::Frame;
pub use group::Group;
pub use path::{parse_path_data, PathCommand, PathShape};
pub use poly::{Polygon, Polyline};
pub use svg::SvgImage;

/// Shorthand for style overrides, re-exported for shape construction.
pub fn style() -> StyleProps {
    StyleProps::new()
}
