use crate::error::Result;
use crate::geometry::PixelRect;
use crate::node::Node;
use crate::painter::Painter;

use super::{impl_shape_builders, impl_shape_node, ShapeBase};

/// Draws nothing itself; groups children under a shared transform and style.
///
/// Its bounding box is the union of its children's boxes.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub base: ShapeBase,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }
}

impl_shape_builders!(Group);

impl Node for Group {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "group"
    }

    fn compute_bbox(&self, _painter: &Painter) -> PixelRect {
        PixelRect::EMPTY
    }

    fn bbox_includes_children(&self) -> bool {
        true
    }

    fn render(&self, _painter: &mut Painter) -> Result<()> {
        Ok(())
    }
}
