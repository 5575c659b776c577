//! The node contract.
//!
//! Every element of the scene graph implements [`Node`]. A node takes part in
//! three passes driven by its owning viewport:
//!
//! 1. **Style**: [`Node::apply_style`] resolves the node's own properties
//!    against the inherited [`PaintStyle`].
//! 2. **Layout**: [`Node::compute_bbox`] reports the pixel box the node covers
//!    under the painter's current transform. The viewport clips and caches it.
//! 3. **Paint**: [`Node::render`] draws the node itself. Children are walked
//!    by the viewport, inside the node's paint level, so the node's transform
//!    and style are inherited by its descendants but never leak to siblings.

use std::any::Any;

use crate::error::Result;
use crate::geometry::PixelRect;
use crate::painter::Painter;
use crate::style::PaintStyle;
use crate::transform::Transform;
use crate::viewport::Viewport;

pub trait Node {
    /// Short, static name of the node type, used in logs.
    fn kind(&self) -> &'static str;

    /// Local transform, composed onto the painter around this node and its children.
    fn transform(&self) -> Transform {
        Transform::IDENTITY
    }

    /// Style resolved by the last style pass.
    fn style(&self) -> &PaintStyle;

    fn apply_style(&mut self, parent: &PaintStyle);

    /// Pixel box covered by the node under `painter`'s current transform.
    ///
    /// Must not mutate anything; the caller caches the result.
    fn compute_bbox(&self, painter: &Painter) -> PixelRect;

    /// When true, the node's box is widened to include its children's boxes.
    fn bbox_includes_children(&self) -> bool {
        false
    }

    /// Draw the node. Must leave the painter's path cleared.
    fn render(&self, painter: &mut Painter) -> Result<()>;

    /// True only for nodes that own a pixel buffer.
    fn has_own_buffer(&self) -> bool {
        false
    }

    /// Whether a value change can be repainted by re-rendering just this node.
    fn is_independently_rerenderable(&self) -> bool {
        true
    }

    /// Whether this node absorbs value changes from descendants that cannot
    /// re-render on their own. Read when the node is inserted; see
    /// [`crate::tree::Tree::set_rerender_anchor`] to change it later.
    fn is_rerender_anchor(&self) -> bool {
        false
    }

    /// Layout containers hold caller-managed content in popups.
    fn is_layout(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_viewport(&self) -> Option<&Viewport> {
        None
    }

    fn as_viewport_mut(&mut self) -> Option<&mut Viewport> {
        None
    }
}

