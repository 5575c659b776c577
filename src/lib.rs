//! Retained-mode 2D scene graph with viewport compositing and incremental
//! re-rendering.
//!
//! A [`Scene`](scene::Scene) owns a [`Tree`](tree::Tree) of nodes and the
//! [`Window`](window::Window) they render to. Nodes that own a pixel buffer
//! are [`Viewport`](viewport::Viewport)s; everything else (shapes, groups,
//! layout frames, SVG images) paints into the buffer of its nearest viewport
//! ancestor. Changes are reported as signals and repainted on the next tick:
//! structural changes re-render the whole viewport, value changes only the
//! affected subtree.

pub mod error;
pub mod geometry;
pub mod node;
pub mod painter;
pub mod render_stats;
pub mod scene;
pub mod shapes;
pub mod signal;
pub mod style;
pub mod transform;
pub mod tree;
pub mod viewport;
pub mod window;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Color, PixelPoint, PixelRect, PixelSize, Point, Rect};
    pub use crate::node::Node;
    pub use crate::painter::Painter;
    pub use crate::scene::Scene;
    pub use crate::shapes::{
        style, Circle, Ellipse, Frame, Group, Line, PathCommand, PathShape, Polygon, Polyline,
        RectShape, SvgImage,
    };
    pub use crate::signal::{ChangeKind, Route};
    pub use crate::style::{PaintSource, PaintStyle, StyleProps};
    pub use crate::transform::Transform;
    pub use crate::tree::{NodeId, Tree};
    pub use crate::viewport::{Viewport, ViewportFlags};
    pub use crate::window::{Compositor, Window, WindowConfig};
}
