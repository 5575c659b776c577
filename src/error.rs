use thiserror::Error;

use crate::tree::NodeId;

/// Errors surfaced by the scene graph.
///
/// Rendering passes do not return these; they log and skip the failing
/// subtree. Only the operations a caller can act on are fallible.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to allocate a {width}x{height} pixel buffer")]
    Allocation { width: u32, height: u32 },
    #[error("missing asset: {0}")]
    MissingAsset(String),
    #[error("node {0:?} is not in the tree")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not a viewport")]
    NotAViewport(NodeId),
    #[error("cannot move {node:?} under its own subtree ({parent:?})")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("node {id:?} is not a {expected}")]
    NodeType { id: NodeId, expected: &'static str },
    #[error("invalid path data: {0}")]
    PathData(String),
    #[error("SVG error: {0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
