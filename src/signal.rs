//! Change notification and render-request bookkeeping.
//!
//! Nodes report changes as [`ChangeSignal`]s. The [`Notifier`] classifies each
//! signal against the tree and decides what its owning viewport has to do:
//! nothing, a full re-render, or a partial re-render of one subtree. Viewports
//! accumulate the outcome in a [`RenderRequest`] until the next tick.

use crate::tree::{NodeFlags, NodeId, Tree};

/// What kind of change a node reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A property changed; the node's position in the tree did not.
    Value,
    /// Children were added, removed or reordered.
    Structure,
}

/// A change reported by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeSignal {
    pub node: NodeId,
    pub kind: ChangeKind,
}

impl ChangeSignal {
    pub fn value(node: NodeId) -> Self {
        Self {
            node,
            kind: ChangeKind::Value,
        }
    }

    pub fn structure(node: NodeId) -> Self {
        Self {
            node,
            kind: ChangeKind::Structure,
        }
    }
}

/// A subtree queued for partial re-render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialTarget {
    pub node: NodeId,
    /// Re-run style and layout on the subtree before painting it. Set for
    /// re-render anchors standing in for a descendant.
    pub restyle: bool,
}

/// Pending work for one viewport.
///
/// `Full` absorbs everything; partial targets are kept in arrival order and
/// deduplicated by node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RenderRequest {
    #[default]
    Clean,
    Full,
    Partial(Vec<PartialTarget>),
}

impl RenderRequest {
    pub fn request_full(&mut self) {
        *self = RenderRequest::Full;
    }

    pub fn request_partial(&mut self, target: PartialTarget) {
        match self {
            RenderRequest::Full => {}
            RenderRequest::Clean => *self = RenderRequest::Partial(vec![target]),
            RenderRequest::Partial(targets) => {
                match targets.iter_mut().find(|t| t.node == target.node) {
                    Some(existing) => existing.restyle |= target.restyle,
                    None => targets.push(target),
                }
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, RenderRequest::Clean)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, RenderRequest::Full)
    }

    /// Hand the pending work to the caller and reset to `Clean`.
    pub fn take(&mut self) -> RenderRequest {
        std::mem::take(self)
    }
}

/// Outcome of classifying a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// The node is deleted or unknown; nothing to do.
    Ignored,
    /// The node is inside an update bracket. Signals must only be sent once
    /// the bracket closes, so this one is logged and dropped.
    Dropped,
    /// The viewport must re-render everything.
    Full { viewport: NodeId },
    /// The viewport can re-render one subtree.
    Partial {
        viewport: NodeId,
        target: PartialTarget,
    },
}

impl Route {
    pub fn viewport(&self) -> Option<NodeId> {
        match *self {
            Route::Full { viewport } | Route::Partial { viewport, .. } => Some(viewport),
            Route::Ignored | Route::Dropped => None,
        }
    }

    /// Fold this route into a viewport's pending request.
    pub fn apply_to(&self, request: &mut RenderRequest) {
        match *self {
            Route::Full { .. } => request.request_full(),
            Route::Partial { target, .. } => request.request_partial(target),
            Route::Ignored | Route::Dropped => {}
        }
    }
}

/// Counters kept by the notifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifierStats {
    pub routed: u64,
    pub ignored: u64,
    pub dropped: u64,
}

/// Classifies change signals into render requests.
#[derive(Debug, Default)]
pub struct Notifier {
    stats: NotifierStats,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> NotifierStats {
        self.stats
    }

    /// Decide which viewport handles `signal` and how.
    ///
    /// A signal from a top-level viewport routes to the viewport itself, and
    /// always as a full re-render.
    pub fn route(&mut self, tree: &Tree, signal: ChangeSignal) -> Route {
        let node = signal.node;
        if tree.is_deleted(node) {
            log::trace!("ignoring {:?} signal from deleted node {:?}", signal.kind, node);
            self.stats.ignored += 1;
            return Route::Ignored;
        }
        if tree.is_updating(node) {
            log::error!(
                "{:?} signal from node {:?} while it is updating; signals must follow the update bracket",
                signal.kind,
                node
            );
            self.stats.dropped += 1;
            return Route::Dropped;
        }

        let Some(viewport) = tree.owning_viewport(node) else {
            if tree.has_flag(node, NodeFlags::VIEWPORT) {
                self.stats.routed += 1;
                return Route::Full { viewport: node };
            }
            log::debug!("signal from detached node {:?}", node);
            self.stats.ignored += 1;
            return Route::Ignored;
        };
        self.stats.routed += 1;

        if signal.kind == ChangeKind::Structure {
            return Route::Full { viewport };
        }

        let independent = tree
            .with_node(node, |n| n.is_independently_rerenderable())
            .unwrap_or(false);
        if independent {
            return Route::Partial {
                viewport,
                target: PartialTarget {
                    node,
                    restyle: false,
                },
            };
        }
        match tree.rerender_anchor(node) {
            Some(anchor) => Route::Partial {
                viewport,
                target: PartialTarget {
                    node: anchor,
                    restyle: true,
                },
            },
            None => Route::Full { viewport },
        }
    }
}
