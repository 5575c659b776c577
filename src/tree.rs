//! Arena-based node storage for the scene graph.
//!
//! The Tree owns every node of a scene, using a sparse-set architecture with
//! generational indices. Parent/child links and per-node bookkeeping live in
//! the tree's metadata rather than in the nodes themselves, so shapes only
//! implement the [`Node`] contract.
//!
//! ## Key Features
//!
//! - **Generational Indices**: NodeId contains index + generation, so a stale
//!   id held by a caller after removal is detected instead of aliasing a new node.
//!
//! - **Dense Storage**: Nodes stored contiguously; removal is a swap-remove.
//!
//! - **Node Flags**: deleted / updating / invisible / anchor markers, plus a
//!   cached `VIEWPORT` bit so ownership lookups work while a viewport is
//!   extracted for rendering.
//!
//! - **Cached Bounding Boxes**: the raw box a node reported, its box clipped to
//!   the owning viewport's buffer ("local"), and the same box in window
//!   coordinates.

use bitflags::bitflags;

use crate::geometry::PixelRect;
use crate::node::Node;
use crate::painter::Painter;
use crate::signal::ChangeKind;
use crate::style::PaintStyle;

/// Unique identifier for a node in the tree.
///
/// Uses a generational index design:
/// - `index`: Position in the sparse array (reusable after removal)
/// - `generation`: Version counter that increments when a slot is reused
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Combines generation (high bits) with index (low bits).
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

bitflags! {
    /// Per-node bookkeeping flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Scheduled for removal; signals from it are ignored.
        const DELETED = 0b0000_0001;
        /// Inside an update bracket.
        const UPDATING = 0b0000_0010;
        /// Local bounding box came out empty in the last layout pass.
        const INVISIBLE = 0b0000_0100;
        /// Absorbs value changes from descendants that cannot re-render alone.
        const ANCHOR = 0b0000_1000;
        /// The node owns a pixel buffer.
        const VIEWPORT = 0b0001_0000;
    }
}

/// Bounding boxes cached by the layout pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BBoxes {
    /// Box reported by the node, in its owning viewport's buffer coordinates.
    pub raw: PixelRect,
    /// `raw` clipped to the parent's children region.
    pub local: PixelRect,
    /// `local` translated into window coordinates.
    pub window: PixelRect,
    /// Region of the parent the node was clipped against.
    pub clip: PixelRect,
}

/// Entry in the sparse map, pointing to a dense array slot.
struct SparseEntry {
    dense_index: usize,
    generation: u32,
}

struct Slot {
    node: Box<dyn Node>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    flags: NodeFlags,
    dirty: Option<ChangeKind>,
    bbox: BBoxes,
    /// Back-pointer to sparse array index (for swap-remove fixup)
    sparse_index: u32,
}

/// Central storage for a scene's nodes.
pub struct Tree {
    dense: Vec<Slot>,
    sparse: Vec<Option<SparseEntry>>,
    free_indices: Vec<u32>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    /// Store a node as a new root and return its id.
    pub fn insert(&mut self, node: Box<dyn Node>) -> NodeId {
        let (sparse_index, generation) = if let Some(idx) = self.free_indices.pop() {
            let old_gen = self.sparse[idx as usize]
                .as_ref()
                .map(|e| e.generation)
                .unwrap_or(0);
            (idx, old_gen.wrapping_add(1))
        } else {
            let idx = self.sparse.len() as u32;
            self.sparse.push(None);
            (idx, 0)
        };

        let mut flags = NodeFlags::empty();
        flags.set(NodeFlags::VIEWPORT, node.has_own_buffer());
        flags.set(NodeFlags::ANCHOR, node.is_rerender_anchor());

        let dense_index = self.dense.len();
        self.dense.push(Slot {
            node,
            parent: None,
            children: Vec::new(),
            flags,
            dirty: None,
            bbox: BBoxes::default(),
            sparse_index,
        });
        self.sparse[sparse_index as usize] = Some(SparseEntry {
            dense_index,
            generation,
        });

        NodeId::new(sparse_index, generation)
    }

    /// Store a node as the last child of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, node: Box<dyn Node>) -> NodeId {
        let id = self.insert(node);
        self.set_parent(id, parent);
        id
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        self.detach(id);
        for node in self.subtree(id).into_iter().rev() {
            self.unregister(node);
        }
    }

    fn unregister(&mut self, id: NodeId) {
        let Some(dense_index) = self.dense_index(id) else {
            return;
        };
        let last_dense_index = self.dense.len() - 1;
        let removed = self.dense.swap_remove(dense_index);

        if dense_index != last_dense_index {
            let moved_sparse_idx = self.dense[dense_index].sparse_index;
            if let Some(ref mut entry) = self.sparse[moved_sparse_idx as usize] {
                entry.dense_index = dense_index;
            }
        }

        // Keep the generation so the next allocation of this slot bumps it.
        self.sparse[id.index as usize] = Some(SparseEntry {
            dense_index: usize::MAX,
            generation: id.generation,
        });
        self.free_indices.push(id.index);
        drop(removed);
    }

    fn dense_index(&self, id: NodeId) -> Option<usize> {
        self.sparse
            .get(id.index as usize)
            .and_then(|e| e.as_ref())
            .filter(|e| e.generation == id.generation && e.dense_index != usize::MAX)
            .map(|e| e.dense_index)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.dense_index(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Access a node via a closure.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&dyn Node) -> R) -> Option<R> {
        self.dense_index(id).map(|idx| f(&*self.dense[idx].node))
    }

    /// Mutate a node via a closure.
    ///
    /// The node is temporarily extracted from the tree while the closure runs,
    /// so the closure can walk and mutate the rest of the tree (e.g. a
    /// viewport rendering its children into its own buffer).
    pub fn with_node_mut<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn Node, &mut Tree) -> R,
    ) -> Option<R> {
        let dense_index = self.dense_index(id)?;
        let mut node = std::mem::replace(&mut self.dense[dense_index].node, Box::new(Placeholder));

        let result = f(&mut *node, self);

        if let Some(idx) = self.dense_index(id) {
            self.dense[idx].node = node;
        }
        Some(result)
    }

    // ---- Structure ----

    /// Append `child` to `parent`'s children, detaching it from any previous parent.
    ///
    /// Returns false, leaving the tree untouched, when either node is missing
    /// or `parent` lies inside `child`'s subtree.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.is_in_subtree(parent, child) {
            log::error!("cannot move {:?} under its own subtree ({:?})", child, parent);
            return false;
        }
        self.detach(child);
        if let Some(child_dense) = self.dense_index(child) {
            self.dense[child_dense].parent = Some(parent);
        }
        if let Some(parent_dense) = self.dense_index(parent) {
            self.dense[parent_dense].children.push(child);
        }
        true
    }

    /// True when `id` is `root` or one of its descendants.
    pub fn is_in_subtree(&self, id: NodeId, root: NodeId) -> bool {
        id == root || self.ancestors(id).any(|a| a == root)
    }

    /// Unlink a node from its parent, making it a root. The node stays stored.
    pub fn detach(&mut self, id: NodeId) {
        let Some(idx) = self.dense_index(id) else {
            return;
        };
        if let Some(parent) = self.dense[idx].parent.take() {
            if let Some(parent_dense) = self.dense_index(parent) {
                self.dense[parent_dense].children.retain(|&c| c != id);
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.dense_index(id).and_then(|idx| self.dense[idx].parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.dense_index(id)
            .map(|idx| self.dense[idx].children.clone())
            .unwrap_or_default()
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// The node and all its descendants in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(idx) = self.dense_index(current) else {
                continue;
            };
            out.push(current);
            stack.extend(self.dense[idx].children.iter().rev().copied());
        }
        out
    }

    /// Nearest ancestor that owns a pixel buffer.
    pub fn owning_viewport(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.has_flag(a, NodeFlags::VIEWPORT))
    }

    /// Nearest node, starting with `id` itself and stopping at the owning
    /// viewport, that is flagged as a re-render anchor.
    pub fn rerender_anchor(&self, id: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .take_while(|&n| n == id || !self.has_flag(n, NodeFlags::VIEWPORT))
            .find(|&n| self.has_flag(n, NodeFlags::ANCHOR))
    }

    // ---- Flags ----

    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.dense_index(id)
            .map(|idx| self.dense[idx].flags)
            .unwrap_or_default()
    }

    pub fn has_flag(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.flags(id).contains(flag)
    }

    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags, on: bool) {
        if let Some(idx) = self.dense_index(id) {
            self.dense[idx].flags.set(flag, on);
        }
    }

    pub fn set_rerender_anchor(&mut self, id: NodeId, anchor: bool) {
        self.set_flag(id, NodeFlags::ANCHOR, anchor);
    }

    /// Deleted or already removed.
    pub fn is_deleted(&self, id: NodeId) -> bool {
        !self.contains(id) || self.has_flag(id, NodeFlags::DELETED)
    }

    pub fn is_updating(&self, id: NodeId) -> bool {
        self.has_flag(id, NodeFlags::UPDATING)
    }

    /// Flag a node and its subtree as deleted.
    pub fn mark_deleted(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.set_flag(node, NodeFlags::DELETED, true);
        }
    }

    /// Open an update bracket. Returns false (and changes nothing) if the node
    /// is missing, deleted, or already updating; pass the result to
    /// [`Tree::update_end`].
    pub fn update_start(&mut self, id: NodeId) -> bool {
        if self.is_deleted(id) || self.is_updating(id) {
            return false;
        }
        self.set_flag(id, NodeFlags::UPDATING, true);
        true
    }

    pub fn update_end(&mut self, id: NodeId, started: bool) {
        if started {
            self.set_flag(id, NodeFlags::UPDATING, false);
        }
    }

    // ---- Dirty classification ----

    /// Record a change. Structural changes dominate value changes.
    pub fn mark_dirty(&mut self, id: NodeId, kind: ChangeKind) {
        if let Some(idx) = self.dense_index(id) {
            let slot = &mut self.dense[idx];
            slot.dirty = match (slot.dirty, kind) {
                (Some(ChangeKind::Structure), _) => Some(ChangeKind::Structure),
                (_, kind) => Some(kind),
            };
        }
    }

    pub fn dirty(&self, id: NodeId) -> Option<ChangeKind> {
        self.dense_index(id).and_then(|idx| self.dense[idx].dirty)
    }

    pub fn clear_dirty(&mut self, id: NodeId) {
        if let Some(idx) = self.dense_index(id) {
            self.dense[idx].dirty = None;
        }
    }

    // ---- Bounding boxes ----

    pub fn bboxes(&self, id: NodeId) -> Option<BBoxes> {
        self.dense_index(id).map(|idx| self.dense[idx].bbox)
    }

    pub fn set_bboxes(&mut self, id: NodeId, bbox: BBoxes) {
        if let Some(idx) = self.dense_index(id) {
            self.dense[idx].bbox = bbox;
            self.dense[idx].flags.set(NodeFlags::INVISIBLE, bbox.local.is_empty());
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in stored while a node is extracted by [`Tree::with_node_mut`].
struct Placeholder;

impl Node for Placeholder {
    fn kind(&self) -> &'static str {
        "placeholder"
    }

    fn style(&self) -> &PaintStyle {
        &PaintStyle::BASE
    }

    fn apply_style(&mut self, _parent: &PaintStyle) {}

    fn compute_bbox(&self, _painter: &Painter) -> PixelRect {
        PixelRect::EMPTY
    }

    fn render(&self, _painter: &mut Painter) -> crate::Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Group;

    fn group() -> Box<dyn Node> {
        Box::new(Group::new())
    }

    #[test]
    fn test_tree_insert_remove() {
        let mut tree = Tree::new();
        let id = tree.insert(group());
        assert!(tree.contains(id));

        tree.remove(id);
        assert!(!tree.contains(id));
        assert!(tree.is_deleted(id));
    }

    #[test]
    fn test_tree_generational_index() {
        let mut tree = Tree::new();
        let id1 = tree.insert(group());
        tree.remove(id1);
        let id2 = tree.insert(group());

        assert!(!tree.contains(id1));
        assert!(tree.contains(id2));
        assert_eq!(id1.index, id2.index);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn test_tree_parent_child_order() {
        let mut tree = Tree::new();
        let root = tree.insert(group());
        let a = tree.insert_child(root, group());
        let b = tree.insert_child(root, group());

        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.children(root), vec![a, b]);
    }

    #[test]
    fn test_reparent_detaches_from_old_parent() {
        let mut tree = Tree::new();
        let first = tree.insert(group());
        let second = tree.insert(group());
        let child = tree.insert_child(first, group());

        assert!(tree.set_parent(child, second));
        assert!(tree.children(first).is_empty());
        assert_eq!(tree.children(second), vec![child]);
    }

    #[test]
    fn test_reparent_under_own_descendant_is_refused() {
        let mut tree = Tree::new();
        let top = tree.insert(group());
        let middle = tree.insert_child(top, group());
        let leaf = tree.insert_child(middle, group());

        assert!(!tree.set_parent(top, leaf));
        assert!(!tree.set_parent(middle, middle));
        assert_eq!(tree.parent(middle), Some(top));
        assert_eq!(tree.parent(top), None);
        assert_eq!(tree.ancestors(leaf).collect::<Vec<_>>(), vec![middle, top]);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut tree = Tree::new();
        let root = tree.insert(group());
        let mid = tree.insert_child(root, group());
        let leaf = tree.insert_child(mid, group());
        let sibling = tree.insert_child(root, group());

        tree.remove(mid);
        assert!(!tree.contains(mid));
        assert!(!tree.contains(leaf));
        assert!(tree.contains(sibling));
        assert_eq!(tree.children(root), vec![sibling]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_subtree_is_preorder() {
        let mut tree = Tree::new();
        let root = tree.insert(group());
        let a = tree.insert_child(root, group());
        let a1 = tree.insert_child(a, group());
        let b = tree.insert_child(root, group());
        assert_eq!(tree.subtree(root), vec![root, a, a1, b]);
    }

    #[test]
    fn test_rerender_anchor_includes_self_and_stops_at_viewport() {
        let mut tree = Tree::new();
        let root = tree.insert(group());
        tree.set_flag(root, NodeFlags::VIEWPORT, true);
        tree.set_rerender_anchor(root, true);
        let mid = tree.insert_child(root, group());
        let leaf = tree.insert_child(mid, group());

        // The viewport itself is not an anchor for its descendants.
        assert_eq!(tree.rerender_anchor(leaf), None);

        tree.set_rerender_anchor(mid, true);
        assert_eq!(tree.rerender_anchor(leaf), Some(mid));
        assert_eq!(tree.rerender_anchor(mid), Some(mid));
    }

    #[test]
    fn test_owning_viewport() {
        let mut tree = Tree::new();
        let vp = tree.insert(group());
        tree.set_flag(vp, NodeFlags::VIEWPORT, true);
        let mid = tree.insert_child(vp, group());
        let leaf = tree.insert_child(mid, group());
        assert_eq!(tree.owning_viewport(leaf), Some(vp));
        assert_eq!(tree.owning_viewport(vp), None);
    }

    #[test]
    fn test_update_bracket_refuses_nesting() {
        let mut tree = Tree::new();
        let id = tree.insert(group());
        let outer = tree.update_start(id);
        assert!(outer);
        let inner = tree.update_start(id);
        assert!(!inner);
        tree.update_end(id, inner);
        assert!(tree.is_updating(id));
        tree.update_end(id, outer);
        assert!(!tree.is_updating(id));
    }

    #[test]
    fn test_structural_dirty_dominates() {
        let mut tree = Tree::new();
        let id = tree.insert(group());
        tree.mark_dirty(id, ChangeKind::Structure);
        tree.mark_dirty(id, ChangeKind::Value);
        assert_eq!(tree.dirty(id), Some(ChangeKind::Structure));
        tree.clear_dirty(id);
        assert_eq!(tree.dirty(id), None);
    }

    #[test]
    fn test_with_node_mut_restores_node() {
        let mut tree = Tree::new();
        let id = tree.insert(group());
        let kind = tree.with_node_mut(id, |node, tree| {
            // Extracted: the tree sees the placeholder meanwhile.
            assert_eq!(tree.with_node(id, |n| n.kind()), Some("placeholder"));
            node.kind()
        });
        assert_eq!(kind, Some("group"));
        assert_eq!(tree.with_node(id, |n| n.kind()), Some("group"));
    }

    #[test]
    fn test_swap_remove_fixup() {
        let mut tree = Tree::new();
        let id1 = tree.insert(group());
        let id2 = tree.insert(group());
        let id3 = tree.insert(group());

        tree.remove(id1);
        assert!(!tree.contains(id1));
        assert!(tree.with_node(id2, |_| ()).is_some());
        assert!(tree.with_node(id3, |_| ()).is_some());
    }
}
