//! The scene: a tree of nodes, the window it renders to, and the loop that
//! turns change signals into re-renders.
//!
//! ```ignore
//! let mut scene = Scene::new(WindowConfig::new().size(200, 100))?;
//! let label = scene.add_node(scene.root(), RectShape::new(rect).with_style(style().fill(Color::RED)))?;
//! scene.tick();
//!
//! scene.update_as::<RectShape>(label, ChangeKind::Value, |r| {
//!     r.props_mut().fill = PaintSource::Solid(Color::BLUE);
//! })?;
//! scene.tick(); // repaints just the label
//! ```
//!
//! Mutations go through [`Scene::update`] (or [`Scene::update_as`]), which
//! brackets the change with the tree's update flag and signals once the
//! bracket closes. Signals are folded into per-viewport render requests and
//! processed on the next [`Scene::tick`].

use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::{PixelPoint, PixelRect, PixelSize};
use crate::node::Node;
use crate::render_stats;
use crate::signal::{ChangeKind, ChangeSignal, Notifier, NotifierStats, RenderRequest, Route};
use crate::tree::{NodeFlags, NodeId, Tree};
use crate::viewport::{Viewport, ViewportFlags};
use crate::window::{Compositor, Window, WindowConfig};

pub struct Scene {
    tree: Tree,
    window: Window,
    root: NodeId,
    overlay: Option<NodeId>,
    notifier: Notifier,
}

impl Scene {
    /// Create a window and a main viewport covering it.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let background = config.background;
        let window = Window::new(config)?;
        let main = Viewport::new("main", window.size()).with_background(background);
        Ok(Self::with_main_viewport(window, main))
    }

    /// Use `main` as the top-level viewport of `window`.
    pub fn with_main_viewport(window: Window, main: Viewport) -> Self {
        let mut tree = Tree::new();
        let root = tree.insert(Box::new(main));
        Self {
            tree,
            window,
            root,
            overlay: None,
            notifier: Notifier::new(),
        }
    }

    /// The main viewport.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn overlay(&self) -> Option<NodeId> {
        self.overlay
    }

    pub fn notifier_stats(&self) -> NotifierStats {
        self.notifier.stats()
    }

    pub fn with_viewport<R>(&self, id: NodeId, f: impl FnOnce(&Viewport) -> R) -> Option<R> {
        self.tree
            .with_node(id, |node| node.as_viewport().map(f))
            .flatten()
    }

    pub fn with_node_as<T: Node + 'static, R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        self.tree
            .with_node(id, |node| node.as_any().downcast_ref::<T>().map(f))
            .flatten()
    }

    // ---- Structure ----

    /// Append `node` as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeId, node: impl Node + 'static) -> Result<NodeId> {
        if self.tree.is_deleted(parent) {
            return Err(Error::UnknownNode(parent));
        }
        let id = self.tree.insert_child(parent, Box::new(node));
        self.notify_changed(id, ChangeKind::Structure);
        Ok(id)
    }

    /// Move an existing node (e.g. one handed back by
    /// [`Scene::close_popup`]) under `parent`.
    pub fn attach(&mut self, node: NodeId, parent: NodeId) -> Result<()> {
        for id in [node, parent] {
            if self.tree.is_deleted(id) {
                return Err(Error::UnknownNode(id));
            }
        }
        if self.tree.is_in_subtree(parent, node) {
            return Err(Error::Cycle { node, parent });
        }
        let old_owner = self.tree.owning_viewport(node);
        if !self.tree.set_parent(node, parent) {
            return Err(Error::UnknownNode(node));
        }
        if let Some(owner) = old_owner {
            self.request_full(owner);
        }
        self.notify_changed(node, ChangeKind::Structure);
        Ok(())
    }

    /// Delete a node and its subtree. Popups are closed instead, keeping the
    /// usual popup destruction policy.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if !self.tree.contains(id) {
            return Err(Error::UnknownNode(id));
        }
        if self.window.popups().contains(&id) {
            self.close_popup(id)?;
            return Ok(());
        }
        let owner = self.tree.owning_viewport(id);
        self.tree.mark_deleted(id);
        self.tree.remove(id);
        if self.overlay == Some(id) {
            self.overlay = None;
            self.window.request_full_update();
        }
        if let Some(owner) = owner {
            self.request_full(owner);
        }
        Ok(())
    }

    // ---- Signals ----

    /// Route a change signal from `id` to its viewport's render request.
    pub fn notify_changed(&mut self, id: NodeId, kind: ChangeKind) -> Route {
        let route = self.notifier.route(&self.tree, ChangeSignal { node: id, kind });
        if route == Route::Dropped {
            render_stats::record_signal_dropped();
        }
        if let Some(viewport) = route.viewport() {
            self.tree.mark_dirty(id, kind);
            self.tree.with_node_mut(viewport, |node, _| {
                if let Some(vp) = node.as_viewport_mut() {
                    route.apply_to(vp.request_mut());
                }
            });
        }
        route
    }

    /// Mutate a node inside an update bracket, then signal `kind`.
    pub fn update(
        &mut self,
        id: NodeId,
        kind: ChangeKind,
        f: impl FnOnce(&mut dyn Node),
    ) -> Result<Route> {
        if self.tree.is_deleted(id) {
            return Err(Error::UnknownNode(id));
        }
        let started = self.tree.update_start(id);
        self.tree.with_node_mut(id, |node, _| f(node));
        self.tree.update_end(id, started);
        Ok(self.notify_changed(id, kind))
    }

    /// [`Scene::update`] for a node of known type.
    pub fn update_as<T: Node + 'static>(
        &mut self,
        id: NodeId,
        kind: ChangeKind,
        f: impl FnOnce(&mut T),
    ) -> Result<Route> {
        let is_type = self
            .tree
            .with_node(id, |node| node.as_any().is::<T>())
            .ok_or(Error::UnknownNode(id))?;
        if !is_type {
            return Err(Error::NodeType {
                id,
                expected: std::any::type_name::<T>(),
            });
        }
        self.update(id, kind, |node| {
            if let Some(node) = node.as_any_mut().downcast_mut::<T>() {
                f(node);
            }
        })
    }

    fn request_full(&mut self, viewport: NodeId) {
        self.tree.with_node_mut(viewport, |node, _| {
            if let Some(vp) = node.as_viewport_mut() {
                vp.request_mut().request_full();
            }
        });
    }

    // ---- Rendering ----

    /// Viewports in processing order: the main tree pre-order (so parents
    /// come before nested viewports), then popups oldest first, then the
    /// overlay.
    fn viewport_order(&self) -> Vec<NodeId> {
        let is_viewport = |id: &NodeId| self.tree.has_flag(*id, NodeFlags::VIEWPORT);
        let mut order: Vec<NodeId> = self
            .tree
            .subtree(self.root)
            .into_iter()
            .filter(is_viewport)
            .collect();
        for &popup in self.window.popups() {
            order.extend(self.tree.subtree(popup).into_iter().filter(is_viewport));
        }
        order.extend(self.overlay);
        order
    }

    /// Process every pending render request. Returns true if anything was
    /// rendered or uploaded.
    pub fn tick(&mut self) -> bool {
        if !self.window.is_visible() {
            log::trace!("window not visible, deferring tick");
            return false;
        }
        let mut did_work = false;
        for viewport in self.viewport_order() {
            did_work |= self.process_viewport(viewport);
        }
        // Uploads overwrite the window, so the overlay has to be blended
        // again on top.
        let full_update = self.window.take_full_update_request();
        if full_update || (did_work && self.overlay.is_some()) {
            self.upload_all_viewports();
            did_work = true;
        }
        render_stats::end_tick(did_work);
        did_work
    }

    fn process_viewport(&mut self, id: NodeId) -> bool {
        let Some(request) = self.with_viewport(id, |vp| vp.request().clone()) else {
            return false;
        };
        let is_overlay = self.overlay == Some(id);
        let parent = self.tree.owning_viewport(id);

        match request {
            RenderRequest::Clean => false,
            RenderRequest::Full if is_overlay => {
                let Scene { tree, window, .. } = self;
                tree.with_node_mut(id, |node, tree| {
                    if let Some(vp) = node.as_viewport_mut() {
                        vp.render_overlays(tree, id, window);
                    }
                });
                true
            }
            RenderRequest::Full => match parent {
                // Laid out again by its parent, then painted as part of the
                // enclosing top-level buffer.
                Some(parent) => {
                    let Scene { tree, window, .. } = self;
                    let region = tree
                        .with_node_mut(parent, |node, tree| {
                            node.as_viewport_mut()
                                .and_then(|vp| vp.relayout_node(tree, parent, id, &*window))
                        })
                        .flatten();
                    match region {
                        Some(region) => self.repaint_top_level(parent, region),
                        None => false,
                    }
                }
                None => {
                    let Scene { tree, window, .. } = self;
                    tree.with_node_mut(id, |node, tree| {
                        if let Some(vp) = node.as_viewport_mut() {
                            vp.full_render(tree, id, None, window);
                        }
                    });
                    if let Some(bbox) = self.tree.bboxes(id) {
                        self.restore_popups_above(id, bbox.window);
                    }
                    true
                }
            },
            RenderRequest::Partial(_) => {
                let Scene { tree, window, .. } = self;
                let regions = tree
                    .with_node_mut(id, |node, tree| {
                        let Some(vp) = node.as_viewport_mut() else {
                            return Vec::new();
                        };
                        let RenderRequest::Partial(targets) = vp.take_request() else {
                            return Vec::new();
                        };
                        targets
                            .into_iter()
                            .filter_map(|target| {
                                if target.restyle {
                                    vp.relayout_anchor(tree, id, target.node, &*window)
                                } else {
                                    vp.restyle_node(tree, id, target.node, &*window)
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let mut rendered = false;
                for region in regions {
                    rendered |= self.repaint_top_level(id, region);
                }
                rendered
            }
        }
    }

    /// The main viewport, popup or overlay whose buffer ends up holding
    /// `viewport`'s pixels.
    fn top_level_viewport(&self, viewport: NodeId) -> NodeId {
        let mut top = viewport;
        while let Some(parent) = self.tree.owning_viewport(top) {
            top = parent;
        }
        top
    }

    /// Repaint `region` (window coordinates) of the top-level buffer
    /// containing `viewport`. Nested viewports inside the region are
    /// rendered and composited again on the way.
    fn repaint_top_level(&mut self, viewport: NodeId, region: PixelRect) -> bool {
        let top = self.top_level_viewport(viewport);
        let Scene { tree, window, .. } = self;
        let painted = tree
            .with_node_mut(top, |node, tree| {
                node.as_viewport_mut()
                    .map(|vp| vp.repaint_region(tree, top, region, window))
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        if painted {
            self.restore_popups_above(top, region);
        }
        painted
    }

    /// An upload from `top` into `region` may have covered popups stacked
    /// above it; if so every buffer is uploaded again in stacking order at
    /// the end of the tick.
    fn restore_popups_above(&mut self, top: NodeId, region: PixelRect) {
        let popups = self.window.popups();
        let above: &[NodeId] = if top == self.root {
            popups
        } else {
            match popups.iter().position(|&p| p == top) {
                Some(index) => &popups[index + 1..],
                None => &[],
            }
        };
        let covered = above.iter().any(|&popup| {
            self.tree
                .bboxes(popup)
                .is_some_and(|bbox| !bbox.window.intersect(&region).is_empty())
        });
        if covered {
            log::trace!("repaint of {:?} overlaps a popup, uploading all", top);
            self.window.request_full_update();
        }
    }

    /// Schedule a full re-render of every top-level viewport.
    pub fn full_rerender(&mut self) {
        let mut targets = vec![self.root];
        targets.extend_from_slice(self.window.popups());
        targets.extend(self.overlay);
        for viewport in targets {
            self.request_full(viewport);
        }
    }

    /// Clear the window and upload every top-level buffer as it is: the main
    /// viewport, popups in stacking order, then the overlay blended on top.
    pub fn upload_all_viewports(&mut self) {
        let Scene {
            tree,
            window,
            root,
            overlay,
            ..
        } = self;
        window.clear();
        let mut stack = vec![*root];
        stack.extend_from_slice(window.popups());
        for viewport in stack {
            tree.with_node(viewport, |node| {
                let Some(vp) = node.as_viewport() else {
                    return;
                };
                if let Some(painter) = vp.painter() {
                    window.upload_buffer_region(
                        painter.pixmap(),
                        painter.pixel_bounds(),
                        vp.position(),
                    );
                }
            });
        }
        if let Some(overlay) = *overlay {
            tree.with_node(overlay, |node| {
                if let Some(painter) = node.as_viewport().and_then(|vp| vp.painter()) {
                    window.blend_buffer_region(
                        painter.pixmap(),
                        painter.pixel_bounds(),
                        PixelPoint::ZERO,
                    );
                }
            });
        }
    }

    /// Resize the window and the main viewport. Returns false when the size
    /// did not change.
    pub fn resize_window(&mut self, size: PixelSize) -> Result<bool> {
        if !self.window.resized(size)? {
            return Ok(false);
        }
        let root = self.root;
        self.tree.with_node_mut(root, |node, _| {
            if let Some(vp) = node.as_viewport_mut() {
                vp.resize(size);
            }
        });
        if let Some(overlay) = self.overlay {
            self.request_full(overlay);
        }
        Ok(true)
    }

    // ---- Popups ----

    /// Insert a popup viewport. It is not shown until [`Scene::push_popup`].
    pub fn create_popup(&mut self, viewport: Viewport) -> NodeId {
        self.tree
            .insert(Box::new(viewport.with_flags(ViewportFlags::POPUP)))
    }

    /// Show a popup on top of the window and render it right away.
    pub fn push_popup(&mut self, popup: NodeId) -> Result<()> {
        let is_popup = self
            .with_viewport(popup, |vp| vp.is_popup())
            .ok_or(Error::NotAViewport(popup))?;
        if !is_popup || self.tree.parent(popup).is_some() {
            return Err(Error::NotAViewport(popup));
        }
        let Scene { tree, window, .. } = self;
        window.push_popup(popup);
        tree.with_node_mut(popup, |node, tree| {
            if let Some(vp) = node.as_viewport_mut() {
                vp.full_render(tree, popup, None, window);
            }
        });
        Ok(())
    }

    /// Close and destroy a popup.
    ///
    /// Unless the popup is flagged [`ViewportFlags::POPUP_DESTROY_ALL`], the
    /// children of its single layout child are detached first and returned:
    /// they belong to the caller, who may attach them elsewhere.
    pub fn close_popup(&mut self, popup: NodeId) -> Result<Vec<NodeId>> {
        let flags = self
            .with_viewport(popup, |vp| vp.flags())
            .ok_or(Error::NotAViewport(popup))?;
        self.window.pop_popup(popup);

        let mut kept = Vec::new();
        if !flags.contains(ViewportFlags::POPUP_DESTROY_ALL) {
            if let [layout] = self.tree.children(popup).as_slice() {
                let is_layout = self
                    .tree
                    .with_node(*layout, |n| n.is_layout())
                    .unwrap_or(false);
                if is_layout {
                    kept = self.tree.children(*layout);
                    for &child in &kept {
                        self.tree.detach(child);
                    }
                }
            }
        }
        log::debug!(
            "closing popup {:?}, keeping {} content node(s)",
            popup,
            kept.len()
        );
        self.tree.mark_deleted(popup);
        self.tree.remove(popup);

        // Whatever the popup covered must be uploaded again.
        self.window.request_full_update();
        Ok(kept)
    }

    // ---- Overlay ----

    /// Add `node` to the overlay viewport, creating it on first use.
    pub fn add_overlay(&mut self, node: impl Node + 'static) -> Result<NodeId> {
        let overlay = match self.overlay {
            Some(id) if self.tree.contains(id) => id,
            _ => {
                let viewport = Viewport::new("overlay", self.window.size())
                    .with_flags(ViewportFlags::OVERLAY);
                let id = self.tree.insert(Box::new(viewport));
                self.overlay = Some(id);
                id
            }
        };
        self.add_node(overlay, node)
    }

    // ---- Output ----

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.window.save_png(path)
    }
}
