//! Viewports: scene-graph nodes that own a pixel buffer.
//!
//! A viewport renders its subtree into its own [`Painter`] and then makes the
//! result visible in one of three ways:
//!
//! - a **nested** viewport composites the visible part of its buffer into its
//!   parent viewport's buffer;
//! - a **popup** uploads its buffer straight to the window at its position;
//! - a **top-level** viewport uploads its whole buffer to the window.
//!
//! Rendering is split into passes, all driven from here:
//!
//! 1. **Style** resolves every node's style against its parent's.
//! 2. **Layout** computes raw, local (clipped) and window bounding boxes,
//!    cached in the [`Tree`]. Nodes whose local box is empty are flagged
//!    invisible and skipped when painting.
//! 3. **Paint** walks the subtree in child order, each node inside its own
//!    paint level so transforms and styles never leak to siblings.
//!
//! A full re-render runs all three. Partial re-renders repaint one subtree
//! in place (re-applying the transforms of its ancestors) and upload just
//! that subtree's box; anchors additionally re-run style and layout on the
//! subtree first.
//!
//! Viewport operations take the tree and the viewport's own id explicitly:
//! the viewport is extracted from the tree (see [`Tree::with_node_mut`]) while
//! it renders, so it reaches its children through the tree it is handed.

use std::io::{BufRead, Seek, Write};
use std::path::Path;

use bitflags::bitflags;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use resvg::tiny_skia::{ColorU8, Pixmap};

use crate::error::{Error, Result};
use crate::geometry::{Color, PixelPoint, PixelRect, PixelSize};
use crate::node::Node;
use crate::painter::Painter;
use crate::render_stats;
use crate::signal::RenderRequest;
use crate::style::{PaintStyle, StyleProps};
use crate::transform::Transform;
use crate::tree::{BBoxes, NodeFlags, NodeId, Tree};
use crate::window::{Compositor, WindowId};

/// Buffer size used when a viewport is rendered before it was given a size.
pub const FALLBACK_SIZE: PixelSize = PixelSize::new(64, 64);

bitflags! {
    /// Viewport type and state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ViewportFlags: u16 {
        /// Uploaded directly to the window rather than composited.
        const POPUP = 1 << 0;
        const MENU = 1 << 1;
        const TOOLTIP = 1 << 2;
        const COMPLETER = 1 << 3;
        /// Closing the popup destroys everything, including the content of
        /// its layout child.
        const POPUP_DESTROY_ALL = 1 << 4;
        /// Rendered last, over everything else, and never composited.
        const OVERLAY = 1 << 5;
        /// Hosts SVG content.
        const SVG = 1 << 6;
        /// Set for the duration of a full re-render.
        const DOING_FULL_RENDER = 1 << 7;
    }
}

/// Per-viewport render counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderCounts {
    pub full_renders: u64,
    /// Partial re-renders, including those started from an anchor.
    pub partial_renders: u64,
    pub anchor_renders: u64,
    pub composites: u64,
    pub uploads: u64,
    pub reallocations: u64,
    /// Renders skipped because the viewport was empty or off-window.
    pub skipped: u64,
}

/// Where [`Viewport::push_bounds`] put its bounds, so the matching
/// [`Viewport::pop_bounds`] pops the same painter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsPush {
    /// Nothing pushed: the viewport is not visible and must not render.
    Skipped,
    Own,
    Parent,
}

pub struct Viewport {
    name: String,
    pos: PixelPoint,
    size: PixelSize,
    painter: Option<Painter>,
    flags: ViewportFlags,
    /// Cleared to before each render when set.
    background: Option<Color>,
    props: StyleProps,
    style: PaintStyle,
    window: Option<WindowId>,
    /// Window position of this viewport's buffer origin.
    window_origin: PixelPoint,
    /// Window position of the parent buffer's origin, for nested viewports.
    parent_origin: PixelPoint,
    request: RenderRequest,
    counts: RenderCounts,
}

impl Viewport {
    /// Create a viewport with a buffer of `size`. A zero size defers
    /// allocation to the first render.
    pub fn new(name: impl Into<String>, size: PixelSize) -> Self {
        let name = name.into();
        let painter = if size.is_empty() {
            None
        } else {
            match Painter::new(size) {
                Ok(painter) => Some(painter),
                Err(err) => {
                    log::error!("viewport '{}': {}", name, err);
                    None
                }
            }
        };
        Self {
            name,
            pos: PixelPoint::ZERO,
            size,
            painter,
            flags: ViewportFlags::empty(),
            background: None,
            props: StyleProps::new(),
            style: PaintStyle::BASE,
            window: None,
            window_origin: PixelPoint::ZERO,
            parent_origin: PixelPoint::ZERO,
            request: RenderRequest::Full,
            counts: RenderCounts::default(),
        }
    }

    /// Wrap an existing image; the image becomes the initial buffer content.
    pub fn from_image(name: impl Into<String>, image: &RgbaImage) -> Result<Self> {
        let pixmap = rgba_to_pixmap(image)?;
        let size = PixelSize::new(image.width(), image.height());
        let mut viewport = Self::new(name, PixelSize::default());
        viewport.size = size;
        viewport.painter = Some(Painter::from_pixmap(pixmap));
        Ok(viewport)
    }

    pub fn with_position(mut self, pos: PixelPoint) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_flags(mut self, flags: ViewportFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Style overrides inherited by the viewport's children.
    pub fn with_style(mut self, props: StyleProps) -> Self {
        self.props = props;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> PixelPoint {
        self.pos
    }

    pub fn set_position(&mut self, pos: PixelPoint) {
        if pos != self.pos {
            self.pos = pos;
            self.request.request_full();
        }
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, background: Option<Color>) {
        self.background = background;
    }

    pub fn flags(&self) -> ViewportFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ViewportFlags, on: bool) {
        self.flags.set(flags, on);
    }

    pub fn is_popup(&self) -> bool {
        self.flags.contains(ViewportFlags::POPUP)
    }

    pub fn is_overlay(&self) -> bool {
        self.flags.contains(ViewportFlags::OVERLAY)
    }

    pub fn is_doing_full_render(&self) -> bool {
        self.flags.contains(ViewportFlags::DOING_FULL_RENDER)
    }

    pub fn painter(&self) -> Option<&Painter> {
        self.painter.as_ref()
    }

    pub fn painter_mut(&mut self) -> Option<&mut Painter> {
        self.painter.as_mut()
    }

    /// Window this viewport last rendered for.
    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    pub fn window_origin(&self) -> PixelPoint {
        self.window_origin
    }

    /// Region children are clipped to: the whole buffer.
    pub fn children_bbox(&self) -> PixelRect {
        self.painter
            .as_ref()
            .map(|p| p.pixel_bounds())
            .unwrap_or(PixelRect::EMPTY)
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RenderRequest {
        &mut self.request
    }

    pub fn take_request(&mut self) -> RenderRequest {
        self.request.take()
    }

    pub fn counts(&self) -> RenderCounts {
        self.counts
    }

    /// Reallocate the buffer for `size`.
    ///
    /// Same size: nothing happens. Zero size: ignored. Otherwise the old
    /// buffer is released before the new one is allocated; if allocation
    /// fails the viewport is left without a buffer and renders nothing until
    /// a later resize succeeds. Any reallocation schedules a full re-render.
    pub fn resize(&mut self, size: PixelSize) {
        if size.is_empty() {
            log::debug!(
                "viewport '{}': ignoring resize to {}x{}",
                self.name,
                size.width,
                size.height
            );
            return;
        }
        if self.painter.as_ref().map(|p| p.size()) == Some(size) {
            self.size = size;
            return;
        }
        self.size = size;
        self.painter = None;
        match Painter::new(size) {
            Ok(painter) => self.painter = Some(painter),
            Err(err) => log::error!("viewport '{}': {}", self.name, err),
        }
        self.counts.reallocations += 1;
        self.request.request_full();
    }

    fn ensure_buffer(&mut self) {
        if self.size.is_empty() {
            log::debug!(
                "viewport '{}' has no size, using {}x{}",
                self.name,
                FALLBACK_SIZE.width,
                FALLBACK_SIZE.height
            );
            self.size = FALLBACK_SIZE;
        }
        self.resize(self.size);
    }

    /// Box of the viewport in its parent's buffer.
    fn view_box(&self, parent: &Painter) -> PixelRect {
        let (x, y) = parent
            .transform()
            .transform_point(self.pos.x as f32, self.pos.y as f32);
        PixelRect::from_origin_size(PixelPoint::new(x.round() as i32, y.round() as i32), self.size)
    }

    // ---- Layout ----

    fn layout_root(&mut self, tree: &mut Tree, id: NodeId) {
        self.ensure_buffer();
        let view = PixelRect::from_origin_size(self.pos, self.size);
        let own = PixelRect::from_size(self.size);
        self.window_origin = self.pos;
        tree.set_bboxes(
            id,
            BBoxes {
                raw: view,
                local: own,
                window: view,
                clip: own,
            },
        );
        self.layout_contents(tree, id);
    }

    fn layout_nested(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        parent: &Painter,
        frame: LayoutFrame,
    ) -> PixelRect {
        self.ensure_buffer();
        let view = self.view_box(parent);
        store_bboxes(tree, id, view, frame);
        self.parent_origin = frame.origin;
        self.window_origin = frame.origin + view.min;
        self.layout_contents(tree, id);
        // Laid out as part of an enclosing pass, which styles and paints it
        // as well.
        self.request = RenderRequest::Clean;
        view
    }

    fn layout_contents(&mut self, tree: &mut Tree, id: NodeId) {
        let Some(painter) = self.painter.as_mut() else {
            return;
        };
        let frame = LayoutFrame {
            clip: painter.pixel_bounds(),
            origin: self.window_origin,
        };
        layout_children(tree, id, painter, frame);
    }

    // ---- Render ----

    /// Render into the buffer and composite or upload the result.
    ///
    /// Runs a full re-render instead when one is pending, and does nothing
    /// while this viewport is already inside a full re-render.
    pub fn render_viewport(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        parent: Option<&mut Painter>,
        window: &mut dyn Compositor,
    ) {
        self.window = Some(window.id());
        if tree.is_updating(id) {
            log::trace!("viewport '{}' is already rendering", self.name);
            return;
        }
        if self.request.is_full() {
            self.full_render(tree, id, parent, window);
            return;
        }
        self.render_pass(tree, id, parent, window);
    }

    fn render_pass(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        mut parent: Option<&mut Painter>,
        window: &mut dyn Compositor,
    ) {
        // Whatever was pending is covered by repainting everything.
        self.request = RenderRequest::Clean;
        let Some(bbox) = tree.bboxes(id) else {
            return;
        };
        let parent_window = tree
            .owning_viewport(id)
            .and_then(|p| tree.bboxes(p))
            .map(|b| b.window);

        let pushed = self.push_bounds(parent.as_deref_mut(), &bbox, parent_window);
        if pushed == BoundsPush::Skipped {
            log::trace!("viewport '{}' not visible, skipping render", self.name);
            self.counts.skipped += 1;
            render_stats::record_viewport_skipped();
            return;
        }

        if let Some(painter) = self.painter.as_mut() {
            if let Some(background) = self.background {
                painter.fill_box(painter.pixel_bounds(), background);
            }
            render_children(tree, id, painter, window);
        }
        self.composite_or_upload(bbox.raw, parent.as_deref_mut(), window);
        self.pop_bounds(parent, pushed);
    }

    /// Restrict drawing before rendering.
    ///
    /// Overlays always render and clip the parent painter (or their own when
    /// top-level) to its whole buffer. Other viewports render only when they
    /// have a buffer, a non-empty local box, and a window box overlapping the
    /// parent viewport's window box; they then clip their own painter.
    pub fn push_bounds(
        &mut self,
        parent: Option<&mut Painter>,
        bbox: &BBoxes,
        parent_window: Option<PixelRect>,
    ) -> BoundsPush {
        if self.is_overlay() {
            if let Some(parent) = parent {
                let all = parent.pixel_bounds();
                parent.push_bounds(all);
                return BoundsPush::Parent;
            }
            return match self.painter.as_mut() {
                Some(painter) => {
                    let all = painter.pixel_bounds();
                    painter.push_bounds(all);
                    BoundsPush::Own
                }
                None => BoundsPush::Skipped,
            };
        }

        let Some(painter) = self.painter.as_mut() else {
            return BoundsPush::Skipped;
        };
        if bbox.local.is_empty() {
            return BoundsPush::Skipped;
        }
        if let Some(parent_window) = parent_window {
            if bbox.window.intersect(&parent_window).is_empty() {
                return BoundsPush::Skipped;
            }
        }
        let all = painter.pixel_bounds();
        painter.push_bounds(all);
        BoundsPush::Own
    }

    pub fn pop_bounds(&mut self, parent: Option<&mut Painter>, pushed: BoundsPush) {
        match pushed {
            BoundsPush::Skipped => {}
            BoundsPush::Own => {
                if let Some(painter) = self.painter.as_mut() {
                    painter.pop_bounds();
                }
            }
            BoundsPush::Parent => {
                if let Some(parent) = parent {
                    parent.pop_bounds();
                }
            }
        }
    }

    /// Make the buffer visible: upload popups and top-level viewports to the
    /// window, composite nested ones into `parent`. Overlays are uploaded by
    /// the scene after everything else.
    pub fn composite_or_upload(
        &mut self,
        view_box: PixelRect,
        parent: Option<&mut Painter>,
        window: &mut dyn Compositor,
    ) {
        let Some(painter) = self.painter.as_ref() else {
            return;
        };
        if self.is_overlay() {
            return;
        }
        match parent {
            Some(parent) if !self.is_popup() => {
                let Some((src, dest)) = composite_region(view_box, parent.pixel_bounds()) else {
                    return;
                };
                parent.draw_pixmap_region(painter.pixmap(), src, dest.min);
                self.counts.composites += 1;
                render_stats::record_composite();
            }
            _ => {
                window.upload_buffer_region(
                    painter.pixmap(),
                    painter.pixel_bounds(),
                    self.window_origin,
                );
                self.counts.uploads += 1;
            }
        }
    }

    /// Re-style, re-layout and re-render everything, then composite or upload.
    pub fn full_render(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        mut parent: Option<&mut Painter>,
        window: &mut dyn Compositor,
    ) {
        if tree.is_updating(id) {
            log::debug!("viewport '{}': full render already running", self.name);
            return;
        }
        let started = tree.update_start(id);
        if !started {
            return;
        }
        self.flags.insert(ViewportFlags::DOING_FULL_RENDER);
        self.request = RenderRequest::Clean;
        self.window = Some(window.id());
        self.counts.full_renders += 1;
        render_stats::record_full_render();
        log::debug!("full render of viewport '{}'", self.name);

        style_children(tree, id, &self.style);
        match parent.as_deref() {
            Some(parent) if tree.owning_viewport(id).is_some() => {
                let clip = tree
                    .bboxes(id)
                    .map(|b| b.clip)
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| parent.pixel_bounds());
                let frame = LayoutFrame {
                    clip,
                    origin: self.parent_origin,
                };
                self.layout_nested(tree, id, parent, frame);
            }
            _ => self.layout_root(tree, id),
        }

        self.render_pass(tree, id, parent.as_deref_mut(), window);

        self.flags.remove(ViewportFlags::DOING_FULL_RENDER);
        tree.update_end(id, started);
        for node in tree.subtree(id) {
            tree.clear_dirty(node);
        }
    }

    /// Restyle one node owned by this viewport and repaint its box.
    ///
    /// Layout is not re-run: the node keeps the box the last layout gave it.
    /// Returns false when nothing was rendered.
    pub fn rerender_node(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        node: NodeId,
        window: &mut dyn Compositor,
    ) -> bool {
        match self.restyle_node(tree, id, node, window) {
            Some(region) => self.repaint_region(tree, id, region, window),
            None => false,
        }
    }

    /// Restyle and relayout an anchor's subtree, then repaint the area it
    /// covered before and after.
    pub fn rerender_anchor(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        anchor: NodeId,
        window: &mut dyn Compositor,
    ) -> bool {
        match self.relayout_anchor(tree, id, anchor, window) {
            Some(region) => self.repaint_region(tree, id, region, window),
            None => false,
        }
    }

    /// Re-resolve the style of `node`'s subtree. Returns the window region
    /// that has to be repainted.
    pub fn restyle_node(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        node: NodeId,
        window: &dyn Compositor,
    ) -> Option<PixelRect> {
        if !self.can_rerender(tree, id, node, window) {
            return None;
        }
        let parent_style = self.parent_style(tree, id, node);
        style_node(tree, node, &parent_style);
        tree.clear_dirty(node);
        tree.bboxes(node).map(|b| b.window)
    }

    /// Restyle and relayout `node`'s subtree in place. Returns the union of
    /// its window boxes before and after.
    pub fn relayout_node(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        node: NodeId,
        window: &dyn Compositor,
    ) -> Option<PixelRect> {
        let before = self.restyle_node(tree, id, node, window)?;
        let chain = paint_chain(tree, id, node);
        let painter = self.painter.as_mut()?;
        let clip = tree
            .bboxes(node)
            .map(|b| b.clip)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| painter.pixel_bounds());
        let frame = LayoutFrame {
            clip,
            origin: self.window_origin,
        };
        with_paint_chain(painter, &chain, |painter| {
            layout_node(tree, node, painter, frame)
        });
        let after = tree.bboxes(node).map(|b| b.window).unwrap_or(PixelRect::EMPTY);
        Some(before.union(&after))
    }

    /// [`Viewport::relayout_node`] for a re-render anchor.
    pub fn relayout_anchor(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        anchor: NodeId,
        window: &dyn Compositor,
    ) -> Option<PixelRect> {
        let region = self.relayout_node(tree, id, anchor, window)?;
        self.counts.anchor_renders += 1;
        render_stats::record_anchor_render();
        Some(region)
    }

    fn can_rerender(
        &self,
        tree: &Tree,
        id: NodeId,
        node: NodeId,
        window: &dyn Compositor,
    ) -> bool {
        if !window.is_visible() {
            log::trace!("window not visible, skipping re-render of {:?}", node);
            return false;
        }
        if tree.is_deleted(node) {
            return false;
        }
        if tree.owning_viewport(node) != Some(id) {
            log::warn!(
                "viewport '{}': {:?} is not one of its nodes",
                self.name,
                node
            );
            return false;
        }
        true
    }

    fn parent_style(&self, tree: &Tree, id: NodeId, node: NodeId) -> PaintStyle {
        match tree.parent(node) {
            Some(parent) if parent != id => tree
                .with_node(parent, |n| *n.style())
                .unwrap_or(PaintStyle::BASE),
            _ => self.style,
        }
    }

    /// Repaint everything inside `region` (window coordinates) and upload it.
    ///
    /// The region is cleared to the background and all children are painted
    /// again in order, clipped to it, so overlapping siblings keep their
    /// stacking and nested viewports are composited again. Only top-level
    /// buffers are uploaded, and overlays are left for the scene to blend.
    pub fn repaint_region(
        &mut self,
        tree: &mut Tree,
        id: NodeId,
        region: PixelRect,
        window: &mut dyn Compositor,
    ) -> bool {
        // Nested buffers reach the window through their parent.
        let uploads = !self.is_overlay() && tree.owning_viewport(id).is_none();
        let background = self.background.unwrap_or(Color::TRANSPARENT);
        let origin = self.window_origin;
        let Some(painter) = self.painter.as_mut() else {
            return false;
        };
        let local = region
            .translate(PixelPoint::ZERO - origin)
            .intersect(&painter.pixel_bounds());
        if local.is_empty() {
            return false;
        }

        painter.with_bounds(local, |painter| {
            painter.fill_box(local, background);
            render_children(tree, id, painter, window);
        });
        if uploads {
            window.upload_buffer_region(painter.pixmap(), local, local.min + origin);
            self.counts.uploads += 1;
        }
        self.counts.partial_renders += 1;
        render_stats::record_partial_render();
        true
    }

    /// Render an overlay viewport over the full window size.
    ///
    /// The buffer is cleared to transparent first; the caller blends it over
    /// the window once everything else has been uploaded.
    pub fn render_overlays(&mut self, tree: &mut Tree, id: NodeId, window: &mut dyn Compositor) {
        self.pos = PixelPoint::ZERO;
        self.size = window.size();
        self.request = RenderRequest::Clean;
        self.window = Some(window.id());
        style_children(tree, id, &self.style);
        self.layout_root(tree, id);
        let Some(painter) = self.painter.as_mut() else {
            return;
        };
        painter.clear(Color::TRANSPARENT);
        render_children(tree, id, painter, window);
        self.counts.full_renders += 1;
    }

    // ---- PNG ----

    /// Buffer content as straight-alpha RGBA.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let painter = self.painter.as_ref().ok_or(Error::Allocation {
            width: self.size.width,
            height: self.size.height,
        })?;
        Ok(pixmap_to_rgba(painter.pixmap()))
    }

    pub fn encode_png<W: Write>(&self, writer: W) -> Result<()> {
        let image = self.to_rgba_image()?;
        PngEncoder::new(writer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba_image()?
            .save_with_format(path.as_ref(), ImageFormat::Png)?;
        Ok(())
    }
}

/// Decode a PNG stream to straight-alpha RGBA.
pub fn decode_png<R: BufRead + Seek>(reader: R) -> Result<RgbaImage> {
    Ok(image::load(reader, ImageFormat::Png)?.to_rgba8())
}

/// Load a PNG file. A missing file is reported as [`Error::MissingAsset`].
pub fn load_png(path: impl AsRef<Path>) -> Result<RgbaImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingAsset(format!(
            "PNG file not found: {}",
            path.display()
        )));
    }
    Ok(image::open(path)?.to_rgba8())
}

pub(crate) fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    RgbaImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        let c = pixmap
            .pixel(x, y)
            .map(|p| p.demultiply())
            .unwrap_or_else(|| ColorU8::from_rgba(0, 0, 0, 0));
        Rgba([c.red(), c.green(), c.blue(), c.alpha()])
    })
}

fn rgba_to_pixmap(image: &RgbaImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or(Error::Allocation {
        width: image.width(),
        height: image.height(),
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

/// Source and destination rectangles for compositing a child buffer whose
/// box in the parent is `view_box`, clipped to the parent's `clip`.
///
/// Returns `(src, dest)` with `src` in child-buffer coordinates and `dest`
/// in parent-buffer coordinates, or `None` when nothing is visible.
pub fn composite_region(view_box: PixelRect, clip: PixelRect) -> Option<(PixelRect, PixelRect)> {
    let dest = view_box.intersect(&clip);
    if dest.is_empty() {
        return None;
    }
    let src = PixelRect::from_origin_size(dest.min - view_box.min, dest.size());
    Some((src, dest))
}

impl Node for Viewport {
    fn kind(&self) -> &'static str {
        "viewport"
    }

    fn style(&self) -> &PaintStyle {
        &self.style
    }

    fn apply_style(&mut self, parent: &PaintStyle) {
        self.style = self.props.resolve(parent);
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        self.view_box(painter)
    }

    /// Viewports are painted by the pass that owns them.
    fn render(&self, _painter: &mut Painter) -> Result<()> {
        Ok(())
    }

    fn has_own_buffer(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn as_viewport(&self) -> Option<&Viewport> {
        Some(self)
    }

    fn as_viewport_mut(&mut self) -> Option<&mut Viewport> {
        Some(self)
    }
}

// ---- Tree walks ----

/// Clip region and window offset for the nodes of one layout level.
#[derive(Clone, Copy, Debug)]
struct LayoutFrame {
    clip: PixelRect,
    /// Window position of the owning buffer's origin.
    origin: PixelPoint,
}

fn store_bboxes(tree: &mut Tree, id: NodeId, raw: PixelRect, frame: LayoutFrame) -> BBoxes {
    let local = raw.intersect(&frame.clip);
    let bbox = BBoxes {
        raw,
        local,
        window: local.translate(frame.origin),
        clip: frame.clip,
    };
    tree.set_bboxes(id, bbox);
    bbox
}

fn style_children(tree: &mut Tree, parent: NodeId, style: &PaintStyle) {
    for child in tree.children(parent) {
        style_node(tree, child, style);
    }
}

fn style_node(tree: &mut Tree, id: NodeId, parent_style: &PaintStyle) {
    if tree.is_deleted(id) {
        return;
    }
    tree.with_node_mut(id, |node, tree| {
        node.apply_style(parent_style);
        let style = *node.style();
        style_children(tree, id, &style);
    });
}

/// Lay out the children of `parent`; returns the union of their raw boxes.
fn layout_children(
    tree: &mut Tree,
    parent: NodeId,
    painter: &mut Painter,
    frame: LayoutFrame,
) -> PixelRect {
    let mut union = PixelRect::EMPTY;
    for child in tree.children(parent) {
        union = union.union(&layout_node(tree, child, painter, frame));
    }
    union
}

fn layout_node(tree: &mut Tree, id: NodeId, painter: &mut Painter, frame: LayoutFrame) -> PixelRect {
    if tree.is_deleted(id) {
        return PixelRect::EMPTY;
    }
    tree.with_node_mut(id, |node, tree| {
        painter.with_paint(&node.transform(), *node.style(), |painter| {
            if let Some(viewport) = node.as_viewport_mut() {
                return viewport.layout_nested(tree, id, painter, frame);
            }
            let own = node.compute_bbox(painter);
            if node.bbox_includes_children() {
                let raw = own.union(&layout_children(tree, id, painter, frame));
                store_bboxes(tree, id, raw, frame);
                raw
            } else {
                let bbox = store_bboxes(tree, id, own, frame);
                let inner = LayoutFrame {
                    clip: bbox.local,
                    origin: frame.origin,
                };
                layout_children(tree, id, painter, inner);
                own
            }
        })
    })
    .unwrap_or(PixelRect::EMPTY)
}

fn render_children(
    tree: &mut Tree,
    parent: NodeId,
    painter: &mut Painter,
    window: &mut dyn Compositor,
) {
    for child in tree.children(parent) {
        render_node(tree, child, painter, window);
    }
}

fn render_node(tree: &mut Tree, id: NodeId, painter: &mut Painter, window: &mut dyn Compositor) {
    if tree.is_deleted(id) {
        return;
    }
    tree.with_node_mut(id, |node, tree| {
        if let Some(viewport) = node.as_viewport_mut() {
            viewport.render_viewport(tree, id, Some(painter), window);
            return;
        }
        if tree.has_flag(id, NodeFlags::INVISIBLE) {
            return;
        }
        let clips_children = !node.bbox_includes_children();
        painter.with_paint(&node.transform(), *node.style(), |painter| {
            if let Err(err) = node.render(painter) {
                log::warn!("{} {:?} failed to render: {}", node.kind(), id, err);
                painter.clear_path();
            }
            // Children were laid out against this node's box.
            match tree.bboxes(id) {
                Some(bbox) if clips_children => painter.with_bounds(bbox.local, |painter| {
                    render_children(tree, id, painter, window)
                }),
                _ => render_children(tree, id, painter, window),
            }
        });
    });
}

/// Transform and style of each ancestor of `node` below `viewport`,
/// outermost first.
fn paint_chain(tree: &Tree, viewport: NodeId, node: NodeId) -> Vec<(Transform, PaintStyle)> {
    let mut ancestors: Vec<NodeId> = tree
        .ancestors(node)
        .take_while(|&a| a != viewport)
        .collect();
    ancestors.reverse();
    ancestors
        .into_iter()
        .filter_map(|a| tree.with_node(a, |n| (n.transform(), *n.style())))
        .collect()
}

fn with_paint_chain<R>(
    painter: &mut Painter,
    chain: &[(Transform, PaintStyle)],
    f: impl FnOnce(&mut Painter) -> R,
) -> R {
    let depth = painter.paint_depth();
    for (transform, style) in chain {
        painter.push_paint(transform, *style);
    }
    let result = f(painter);
    while painter.paint_depth() > depth {
        painter.pop_paint();
    }
    result
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::geometry::Rect;
    use crate::shapes::{style, Frame, RectShape};
    use crate::style::PaintSource;
    use crate::window::{Window, WindowConfig};

    fn window(width: u32, height: u32) -> Window {
        Window::new(
            WindowConfig::new()
                .size(width, height)
                .background(Color::BLACK),
        )
        .unwrap()
    }

    #[test]
    fn test_composite_region_clips_to_parent() {
        let view = PixelRect::from_origin_size(PixelPoint::new(10, 10), PixelSize::new(50, 50));
        let clip = PixelRect::new(0, 0, 40, 40);
        let (src, dest) = composite_region(view, clip).unwrap();
        assert_eq!(src, PixelRect::new(0, 0, 30, 30));
        assert_eq!(dest, PixelRect::new(10, 10, 40, 40));

        let outside = PixelRect::from_origin_size(PixelPoint::new(50, 50), PixelSize::new(5, 5));
        assert_eq!(composite_region(outside, clip), None);
    }

    #[test]
    fn test_nested_composite_copies_visible_slice() {
        let mut win = window(40, 40);
        let mut parent = Painter::new(PixelSize::new(40, 40)).unwrap();
        let mut child = Viewport::new("child", PixelSize::new(50, 50));
        child.painter_mut().unwrap().clear(Color::RED);

        let view = PixelRect::from_origin_size(PixelPoint::new(10, 10), PixelSize::new(50, 50));
        child.composite_or_upload(view, Some(&mut parent), &mut win);

        let inside = parent.pixmap().pixel(10, 10).unwrap();
        let corner = parent.pixmap().pixel(39, 39).unwrap();
        let before = parent.pixmap().pixel(5, 5).unwrap();
        assert_eq!((inside.red(), inside.alpha()), (255, 255));
        assert_eq!(corner.red(), 255);
        assert_eq!(before.alpha(), 0);
        assert_eq!(child.counts().composites, 1);
        assert_eq!(win.stats().uploads, 0);
    }

    #[test]
    fn test_resize_to_same_size_keeps_buffer() {
        let mut vp = Viewport::new("vp", PixelSize::new(8, 8));
        vp.painter_mut().unwrap().clear(Color::GREEN);
        vp.resize(PixelSize::new(8, 8));
        vp.resize(PixelSize::new(0, 8));

        assert_eq!(vp.counts().reallocations, 0);
        assert_eq!(vp.painter().unwrap().pixmap().pixel(1, 1).unwrap().green(), 255);

        vp.resize(PixelSize::new(16, 4));
        assert_eq!(vp.counts().reallocations, 1);
        assert_eq!(vp.painter().unwrap().size(), PixelSize::new(16, 4));
        assert!(vp.request().is_full());
    }

    #[test]
    fn test_push_pop_bounds_balance() {
        let visible = BBoxes {
            raw: PixelRect::new(0, 0, 8, 8),
            local: PixelRect::new(0, 0, 8, 8),
            window: PixelRect::new(0, 0, 8, 8),
            clip: PixelRect::new(0, 0, 8, 8),
        };
        let invisible = BBoxes {
            local: PixelRect::EMPTY,
            ..visible
        };

        let mut parent = Painter::new(PixelSize::new(8, 8)).unwrap();
        let mut vp = Viewport::new("vp", PixelSize::new(8, 8));
        let own_depth = vp.painter().unwrap().bounds_depth();
        let parent_depth = parent.bounds_depth();

        let pushed = vp.push_bounds(Some(&mut parent), &visible, None);
        assert_eq!(pushed, BoundsPush::Own);
        assert_eq!(vp.painter().unwrap().bounds_depth(), own_depth + 1);
        vp.pop_bounds(Some(&mut parent), pushed);

        let pushed = vp.push_bounds(Some(&mut parent), &invisible, None);
        assert_eq!(pushed, BoundsPush::Skipped);
        vp.pop_bounds(Some(&mut parent), pushed);

        let off_window = vp.push_bounds(Some(&mut parent), &visible, Some(PixelRect::new(20, 20, 30, 30)));
        assert_eq!(off_window, BoundsPush::Skipped);

        let mut overlay = Viewport::new("overlay", PixelSize::new(8, 8))
            .with_flags(ViewportFlags::OVERLAY);
        let pushed = overlay.push_bounds(Some(&mut parent), &invisible, None);
        assert_eq!(pushed, BoundsPush::Parent);
        assert_eq!(parent.bounds_depth(), parent_depth + 1);
        overlay.pop_bounds(Some(&mut parent), pushed);

        assert_eq!(vp.painter().unwrap().bounds_depth(), own_depth);
        assert_eq!(parent.bounds_depth(), parent_depth);
    }

    #[test]
    fn test_full_render_uploads_top_level() {
        let mut tree = Tree::new();
        let vp = tree.insert(Box::new(
            Viewport::new("main", PixelSize::new(10, 10)).with_background(Color::WHITE),
        ));
        let rect = tree.insert_child(
            vp,
            Box::new(
                RectShape::new(Rect::new(2.0, 2.0, 4.0, 4.0))
                    .with_style(style().fill(Color::BLUE)),
            ),
        );
        let mut win = window(10, 10);

        tree.with_node_mut(vp, |node, tree| {
            let viewport = node.as_viewport_mut().unwrap();
            viewport.full_render(tree, vp, None, &mut win);
            assert_eq!(viewport.counts().full_renders, 1);
            assert!(viewport.request().is_clean());
            assert!(!viewport.is_doing_full_render());
        });

        assert!(!tree.is_updating(vp));
        assert_eq!(tree.bboxes(rect).unwrap().local, PixelRect::new(2, 2, 6, 6));
        let blue = win.surface().pixel(3, 3).unwrap();
        let white = win.surface().pixel(8, 8).unwrap();
        assert_eq!((blue.blue(), blue.red()), (255, 0));
        assert_eq!((white.red(), white.green(), white.blue()), (255, 255, 255));
    }

    #[test]
    fn test_rerender_node_repaints_region_in_stacking_order() {
        let mut tree = Tree::new();
        let vp = tree.insert(Box::new(
            Viewport::new("main", PixelSize::new(20, 20)).with_background(Color::WHITE),
        ));
        let under = tree.insert_child(
            vp,
            Box::new(
                RectShape::new(Rect::new(0.0, 0.0, 10.0, 10.0))
                    .with_style(style().fill(Color::RED).no_stroke()),
            ),
        );
        tree.insert_child(
            vp,
            Box::new(
                RectShape::new(Rect::new(5.0, 5.0, 10.0, 10.0))
                    .with_style(style().fill(Color::BLUE).no_stroke()),
            ),
        );
        let stray = tree.insert(Box::new(RectShape::new(Rect::new(0.0, 0.0, 1.0, 1.0))));
        let mut win = window(20, 20);
        tree.with_node_mut(vp, |node, tree| {
            node.as_viewport_mut().unwrap().full_render(tree, vp, None, &mut win);
        });
        win.take_damage();

        tree.with_node_mut(under, |node, _| {
            let rect = node.as_any_mut().downcast_mut::<RectShape>().unwrap();
            rect.props_mut().fill = PaintSource::Solid(Color::GREEN);
        });
        tree.with_node_mut(vp, |node, tree| {
            let viewport = node.as_viewport_mut().unwrap();
            assert!(viewport.rerender_node(tree, vp, under, &mut win));
            assert!(!viewport.rerender_node(tree, vp, stray, &mut win));
            assert_eq!(viewport.counts().partial_renders, 1);
        });

        assert_eq!(win.take_damage(), vec![PixelRect::new(0, 0, 10, 10)]);
        let green = win.surface().pixel(2, 2).unwrap();
        let blue = win.surface().pixel(7, 7).unwrap();
        assert_eq!((green.green(), green.red()), (255, 0));
        assert_eq!((blue.blue(), blue.red()), (255, 0));
    }

    #[test]
    fn test_rerender_anchor_repaints_old_and_new_box() {
        let mut tree = Tree::new();
        let vp = tree.insert(Box::new(
            Viewport::new("main", PixelSize::new(20, 20)).with_background(Color::WHITE),
        ));
        let frame = tree.insert_child(
            vp,
            Box::new(
                Frame::new(Rect::new(0.0, 0.0, 10.0, 10.0))
                    .anchor(true)
                    .with_style(style().fill(Color::RED).no_stroke()),
            ),
        );
        let mut win = window(20, 20);
        tree.with_node_mut(vp, |node, tree| {
            node.as_viewport_mut().unwrap().full_render(tree, vp, None, &mut win);
        });
        win.take_damage();

        tree.with_node_mut(frame, |node, _| {
            node.as_any_mut().downcast_mut::<Frame>().unwrap().rect.width = 15.0;
        });
        tree.with_node_mut(vp, |node, tree| {
            let viewport = node.as_viewport_mut().unwrap();
            assert!(viewport.rerender_anchor(tree, vp, frame, &mut win));
            assert_eq!(viewport.counts().anchor_renders, 1);
        });

        assert_eq!(tree.bboxes(frame).unwrap().local, PixelRect::new(0, 0, 15, 10));
        assert_eq!(win.take_damage(), vec![PixelRect::new(0, 0, 15, 10)]);
        assert_eq!(win.surface().pixel(12, 5).unwrap().red(), 255);
        assert_eq!(win.surface().pixel(12, 5).unwrap().green(), 0);
    }

    #[test]
    fn test_png_round_trip_opaque() {
        let mut vp = Viewport::new("png", PixelSize::new(4, 3));
        vp.painter_mut().unwrap().clear(Color::from_hex(0x336699));

        let mut bytes = Vec::new();
        vp.encode_png(&mut bytes).unwrap();
        let decoded = decode_png(Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, vp.to_rgba_image().unwrap());

        let copy = Viewport::from_image("copy", &decoded).unwrap();
        assert_eq!(copy.size(), PixelSize::new(4, 3));
        assert_eq!(copy.to_rgba_image().unwrap(), decoded);
    }

    #[test]
    fn test_load_missing_png() {
        assert!(matches!(
            load_png("/no/such/image.png"),
            Err(Error::MissingAsset(_))
        ));
    }
}
