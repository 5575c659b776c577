//! Windows: the destination viewports upload their pixels to.
//!
//! Viewports only see a window through the [`Compositor`] trait, so the
//! render passes do not care whether the pixels end up on screen or, as with
//! the headless [`Window`] shipped here, in an in-memory surface that can be
//! inspected and written out as PNG.
//!
//! ```ignore
//! let window = Window::new(
//!     WindowConfig::new()
//!         .size(320, 240)
//!         .title("preview")
//!         .background(Color::WHITE),
//! )?;
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use resvg::tiny_skia::Pixmap;

use crate::error::Result;
use crate::geometry::{Color, PixelPoint, PixelRect, PixelSize};
use crate::painter::Painter;
use crate::render_stats;
use crate::tree::NodeId;

/// Unique identifier for each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    /// Create a new unique window ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        WindowId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value (for debugging/logging).
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Configuration for a window.
///
/// Use the builder pattern to configure window properties:
///
/// ```ignore
/// WindowConfig::new()
///     .size(640, 480)
///     .title("scene")
///     .background(Color::rgb(0.1, 0.1, 0.15))
/// ```
#[derive(Clone, Debug)]
pub struct WindowConfig {
    /// Width of the window in pixels.
    pub width: u32,
    /// Height of the window in pixels.
    pub height: u32,
    /// Title, used in logs.
    pub title: String,
    /// Color the surface is cleared to before uploads.
    pub background: Color,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            title: "vista".to_string(),
            background: Color::WHITE,
        }
    }
}

impl WindowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn size(self, width: u32, height: u32) -> Self {
        self.width(width).height(height)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn pixel_size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }
}

/// What a viewport needs from the window it renders for.
pub trait Compositor {
    fn id(&self) -> WindowId;

    fn size(&self) -> PixelSize;

    /// False while the window is closed or being resized; uploads are
    /// skipped then.
    fn is_visible(&self) -> bool;

    /// Copy `src` of `buffer` into the window with its top-left at `dest`.
    fn upload_buffer_region(&mut self, buffer: &Pixmap, src: PixelRect, dest: PixelPoint);

    /// Make `viewport` the current popup.
    fn push_popup(&mut self, viewport: NodeId);

    /// Ask for every viewport to be uploaded again on the next tick.
    fn request_full_update(&mut self);
}

/// Upload bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploads: u64,
    pub pixels: u64,
    pub skipped: u64,
}

/// Headless window backed by an in-memory surface.
pub struct Window {
    id: WindowId,
    config: WindowConfig,
    surface: Painter,
    /// Popup viewports, most recent last.
    popups: Vec<NodeId>,
    closed: bool,
    resizing: bool,
    full_update_requested: bool,
    stats: UploadStats,
    /// Window-space rectangles written since the last [`Window::take_damage`].
    damage: Vec<PixelRect>,
}

impl Window {
    pub fn new(config: WindowConfig) -> Result<Self> {
        let mut surface = Painter::new(config.pixel_size())?;
        surface.clear(config.background);
        let id = WindowId::next();
        log::info!(
            "Created window {:?} '{}' {}x{}",
            id,
            config.title,
            config.width,
            config.height
        );
        Ok(Self {
            id,
            config,
            surface,
            popups: Vec::new(),
            closed: false,
            resizing: false,
            full_update_requested: false,
            stats: UploadStats::default(),
            damage: Vec::new(),
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn surface(&self) -> &Pixmap {
        self.surface.pixmap()
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    pub fn take_damage(&mut self) -> Vec<PixelRect> {
        std::mem::take(&mut self.damage)
    }

    pub fn close(&mut self) {
        log::debug!("Closing window {:?}", self.id);
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_resizing(&mut self, resizing: bool) {
        self.resizing = resizing;
    }

    /// Reallocate the surface for a new size. Returns false if the size did
    /// not change.
    pub fn resized(&mut self, size: PixelSize) -> Result<bool> {
        if size == self.size() {
            return Ok(false);
        }
        let mut surface = Painter::new(size)?;
        surface.clear(self.config.background);
        self.surface = surface;
        self.config.width = size.width;
        self.config.height = size.height;
        self.full_update_requested = true;
        log::debug!("Window {:?} resized to {}x{}", self.id, size.width, size.height);
        Ok(true)
    }

    /// Clear the surface to the background color.
    pub fn clear(&mut self) {
        self.surface.clear(self.config.background);
        self.damage.push(self.surface.pixel_bounds());
    }

    /// Draw `src` of `buffer` over the surface, blending with what is there.
    /// Used for overlays, which are mostly transparent.
    pub fn blend_buffer_region(&mut self, buffer: &Pixmap, src: PixelRect, dest: PixelPoint) {
        if !self.is_visible() {
            self.stats.skipped += 1;
            return;
        }
        self.surface.draw_pixmap_region(buffer, src, dest);
        self.record_upload(src, dest);
    }

    fn record_upload(&mut self, src: PixelRect, dest: PixelPoint) {
        let rect = PixelRect::from_origin_size(dest, src.size());
        let pixels = rect.width() as u64 * rect.height() as u64;
        self.stats.uploads += 1;
        self.stats.pixels += pixels;
        self.damage.push(rect);
        render_stats::record_upload(pixels);
    }

    pub fn popups(&self) -> &[NodeId] {
        &self.popups
    }

    pub fn current_popup(&self) -> Option<NodeId> {
        self.popups.last().copied()
    }

    /// Remove `viewport` from the popup stack; the previous popup, if any,
    /// becomes current again.
    pub fn pop_popup(&mut self, viewport: NodeId) -> bool {
        let Some(pos) = self.popups.iter().rposition(|&p| p == viewport) else {
            return false;
        };
        self.popups.remove(pos);
        true
    }

    /// Drop every popup reference, e.g. when the scene is torn down.
    pub fn disconnect_popups(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.popups)
    }

    pub fn take_full_update_request(&mut self) -> bool {
        std::mem::take(&mut self.full_update_requested)
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        crate::viewport::pixmap_to_rgba(self.surface.pixmap())
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgba_image()
            .save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        Ok(())
    }
}

impl Compositor for Window {
    fn id(&self) -> WindowId {
        self.id
    }

    fn size(&self) -> PixelSize {
        self.surface.size()
    }

    fn is_visible(&self) -> bool {
        !self.closed && !self.resizing
    }

    fn upload_buffer_region(&mut self, buffer: &Pixmap, src: PixelRect, dest: PixelPoint) {
        if !self.is_visible() {
            log::trace!("Window {:?} not visible, skipping upload", self.id);
            self.stats.skipped += 1;
            return;
        }
        self.surface.copy_pixmap_region(buffer, src, dest);
        self.record_upload(src, dest);
    }

    fn push_popup(&mut self, viewport: NodeId) {
        self.popups.retain(|&p| p != viewport);
        self.popups.push(viewport);
    }

    fn request_full_update(&mut self) {
        self.full_update_requested = true;
    }
}
