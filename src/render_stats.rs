//! Render statistics tracking for debugging and performance analysis.
//!
//! Enable render stats by compiling with the `render-stats` feature:
//! ```bash
//! cargo run --example basic_scene --features render-stats
//! ```
//!
//! Stats are printed every second when enabled, showing:
//! - Ticks that did work vs idle ticks
//! - Full, partial and anchor re-renders
//! - Viewports skipped because they were off-screen
//! - Composites into parent buffers and uploads to the window

/// Snapshot of accumulated render statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub ticks_busy: u64,
    pub ticks_idle: u64,
    pub full_renders: u64,
    pub partial_renders: u64,
    pub anchor_renders: u64,
    pub viewports_skipped: u64,
    pub composites: u64,
    pub uploads: u64,
    pub pixels_uploaded: u64,
    pub signals_dropped: u64,
}

#[cfg(feature = "render-stats")]
mod inner {
    use std::cell::RefCell;
    use std::time::Instant;

    use super::StatsSnapshot;

    thread_local! {
        static STATS: RefCell<RenderStats> = RefCell::new(RenderStats::new());
    }

    struct RenderStats {
        counts: StatsSnapshot,
        last_print: Instant,
    }

    impl RenderStats {
        fn new() -> Self {
            Self {
                counts: StatsSnapshot::default(),
                last_print: Instant::now(),
            }
        }

        fn reset(&mut self) {
            self.counts = StatsSnapshot::default();
            self.last_print = Instant::now();
        }
    }

    fn bump(f: impl FnOnce(&mut StatsSnapshot)) {
        STATS.with(|s| f(&mut s.borrow_mut().counts));
    }

    #[inline]
    pub fn record_full_render() {
        bump(|s| s.full_renders += 1);
    }

    #[inline]
    pub fn record_partial_render() {
        bump(|s| s.partial_renders += 1);
    }

    #[inline]
    pub fn record_anchor_render() {
        bump(|s| s.anchor_renders += 1);
    }

    /// Record a viewport whose bounds were empty or off-window.
    #[inline]
    pub fn record_viewport_skipped() {
        bump(|s| s.viewports_skipped += 1);
    }

    #[inline]
    pub fn record_composite() {
        bump(|s| s.composites += 1);
    }

    #[inline]
    pub fn record_upload(pixels: u64) {
        bump(|s| {
            s.uploads += 1;
            s.pixels_uploaded += pixels;
        });
    }

    #[inline]
    pub fn record_signal_dropped() {
        bump(|s| s.signals_dropped += 1);
    }

    /// Return a snapshot of the current stats (for testing).
    pub fn get_stats() -> StatsSnapshot {
        STATS.with(|s| s.borrow().counts.clone())
    }

    /// Reset all stats to zero (for test isolation).
    pub fn reset_stats() {
        STATS.with(|s| s.borrow_mut().reset());
    }

    /// Called at the end of each scene tick to potentially print stats.
    pub fn end_tick(did_work: bool) {
        STATS.with(|s| {
            let mut stats = s.borrow_mut();
            if did_work {
                stats.counts.ticks_busy += 1;
            } else {
                stats.counts.ticks_idle += 1;
            }

            if stats.last_print.elapsed().as_secs() >= 1 {
                let c = &stats.counts;
                eprintln!(
                    "[Render Stats] ticks={} busy={} idle={}",
                    c.ticks_busy + c.ticks_idle,
                    c.ticks_busy,
                    c.ticks_idle
                );
                eprintln!(
                    "  renders: full={} partial={} anchor={} skipped_viewports={}",
                    c.full_renders, c.partial_renders, c.anchor_renders, c.viewports_skipped
                );
                eprintln!(
                    "  output: composites={} uploads={} pixels={}",
                    c.composites, c.uploads, c.pixels_uploaded
                );
                if c.signals_dropped > 0 {
                    eprintln!("  signals dropped: {}", c.signals_dropped);
                }
                stats.reset();
            }
        });
    }
}

#[cfg(feature = "render-stats")]
pub use inner::*;

// No-op implementations when feature is disabled - these get completely inlined away

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn get_stats() -> StatsSnapshot {
    StatsSnapshot::default()
}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn reset_stats() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_full_render() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_partial_render() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_anchor_render() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_viewport_skipped() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_composite() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_upload(_pixels: u64) {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn record_signal_dropped() {}

#[cfg(not(feature = "render-stats"))]
#[inline(always)]
pub fn end_tick(_did_work: bool) {}

#[cfg(test)]
#[cfg(feature = "render-stats")]
mod tests {
    use super::*;

    /// Reset stats before each test to ensure isolation
    /// (tests share the thread-local when run on the same thread).
    fn setup() {
        reset_stats();
    }

    #[test]
    fn test_render_counters() {
        setup();
        record_full_render();
        record_partial_render();
        record_partial_render();
        record_anchor_render();
        let s = get_stats();
        assert_eq!(s.full_renders, 1);
        assert_eq!(s.partial_renders, 2);
        assert_eq!(s.anchor_renders, 1);
    }

    #[test]
    fn test_upload_accumulates_pixels() {
        setup();
        record_upload(100);
        record_upload(24);
        let s = get_stats();
        assert_eq!(s.uploads, 2);
        assert_eq!(s.pixels_uploaded, 124);
    }

    #[test]
    fn test_end_tick_counts_idle_and_busy() {
        setup();
        end_tick(true);
        end_tick(false);
        end_tick(false);
        let s = get_stats();
        assert_eq!(s.ticks_busy, 1);
        assert_eq!(s.ticks_idle, 2);
    }

    #[test]
    fn test_reset() {
        setup();
        record_composite();
        record_signal_dropped();
        reset_stats();
        assert_eq!(get_stats(), StatsSnapshot::default());
    }
}
