//! Paint style: the small set of inherited properties shapes are drawn with.
//!
//! Each node carries [`StyleProps`] (what it sets itself) and, after the style
//! pass, a resolved [`PaintStyle`] computed against its parent's resolved
//! style. Unset properties inherit.

use crate::geometry::Color;

/// Where a fill or stroke color comes from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PaintSource {
    /// Use whatever the parent resolved to.
    #[default]
    Inherit,
    /// Explicitly disabled.
    None,
    Solid(Color),
}

/// Per-node style overrides.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StyleProps {
    pub fill: PaintSource,
    pub stroke: PaintSource,
    pub stroke_width: Option<f32>,
    pub opacity: Option<f32>,
}

impl StyleProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = PaintSource::Solid(color);
        self
    }

    pub fn no_fill(mut self) -> Self {
        self.fill = PaintSource::None;
        self
    }

    pub fn stroke(mut self, color: Color) -> Self {
        self.stroke = PaintSource::Solid(color);
        self
    }

    pub fn no_stroke(mut self) -> Self {
        self.stroke = PaintSource::None;
        self
    }

    pub fn stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = Some(width);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Resolve against the parent's resolved style.
    ///
    /// Opacity multiplies down the tree; every other property replaces the
    /// inherited value when set.
    pub fn resolve(&self, parent: &PaintStyle) -> PaintStyle {
        let pick = |source: PaintSource, inherited: Option<Color>| match source {
            PaintSource::Inherit => inherited,
            PaintSource::None => None,
            PaintSource::Solid(c) => Some(c),
        };
        PaintStyle {
            fill: pick(self.fill, parent.fill),
            stroke: pick(self.stroke, parent.stroke),
            stroke_width: self.stroke_width.unwrap_or(parent.stroke_width).max(0.0),
            opacity: (parent.opacity * self.opacity.unwrap_or(1.0)).clamp(0.0, 1.0),
        }
    }
}

/// Fully resolved paint style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f32,
    pub opacity: f32,
}

impl PaintStyle {
    /// The style at the top of every viewport: nothing filled or stroked.
    pub const BASE: PaintStyle = PaintStyle {
        fill: None,
        stroke: None,
        stroke_width: 1.0,
        opacity: 1.0,
    };

    pub fn has_fill(&self) -> bool {
        self.fill.is_some()
    }

    /// A zero-width stroke draws nothing and counts as unset.
    pub fn has_stroke(&self) -> bool {
        self.stroke.is_some() && self.stroke_width > 0.0
    }

    pub fn has_no_stroke_or_fill(&self) -> bool {
        !self.has_fill() && !self.has_stroke()
    }

    /// Fill color with opacity applied.
    pub fn fill_color(&self) -> Option<Color> {
        self.fill.map(|c| c.with_alpha(c.a * self.opacity))
    }

    /// Stroke color with opacity applied.
    pub fn stroke_color(&self) -> Option<Color> {
        self.stroke.map(|c| c.with_alpha(c.a * self.opacity))
    }

    /// Half the stroke width, or zero when there is no stroke.
    pub fn stroke_extent(&self) -> f32 {
        if self.has_stroke() {
            self.stroke_width * 0.5
        } else {
            0.0
        }
    }
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self::BASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_props_inherit() {
        let parent = StyleProps::new()
            .fill(Color::RED)
            .stroke_width(3.0)
            .resolve(&PaintStyle::BASE);
        let child = StyleProps::new().resolve(&parent);
        assert_eq!(child.fill, Some(Color::RED));
        assert_eq!(child.stroke_width, 3.0);
        assert!(child.stroke.is_none());
    }

    #[test]
    fn test_explicit_none_overrides_inherited() {
        let parent = StyleProps::new()
            .fill(Color::RED)
            .resolve(&PaintStyle::BASE);
        let child = StyleProps::new().no_fill().resolve(&parent);
        assert!(child.has_no_stroke_or_fill());
    }

    #[test]
    fn test_opacity_multiplies() {
        let parent = StyleProps::new().opacity(0.5).resolve(&PaintStyle::BASE);
        let child = StyleProps::new()
            .opacity(0.5)
            .fill(Color::WHITE)
            .resolve(&parent);
        assert_eq!(child.opacity, 0.25);
        assert_eq!(child.fill_color().map(|c| c.a), Some(0.25));
    }

    #[test]
    fn test_zero_width_stroke_is_no_stroke() {
        let style = StyleProps::new()
            .stroke(Color::BLACK)
            .stroke_width(0.0)
            .resolve(&PaintStyle::BASE);
        assert!(!style.has_stroke());
        assert_eq!(style.stroke_extent(), 0.0);
    }
}
