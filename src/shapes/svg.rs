use std::path::Path;

use resvg::usvg;

use crate::error::{Error, Result};
use crate::geometry::{PixelRect, Rect};
use crate::node::Node;
use crate::painter::Painter;

use super::{impl_shape_builders, impl_shape_node, ShapeBase};

/// An SVG document rendered with resvg, scaled into `rect`.
///
/// The document carries its own paint, so the node's fill/stroke style does
/// not gate rendering; only the transform and bounds apply.
pub struct SvgImage {
    pub rect: Rect,
    pub base: ShapeBase,
    tree: usvg::Tree,
}

impl SvgImage {
    pub fn from_data(data: &[u8], rect: Rect) -> Result<Self> {
        let tree = usvg::Tree::from_data(data, &usvg::Options::default())?;
        Ok(Self {
            rect,
            base: ShapeBase::new(),
            tree,
        })
    }

    /// Load an SVG file. A missing file is reported as [`Error::MissingAsset`].
    pub fn from_path(path: impl AsRef<Path>, rect: Rect) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::MissingAsset(format!("SVG file not found: {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        Self::from_data(&data, rect)
    }

    /// Intrinsic size declared by the document.
    pub fn intrinsic_size(&self) -> (f32, f32) {
        let size = self.tree.size();
        (size.width(), size.height())
    }
}

impl_shape_builders!(SvgImage);

impl Node for SvgImage {
    impl_shape_node!();

    fn kind(&self) -> &'static str {
        "svg"
    }

    fn compute_bbox(&self, painter: &Painter) -> PixelRect {
        PixelRect::covering(&painter.transform().map_rect(&self.rect))
    }

    fn render(&self, painter: &mut Painter) -> Result<()> {
        painter.draw_svg(&self.tree, &self.rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelSize;

    const SQUARE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
        <rect width="10" height="10" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn test_svg_renders_into_rect() {
        let image = SvgImage::from_data(SQUARE, Rect::new(2.0, 2.0, 4.0, 4.0)).unwrap();
        assert_eq!(image.intrinsic_size(), (10.0, 10.0));

        let mut painter = Painter::new(PixelSize::new(8, 8)).unwrap();
        image.render(&mut painter).unwrap();
        let inside = painter.pixmap().pixel(3, 3).unwrap();
        let outside = painter.pixmap().pixel(0, 0).unwrap();
        assert_eq!((inside.red(), inside.alpha()), (255, 255));
        assert_eq!(outside.alpha(), 0);
    }

    #[test]
    fn test_missing_file_is_missing_asset() {
        let result = SvgImage::from_path("/definitely/not/here.svg", Rect::default());
        assert!(matches!(result, Err(Error::MissingAsset(_))));
    }

    #[test]
    fn test_invalid_document_is_svg_error() {
        let result = SvgImage::from_data(b"not svg", Rect::default());
        assert!(matches!(result, Err(Error::Svg(_))));
    }
}
