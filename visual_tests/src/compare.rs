use image::{DynamicImage, Rgba, RgbaImage};
use image_compare::Algorithm;

use crate::{Result, VisualTestError};

/// Channel difference below which two pixels count as equal.
pub const PIXEL_TOLERANCE: u8 = 10;

/// How close a captured window image is to its reference.
#[derive(Clone, Copy, Debug)]
pub struct Comparison {
    /// SSIM score over RGB, from 0.0 to 1.0.
    pub similarity: f64,
    /// Pixels whose largest channel difference exceeds [`PIXEL_TOLERANCE`].
    pub differing_pixels: u64,
    /// Largest channel difference anywhere, alpha included.
    pub max_channel_delta: u8,
}

impl Comparison {
    pub fn is_identical(&self) -> bool {
        self.max_channel_delta == 0
    }
}

/// Compare a capture against its reference. Both must have the same size.
pub fn compare(reference: &RgbaImage, captured: &RgbaImage) -> Result<Comparison> {
    if reference.dimensions() != captured.dimensions() {
        return Err(VisualTestError::SizeMismatch {
            reference: reference.dimensions(),
            captured: captured.dimensions(),
        });
    }

    let ref_rgb = DynamicImage::from(reference.clone()).to_rgb8();
    let cap_rgb = DynamicImage::from(captured.clone()).to_rgb8();
    let ssim = image_compare::rgb_similarity_structure(&Algorithm::MSSIMSimple, &ref_rgb, &cap_rgb)
        .map_err(|e| VisualTestError::Compare(format!("SSIM failed: {}", e)))?;

    let mut differing_pixels = 0;
    let mut max_channel_delta = 0;
    for (a, b) in reference.pixels().zip(captured.pixels()) {
        let delta = channel_delta(a, b);
        max_channel_delta = max_channel_delta.max(delta);
        if delta > PIXEL_TOLERANCE {
            differing_pixels += 1;
        }
    }

    Ok(Comparison {
        similarity: ssim.score,
        differing_pixels,
        max_channel_delta,
    })
}

/// Differences in red over a dimmed copy of the capture.
pub fn diff_image(reference: &RgbaImage, captured: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(captured.width(), captured.height(), |x, y| {
        let cap = captured.get_pixel(x, y);
        let Some(reference) = reference.get_pixel_checked(x, y) else {
            return Rgba([255, 0, 255, 255]);
        };
        let delta = channel_delta(reference, cap);
        if delta > PIXEL_TOLERANCE {
            let intensity = (delta as f32 / 255.0 * 200.0 + 55.0) as u8;
            Rgba([intensity, 0, 0, 255])
        } else {
            Rgba([cap[0] / 3, cap[1] / 3, cap[2] / 3, 255])
        }
    })
}

fn channel_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn test_identical_images() {
        let img = solid(16, 16, [10, 20, 30, 255]);
        let result = compare(&img, &img).unwrap();
        assert!(result.is_identical());
        assert_eq!(result.differing_pixels, 0);
        assert!(result.similarity > 0.999);
    }

    #[test]
    fn test_counts_differing_pixels() {
        let reference = solid(16, 16, [0, 0, 0, 255]);
        let mut captured = reference.clone();
        captured.put_pixel(3, 4, Rgba([200, 0, 0, 255]));
        captured.put_pixel(5, 5, Rgba([5, 0, 0, 255]));
        let result = compare(&reference, &captured).unwrap();
        assert_eq!(result.differing_pixels, 1);
        assert_eq!(result.max_channel_delta, 200);
    }

    #[test]
    fn test_size_mismatch() {
        let err = compare(&solid(4, 4, [0; 4]), &solid(4, 5, [0; 4])).unwrap_err();
        assert!(matches!(err, VisualTestError::SizeMismatch { .. }));
    }

    #[test]
    fn test_diff_marks_changes() {
        let reference = solid(2, 1, [90, 90, 90, 255]);
        let mut captured = reference.clone();
        captured.put_pixel(1, 0, Rgba([90, 255, 90, 255]));
        let diff = diff_image(&reference, &captured);
        assert_eq!(diff.get_pixel(0, 0).0, [30, 30, 30, 255]);
        assert_eq!(diff.get_pixel(1, 0)[1], 0);
        assert!(diff.get_pixel(1, 0)[0] > 55);
    }
}
