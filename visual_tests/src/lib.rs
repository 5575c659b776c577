//! Visual regression tests: render named scenes headlessly and compare the
//! window surface against reference PNGs.
//!
//! References live in `references/` and are written with
//! `UPDATE_REFERENCES=1`. A scene without a reference fails with
//! [`VisualTestError::ReferenceNotFound`]. Captures and diffs of failing
//! scenes go to `output/`.

mod compare;
mod scenes;

pub use compare::{compare, diff_image, Comparison, PIXEL_TOLERANCE};
pub use scenes::{build_scene, capture_scene, SCENES};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualTestError {
    #[error("reference image not found: {0} (run with UPDATE_REFERENCES=1)")]
    ReferenceNotFound(PathBuf),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("render error: {0}")]
    Render(#[from] vista::Error),
    #[error("comparison failed: {0}")]
    Compare(String),
    #[error("size mismatch: reference {reference:?}, captured {captured:?}")]
    SizeMismatch {
        reference: (u32, u32),
        captured: (u32, u32),
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, VisualTestError>;

#[derive(Clone, Debug)]
pub struct VisualTestConfig {
    pub scene_name: String,
    /// Minimum SSIM score to pass.
    pub similarity_threshold: f64,
    pub reference_dir: PathBuf,
}

impl VisualTestConfig {
    pub fn new(scene_name: impl Into<String>) -> Self {
        Self {
            scene_name: scene_name.into(),
            similarity_threshold: 0.99,
            reference_dir: references_dir(),
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn reference_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reference_dir = dir.into();
        self
    }

    pub fn reference_path(&self) -> PathBuf {
        self.reference_dir.join(format!("{}.png", self.scene_name))
    }
}

pub struct VisualTestResult {
    pub passed: bool,
    pub comparison: Comparison,
    pub reference_path: PathBuf,
    pub captured_path: PathBuf,
    /// Written only when the scene failed.
    pub diff_path: Option<PathBuf>,
}

impl VisualTestResult {
    pub fn similarity(&self) -> f64 {
        self.comparison.similarity
    }
}

pub fn references_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("references")
}

pub fn output_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("output")
}

fn output_path(scene_name: &str, suffix: &str) -> PathBuf {
    output_dir().join(format!("{}_{}.png", scene_name, suffix))
}

/// Render a scene and compare its window against the reference.
pub fn run_visual_test(config: &VisualTestConfig) -> Result<VisualTestResult> {
    let name = config.scene_name.as_str();
    let ref_path = config.reference_path();
    if !ref_path.exists() {
        return Err(VisualTestError::ReferenceNotFound(ref_path));
    }

    let captured = build_scene(name)?.window().to_rgba_image();
    let reference = image::open(&ref_path)?.to_rgba8();
    let comparison = compare(&reference, &captured)?;
    let passed = comparison.similarity >= config.similarity_threshold;

    std::fs::create_dir_all(output_dir())?;
    let captured_path = output_path(name, "captured");
    captured.save(&captured_path)?;

    let diff_path = if passed {
        None
    } else {
        let path = output_path(name, "diff");
        diff_image(&reference, &captured).save(&path)?;
        log::info!(
            "'{}': {} pixel(s) differ, diff at {}",
            name,
            comparison.differing_pixels,
            path.display()
        );
        Some(path)
    };

    Ok(VisualTestResult {
        passed,
        comparison,
        reference_path: ref_path,
        captured_path,
        diff_path,
    })
}

/// Re-render a scene into its reference PNG.
pub fn update_reference(config: &VisualTestConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.reference_dir)?;
    let path = config.reference_path();
    capture_scene(&config.scene_name, &path)?;
    log::info!("updated reference {}", path.display());
    Ok(path)
}

pub fn should_update_references() -> bool {
    std::env::var("UPDATE_REFERENCES").is_ok()
}

/// Display helper for failure messages.
pub fn display_or_na(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
