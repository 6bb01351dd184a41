//! Pixel diff engine.
//!
//! Walks both images in lockstep and classifies every position through a
//! [`ComparisonPolicy`]. The result carries the mismatch rate and an image
//! for human review: differing pixels are painted solid red, matching ones
//! are a dimmed copy of the golden.

use image::{Rgba, RgbaImage};

use crate::error::CompareError;
use crate::policy::ComparisonPolicy;

/// Colour used for differing pixels in the diff image.
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Outcome of diffing a candidate against a golden.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Number of pixels classified as different.
    pub diff_pixels: u64,
    /// Total number of pixels compared.
    pub total_pixels: u64,
    /// `diff_pixels / total_pixels`, 0.0 for an empty image.
    pub mismatch_rate: f64,
    /// Visual diff with the same dimensions as the inputs.
    pub diff_image: RgbaImage,
}

impl DiffResult {
    pub fn is_match(&self) -> bool {
        self.diff_pixels == 0
    }
}

/// Compare `candidate` against `golden` under `policy`.
///
/// Images of different sizes are rejected instead of partially compared.
pub fn diff(
    golden: &RgbaImage,
    candidate: &RgbaImage,
    policy: &ComparisonPolicy,
) -> Result<DiffResult, CompareError> {
    if golden.dimensions() != candidate.dimensions() {
        return Err(CompareError::DimensionMismatch {
            golden_w: golden.width(),
            golden_h: golden.height(),
            candidate_w: candidate.width(),
            candidate_h: candidate.height(),
        });
    }

    let (width, height) = golden.dimensions();
    let total_pixels = u64::from(width) * u64::from(height);
    let mut diff_pixels = 0u64;
    let mut diff_image = RgbaImage::new(width, height);

    for ((golden_px, candidate_px), out) in golden
        .pixels()
        .zip(candidate.pixels())
        .zip(diff_image.pixels_mut())
    {
        if policy.pixel_differs(golden_px, candidate_px) {
            diff_pixels += 1;
            *out = HIGHLIGHT;
        } else {
            *out = dim(golden_px);
        }
    }

    let mismatch_rate = if total_pixels == 0 {
        0.0
    } else {
        diff_pixels as f64 / total_pixels as f64
    };

    Ok(DiffResult {
        diff_pixels,
        total_pixels,
        mismatch_rate,
        diff_image,
    })
}

fn dim(px: &Rgba<u8>) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = *px;
    Rgba([r / 4, g / 4, b / 4, a])
}
