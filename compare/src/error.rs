//! Errors that abort a comparison.
//!
//! Expected test outcomes (missing golden, mismatch, tolerated drift) are not
//! errors; they are variants of [`crate::CompareOutcome`].

use std::path::PathBuf;

/// Conditions that make a comparison impossible to complete.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("Image dimensions differ: golden is {golden_w}x{golden_h}, candidate is {candidate_w}x{candidate_h}")]
    DimensionMismatch {
        golden_w: u32,
        golden_h: u32,
        candidate_w: u32,
        candidate_h: u32,
    },

    #[error("Failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode image {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompareError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
