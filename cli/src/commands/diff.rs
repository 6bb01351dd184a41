//! `goldens diff`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use goldens_compare::{ComparisonPolicy, diff};

use super::compare::load_png;
use crate::output::Output;

/// Diff two files directly. Returns whether they match.
pub fn run_diff(
    golden: &Path,
    candidate: &Path,
    policy: ComparisonPolicy,
    out_path: Option<PathBuf>,
) -> Result<bool> {
    let golden_image = load_png(golden)?;
    let candidate_image = load_png(candidate)?;
    let result = diff(&golden_image, &candidate_image, &policy)?;

    let out = Output::new();
    out.labeled("Policy", policy);
    out.labeled(
        "Differing pixels",
        format!("{} of {}", result.diff_pixels, result.total_pixels),
    );
    out.rate("Mismatch", result.mismatch_rate, result.is_match());

    if let Some(path) = out_path {
        result
            .diff_image
            .save(&path)
            .with_context(|| format!("Failed to write diff image {}", path.display()))?;
        out.info(format!("Diff image written to {}", path.display()));
    }

    if result.is_match() {
        out.success("Images match");
    } else {
        out.error("Images differ");
    }
    Ok(result.is_match())
}
