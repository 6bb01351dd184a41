//! `goldens compare`.

use std::path::Path;

use anyhow::{Context as _, Result};
use goldens_compare::store::decode_png;
use goldens_compare::{CompareOutcome, CompareRequest, Config};
use image::RgbaImage;
use tracing::instrument;

use crate::cli::CompareArgs;
use crate::output::Output;

/// Run one comparison. Returns whether the outcome passed.
#[instrument(skip_all, fields(name = %args.name))]
pub async fn run_compare(args: CompareArgs) -> Result<bool> {
    let mut config = Config::init().context("Failed to load configuration")?;
    if let Some(dir) = args.goldens_dir {
        config = config.with_goldens_dir(dir);
    }
    if let Some(dir) = args.results_dir {
        config = config.with_results_dir(dir);
    }

    let screenshot = load_png(&args.screenshot)?;
    let request = CompareRequest::new(args.name)
        .policy(args.policy)
        .failure_threshold(args.threshold)
        .update_goldens(args.update_goldens || config.update_goldens())
        .write(args.write)
        .suffix(args.suffix);

    let mut comparator = config.comparator();
    let outcome = comparator
        .compare(&screenshot, &request)
        .await
        .with_context(|| format!("Failed to compare {}", args.screenshot.display()))?;
    comparator.flush_uploads().await;

    print_outcome(&Output::new(), &request.golden_filename(), &outcome);
    Ok(!outcome.is_failure())
}

pub(crate) fn load_png(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(decode_png(&bytes, path)?)
}

fn print_outcome(out: &Output, filename: &str, outcome: &CompareOutcome) {
    match outcome {
        CompareOutcome::Matched => out.success(format!("{filename} matches its golden")),
        CompareOutcome::Updated {
            path,
            notice: None,
        } => out.success(format!("Updated {}", path.display())),
        CompareOutcome::Updated {
            notice: Some(notice),
            ..
        } => out.warning(notice),
        CompareOutcome::MissingGolden { message, .. } => {
            out.error(format!("{filename} has no golden"));
            out.block(message);
        }
        CompareOutcome::Mismatched(mismatch) if mismatch.is_tolerated() => {
            out.warning(format!("{filename} drifted within tolerance"));
            out.rate("Mismatch", mismatch.diff_rate, true);
            out.labeled("Report", mismatch.artifacts.report.display());
        }
        CompareOutcome::Mismatched(mismatch) => {
            out.error(format!("{filename} does not match its golden"));
            out.block(&mismatch.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn load_png_reads_rgba() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shot.png");
        let image = RgbaImage::from_pixel(2, 3, Rgba([1, 2, 3, 4]));
        image.save(&path).unwrap();

        assert_eq!(load_png(&path).unwrap(), image);
    }

    #[test]
    fn load_png_names_missing_file() {
        let err = load_png(Path::new("/no/such/shot.png")).unwrap_err();
        assert!(err.to_string().contains("/no/such/shot.png"));
    }
}
