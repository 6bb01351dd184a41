//! Failure artifacts and messages for mismatched goldens.
//!
//! On a mismatch four files land in the results directory, keyed by the
//! golden's basename:
//!
//! - `<basename>.actual.png`: the screenshot under test
//! - `<basename>.diff.png`: the visual diff
//! - `<basename>.expected.png`: the golden
//! - `<basename>.report.html`: a page showing the images side by side

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, instrument};

use crate::diff::DiffResult;
use crate::error::CompareError;
use crate::store::save_png;

/// Paths of the files written for one mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub actual: PathBuf,
    pub diff: PathBuf,
    pub expected: PathBuf,
    pub report: PathBuf,
}

impl ReportArtifacts {
    /// Artifact paths for `basename` inside `results_dir`. Nothing is written.
    pub fn paths(results_dir: &Path, basename: &str) -> Self {
        Self {
            actual: results_dir.join(format!("{basename}.actual.png")),
            diff: results_dir.join(format!("{basename}.diff.png")),
            expected: results_dir.join(format!("{basename}.expected.png")),
            report: results_dir.join(format!("{basename}.report.html")),
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Path> {
        [&self.actual, &self.diff, &self.expected, &self.report]
            .into_iter()
            .map(PathBuf::as_path)
    }
}

/// Write the screenshot, diff, golden and HTML report for a mismatch.
#[instrument(skip_all, fields(basename = basename, results_dir = %results_dir.display()))]
pub fn report(
    basename: &str,
    results_dir: &Path,
    screenshot: &RgbaImage,
    diff: &DiffResult,
    golden: &RgbaImage,
) -> Result<ReportArtifacts, CompareError> {
    fs::create_dir_all(results_dir).map_err(|e| CompareError::io(results_dir, e))?;

    let artifacts = ReportArtifacts::paths(results_dir, basename);
    save_png(screenshot, &artifacts.actual)?;
    save_png(&diff.diff_image, &artifacts.diff)?;
    save_png(golden, &artifacts.expected)?;

    let html = render_html(basename, &artifacts, diff);
    fs::write(&artifacts.report, html).map_err(|e| CompareError::io(&artifacts.report, e))?;

    debug!(report = %artifacts.report.display(), "Wrote mismatch artifacts");
    Ok(artifacts)
}

/// One line comparing the mismatch rate with the failure threshold.
pub fn describe_rate(mismatch_rate: f64, failure_threshold: f64) -> String {
    format!(
        "Pixel mismatch rate: {:.4} ({:.2}%), failure threshold: {:.4} ({:.2}%)",
        mismatch_rate,
        mismatch_rate * 100.0,
        failure_threshold,
        failure_threshold * 100.0
    )
}

/// Human-readable explanation of a mismatch.
pub fn compose_message(
    filename: &str,
    diff: &DiffResult,
    failure_threshold: f64,
    golden_path: &Path,
    artifacts: &ReportArtifacts,
) -> String {
    format!(
        "Golden file {filename} did not match the image generated by the test.\n\
         {rate} ({diff_pixels} of {total_pixels} pixels differ)\n\
         You can view the test report in your browser by opening:\n\
         {report}\n\
         To update the golden file call compare('{filename}', write: true).\n\
         Golden file: {golden}",
        rate = describe_rate(diff.mismatch_rate, failure_threshold),
        diff_pixels = diff.diff_pixels,
        total_pixels = diff.total_pixels,
        report = artifacts.report.display(),
        golden = golden_path.display(),
    )
}

fn render_html(basename: &str, artifacts: &ReportArtifacts, diff: &DiffResult) -> String {
    let file_name = |path: &Path| {
        path.file_name()
            .map(|name| escape_html(&name.to_string_lossy()))
            .unwrap_or_default()
    };
    let title = escape_html(basename);
    let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Golden mismatch: {title}</title>
<style>
body {{ font-family: sans-serif; margin: 24px; background: #fafafa; }}
.images {{ display: flex; gap: 16px; align-items: flex-start; }}
figure {{ margin: 0; }}
figcaption {{ font-weight: bold; margin-bottom: 4px; }}
img {{ border: 1px solid #ccc; image-rendering: pixelated; max-width: 32vw; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{rate:.4}% of pixels differ ({diff_pixels} of {total_pixels}).</p>
<p>Generated {generated}</p>
<div class="images">
<figure><figcaption>Expected</figcaption><img src="{expected}" alt="expected"></figure>
<figure><figcaption>Diff</figcaption><img src="{diff_img}" alt="diff"></figure>
<figure><figcaption>Actual</figcaption><img src="{actual}" alt="actual"></figure>
</div>
</body>
</html>
"#,
        rate = diff.mismatch_rate * 100.0,
        diff_pixels = diff.diff_pixels,
        total_pixels = diff.total_pixels,
        expected = file_name(&artifacts.expected),
        diff_img = file_name(&artifacts.diff),
        actual = file_name(&artifacts.actual),
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::policy::ComparisonPolicy;
    use image::Rgba;
    use tempfile::TempDir;

    fn mismatched_pair() -> (RgbaImage, RgbaImage, DiffResult) {
        let golden = RgbaImage::from_pixel(4, 4, Rgba([0, 128, 0, 255]));
        let mut screenshot = golden.clone();
        screenshot.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let result = diff(&golden, &screenshot, &ComparisonPolicy::Precise).unwrap();
        (golden, screenshot, result)
    }

    #[test]
    fn report_writes_four_artifacts() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        let (golden, screenshot, result) = mismatched_pair();

        let artifacts = report("button", &results, &screenshot, &result, &golden).unwrap();

        assert_eq!(artifacts, ReportArtifacts::paths(&results, "button"));
        for path in artifacts.all() {
            assert!(path.is_file(), "{} missing", path.display());
        }
        assert!(artifacts.actual.ends_with("button.actual.png"));
        assert!(artifacts.report.ends_with("button.report.html"));

        let html = fs::read_to_string(&artifacts.report).unwrap();
        assert!(html.contains("button.expected.png"));
        assert!(html.contains("button.diff.png"));
        assert!(html.contains("button.actual.png"));
        assert!(html.contains("1 of 16"));
    }

    #[test]
    fn report_tolerates_existing_results_dir() {
        let dir = TempDir::new().unwrap();
        let (golden, screenshot, result) = mismatched_pair();

        report("a", dir.path(), &screenshot, &result, &golden).unwrap();
        report("b", dir.path(), &screenshot, &result, &golden).unwrap();

        assert!(dir.path().join("a.diff.png").is_file());
        assert!(dir.path().join("b.diff.png").is_file());
    }

    #[test]
    fn message_names_file_rate_threshold_report_and_fix() {
        let (_, _, result) = mismatched_pair();
        let artifacts = ReportArtifacts::paths(Path::new("/results"), "button");
        let message = compose_message(
            "button.png",
            &result,
            0.05,
            Path::new("/goldens/button.png"),
            &artifacts,
        );

        assert!(message.contains("Golden file button.png did not match"));
        assert!(message.contains("0.0625"));
        assert!(message.contains("0.0500"));
        assert!(message.contains(&artifacts.report.display().to_string()));
        assert!(message.contains("write: true"));
        assert!(message.contains("/goldens/button.png"));
    }

    #[test]
    fn html_escapes_names() {
        assert_eq!(escape_html("<a&b>"), "&lt;a&amp;b&gt;");
    }
}
