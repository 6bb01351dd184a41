//! Golden comparison orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tracing::{info, instrument, warn};

use crate::ci::CiContext;
use crate::diff::diff;
use crate::error::CompareError;
use crate::policy::ComparisonPolicy;
use crate::publish::{CiPublisher, GoldClient};
use crate::report::{ReportArtifacts, compose_message, describe_rate, report};
use crate::store::{GoldenStore, basename, with_suffix};

/// Result text for every non-failing outcome without a notice.
pub const OK: &str = "OK";

pub const DEFAULT_GOLDENS_DIR: &str = "goldens";
pub const DEFAULT_RESULTS_DIR: &str = "test_results";

/// Any differing pixel fails unless a higher threshold is set.
pub const DEFAULT_FAILURE_THRESHOLD: f64 = 0.0;

/// Parameters of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    pub filename: String,
    pub policy: ComparisonPolicy,
    /// Mismatch rates strictly below this value are tolerated.
    pub failure_threshold: f64,
    /// Bulk update mode: every comparison rewrites its golden.
    pub update_goldens: bool,
    /// Rewrite this one golden.
    pub write: bool,
    /// Variant suffix inserted before `.png`, e.g. `_dark`.
    pub filename_suffix: String,
}

impl CompareRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            policy: ComparisonPolicy::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            update_goldens: false,
            write: false,
            filename_suffix: String::new(),
        }
    }

    pub fn policy(mut self, policy: ComparisonPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_threshold(mut self, threshold: f64) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn update_goldens(mut self, update: bool) -> Self {
        self.update_goldens = update;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filename_suffix = suffix.into();
        self
    }

    /// Golden filename with the suffix applied.
    pub fn golden_filename(&self) -> String {
        with_suffix(&self.filename, &self.filename_suffix)
    }
}

/// A comparison that found differing pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub diff_rate: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub threshold: f64,
    pub artifacts: ReportArtifacts,
    pub message: String,
}

impl Mismatch {
    /// Drift below the failure threshold.
    pub fn is_tolerated(&self) -> bool {
        self.diff_rate < self.threshold
    }
}

/// What a comparison concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareOutcome {
    /// No golden on disk and no update requested.
    MissingGolden { path: PathBuf, message: String },
    /// The golden was (re)written from the screenshot.
    Updated {
        path: PathBuf,
        notice: Option<String>,
    },
    /// Every pixel matched.
    Matched,
    Mismatched(Mismatch),
}

impl CompareOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            Self::MissingGolden { .. } => true,
            Self::Updated { .. } | Self::Matched => false,
            Self::Mismatched(mismatch) => !mismatch.is_tolerated(),
        }
    }

    /// `"OK"`, the update notice, or the full diagnostic.
    pub fn result_message(&self) -> String {
        match self {
            Self::MissingGolden { message, .. } => message.clone(),
            Self::Updated {
                notice: Some(notice),
                ..
            } => notice.clone(),
            Self::Mismatched(mismatch) if !mismatch.is_tolerated() => mismatch.message.clone(),
            Self::Updated { notice: None, .. } | Self::Matched | Self::Mismatched(_) => {
                OK.to_owned()
            }
        }
    }
}

/// Compares screenshots against goldens, writing reports and publishing to CI.
pub struct GoldenComparator {
    store: GoldenStore,
    results_dir: PathBuf,
    publisher: CiPublisher,
}

impl GoldenComparator {
    pub fn new(store: GoldenStore, results_dir: impl Into<PathBuf>, publisher: CiPublisher) -> Self {
        Self {
            store,
            results_dir: results_dir.into(),
            publisher,
        }
    }

    pub fn store(&self) -> &GoldenStore {
        &self.store
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn publisher(&self) -> &CiPublisher {
        &self.publisher
    }

    /// Compare `screenshot` with the golden named by `request`.
    ///
    /// The upload to the review service starts before anything else and is
    /// never awaited here. Updates short-circuit the comparison.
    #[instrument(skip_all, fields(filename = %request.filename, policy = %request.policy))]
    pub async fn compare(
        &mut self,
        screenshot: &RgbaImage,
        request: &CompareRequest,
    ) -> Result<CompareOutcome, CompareError> {
        let filename = request.golden_filename();
        self.publisher.publish(&filename, screenshot, request.policy);

        let golden_path = self.store.resolve(&filename);

        if request.write || request.update_goldens {
            self.store.write(&golden_path, screenshot)?;
            let notice = (!request.update_goldens).then(|| {
                format!(
                    "Golden file {filename} was updated. \
                     You can remove \"write: true\" in the call to compare."
                )
            });
            return Ok(CompareOutcome::Updated {
                path: golden_path,
                notice,
            });
        }

        if !self.store.exists(&golden_path) {
            let message = format!(
                "Golden file {filename} does not exist.\n\
                 Expected it at {path}.\n\
                 To create it call compare('{filename}', write: true) \
                 or run with UPDATE_GOLDENS=1.",
                path = golden_path.display(),
            );
            return Ok(CompareOutcome::MissingGolden {
                path: golden_path,
                message,
            });
        }

        let golden = self.store.read(&golden_path)?;
        let result = diff(&golden, screenshot, &request.policy)?;
        if result.is_match() {
            info!("Golden matched");
            return Ok(CompareOutcome::Matched);
        }

        let artifacts = report(
            basename(&filename),
            &self.results_dir,
            screenshot,
            &result,
            &golden,
        )?;
        let message = compose_message(
            &filename,
            &result,
            request.failure_threshold,
            &golden_path,
            &artifacts,
        );
        let mismatch = Mismatch {
            diff_rate: result.mismatch_rate,
            diff_pixels: result.diff_pixels,
            total_pixels: result.total_pixels,
            threshold: request.failure_threshold,
            artifacts,
            message,
        };

        if mismatch.is_tolerated() {
            warn!(
                report = %mismatch.artifacts.report.display(),
                "Tolerated golden drift. {}",
                describe_rate(mismatch.diff_rate, mismatch.threshold)
            );
        }
        Ok(CompareOutcome::Mismatched(mismatch))
    }

    /// Wait for pending uploads. Call once at the end of a run.
    pub async fn flush_uploads(&mut self) {
        self.publisher.flush().await;
    }
}

/// One-shot comparison returning `"OK"` or a diagnostic.
///
/// Goldens default to `goldens/`; artifacts go to `RESULTS_DIR` or
/// `test_results/`. The CI context comes from the process environment. Any
/// upload keeps running in the background after this returns.
#[expect(clippy::too_many_arguments)]
pub async fn compare_image(
    screenshot: &RgbaImage,
    update_goldens: bool,
    filename: &str,
    policy: ComparisonPolicy,
    failure_threshold: f64,
    client: Option<Arc<dyn GoldClient>>,
    goldens_dir: Option<&Path>,
    filename_suffix: Option<&str>,
    write: bool,
) -> Result<String, CompareError> {
    let results_dir = std::env::var_os("RESULTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
    let store = GoldenStore::new(goldens_dir.unwrap_or(Path::new(DEFAULT_GOLDENS_DIR)));
    let publisher = CiPublisher::new(CiContext::current(), client, results_dir.join("gold"));

    let request = CompareRequest::new(filename)
        .policy(policy)
        .failure_threshold(failure_threshold)
        .update_goldens(update_goldens)
        .write(write)
        .suffix(filename_suffix.unwrap_or_default());

    let mut comparator = GoldenComparator::new(store, results_dir, publisher);
    let outcome = comparator.compare(screenshot, &request).await?;
    Ok(outcome.result_message())
}
