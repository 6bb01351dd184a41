//! Publishing screenshots to a remote golden-image review service.
//!
//! Uploads never influence a comparison verdict. [`CiPublisher::publish`]
//! stages the screenshot on disk, hands the upload to a detached tokio task
//! and returns immediately; failures are logged and dropped.
//!
//! # Backends
//!
//! - [`GoldctlClient`] drives the `goldctl` command line tool.
//! - [`HttpGoldClient`] talks to a review service over HTTP.
//! - [`MockGoldClient`] records calls in memory for tests.

mod goldctl;
mod http;
mod mock;
mod traits;
mod types;

pub use goldctl::{GoldctlClient, GoldctlConfig, TryjobInfo};
pub use http::{HttpGoldClient, POLICY_HEADER};
pub use mock::{MockGoldClient, RecordedUpload};
pub use traits::GoldClient;
pub use types::{PublishError, UploadKind, UploadRequest};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument as _, info, info_span, warn};

use crate::ci::CiContext;
use crate::policy::ComparisonPolicy;
use crate::store::encode_png;

/// Sends screenshots to the review service according to the CI context.
pub struct CiPublisher {
    context: CiContext,
    client: Option<Arc<dyn GoldClient>>,
    work_dir: PathBuf,
    uploads: Vec<JoinHandle<()>>,
}

impl CiPublisher {
    pub fn new(
        context: CiContext,
        client: Option<Arc<dyn GoldClient>>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            context,
            client,
            work_dir: work_dir.into(),
            uploads: Vec::new(),
        }
    }

    /// A publisher that never uploads.
    pub fn disabled() -> Self {
        Self::new(CiContext::Local, None, PathBuf::new())
    }

    pub fn context(&self) -> CiContext {
        self.context
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Number of uploads started and not yet awaited by [`Self::flush`].
    pub fn pending(&self) -> usize {
        self.uploads.len()
    }

    /// Start the upload matching the CI context, if any.
    ///
    /// The upload runs on the current tokio runtime. Returns the kind of
    /// upload that was started; `None` locally, without a client, outside a
    /// runtime, or when the screenshot could not be staged.
    pub fn publish(
        &mut self,
        filename: &str,
        screenshot: &RgbaImage,
        policy: ComparisonPolicy,
    ) -> Option<UploadKind> {
        let kind = match self.context {
            CiContext::Local => return None,
            CiContext::PreSubmit => UploadKind::Tryjob,
            CiContext::PostSubmit => UploadKind::Ingest,
        };
        let client = Arc::clone(self.client.as_ref()?);
        let Ok(runtime) = Handle::try_current() else {
            warn!(filename, "No tokio runtime, skipping screenshot upload");
            return None;
        };

        let png_file = self.work_dir.join(filename);
        if let Err(e) = stage(screenshot, &png_file) {
            warn!(filename, error = %e, "Failed to stage screenshot for upload");
            return None;
        }

        let request = UploadRequest::new(filename, png_file).with_policy(policy);
        let span = info_span!("upload", %kind, filename, client = client.name());
        let handle = runtime.spawn(
            async move {
                let result = match kind {
                    UploadKind::Tryjob => client.tryjob_add(request).await,
                    UploadKind::Ingest => client.imgtest_add(request).await,
                };
                match result {
                    Ok(()) => info!("Uploaded screenshot"),
                    Err(e) => warn!(error = %e, "Screenshot upload failed"),
                }
            }
            .instrument(span),
        );
        self.uploads.push(handle);
        Some(kind)
    }

    /// Wait for every upload started so far.
    pub async fn flush(&mut self) {
        for handle in self.uploads.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Upload task did not complete");
            }
        }
    }
}

fn stage(screenshot: &RgbaImage, png_file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = png_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = encode_png(screenshot, png_file)?;
    fs::write(png_file, bytes)?;
    Ok(())
}
