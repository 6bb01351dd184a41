//! Review service client trait.

use async_trait::async_trait;

use super::types::{PublishError, UploadRequest};

/// Generic interface to a remote golden-image review service.
///
/// Both calls must tolerate repeats: sending the same screenshot twice must
/// not corrupt anything on the service side.
#[async_trait]
pub trait GoldClient: Send + Sync + 'static {
    /// Attach a screenshot to the change under review. Leaves the baseline alone.
    async fn tryjob_add(&self, request: UploadRequest) -> Result<(), PublishError>;

    /// Submit a screenshot as a permanent baseline candidate.
    async fn imgtest_add(&self, request: UploadRequest) -> Result<(), PublishError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
