//! Mock review service client for testing.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::traits::GoldClient;
use super::types::{PublishError, UploadKind, UploadRequest};

/// One call seen by [`MockGoldClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub kind: UploadKind,
    pub filename: String,
    pub png_file: PathBuf,
}

/// In-memory implementation of [`GoldClient`] that records every call.
#[derive(Clone, Default)]
pub struct MockGoldClient {
    calls: Arc<RwLock<Vec<RecordedUpload>>>,
    fail: bool,
}

impl MockGoldClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client that records calls and then reports them as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedUpload> {
        self.calls.read().expect("lock poisoned").clone()
    }

    pub fn count(&self, kind: UploadKind) -> usize {
        self.calls
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|call| call.kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.read().expect("lock poisoned").is_empty()
    }

    fn record(&self, kind: UploadKind, request: UploadRequest) -> Result<(), PublishError> {
        self.calls
            .write()
            .expect("lock poisoned")
            .push(RecordedUpload {
                kind,
                filename: request.filename.clone(),
                png_file: request.png_file,
            });

        if self.fail {
            return Err(PublishError::Rejected {
                filename: request.filename,
                status: 503,
                body: "mock failure".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GoldClient for MockGoldClient {
    async fn tryjob_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.record(UploadKind::Tryjob, request)
    }

    async fn imgtest_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.record(UploadKind::Ingest, request)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_by_kind() {
        let client = MockGoldClient::new();
        client
            .tryjob_add(UploadRequest::new("a.png", "/tmp/a.png"))
            .await
            .unwrap();
        client
            .imgtest_add(UploadRequest::new("b.png", "/tmp/b.png"))
            .await
            .unwrap();

        assert_eq!(client.count(UploadKind::Tryjob), 1);
        assert_eq!(client.count(UploadKind::Ingest), 1);
        assert_eq!(client.calls()[0].filename, "a.png");
    }

    #[tokio::test]
    async fn failing_client_still_records() {
        let client = MockGoldClient::failing();
        let result = client
            .tryjob_add(UploadRequest::new("a.png", "/tmp/a.png"))
            .await;

        assert!(matches!(result, Err(PublishError::Rejected { status: 503, .. })));
        assert!(!client.is_empty());
    }
}
