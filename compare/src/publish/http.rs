//! HTTP review client.
//!
//! Talks to a review service exposing two endpoints:
//!
//! - `PUT  {base}/tryjobs/{filename}` stores the screenshot against the change under review.
//!   Keyed by filename, so repeating it replaces rather than duplicates.
//! - `POST {base}/ingest/{filename}` submits a baseline candidate.
//!
//! Both take the PNG bytes as the request body.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, instrument};

use super::traits::GoldClient;
use super::types::{PublishError, UploadKind, UploadRequest};

/// Header carrying the local comparison policy.
pub const POLICY_HEADER: &str = "x-gold-policy";

/// [`GoldClient`] over plain HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGoldClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpGoldClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with every upload.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL with `filename` percent-encoded as a single path segment.
    pub(crate) fn endpoint(&self, kind: UploadKind, filename: &str) -> Result<Url, PublishError> {
        let invalid = |reason: String| PublishError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        let collection = match kind {
            UploadKind::Tryjob => "tryjobs",
            UploadKind::Ingest => "ingest",
        };
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base URL".to_owned()))?
            .pop_if_empty()
            .push(collection)
            .push(filename);
        Ok(url)
    }

    async fn upload(&self, kind: UploadKind, request: UploadRequest) -> Result<(), PublishError> {
        let url = self.endpoint(kind, &request.filename)?;
        let body = tokio::fs::read(&request.png_file).await?;
        debug!(%url, bytes = body.len(), "Uploading screenshot");

        let builder = match kind {
            UploadKind::Tryjob => self.client.put(url),
            UploadKind::Ingest => self.client.post(url),
        };
        let mut builder = builder
            .header(CONTENT_TYPE, "image/png")
            .header(POLICY_HEADER, request.policy.to_string())
            .body(body);
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Rejected {
            filename: request.filename,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl GoldClient for HttpGoldClient {
    #[instrument(skip_all, name = "http_tryjob_add", fields(filename = %request.filename))]
    async fn tryjob_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.upload(UploadKind::Tryjob, request).await
    }

    #[instrument(skip_all, name = "http_imgtest_add", fields(filename = %request.filename))]
    async fn imgtest_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.upload(UploadKind::Ingest, request).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
