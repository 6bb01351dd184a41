//! Upload request and error types.

use std::fmt::Display;
use std::path::PathBuf;

use crate::policy::ComparisonPolicy;
use crate::store::basename;

/// Which remote call an upload maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Provisional upload tied to a change under review.
    Tryjob,
    /// Permanent upload that may become the new baseline.
    Ingest,
}

impl Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tryjob => write!(f, "tryjob"),
            Self::Ingest => write!(f, "ingest"),
        }
    }
}

/// A screenshot ready to be sent to the review service.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Golden filename, suffix included.
    pub filename: String,
    /// Local PNG holding the screenshot.
    pub png_file: PathBuf,
    /// Policy the local comparison uses, forwarded as a matching hint.
    pub policy: ComparisonPolicy,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, png_file: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            png_file: png_file.into(),
            policy: ComparisonPolicy::Precise,
        }
    }

    pub fn with_policy(mut self, policy: ComparisonPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Test name on the review service: the filename without extension.
    pub fn test_name(&self) -> &str {
        basename(&self.filename)
    }
}

/// Error type for uploads. Never surfaces as a comparison failure.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Tool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Review service rejected {filename} with status {status}: {body}")]
    Rejected {
        filename: String,
        status: u16,
        body: String,
    },

    #[error("No review identifiers for tryjob upload of {filename}, refusing to ingest it as a baseline")]
    MissingTryjob { filename: String },

    #[error("Invalid review service URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
