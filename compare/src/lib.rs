//! Golden image comparison for visual regression tests.
//!
//! A screenshot rendered by a test is compared pixel by pixel with an
//! approved golden PNG. Mismatches produce diagnostic artifacts and a
//! readable message; under CI the screenshot is also published to a remote
//! review service without ever affecting the verdict.
//!
//! ```no_run
//! # async fn run(screenshot: image::RgbaImage) -> anyhow::Result<()> {
//! use goldens_compare::{CompareRequest, ComparisonPolicy, Config};
//!
//! let config = Config::init()?;
//! let mut comparator = config.comparator();
//! let request = CompareRequest::new("button.png")
//!     .policy(ComparisonPolicy::fuzzy())
//!     .failure_threshold(0.01);
//!
//! let outcome = comparator.compare(&screenshot, &request).await?;
//! comparator.flush_uploads().await;
//! assert!(!outcome.is_failure(), "{}", outcome.result_message());
//! # Ok(())
//! # }
//! ```

pub mod ci;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod policy;
pub mod publish;
pub mod report;
pub mod store;

pub use ci::{CiContext, CiSignals};
pub use compare::{CompareOutcome, CompareRequest, GoldenComparator, Mismatch, OK, compare_image};
pub use config::Config;
pub use diff::{DiffResult, diff};
pub use error::CompareError;
pub use policy::{ComparisonPolicy, ParsePolicyError};
pub use publish::{CiPublisher, GoldClient, PublishError, UploadKind};
pub use report::ReportArtifacts;
pub use store::GoldenStore;
