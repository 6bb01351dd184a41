//! `goldctl` backed review client.
//!
//! The tool keeps its state in a work directory. Before the first upload the
//! client authenticates and initializes that directory once; every upload is
//! then a single `imgtest add`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::traits::GoldClient;
use super::types::{PublishError, UploadKind, UploadRequest};
use crate::policy::ComparisonPolicy;

/// Review identifiers for pre-submit uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryjobInfo {
    pub changelist: String,
    pub patchset: String,
    pub job_id: String,
    /// Code review system, e.g. `gerrit` or `github`.
    pub crs: String,
    /// Continuous integration system, e.g. `buildbucket`.
    pub cis: String,
}

impl TryjobInfo {
    /// Parse `<changelist>/<patchset>/<job id>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('/').map(str::trim);
        let (changelist, patchset, job_id) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || [changelist, patchset, job_id].iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            changelist: changelist.to_owned(),
            patchset: patchset.to_owned(),
            job_id: job_id.to_owned(),
            crs: "gerrit".to_owned(),
            cis: "buildbucket".to_owned(),
        })
    }
}

/// Settings for [`GoldctlClient`].
#[derive(Debug, Clone)]
pub struct GoldctlConfig {
    pub binary: PathBuf,
    pub work_dir: PathBuf,
    pub instance: String,
    pub commit: Option<String>,
    pub tryjob: Option<TryjobInfo>,
    /// Extra trace keys describing the test environment.
    pub keys: BTreeMap<String, String>,
}

impl GoldctlConfig {
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert("os".to_owned(), std::env::consts::OS.to_owned());
        keys.insert("arch".to_owned(), std::env::consts::ARCH.to_owned());
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            instance: "goldens".to_owned(),
            commit: None,
            tryjob: None,
            keys,
        }
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_tryjob(mut self, tryjob: Option<TryjobInfo>) -> Self {
        self.tryjob = tryjob;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }

    fn keys_file(&self) -> PathBuf {
        self.work_dir.join("keys.json")
    }

    fn failure_file(&self) -> PathBuf {
        self.work_dir.join("failures.json")
    }
}

/// Drives the `goldctl` command line tool.
pub struct GoldctlClient {
    config: GoldctlConfig,
    session: OnceCell<()>,
}

impl GoldctlClient {
    pub fn new(config: GoldctlConfig) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &GoldctlConfig {
        &self.config
    }

    pub(crate) fn auth_args(&self) -> Vec<OsString> {
        let mut args = args(&["auth", "--work-dir"]);
        args.push(self.config.work_dir.clone().into_os_string());
        args.push("--luci".into());
        args
    }

    pub(crate) fn init_args(&self, kind: UploadKind) -> Vec<OsString> {
        let mut args = args(&["imgtest", "init", "--instance", self.config.instance.as_str()]);
        args.push("--work-dir".into());
        args.push(self.config.work_dir.clone().into_os_string());
        if let Some(commit) = &self.config.commit {
            args.push("--commit".into());
            args.push(commit.into());
        }
        args.push("--keys-file".into());
        args.push(self.config.keys_file().into_os_string());
        args.push("--failure-file".into());
        args.push(self.config.failure_file().into_os_string());

        if kind == UploadKind::Tryjob
            && let Some(tryjob) = &self.config.tryjob
        {
            args.extend(self::args(&[
                "--crs",
                tryjob.crs.as_str(),
                "--changelist",
                tryjob.changelist.as_str(),
                "--patchset",
                tryjob.patchset.as_str(),
                "--cis",
                tryjob.cis.as_str(),
                "--jobid",
                tryjob.job_id.as_str(),
            ]));
        }
        args
    }

    pub(crate) fn add_args(&self, request: &UploadRequest) -> Vec<OsString> {
        let mut args = args(&["imgtest", "add", "--work-dir"]);
        args.push(self.config.work_dir.clone().into_os_string());
        args.push("--test-name".into());
        args.push(request.test_name().into());
        args.push("--png-file".into());
        args.push(request.png_file.clone().into_os_string());

        if let ComparisonPolicy::Fuzzy { max_channel_delta } = request.policy {
            // goldctl sums the deltas of all four channels.
            let pixel_delta = u32::from(max_channel_delta) * 4;
            let delta_key = format!("fuzzy_pixel_delta_threshold:{pixel_delta}");
            args.extend(self::args(&[
                "--add-test-optional-key",
                "image_matching_algorithm:fuzzy",
                "--add-test-optional-key",
                delta_key.as_str(),
            ]));
        }
        args
    }

    async fn ensure_session(&self, kind: UploadKind) -> Result<(), PublishError> {
        self.session
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.config.work_dir).await?;
                let keys = serde_json::to_vec_pretty(&self.config.keys)?;
                tokio::fs::write(self.config.keys_file(), keys).await?;

                self.run(self.auth_args()).await?;
                self.run(self.init_args(kind)).await
            })
            .await
            .map(|_session| ())
    }

    async fn add(&self, kind: UploadKind, request: UploadRequest) -> Result<(), PublishError> {
        // Without review flags goldctl treats the upload as a baseline ingest.
        if kind == UploadKind::Tryjob && self.config.tryjob.is_none() {
            return Err(PublishError::MissingTryjob {
                filename: request.filename,
            });
        }
        self.ensure_session(kind).await?;
        self.run(self.add_args(&request)).await
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), PublishError> {
        let command = describe(&self.config.binary, &args);
        debug!(%command, "Running goldctl");

        let output = Command::new(&self.config.binary)
            .args(&args)
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                program: self.config.binary.display().to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PublishError::Tool {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

#[async_trait]
impl GoldClient for GoldctlClient {
    #[instrument(skip_all, name = "goldctl_tryjob_add", fields(filename = %request.filename))]
    async fn tryjob_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.add(UploadKind::Tryjob, request).await
    }

    #[instrument(skip_all, name = "goldctl_imgtest_add", fields(filename = %request.filename))]
    async fn imgtest_add(&self, request: UploadRequest) -> Result<(), PublishError> {
        self.add(UploadKind::Ingest, request).await
    }

    fn name(&self) -> &'static str {
        "goldctl"
    }
}

fn args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

fn describe(binary: &Path, args: &[OsString]) -> String {
    let mut line = binary.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn client() -> GoldctlClient {
        GoldctlClient::new(
            GoldctlConfig::new("/opt/goldctl", "/work")
                .with_instance("engine")
                .with_commit(Some("abc123".to_owned()))
                .with_tryjob(TryjobInfo::parse("42/3/9001")),
        )
    }

    #[test]
    fn parse_tryjob_triplet() {
        let info = TryjobInfo::parse("42/3/9001").unwrap();
        assert_eq!(info.changelist, "42");
        assert_eq!(info.patchset, "3");
        assert_eq!(info.job_id, "9001");
        assert!(TryjobInfo::parse("42/3").is_none());
        assert!(TryjobInfo::parse("42//9001").is_none());
        assert!(TryjobInfo::parse("1/2/3/4").is_none());
    }

    #[test]
    fn auth_uses_luci_credentials() {
        assert_eq!(
            strings(&client().auth_args()),
            ["auth", "--work-dir", "/work", "--luci"]
        );
    }

    #[test]
    fn ingest_init_has_no_review_flags() {
        let args = strings(&client().init_args(UploadKind::Ingest));
        assert!(args.starts_with(&["imgtest".to_owned(), "init".to_owned()]));
        assert!(args.contains(&"engine".to_owned()));
        assert!(args.contains(&"abc123".to_owned()));
        assert!(!args.contains(&"--changelist".to_owned()));
    }

    #[test]
    fn tryjob_init_carries_review_identifiers() {
        let args = strings(&client().init_args(UploadKind::Tryjob));
        let pos = args.iter().position(|a| a == "--changelist").unwrap();
        assert_eq!(args[pos + 1], "42");
        let pos = args.iter().position(|a| a == "--jobid").unwrap();
        assert_eq!(args[pos + 1], "9001");
    }

    #[test]
    fn add_uses_test_name_without_extension() {
        let request = UploadRequest::new("button_dark.png", "/work/button_dark.png");
        let args = strings(&client().add_args(&request));
        let pos = args.iter().position(|a| a == "--test-name").unwrap();
        assert_eq!(args[pos + 1], "button_dark");
        assert!(!args.iter().any(|a| a.contains("fuzzy")));
    }

    #[test]
    fn fuzzy_policy_adds_matching_keys() {
        let request = UploadRequest::new("a.png", "/work/a.png").with_policy(
            ComparisonPolicy::Fuzzy {
                max_channel_delta: 5,
            },
        );
        let args = strings(&client().add_args(&request));
        assert!(args.contains(&"image_matching_algorithm:fuzzy".to_owned()));
        assert!(args.contains(&"fuzzy_pixel_delta_threshold:20".to_owned()));
    }

    #[tokio::test]
    async fn tryjob_without_review_identifiers_never_runs_goldctl() {
        let work = tempfile::TempDir::new().unwrap();
        let client = GoldctlClient::new(GoldctlConfig::new(
            work.path().join("no-such-goldctl"),
            work.path().join("gold"),
        ));

        let err = client
            .tryjob_add(UploadRequest::new("a.png", work.path().join("a.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingTryjob { .. }));
        assert!(!work.path().join("gold").exists());
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let work = tempfile::TempDir::new().unwrap();
        let client = GoldctlClient::new(GoldctlConfig::new(
            work.path().join("no-such-goldctl"),
            work.path().join("gold"),
        ));

        let err = client
            .imgtest_add(UploadRequest::new("a.png", work.path().join("a.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Spawn { .. }));
        assert!(work.path().join("gold").join("keys.json").is_file());
    }
}
