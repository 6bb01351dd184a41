use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ci::{CiContext, CiSignals, process_env};
use crate::compare::{DEFAULT_GOLDENS_DIR, DEFAULT_RESULTS_DIR, GoldenComparator};
use crate::publish::{
    CiPublisher, GoldClient, GoldctlClient, GoldctlConfig, HttpGoldClient, TryjobInfo,
};
use crate::store::GoldenStore;

const DEFAULT_GOLD_INSTANCE: &str = "goldens";

// The final, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    goldens_dir: PathBuf,
    results_dir: PathBuf,
    update_goldens: bool,
    // Review service
    gold_work_dir: PathBuf,
    gold_instance: String,
    gold_commit: Option<String>,
    gold_service_url: Option<String>,
    gold_service_token: Option<String>,
    signals: CiSignals,
}

// Environment variables as found, before defaults.
#[derive(Deserialize)]
struct RawConfig {
    goldens_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
    update_goldens: Option<String>,
    gold_work_dir: Option<PathBuf>,
    gold_instance: Option<String>,
    gold_commit: Option<String>,
    gold_service_url: Option<String>,
    gold_service_token: Option<String>,
}

impl Config {
    /// Read the process environment and apply defaults.
    ///
    /// Variables that are not valid Unicode are ignored.
    pub fn init() -> anyhow::Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_env_iter(process_env())
    }

    /// Build a configuration from an explicit key/value snapshot.
    pub fn from_env_iter<I, K, V>(iter: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = iter
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_owned(), v.as_ref().to_owned()))
            .collect();
        let signals = CiSignals::from_env_iter(pairs.iter().map(|(k, v)| (k, v)));
        let raw: RawConfig = serde_env::from_iter(pairs)?;
        Self::from_raw(raw, signals)
    }

    fn from_raw(raw: RawConfig, signals: CiSignals) -> anyhow::Result<Self> {
        let RawConfig {
            goldens_dir,
            results_dir,
            update_goldens,
            gold_work_dir,
            gold_instance,
            gold_commit,
            gold_service_url,
            gold_service_token,
        } = raw;

        let update_goldens = match update_goldens.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(value) => parse_flag(value).ok_or_else(|| {
                anyhow::anyhow!("UPDATE_GOLDENS must be a boolean, got {value:?}")
            })?,
        };

        let results_dir = results_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
        let gold_work_dir = gold_work_dir.unwrap_or_else(|| {
            let dir = results_dir.join("gold");
            info!("GOLD_WORK_DIR not set, defaulting to {}", dir.display());
            dir
        });

        if let Some(url) = &gold_service_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            anyhow::bail!("GOLD_SERVICE_URL must be an http(s) URL, got {url:?}");
        }

        if let Some(tryjob) = &signals.gold_tryjob
            && TryjobInfo::parse(tryjob).is_none()
        {
            warn!(
                "GOLD_TRYJOB {:?} is not <changelist>/<patchset>/<jobid>, goldctl tryjob uploads will be skipped",
                tryjob
            );
        }

        Ok(Self {
            goldens_dir: goldens_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_GOLDENS_DIR)),
            results_dir,
            update_goldens,
            gold_work_dir,
            gold_instance: gold_instance.unwrap_or_else(|| DEFAULT_GOLD_INSTANCE.to_owned()),
            gold_commit,
            gold_service_url,
            gold_service_token,
            signals,
        })
    }

    pub fn goldens_dir(&self) -> &Path {
        &self.goldens_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn update_goldens(&self) -> bool {
        self.update_goldens
    }

    pub fn gold_work_dir(&self) -> &Path {
        &self.gold_work_dir
    }

    pub fn gold_instance(&self) -> &str {
        &self.gold_instance
    }

    pub fn gold_commit(&self) -> Option<&str> {
        self.gold_commit.as_deref()
    }

    pub fn gold_service_url(&self) -> Option<&str> {
        self.gold_service_url.as_deref()
    }

    pub fn signals(&self) -> &CiSignals {
        &self.signals
    }

    pub fn ci_context(&self) -> CiContext {
        CiContext::classify(&self.signals)
    }

    pub fn with_goldens_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.goldens_dir = dir.into();
        self
    }

    /// Also moves the default review work directory along with it.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if self.gold_work_dir == self.results_dir.join("gold") {
            self.gold_work_dir = dir.join("gold");
        }
        self.results_dir = dir;
        self
    }

    /// The review client to publish with.
    ///
    /// `GOLD_SERVICE_URL` selects the HTTP client, otherwise `GOLDCTL`
    /// selects the `goldctl` tool. With neither there is nothing to publish to.
    pub fn client(&self) -> Option<Arc<dyn GoldClient>> {
        if let Some(url) = &self.gold_service_url {
            let client = HttpGoldClient::new(url.as_str()).with_token(self.gold_service_token.clone());
            return Some(Arc::new(client));
        }

        let binary = self.signals.goldctl.as_deref().filter(|b| !b.is_empty())?;
        let tryjob = self
            .signals
            .gold_tryjob
            .as_deref()
            .and_then(TryjobInfo::parse);
        let config = GoldctlConfig::new(binary, &self.gold_work_dir)
            .with_instance(self.gold_instance.as_str())
            .with_commit(self.gold_commit.clone())
            .with_tryjob(tryjob);
        Some(Arc::new(GoldctlClient::new(config)))
    }

    pub fn client_name(&self) -> Option<&'static str> {
        self.client().map(|client| client.name())
    }

    pub fn publisher(&self) -> CiPublisher {
        CiPublisher::new(self.ci_context(), self.client(), &self.gold_work_dir)
    }

    pub fn comparator(&self) -> GoldenComparator {
        GoldenComparator::new(
            GoldenStore::new(&self.goldens_dir),
            &self.results_dir,
            self.publisher(),
        )
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{PublishError, UploadRequest};

    #[test]
    fn defaults_for_an_empty_environment() {
        let config = Config::from_env_iter(Vec::<(&str, &str)>::new())
            .expect("empty environment should build");

        assert_eq!(config.goldens_dir(), Path::new("goldens"));
        assert_eq!(config.results_dir(), Path::new("test_results"));
        assert_eq!(config.gold_work_dir(), Path::new("test_results").join("gold"));
        assert_eq!(config.gold_instance(), "goldens");
        assert!(!config.update_goldens());
        assert_eq!(config.ci_context(), CiContext::Local);
        assert!(config.client().is_none());
    }

    #[test]
    fn directories_and_update_flag_from_env() {
        let config = Config::from_env_iter(vec![
            ("GOLDENS_DIR", "/repo/goldens"),
            ("RESULTS_DIR", "/tmp/out"),
            ("UPDATE_GOLDENS", "1"),
        ])
        .expect("config should build");

        assert_eq!(config.goldens_dir(), Path::new("/repo/goldens"));
        assert_eq!(config.gold_work_dir(), Path::new("/tmp/out").join("gold"));
        assert!(config.update_goldens());
    }

    #[test]
    fn invalid_update_flag_is_rejected() {
        let err = Config::from_env_iter(vec![("UPDATE_GOLDENS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("UPDATE_GOLDENS"));
    }

    #[test]
    fn service_url_selects_http_client() {
        let config = Config::from_env_iter(vec![
            ("GOLD_SERVICE_URL", "https://gold.example.com"),
            ("GOLDCTL", "/opt/goldctl"),
        ])
        .expect("config should build");
        assert_eq!(config.client_name(), Some("http"));
    }

    #[test]
    fn non_http_service_url_is_rejected() {
        let err = Config::from_env_iter(vec![("GOLD_SERVICE_URL", "gold.example.com")]).unwrap_err();
        assert!(err.to_string().contains("GOLD_SERVICE_URL"));
    }

    #[test]
    fn goldctl_path_selects_goldctl_client() {
        let config = Config::from_env_iter(vec![
            ("SWARMING_TASK_ID", "task"),
            ("GOLDCTL", "/opt/goldctl"),
            ("GOLD_TRYJOB", "42/1/7"),
            ("GOLD_INSTANCE", "engine"),
        ])
        .expect("config should build");

        assert_eq!(config.ci_context(), CiContext::PreSubmit);
        assert_eq!(config.client_name(), Some("goldctl"));
        assert_eq!(config.gold_instance(), "engine");
    }

    #[tokio::test]
    async fn empty_tryjob_never_reaches_goldctl() {
        let dir = tempfile::TempDir::new().unwrap();
        let work_dir = dir.path().join("gold");
        let config = Config::from_env_iter(vec![
            ("SWARMING_TASK_ID", "task"),
            ("GOLDCTL", "/definitely/missing/goldctl"),
            ("GOLD_TRYJOB", ""),
            ("GOLD_WORK_DIR", work_dir.to_str().unwrap()),
        ])
        .expect("config should build");
        assert_eq!(config.ci_context(), CiContext::PreSubmit);

        let client = config.client().expect("goldctl client");
        let err = client
            .tryjob_add(UploadRequest::new("a.png", dir.path().join("a.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingTryjob { .. }));
        assert!(!work_dir.exists());
    }

    #[test]
    fn explicit_work_dir_survives_results_override() {
        let config = Config::from_env_iter(vec![("GOLD_WORK_DIR", "/gold")])
            .expect("config should build")
            .with_results_dir("/elsewhere");
        assert_eq!(config.gold_work_dir(), Path::new("/gold"));

        let config = Config::from_env_iter(Vec::<(&str, &str)>::new())
            .expect("config should build")
            .with_results_dir("/elsewhere");
        assert_eq!(config.gold_work_dir(), Path::new("/elsewhere/gold"));
    }
}
