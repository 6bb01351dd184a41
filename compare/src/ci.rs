//! CI execution context.
//!
//! Three environment variables decide where a run happens:
//!
//! | `SWARMING_TASK_ID` | `GOLDCTL` | `GOLD_TRYJOB` | context |
//! |---|---|---|---|
//! | set | set | set | [`CiContext::PreSubmit`] |
//! | set | set | unset | [`CiContext::PostSubmit`] |
//! | otherwise | | | [`CiContext::Local`] |
//!
//! Only presence matters, an empty value still counts as set.

use std::ffi::OsString;
use std::fmt::Display;
use std::sync::OnceLock;

use tracing::debug;

/// The environment signals that determine [`CiContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiSignals {
    /// CI task identifier.
    pub swarming_task_id: Option<String>,
    /// Path to the `goldctl` tool; doubles as the credential signal.
    pub goldctl: Option<String>,
    /// Present only for jobs attached to a change under review.
    pub gold_tryjob: Option<String>,
}

impl CiSignals {
    /// Read the signals from a key/value snapshot. Unrelated keys are ignored.
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut signals = Self::default();
        for (key, value) in iter {
            let slot = match key.as_ref() {
                "SWARMING_TASK_ID" => &mut signals.swarming_task_id,
                "GOLDCTL" => &mut signals.goldctl,
                "GOLD_TRYJOB" => &mut signals.gold_tryjob,
                _ => continue,
            };
            *slot = Some(value.as_ref().to_owned());
        }
        signals
    }

    pub fn is_ci(&self) -> bool {
        self.swarming_task_id.is_some() && self.goldctl.is_some()
    }
}

/// Where the current process is running, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiContext {
    /// Developer machine or any run without both CI signals.
    Local,
    /// CI job for a change still under review.
    PreSubmit,
    /// CI job for a change that has landed.
    PostSubmit,
}

impl CiContext {
    /// Classify a set of signals.
    pub fn classify(signals: &CiSignals) -> Self {
        if !signals.is_ci() {
            Self::Local
        } else if signals.gold_tryjob.is_some() {
            Self::PreSubmit
        } else {
            Self::PostSubmit
        }
    }

    /// Classify an injected environment snapshot.
    pub fn from_env_iter<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::classify(&CiSignals::from_env_iter(iter))
    }

    /// The context of this process, classified on first use.
    pub fn current() -> Self {
        static CURRENT: OnceLock<CiContext> = OnceLock::new();
        *CURRENT.get_or_init(|| {
            let context = Self::from_env_iter(process_env());
            debug!(%context, "Classified CI context");
            context
        })
    }

    pub fn is_ci(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// The process environment, minus pairs that are not valid Unicode.
pub fn process_env() -> impl Iterator<Item = (String, String)> {
    utf8_pairs(std::env::vars_os())
}

fn utf8_pairs<I>(iter: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    iter.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!(key = ?key, "Skipping non-Unicode environment variable");
                None
            }
        })
}

impl Display for CiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::PreSubmit => write!(f, "pre-submit"),
            Self::PostSubmit => write!(f, "post-submit"),
        }
    }
}
