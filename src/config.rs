//! Agent configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_RULES_URL: &str = "REDIRECTOR_RULES_URL";
pub const ENV_SETTINGS_URL: &str = "REDIRECTOR_SETTINGS_URL";
pub const ENV_STORE_PATH: &str = "REDIRECTOR_STORE_PATH";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "REDIRECTOR_FETCH_TIMEOUT_SECS";

/// Where rules come from and where state is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Endpoint returning the rule map
    pub rules_url: String,
    /// Endpoint returning the settings blob
    pub settings_url: String,
    /// JSON state file
    pub store_path: PathBuf,
    /// Per-request timeout for both endpoints
    pub fetch_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            rules_url: "http://localhost:8000/rules".to_string(),
            settings_url: "http://localhost:8000/settings".to_string(),
            store_path: PathBuf::from("./var/data/redirector.json"),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by any `REDIRECTOR_*` variables that are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            rules_url: lookup(ENV_RULES_URL).unwrap_or(defaults.rules_url),
            settings_url: lookup(ENV_SETTINGS_URL).unwrap_or(defaults.settings_url),
            store_path: lookup(ENV_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            fetch_timeout: lookup(ENV_FETCH_TIMEOUT_SECS)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
        }
    }
}
