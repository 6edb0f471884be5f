//! Remote sources for rules and settings.
//!
//! The engine only sees the [`RuleSource`] and [`SettingsSource`] traits;
//! [`HttpSource`] is the stock implementation over plain HTTP GETs.

use crate::settings::Settings;
use crate::store::RawRules;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use thiserror::Error;

/// Why a fetch produced nothing usable.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    /// The body was not the expected JSON shape
    #[error("invalid response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Source of raw rule records.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn fetch_rules(&self) -> Result<RawRules, FetchError>;
}

/// Source of the settings blob.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch_settings(&self) -> Result<Settings, FetchError>;
}

/// HTTP implementation of both sources.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    rules_url: String,
    settings_url: String,
}

impl HttpSource {
    pub fn new(
        rules_url: impl Into<String>,
        settings_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            rules_url: rules_url.into(),
            settings_url: settings_url.into(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Fetched {}", url);
        Ok(body)
    }
}

#[async_trait]
impl RuleSource for HttpSource {
    async fn fetch_rules(&self) -> Result<RawRules, FetchError> {
        match self.get_json(&self.rules_url).await? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(FetchError::Body {
                url: self.rules_url.clone(),
                reason: "rule set is not a JSON object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl SettingsSource for HttpSource {
    async fn fetch_settings(&self) -> Result<Settings, FetchError> {
        let body = self.get_json(&self.settings_url).await?;
        Settings::from_json(&body).map_err(|reason| FetchError::Body {
            url: self.settings_url.clone(),
            reason,
        })
    }
}
