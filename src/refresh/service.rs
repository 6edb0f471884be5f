//! Rule and settings refresh service.
//!
//! Fetches from the configured sources and swaps the results into the
//! shared context. A failed fetch leaves the current state in place; the
//! engine keeps redirecting with whatever it already holds.

use crate::context::RedirectContext;
use crate::settings::Settings;
use crate::source::{RuleSource, SettingsSource};
use crate::storage::{KeyValueStore, KEY_FREQ_TRACK, KEY_REFERRER, KEY_RULES, KEY_SETTINGS};
use crate::store::RuleStore;
use crate::throttle::ThrottleTracker;
use crate::types::{now, now_ms};
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Statistics from a rule refresh.
#[derive(Debug, Clone)]
pub struct RefreshStats {
    /// Number of rules now in force
    pub rules_loaded: usize,
    /// Number of entries rejected as malformed
    pub rules_rejected: usize,
    /// Number of rules carrying referrer metadata
    pub referrers: usize,
    /// Duration of refresh operation in milliseconds
    pub duration_ms: u64,
    /// Timestamp of refresh
    pub timestamp: u64,
}

/// Outcome of a full refresh; each half fails independently.
#[derive(Debug)]
pub struct RefreshReport {
    pub rules: Result<RefreshStats, String>,
    pub settings: Result<Settings, String>,
}

/// Refresh service.
pub struct RefreshService {
    context: Arc<RedirectContext>,
    rules: Arc<dyn RuleSource>,
    settings: Arc<dyn SettingsSource>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl RefreshService {
    /// Create a new refresh service.
    pub fn new(
        context: Arc<RedirectContext>,
        rules: Arc<dyn RuleSource>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            context,
            rules,
            settings,
            store: None,
        }
    }

    /// Persist refreshed state to `store`.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Refresh rules, then settings.
    ///
    /// The settings fetch runs even when the rule fetch fails.
    pub async fn refresh_all(&self) -> RefreshReport {
        let rules = self.refresh_rules().await;
        let settings = self.refresh_settings().await;
        RefreshReport { rules, settings }
    }

    /// Fetch the rule set and replace the current one.
    ///
    /// **Algorithm**:
    /// - Fetch the raw rule map
    /// - Parse it, isolating malformed entries
    /// - Swap the new store into the context in one step
    /// - Persist the raw rules and the derived referrer map
    pub async fn refresh_rules(&self) -> Result<RefreshStats, String> {
        let start = now_ms();

        let raw = match self.rules.fetch_rules().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Rule refresh failed, keeping current rules: {}", e);
                return Err(e.to_string());
            }
        };

        let (store, rejected) = RuleStore::parse(&raw, now());
        let stats = RefreshStats {
            rules_loaded: store.len(),
            rules_rejected: rejected.len(),
            referrers: store.referrers().len(),
            duration_ms: 0,
            timestamp: 0,
        };

        let mut values = Map::new();
        values.insert(KEY_RULES.to_string(), Value::Object(store.to_raw()));
        values.insert(
            KEY_REFERRER.to_string(),
            Value::Object((*store.referrers()).clone()),
        );

        self.context.replace_rules(store);
        self.persist(values);

        let duration_ms = now_ms().saturating_sub(start);
        info!(
            "Rule refresh completed: {} rules loaded, {} rejected in {}ms",
            stats.rules_loaded, stats.rules_rejected, duration_ms
        );

        Ok(RefreshStats {
            duration_ms,
            timestamp: now_ms(),
            ..stats
        })
    }

    /// Fetch the settings blob and replace the current one.
    pub async fn refresh_settings(&self) -> Result<Settings, String> {
        let settings = match self.settings.fetch_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Settings refresh failed, keeping current settings: {}", e);
                return Err(e.to_string());
            }
        };

        self.context.replace_settings(settings.clone());

        let mut values = Map::new();
        values.insert(KEY_SETTINGS.to_string(), settings.to_json());
        self.persist(values);

        Ok(settings)
    }

    /// Rebuild engine state from `store`.
    ///
    /// Missing keys fall back to empty rules, no throttle records and
    /// default settings. Unreadable values are logged and treated as missing.
    pub fn restore(store: &dyn KeyValueStore) -> Result<RedirectContext, String> {
        let values = store.get(&[KEY_RULES, KEY_FREQ_TRACK, KEY_SETTINGS])?;

        let rules = match values.get(KEY_RULES) {
            Some(Value::Object(raw)) => {
                let (rules, rejected) = RuleStore::restore(raw);
                if !rejected.is_empty() {
                    warn!("{} persisted rules could not be restored", rejected.len());
                }
                rules
            }
            Some(_) => {
                warn!("Persisted rules are not a JSON object, starting empty");
                RuleStore::new()
            }
            None => RuleStore::new(),
        };

        let throttle = values
            .get(KEY_FREQ_TRACK)
            .map(ThrottleTracker::from_json)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("Ignoring persisted throttle records: {}", e);
                None
            })
            .unwrap_or_default();

        let settings = values
            .get(KEY_SETTINGS)
            .map(Settings::from_json)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("Ignoring persisted settings: {}", e);
                None
            })
            .unwrap_or_default();

        info!(
            "Restored {} rules and {} throttle records",
            rules.len(),
            throttle.len()
        );

        Ok(RedirectContext::with_state(rules, throttle, settings))
    }

    fn persist(&self, values: Map<String, Value>) {
        if let Some(store) = &self.store {
            if let Err(e) = store.set(values) {
                error!("Failed to persist refreshed state: {}", e);
            }
        }
    }
}
