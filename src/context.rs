//! Owned engine state shared by navigation handling and refresh.
//!
//! All mutable state lives behind one `RwLock`, so the lookup and the
//! throttle write of a decision happen under the same guard a refresh swap
//! needs. A refresh therefore lands either before or after a decision, never
//! between its lookup and its record.

use crate::matcher::{match_url, MatchOutcome};
use crate::settings::Settings;
use crate::store::{ReferrerMap, RuleSet, RuleStore};
use crate::throttle::ThrottleTracker;
use crate::types::Timestamp;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default)]
struct EngineState {
    store: RuleStore,
    throttle: ThrottleTracker,
    /// Bumped on every throttle mutation
    revision: u64,
    settings: Settings,
}

/// Throttle records as they stood right after one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSnapshot {
    /// Later mutations carry larger revisions
    pub revision: u64,
    /// Persisted `freq_track` form
    pub records: Value,
}

/// Outcome of a decision plus the throttle state it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub outcome: MatchOutcome,
    /// Present only when the decision recorded a trigger
    pub throttle: Option<ThrottleSnapshot>,
}

/// Shared redirect engine context.
#[derive(Debug, Default)]
pub struct RedirectContext {
    state: RwLock<EngineState>,
}

impl RedirectContext {
    /// Create a context with no rules, no throttle records and default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from previously loaded state.
    pub fn with_state(store: RuleStore, throttle: ThrottleTracker, settings: Settings) -> Self {
        Self {
            state: RwLock::new(EngineState {
                store,
                throttle,
                revision: 0,
                settings,
            }),
        }
    }

    /// Match a normalized URL and record the trigger on a redirect, as one
    /// atomic step.
    pub fn decide(&self, normalized_url: &str, now: Timestamp) -> MatchOutcome {
        self.decide_recorded(normalized_url, now).outcome
    }

    /// Like [`decide`](Self::decide), but also returns the throttle records
    /// taken under the same lock when a trigger was recorded.
    pub fn decide_recorded(&self, normalized_url: &str, now: Timestamp) -> Decision {
        let mut state = self.state.write();
        let rules = state.store.rules();
        let outcome = match_url(normalized_url, &rules, &mut state.throttle, now);

        let throttle = if outcome.is_redirect() {
            state.revision += 1;
            Some(ThrottleSnapshot {
                revision: state.revision,
                records: state.throttle.to_json(),
            })
        } else {
            None
        };

        Decision { outcome, throttle }
    }

    /// Replace the rule store wholesale.
    pub fn replace_rules(&self, store: RuleStore) {
        self.state.write().store = store;
    }

    pub fn replace_settings(&self, settings: Settings) {
        self.state.write().settings = settings;
    }

    /// Replace all throttle records.
    pub fn replace_throttle(&self, throttle: ThrottleTracker) {
        let mut state = self.state.write();
        state.throttle = throttle;
        state.revision += 1;
    }

    /// The current rule set; never a partially refreshed one.
    pub fn rules_snapshot(&self) -> Arc<RuleSet> {
        self.state.read().store.rules()
    }

    pub fn referrers_snapshot(&self) -> Arc<ReferrerMap> {
        self.state.read().store.referrers()
    }

    /// Copy of the current store handles.
    pub fn store(&self) -> RuleStore {
        self.state.read().store.clone()
    }

    pub fn throttle_snapshot(&self) -> ThrottleTracker {
        self.state.read().throttle.clone()
    }

    pub fn settings(&self) -> Settings {
        self.state.read().settings.clone()
    }

    /// When the current rule set was loaded.
    pub fn last_refresh(&self) -> Option<Timestamp> {
        self.state.read().store.loaded_at()
    }
}
