//! Navigation entry point.
//!
//! Turns a navigation event into an optional redirect action:
//! normalize → match → record trigger → emit. Persistence of the updated
//! throttle records happens after the decision and never changes it.
//!
//! Also handles the host's action-button click, which may show the redirect
//! count notice.

use crate::context::{RedirectContext, ThrottleSnapshot};
use crate::matcher::MatchOutcome;
use crate::normalize::normalize;
use crate::settings::flag_enabled;
use crate::storage::{KeyValueStore, KEY_FREQ_TRACK, KEY_REDIRECT_COUNT, KEY_USER_TRACKING};
use crate::types::{TabId, Timestamp};
use log::{debug, error, info};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Instruction for the host to send `tab_id` to `url` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectAction {
    pub tab_id: TabId,
    /// Destination, scheme included
    pub url: String,
    /// Key of the rule that fired
    pub rule_key: String,
}

/// Receives user-facing notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notification sink that writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, message: &str) {
        info!("{}", message);
    }
}

/// Handles navigation events against a shared [`RedirectContext`].
pub struct RedirectController {
    context: Arc<RedirectContext>,
    store: Option<Arc<dyn KeyValueStore>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    /// Revision of the last throttle snapshot written to `store`
    persisted: Mutex<u64>,
}

impl RedirectController {
    pub fn new(context: Arc<RedirectContext>) -> Self {
        Self {
            context,
            store: None,
            notifier: None,
            persisted: Mutex::new(0),
        }
    }

    /// Persist throttle records to `store` after every trigger.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Send the redirect count notice to `notifier` on action clicks.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn context(&self) -> &Arc<RedirectContext> {
        &self.context
    }

    /// Decide what to do with a navigation of `tab_id` to `url` at `now`.
    ///
    /// `None` covers both "no rule matched" and "matched rule throttled".
    pub fn on_navigate(&self, tab_id: TabId, url: &str, now: Timestamp) -> Option<RedirectAction> {
        let normalized = normalize(url);

        let decision = self.context.decide_recorded(&normalized, now);
        let result = match decision.outcome {
            MatchOutcome::Redirect(result) => result,
            MatchOutcome::Throttled { key } => {
                debug!("Rule '{}' matched {} but is throttled", key, normalized);
                return None;
            }
            MatchOutcome::NoMatch => return None,
        };

        debug!(
            "Tab {}: rule '{}' redirects {} to {}",
            tab_id, result.key, normalized, result.target
        );

        if let Some(snapshot) = decision.throttle {
            self.persist_throttle(snapshot);
        }

        Some(RedirectAction {
            tab_id,
            url: result.target,
            rule_key: result.key,
        })
    }

    /// Handle a click on the host's action button.
    ///
    /// Sends the redirect count notice when the remote `tracking` setting,
    /// the stored `uTracking` flag and the stored `malware` counter are all
    /// on. Returns whether a notice was sent.
    pub fn on_action_clicked(&self) -> bool {
        let (Some(store), Some(notifier)) = (&self.store, &self.notifier) else {
            return false;
        };

        if !self.context.settings().notifications_enabled() {
            return false;
        }

        let flags = match store.get(&[KEY_USER_TRACKING, KEY_REDIRECT_COUNT]) {
            Ok(flags) => flags,
            Err(e) => {
                error!("Failed to read notice flags: {}", e);
                return false;
            }
        };

        let count = flags.get(KEY_REDIRECT_COUNT);
        if !flag_enabled(flags.get(KEY_USER_TRACKING)) || !flag_enabled(count) {
            return false;
        }

        let count = match count {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return false,
        };
        notifier.notify(&format!("{} navigations redirected", count));
        true
    }

    /// Write `snapshot` unless a newer one already reached storage. The
    /// mutex keeps writes in decision order.
    fn persist_throttle(&self, snapshot: ThrottleSnapshot) {
        let Some(store) = &self.store else {
            return;
        };

        let mut written = self.persisted.lock();
        if snapshot.revision <= *written {
            debug!(
                "Skipping stale throttle snapshot {} (stored {})",
                snapshot.revision, *written
            );
            return;
        }

        let mut values = Map::new();
        values.insert(KEY_FREQ_TRACK.to_string(), snapshot.records);
        match store.set(values) {
            Ok(()) => *written = snapshot.revision,
            Err(e) => error!("Failed to persist throttle records: {}", e),
        }
    }
}
