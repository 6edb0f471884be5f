//! # url-redirector
//!
//! Rule matching and throttling engine for navigation redirects.
//!
//! A navigation URL is normalized, tested against an ordered set of
//! glob-style rules, and, when the first matching rule is eligible under its
//! frequency policy, turned into a redirect while the rule's trigger time is
//! recorded.
//!
//! ```text
//! navigation ─▶ RedirectController ─▶ normalize ─▶ match_url ─▶ RedirectAction
//!                        │                           │
//!                        ▼                           ▼
//!                  RedirectContext ── RuleStore + ThrottleTracker
//!                        ▲
//!                 RefreshService ◀── RuleSource / SettingsSource
//! ```
//!
//! Storage, fetching and notification display are collaborators reached
//! through the traits in [`storage`], [`source`] and [`controller`].

pub mod config;
pub mod context;
pub mod controller;
pub mod matcher;
pub mod normalize;
pub mod refresh;
pub mod rule;
pub mod settings;
pub mod source;
pub mod storage;
pub mod store;
pub mod throttle;
pub mod types;

pub use config::AgentConfig;
pub use context::{Decision, RedirectContext, ThrottleSnapshot};
pub use controller::{LogNotifier, NotificationSink, RedirectAction, RedirectController};
pub use matcher::{match_url, MatchOutcome, MatchResult};
pub use normalize::normalize;
pub use refresh::{RefreshReport, RefreshService, RefreshStats};
pub use rule::{Frequency, Rule, RuleError};
pub use settings::Settings;
pub use source::{FetchError, HttpSource, RuleSource, SettingsSource};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use store::{parse_rules, ParsedRules, RawRules, ReferrerMap, RuleSet, RuleStore};
pub use throttle::ThrottleTracker;
pub use types::{TabId, Timestamp};
