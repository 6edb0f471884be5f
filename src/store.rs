//! In-memory rule store.
//!
//! Holds the current rule set and its derived referrer map. The store is
//! always replaced wholesale on refresh; nothing in it is edited in place.

use crate::rule::{Rule, RuleError};
use crate::types::Timestamp;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Raw rule records keyed by `pattern_frequencyToken`, in source order.
pub type RawRules = Map<String, Value>;

/// Ordered rule set; iteration order is match precedence.
pub type RuleSet = Vec<Rule>;

/// Rules that carry referrer metadata, keyed like the rule set, with the
/// rule's 4-slot value re-encoded as a JSON string.
pub type ReferrerMap = Map<String, Value>;

/// Result of parsing a raw rule batch.
#[derive(Debug, Default)]
pub struct ParsedRules {
    /// Usable rules, in source order
    pub rules: RuleSet,
    /// Derived referrer map
    pub referrers: ReferrerMap,
    /// Entries that failed validation, with the reason
    pub rejected: Vec<(String, RuleError)>,
}

/// Parse a raw rule batch.
///
/// Bad entries are isolated: each is logged and reported in
/// [`ParsedRules::rejected`], and every other entry stays usable.
pub fn parse_rules(raw: &RawRules) -> ParsedRules {
    let mut parsed = ParsedRules {
        rules: Vec::with_capacity(raw.len()),
        ..Default::default()
    };

    for (key, value) in raw {
        match Rule::parse(key, value) {
            Ok(rule) => {
                if rule.referrer.is_some() {
                    parsed
                        .referrers
                        .insert(key.clone(), Value::String(rule.encode()));
                }
                parsed.rules.push(rule);
            }
            Err(e) => {
                warn!("Skipping malformed rule '{}': {}", key, e);
                parsed.rejected.push((key.clone(), e));
            }
        }
    }

    debug!(
        "Parsed {} rules ({} with referrer, {} rejected)",
        parsed.rules.len(),
        parsed.referrers.len(),
        parsed.rejected.len()
    );

    parsed
}

/// Snapshot of the rules currently in force.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Arc<RuleSet>,
    referrers: Arc<ReferrerMap>,
    loaded_at: Option<Timestamp>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from parsed rules.
    pub fn from_parsed(parsed: ParsedRules, loaded_at: Option<Timestamp>) -> Self {
        Self {
            rules: Arc::new(parsed.rules),
            referrers: Arc::new(parsed.referrers),
            loaded_at,
        }
    }

    /// Parse a freshly fetched batch and build a store from it, returning the
    /// rejected entries alongside.
    pub fn parse(raw: &RawRules, loaded_at: Timestamp) -> (Self, Vec<(String, RuleError)>) {
        Self::parse_with(raw, Some(loaded_at))
    }

    /// Rebuild a store from persisted rules. No fetch happened, so
    /// `loaded_at` stays unset.
    pub fn restore(raw: &RawRules) -> (Self, Vec<(String, RuleError)>) {
        Self::parse_with(raw, None)
    }

    fn parse_with(
        raw: &RawRules,
        loaded_at: Option<Timestamp>,
    ) -> (Self, Vec<(String, RuleError)>) {
        let mut parsed = parse_rules(raw);
        let rejected = std::mem::take(&mut parsed.rejected);
        (Self::from_parsed(parsed, loaded_at), rejected)
    }

    /// Shared handle to the rule set.
    pub fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    /// Shared handle to the referrer map.
    pub fn referrers(&self) -> Arc<ReferrerMap> {
        Arc::clone(&self.referrers)
    }

    /// When this store was built, `None` for an empty initial store.
    pub fn loaded_at(&self) -> Option<Timestamp> {
        self.loaded_at
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find a rule by key.
    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    /// Raw form of the rule set, suitable for persisting under `rules`.
    pub fn to_raw(&self) -> RawRules {
        self.rules
            .iter()
            .map(|rule| (rule.key.clone(), Value::String(rule.encode())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Frequency;
    use chrono::Utc;
    use serde_json::json;

    fn entry(slots: Value) -> Value {
        Value::String(slots.to_string())
    }

    #[test]
    fn test_parse_preserves_source_order() {
        let mut raw = RawRules::new();
        raw.insert("z.test_once".into(), entry(json!(["z", "", null, "once"])));
        raw.insert("a.test_once".into(), entry(json!(["a", "", null, "once"])));
        raw.insert("m.test_once".into(), entry(json!(["m", "", null, "once"])));

        let parsed = parse_rules(&raw);
        let keys: Vec<_> = parsed.rules.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["z.test_once", "a.test_once", "m.test_once"]);
    }

    #[test]
    fn test_referrer_map_only_non_empty() {
        let mut raw = RawRules::new();
        raw.insert("a.test_once".into(), entry(json!(["a", "ref-a", null, "once"])));
        raw.insert("b.test_once".into(), entry(json!(["b", "", null, "once"])));
        raw.insert("c.test_once".into(), entry(json!(["c", null, null, "once"])));

        let parsed = parse_rules(&raw);
        assert_eq!(parsed.rules.len(), 3);
        assert_eq!(parsed.referrers.len(), 1);
        assert_eq!(
            parsed.referrers.get("a.test_once"),
            Some(&Value::String(r#"["a","ref-a",null,"once"]"#.to_string()))
        );
    }

    #[test]
    fn test_one_malformed_entry_keeps_the_other_nine() {
        let mut raw = RawRules::new();
        for i in 0..5 {
            raw.insert(
                format!("site{}.test_once", i),
                entry(json!([format!("t{}", i), "", null, "once"])),
            );
        }
        raw.insert("broken.test_once".into(), json!("[\"missing\", "));
        for i in 5..9 {
            raw.insert(
                format!("site{}.test_per24", i),
                entry(json!([format!("t{}", i), "", null, "per24"])),
            );
        }

        let parsed = parse_rules(&raw);
        assert_eq!(parsed.rules.len(), 9);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].0, "broken.test_once");
        assert!(parsed.rules.iter().all(|r| r.key != "broken.test_once"));
        assert_eq!(parsed.rules[5].frequency, Frequency::Per24h);
    }

    #[test]
    fn test_unknown_frequency_is_local() {
        let mut raw = RawRules::new();
        raw.insert("a.test_weekly".into(), entry(json!(["a", "", null, "weekly"])));
        raw.insert("b.test_once".into(), entry(json!(["b", "", null, "once"])));

        let (store, rejected) = RuleStore::parse(&raw, Utc::now());
        assert_eq!(store.len(), 1);
        assert!(store.get("b.test_once").is_some());
        assert_eq!(
            rejected,
            vec![(
                "a.test_weekly".to_string(),
                RuleError::UnknownFrequency("weekly".to_string())
            )]
        );
    }

    #[test]
    fn test_store_round_trips_to_raw() {
        let mut raw = RawRules::new();
        raw.insert("a.test_once".into(), entry(json!(["a", "r", null, "once"])));

        let (store, _) = RuleStore::parse(&raw, Utc::now());
        assert_eq!(store.to_raw(), raw);
        assert!(store.loaded_at().is_some());
        assert!(RuleStore::new().loaded_at().is_none());
    }

    #[test]
    fn test_restored_store_has_no_load_time() {
        let mut raw = RawRules::new();
        raw.insert("a.test_once".into(), entry(json!(["a", "", null, "once"])));

        let (store, rejected) = RuleStore::restore(&raw);
        assert!(rejected.is_empty());
        assert_eq!(store.len(), 1);
        assert!(store.loaded_at().is_none());
    }
}
