//! End-to-end tests for the redirect engine.
//!
//! Tests verify:
//! - Frequency policies (once, per24h boundary, always)
//! - First-match-wins ordering
//! - Wildcard translation and scheme defaulting
//! - Isolation of malformed rule entries
//! - Persistence of throttle state across restarts

use chrono::{Duration, TimeZone, Utc};
use redirector::{
    normalize, JsonFileStore, KeyValueStore, RawRules, RedirectContext, RedirectController,
    RefreshService, RuleStore, Settings, ThrottleTracker, Timestamp,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Helper to build a raw rule map from (key, slots) pairs, preserving order.
fn raw_rules(entries: &[(&str, Value)]) -> RawRules {
    entries
        .iter()
        .map(|(key, slots)| (key.to_string(), Value::String(slots.to_string())))
        .collect()
}

fn controller_for(entries: &[(&str, Value)]) -> RedirectController {
    let (store, rejected) = RuleStore::parse(&raw_rules(entries), Utc::now());
    assert!(rejected.is_empty(), "unexpected rejects: {:?}", rejected);
    let context = RedirectContext::with_state(store, ThrottleTracker::new(), Settings::default());
    RedirectController::new(Arc::new(context))
}

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

// ============================================================================
// FREQUENCY POLICY TESTS
// ============================================================================

#[test]
fn test_once_redirects_then_stops() {
    let controller = controller_for(&[("example.com_once", json!(["evil.test", "", null, "once"]))]);

    let first = controller.on_navigate(3, "http://example.com/", t0()).unwrap();
    assert_eq!(first.url, "http://evil.test");
    assert_eq!(first.tab_id, 3);
    assert_eq!(
        controller.context().throttle_snapshot().last_trigger("example.com_once"),
        Some(t0())
    );

    assert!(controller.on_navigate(3, "http://example.com/", t0()).is_none());
}

#[test]
fn test_per24h_exact_boundary_is_throttled() {
    let controller = controller_for(&[("example.com_per24", json!(["t.test", "", null, "per24"]))]);
    let fired_at = t0();

    assert!(controller.on_navigate(1, "example.com", fired_at).is_some());
    assert!(controller
        .on_navigate(1, "example.com", fired_at + Duration::hours(24))
        .is_none());
}

#[test]
fn test_per24h_retriggers_one_second_later() {
    let controller = controller_for(&[("example.com_per24", json!(["t.test", "", null, "per24"]))]);
    let fired_at = t0();
    let later = fired_at + Duration::hours(24) + Duration::seconds(1);

    assert!(controller.on_navigate(1, "example.com", fired_at).is_some());
    assert!(controller.on_navigate(1, "example.com", later).is_some());
    assert_eq!(
        controller.context().throttle_snapshot().last_trigger("example.com_per24"),
        Some(later)
    );
}

#[test]
fn test_always_redirects_every_time() {
    let controller = controller_for(&[("a.test_always", json!(["b.test", "", null, "always"]))]);

    for i in 0..5 {
        assert!(controller
            .on_navigate(i, "https://www.a.test", t0())
            .is_some());
    }
}

// ============================================================================
// PRECEDENCE AND PATTERN TESTS
// ============================================================================

#[test]
fn test_insertion_order_beats_specificity() {
    let controller = controller_for(&[
        ("*example.com*_always", json!(["first.test", "", null, "always"])),
        ("sub.example.com/page_always", json!(["second.test", "", null, "always"])),
    ]);

    let action = controller
        .on_navigate(1, "http://sub.example.com/page", t0())
        .unwrap();
    assert_eq!(action.url, "http://first.test");
    assert_eq!(action.rule_key, "*example.com*_always");
}

#[test]
fn test_reversed_order_flips_winner() {
    let controller = controller_for(&[
        ("sub.example.com/page_always", json!(["second.test", "", null, "always"])),
        ("*example.com*_always", json!(["first.test", "", null, "always"])),
    ]);

    let action = controller
        .on_navigate(1, "http://sub.example.com/page", t0())
        .unwrap();
    assert_eq!(action.url, "http://second.test");
}

#[test]
fn test_wildcard_subdomain_does_not_match_apex() {
    let controller = controller_for(&[("*.example.com_always", json!(["t.test", "", null, "always"]))]);

    assert!(controller.on_navigate(1, "https://mail.example.com/", t0()).is_some());
    // `www.` is stripped before matching, leaving the bare apex
    assert!(controller.on_navigate(1, "https://www.example.com/", t0()).is_none());
    assert!(controller.on_navigate(1, "https://example.com", t0()).is_none());
}

#[test]
fn test_target_scheme_defaulting() {
    let controller = controller_for(&[
        ("a.test_always", json!(["example.org/landing", "", null, "always"])),
        ("b.test_always", json!(["https://example.org", "", null, "always"])),
    ]);

    assert_eq!(
        controller.on_navigate(1, "a.test", t0()).unwrap().url,
        "http://example.org/landing"
    );
    assert_eq!(
        controller.on_navigate(1, "b.test", t0()).unwrap().url,
        "https://example.org"
    );
}

#[test]
fn test_normalize_is_idempotent() {
    for url in [
        "https://www.example.com/",
        "http://sub.example.com/page/",
        "www.example.com/a/b",
        "https://example.org/landing?x=1#frag",
        "",
    ] {
        let once = normalize(url);
        assert_eq!(normalize(&once), once);
    }
}

// ============================================================================
// MALFORMED ENTRY TESTS
// ============================================================================

#[test]
fn test_nine_valid_rules_survive_one_malformed() {
    let mut raw = RawRules::new();
    for i in 0..9 {
        raw.insert(
            format!("site{}.test_always", i),
            Value::String(json!([format!("dest{}.test", i), "", null, "always"]).to_string()),
        );
        if i == 4 {
            raw.insert("broken.test_once".to_string(), json!(["not", "encoded"]));
        }
    }

    let (store, rejected) = RuleStore::parse(&raw, Utc::now());
    assert_eq!(store.len(), 9);
    assert_eq!(rejected.len(), 1);

    let controller = RedirectController::new(Arc::new(RedirectContext::with_state(
        store,
        ThrottleTracker::new(),
        Settings::default(),
    )));

    for i in 0..9 {
        let action = controller
            .on_navigate(1, &format!("https://site{}.test/", i), t0())
            .unwrap();
        assert_eq!(action.url, format!("http://dest{}.test", i));
    }
    assert!(controller.on_navigate(1, "broken.test", t0()).is_none());
}

// ============================================================================
// PERSISTENCE TESTS
// ============================================================================

#[test]
fn test_throttle_survives_restart() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("state.json");

    {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        let mut values = Map::new();
        values.insert(
            "rules".to_string(),
            Value::Object(raw_rules(&[(
                "example.com_once",
                json!(["evil.test", "", null, "once"]),
            )])),
        );
        store.set(values).unwrap();

        let context = Arc::new(RefreshService::restore(store.as_ref()).unwrap());
        let controller = RedirectController::new(context).with_store(store);
        assert!(controller.on_navigate(1, "example.com", t0()).is_some());
    }

    let store = JsonFileStore::open(&path).unwrap();
    let context = Arc::new(RefreshService::restore(&store).unwrap());
    assert_eq!(
        context.throttle_snapshot().last_trigger("example.com_once"),
        Some(t0())
    );

    let controller = RedirectController::new(context);
    assert!(controller
        .on_navigate(1, "example.com", t0() + Duration::days(30))
        .is_none());
}
