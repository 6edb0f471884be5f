//! Redirect decision engine.
//!
//! Rules are tried in stored order and the first rule whose pattern matches
//! governs the decision. If that rule is throttled, the decision is "no
//! redirect" and later rules are not consulted.

use crate::rule::Rule;
use crate::throttle::ThrottleTracker;
use crate::types::Timestamp;

/// A redirect chosen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Key of the rule that fired
    pub key: String,
    /// Destination URL, scheme included
    pub target: String,
}

/// Outcome of matching one URL against a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A rule matched and was eligible; its trigger has been recorded
    Redirect(MatchResult),
    /// The first matching rule was throttled
    Throttled { key: String },
    /// No rule pattern matched
    NoMatch,
}

impl MatchOutcome {
    /// The redirect, if any.
    pub fn into_result(self) -> Option<MatchResult> {
        match self {
            MatchOutcome::Redirect(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, MatchOutcome::Redirect(_))
    }
}

/// Match a normalized URL against `rules`.
///
/// On a redirect the rule's trigger is recorded in `throttle` with `now`;
/// no other outcome touches the tracker.
pub fn match_url(
    normalized_url: &str,
    rules: &[Rule],
    throttle: &mut ThrottleTracker,
    now: Timestamp,
) -> MatchOutcome {
    let rule = match rules.iter().find(|rule| rule.matches(normalized_url)) {
        Some(rule) => rule,
        None => return MatchOutcome::NoMatch,
    };

    if !throttle.is_eligible(&rule.key, rule.frequency, now) {
        return MatchOutcome::Throttled {
            key: rule.key.clone(),
        };
    }

    throttle.record_trigger(&rule.key, now);

    MatchOutcome::Redirect(MatchResult {
        key: rule.key.clone(),
        target: rule.resolved_target(),
    })
}
