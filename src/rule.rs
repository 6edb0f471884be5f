//! Redirect rule records and their parsing from raw source entries.
//!
//! A raw rule arrives as a key/value pair:
//!
//! ```text
//! key:   "<pattern>_<frequency token>"        e.g. "*.example.com_once"
//! value: "[target, referrer, reserved, freq]" (a JSON-encoded string)
//! ```
//!
//! Each entry is validated once here into a fixed-shape [`Rule`]; the matcher
//! never indexes into JSON again.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of slots in a raw rule value.
pub const RULE_SLOTS: usize = 4;

const SLOT_TARGET: usize = 0;
const SLOT_REFERRER: usize = 1;
const SLOT_RESERVED: usize = 2;
const SLOT_FREQUENCY: usize = 3;

/// Throttling policy attached to a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// Fire on every match
    Always,
    /// Fire on the first match only, ever
    Once,
    /// Fire at most once per rolling 24 hours
    Per24h,
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "" | "always" => Ok(Frequency::Always),
            "once" => Ok(Frequency::Once),
            "per24" | "per24h" => Ok(Frequency::Per24h),
            other => Err(RuleError::UnknownFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Frequency::Always => "always",
            Frequency::Once => "once",
            Frequency::Per24h => "per24h",
        };
        f.write_str(token)
    }
}

/// Why a single raw rule entry was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The value under the key was not a JSON string
    #[error("rule value is not a string")]
    NotAString,
    /// The string could not be decoded as JSON
    #[error("rule value is not valid JSON: {0}")]
    InvalidJson(String),
    /// The decoded value was not a JSON array
    #[error("rule value is not an array")]
    NotAnArray,
    /// The array had the wrong number of slots
    #[error("rule value has {0} slots, expected 4")]
    WrongArity(usize),
    /// A slot held a value of the wrong type
    #[error("rule slot '{0}' has an invalid type")]
    InvalidField(&'static str),
    /// The frequency token is not one of the known policies
    #[error("unknown frequency token '{0}'")]
    UnknownFrequency(String),
    /// The key pattern did not translate into a valid regular expression
    #[error("pattern '{pattern}' does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A validated redirect rule.
#[derive(Clone, Debug)]
pub struct Rule {
    /// Full rule key, also used as the throttle identifier
    pub key: String,
    /// Glob pattern taken from the key
    pub pattern: String,
    /// Destination as stored (may lack a scheme)
    pub target: String,
    /// Referrer metadata, `None` when absent or empty
    pub referrer: Option<String>,
    /// Slot 2, kept verbatim for re-encoding
    pub reserved: Value,
    /// Throttling policy
    pub frequency: Frequency,
    /// Anchored regex compiled from `pattern`
    matcher: Regex,
    /// Decoded slot array as received
    slots: Value,
}

impl Rule {
    /// Parse one raw entry into a rule.
    pub fn parse(key: &str, raw: &Value) -> Result<Self, RuleError> {
        let encoded = raw.as_str().ok_or(RuleError::NotAString)?;
        let decoded: Value =
            serde_json::from_str(encoded).map_err(|e| RuleError::InvalidJson(e.to_string()))?;
        Self::from_slots(key, &decoded)
    }

    /// Build a rule from an already-decoded slot array.
    pub fn from_slots(key: &str, decoded: &Value) -> Result<Self, RuleError> {
        let slots = decoded.as_array().ok_or(RuleError::NotAnArray)?;
        if slots.len() != RULE_SLOTS {
            return Err(RuleError::WrongArity(slots.len()));
        }

        let target = slots[SLOT_TARGET]
            .as_str()
            .ok_or(RuleError::InvalidField("target"))?
            .to_string();

        let referrer = match &slots[SLOT_REFERRER] {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            _ => return Err(RuleError::InvalidField("referrer")),
        };

        let frequency = match &slots[SLOT_FREQUENCY] {
            Value::Null => Frequency::Always,
            Value::String(token) => token.parse()?,
            _ => return Err(RuleError::InvalidField("frequency")),
        };

        let pattern = pattern_of(key).to_string();
        let matcher = compile_pattern(&pattern)?;

        Ok(Rule {
            key: key.to_string(),
            pattern,
            target,
            referrer,
            reserved: slots[SLOT_RESERVED].clone(),
            frequency,
            matcher,
            slots: decoded.clone(),
        })
    }

    /// Whether a normalized URL matches this rule's pattern.
    #[inline]
    pub fn matches(&self, normalized_url: &str) -> bool {
        self.matcher.is_match(normalized_url)
    }

    /// Destination URL with `http://` prepended when no scheme is present.
    pub fn resolved_target(&self) -> String {
        if self.target.starts_with("http://") || self.target.starts_with("https://") {
            self.target.clone()
        } else {
            format!("http://{}", self.target)
        }
    }

    /// Re-encode the rule as its raw 4-slot JSON string.
    pub fn encode(&self) -> String {
        self.slots.to_string()
    }
}

/// Pattern portion of a rule key: everything before the first `_`.
///
/// A key without `_` has an empty pattern.
pub fn pattern_of(key: &str) -> &str {
    key.split_once('_').map(|(pattern, _)| pattern).unwrap_or("")
}

/// Translate a glob pattern into an anchored regex.
///
/// `.` matches literally and `*` matches any run of characters; every other
/// character is handed to the regex engine unchanged.
pub fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '.' => source.push_str("\\."),
            '*' => source.push_str(".*"),
            other => source.push(other),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
