//! Remote settings blob.
//!
//! Fetched independently of the rules and consumed only by the surrounding
//! glue (notice gating); the matcher never reads it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Settings as published by the settings source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Reporting mode (0..=3)
    pub reporting: i64,
    /// Reporting schedule in days
    pub schedule: i64,
    /// Tracking flag; the source sends it as either a string or a number
    #[serde(deserialize_with = "string_or_number")]
    pub tracking: String,
    pub amazon: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reporting: 3,
            schedule: 1,
            tracking: "0".to_string(),
            amazon: 1,
        }
    }
}

impl Settings {
    /// Parse the persisted form, which may be the object or a string holding it.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(encoded) => serde_json::from_str(encoded)
                .map_err(|e| format!("Invalid settings JSON: {}", e)),
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other.clone())
                .map_err(|e| format!("Invalid settings: {}", e)),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Whether the remote tracking flag allows user-facing notices.
    pub fn notifications_enabled(&self) -> bool {
        !self.tracking.is_empty() && self.tracking != "0"
    }
}

/// Whether a stored host flag is on. Missing, null, empty, `0` and `"0"`
/// are all off.
pub fn flag_enabled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Bool(b)) => *b,
        Some(_) => true,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
        Value::Null => Ok("0".to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_install_state() {
        let settings = Settings::default();
        assert_eq!(settings.reporting, 3);
        assert_eq!(settings.schedule, 1);
        assert_eq!(settings.tracking, "0");
        assert_eq!(settings.amazon, 1);
        assert!(!settings.notifications_enabled());
    }

    #[test]
    fn test_tracking_accepts_number_or_string() {
        let numeric = Settings::from_json(&json!({"reporting": 1, "schedule": 2, "tracking": 1, "amazon": 0})).unwrap();
        assert_eq!(numeric.tracking, "1");
        assert!(numeric.notifications_enabled());

        let text = Settings::from_json(&json!({"tracking": "0"})).unwrap();
        assert_eq!(text.tracking, "0");
        assert_eq!(text.reporting, 3);
    }

    #[test]
    fn test_from_encoded_string() {
        let encoded = Value::String(r#"{"reporting":3,"schedule":1,"amazon":1,"tracking":0}"#.into());
        assert_eq!(Settings::from_json(&encoded).unwrap(), Settings::default());
    }

    #[test]
    fn test_flag_enabled() {
        assert!(!flag_enabled(None));
        assert!(!flag_enabled(Some(&Value::Null)));
        assert!(!flag_enabled(Some(&json!(0))));
        assert!(!flag_enabled(Some(&json!("0"))));
        assert!(!flag_enabled(Some(&json!(""))));
        assert!(flag_enabled(Some(&json!(1))));
        assert!(flag_enabled(Some(&json!("12"))));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(Settings::from_json(&json!({"reporting": "lots"})).is_err());
    }
}
