//! Page Ranks Models
//!
//! Settings record, partial patches, cache entries, and request/response DTOs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option name holding the settings record
pub const SETTINGS_OPTION: &str = "page_ranks_settings";

/// Option name holding the installed plugin version
pub const VERSION_OPTION: &str = "page_ranks_version";

/// Key under which the external payload snapshot is stored
pub const DATA_CACHE_KEY: &str = "page_ranks_external_data";

// ============================================
// Settings
// ============================================

/// How dates are rendered in the table view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    #[default]
    Human,
    Timestamp,
}

impl DateFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(DateFormat::Human),
            "timestamp" => Some(DateFormat::Timestamp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::Human => "human",
            DateFormat::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three recognized setting keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    TableRows,
    DateFormat,
    NotificationEmails,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [
        SettingKey::TableRows,
        SettingKey::DateFormat,
        SettingKey::NotificationEmails,
    ];

    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "table_rows" => Some(SettingKey::TableRows),
            "date_format" => Some(SettingKey::DateFormat),
            "notification_emails" => Some(SettingKey::NotificationEmails),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::TableRows => "table_rows",
            SettingKey::DateFormat => "date_format",
            SettingKey::NotificationEmails => "notification_emails",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Complete persisted settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub table_rows: u8,
    pub date_format: DateFormat,
    pub notification_emails: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            table_rows: 3,
            date_format: DateFormat::Human,
            notification_emails: Vec::new(),
        }
    }
}

impl Settings {
    /// Overwrite the fields present in `patch`
    pub fn merge(&mut self, patch: &SettingsPatch) {
        if let Some(rows) = patch.table_rows {
            self.table_rows = rows;
        }
        if let Some(format) = patch.date_format {
            self.date_format = format;
        }
        if let Some(emails) = &patch.notification_emails {
            self.notification_emails = emails.clone();
        }
    }
}

/// Partial settings record; only present fields are serialized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_emails: Option<Vec<String>>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.table_rows.is_none() && self.date_format.is_none() && self.notification_emails.is_none()
    }

    pub fn len(&self) -> usize {
        [
            self.table_rows.is_some(),
            self.date_format.is_some(),
            self.notification_emails.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

// ============================================
// External Data Cache
// ============================================

/// Snapshot of the external payload with its fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age-based freshness; an entry exactly `ttl_secs` old is still fresh
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_secs: i64) -> bool {
        now - self.fetched_at <= Duration::seconds(ttl_secs)
    }
}

/// Ensure the payload is an object carrying `table` and `graph` keys
pub fn normalize_payload(payload: Value) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for key in ["table", "graph"] {
        if map.get(key).map_or(true, Value::is_null) {
            map.insert(key.to_string(), Value::Object(Map::new()));
        }
    }
    Value::Object(map)
}

// ============================================
// Request DTOs
// ============================================

/// POST /settings body
#[derive(Debug, Clone, Deserialize)]
pub struct SaveSettingsRequest {
    #[serde(default)]
    pub settings: Value,
}

/// POST /setting/:key body
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingRequest {
    #[serde(default)]
    pub value: Value,
}

// ============================================
// Response DTOs
// ============================================

/// POST /settings response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSettingsResponse {
    pub success: bool,
    pub message: String,
    pub settings: SettingsPatch,
}

/// POST /setting/:key response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingResponse {
    pub success: bool,
    pub message: String,
    pub value: Value,
}

/// GET /status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.table_rows, 3);
        assert_eq!(settings.date_format, DateFormat::Human);
        assert!(settings.notification_emails.is_empty());
    }

    #[test]
    fn test_merge_only_touches_present_fields() {
        let mut settings = Settings {
            table_rows: 4,
            date_format: DateFormat::Human,
            notification_emails: vec!["a@b.com".into()],
        };
        settings.merge(&SettingsPatch {
            date_format: Some(DateFormat::Timestamp),
            ..Default::default()
        });

        assert_eq!(settings.table_rows, 4);
        assert_eq!(settings.date_format, DateFormat::Timestamp);
        assert_eq!(settings.notification_emails, vec!["a@b.com".to_string()]);
    }

    #[test]
    fn test_patch_serializes_present_fields_only() {
        let patch = SettingsPatch {
            date_format: Some(DateFormat::Human),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"date_format": "human"}));
        assert_eq!(patch.len(), 1);
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_cache_entry_freshness_boundary() {
        let fetched_at = Utc::now();
        let entry = CacheEntry {
            payload: json!({}),
            fetched_at,
        };
        assert!(entry.is_fresh(fetched_at + Duration::seconds(3600), 3600));
        assert!(!entry.is_fresh(fetched_at + Duration::seconds(3601), 3600));
        // sub-second age past the ttl is already stale
        assert!(!entry.is_fresh(fetched_at + Duration::milliseconds(3_600_900), 3600));
    }

    #[test]
    fn test_normalize_payload() {
        assert_eq!(
            normalize_payload(json!({"table": {"title": "T"}})),
            json!({"table": {"title": "T"}, "graph": {}})
        );
        assert_eq!(normalize_payload(json!([1, 2])), json!({"table": {}, "graph": {}}));
    }
}
