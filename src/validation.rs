//! Settings Validation Rules
//!
//! The single rule table shared by bulk saves and single-field updates.

use crate::models::{DateFormat, SettingKey, Settings, SettingsPatch};
use serde_json::{Map, Value};
use validator::ValidateEmail;

pub const MIN_TABLE_ROWS: i64 = 1;
pub const MAX_TABLE_ROWS: i64 = 5;
pub const MIN_EMAILS: usize = 1;
pub const MAX_EMAILS: usize = 5;

/// A validated, normalized setting value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    TableRows(u8),
    DateFormat(DateFormat),
    NotificationEmails(Vec<String>),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::TableRows(rows) => Value::from(*rows),
            FieldValue::DateFormat(format) => Value::from(format.as_str()),
            FieldValue::NotificationEmails(emails) => Value::from(emails.clone()),
        }
    }

    pub fn apply(self, patch: &mut SettingsPatch) {
        match self {
            FieldValue::TableRows(rows) => patch.table_rows = Some(rows),
            FieldValue::DateFormat(format) => patch.date_format = Some(format),
            FieldValue::NotificationEmails(emails) => patch.notification_emails = Some(emails),
        }
    }
}

/// Validate one field; `None` means the value is rejected
pub fn validate_field(key: SettingKey, value: &Value) -> Option<FieldValue> {
    match key {
        SettingKey::TableRows => {
            let rows = coerce_integer(value)?;
            (MIN_TABLE_ROWS..=MAX_TABLE_ROWS)
                .contains(&rows)
                .then(|| FieldValue::TableRows(rows as u8))
        }
        SettingKey::DateFormat => value
            .as_str()
            .and_then(DateFormat::parse)
            .map(FieldValue::DateFormat),
        SettingKey::NotificationEmails => validate_emails(value).map(FieldValue::NotificationEmails),
    }
}

/// Filter a candidate record down to its valid, recognized fields
pub fn filter_candidate(candidate: &Map<String, Value>) -> SettingsPatch {
    let mut patch = SettingsPatch::default();

    for (name, value) in candidate {
        let Some(key) = SettingKey::parse(name) else {
            tracing::debug!(key = %name, "Dropping unknown setting");
            continue;
        };

        match validate_field(key, value) {
            Some(field) => field.apply(&mut patch),
            None => tracing::debug!(key = %key, "Dropping invalid setting"),
        }
    }

    patch
}

/// Read a previously stored or server-sent record, backfilling defaults
///
/// The flag is false when any field was missing or unreadable.
pub fn settings_from_value(value: &Value) -> (Settings, bool) {
    let Value::Object(record) = value else {
        return (Settings::default(), false);
    };

    let mut patch = SettingsPatch::default();
    let mut complete = true;

    for key in SettingKey::ALL {
        match record.get(key.as_str()).and_then(|v| read_stored_field(key, v)) {
            Some(field) => field.apply(&mut patch),
            None => complete = false,
        }
    }

    let mut settings = Settings::default();
    settings.merge(&patch);
    (settings, complete)
}

/// Like [`validate_field`], but an empty notification list is the default, not corruption
pub fn read_stored_field(key: SettingKey, value: &Value) -> Option<FieldValue> {
    match (key, value) {
        (SettingKey::NotificationEmails, Value::Array(list)) if list.is_empty() => {
            Some(FieldValue::NotificationEmails(Vec::new()))
        }
        _ => validate_field(key, value),
    }
}

/// Integer coercion with leading-integer semantics for strings
///
/// `"3"`, `" 3"`, `"3.9"` and `3.9` all coerce to 3. Strings with no
/// leading digits coerce to 0. Arrays and objects do not coerce.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => Some(leading_integer(s)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null => Some(0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<i64>()
        .map(|n| sign * n)
        .unwrap_or(0)
}

fn validate_emails(value: &Value) -> Option<Vec<String>> {
    let entries = value.as_array()?;
    let mut emails = Vec::with_capacity(entries.len());

    for entry in entries {
        let trimmed = entry.as_str()?.trim();
        if trimmed.is_empty() {
            continue;
        }

        let email = trimmed.to_string();
        if !email.validate_email() {
            return None;
        }
        emails.push(email);
    }

    (MIN_EMAILS..=MAX_EMAILS)
        .contains(&emails.len())
        .then_some(emails)
}
