//! Page Ranks Error Types
//!
//! Centralized error handling for settings, cache and transport failures.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Server-side settings errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid value for setting: {key}")]
    InvalidValue { key: String },

    #[error("Settings must be an object")]
    InvalidSettings,

    #[error("Failed to fetch external data: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Too many requests. Please try again later")]
    RateLimited { retry_after: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SettingsError {
    /// Machine-readable error code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            SettingsError::Validation(_) => "save_failed",
            SettingsError::InvalidValue { .. } => "invalid_setting",
            SettingsError::InvalidSettings => "invalid_settings",
            SettingsError::Upstream(_) => "api_error",
            SettingsError::Storage(_) => "storage_error",
            SettingsError::RateLimited { .. } => "rate_limited",
            SettingsError::Config(_) => "configuration_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SettingsError::Validation(_)
            | SettingsError::InvalidValue { .. }
            | SettingsError::InvalidSettings => StatusCode::BAD_REQUEST,
            SettingsError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SettingsError::Upstream(_) | SettingsError::Storage(_) | SettingsError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SettingsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            SettingsError::Storage(_) => "An internal error occurred".to_string(),
            _ => self.to_string(),
        };

        let body = Json(serde_json::json!({
            "code": self.code(),
            "message": message
        }));

        match self {
            SettingsError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<sqlx::Error> for SettingsError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        SettingsError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for SettingsError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("External fetch error: {:?}", err);
        SettingsError::Upstream(err.to_string())
    }
}

/// Client-side store errors
///
/// `Server` means a response came back with a failure status; `Transport`
/// means nothing usable reached or returned from the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Server responded with HTTP {status}")]
    Server { status: u16, message: Option<String> },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Human-readable message for the UI, given what the action was doing
    pub fn user_message(&self, action: &str) -> String {
        match self {
            StoreError::Server {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            StoreError::Server { status, .. } => format!("HTTP {}: Failed to {}", status, action),
            StoreError::Transport(_) => "Network error: Please check your connection".to_string(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        tracing::debug!("Store transport error: {:?}", err);
        StoreError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SettingsError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SettingsError::InvalidValue { key: "table_rows".into() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SettingsError::Upstream("down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_value_names_key() {
        let err = SettingsError::InvalidValue {
            key: "notification_emails".into(),
        };
        assert_eq!(err.to_string(), "Invalid value for setting: notification_emails");
        assert_eq!(err.code(), "invalid_setting");
    }

    #[test]
    fn test_store_error_messages() {
        let server = StoreError::Server {
            status: 400,
            message: Some("No valid settings to save".into()),
        };
        assert_eq!(server.user_message("save settings"), "No valid settings to save");

        let bare = StoreError::Server {
            status: 502,
            message: None,
        };
        assert_eq!(bare.user_message("load data"), "HTTP 502: Failed to load data");

        let transport = StoreError::Transport("connection refused".into());
        assert_eq!(
            transport.user_message("load settings"),
            "Network error: Please check your connection"
        );
    }
}
