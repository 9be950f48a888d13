//! Page Ranks Configuration
//!
//! Server-side configuration values are loaded from environment variables.

use crate::error::SettingsError;
use std::env;
use std::time::Duration;
use validator::Validate;

/// Default external endpoint serving the table/graph payload
pub const DEFAULT_DATA_URL: &str = "https://miusage.com/v1/challenge/2/static/";

/// Plugin configuration loaded from environment
#[derive(Debug, Clone, Validate)]
pub struct PageRanksConfig {
    /// External data endpoint (from PAGE_RANKS_DATA_URL env var)
    #[validate(url(message = "PAGE_RANKS_DATA_URL must be a valid URL"))]
    pub data_url: String,

    /// Cache time-to-live in seconds (from PAGE_RANKS_CACHE_TTL env var)
    #[validate(range(min = 1, message = "PAGE_RANKS_CACHE_TTL must be positive"))]
    pub cache_ttl: i64,

    /// Outbound fetch timeout in seconds (from PAGE_RANKS_FETCH_TIMEOUT env var)
    #[validate(range(min = 1, max = 300, message = "PAGE_RANKS_FETCH_TIMEOUT must be 1-300"))]
    pub fetch_timeout: u64,

    /// Bulk saves allowed per window and client (from PAGE_RANKS_RATE_LIMIT env var)
    #[validate(range(min = 1, message = "PAGE_RANKS_RATE_LIMIT must be positive"))]
    pub rate_limit: u32,

    /// Rate limit window in seconds (from PAGE_RANKS_RATE_WINDOW env var)
    #[validate(range(min = 1, message = "PAGE_RANKS_RATE_WINDOW must be positive"))]
    pub rate_window: u64,

    /// Address seeded into notification_emails on install (from PAGE_RANKS_ADMIN_EMAIL env var)
    #[validate(email(message = "PAGE_RANKS_ADMIN_EMAIL must be a valid email"))]
    pub admin_email: Option<String>,
}

impl PageRanksConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            data_url: env::var("PAGE_RANKS_DATA_URL")
                .unwrap_or_else(|_| DEFAULT_DATA_URL.to_string()),

            cache_ttl: env::var("PAGE_RANKS_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600), // 1 hour

            fetch_timeout: env::var("PAGE_RANKS_FETCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            rate_limit: env::var("PAGE_RANKS_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            rate_window: env::var("PAGE_RANKS_RATE_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            admin_email: env::var("PAGE_RANKS_ADMIN_EMAIL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SettingsError> {
        Validate::validate(self).map_err(|e| SettingsError::Config(e.to_string()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }
}

impl Default for PageRanksConfig {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            cache_ttl: 3600,
            fetch_timeout: 30,
            rate_limit: 60,
            rate_window: 60,
            admin_email: None,
        }
    }
}

/// Client-side store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// REST namespace root, e.g. `https://example.com/wp-json/page-ranks/v1/`
    pub base_url: String,

    /// Nonce forwarded as `X-WP-Nonce` on every request
    pub nonce: Option<String>,

    /// How long a success message stays visible
    pub success_clear_delay: Duration,

    /// Upper bound on any single request to the plugin routes
    pub request_timeout: Duration,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            nonce: None,
            success_clear_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = PageRanksConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl, 3600);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation_bad_url() {
        let config = PageRanksConfig {
            data_url: "not a url".to_string(),
            ..PageRanksConfig::default()
        };

        assert!(matches!(config.validate(), Err(SettingsError::Config(_))));
    }

    #[test]
    fn test_config_validation_bad_admin_email() {
        let config = PageRanksConfig {
            admin_email: Some("nobody".to_string()),
            ..PageRanksConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_ttl() {
        let config = PageRanksConfig {
            cache_ttl: 0,
            ..PageRanksConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::new("http://localhost/wp-json/page-ranks/v1/").with_nonce("abc");
        assert_eq!(config.nonce.as_deref(), Some("abc"));
        assert_eq!(config.success_clear_delay, Duration::from_millis(3000));
    }
}
