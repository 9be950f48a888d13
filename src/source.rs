//! External Data Source
//!
//! Outbound fetch of the remote table/graph payload.

use crate::config::PageRanksConfig;
use crate::error::SettingsError;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Something that can produce the external JSON payload
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, SettingsError>;
}

/// HTTP GET against the configured endpoint
pub struct HttpDataSource {
    client: Client,
    url: String,
}

impl HttpDataSource {
    pub fn new(config: &PageRanksConfig) -> Result<Self, SettingsError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(format!(
                "RustPress Page Ranks/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| SettingsError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: config.data_url.clone(),
        })
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self) -> Result<Value, SettingsError> {
        tracing::debug!(url = %self.url, "Fetching external data");

        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %self.url, status = %status, "External API returned an error status");
            return Err(SettingsError::Upstream(format!("HTTP {}", status.as_u16())));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!("Invalid JSON from external API: {}", e);
            SettingsError::Upstream("Invalid JSON response from external API".to_string())
        })
    }
}
