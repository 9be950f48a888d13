//! Store Transport
//!
//! HTTP calls from the client-side store to the plugin routes.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{SaveSettingsResponse, Settings, UpdateSettingResponse};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Requests the store issues against the settings routes
#[async_trait]
pub trait SettingsApi: Send + Sync + 'static {
    /// GET /settings
    async fn get_settings(&self) -> Result<Value, StoreError>;

    /// POST /settings
    async fn save_settings(&self, settings: &Settings) -> Result<SaveSettingsResponse, StoreError>;

    /// POST /setting/:key
    async fn update_setting(&self, key: &str, value: &Value)
        -> Result<UpdateSettingResponse, StoreError>;

    /// GET /data
    async fn get_data(&self) -> Result<Value, StoreError>;
}

/// reqwest-backed transport
pub struct HttpSettingsApi {
    client: Client,
    config: StoreConfig,
}

impl HttpSettingsApi {
    /// Client bounded by `config.request_timeout`; an elapsed request is a `Transport` error
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn with_nonce(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.nonce {
            Some(nonce) => request.header("X-WP-Nonce", nonce),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self
            .with_nonce(request)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        decode(response).await
    }
}

/// Map a response to its body or a `Server` error carrying the body's message
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from));
        return Err(StoreError::Server {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Unexpected response body: {}", e);
        StoreError::Server {
            status: status.as_u16(),
            message: Some("Invalid response from server".to_string()),
        }
    })
}

#[async_trait]
impl SettingsApi for HttpSettingsApi {
    async fn get_settings(&self) -> Result<Value, StoreError> {
        self.send(self.client.get(self.url("settings"))).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<SaveSettingsResponse, StoreError> {
        let body = serde_json::json!({ "settings": settings });
        self.send(self.client.post(self.url("settings")).json(&body))
            .await
    }

    async fn update_setting(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<UpdateSettingResponse, StoreError> {
        let body = serde_json::json!({ "value": value });
        self.send(self.client.post(self.url(&format!("setting/{}", key))).json(&body))
            .await
    }

    async fn get_data(&self) -> Result<Value, StoreError> {
        self.send(self.client.get(self.url("data"))).await
    }
}
