//! Request Extractors
//!
//! Identity is resolved by the host before a request reaches these routes;
//! the host inserts a [`Principal`] into request extensions.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Capability required by every settings and data route
pub const MANAGE_OPTIONS: &str = "manage_options";

/// Authenticated principal as resolved by the host
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub capabilities: Vec<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, capabilities: &[&str]) -> Self {
        Self {
            user_id: user_id.into(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Check whether the principal holds a capability
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn can_manage_options(&self) -> bool {
        self.can(MANAGE_OPTIONS)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "code": "unauthorized",
                    "message": "Authentication required"
                })),
            )
                .into_response()
        })
    }
}

/// Client information (IP, user agent)
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Identifier used for per-client accounting
    pub fn client_id(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                parts
                    .headers
                    .get("X-Real-IP")
                    .and_then(|h| h.to_str().ok())
                    .map(String::from)
            });

        let user_agent = parts
            .headers
            .get("User-Agent")
            .and_then(|h| h.to_str().ok())
            .map(String::from);

        Ok(ClientInfo { ip, user_agent })
    }
}
