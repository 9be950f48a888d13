//! Route Middleware
//!
//! Capability checks and sliding-window rate limiting.

use crate::error::SettingsError;
use crate::extractors::{ClientInfo, Principal};

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Require a principal holding `manage_options`
///
/// 401 when the host attached no principal, 403 when it lacks the capability.
pub async fn require_manage_options(
    principal: Principal,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    if !principal.can_manage_options() {
        tracing::warn!(user_id = %principal.user_id, "Permission denied for settings route");
        return Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "code": "forbidden",
                "message": "Sorry, you are not allowed to do that"
            })),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

// ============================================
// Rate Limiting
// ============================================

/// Sliding-window limiter keyed by action and client
///
/// Owned by the router state rather than living in a global.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit; on refusal returns the seconds until a slot frees up
    pub async fn check(&self, action: &str, client: &str) -> Result<usize, u64> {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;

        // forget clients whose whole window has lapsed
        hits.retain(|_, entries| {
            entries
                .back()
                .is_some_and(|t| now.duration_since(*t) < self.window)
        });

        let entries = hits.entry(format!("{}_{}", action, client)).or_default();

        while entries
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            entries.pop_front();
        }

        if entries.len() >= self.limit {
            let retry_after = entries
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(Duration::ZERO)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        entries.push_back(now);
        Ok(self.limit - entries.len())
    }
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    client: ClientInfo,
    req: Request,
    next: Next,
) -> Result<Response, SettingsError> {
    // route template, so path parameters do not mint new keys
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let action = format!("{} {}", req.method(), path);

    let remaining = match limiter.check(&action, client.client_id()).await {
        Ok(remaining) => remaining,
        Err(retry_after) => {
            tracing::warn!(
                client = %client.client_id(),
                user_agent = client.user_agent.as_deref().unwrap_or("-"),
                action = %action,
                "Rate limit exceeded"
            );
            return Err(SettingsError::RateLimited { retry_after });
        }
    };

    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", limiter.limit.into());
    headers.insert("X-RateLimit-Remaining", remaining.into());

    Ok(response)
}
