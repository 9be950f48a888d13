//! Page Ranks HTTP Handlers
//!
//! REST API endpoints for settings and the cached external data.

use crate::error::SettingsError;
use crate::middleware::{self, RateLimiter};
use crate::models::*;
use crate::service::SettingsService;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Shared settings service state
pub type SettingsState = Arc<SettingsService>;

// ============================================
// Route Builder
// ============================================

/// Create the plugin routes
///
/// Every route except `/status` requires `manage_options`. Bulk saves are
/// also rate limited per client; single-field updates follow every control
/// change and are not.
pub fn create_routes(service: Arc<SettingsService>, limiter: Arc<RateLimiter>) -> Router {
    let public = Router::new().route("/status", get(status));

    let reads = Router::new()
        .route("/settings", get(get_settings))
        .route("/data", get(get_data))
        .route("/setting/:key", post(update_setting));

    let bulk = Router::new()
        .route("/settings", post(save_settings))
        .layer(axum_middleware::from_fn_with_state(limiter, middleware::rate_limit));

    let protected = Router::new()
        .merge(reads)
        .merge(bulk)
        .layer(axum_middleware::from_fn(middleware::require_manage_options));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(service)
}

// ============================================
// Settings
// ============================================

/// GET /settings
///
/// Current settings with defaults backfilled
pub async fn get_settings(State(service): State<SettingsState>) -> impl IntoResponse {
    Json(service.get_settings().await)
}

/// POST /settings
///
/// Save every valid field of `{settings: {...}}`
pub async fn save_settings(
    State(service): State<SettingsState>,
    body: Result<Json<SaveSettingsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SettingsError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!("Rejected settings body: {}", e);
        SettingsError::InvalidSettings
    })?;

    let Value::Object(candidate) = req.settings else {
        return Err(SettingsError::InvalidSettings);
    };

    let saved = service.save_settings(&candidate).await?;

    Ok(Json(SaveSettingsResponse {
        success: true,
        message: "Settings saved successfully".to_string(),
        settings: saved,
    }))
}

/// POST /setting/:key
///
/// Update a single setting from `{value: ...}`
pub async fn update_setting(
    State(service): State<SettingsState>,
    Path(key): Path<String>,
    body: Result<Json<UpdateSettingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SettingsError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(key = %key, "Rejected setting body: {}", e);
        SettingsError::InvalidValue { key: key.clone() }
    })?;

    let value = service.update_single_setting(&key, &req.value).await?;

    Ok(Json(UpdateSettingResponse {
        success: true,
        message: format!("Setting {} updated successfully", key),
        value,
    }))
}

// ============================================
// External Data
// ============================================

/// GET /data
///
/// External table/graph payload, cached for the configured TTL
pub async fn get_data(
    State(service): State<SettingsState>,
) -> Result<impl IntoResponse, SettingsError> {
    let payload = service.get_external_data().await.map_err(|e| {
        tracing::error!("External data unavailable: {}", e);
        e
    })?;

    Ok(Json(payload))
}

// ============================================
// Status
// ============================================

/// GET /status
///
/// Public liveness check for the REST namespace
pub async fn status() -> impl IntoResponse {
    Json(StatusResponse {
        message: "Page Ranks REST API is working".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageRanksConfig;
    use crate::extractors::{Principal, MANAGE_OPTIONS};
    use crate::options::{MemoryOptionStore, OptionStore};
    use crate::test_support::{ManualClock, MockSource};

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        options: Arc<MemoryOptionStore>,
        source: Arc<MockSource>,
    }

    fn harness(rate_limit: u32) -> Harness {
        let options = Arc::new(MemoryOptionStore::new());
        let source = Arc::new(MockSource::ok(json!({
            "table": {"title": "Top Pages", "data": {"headers": ["ID"], "rows": []}}
        })));
        let service = Arc::new(SettingsService::new(
            options.clone(),
            source.clone(),
            Arc::new(ManualClock::new()),
            PageRanksConfig::default(),
        ));
        let limiter = Arc::new(RateLimiter::new(rate_limit, Duration::from_secs(60)));

        Harness {
            router: create_routes(service, limiter),
            options,
            source,
        }
    }

    fn request(method: &str, uri: &str, body: Option<Value>, capabilities: &[&str]) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", "198.51.100.4");
        if !capabilities.is_empty() {
            builder = builder.extension(Principal::new("1", capabilities));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        builder.body(body).unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_get_settings_returns_defaults() {
        let h = harness(10);

        let (status, body) = send(&h.router, request("GET", "/settings", None, &[MANAGE_OPTIONS])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"table_rows": 3, "date_format": "human", "notification_emails": []})
        );
    }

    #[tokio::test]
    async fn test_permission_required() {
        let h = harness(10);

        let (status, _) = send(&h.router, request("GET", "/settings", None, &[])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&h.router, request("GET", "/data", None, &["read"])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, _) = send(&h.router, request("GET", "/status", None, &[])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_save_settings_filters() {
        let h = harness(10);

        let (status, body) = send(
            &h.router,
            request(
                "POST",
                "/settings",
                Some(json!({"settings": {"table_rows": 7, "date_format": "timestamp", "x": 1}})),
                &[MANAGE_OPTIONS],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["settings"], json!({"date_format": "timestamp"}));
        assert_eq!(
            h.options.get(SETTINGS_OPTION).await.unwrap().unwrap()["date_format"],
            "timestamp"
        );
    }

    #[tokio::test]
    async fn test_save_settings_rejects_empty_result() {
        let h = harness(10);

        let (status, body) = send(
            &h.router,
            request(
                "POST",
                "/settings",
                Some(json!({"settings": {"table_rows": 9}})),
                &[MANAGE_OPTIONS],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "save_failed");
        assert_eq!(body["message"], "No valid settings to save");

        let (status, body) = send(
            &h.router,
            request("POST", "/settings", Some(json!({"settings": [1]})), &[MANAGE_OPTIONS]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_settings");
    }

    #[tokio::test]
    async fn test_update_single_setting() {
        let h = harness(10);

        let (status, body) = send(
            &h.router,
            request(
                "POST",
                "/setting/notification_emails",
                Some(json!({"value": [" a@example.com"]})),
                &[MANAGE_OPTIONS],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], json!(["a@example.com"]));
        assert_eq!(body["message"], "Setting notification_emails updated successfully");

        let (status, body) = send(
            &h.router,
            request(
                "POST",
                "/setting/notification_emails",
                Some(json!({"value": ["a@b.com", "not-an-email"]})),
                &[MANAGE_OPTIONS],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_setting");
        assert_eq!(body["message"], "Invalid value for setting: notification_emails");
    }

    #[tokio::test]
    async fn test_get_data_cached() {
        let h = harness(10);

        let (status, body) = send(&h.router, request("GET", "/data", None, &[MANAGE_OPTIONS])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["table"]["title"], "Top Pages");
        assert_eq!(body["graph"], json!({}));

        send(&h.router, request("GET", "/data", None, &[MANAGE_OPTIONS])).await;
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_data_upstream_failure() {
        let h = harness(10);
        h.source.fail_with("timed out");

        let (status, body) = send(&h.router, request("GET", "/data", None, &[MANAGE_OPTIONS])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "api_error");
    }

    #[tokio::test]
    async fn test_burst_of_single_updates_is_not_limited() {
        let h = harness(PageRanksConfig::default().rate_limit);

        for i in 0..70 {
            let rows = i % 5 + 1;
            let (status, body) = send(
                &h.router,
                request(
                    "POST",
                    "/setting/table_rows",
                    Some(json!({"value": rows})),
                    &[MANAGE_OPTIONS],
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "update {}", i);
            assert_eq!(body["value"], rows);
        }
    }

    #[tokio::test]
    async fn test_bulk_saves_are_rate_limited() {
        let h = harness(1);
        let body = || Some(json!({"settings": {"table_rows": 2}}));

        let (status, _) = send(
            &h.router,
            request("POST", "/settings", body(), &[MANAGE_OPTIONS]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &h.router,
            request("POST", "/settings", body(), &[MANAGE_OPTIONS]),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "rate_limited");

        // reads are not limited
        let (status, _) = send(&h.router, request("GET", "/settings", None, &[MANAGE_OPTIONS])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let h = harness(10);
        let raw = |uri: &str, body: &'static str| {
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .extension(Principal::new("1", &[MANAGE_OPTIONS]))
                .body(Body::from(body))
                .unwrap()
        };

        let (status, body) = send(&h.router, raw("/settings", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_settings");

        let (status, body) = send(&h.router, raw("/setting/table_rows", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_setting");
        assert_eq!(body["message"], "Invalid value for setting: table_rows");
    }
}
