//! RustPress Page Ranks Plugin
//!
//! Settings synchronization and external data caching for the Page Ranks
//! admin screen:
//! - Validated settings record (table rows, date format, notification emails)
//! - Bulk and single-field updates sharing one rule table
//! - TTL cache in front of the external table/graph endpoint
//! - `manage_options` gated REST routes with per-client bulk-save rate limiting
//! - Client-side store with request deduplication and derived views
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `PAGE_RANKS_DATA_URL` - External data endpoint (default: miusage challenge endpoint)
//! - `PAGE_RANKS_CACHE_TTL` - Cache lifetime in seconds (default: 3600)
//! - `PAGE_RANKS_FETCH_TIMEOUT` - Outbound request timeout in seconds (default: 30)
//! - `PAGE_RANKS_RATE_LIMIT` - Bulk saves allowed per window and client (default: 60)
//! - `PAGE_RANKS_RATE_WINDOW` - Rate limit window in seconds (default: 60)
//! - `PAGE_RANKS_ADMIN_EMAIL` - Seeded into `notification_emails` on install (optional)
//!
//! # Usage
//!
//! ```rust,ignore
//! use rustpress_page_ranks::{PageRanksPlugin, Plugin};
//!
//! let plugin = PageRanksPlugin::new();
//! plugin.activate(db_pool).await?;
//!
//! // Mount under the plugin's REST namespace
//! let router = plugin.router().await.unwrap();
//! let app = Router::new().nest("/wp-json/page-ranks/v1", router);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod options;
pub mod service;
pub mod source;
pub mod store;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use cache::{Clock, DataCache, SystemClock};
pub use config::{PageRanksConfig, StoreConfig};
pub use error::{SettingsError, StoreError};
pub use extractors::{ClientInfo, Principal};
pub use handlers::SettingsState;
pub use middleware::RateLimiter;
pub use models::*;
pub use options::{MemoryOptionStore, OptionStore, PgOptionStore};
pub use service::SettingsService;
pub use source::{DataSource, HttpDataSource};
pub use store::{ActionStatus, HttpSettingsApi, SettingsApi, SettingsStore, StoreState};

use async_trait::async_trait;
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;

// ============================================
// Plugin Types
// ============================================

/// Plugin state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Inactive,
    Active,
    Error,
}

/// Plugin metadata
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Plugin lifecycle trait
#[async_trait]
pub trait Plugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    async fn state(&self) -> PluginState;

    /// Activate against the host database
    async fn activate(&self, db: PgPool) -> Result<(), SettingsError>;

    async fn deactivate(&self) -> Result<(), SettingsError>;

    /// Remove everything the plugin persisted
    async fn uninstall(&self) -> Result<(), SettingsError>;
}

// ============================================
// Page Ranks Plugin
// ============================================

/// Live components created on activation
#[derive(Clone)]
struct Runtime {
    service: Arc<SettingsService>,
    limiter: Arc<RateLimiter>,
}

/// RustPress Page Ranks Plugin
pub struct PageRanksPlugin {
    info: PluginInfo,
    state: RwLock<PluginState>,
    config: RwLock<Option<PageRanksConfig>>,
    runtime: RwLock<Option<Runtime>>,
}

impl PageRanksPlugin {
    pub fn new() -> Self {
        Self {
            info: PluginInfo {
                id: "rustpress-page-ranks".into(),
                name: "RustPress Page Ranks".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                description: "Validated settings sync and cached page rank data".into(),
            },
            state: RwLock::new(PluginState::Inactive),
            config: RwLock::new(None),
            runtime: RwLock::new(None),
        }
    }

    pub async fn config(&self) -> Option<PageRanksConfig> {
        self.config.read().await.clone()
    }

    /// Settings service, available while active
    pub async fn settings_service(&self) -> Option<Arc<SettingsService>> {
        self.runtime.read().await.as_ref().map(|rt| rt.service.clone())
    }

    /// Router for the plugin's REST namespace, available while active
    pub async fn router(&self) -> Option<Router> {
        self.runtime
            .read()
            .await
            .as_ref()
            .map(|rt| create_routes(rt.service.clone(), rt.limiter.clone()))
    }

    /// Activate on top of any option store with an explicit configuration
    pub async fn activate_with(
        &self,
        options: Arc<dyn OptionStore>,
        config: PageRanksConfig,
    ) -> Result<(), SettingsError> {
        match self.start(options, config).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("Page Ranks activation failed: {}", e);
                *self.state.write().await = PluginState::Error;
                Err(e)
            }
        }
    }

    async fn start(
        &self,
        options: Arc<dyn OptionStore>,
        config: PageRanksConfig,
    ) -> Result<(), SettingsError> {
        config.validate()?;

        let source = HttpDataSource::new(&config)?;
        let service = Arc::new(SettingsService::new(
            options,
            Arc::new(source),
            Arc::new(SystemClock),
            config.clone(),
        ));
        service.install().await?;

        let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_window()));

        *self.config.write().await = Some(config);
        *self.runtime.write().await = Some(Runtime { service, limiter });
        *self.state.write().await = PluginState::Active;

        tracing::info!("RustPress Page Ranks plugin activated successfully");
        Ok(())
    }
}

impl Default for PageRanksPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PageRanksPlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    async fn state(&self) -> PluginState {
        *self.state.read().await
    }

    async fn activate(&self, db: PgPool) -> Result<(), SettingsError> {
        tracing::info!("Activating RustPress Page Ranks plugin");

        let options = PgOptionStore::new(db);
        options.migrate().await?;

        self.activate_with(Arc::new(options), PageRanksConfig::from_env())
            .await
    }

    async fn deactivate(&self) -> Result<(), SettingsError> {
        tracing::info!("Deactivating RustPress Page Ranks plugin");

        *self.runtime.write().await = None;
        *self.config.write().await = None;
        *self.state.write().await = PluginState::Inactive;

        Ok(())
    }

    async fn uninstall(&self) -> Result<(), SettingsError> {
        let service = self
            .settings_service()
            .await
            .ok_or_else(|| SettingsError::Config("Plugin is not active".to_string()))?;

        service.uninstall().await?;
        self.deactivate().await
    }
}

/// Create the Page Ranks routes
pub fn create_routes(service: Arc<SettingsService>, limiter: Arc<RateLimiter>) -> Router {
    handlers::create_routes(service, limiter)
}

// ============================================
// Module Tests
// ============================================
