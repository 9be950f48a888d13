//! Client-side Settings Store
//!
//! Holds the admin UI's copy of the settings and the external payload, and
//! mediates every read and write against the plugin routes. Each async action
//! moves through `Idle -> Loading -> Success | Error`; the loading state is
//! released even if the caller drops the action midway.
//!
//! Single-field updates are deduplicated by `(key, value)`: while one request
//! for a pair is in flight, identical calls join it instead of issuing another.
//! The request runs on its own task, so it settles and releases its slot even
//! when every caller has gone away.

pub mod api;
mod views;

pub use api::{HttpSettingsApi, SettingsApi};
pub use views::GraphPoint;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{normalize_payload, SettingKey, Settings, SettingsPatch};
use crate::validation::{read_stored_field, settings_from_value};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub const SAVE_SUCCESS_MESSAGE: &str = "Settings saved successfully!";

/// Coarse status of the store's async actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of the store state
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub settings: Settings,
    pub data: Value,
    pub loading: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            data: normalize_payload(Value::Null),
            loading: false,
            error: None,
            success: None,
        }
    }
}

impl StoreState {
    pub fn status(&self) -> ActionStatus {
        if self.loading {
            ActionStatus::Loading
        } else if self.error.is_some() {
            ActionStatus::Error
        } else if self.success.is_some() {
            ActionStatus::Success
        } else {
            ActionStatus::Idle
        }
    }

    fn clear_messages(&mut self) {
        self.error = None;
        self.success = None;
    }
}

type DedupKey = (String, String);
type SharedUpdate = Shared<BoxFuture<'static, Result<Value, StoreError>>>;

struct Inner<A> {
    api: A,
    success_clear_delay: Duration,
    state: RwLock<StoreState>,
    pending: AtomicUsize,
    in_flight: Mutex<HashMap<DedupKey, SharedUpdate>>,
    success_generation: AtomicU64,
}

/// Decrements the pending-action count when an action ends, however it ends
struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client-side settings store
pub struct SettingsStore<A: SettingsApi> {
    inner: Arc<Inner<A>>,
}

impl<A: SettingsApi> Clone for SettingsStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl SettingsStore<HttpSettingsApi> {
    /// Store talking to the plugin routes over HTTP
    pub fn http(config: StoreConfig) -> Result<Self, StoreError> {
        let delay = config.success_clear_delay;
        Ok(Self::new(HttpSettingsApi::new(config)?, delay))
    }
}

impl<A: SettingsApi> SettingsStore<A> {
    pub fn new(api: A, success_clear_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                success_clear_delay,
                state: RwLock::new(StoreState::default()),
                pending: AtomicUsize::new(0),
                in_flight: Mutex::new(HashMap::new()),
                success_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current state snapshot
    pub async fn state(&self) -> StoreState {
        let mut state = self.inner.state.read().await.clone();
        state.loading = self.is_loading();
        state
    }

    pub fn is_loading(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn settings(&self) -> Settings {
        self.inner.state.read().await.settings.clone()
    }

    /// Edit the local settings, e.g. from form inputs, before `save_settings`
    pub async fn edit_settings(&self, edit: impl FnOnce(&mut Settings)) {
        edit(&mut self.inner.state.write().await.settings);
    }

    // ============================================
    // Actions
    // ============================================

    /// Load settings from the server into local state
    pub async fn fetch_settings(&self) -> Result<Settings, StoreError> {
        let _loading = self.begin().await;

        match self.inner.api.get_settings().await {
            Ok(value) => {
                let (settings, _) = settings_from_value(&value);
                self.inner.state.write().await.settings = settings.clone();
                Ok(settings)
            }
            Err(e) => {
                self.set_error(e.user_message("load settings")).await;
                Err(e)
            }
        }
    }

    /// Send the full local settings; apply what the server kept
    pub async fn save_settings(&self) -> Result<SettingsPatch, StoreError> {
        let _loading = self.begin().await;
        let current = self.settings().await;

        match self.inner.api.save_settings(&current).await {
            Ok(response) => {
                self.inner
                    .state
                    .write()
                    .await
                    .settings
                    .merge(&response.settings);
                self.flash_success(SAVE_SUCCESS_MESSAGE).await;
                Ok(response.settings)
            }
            Err(e) => {
                self.set_error(e.user_message("save settings")).await;
                Err(e)
            }
        }
    }

    /// Update one setting, joining an identical in-flight update if any
    pub async fn update_single_setting(&self, key: &str, value: Value) -> Result<Value, StoreError> {
        let dedup_key = (key.to_string(), value.to_string());

        let update = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(&dedup_key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Joining in-flight setting update");
                    existing.clone()
                }
                None => {
                    let task = tokio::spawn(run_update(self.inner.clone(), dedup_key.clone(), value));
                    let update = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(StoreError::Transport(format!("Update task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(dedup_key, update.clone());
                    update
                }
            }
        };

        update.await
    }

    /// Load the external table/graph payload
    pub async fn fetch_data(&self) -> Result<Value, StoreError> {
        let _loading = self.begin().await;

        match self.inner.api.get_data().await {
            Ok(payload) => {
                self.inner.state.write().await.data = normalize_payload(payload.clone());
                Ok(payload)
            }
            Err(e) => {
                self.set_error(e.user_message("load data")).await;
                Err(e)
            }
        }
    }

    // ============================================
    // Messages
    // ============================================

    pub async fn clear_messages(&self) {
        self.inner.state.write().await.clear_messages();
    }

    /// Set a success message that stays until cleared
    pub async fn set_success(&self, message: impl Into<String>) {
        self.inner.success_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.write().await.success = Some(message.into());
    }

    pub async fn set_error(&self, message: impl Into<String>) {
        self.inner.state.write().await.error = Some(message.into());
    }

    /// Set a success message that clears itself after the configured delay
    async fn flash_success(&self, message: &str) {
        let generation = self.inner.success_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.write().await.success = Some(message.to_string());

        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.success_clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            // a newer message owns the slot now
            if inner.success_generation.load(Ordering::SeqCst) == generation {
                inner.state.write().await.success = None;
            }
        });
    }

    async fn begin(&self) -> LoadingGuard<'_> {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        self.clear_messages().await;
        LoadingGuard(&self.inner.pending)
    }
}

/// The single request behind a dedup group
async fn run_update<A: SettingsApi>(
    inner: Arc<Inner<A>>,
    dedup_key: DedupKey,
    value: Value,
) -> Result<Value, StoreError> {
    let (key, _) = &dedup_key;
    inner.state.write().await.clear_messages();

    let outcome = match inner.api.update_setting(key, &value).await {
        Ok(response) => {
            // only this key's field changes; other in-flight keys land independently
            let field = SettingKey::parse(key).and_then(|k| read_stored_field(k, &response.value));
            match field {
                Some(field) => {
                    let mut patch = SettingsPatch::default();
                    field.apply(&mut patch);
                    inner.state.write().await.settings.merge(&patch);
                }
                None => tracing::warn!(key = %key, "Server returned an unusable setting value"),
            }
            Ok(response.value)
        }
        Err(e) => {
            inner.state.write().await.error = Some(e.user_message("update setting"));
            Err(e)
        }
    };

    // settled: the next identical call sends a fresh request
    inner.in_flight.lock().await.remove(&dedup_key);
    outcome
}
