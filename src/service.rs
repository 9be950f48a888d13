//! Settings Service
//!
//! Single source of truth for the persisted settings record and the cached
//! external payload. Both the bulk and the single-field write paths go
//! through the rule table in [`crate::validation`].

use crate::cache::{Clock, DataCache};
use crate::config::PageRanksConfig;
use crate::error::SettingsError;
use crate::models::*;
use crate::options::OptionStore;
use crate::source::DataSource;
use crate::validation::{filter_candidate, settings_from_value, validate_field, FieldValue};

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Settings service
pub struct SettingsService {
    options: Arc<dyn OptionStore>,
    cache: DataCache,
    config: PageRanksConfig,
    // serializes read-merge-write cycles on the settings record
    write_lock: Mutex<()>,
}

impl SettingsService {
    /// Create a new settings service
    pub fn new(
        options: Arc<dyn OptionStore>,
        source: Arc<dyn DataSource>,
        clock: Arc<dyn Clock>,
        config: PageRanksConfig,
    ) -> Self {
        let cache = DataCache::new(options.clone(), source, clock, config.cache_ttl);

        Self {
            options,
            cache,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Get reference to config
    pub fn config(&self) -> &PageRanksConfig {
        &self.config
    }

    // ============================================
    // Settings
    // ============================================

    /// Current settings, backfilling and persisting any missing field
    pub async fn get_settings(&self) -> Settings {
        let _guard = self.write_lock.lock().await;

        let (settings, complete) = match self.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!("Failed to read settings, serving defaults: {}", e);
                return Settings::default();
            }
        };

        if !complete {
            tracing::info!("Backfilling incomplete settings record");
            if let Err(e) = self.persist(&settings).await {
                tracing::error!("Failed to persist backfilled settings: {}", e);
            }
        }

        settings
    }

    /// Validate and persist every valid field of `candidate`
    ///
    /// Invalid and unknown fields are dropped rather than rejected; only a
    /// candidate with no surviving field is an error. Returns what was saved.
    pub async fn save_settings(
        &self,
        candidate: &Map<String, Value>,
    ) -> Result<SettingsPatch, SettingsError> {
        let patch = filter_candidate(candidate);
        if patch.is_empty() {
            return Err(SettingsError::Validation(
                "No valid settings to save".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let (mut settings, _) = self.load().await?;
        settings.merge(&patch);
        self.persist(&settings).await?;

        tracing::info!(
            fields = patch.len(),
            dropped = candidate.len() - patch.len(),
            "Settings saved"
        );

        Ok(patch)
    }

    /// Validate and persist one field, returning its normalized value
    pub async fn update_single_setting(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<Value, SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
        };

        let setting = SettingKey::parse(key).ok_or_else(invalid)?;
        let field = validate_field(setting, value).ok_or_else(invalid)?;
        let normalized = field.to_json();

        let mut patch = SettingsPatch::default();
        field.apply(&mut patch);

        let _guard = self.write_lock.lock().await;
        let (mut settings, _) = self.load().await?;
        settings.merge(&patch);
        self.persist(&settings).await?;

        tracing::info!(key = %setting, "Setting updated");
        Ok(normalized)
    }

    // ============================================
    // External Data
    // ============================================

    /// Cached external payload, refetched once the TTL has elapsed
    pub async fn get_external_data(&self) -> Result<Value, SettingsError> {
        self.cache.get_or_fetch().await
    }

    // ============================================
    // Install / Uninstall
    // ============================================

    /// Seed the settings record on first install and record the version
    pub async fn install(&self) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;

        if self.options.get(SETTINGS_OPTION).await?.is_none() {
            let mut settings = Settings::default();
            if let Some(FieldValue::NotificationEmails(emails)) = self
                .config
                .admin_email
                .as_ref()
                .and_then(|email| {
                    validate_field(SettingKey::NotificationEmails, &Value::from(vec![email.clone()]))
                })
            {
                settings.notification_emails = emails;
            }

            self.persist(&settings).await?;
            tracing::info!("Default settings created");
        }

        self.options
            .set(VERSION_OPTION, Value::from(env!("CARGO_PKG_VERSION")))
            .await
    }

    /// Remove every option this plugin wrote
    pub async fn uninstall(&self) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;

        self.options.delete(SETTINGS_OPTION).await?;
        self.options.delete(VERSION_OPTION).await?;
        self.cache.clear().await?;

        tracing::info!("Page Ranks options removed");
        Ok(())
    }

    // ============================================
    // Storage helpers
    // ============================================

    /// Load the stored record; the flag is false if any field was backfilled
    async fn load(&self) -> Result<(Settings, bool), SettingsError> {
        match self.options.get(SETTINGS_OPTION).await? {
            Some(stored) => Ok(settings_from_value(&stored)),
            None => Ok((Settings::default(), false)),
        }
    }

    async fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        let value =
            serde_json::to_value(settings).map_err(|e| SettingsError::Storage(e.to_string()))?;
        self.options.set(SETTINGS_OPTION, value).await
    }
}
