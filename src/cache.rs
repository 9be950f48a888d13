//! External Data Cache
//!
//! A single TTL-bound snapshot of the external payload, stored as an option.
//! Expiry is absolute from fetch time. Failed fetches are never cached.

use crate::error::SettingsError;
use crate::models::{normalize_payload, CacheEntry, DATA_CACHE_KEY};
use crate::options::OptionStore;
use crate::source::DataSource;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct DataCache {
    options: Arc<dyn OptionStore>,
    source: Arc<dyn DataSource>,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
}

impl DataCache {
    pub fn new(
        options: Arc<dyn OptionStore>,
        source: Arc<dyn DataSource>,
        clock: Arc<dyn Clock>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            options,
            source,
            clock,
            ttl_secs,
        }
    }

    /// Return the cached payload while fresh, otherwise refetch and store it
    pub async fn get_or_fetch(&self) -> Result<Value, SettingsError> {
        let now = self.clock.now();

        if let Some(entry) = self.cached().await {
            if entry.is_fresh(now, self.ttl_secs) {
                tracing::debug!(fetched_at = %entry.fetched_at, "Serving cached external data");
                return Ok(entry.payload);
            }
        }

        let payload = normalize_payload(self.source.fetch().await?);
        let entry = CacheEntry {
            payload: payload.clone(),
            fetched_at: self.clock.now(),
        };

        let stored = serde_json::to_value(&entry)
            .map_err(|e| SettingsError::Storage(e.to_string()))?;
        if let Err(e) = self.options.set(DATA_CACHE_KEY, stored).await {
            // the fetched payload is still good for this request
            tracing::warn!("Failed to store external data cache: {}", e);
        }

        tracing::info!("External data refreshed");
        Ok(payload)
    }

    /// Drop the cached entry
    pub async fn clear(&self) -> Result<(), SettingsError> {
        self.options.delete(DATA_CACHE_KEY).await
    }

    async fn cached(&self) -> Option<CacheEntry> {
        match self.options.get(DATA_CACHE_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value)
                .map_err(|e| tracing::warn!("Discarding unreadable cache entry: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read external data cache: {}", e);
                None
            }
        }
    }
}
