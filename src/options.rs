//! Option Storage
//!
//! Persisted key-value options, the way the host site stores plugin settings.

use crate::error::SettingsError;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persisted key-value store keyed by option name
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Read an option, `None` if it was never written
    async fn get(&self, name: &str) -> Result<Option<Value>, SettingsError>;

    /// Write an option; writing an unchanged value still succeeds
    async fn set(&self, name: &str, value: Value) -> Result<(), SettingsError>;

    /// Remove an option if present
    async fn delete(&self, name: &str) -> Result<(), SettingsError>;
}

// ============================================
// In-memory store
// ============================================

/// Process-local option store
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, name: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.options.read().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: Value) -> Result<(), SettingsError> {
        self.options.write().await.insert(name.to_string(), value);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SettingsError> {
        self.options.write().await.remove(name);
        Ok(())
    }
}

// ============================================
// PostgreSQL store
// ============================================

/// Option store backed by the `rustpress_options` table
#[derive(Debug, Clone)]
pub struct PgOptionStore {
    db: PgPool,
}

impl PgOptionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the options table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), SettingsError> {
        tracing::info!("Ensuring rustpress_options table exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rustpress_options (
                name VARCHAR(191) PRIMARY KEY,
                value JSONB NOT NULL,
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OptionStore for PgOptionStore {
    async fn get(&self, name: &str) -> Result<Option<Value>, SettingsError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT value FROM rustpress_options WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.db)
                .await?;

        Ok(row.map(|(Json(value),)| value))
    }

    async fn set(&self, name: &str, value: Value) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            INSERT INTO rustpress_options (name, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(Json(value))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SettingsError> {
        sqlx::query("DELETE FROM rustpress_options WHERE name = $1")
            .bind(name)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
