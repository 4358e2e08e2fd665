use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

use super::state_store::{StateStore, StateStoreError};

/// SQLite-backed state store. Each `set` is a single upsert, committed
/// before the call returns.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn new(database_path: &str) -> Result<Self, StateStoreError> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_string = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite://{}?mode=rwc", database_path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&connection_string)
            .await?;

        let db = Self { pool };
        db.initialize_schema().await?;
        tracing::info!(
            "Opened monitor state at {} ({} stored keys)",
            database_path,
            db.key_count().await?
        );

        Ok(db)
    }

    async fn initialize_schema(&self) -> Result<(), StateStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitor_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("✅ Monitor state schema initialized");

        Ok(())
    }

    pub async fn key_count(&self) -> Result<usize, StateStoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM monitor_state")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value FROM monitor_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((raw,)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
        let raw = serde_json::to_string(&value)?;

        sqlx::query(
            r#"
            INSERT INTO monitor_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
