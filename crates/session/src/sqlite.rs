//! SQLite-backed session storage for desktop builds.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::storage::{SessionStorage, StorageKey};

/// Session storage in a single SQLite table.
///
/// This struct is cheap to clone and is safe to share across threads.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create session storage directory at {parent:?}"))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("failed to open session storage at {path:?}"))?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory database (tests/dev).
    pub async fn in_memory() -> anyhow::Result<Self> {
        // Every connection to `:memory:` is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory session storage")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_kv (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create session_kv table")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStorage for SqliteStorage {
    async fn get(&self, key: StorageKey) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value
            FROM session_kv
            WHERE key = ?1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read '{}' from session storage", key.as_str()))?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: StorageKey, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write '{}' to session storage", key.as_str()))?;

        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM session_kv
            WHERE key = ?1
            "#,
        )
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to remove '{}' from session storage", key.as_str()))?;

        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM session_kv")
            .execute(&self.pool)
            .await
            .context("failed to clear session storage")?;

        Ok(())
    }
}

/// Resolve the default path of the session database:
/// `{app_data_dir}/schoolerp/session.db`.
pub fn default_storage_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("schoolerp");
    path.push("session.db");

    Ok(path)
}
