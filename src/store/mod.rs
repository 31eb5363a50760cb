// store/mod.rs — SQLite persistence for the advisor session.
//
// Mirrors the original two-entry local-storage contract: the `app_state`
// table holds exactly two keys, `selected_product_ids` (JSON array of
// integers) and `chat_history` (JSON array of chat messages). Both entries
// are best-effort: a corrupt value is discarded with a WARN log and replaced
// by empty state, never propagated as a hard failure.

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use tracing::warn;

use crate::advisor::ChatMessage;
use crate::error::AdvisorError;

/// Key for the persisted selection set.
pub const SELECTED_KEY: &str = "selected_product_ids";
/// Key for the persisted chat transcript.
pub const HISTORY_KEY: &str = "chat_history";

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking an interaction indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) `{data_dir}/glowd.db` in WAL mode.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("glowd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS app_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .context("failed to create app_state table")?;
        Ok(Self { pool })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let pool = self.pool.clone();
        let key = key.to_owned();
        with_timeout(async move {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
                    .bind(&key)
                    .fetch_optional(&pool)
                    .await?;
            Ok(row.map(|(v,)| v))
        })
        .await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let pool = self.pool.clone();
        let key = key.to_owned();
        let value = value.to_owned();
        with_timeout(async move {
            sqlx::query(
                "INSERT INTO app_state (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
            )
            .bind(&key)
            .bind(&value)
            .bind(Utc::now().to_rfc3339())
            .execute(&pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let pool = self.pool.clone();
        let key = key.to_owned();
        with_timeout(async move {
            sqlx::query("DELETE FROM app_state WHERE key = ?")
                .bind(&key)
                .execute(&pool)
                .await?;
            Ok(())
        })
        .await
    }

    // ─── Selection set ────────────────────────────────────────────────────────

    /// Load the persisted selection set. Missing → empty. Corrupt → the entry
    /// is discarded, a warning is logged, and empty is returned.
    pub async fn load_selection(&self) -> Vec<i64> {
        match self.get(SELECTED_KEY).await {
            Ok(Some(raw)) => match decode_ids(&raw) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(err = %e, "persisted selection is corrupt — resetting to empty");
                    let _ = self.delete(SELECTED_KEY).await;
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(err = %e, "failed to read persisted selection — starting empty");
                Vec::new()
            }
        }
    }

    /// Persist the selection set. Failures are logged, not fatal.
    pub async fn save_selection(&self, ids: &[i64]) {
        if let Err(e) = self.put(SELECTED_KEY, &encode_ids(ids)).await {
            warn!(err = %e, "failed to persist selection set");
        }
    }

    // ─── Transcript ───────────────────────────────────────────────────────────

    /// Load the persisted transcript. Same tolerance rules as the selection.
    pub async fn load_transcript(&self) -> Vec<ChatMessage> {
        match self.get(HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(err = %e, "persisted transcript is corrupt — resetting to empty");
                    let _ = self.delete(HISTORY_KEY).await;
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(err = %e, "failed to read persisted transcript — starting empty");
                Vec::new()
            }
        }
    }

    /// Persist the full transcript verbatim. Failures are logged, not fatal.
    pub async fn save_transcript(&self, messages: &[ChatMessage]) {
        match serde_json::to_string(messages) {
            Ok(raw) => {
                if let Err(e) = self.put(HISTORY_KEY, &raw).await {
                    warn!(err = %e, "failed to persist transcript");
                }
            }
            Err(e) => warn!(err = %e, "failed to serialize transcript"),
        }
    }
}

/// Serialize a selection set to its stored JSON form.
pub fn encode_ids(ids: &[i64]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

/// Parse a stored selection set.
pub fn decode_ids(raw: &str) -> Result<Vec<i64>, AdvisorError> {
    serde_json::from_str(raw)
        .map_err(|e| AdvisorError::Persistence(format!("selection entry is not an id array: {e}")))
}
