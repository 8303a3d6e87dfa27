//! Persisted sync progress for the annotation journal.
//!
//! A single row in SQLite holds the whole checkpoint. It is read once when a
//! sync starts and written back after every state transition, so the row is
//! always consistent with the documents written so far.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::Result;

pub type Pool = SqlitePool;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// End of the last fully completed sync window.
    pub last_sync: Option<DateTime<Utc>>,
    /// Start of the sync currently in flight. Becomes `last_sync` on completion.
    pub continuation_time: Option<DateTime<Utc>>,
    /// Present only while a sync is mid-flight.
    pub continuation_token: Option<String>,
}

impl Checkpoint {
    pub fn is_resuming(&self) -> bool {
        self.continuation_token.is_some()
    }

    /// Lower bound for the journal query, in epoch milliseconds.
    pub fn newer_than_millis(&self) -> i64 {
        self.last_sync.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    /// Anchor a fresh sync at `now`.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.continuation_time = Some(now);
        self.continuation_token = None;
    }

    /// Record the cursor of the next page.
    pub fn advance(&mut self, token: String) {
        self.continuation_token = Some(token);
    }

    /// Close the window: the anchored start time becomes the new lower bound.
    pub fn complete(&mut self) {
        self.continuation_token = None;
        if let Some(started) = self.continuation_time {
            self.last_sync = Some(started);
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Checkpoint>;
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Append `mode=rwc` to file-backed URLs so the database is created on first
/// use, and make sure the parent directory exists.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }
    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    if let Some(parent) = std::path::Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{path_part}");
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

#[derive(Debug, Clone)]
pub struct SqliteCheckpointStore {
    pool: Pool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    #[instrument(skip_all)]
    async fn load(&self) -> Result<Checkpoint> {
        let row: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<String>)> =
            sqlx::query_as(
                "SELECT last_sync, continuation_time, continuation_token FROM sync_checkpoint WHERE id = 1",
            )
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|(last_sync, continuation_time, continuation_token)| Checkpoint {
                last_sync,
                continuation_time,
                continuation_token,
            })
            .unwrap_or_default())
    }

    #[instrument(skip_all)]
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_checkpoint (id, last_sync, continuation_time, continuation_token, updated_at)
             VALUES (1, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                last_sync = excluded.last_sync,
                continuation_time = excluded.continuation_time,
                continuation_token = excluded.continuation_token,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(checkpoint.last_sync)
        .bind(checkpoint.continuation_time)
        .bind(checkpoint.continuation_token.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
