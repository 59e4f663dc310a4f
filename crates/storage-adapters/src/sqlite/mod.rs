//! # SQLite adapter
//!
//! Implements [`ContentRepository`](domains::ContentRepository),
//! [`BanRepository`](domains::BanRepository) and
//! [`AdminRepository`](domains::AdminRepository) over a single `sqlx` pool.
//!
//! Every multi-statement write runs inside one transaction. Media files are
//! only touched after the transaction commits.

mod admins;
mod bans;
mod content;
mod pruner;
mod rows;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use domains::{
    Board, CleanupFailure, Clock, DeletionReport, DomainError, MediaRef, MediaStorage, Result,
};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

pub use pruner::CapacityPruner;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens (creating if needed) the database at `url` and applies migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(storage)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        // writers queue on the lock instead of failing with SQLITE_BUSY
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(storage)?;
    migrate(&pool).await?;
    info!(url, max_connections, "database ready");
    Ok(pool)
}

/// A private in-memory database. One connection that never recycles, since
/// the data lives and dies with it.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(storage)?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(storage)?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|err| DomainError::Storage(format!("migration failed: {err}")))
}

/// `sqlx::Error` is foreign to `domains`, so the conversion is a function.
pub(crate) fn storage(err: sqlx::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    media: Arc<dyn MediaStorage>,
    clock: Arc<dyn Clock>,
    pruner: CapacityPruner,
}

impl SqliteStore {
    pub fn new(
        pool: SqlitePool,
        media: Arc<dyn MediaStorage>,
        clock: Arc<dyn Clock>,
        pruner: CapacityPruner,
    ) -> Self {
        Self { pool, media, clock, pruner }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a board, or renames an existing one with the same slug.
    /// Boards are seed data; the posting flow never creates them.
    pub async fn put_board(&self, slug: &str, name: &str, tag: &str) -> Result<Board> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO boards (slug, name, tag) VALUES (?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET name = excluded.name, tag = excluded.tag
            RETURNING id
            "#,
        )
        .bind(slug)
        .bind(name)
        .bind(tag)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(Board { id, slug: slug.to_string(), name: name.to_string(), tag: tag.to_string() })
    }

    /// Removes files for rows that are already gone. Failures are collected,
    /// never raised: the database deletion stands.
    async fn remove_media(&self, media: &[MediaRef], report: &mut DeletionReport) {
        for item in media {
            match self.media.remove(item).await {
                Ok(()) => report.media_removed += 1,
                Err(DomainError::Cleanup { path, reason }) => {
                    warn!(%path, %reason, "media cleanup failed");
                    report.media_failures.push(CleanupFailure { path, reason });
                }
                Err(err) => {
                    warn!(media = %item.media_name, error = %err, "media cleanup failed");
                    report.media_failures.push(CleanupFailure {
                        path: item.media_name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use domains::ManualClock;

    use super::*;

    /// Records removals; names listed in `fail` report a cleanup error.
    #[derive(Default)]
    pub struct RecordingMedia {
        pub removed: Mutex<Vec<String>>,
        pub fail: Vec<String>,
    }

    #[async_trait]
    impl MediaStorage for RecordingMedia {
        async fn remove(&self, media: &MediaRef) -> Result<()> {
            if self.fail.contains(&media.media_name) {
                return Err(DomainError::Cleanup {
                    path: media.media_name.clone(),
                    reason: "permission denied".into(),
                });
            }
            self.removed.lock().unwrap().push(media.media_name.clone());
            Ok(())
        }
    }

    pub async fn store_with(
        max_threads: u64,
        media: Arc<RecordingMedia>,
    ) -> (SqliteStore, Arc<ManualClock>) {
        let pool = connect_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::at_epoch());
        let store = SqliteStore::new(pool, media, clock.clone(), CapacityPruner::new(max_threads));
        store.put_board("comfy", "Comfy", "misc").await.unwrap();
        (store, clock)
    }

    pub async fn store(max_threads: u64) -> (SqliteStore, Arc<ManualClock>) {
        store_with(max_threads, Arc::new(RecordingMedia::default())).await
    }
}
