//! Board capacity enforcement inside the thread-creation transaction.

use domains::{MediaRef, Result, ThreadId};
use sqlx::SqliteConnection;
use tracing::debug;

use super::{content, storage};

/// Default number of unpinned threads a board keeps.
pub const MAX_THREADS: u64 = 50;

/// A thread removed by capacity pressure, with the media its posts held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedThread {
    pub id: ThreadId,
    pub posts: u64,
    pub media: Vec<MediaRef>,
}

/// Keeps each board at or below `max_threads` unpinned threads by evicting
/// the least recently bumped one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPruner {
    max_threads: u64,
}

impl Default for CapacityPruner {
    fn default() -> Self {
        Self::new(MAX_THREADS)
    }
}

impl CapacityPruner {
    pub fn new(max_threads: u64) -> Self {
        Self { max_threads }
    }

    pub fn max_threads(&self) -> u64 {
        self.max_threads
    }

    /// Runs after `keep` and its OP are inserted. Evicts the oldest unpinned
    /// thread other than `keep` while the board holds more than
    /// `max_threads` unpinned threads; stops early when nothing is prunable.
    pub(crate) async fn prune(
        &self,
        conn: &mut SqliteConnection,
        board_slug: &str,
        keep: ThreadId,
    ) -> Result<Vec<PrunedThread>> {
        let mut pruned = Vec::new();

        loop {
            let unpinned = count_unpinned(conn, board_slug).await?;
            if unpinned <= self.max_threads {
                break;
            }

            let victim: Option<ThreadId> = sqlx::query_scalar(
                r#"
                SELECT id FROM threads
                WHERE board_slug = ? AND pinned = 0 AND id != ?
                ORDER BY bumped_at ASC, id ASC
                LIMIT 1
                "#,
            )
            .bind(board_slug)
            .bind(keep)
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?;

            let Some(id) = victim else {
                break;
            };

            let Some(removed) = content::delete_thread_rows(conn, id).await? else {
                break;
            };
            debug!(board = board_slug, thread_id = id, unpinned, "pruning thread");
            pruned.push(PrunedThread { id, posts: removed.posts, media: removed.media });
        }

        Ok(pruned)
    }
}

pub(crate) async fn count_unpinned(conn: &mut SqliteConnection, board_slug: &str) -> Result<u64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM threads WHERE board_slug = ? AND pinned = 0")
            .bind(board_slug)
            .fetch_one(&mut *conn)
            .await
            .map_err(storage)?;
    Ok(count.max(0) as u64)
}
