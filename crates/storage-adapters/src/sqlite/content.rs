//! `ContentRepository` over SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Board, ContentRepository, DeletionReport, DomainError, MediaRef, NewPost, NewThread, Post,
    PostId, PostReceipt, Result, Thread, ThreadId, ThreadPreview, ThreadReceipt,
};
use sqlx::{Row, SqliteConnection};
use tracing::info;

use super::rows::{self, POST_COLUMNS, THREAD_COLUMNS};
use super::{pruner, storage, SqliteStore};

/// Fields shared by an OP and a reply at insert time.
struct PostInsert<'a> {
    thread_id: ThreadId,
    board_slug: &'a str,
    author: &'a str,
    body: &'a str,
    media: Option<&'a MediaRef>,
    ip_hash: &'a str,
    number: i64,
    created_at: DateTime<Utc>,
}

/// Takes the next post number of `board_slug`. As the first write of the
/// transaction it also takes SQLite's write lock, so concurrent posters
/// queue here and never observe the same counter value.
async fn next_post_number(conn: &mut SqliteConnection, board_slug: &str) -> Result<i64> {
    sqlx::query_scalar(
        "UPDATE boards SET last_post_number = last_post_number + 1 WHERE slug = ? RETURNING last_post_number",
    )
    .bind(board_slug)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage)?
    .ok_or_else(|| DomainError::not_found("board", board_slug))
}

async fn insert_post(conn: &mut SqliteConnection, post: PostInsert<'_>) -> Result<PostId> {
    sqlx::query_scalar(
        r#"
        INSERT INTO posts
            (thread_id, board_slug, author, body, created_at, media_path, thumb_path, ip_hash, number)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(post.thread_id)
    .bind(post.board_slug)
    .bind(post.author)
    .bind(post.body)
    .bind(post.created_at)
    .bind(post.media.map(|m| m.media_name.as_str()))
    .bind(post.media.map(|m| m.thumb_name.as_str()))
    .bind(post.ip_hash)
    .bind(post.number)
    .fetch_one(&mut *conn)
    .await
    .map_err(storage)
}

/// Rows removed by a thread deletion, with the media their posts held.
pub(crate) struct RemovedThread {
    pub posts: u64,
    pub media: Vec<MediaRef>,
}

/// Deletes a thread and its posts. The posts go first with `RETURNING`, so
/// the media is collected by the same write that removes it.
pub(crate) async fn delete_thread_rows(
    conn: &mut SqliteConnection,
    id: ThreadId,
) -> Result<Option<RemovedThread>> {
    let records = sqlx::query(
        "DELETE FROM posts WHERE thread_id = ? RETURNING number, media_path, thumb_path",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage)?;

    let threads = sqlx::query("DELETE FROM threads WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(storage)?
        .rows_affected();
    if threads == 0 {
        return Ok(None);
    }

    let mut numbered = Vec::with_capacity(records.len());
    for row in &records {
        let number: i64 = row.try_get("number").map_err(storage)?;
        let media = rows::media_ref(
            row.try_get("media_path").map_err(storage)?,
            row.try_get("thumb_path").map_err(storage)?,
        );
        if let Some(media) = media {
            numbered.push((number, media));
        }
    }
    // RETURNING order is unspecified
    numbered.sort_by_key(|(number, _)| *number);

    Ok(Some(RemovedThread {
        posts: records.len() as u64,
        media: numbered.into_iter().map(|(_, media)| media).collect(),
    }))
}

impl SqliteStore {
    async fn ensure_board(&self, slug: &str) -> Result<()> {
        self.get_board(slug).await.map(|_| ())
    }

    async fn set_flag(&self, id: ThreadId, column: &'static str, value: bool) -> Result<()> {
        let sql = format!("UPDATE threads SET {column} = ? WHERE id = ?");
        let affected = sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?
            .rows_affected();
        if affected == 0 {
            return Err(DomainError::not_found("thread", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for SqliteStore {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        let records = sqlx::query("SELECT id, slug, name, tag FROM boards ORDER BY slug")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.iter().map(rows::board).collect()
    }

    async fn get_board(&self, slug: &str) -> Result<Board> {
        let row = sqlx::query("SELECT id, slug, name, tag FROM boards WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => rows::board(&row),
            None => Err(DomainError::not_found("board", slug)),
        }
    }

    async fn list_threads(&self, board_slug: &str) -> Result<Vec<Thread>> {
        self.ensure_board(board_slug).await?;
        let sql = format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE board_slug = ? \
             ORDER BY pinned DESC, bumped_at DESC, id DESC"
        );
        let records = sqlx::query(&sql)
            .bind(board_slug)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.iter().map(rows::thread).collect()
    }

    async fn catalog(&self, board_slug: &str) -> Result<Vec<ThreadPreview>> {
        self.ensure_board(board_slug).await?;
        let records = sqlx::query(
            r#"
            SELECT t.id, t.board_slug, t.subject, t.created_at, t.bumped_at, t.pinned, t.locked,
                   op.id AS op_id, op.thread_id AS op_thread_id, op.author AS op_author,
                   op.body AS op_body, op.created_at AS op_created_at,
                   op.media_path AS op_media_path, op.thumb_path AS op_thumb_path,
                   op.ip_hash AS op_ip_hash, op.number AS op_number, op.banned AS op_banned,
                   (SELECT COUNT(*) FROM posts p WHERE p.thread_id = t.id) AS reply_count,
                   (SELECT COUNT(DISTINCT p.ip_hash) FROM posts p WHERE p.thread_id = t.id)
                       AS unique_posters
            FROM threads t
            JOIN posts op ON op.id = (
                SELECT id FROM posts WHERE thread_id = t.id ORDER BY number ASC LIMIT 1
            )
            WHERE t.board_slug = ?
            ORDER BY t.pinned DESC, t.bumped_at DESC, t.id DESC
            "#,
        )
        .bind(board_slug)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        records.iter()
            .map(|row| {
                Ok(ThreadPreview {
                    thread: rows::thread(row)?,
                    op: rows::post_prefixed(row, "op_")?,
                    reply_count: row.try_get("reply_count").map_err(storage)?,
                    unique_posters: row.try_get("unique_posters").map_err(storage)?,
                })
            })
            .collect()
    }

    async fn get_thread(&self, id: ThreadId) -> Result<Thread> {
        let sql = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => rows::thread(&row),
            None => Err(DomainError::not_found("thread", id)),
        }
    }

    async fn count_unpinned_threads(&self, board_slug: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        pruner::count_unpinned(&mut conn, board_slug).await
    }

    async fn put_thread(&self, thread: NewThread) -> Result<ThreadReceipt> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let number = next_post_number(&mut tx, &thread.board_slug).await?;
        let thread_id: ThreadId = sqlx::query_scalar(
            r#"
            INSERT INTO threads (board_slug, subject, created_at, bumped_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&thread.board_slug)
        .bind(&thread.subject)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        let post_id = insert_post(
            &mut tx,
            PostInsert {
                thread_id,
                board_slug: &thread.board_slug,
                author: &thread.author,
                body: &thread.body,
                media: Some(&thread.media),
                ip_hash: thread.ip_hash.as_str(),
                number,
                created_at: now,
            },
        )
        .await?;

        let pruned = self.pruner.prune(&mut tx, &thread.board_slug, thread_id).await?;
        tx.commit().await.map_err(storage)?;

        let mut cleanup = DeletionReport::default();
        if !pruned.is_empty() {
            cleanup.threads_removed = pruned.len() as u64;
            cleanup.posts_removed = pruned.iter().map(|p| p.posts).sum();
            let media: Vec<MediaRef> = pruned.iter().flat_map(|p| p.media.clone()).collect();
            self.remove_media(&media, &mut cleanup).await;
            info!(
                board = %thread.board_slug,
                threads = cleanup.threads_removed,
                posts = cleanup.posts_removed,
                media_failures = cleanup.media_failures.len(),
                "board pruned to capacity"
            );
        }

        Ok(ThreadReceipt {
            thread_id,
            post_id,
            number,
            pruned: pruned.into_iter().map(|p| p.id).collect(),
            cleanup,
        })
    }

    async fn delete_thread(&self, id: ThreadId) -> Result<DeletionReport> {
        // opens with a write so the transaction holds the write lock from
        // its first statement
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let removed = delete_thread_rows(&mut tx, id)
            .await?
            .ok_or_else(|| DomainError::not_found("thread", id))?;
        tx.commit().await.map_err(storage)?;

        let mut report = DeletionReport {
            threads_removed: 1,
            posts_removed: removed.posts,
            ..Default::default()
        };
        self.remove_media(&removed.media, &mut report).await;
        Ok(report)
    }

    async fn set_pinned(&self, id: ThreadId, pinned: bool) -> Result<()> {
        self.set_flag(id, "pinned", pinned).await
    }

    async fn set_locked(&self, id: ThreadId, locked: bool) -> Result<()> {
        self.set_flag(id, "locked", locked).await
    }

    async fn get_posts(&self, thread_id: ThreadId) -> Result<Vec<Post>> {
        self.get_thread(thread_id).await?;
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE thread_id = ? ORDER BY number ASC");
        let records = sqlx::query(&sql)
            .bind(thread_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.iter().map(rows::post).collect()
    }

    async fn get_original_post(&self, thread_id: ThreadId) -> Result<Post> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE thread_id = ? ORDER BY number ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => rows::post(&row),
            None => Err(DomainError::not_found("thread", thread_id)),
        }
    }

    async fn get_post(&self, id: PostId) -> Result<Post> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => rows::post(&row),
            None => Err(DomainError::not_found("post", id)),
        }
    }

    async fn put_post(&self, post: NewPost) -> Result<PostReceipt> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let number = next_post_number(&mut tx, &post.board_slug).await?;

        let locked: Option<bool> =
            sqlx::query_scalar("SELECT locked FROM threads WHERE id = ? AND board_slug = ?")
                .bind(post.thread_id)
                .bind(&post.board_slug)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;
        match locked {
            None => return Err(DomainError::not_found("thread", post.thread_id)),
            Some(true) if !post.ignore_lock => {
                return Err(DomainError::Forbidden("thread is locked".into()))
            }
            Some(_) => {}
        }

        let post_id = insert_post(
            &mut tx,
            PostInsert {
                thread_id: post.thread_id,
                board_slug: &post.board_slug,
                author: &post.author,
                body: &post.body,
                media: post.media.as_ref(),
                ip_hash: post.ip_hash.as_str(),
                number,
                created_at: now,
            },
        )
        .await?;

        sqlx::query("UPDATE threads SET bumped_at = ? WHERE id = ?")
            .bind(now)
            .bind(post.thread_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(PostReceipt { post_id, thread_id: post.thread_id, number })
    }

    async fn delete_post(&self, id: PostId) -> Result<DeletionReport> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query(
            "DELETE FROM posts WHERE id = ? RETURNING thread_id, number, media_path, thumb_path",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| DomainError::not_found("post", id))?;
        let thread_id: ThreadId = row.try_get("thread_id").map_err(storage)?;
        let number: i64 = row.try_get("number").map_err(storage)?;
        let mut media: Vec<MediaRef> = rows::media_ref(
            row.try_get("media_path").map_err(storage)?,
            row.try_get("thumb_path").map_err(storage)?,
        )
        .into_iter()
        .collect();

        let earlier: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE thread_id = ? AND number < ?)",
        )
        .bind(thread_id)
        .bind(number)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        // a thread cannot outlive its original post
        let mut report = if earlier {
            DeletionReport { posts_removed: 1, ..Default::default() }
        } else {
            let rest = delete_thread_rows(&mut tx, thread_id)
                .await?
                .ok_or_else(|| DomainError::not_found("thread", thread_id))?;
            media.extend(rest.media);
            DeletionReport { threads_removed: 1, posts_removed: rest.posts + 1, ..Default::default() }
        };

        tx.commit().await.map_err(storage)?;
        self.remove_media(&media, &mut report).await;
        Ok(report)
    }

    async fn mark_post_banned(&self, id: PostId) -> Result<Post> {
        let sql = format!("UPDATE posts SET banned = 1 WHERE id = ? RETURNING {POST_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => rows::post(&row),
            None => Err(DomainError::not_found("post", id)),
        }
    }
}
