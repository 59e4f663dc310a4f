//! Row → domain model mapping.

use domains::{Board, IdentityHash, MediaRef, Post, Result, Thread};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::storage;

pub(crate) const THREAD_COLUMNS: &str =
    "id, board_slug, subject, created_at, bumped_at, pinned, locked";

pub(crate) const POST_COLUMNS: &str =
    "id, thread_id, author, body, created_at, media_path, thumb_path, ip_hash, number, banned";

pub(crate) fn board(row: &SqliteRow) -> Result<Board> {
    Ok(Board {
        id: row.try_get("id").map_err(storage)?,
        slug: row.try_get("slug").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        tag: row.try_get("tag").map_err(storage)?,
    })
}

pub(crate) fn thread(row: &SqliteRow) -> Result<Thread> {
    Ok(Thread {
        id: row.try_get("id").map_err(storage)?,
        board_slug: row.try_get("board_slug").map_err(storage)?,
        subject: row.try_get("subject").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
        bumped_at: row.try_get("bumped_at").map_err(storage)?,
        pinned: row.try_get("pinned").map_err(storage)?,
        locked: row.try_get("locked").map_err(storage)?,
    })
}

/// Reads a post whose columns carry `prefix` (empty for a plain select).
pub(crate) fn post_prefixed(row: &SqliteRow, prefix: &str) -> Result<Post> {
    let col = |name: &str| format!("{prefix}{name}");
    let media_path: Option<String> = row.try_get(col("media_path").as_str()).map_err(storage)?;
    let thumb_path: Option<String> = row.try_get(col("thumb_path").as_str()).map_err(storage)?;
    let ip_hash: String = row.try_get(col("ip_hash").as_str()).map_err(storage)?;

    Ok(Post {
        id: row.try_get(col("id").as_str()).map_err(storage)?,
        thread_id: row.try_get(col("thread_id").as_str()).map_err(storage)?,
        author: row.try_get(col("author").as_str()).map_err(storage)?,
        body: row.try_get(col("body").as_str()).map_err(storage)?,
        created_at: row.try_get(col("created_at").as_str()).map_err(storage)?,
        media: media_ref(media_path, thumb_path),
        ip_hash: IdentityHash::new(ip_hash),
        number: row.try_get(col("number").as_str()).map_err(storage)?,
        banned: row.try_get(col("banned").as_str()).map_err(storage)?,
    })
}

pub(crate) fn post(row: &SqliteRow) -> Result<Post> {
    post_prefixed(row, "")
}

pub(crate) fn media_ref(media_path: Option<String>, thumb_path: Option<String>) -> Option<MediaRef> {
    media_path.map(|media_name| MediaRef {
        thumb_name: thumb_path.unwrap_or_else(|| media_name.clone()),
        media_name,
    })
}
