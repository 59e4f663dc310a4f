//! # Domain Models
//!
//! These structs represent the core entities of comfyboard.
//! Row identifiers are SQLite integer keys; post numbers are a separate,
//! per-board sequence.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BoardId = i64;
pub type ThreadId = i64;
pub type PostId = i64;

/// Author name stored when a poster supplies none.
pub const DEFAULT_AUTHOR: &str = "Anonymous";

/// Represents a single board (e.g., /comfy/)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    /// The URL slug (e.g., "comfy" for /comfy/)
    pub slug: String,
    pub name: String,
    /// Short category label shown next to the board name
    pub tag: String,
}

/// A Thread contains a collection of Posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub board_slug: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    /// The timestamp used for sorting threads by activity and for eviction
    pub bumped_at: DateTime<Utc>,
    /// Pinned threads are exempt from capacity pruning
    pub pinned: bool,
    pub locked: bool,
}

/// Stored file names of an uploaded media item and its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub media_name: String,
    pub thumb_name: String,
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub thread_id: ThreadId,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub media: Option<MediaRef>,
    pub ip_hash: IdentityHash,
    /// Per-board sequence number, starting at 1
    pub number: i64,
    /// Set when a moderator banned the poster for this post
    pub banned: bool,
}

/// A moderation action against an identity hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub ip_hash: IdentityHash,
    pub reason: String,
    pub expiration: DateTime<Utc>,
}

/// A staff account. `password_hash` is a PHC-formatted hash string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admin {
    pub username: String,
    pub password_hash: String,
}

/// An authenticated admin login held in the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub username: String,
    pub expiration: DateTime<Utc>,
}

/// Stable pseudonymous fingerprint derived from a requester's address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two independently throttled content-creation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownKind {
    Thread,
    Post,
}

impl CooldownKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CooldownKind::Thread => "thread",
            CooldownKind::Post => "post",
        }
    }
}

/// Who is performing a content-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: IdentityHash,
    /// Admins bypass cooldowns and may reply to locked threads
    pub is_admin: bool,
}

impl Actor {
    pub fn anonymous(identity: IdentityHash) -> Self {
        Self { identity, is_admin: false }
    }

    pub fn admin(identity: IdentityHash) -> Self {
        Self { identity, is_admin: true }
    }
}

/// A raw upload as received from the caller, before the media pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename declared by the client; only its extension is used
    pub file_name: String,
    /// Content type sniffed or declared by the caller, if known
    pub content_type: Option<mime::Mime>,
    pub data: Bytes,
}

/// Broad media class accepted by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Insert request for a thread together with its original post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub board_slug: String,
    pub subject: String,
    pub author: String,
    pub body: String,
    pub media: MediaRef,
    pub ip_hash: IdentityHash,
}

/// Insert request for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub board_slug: String,
    pub thread_id: ThreadId,
    pub author: String,
    pub body: String,
    pub media: Option<MediaRef>,
    pub ip_hash: IdentityHash,
    /// Allow the reply even when the thread is locked
    pub ignore_lock: bool,
}

/// Result of a committed thread creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadReceipt {
    pub thread_id: ThreadId,
    pub post_id: PostId,
    pub number: i64,
    /// Threads evicted by capacity pruning in the same transaction
    pub pruned: Vec<ThreadId>,
    /// Rows and media removed for `pruned`, including files that could not
    /// be deleted
    pub cleanup: DeletionReport,
}

/// Result of a committed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub post_id: PostId,
    pub thread_id: ThreadId,
    pub number: i64,
}

/// Catalog entry: a thread with its original post and activity counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPreview {
    pub thread: Thread,
    pub op: Post,
    /// Number of posts in the thread, OP included
    pub reply_count: i64,
    /// Number of distinct identity hashes that posted in the thread
    pub unique_posters: i64,
}

/// A media file that could not be removed after its rows were deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of a committed thread or post deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub threads_removed: u64,
    pub posts_removed: u64,
    pub media_removed: u64,
    pub media_failures: Vec<CleanupFailure>,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.media_failures.is_empty()
    }
}
