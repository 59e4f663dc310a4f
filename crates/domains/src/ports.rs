//! # Ports
//!
//! Any adapter must implement these traits to be wired by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{
    Admin, Ban, Board, DeletionReport, IdentityHash, MediaRef, NewPost, NewThread, Post, PostId,
    PostReceipt, Thread, ThreadId, ThreadPreview, ThreadReceipt, Upload,
};

/// Durable persistence for boards, threads and posts.
///
/// Every mutating method is a single transaction: on error nothing is
/// visible to readers.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    // Board Operations
    async fn list_boards(&self) -> Result<Vec<Board>>;
    async fn get_board(&self, slug: &str) -> Result<Board>;

    // Thread Operations
    /// Pinned threads first, then most recently bumped.
    async fn list_threads(&self, board_slug: &str) -> Result<Vec<Thread>>;
    async fn catalog(&self, board_slug: &str) -> Result<Vec<ThreadPreview>>;
    async fn get_thread(&self, id: ThreadId) -> Result<Thread>;
    async fn count_unpinned_threads(&self, board_slug: &str) -> Result<u64>;
    /// Inserts the thread and its OP, then prunes the board down to capacity.
    async fn put_thread(&self, thread: NewThread) -> Result<ThreadReceipt>;
    async fn delete_thread(&self, id: ThreadId) -> Result<DeletionReport>;
    async fn set_pinned(&self, id: ThreadId, pinned: bool) -> Result<()>;
    async fn set_locked(&self, id: ThreadId, locked: bool) -> Result<()>;

    // Post Operations
    /// Posts of a thread ordered by number.
    async fn get_posts(&self, thread_id: ThreadId) -> Result<Vec<Post>>;
    async fn get_original_post(&self, thread_id: ThreadId) -> Result<Post>;
    async fn get_post(&self, id: PostId) -> Result<Post>;
    /// Inserts a reply and bumps its thread.
    async fn put_post(&self, post: NewPost) -> Result<PostReceipt>;
    async fn delete_post(&self, id: PostId) -> Result<DeletionReport>;
    async fn mark_post_banned(&self, id: PostId) -> Result<Post>;
}

/// Durable ban table keyed by identity hash.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BanRepository: Send + Sync {
    /// Inserts, or extends an existing ban when `ban.expiration` is later.
    async fn upsert_ban(&self, ban: Ban) -> Result<()>;
    /// Never returns a lapsed ban; reading one deletes it.
    async fn get_ban(&self, ip_hash: &IdentityHash) -> Result<Ban>;
}

/// Staff account lookup.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn get_admin(&self, username: &str) -> Result<Admin>;
    async fn put_admin(&self, admin: Admin) -> Result<()>;
}

/// Turns a raw upload into stored media plus thumbnail.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn store(&self, upload: Upload, now: DateTime<Utc>) -> Result<MediaRef>;
}

/// Removal of stored media files.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Deletes the media and its thumbnail. A missing file is not an error;
    /// any other failure is a [`crate::DomainError::Cleanup`].
    async fn remove(&self, media: &MediaRef) -> Result<()>;
}

/// Password verification against a stored hash.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, password: &str, password_hash: &str) -> bool;
}

/// Source of opaque session tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}
