//! # ModerationService
//!
//! Staff actions on content and posters. Every method takes the
//! [`AdminSession`] that authorized it so the audit log names the moderator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    AdminSession, ContentRepository, DeletionReport, PostId, Result, ThreadId,
};
use tracing::{info, warn};

use crate::bans::BanRegistry;

pub struct ModerationService {
    content: Arc<dyn ContentRepository>,
    bans: BanRegistry,
}

impl ModerationService {
    pub fn new(content: Arc<dyn ContentRepository>, bans: BanRegistry) -> Self {
        Self { content, bans }
    }

    pub async fn delete_thread(&self, session: &AdminSession, id: ThreadId) -> Result<DeletionReport> {
        let report = self.content.delete_thread(id).await?;
        info!(admin = %session.username, thread_id = id, posts = report.posts_removed, "thread deleted");
        log_failures(&report);
        Ok(report)
    }

    /// Deleting an original post removes its whole thread.
    pub async fn delete_post(&self, session: &AdminSession, id: PostId) -> Result<DeletionReport> {
        let report = self.content.delete_post(id).await?;
        info!(
            admin = %session.username,
            post_id = id,
            threads = report.threads_removed,
            posts = report.posts_removed,
            "post deleted"
        );
        log_failures(&report);
        Ok(report)
    }

    /// Bans the identity that wrote the post, then flags the post. A post is
    /// never shown as banned unless the ban was stored.
    pub async fn ban_poster(
        &self,
        session: &AdminSession,
        post_id: PostId,
        reason: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()> {
        let post = self.content.get_post(post_id).await?;
        self.bans.upsert(&post.ip_hash, reason, expiration).await?;
        self.content.mark_post_banned(post_id).await?;
        info!(admin = %session.username, post_id, identity = post.ip_hash.short(), "poster banned");
        Ok(())
    }

    pub async fn set_pinned(&self, session: &AdminSession, id: ThreadId, pinned: bool) -> Result<()> {
        self.content.set_pinned(id, pinned).await?;
        info!(admin = %session.username, thread_id = id, pinned, "thread pin changed");
        Ok(())
    }

    pub async fn set_locked(&self, session: &AdminSession, id: ThreadId, locked: bool) -> Result<()> {
        self.content.set_locked(id, locked).await?;
        info!(admin = %session.username, thread_id = id, locked, "thread lock changed");
        Ok(())
    }
}

fn log_failures(report: &DeletionReport) {
    for failure in &report.media_failures {
        warn!(path = %failure.path, reason = %failure.reason, "media left behind after deletion");
    }
}
