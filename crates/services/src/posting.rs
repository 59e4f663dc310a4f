//! # PostingService
//!
//! Orchestrates thread and reply creation:
//! ban check → cooldown check → validation → media pipeline → store →
//! cooldown start.

use std::sync::Arc;

use domains::{
    classify_media, Actor, Clock, ContentRepository, CooldownKind, DomainError, MediaProcessor,
    MediaRef, MediaStorage, NewPost, NewThread, PostReceipt, Result, ThreadId, ThreadReceipt,
    Upload, DEFAULT_AUTHOR,
};
use tracing::{info, warn};

use crate::bans::BanRegistry;
use crate::metrics::CoreMetrics;
use crate::rate_limiter::RateLimiter;

pub const MAX_SUBJECT_LEN: usize = 50;
pub const MAX_BODY_LEN: usize = 3000;
/// 10 MiB
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingLimits {
    pub max_subject_len: usize,
    pub max_body_len: usize,
    pub max_upload_bytes: usize,
}

impl Default for PostingLimits {
    fn default() -> Self {
        Self {
            max_subject_len: MAX_SUBJECT_LEN,
            max_body_len: MAX_BODY_LEN,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateThread {
    pub board_slug: String,
    pub subject: String,
    pub body: String,
    /// Required; kept optional so a missing file is a validation error
    pub upload: Option<Upload>,
}

#[derive(Debug, Clone)]
pub struct CreatePost {
    pub board_slug: String,
    pub thread_id: ThreadId,
    pub body: String,
    pub upload: Option<Upload>,
}

/// Collaborators the posting flow needs.
pub struct PostingDeps {
    pub content: Arc<dyn ContentRepository>,
    pub bans: BanRegistry,
    pub limiter: Arc<RateLimiter>,
    pub processor: Arc<dyn MediaProcessor>,
    pub media: Arc<dyn MediaStorage>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<CoreMetrics>,
}

pub struct PostingService {
    content: Arc<dyn ContentRepository>,
    bans: BanRegistry,
    limiter: Arc<RateLimiter>,
    processor: Arc<dyn MediaProcessor>,
    media: Arc<dyn MediaStorage>,
    clock: Arc<dyn Clock>,
    metrics: Arc<CoreMetrics>,
    limits: PostingLimits,
}

impl PostingService {
    pub fn new(deps: PostingDeps, limits: PostingLimits) -> Self {
        Self {
            content: deps.content,
            bans: deps.bans,
            limiter: deps.limiter,
            processor: deps.processor,
            media: deps.media,
            clock: deps.clock,
            metrics: deps.metrics,
            limits,
        }
    }

    pub async fn create_thread(&self, req: CreateThread, actor: &Actor) -> Result<ThreadReceipt> {
        let result = self.try_create_thread(req, actor).await;
        self.observe(CooldownKind::Thread, &result);
        result
    }

    pub async fn create_post(&self, req: CreatePost, actor: &Actor) -> Result<PostReceipt> {
        let result = self.try_create_post(req, actor).await;
        self.observe(CooldownKind::Post, &result);
        result
    }

    async fn try_create_thread(&self, req: CreateThread, actor: &Actor) -> Result<ThreadReceipt> {
        self.admit(actor, CooldownKind::Thread).await?;

        let subject = req.subject.trim().to_string();
        if subject.len() > self.limits.max_subject_len {
            return Err(DomainError::Validation(format!(
                "Subject exceeds {} characters",
                self.limits.max_subject_len
            )));
        }
        let body = self.validate_body(&req.body)?;
        let upload = req
            .upload
            .ok_or_else(|| DomainError::Validation("A file is required to start a thread".into()))?;
        self.validate_upload(&upload)?;

        // 404 before touching the filesystem
        self.content.get_board(&req.board_slug).await?;
        let media = self.processor.store(upload, self.clock.now()).await?;

        let thread = NewThread {
            board_slug: req.board_slug,
            subject,
            author: DEFAULT_AUTHOR.to_string(),
            body,
            media: media.clone(),
            ip_hash: actor.identity.clone(),
        };
        let board = thread.board_slug.clone();
        let receipt = match self.content.put_thread(thread).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.discard(&media).await;
                return Err(err);
            }
        };

        self.limiter.begin(&actor.identity, CooldownKind::Thread);
        self.metrics.record_pruned(receipt.pruned.len());
        info!(
            board = %board,
            thread_id = receipt.thread_id,
            number = receipt.number,
            pruned = receipt.pruned.len(),
            identity = actor.identity.short(),
            "thread created"
        );
        for failure in &receipt.cleanup.media_failures {
            warn!(path = %failure.path, reason = %failure.reason, "pruned media left on disk");
        }
        Ok(receipt)
    }

    async fn try_create_post(&self, req: CreatePost, actor: &Actor) -> Result<PostReceipt> {
        self.admit(actor, CooldownKind::Post).await?;

        let body = self.validate_body(&req.body)?;
        if let Some(upload) = &req.upload {
            self.validate_upload(upload)?;
        }

        let media = match req.upload {
            Some(upload) => Some(self.processor.store(upload, self.clock.now()).await?),
            None => None,
        };

        let post = NewPost {
            board_slug: req.board_slug,
            thread_id: req.thread_id,
            author: DEFAULT_AUTHOR.to_string(),
            body,
            media: media.clone(),
            ip_hash: actor.identity.clone(),
            ignore_lock: actor.is_admin,
        };
        let board = post.board_slug.clone();
        let receipt = match self.content.put_post(post).await {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Some(media) = &media {
                    self.discard(media).await;
                }
                return Err(err);
            }
        };

        self.limiter.begin(&actor.identity, CooldownKind::Post);
        info!(
            board = %board,
            thread_id = receipt.thread_id,
            number = receipt.number,
            identity = actor.identity.short(),
            "post created"
        );
        Ok(receipt)
    }

    /// Ban check, then cooldown check. Admins skip cooldowns.
    async fn admit(&self, actor: &Actor, kind: CooldownKind) -> Result<()> {
        self.bans.ensure_not_banned(&actor.identity).await?;
        if actor.is_admin {
            return Ok(());
        }
        let remaining = self.limiter.remaining(&actor.identity, kind);
        if remaining > chrono::TimeDelta::zero() {
            return Err(DomainError::RateLimited { remaining });
        }
        Ok(())
    }

    fn validate_body(&self, raw: &str) -> Result<String> {
        let body = raw.trim();
        if body.is_empty() {
            return Err(DomainError::Validation("Body is empty".into()));
        }
        if body.len() > self.limits.max_body_len {
            return Err(DomainError::Validation(format!(
                "Body exceeds {} characters",
                self.limits.max_body_len
            )));
        }
        Ok(body.to_string())
    }

    fn validate_upload(&self, upload: &Upload) -> Result<()> {
        if upload.data.len() > self.limits.max_upload_bytes {
            return Err(DomainError::Validation(format!(
                "File too large (max {} bytes)",
                self.limits.max_upload_bytes
            )));
        }
        classify_media(upload).map(|_| ())
    }

    /// Removes media stored for a request that did not commit.
    async fn discard(&self, media: &MediaRef) {
        if let Err(err) = self.media.remove(media).await {
            warn!(media = %media.media_name, error = %err, "failed to discard orphaned upload");
        }
    }

    fn observe<T>(&self, kind: CooldownKind, result: &Result<T>) {
        match result {
            Ok(_) => self.metrics.record_created(kind),
            Err(err) => self.metrics.record_rejected(kind, err),
        }
    }
}
