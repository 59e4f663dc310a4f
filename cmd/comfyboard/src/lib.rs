//! # comfyboard
//!
//! Composition root: turns [`Settings`] into a wired [`Engine`]. A transport
//! layer (HTTP, CLI, tests) drives the engine's services directly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth_adapters::{Argon2Verifier, RandomTokenGenerator};
use chrono::TimeDelta;
use configs::{LogFormat, LogSettings, Settings};
use domains::{ContentRepository, SystemClock};
use services::{
    AdminService, BanRegistry, CooldownWindows, CoreMetrics, IdentityHasher, ModerationService,
    PostingDeps, PostingLimits, PostingService, RateLimiter, SessionRegistry, Sweeper,
};
use storage_adapters::{CapacityPruner, LocalMediaStorage, SqliteStore};
use tracing_subscriber::EnvFilter;

/// Everything a front end needs, built once per process.
pub struct Engine {
    pub store: Arc<SqliteStore>,
    pub posting: PostingService,
    pub moderation: ModerationService,
    pub admin: AdminService,
    pub identity: IdentityHasher,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionRegistry>,
    pub metrics: Arc<CoreMetrics>,
    sweep_interval: Duration,
}

impl Engine {
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let clock = Arc::new(SystemClock);

        let media = Arc::new(
            LocalMediaStorage::new(&settings.media.full_dir, &settings.media.thumb_dir)
                .with_ffmpeg(&settings.media.ffmpeg),
        );
        media.ensure_dirs().await.context("creating media directories")?;

        let pool = storage_adapters::connect(&settings.database.url, settings.database.max_connections)
            .await
            .with_context(|| format!("opening database {}", settings.database.url))?;
        let store = Arc::new(SqliteStore::new(
            pool,
            media.clone(),
            clock.clone(),
            CapacityPruner::new(settings.board.max_threads),
        ));

        let windows = CooldownWindows {
            thread: Duration::from_secs(settings.cooldowns.thread_secs),
            post: Duration::from_secs(settings.cooldowns.post_secs),
        };
        let limiter = Arc::new(RateLimiter::new(windows, clock.clone()));
        let sessions = Arc::new(SessionRegistry::new(clock.clone()));
        let metrics = Arc::new(CoreMetrics::new());
        let bans = BanRegistry::new(store.clone());

        let posting = PostingService::new(
            PostingDeps {
                content: store.clone(),
                bans: bans.clone(),
                limiter: limiter.clone(),
                processor: media.clone(),
                media,
                clock: clock.clone(),
                metrics: metrics.clone(),
            },
            PostingLimits {
                max_subject_len: settings.board.max_subject_len,
                max_body_len: settings.board.max_body_len,
                max_upload_bytes: settings.media.max_upload_bytes,
            },
        );
        let moderation = ModerationService::new(store.clone(), bans);

        let session_ttl = i64::try_from(settings.sessions.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .context("sessions.ttl_secs is out of range")?;
        let admin = AdminService::new(
            store.clone(),
            Arc::new(Argon2Verifier),
            Arc::new(RandomTokenGenerator),
            sessions.clone(),
            clock,
        )
        .with_session_ttl(session_ttl)
        .with_dev_mode(settings.dev_mode);

        Ok(Self {
            store,
            posting,
            moderation,
            admin,
            identity: IdentityHasher::new(settings.identity.salt),
            limiter,
            sessions,
            metrics,
            sweep_interval: Duration::from_secs(settings.sessions.sweep_interval_secs),
        })
    }

    /// Starts the background sweeper for cooldowns and sessions.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        Sweeper::new(self.limiter.clone(), self.sessions.clone())
            .with_interval(self.sweep_interval)
            .with_metrics(self.metrics.clone())
            .start()
    }

    /// Logs the boards found at startup.
    pub async fn announce(&self) -> anyhow::Result<()> {
        let boards = self.store.list_boards().await.context("listing boards")?;
        if boards.is_empty() {
            tracing::warn!("no boards configured; run the seed binary");
        }
        for board in boards {
            let unpinned = self.store.count_unpinned_threads(&board.slug).await?;
            tracing::info!(board = %board.slug, name = %board.name, unpinned, "board online");
        }
        Ok(())
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured filter.
pub fn init_tracing(log: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
