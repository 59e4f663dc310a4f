//! A fully wired board on a temporary SQLite file and media directory,
//! driven by a manual clock.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use auth_adapters::{hash_password, Argon2Verifier, RandomTokenGenerator};
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use domains::{
    Actor, Admin, AdminRepository, AdminSession, Clock, IdentityHash, ManualClock, ThreadId,
    ThreadReceipt, Upload,
};
use image::{ImageFormat, RgbImage};
use services::{
    AdminService, BanRegistry, CooldownWindows, CoreMetrics, CreatePost, CreateThread,
    ModerationService, PostingDeps, PostingLimits, PostingService, RateLimiter, SessionRegistry,
};
use storage_adapters::{CapacityPruner, LocalMediaStorage, SqliteStore};
use tempfile::TempDir;

pub const BOARD: &str = "comfy";
pub const ADMIN_USER: &str = "mod";
pub const ADMIN_PASSWORD: &str = "correct horse";

pub struct Fixture {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteStore>,
    pub media: Arc<LocalMediaStorage>,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionRegistry>,
    pub metrics: Arc<CoreMetrics>,
    pub posting: Arc<PostingService>,
    pub moderation: ModerationService,
    pub admin: AdminService,
}

impl Fixture {
    pub async fn new(max_threads: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::at_epoch());
        let media = Arc::new(LocalMediaStorage::new(dir.path().join("full"), dir.path().join("thumb")));

        let url = format!("sqlite://{}", dir.path().join("board.db").display());
        let pool = storage_adapters::connect(&url, 4).await.unwrap();
        let store = Arc::new(SqliteStore::new(
            pool,
            media.clone(),
            clock.clone(),
            CapacityPruner::new(max_threads),
        ));
        store.put_board(BOARD, "Comfy", "misc").await.unwrap();
        store
            .put_admin(Admin {
                username: ADMIN_USER.into(),
                password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
            })
            .await
            .unwrap();

        let limiter = Arc::new(RateLimiter::new(CooldownWindows::default(), clock.clone()));
        let sessions = Arc::new(SessionRegistry::new(clock.clone()));
        let metrics = Arc::new(CoreMetrics::new());
        let bans = BanRegistry::new(store.clone());

        let posting = Arc::new(PostingService::new(
            PostingDeps {
                content: store.clone(),
                bans: bans.clone(),
                limiter: limiter.clone(),
                processor: media.clone(),
                media: media.clone(),
                clock: clock.clone(),
                metrics: metrics.clone(),
            },
            PostingLimits::default(),
        ));
        let moderation = ModerationService::new(store.clone(), bans);
        let admin = AdminService::new(
            store.clone(),
            Arc::new(Argon2Verifier),
            Arc::new(RandomTokenGenerator),
            sessions.clone(),
            clock.clone(),
        );

        Self { dir, clock, store, media, limiter, sessions, metrics, posting, moderation, admin }
    }

    pub fn advance(&self, secs: i64) {
        self.clock.advance(TimeDelta::seconds(secs));
    }

    pub fn later(&self, by: TimeDelta) -> DateTime<Utc> {
        self.clock.now() + by
    }

    /// Starts a thread as `who`, then moves the clock one second on so
    /// the next upload gets its own file name and bump time.
    pub async fn start_thread(&self, who: &str, subject: &str) -> ThreadReceipt {
        let receipt = self
            .posting
            .create_thread(
                CreateThread {
                    board_slug: BOARD.into(),
                    subject: subject.into(),
                    body: format!("{subject} body"),
                    upload: Some(png_upload("op.png")),
                },
                &anon(who),
            )
            .await
            .unwrap();
        self.advance(1);
        receipt
    }

    pub fn reply(&self, thread_id: ThreadId, body: &str) -> CreatePost {
        CreatePost { board_slug: BOARD.into(), thread_id, body: body.into(), upload: None }
    }

    pub async fn login(&self) -> AdminSession {
        let issued = self.admin.login(ADMIN_USER, ADMIN_PASSWORD).await.unwrap();
        self.admin.authorize(&issued.token).unwrap()
    }
}

pub fn anon(who: &str) -> Actor {
    Actor::anonymous(IdentityHash::new(who))
}

pub fn png_upload(name: &str) -> Upload {
    let mut out = Cursor::new(Vec::new());
    RgbImage::new(32, 16).write_to(&mut out, ImageFormat::Png).unwrap();
    Upload { file_name: name.into(), content_type: None, data: Bytes::from(out.into_inner()) }
}
