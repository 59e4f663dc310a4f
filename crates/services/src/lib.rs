//! comfyboard/crates/services/src/lib.rs
//!
//! Business logic: posting flow, moderation, admin sessions, cooldowns and
//! the background sweeper. Depends only on `domains` ports.

pub mod admin;
pub mod bans;
pub mod identity;
pub mod metrics;
pub mod moderation;
pub mod posting;
pub mod rate_limiter;
pub mod sessions;
pub mod sweeper;
pub mod ttl_map;

pub use admin::{AdminService, IssuedSession, SESSION_TTL};
pub use bans::BanRegistry;
pub use identity::{client_address, IdentityHasher};
pub use metrics::CoreMetrics;
pub use moderation::ModerationService;
pub use posting::{CreatePost, CreateThread, PostingDeps, PostingLimits, PostingService};
pub use rate_limiter::{CooldownWindows, RateLimiter};
pub use sessions::SessionRegistry;
pub use sweeper::{SweepReport, Sweeper, SWEEP_INTERVAL};
pub use ttl_map::TtlMap;
