//! Per-identity cooldowns for thread and post creation.
//!
//! Admission ([`RateLimiter::remaining`]) and recording
//! ([`RateLimiter::begin`]) are separate calls. Content creation between
//! them may do slow I/O, so concurrent requests from one identity can all
//! pass the check before any of them records. This is best-effort
//! throttling, not strict admission control.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use domains::{Clock, CooldownKind, IdentityHash};

use crate::ttl_map::TtlMap;

pub const DEFAULT_THREAD_COOLDOWN: Duration = Duration::from_secs(120);
pub const DEFAULT_POST_COOLDOWN: Duration = Duration::from_secs(15);

/// Minimum spacing between two actions of the same kind by one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownWindows {
    pub thread: Duration,
    pub post: Duration,
}

impl Default for CooldownWindows {
    fn default() -> Self {
        Self { thread: DEFAULT_THREAD_COOLDOWN, post: DEFAULT_POST_COOLDOWN }
    }
}

struct Cooldown {
    window: TimeDelta,
    last_action: TtlMap<IdentityHash, DateTime<Utc>>,
}

impl Cooldown {
    fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or_else(|_| TimeDelta::weeks(5200)),
            last_action: TtlMap::new(clock),
        }
    }
}

pub struct RateLimiter {
    thread: Cooldown,
    post: Cooldown,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(windows: CooldownWindows, clock: Arc<dyn Clock>) -> Self {
        Self {
            thread: Cooldown::new(windows.thread, clock.clone()),
            post: Cooldown::new(windows.post, clock.clone()),
            clock,
        }
    }

    fn cooldown(&self, kind: CooldownKind) -> &Cooldown {
        match kind {
            CooldownKind::Thread => &self.thread,
            CooldownKind::Post => &self.post,
        }
    }

    pub fn window(&self, kind: CooldownKind) -> TimeDelta {
        self.cooldown(kind).window
    }

    /// Time `identity` must still wait. Zero or negative means eligible now.
    pub fn remaining(&self, identity: &IdentityHash, kind: CooldownKind) -> TimeDelta {
        let cooldown = self.cooldown(kind);
        match cooldown.last_action.get(identity) {
            Some(last) => cooldown.window - (self.clock.now() - last),
            None => TimeDelta::zero(),
        }
    }

    /// Records now as the start of a cooldown.
    ///
    /// Only takes effect when no cooldown is running: a call made while the
    /// identity is still cooling down never moves the end of that cooldown.
    pub fn begin(&self, identity: &IdentityHash, kind: CooldownKind) {
        let cooldown = self.cooldown(kind);
        let now = self.clock.now();
        let window = cooldown.window;
        let started = cooldown.last_action.insert_unless(
            identity.clone(),
            now,
            now + window,
            |last| now - *last < window,
        );
        if started {
            tracing::debug!(identity = identity.short(), kind = kind.as_str(), "cooldown started");
        }
    }

    /// Drops elapsed cooldowns from both tables.
    pub fn sweep(&self) -> usize {
        self.thread.last_action.sweep() + self.post.last_action.sweep()
    }

    /// Number of tracked entries across both tables.
    pub fn tracked(&self) -> usize {
        self.thread.last_action.len() + self.post.last_action.len()
    }
}
