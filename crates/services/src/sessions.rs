//! In-memory registry of admin login sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{AdminSession, Clock};

use crate::ttl_map::TtlMap;

/// Token → session map. A username may hold any number of live tokens.
pub struct SessionRegistry {
    sessions: TtlMap<String, AdminSession>,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { sessions: TtlMap::new(clock) }
    }

    pub fn create(&self, token: &str, username: &str, expiration: DateTime<Utc>) {
        let session = AdminSession { username: username.to_string(), expiration };
        self.sessions.insert(token.to_string(), session, expiration);
    }

    /// True iff the token exists and has not expired. A stale token is
    /// dropped as a side effect.
    pub fn is_valid(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    pub fn get(&self, token: &str) -> Option<AdminSession> {
        self.sessions.get(&token.to_string())
    }

    pub fn delete(&self, token: &str) {
        self.sessions.remove(&token.to_string());
    }

    /// Live sessions held by `username`.
    pub fn sessions_for(&self, username: &str) -> usize {
        self.sessions.values_where(|session| session.username == username).len()
    }

    pub fn sweep(&self) -> usize {
        self.sessions.sweep()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use domains::ManualClock;

    use super::*;

    fn registry() -> (SessionRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        (SessionRegistry::new(clock.clone()), clock)
    }

    #[test]
    fn session_valid_until_expiration() {
        let (registry, clock) = registry();
        registry.create("tok", "mod", clock.now() + TimeDelta::hours(1));
        assert!(registry.is_valid("tok"));

        clock.advance(TimeDelta::hours(1));
        assert!(registry.is_valid("tok"));

        clock.advance(TimeDelta::seconds(1));
        assert!(!registry.is_valid("tok"));
        assert!(registry.is_empty(), "stale token must be dropped on check");
    }

    #[test]
    fn unknown_token_is_invalid() {
        let (registry, _) = registry();
        assert!(!registry.is_valid("nope"));
    }

    #[test]
    fn delete_revokes_token() {
        let (registry, clock) = registry();
        registry.create("tok", "mod", clock.now() + TimeDelta::hours(1));
        registry.delete("tok");
        assert!(!registry.is_valid("tok"));
    }

    #[test]
    fn one_user_may_hold_several_tokens() {
        let (registry, clock) = registry();
        let expiration = clock.now() + TimeDelta::hours(1);
        registry.create("a", "mod", expiration);
        registry.create("b", "mod", expiration);
        registry.create("c", "other", expiration);

        assert!(registry.is_valid("a"));
        assert!(registry.is_valid("b"));
        assert_eq!(registry.sessions_for("mod"), 2);
    }

    #[test]
    fn sweep_removes_expired_sessions() {
        let (registry, clock) = registry();
        registry.create("short", "mod", clock.now() + TimeDelta::minutes(1));
        registry.create("long", "mod", clock.now() + TimeDelta::hours(1));

        clock.advance(TimeDelta::minutes(2));
        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_valid("long"));
    }
}
