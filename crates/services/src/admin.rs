//! # AdminService
//!
//! Staff login, logout and token authorization on top of the
//! [`SessionRegistry`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use domains::{
    AdminRepository, AdminSession, Clock, CredentialVerifier, DomainError, Result,
    TokenGenerator,
};
use tracing::{info, warn};

use crate::sessions::SessionRegistry;

/// Default lifetime of an admin session.
pub const SESSION_TTL: TimeDelta = TimeDelta::hours(1);

const INVALID_LOGIN: &str = "invalid username or password";

/// A freshly issued admin session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

pub struct AdminService {
    admins: Arc<dyn AdminRepository>,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: Arc<dyn TokenGenerator>,
    sessions: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    session_ttl: TimeDelta,
    dev_mode: bool,
}

impl AdminService {
    pub fn new(
        admins: Arc<dyn AdminRepository>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: Arc<dyn TokenGenerator>,
        sessions: Arc<SessionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { admins, verifier, tokens, sessions, clock, session_ttl: SESSION_TTL, dev_mode: false }
    }

    pub fn with_session_ttl(mut self, ttl: TimeDelta) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// In development mode every caller counts as an admin.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession> {
        let admin = match self.admins.get_admin(username).await {
            Ok(admin) => admin,
            Err(err) if err.is_not_found() => {
                warn!(username, "login for unknown admin");
                return Err(DomainError::Unauthorized(INVALID_LOGIN.into()));
            }
            Err(err) => return Err(err),
        };

        if !self.verifier.verify(password, &admin.password_hash).await {
            warn!(username, "login with wrong password");
            return Err(DomainError::Unauthorized(INVALID_LOGIN.into()));
        }

        let token = self.tokens.generate()?;
        let expiration = self.clock.now() + self.session_ttl;
        self.sessions.create(&token, &admin.username, expiration);
        info!(username, %expiration, "admin logged in");
        Ok(IssuedSession { token, expiration })
    }

    pub fn logout(&self, token: &str) {
        self.sessions.delete(token);
    }

    /// The live session behind `token`, or `Unauthorized`.
    pub fn authorize(&self, token: &str) -> Result<AdminSession> {
        self.sessions
            .get(token)
            .ok_or_else(|| DomainError::Unauthorized("session expired or unknown".into()))
    }

    pub fn is_admin(&self, token: Option<&str>) -> bool {
        self.dev_mode || token.is_some_and(|token| self.sessions.is_valid(token))
    }
}

#[cfg(test)]
mod tests {
    use domains::{
        Admin, ManualClock, MockAdminRepository, MockCredentialVerifier, MockTokenGenerator,
    };

    use super::*;

    fn build(dev_mode: bool) -> (AdminService, Arc<ManualClock>) {
        let mut admins = MockAdminRepository::new();
        admins.expect_get_admin().returning(|username| {
            if username == "mod" {
                Ok(Admin { username: "mod".into(), password_hash: "$argon2id$stub".into() })
            } else {
                Err(DomainError::not_found("admin", username))
            }
        });
        let mut verifier = MockCredentialVerifier::new();
        verifier.expect_verify().returning(|password, _| password == "hunter2");
        let mut tokens = MockTokenGenerator::new();
        tokens.expect_generate().returning(|| Ok("a".repeat(64)));

        let clock = Arc::new(ManualClock::at_epoch());
        let sessions = Arc::new(SessionRegistry::new(clock.clone()));
        let service = AdminService::new(
            Arc::new(admins),
            Arc::new(verifier),
            Arc::new(tokens),
            sessions,
            clock.clone(),
        )
        .with_dev_mode(dev_mode);
        (service, clock)
    }

    #[tokio::test]
    async fn login_issues_token_valid_for_an_hour() {
        let (service, clock) = build(false);
        let issued = service.login("mod", "hunter2").await.unwrap();
        assert_eq!(issued.expiration, clock.now() + TimeDelta::hours(1));
        assert!(service.is_admin(Some(&issued.token)));
        assert_eq!(service.authorize(&issued.token).unwrap().username, "mod");

        clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));
        assert!(!service.is_admin(Some(&issued.token)));
        assert_eq!(service.authorize(&issued.token).unwrap_err().status_code(), 401);
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let (service, _) = build(false);
        let wrong = service.login("mod", "letmein").await.unwrap_err();
        let unknown = service.login("ghost", "hunter2").await.unwrap_err();
        assert!(matches!(wrong, DomainError::Unauthorized(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let (service, _) = build(false);
        let issued = service.login("mod", "hunter2").await.unwrap();
        service.logout(&issued.token);
        assert!(!service.is_admin(Some(&issued.token)));
    }

    #[test]
    fn dev_mode_grants_admin_to_everyone() {
        let (service, _) = build(true);
        assert!(service.is_admin(None));
        let (service, _) = build(false);
        assert!(!service.is_admin(None));
        assert!(!service.is_admin(Some("forged")));
    }
}
