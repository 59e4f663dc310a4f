//! Ban lookups and monotonic ban extension.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{Ban, BanRepository, DomainError, IdentityHash, Result};

#[derive(Clone)]
pub struct BanRegistry {
    repo: Arc<dyn BanRepository>,
}

impl BanRegistry {
    pub fn new(repo: Arc<dyn BanRepository>) -> Self {
        Self { repo }
    }

    /// Bans `identity` until `expiration`, or extends an existing ban.
    /// An earlier expiration never shortens a stored ban.
    pub async fn upsert(
        &self,
        identity: &IdentityHash,
        reason: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()> {
        tracing::info!(identity = identity.short(), %expiration, reason, "ban requested");
        self.repo
            .upsert_ban(Ban { ip_hash: identity.clone(), reason: reason.to_string(), expiration })
            .await
    }

    /// The active ban for `identity`, or `NotFound`.
    pub async fn get(&self, identity: &IdentityHash) -> Result<Ban> {
        self.repo.get_ban(identity).await
    }

    /// `Forbidden` while `identity` has an active ban.
    pub async fn ensure_not_banned(&self, identity: &IdentityHash) -> Result<()> {
        match self.repo.get_ban(identity).await {
            Ok(ban) => Err(DomainError::Forbidden(format!(
                "banned until {} ({})",
                ban.expiration.format("%Y-%m-%d %H:%M UTC"),
                ban.reason
            ))),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
