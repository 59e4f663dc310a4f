//! # DomainError
//!
//! Centralized error handling for comfyboard.
//! Maps domain-specific failures to actionable error types; the HTTP layer
//! owned by the caller translates them with [`DomainError::status_code`].

use chrono::TimeDelta;
use thiserror::Error;

/// The primary error type for all domain and adapter operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (board, thread, post, ban, admin)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Validation failure (oversized input, missing file, unsupported media)
    #[error("validation error: {0}")]
    Validation(String),

    /// A cooldown is still active for this identity
    #[error("please wait {} seconds", whole_seconds(.remaining))]
    RateLimited { remaining: TimeDelta },

    /// Active ban, or a write to a locked thread by a non-admin
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Invalid admin credentials or session
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Database or transaction failure; the operation was rolled back
    #[error("storage error: {0}")]
    Storage(String),

    /// A media file could not be deleted for a reason other than absence
    #[error("failed to remove media file {path}: {reason}")]
    Cleanup { path: String, reason: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status the caller should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::RateLimited { .. } => 429,
            Self::Forbidden(_) => 403,
            Self::Unauthorized(_) => 401,
            Self::Storage(_) | Self::Cleanup { .. } => 500,
        }
    }
}

/// Remaining wait rounded up to whole seconds, never below one.
fn whole_seconds(remaining: &TimeDelta) -> i64 {
    let millis = remaining.num_milliseconds();
    ((millis + 999) / 1000).max(1)
}

/// A specialized Result type for comfyboard logic.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_message_rounds_up() {
        let err = DomainError::RateLimited { remaining: TimeDelta::milliseconds(14_200) };
        assert_eq!(err.to_string(), "please wait 15 seconds");
        assert_eq!(err.status_code(), 429);
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(DomainError::not_found("thread", 5).status_code(), 404);
        assert_eq!(DomainError::Validation("body is empty".into()).status_code(), 400);
        assert_eq!(DomainError::Forbidden("banned".into()).status_code(), 403);
        assert_eq!(DomainError::Unauthorized("invalid login".into()).status_code(), 401);
        assert_eq!(DomainError::Storage("disk full".into()).status_code(), 500);
        let cleanup = DomainError::Cleanup { path: "a.png".into(), reason: "denied".into() };
        assert_eq!(cleanup.status_code(), 500);
    }
}
