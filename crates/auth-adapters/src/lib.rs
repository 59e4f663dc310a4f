//! # auth-adapters
//!
//! Argon2 credential checks and random session tokens for the admin login
//! flow.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use domains::{CredentialVerifier, DomainError, Result, TokenGenerator};
use tracing::warn;

/// Session tokens carry 256 bits of entropy.
pub const TOKEN_BYTES: usize = 32;

/// Verifies passwords against PHC-formatted Argon2 hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

#[async_trait]
impl CredentialVerifier for Argon2Verifier {
    async fn verify(&self, password: &str, password_hash: &str) -> bool {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        // CPU-bound
        let checked = tokio::task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&password_hash) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(error = %err, "stored admin password hash is malformed");
                    return false;
                }
            };
            Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
        })
        .await;
        checked.unwrap_or(false)
    }
}

/// Hashes `password` with a fresh random salt, returning the PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt).map_err(entropy)?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|err| DomainError::Validation(format!("bad salt: {err}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DomainError::Validation(format!("cannot hash password: {err}")))
}

/// Hex-encoded tokens from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes).map_err(entropy)?;
        Ok(hex::encode(bytes))
    }
}

fn entropy(err: getrandom::Error) -> DomainError {
    DomainError::Storage(format!("OS random source unavailable: {err}"))
}
