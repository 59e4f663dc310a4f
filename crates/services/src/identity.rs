//! Identity hashing: the only place raw network addresses are seen.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use domains::IdentityHash;

pub struct IdentityHasher {
    /// Secret mixed into every hash so identities cannot be brute-forced
    /// back to addresses from a leaked database
    salt: SecretString,
}

impl IdentityHasher {
    pub fn new(salt: SecretString) -> Self {
        Self { salt }
    }

    /// Hex SHA-256 of salt and address.
    pub fn hash(&self, address: &str) -> IdentityHash {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.expose_secret().as_bytes());
        hasher.update(address.as_bytes());
        IdentityHash::new(hex::encode(hasher.finalize()))
    }
}

/// The requester's address: first `X-Forwarded-For` entry if present,
/// otherwise the peer address with any port stripped.
pub fn client_address(forwarded_for: Option<&str>, peer: &str) -> String {
    if let Some(first) = forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
    {
        return first.to_string();
    }

    match peer.parse::<std::net::SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => peer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(salt: &str) -> IdentityHasher {
        IdentityHasher::new(SecretString::from(salt.to_string()))
    }

    #[test]
    fn hash_is_stable_and_salted() {
        let a = hasher("pepper");
        assert_eq!(a.hash("10.0.0.1"), a.hash("10.0.0.1"));
        assert_ne!(a.hash("10.0.0.1"), a.hash("10.0.0.2"));
        assert_ne!(a.hash("10.0.0.1"), hasher("other").hash("10.0.0.1"));
        assert_eq!(a.hash("10.0.0.1").as_str().len(), 64);
    }

    #[test]
    fn unsalted_hash_matches_plain_sha256() {
        // sha256("abc")
        assert_eq!(
            hasher("").hash("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn forwarded_for_takes_precedence() {
        assert_eq!(client_address(Some("203.0.113.7, 10.0.0.1"), "127.0.0.1:5000"), "203.0.113.7");
    }

    #[test]
    fn peer_port_is_stripped() {
        assert_eq!(client_address(None, "192.0.2.4:51234"), "192.0.2.4");
        assert_eq!(client_address(None, "[2001:db8::1]:443"), "2001:db8::1");
        assert_eq!(client_address(Some("  "), "192.0.2.4"), "192.0.2.4");
    }
}
