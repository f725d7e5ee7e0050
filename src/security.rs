//! Password hashing and random tokens.
//!
//! Passwords are bcrypt hashes in the modular crypt format, so `$2y$` hashes written by
//! PHP's `password_hash` verify alongside the `$2b$` hashes produced here. Tokens come
//! from ULID randomness (80 random bits each), hashed and base64url-encoded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::warn;

pub use bcrypt::BcryptError;

/// Work factor of new hashes, the same as PHP's `PASSWORD_DEFAULT`.
pub const HASH_COST: u32 = 10;

/// Hash `password` with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

/// Check `password` against a stored bcrypt hash.
///
/// Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    match bcrypt::verify(password, stored) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "Stored password hash is unusable");
            false
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 43-character URL-safe random token (session ids, CSRF tokens, salts).
#[must_use]
pub fn generate_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(ulid::Ulid::new().to_bytes());
    hasher.update(ulid::Ulid::new().to_bytes());
    URL_SAFE_NO_PAD.encode(&hasher.finalize()[..])
}
