//! Password hashing and verification utilities.
//!
//! Uses Argon2id; the random salt and cost parameters are embedded in the
//! PHC-formatted output, so a stored hash is self-describing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use once_cell::sync::Lazy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to hash secret: {0}")]
    Hashing(String),
}

/// Hash used to equalize the cost of rejecting an unknown subject.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash("keyloom-dummy-credential").ok());

/// Hash a secret using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash(secret: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Verify a candidate secret against a stored hash.
///
/// Never fails: a mismatch and an unparsable hash both yield `false`.
pub fn verify(hashed: &str, candidate: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed) else {
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Run one full verification whose result is discarded.
///
/// Called when the subject does not exist so the response time matches a wrong secret.
pub fn verify_against_dummy(candidate: &str) {
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify(dummy, candidate);
    }
}
