//! Password policy and hashing.
//!
//! Passwords are between 8 and 72 bytes and must score better than "weak" in
//! zxcvbn, with the username, email and product name counted as known terms.
//! Hashes are Argon2id PHC strings.

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 72;

// zxcvbn scores run 0..=4; anything at or below this is refused.
const WEAK_SCORE: u8 = 2;

const COMMON_TERMS: [&str; 2] = [env!("CARGO_PKG_NAME"), "finitum"];

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password longer than {MAX_PASSWORD_LENGTH} bytes")]
    TooLong,
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("password hashing task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Whether `password` satisfies the policy. `hints` are user-specific terms
/// (username, email) that make a password easier to guess.
#[must_use]
pub fn accept(password: &str, hints: &[&str]) -> bool {
    if password.len() < MIN_PASSWORD_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return false;
    }

    let inputs: Vec<&str> = hints
        .iter()
        .copied()
        .filter(|hint| !hint.is_empty())
        .chain(COMMON_TERMS)
        .collect();

    let entropy = zxcvbn::zxcvbn(password, &inputs);
    entropy.score() as u8 > WEAK_SCORE
}

/// Hash a password into an Argon2id PHC string with a fresh salt.
///
/// # Errors
/// Returns [`HashError::TooLong`] past the length cap, [`HashError::Hash`] if
/// hashing fails.
pub fn hash(password: &str) -> Result<String, HashError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(HashError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::Hash(e.to_string()))
}

/// Check a password against a stored hash. Unparseable hashes never match.
#[must_use]
pub fn verify(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash`] on the blocking pool, keeping the runtime responsive.
///
/// # Errors
/// See [`hash`].
pub async fn hash_blocking(password: String) -> Result<String, HashError> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

/// [`verify`] on the blocking pool.
///
/// # Errors
/// Returns [`HashError::Join`] if the blocking task panicked.
pub async fn verify_blocking(password: String, stored_hash: String) -> Result<bool, HashError> {
    Ok(tokio::task::spawn_blocking(move || verify(&password, &stored_hash)).await?)
}
