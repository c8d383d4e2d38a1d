//! Argon2 password hashing for admin accounts.
//!
//! Hashing is deliberately slow, so both directions run on the blocking thread pool.

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppResult;

pub async fn hash_password(password: String) -> AppResult<String> {
    let hashed = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow!("password hash failed: {e}"))
    })
    .await
    .map_err(|e| anyhow!("password hash task failed: {e}"))??;
    Ok(hashed)
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub async fn verify_password(password: String, stored_hash: String) -> AppResult<bool> {
    let ok = tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored_hash) else {
            tracing::warn!("Stored password hash is not a valid PHC string");
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    })
    .await
    .map_err(|e| anyhow!("password verify task failed: {e}"))?;
    Ok(ok)
}
