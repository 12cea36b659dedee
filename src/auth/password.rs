//! Password hashing (bcrypt)

use anyhow::{Context, Result};

/// Work factor for stored hashes
pub const BCRYPT_COST: u32 = 12;

pub fn hash_password(plain: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plain, cost).context("Failed to hash password")
}

/// Constant-time check; a malformed stored hash counts as a mismatch
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

/// Whether `value` already looks like a bcrypt hash
pub fn is_bcrypt_hash(value: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}
