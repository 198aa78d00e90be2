/// Password hashing and verification.
///
/// bcrypt with a per-call random salt. No strength policy is applied
/// here; callers own any input rules.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hash a password using bcrypt.
///
/// # Errors
/// Returns error if bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against its hash.
///
/// # Errors
/// Returns error if the hash string is not a valid bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))
}
