/// Registration input validators.
///
/// Limits mirror the store's column widths so a request that passes
/// validation cannot fail on length at insert time.

use crate::error::ValidationError;
use lazy_static::lazy_static;
use regex::Regex;

const MAX_EMAIL_LENGTH: usize = 100;
const MAX_USERNAME_LENGTH: usize = 50;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();
}

/// Validates an email address for registration.
/// Returns the trimmed email on success.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    Ok(trimmed.to_string())
}

/// Validates a username for registration.
/// Returns the trimmed username on success.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }

    // Control characters end up in logs and DB rows verbatim.
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(trimmed.to_string())
}
