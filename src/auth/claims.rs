/// Token claims structure.
///
/// Payload of both access and refresh tokens (RFC 7519 registered
/// claims only; which secret signed the token decides its kind).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id as a decimal string).
    pub sub: String,
    /// Expiration time (Unix timestamp). Required at decode.
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Token id. Keeps two tokens minted for the same subject in the
    /// same second distinct as strings.
    pub jti: String,
}

impl Claims {
    /// Create claims for a subject expiring `ttl` from now.
    pub fn new(subject: i64, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: subject.to_string(),
            exp: now + ttl.num_seconds(),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract the numeric user id from the subject claim.
    /// `None` when the subject is empty or not a number.
    pub fn subject_id(&self) -> Option<i64> {
        self.sub.parse::<i64>().ok()
    }

    /// Check whether the token has expired.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
