/// Token encoding and decoding.
///
/// `TokenCodec` mints and verifies signed, expiring tokens. Access and
/// refresh tokens carry the same claims shape but are signed with
/// distinct secrets, so the two kinds are not interchangeable. Decode
/// failures are a sentinel `None`, never an error: malformed input,
/// a bad signature, a missing expiry, and an expired token all look
/// the same to callers.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenCodec {
    /// Build a codec from configuration, parsing the algorithm name.
    ///
    /// # Errors
    /// Returns error if the algorithm name is unknown or not an HMAC
    /// variant (the secrets are symmetric).
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AppError> {
        let algorithm = settings.algorithm.parse::<Algorithm>().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "unknown signing algorithm: {}",
                settings.algorithm
            ))
        })?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::InvalidValue(format!(
                "signing algorithm {} is not an HMAC variant",
                settings.algorithm
            ))
            .into());
        }

        Ok(Self {
            algorithm,
            access_encoding: EncodingKey::from_secret(settings.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(settings.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(settings.refresh_secret.as_bytes()),
            access_ttl: chrono::Duration::minutes(settings.access_ttl_minutes),
            refresh_ttl: chrono::Duration::minutes(settings.refresh_ttl_minutes),
        })
    }

    /// Mint an access token for a subject.
    /// `ttl = None` uses the configured access TTL.
    ///
    /// # Errors
    /// Returns error if token generation fails
    pub fn issue_access(
        &self,
        subject: i64,
        ttl: Option<chrono::Duration>,
    ) -> Result<String, AppError> {
        let claims = Claims::new(subject, ttl.unwrap_or(self.access_ttl));
        encode(&Header::new(self.algorithm), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
    }

    /// Mint a refresh token for a subject.
    /// `ttl = None` uses the configured refresh TTL.
    ///
    /// # Errors
    /// Returns error if token generation fails
    pub fn issue_refresh(
        &self,
        subject: i64,
        ttl: Option<chrono::Duration>,
    ) -> Result<String, AppError> {
        let claims = Claims::new(subject, ttl.unwrap_or(self.refresh_ttl));
        encode(&Header::new(self.algorithm), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
    }

    /// Verify an access token. `None` on any failure.
    pub fn decode_access(&self, token: &str) -> Option<Claims> {
        self.decode_with(token, &self.access_decoding)
    }

    /// Verify a refresh token. `None` on any failure.
    pub fn decode_refresh(&self, token: &str) -> Option<Claims> {
        self.decode_with(token, &self.refresh_decoding)
    }

    fn decode_with(&self, token: &str, key: &DecodingKey) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        // The library default allows 60s of expiry leeway; expiry
        // here is exact.
        validation.leeway = 0;

        match decode::<Claims>(token, key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Token rejected: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-at-least-32-chars-long".to_string(),
            refresh_secret: "refresh-secret-at-least-32-chars-long".to_string(),
            algorithm: "HS256".to_string(),
            access_ttl_minutes: 30,
            refresh_ttl_minutes: 10080,
        }
    }

    fn test_codec() -> TokenCodec {
        TokenCodec::from_settings(&test_settings()).expect("failed to build codec")
    }

    #[test]
    fn test_issue_and_decode_access_token() {
        let codec = test_codec();

        let token = codec.issue_access(42, None).expect("failed to issue");
        let claims = codec.decode_access(&token).expect("failed to decode");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.subject_id(), Some(42));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_default_ttls_come_from_settings() {
        let codec = test_codec();

        let access = codec.issue_access(1, None).expect("failed to issue");
        let refresh = codec.issue_refresh(1, None).expect("failed to issue");

        let access_claims = codec.decode_access(&access).expect("failed to decode");
        let refresh_claims = codec.decode_refresh(&refresh).expect("failed to decode");

        assert_eq!(access_claims.exp - access_claims.iat, 30 * 60);
        assert_eq!(refresh_claims.exp - refresh_claims.iat, 10080 * 60);
    }

    #[test]
    fn test_expired_token_decodes_to_none() {
        let codec = test_codec();

        let token = codec
            .issue_access(7, Some(chrono::Duration::minutes(-5)))
            .expect("failed to issue");

        assert!(codec.decode_access(&token).is_none());
    }

    #[test]
    fn test_access_and_refresh_are_not_interchangeable() {
        let codec = test_codec();

        let access = codec.issue_access(7, None).expect("failed to issue");
        let refresh = codec.issue_refresh(7, None).expect("failed to issue");

        assert_ne!(access, refresh);
        assert!(codec.decode_refresh(&access).is_none());
        assert!(codec.decode_access(&refresh).is_none());
    }

    #[test]
    fn test_same_subject_tokens_are_distinct_strings() {
        let codec = test_codec();

        let first = codec.issue_access(7, None).expect("failed to issue");
        let second = codec.issue_access(7, None).expect("failed to issue");

        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_token() {
        let codec = test_codec();
        assert!(codec.decode_access("invalid.token.here").is_none());
        assert!(codec.decode_access("").is_none());
    }

    #[test]
    fn test_tampered_token() {
        let codec = test_codec();

        let token = codec.issue_access(7, None).expect("failed to issue");
        let tampered = format!("{}X", token);

        assert!(codec.decode_access(&tampered).is_none());
    }

    #[test]
    fn test_forged_token_with_refresh_secret() {
        let codec = test_codec();
        let settings = test_settings();

        // Attacker holds the refresh secret and forges an access token.
        let claims = Claims::new(7, chrono::Duration::minutes(30));
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(settings.refresh_secret.as_bytes()),
        )
        .expect("failed to encode");

        assert!(codec.decode_access(&forged).is_none());
    }

    #[test]
    fn test_token_without_expiry_is_invalid() {
        #[derive(serde::Serialize)]
        struct BareClaims {
            sub: String,
            iat: i64,
        }

        let codec = test_codec();
        let settings = test_settings();

        let bare = BareClaims {
            sub: "7".to_string(),
            iat: chrono::Utc::now().timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &bare,
            &EncodingKey::from_secret(settings.access_secret.as_bytes()),
        )
        .expect("failed to encode");

        assert!(codec.decode_access(&token).is_none());
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let mut settings = test_settings();
        settings.algorithm = "RS256".to_string();
        assert!(TokenCodec::from_settings(&settings).is_err());

        settings.algorithm = "not-an-algorithm".to_string();
        assert!(TokenCodec::from_settings(&settings).is_err());
    }

    #[test]
    fn test_hs512_accepted() {
        let mut settings = test_settings();
        settings.algorithm = "HS512".to_string();

        let codec = TokenCodec::from_settings(&settings).expect("failed to build codec");
        let token = codec.issue_access(7, None).expect("failed to issue");

        assert_eq!(
            codec.decode_access(&token).expect("failed to decode").sub,
            "7"
        );
    }
}
