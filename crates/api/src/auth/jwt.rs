//! Session token verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by the identity provider's session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID as string, parsed to UUID by the middleware)
    pub sub: String,
    /// Email, when the provider includes it
    pub email: Option<String>,
    /// Provider role (authenticated, anon, ...)
    pub role: Option<String>,
    /// Expiration
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Invalid or expired token: {0}")]
    Invalid(String),
}

/// Verifies session tokens against the provider's shared HS256 secret
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Decode and validate a session token
    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        // Explicit algorithm prevents algorithm confusion attacks
        let mut validation = Validation::new(Algorithm::HS256);
        // Provider tokens carry an audience we don't control
        validation.validate_aud = false;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| JwtError::Invalid(e.to_string()))?;

        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test-session-secret-at-least-32-characters-long";

    fn token_with_exp(exp: i64) -> String {
        let claims = SessionClaims {
            sub: "d3b07384-d9a0-4c9f-8d6b-5e9c1a2b3c4d".to_string(),
            email: Some("user@example.com".to_string()),
            role: Some("authenticated".to_string()),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_roundtrip() {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        let verifier = SessionVerifier::new(SECRET);

        let claims = verifier.verify(&token_with_exp(exp)).unwrap();
        assert_eq!(claims.sub, "d3b07384-d9a0-4c9f-8d6b-5e9c1a2b3c4d");
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = OffsetDateTime::now_utc().unix_timestamp() - 3600;
        let verifier = SessionVerifier::new(SECRET);
        assert!(verifier.verify(&token_with_exp(exp)).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        let verifier = SessionVerifier::new("another-secret-that-is-also-32-chars-long");
        assert!(verifier.verify(&token_with_exp(exp)).is_err());
    }
}
