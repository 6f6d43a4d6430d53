//! Access token signing and validation, plus opaque refresh token generation.
//!
//! Access tokens are stateless HS256 JWTs: validity is proven by signature and
//! expiry alone, never by a lookup. Refresh tokens are random strings with no
//! structure; the session store is what gives them meaning.

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Random bytes in a refresh token, before base64url encoding.
const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The JWT token string
    pub token: String,
    /// Token lifetime in seconds
    pub duration: u64,
}

/// Issues and validates tokens with a single HMAC signing secret.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenManager {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a signed access token for `subject` that expires `ttl` from now.
    pub fn issue_access(&self, subject: &str, ttl: Duration) -> Result<AccessTokenResult, TokenError> {
        let now = now_secs()?;
        let duration = ttl.as_secs();

        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + duration,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(AccessTokenResult { token, duration })
    }

    /// Validate an access token and return its subject.
    ///
    /// Claims are decoded loosely so that a token with a valid signature but a
    /// missing or non-string `sub` is reported as `MalformedClaims` rather than
    /// as a generic decoding failure.
    pub fn parse_access(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &self.decoding_key,
            &validation,
        )
        .map_err(TokenError::InvalidToken)?;

        match token_data.claims.get("sub") {
            Some(serde_json::Value::String(sub)) => Ok(sub.clone()),
            _ => Err(TokenError::MalformedClaims),
        }
    }

    /// Generate a fresh opaque refresh token.
    pub fn issue_refresh(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, unexpected algorithm, expired, or not a JWT at all
    #[error("invalid token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
    #[error("token subject is missing or not a string")]
    MalformedClaims,
    #[error("system time error")]
    TimeError,
}
