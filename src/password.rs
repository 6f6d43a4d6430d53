//! Deterministic password hashing.
//!
//! Sign-in works by recomputing the digest and looking the user up by
//! `(username, digest)`, so the hash must be a pure function of the password
//! and a fixed, operator-supplied salt. Argon2id is used for the digest.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;

/// Digest length in bytes.
const OUTPUT_LEN: usize = 32;

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    salt: Vec<u8>,
}

impl PasswordHasher {
    /// Create a hasher with Argon2's default cost parameters.
    pub fn new(salt: &[u8]) -> Result<Self, PasswordError> {
        Self::with_params(salt, Params::DEFAULT_M_COST, Params::DEFAULT_T_COST)
    }

    /// Create a hasher with explicit memory (KiB) and iteration costs.
    pub fn with_params(salt: &[u8], m_cost: u32, t_cost: u32) -> Result<Self, PasswordError> {
        if salt.len() < argon2::MIN_SALT_LEN {
            return Err(PasswordError::SaltTooShort(argon2::MIN_SALT_LEN));
        }

        let params = Params::new(m_cost, t_cost, Params::DEFAULT_P_COST, Some(OUTPUT_LEN))
            .map_err(PasswordError::Argon2)?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            salt: salt.to_vec(),
        })
    }

    /// Hash a plaintext password into a base64url digest.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let mut out = [0u8; OUTPUT_LEN];
        self.argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut out)
            .map_err(PasswordError::Argon2)?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(out))
    }

    /// Hash on the blocking pool so Argon2 does not stall the async workers.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        let current_span = tracing::Span::current();

        tokio::task::spawn_blocking(move || current_span.in_scope(|| hasher.hash(&password)))
            .await
            .map_err(|e| PasswordError::Join(e.to_string()))?
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password salt must be at least {0} bytes")]
    SaltTooShort(usize),
    #[error("argon2 error: {0}")]
    Argon2(argon2::Error),
    #[error("hashing task failed: {0}")]
    Join(String),
}
