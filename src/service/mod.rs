//! Business operations over the stores, the code cache and the audit sink.
//!
//! Every operation takes a [`Deadline`] and runs each backend call under it.
//! Backend failures are folded into [`ServiceError::Internal`]; the other
//! variants are the outcomes callers are expected to handle.

mod auth;
mod books;

pub use auth::{AuthService, AuthTtls, Tokens, VERIFICATION_CODE_LENGTH};
pub use books::{BookInput, BookService};

use std::future::Future;

use crate::cache::CacheError;
use crate::db::StoreError;
use crate::deadline::{Deadline, DeadlineExceeded};
use crate::jwt::TokenError;
use crate::password::PasswordError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("user not found")]
    UserNotFound,
    #[error("verification code is incorrect")]
    CodeIncorrect,
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("book not found")]
    BookNotFound,
    #[error("deadline exceeded")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CacheError> for ServiceError {
    fn from(e: CacheError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<PasswordError> for ServiceError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<DeadlineExceeded> for ServiceError {
    fn from(_: DeadlineExceeded) -> Self {
        Self::Timeout
    }
}

/// Run a backend call under `deadline`, converting both failure layers.
async fn within<F, T, E>(deadline: Deadline, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, E>>,
    ServiceError: From<E>,
{
    Ok(deadline.run(fut).await??)
}
