//! Axum extractors for authentication and request deadlines.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::deadline::{Deadline, REQUEST_TIMEOUT_HEADER, effective_timeout};
use crate::jwt::TokenError;

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<AuthenticatedUser, AuthErrorKind>
where
    S: HasAuthBackend,
{
    let token = bearer_token(parts).ok_or(AuthErrorKind::NotAuthenticated)?;

    let subject = state.tokens().parse_access(token).map_err(|e| match e {
        TokenError::MalformedClaims => AuthErrorKind::MalformedClaims,
        _ => AuthErrorKind::InvalidToken,
    })?;

    let user_id = Uuid::parse_str(&subject).map_err(|_| AuthErrorKind::MalformedClaims)?;

    Ok(AuthenticatedUser { user_id })
}

/// Extractor for endpoints that require a valid access token.
/// Validation is stateless: signature and expiry only.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .map(Auth)
            .map_err(ApiAuthError::new)
    }
}

/// The deadline for the current request, starting from when it was extracted.
pub struct RequestDeadline(pub Deadline);

impl<S> FromRequestParts<S> for RequestDeadline
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let requested = parts
            .headers
            .get(REQUEST_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok());
        let timeout = effective_timeout(state.request_timeout(), requested);
        Ok(RequestDeadline(Deadline::after(timeout)))
    }
}
