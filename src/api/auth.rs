//! Account and session endpoints.
//!
//! - POST `/sign-up` - Register an unverified user and issue a verification code
//! - POST `/verify` - Consume a verification code
//! - POST `/sign-in` - Exchange credentials for an access token and refresh cookie
//! - POST `/refresh` - Rotate the refresh cookie and issue a new access token
//! - GET `/me` - Current user

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::{ApiError, validate_length};
use crate::auth::{
    Auth, REFRESH_COOKIE_NAME, RequestDeadline, clear_refresh_cookie, get_cookie, refresh_cookie,
};
use crate::db::User;
use crate::impl_has_auth_backend;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};
use crate::service::{AuthService, ServiceError, Tokens};

pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 64;
const MAX_CODE_LENGTH: usize = 64;

#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
    pub request_timeout: Duration,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let limited = Router::new()
        .route("/sign-up", post(sign_up))
        .route("/verify", post(verify))
        .route("/sign-in", post(sign_in))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_auth,
        ));

    let open = Router::new()
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .with_state(state);

    Router::new().merge(limited).merge(open)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    username: String,
    code: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: Uuid,
    username: String,
    verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            verified: user.verified,
        }
    }
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

// --- Helpers ---

fn validate_credentials(payload: &CredentialsRequest) -> Result<(), ApiError> {
    validate_length("Username", &payload.username, 1, MAX_USERNAME_LENGTH)?;
    validate_length(
        "Password",
        &payload.password,
        MIN_PASSWORD_LENGTH,
        MAX_PASSWORD_LENGTH,
    )
}

/// Access token in the body, refresh token in an HttpOnly cookie.
fn token_response(tokens: Tokens, secure: bool) -> Response {
    let cookie = refresh_cookie(
        &tokens.refresh_token,
        tokens.refresh_expires_in,
        secure,
    );

    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token: tokens.access_token,
            token_type: "Bearer",
            expires_in: tokens.access_expires_in,
        }),
    )
        .into_response()
}

// --- Handlers ---

async fn sign_up(
    State(state): State<AuthState>,
    RequestDeadline(deadline): RequestDeadline,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&payload)?;

    let user = state
        .auth
        .sign_up(deadline, &payload.username, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn verify(
    State(state): State<AuthState>,
    RequestDeadline(deadline): RequestDeadline,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_length("Username", &payload.username, 1, MAX_USERNAME_LENGTH)?;
    validate_length("Code", &payload.code, 1, MAX_CODE_LENGTH)?;

    state
        .auth
        .verify(deadline, &payload.username, &payload.code)
        .await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}

async fn sign_in(
    State(state): State<AuthState>,
    RequestDeadline(deadline): RequestDeadline,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Response, ApiError> {
    validate_credentials(&payload)?;

    let tokens = state
        .auth
        .sign_in(deadline, &payload.username, &payload.password)
        .await
        .map_err(|e| match e {
            ServiceError::UserNotFound => ApiError::unauthorized("Invalid username or password"),
            other => other.into(),
        })?;

    Ok(token_response(tokens, state.secure_cookies))
}

/// Rotate the refresh token. A rejected token also clears the cookie.
async fn refresh(
    State(state): State<AuthState>,
    RequestDeadline(deadline): RequestDeadline,
    headers: HeaderMap,
) -> Response {
    let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return ApiError::unauthorized("No refresh token").into_response();
    };

    match state.auth.refresh_tokens(deadline, refresh_token).await {
        Ok(tokens) => token_response(tokens, state.secure_cookies),
        Err(e) => {
            let clear = matches!(
                e,
                ServiceError::TokenNotFound | ServiceError::RefreshTokenExpired
            );
            let mut response = ApiError::from(e).into_response();
            if clear {
                if let Ok(value) = HeaderValue::from_str(&clear_refresh_cookie(state.secure_cookies))
                {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            response
        }
    }
}

async fn me(
    State(state): State<AuthState>,
    Auth(auth): Auth,
    RequestDeadline(deadline): RequestDeadline,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.auth.get_by_id(deadline, auth.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}
