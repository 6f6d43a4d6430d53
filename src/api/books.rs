//! Book catalogue API.
//!
//! Reads are public. Writes need a bearer token, and only the author of a
//! book may change or delete it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::{ApiError, parse_id, validate_length};
use crate::auth::{Auth, RequestDeadline};
use crate::deadline::Deadline;
use crate::impl_has_auth_backend;
use crate::service::{AuthService, BookInput, BookService};

pub const MAX_TITLE_LENGTH: usize = 64;
pub const MAX_RATING: i64 = 5;

/// State for book endpoints.
#[derive(Clone)]
pub struct BooksState {
    pub auth: Arc<AuthService>,
    pub books: Arc<BookService>,
    pub request_timeout: Duration,
}

impl_has_auth_backend!(BooksState);

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(state)
}

// --- Request types ---

#[derive(Deserialize)]
struct BookRequest {
    title: String,
    publish_date: Option<DateTime<Utc>>,
    rating: i64,
}

impl BookRequest {
    fn into_input(self) -> Result<BookInput, ApiError> {
        validate_length("Title", &self.title, 1, MAX_TITLE_LENGTH)?;
        if !(0..=MAX_RATING).contains(&self.rating) {
            return Err(ApiError::bad_request(format!(
                "Rating must be between 0 and {}",
                MAX_RATING
            )));
        }

        Ok(BookInput {
            title: self.title,
            publish_date: self.publish_date,
            rating: self.rating as u8,
        })
    }
}

// --- Helpers ---

/// Confirm the token's subject still names an existing user.
async fn require_user(
    state: &BooksState,
    deadline: Deadline,
    user_id: Uuid,
) -> Result<(), ApiError> {
    if state.auth.user_exists(deadline, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::unauthorized("User not found"))
    }
}

// --- Handlers ---

async fn list_books(
    State(state): State<BooksState>,
    RequestDeadline(deadline): RequestDeadline,
) -> Result<impl IntoResponse, ApiError> {
    let books = state.books.get_all(deadline).await?;
    Ok(Json(books))
}

async fn get_book(
    State(state): State<BooksState>,
    RequestDeadline(deadline): RequestDeadline,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let book = state.books.get_by_id(deadline, id).await?;
    Ok(Json(book))
}

async fn create_book(
    State(state): State<BooksState>,
    Auth(auth): Auth,
    RequestDeadline(deadline): RequestDeadline,
    Json(payload): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = payload.into_input()?;
    require_user(&state, deadline, auth.user_id).await?;

    let book = state.books.create(deadline, input, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<BooksState>,
    Auth(auth): Auth,
    RequestDeadline(deadline): RequestDeadline,
    Path(id): Path<String>,
    Json(payload): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let input = payload.into_input()?;
    require_user(&state, deadline, auth.user_id).await?;

    let book = state
        .books
        .update(deadline, id, auth.user_id, input)
        .await?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<BooksState>,
    Auth(auth): Auth,
    RequestDeadline(deadline): RequestDeadline,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    require_user(&state, deadline, auth.user_id).await?;

    state.books.delete(deadline, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
