mod auth;
mod books;
mod error;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;
use crate::service::{AuthService, BookService};

pub use auth::AuthState;
pub use books::BooksState;
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    auth: Arc<AuthService>,
    books: Arc<BookService>,
    request_timeout: Duration,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        auth: auth.clone(),
        request_timeout,
        secure_cookies,
        rate_limit_config,
    };

    let books_state = books::BooksState {
        auth,
        books,
        request_timeout,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/books", books::router(books_state))
}
