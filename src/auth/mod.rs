//! Bearer authentication for API routes.
//!
//! Access tokens arrive in the `Authorization` header and are checked without
//! touching the database. Refresh tokens travel in an HttpOnly cookie and are
//! only read by the refresh endpoint.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, RequestDeadline};
pub use ip::{UNKNOWN_CLIENT, client_ip};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
