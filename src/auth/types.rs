//! Authentication user types.

use uuid::Uuid;

/// Caller identity proven by a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Token subject
    pub user_id: Uuid,
}
