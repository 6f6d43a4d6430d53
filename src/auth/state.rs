//! Authentication state trait and macro.

use std::time::Duration;

use crate::jwt::TokenManager;

/// Trait for state types that can validate bearer tokens and set request deadlines.
pub trait HasAuthBackend {
    fn tokens(&self) -> &TokenManager;
    /// Server-side upper bound on how long a request may run.
    fn request_timeout(&self) -> Duration;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `auth: Arc<AuthService>`
/// - `request_timeout: Duration`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub auth: Arc<AuthService>,
///     pub request_timeout: Duration,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn tokens(&self) -> &$crate::jwt::TokenManager {
                self.auth.token_manager()
            }
            fn request_timeout(&self) -> ::std::time::Duration {
                self.request_timeout
            }
        }
    };
}
