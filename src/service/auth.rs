//! Registration, verification and session issuance.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ServiceError, within};
use crate::audit::{self, AuditAction, AuditEntity, AuditEvent, AuditSink};
use crate::cache::Cache;
use crate::db::{Session, SessionRepository, StoreError, User, UserRepository};
use crate::deadline::Deadline;
use crate::jwt::TokenManager;
use crate::otp::OtpGenerator;
use crate::password::PasswordHasher;

/// Number of characters in a verification code.
pub const VERIFICATION_CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct AuthTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub code: Duration,
}

impl Default for AuthTtls {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(15 * 60),
            refresh: Duration::from_secs(14 * 24 * 60 * 60),
            code: Duration::from_secs(10 * 60),
        }
    }
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    pub refresh_token: String,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: u64,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    codes: Arc<dyn Cache>,
    hasher: PasswordHasher,
    otp: Arc<dyn OtpGenerator>,
    tokens: Arc<TokenManager>,
    audit: Arc<dyn AuditSink>,
    ttls: AuthTtls,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        codes: Arc<dyn Cache>,
        hasher: PasswordHasher,
        otp: Arc<dyn OtpGenerator>,
        tokens: Arc<TokenManager>,
        audit: Arc<dyn AuditSink>,
        ttls: AuthTtls,
    ) -> Self {
        Self {
            users,
            sessions,
            codes,
            hasher,
            otp,
            tokens,
            audit,
            ttls,
        }
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Register an unverified user and issue them a verification code.
    ///
    /// Signing up again under a name that is still unverified replaces the
    /// pending code and then fails with `AlreadyExists`. The code is written
    /// to the log for the operator to deliver.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn sign_up(
        &self,
        deadline: Deadline,
        username: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let password_hash = self.hasher.hash_blocking(password).await?;

        let user = match deadline.run(self.users.create(username, &password_hash)).await? {
            Ok(user) => user,
            Err(StoreError::Conflict) => {
                let existing = within(deadline, self.users.get_by_username(username)).await?;
                if let Some(existing) = existing.filter(|u| !u.verified) {
                    self.issue_code(deadline, &existing).await?;
                }
                return Err(ServiceError::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        self.issue_code(deadline, &user).await?;
        audit::notify(
            &self.audit,
            AuditEvent::now(AuditAction::Register, AuditEntity::User, user.id),
        );

        Ok(user)
    }

    /// Store a fresh code for `user`, replacing any pending one.
    async fn issue_code(&self, deadline: Deadline, user: &User) -> Result<(), ServiceError> {
        let code = self.otp.random_secret(VERIFICATION_CODE_LENGTH);
        within(
            deadline,
            self.codes.set(&user.username, code.clone(), self.ttls.code),
        )
        .await?;

        info!(user_id = %user.id, %code, "Verification code issued");
        Ok(())
    }

    /// Consume a verification code and mark the user verified.
    ///
    /// A missing, expired or mismatched code all fail the same way.
    #[instrument(skip(self, code), fields(username = %username))]
    pub async fn verify(
        &self,
        deadline: Deadline,
        username: &str,
        code: &str,
    ) -> Result<(), ServiceError> {
        let stored = within(deadline, self.codes.get(username)).await?;
        if stored.as_deref() != Some(code) {
            return Err(ServiceError::CodeIncorrect);
        }

        within(deadline, self.codes.delete(username)).await?;

        if !within(deadline, self.users.verify(username)).await? {
            return Err(ServiceError::UserNotFound);
        }

        info!("User verified");
        Ok(())
    }

    /// Authenticate by username and password, replacing any existing session.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn sign_in(
        &self,
        deadline: Deadline,
        username: &str,
        password: &str,
    ) -> Result<Tokens, ServiceError> {
        let password_hash = self.hasher.hash_blocking(password).await?;

        let user = within(
            deadline,
            self.users.get_by_credentials(username, &password_hash),
        )
        .await?
        .ok_or(ServiceError::UserNotFound)?;

        audit::notify(
            &self.audit,
            AuditEvent::now(AuditAction::Login, AuditEntity::User, user.id),
        );

        self.create_session(deadline, user.id).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented token is spent as soon as it is found, even if it turns
    /// out to be expired.
    #[instrument(skip_all)]
    pub async fn refresh_tokens(
        &self,
        deadline: Deadline,
        refresh_token: &str,
    ) -> Result<Tokens, ServiceError> {
        let session = within(deadline, self.sessions.get_by_token(refresh_token))
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        within(deadline, self.sessions.delete_by_user(session.user_id)).await?;

        if session.expires_at < Utc::now().timestamp() {
            info!(user_id = %session.user_id, "Refresh token expired");
            return Err(ServiceError::RefreshTokenExpired);
        }

        self.create_session(deadline, session.user_id).await
    }

    /// Issue a token pair and persist its refresh half as the user's only session.
    pub async fn create_session(
        &self,
        deadline: Deadline,
        user_id: Uuid,
    ) -> Result<Tokens, ServiceError> {
        let access = self
            .tokens
            .issue_access(&user_id.to_string(), self.ttls.access)?;
        let refresh_token = self.tokens.issue_refresh();

        let refresh_expires_in = self.ttls.refresh.as_secs();
        let expires_at = Utc::now().timestamp() + refresh_expires_in as i64;
        let session = Session::new(user_id, refresh_token.clone(), expires_at);

        within(deadline, self.sessions.replace(&session)).await?;

        Ok(Tokens {
            access_token: access.token,
            access_expires_in: access.duration,
            refresh_token,
            refresh_expires_in,
        })
    }

    /// Whether `id` still names a user. Not audited.
    pub async fn user_exists(&self, deadline: Deadline, id: Uuid) -> Result<bool, ServiceError> {
        Ok(within(deadline, self.users.get_by_id(id)).await?.is_some())
    }

    pub async fn get_by_id(&self, deadline: Deadline, id: Uuid) -> Result<User, ServiceError> {
        let user = within(deadline, self.users.get_by_id(id))
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        audit::notify(
            &self.audit,
            AuditEvent::now(AuditAction::Get, AuditEntity::User, user.id),
        );

        Ok(user)
    }
}
