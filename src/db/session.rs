//! Refresh session storage.
//!
//! Each session row pairs an opaque refresh token with its owner and an
//! absolute expiry. A user holds at most one session: `replace` clears the
//! user's previous rows in the same transaction that inserts the new one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{SessionRepository, StoreError};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, token: String, expires_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count the sessions held by a user.
    pub async fn count_by_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl SessionRepository for SessionStore {
    async fn replace(&self, session: &Session) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let session: Option<Session> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, UserRepository};

    async fn setup() -> (Database, Uuid) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.users().create("alice", "digest").await.unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_replace_and_lookup() {
        let (db, user_id) = setup().await;
        let expires_at = Utc::now().timestamp() + 3600;

        let session = Session::new(user_id, "token-1".to_string(), expires_at);
        db.sessions().replace(&session).await.unwrap();

        let found = db.sessions().get_by_token("token-1").await.unwrap().unwrap();
        assert_eq!(found, session);
        assert!(db.sessions().get_by_token("token-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_keeps_one_session_per_user() {
        let (db, user_id) = setup().await;
        let expires_at = Utc::now().timestamp() + 3600;

        db.sessions()
            .replace(&Session::new(user_id, "token-1".to_string(), expires_at))
            .await
            .unwrap();
        db.sessions()
            .replace(&Session::new(user_id, "token-2".to_string(), expires_at))
            .await
            .unwrap();

        assert_eq!(db.sessions().count_by_user(user_id).await.unwrap(), 1);
        assert!(db.sessions().get_by_token("token-1").await.unwrap().is_none());
        assert!(db.sessions().get_by_token("token-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_token_conflicts() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.users().create("alice", "digest").await.unwrap();
        let bob = db.users().create("bob", "digest").await.unwrap();
        let expires_at = Utc::now().timestamp() + 3600;

        db.sessions()
            .replace(&Session::new(alice.id, "same".to_string(), expires_at))
            .await
            .unwrap();
        let result = db
            .sessions()
            .replace(&Session::new(bob.id, "same".to_string(), expires_at))
            .await;

        assert!(matches!(result, Err(StoreError::Conflict)));
        // The failed transaction must not have removed anything
        assert_eq!(db.sessions().count_by_user(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_user() {
        let (db, user_id) = setup().await;
        db.sessions()
            .replace(&Session::new(user_id, "token-1".to_string(), 0))
            .await
            .unwrap();

        assert_eq!(db.sessions().delete_by_user(user_id).await.unwrap(), 1);
        assert_eq!(db.sessions().delete_by_user(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.users().create("alice", "digest").await.unwrap();
        let bob = db.users().create("bob", "digest").await.unwrap();
        let now = Utc::now();

        db.sessions()
            .replace(&Session::new(alice.id, "old".to_string(), now.timestamp() - 1))
            .await
            .unwrap();
        db.sessions()
            .replace(&Session::new(bob.id, "fresh".to_string(), now.timestamp() + 60))
            .await
            .unwrap();

        assert_eq!(db.sessions().delete_expired(now).await.unwrap(), 1);
        assert!(db.sessions().get_by_token("fresh").await.unwrap().is_some());
    }
}
