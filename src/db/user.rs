use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{StoreError, UserRepository};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    verified: i32,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            verified: row.verified != 0,
            created_at: row.created_at,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            verified: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, verified, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, verified, created_at FROM users WHERE username = ? AND password_hash = ?",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, verified, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, verified, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn verify(&self, username: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET verified = 1 WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let created = db.users().create("alice", "digest").await.unwrap();
        assert!(!created.verified);

        let user = db.users().get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.password_hash, "digest");
        assert!(!user.verified);
    }

    #[tokio::test]
    async fn test_get_by_credentials_requires_both() {
        let db = Database::open(":memory:").await.unwrap();
        let created = db.users().create("alice", "digest").await.unwrap();

        let found = db
            .users()
            .get_by_credentials("alice", "digest")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        assert!(
            db.users()
                .get_by_credentials("alice", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            db.users()
                .get_by_credentials("bob", "digest")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_get_by_username() {
        let db = Database::open(":memory:").await.unwrap();
        let created = db.users().create("alice", "digest").await.unwrap();

        let found = db.users().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(db.users().get_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create("alice", "digest").await.unwrap();
        db.users().create("Alice", "digest").await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_leaves_first_record_unchanged() {
        let db = Database::open(":memory:").await.unwrap();
        let first = db.users().create("alice", "digest-1").await.unwrap();

        let result = db.users().create("alice", "digest-2").await;
        assert!(matches!(result, Err(StoreError::Conflict)));

        let user = db.users().get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "digest-1");
    }

    #[tokio::test]
    async fn test_verify_user() {
        let db = Database::open(":memory:").await.unwrap();
        let created = db.users().create("alice", "digest").await.unwrap();

        assert!(db.users().verify("alice").await.unwrap());
        assert!(db.users().get_by_id(created.id).await.unwrap().unwrap().verified);

        // Verifying again is harmless
        assert!(db.users().verify("alice").await.unwrap());
        assert!(!db.users().verify("nobody").await.unwrap());
    }
}
