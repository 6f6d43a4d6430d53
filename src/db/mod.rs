mod book;
mod session;
mod user;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

pub use book::{Book, BookChanges, BookDraft, BookStore};
pub use session::{Session, SessionStore};
pub use user::{User, UserStore};

/// Errors surfaced by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("record already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Database(e),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new unverified user. Fails with `Conflict` if the username is taken.
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    /// Find the user whose username and stored hash both match.
    async fn get_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Mark a user verified. Returns false if no such user exists.
    async fn verify(&self, username: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, author_id: Uuid, draft: &BookDraft) -> Result<Book, StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Book>, StoreError>;
    async fn get_all(&self) -> Result<Vec<Book>, StoreError>;
    /// Overwrite a book owned by `author_id`. `None` if no such book is owned by them.
    async fn update(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: &BookChanges,
    ) -> Result<Option<Book>, StoreError>;
    /// Delete a book owned by `author_id`. Returns false if nothing matched.
    async fn delete(&self, id: Uuid, author_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Atomically drop every session of `session.user_id` and store `session`.
    async fn replace(&self, session: &Session) -> Result<(), StoreError>;
    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError>;
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
    /// Delete sessions that expired before `now`. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Usernames are case-sensitive
                "CREATE TABLE users (
                    id BLOB PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    verified INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )",
                "CREATE TABLE books (
                    id BLOB PRIMARY KEY NOT NULL,
                    title TEXT NOT NULL,
                    author_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    publish_date TEXT NOT NULL,
                    rating INTEGER NOT NULL CHECK (rating BETWEEN 0 AND 5),
                    created_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_books_author_id ON books(author_id)",
                // Refresh sessions, expires_at in Unix seconds
                "CREATE TABLE refresh_tokens (
                    id BLOB PRIMARY KEY NOT NULL,
                    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT UNIQUE NOT NULL,
                    expires_at INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the book store.
    pub fn books(&self) -> BookStore {
        BookStore::new(self.pool.clone())
    }

    /// Get the refresh session store.
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().create("alice", "hash").await.unwrap();
        let result = db.users().create("alice", "other").await;

        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_rating_check_constraint() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.users().create("alice", "hash").await.unwrap();

        let result = sqlx::query(
            "INSERT INTO books (id, title, author_id, publish_date, rating, created_at)
             VALUES (?, 'Dune', ?, '2020-01-01T00:00:00Z', 9, '2020-01-01T00:00:00Z')",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .execute(db.pool())
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.users().create("alice", "hash").await.unwrap();
        db.books()
            .create(
                user.id,
                &BookDraft {
                    title: "Dune".to_string(),
                    publish_date: Utc::now(),
                    rating: 5,
                },
            )
            .await
            .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.books().get_all().await.unwrap().is_empty());
    }
}
