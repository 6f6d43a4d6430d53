//! Book storage. Mutations are scoped to the author in the statement itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{BookRepository, StoreError};

#[derive(Clone)]
pub struct BookStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub publish_date: DateTime<Utc>,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

/// Writable fields of a book, with the publish date already resolved.
#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub publish_date: DateTime<Utc>,
    pub rating: u8,
}

/// Replacement fields for an existing book. A missing publish date keeps the stored one.
#[derive(Debug, Clone)]
pub struct BookChanges {
    pub title: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub rating: u8,
}

impl BookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for BookStore {
    async fn create(&self, author_id: Uuid, draft: &BookDraft) -> Result<Book, StoreError> {
        let book = Book {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            author_id,
            publish_date: draft.publish_date,
            rating: draft.rating,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO books (id, title, author_id, publish_date, rating, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(book.author_id)
        .bind(book.publish_date)
        .bind(book.rating)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;

        Ok(book)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Book>, StoreError> {
        let book: Option<Book> = sqlx::query_as(
            "SELECT id, title, author_id, publish_date, rating, created_at FROM books WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn get_all(&self) -> Result<Vec<Book>, StoreError> {
        let books: Vec<Book> = sqlx::query_as(
            "SELECT id, title, author_id, publish_date, rating, created_at FROM books ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn update(
        &self,
        id: Uuid,
        author_id: Uuid,
        changes: &BookChanges,
    ) -> Result<Option<Book>, StoreError> {
        let book: Option<Book> = sqlx::query_as(
            "UPDATE books SET title = ?, publish_date = COALESCE(?, publish_date), rating = ?
             WHERE id = ? AND author_id = ?
             RETURNING id, title, author_id, publish_date, rating, created_at",
        )
        .bind(&changes.title)
        .bind(changes.publish_date)
        .bind(changes.rating)
        .bind(id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn delete(&self, id: Uuid, author_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
