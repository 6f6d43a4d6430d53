//! Book catalogue operations. Only a book's author may change or remove it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{ServiceError, within};
use crate::audit::{self, AuditAction, AuditEntity, AuditEvent, AuditSink};
use crate::db::{Book, BookChanges, BookDraft, BookRepository};
use crate::deadline::Deadline;

/// Caller-supplied book fields.
#[derive(Debug, Clone)]
pub struct BookInput {
    pub title: String,
    /// When absent, `create` uses the current time and `update` keeps the stored date.
    pub publish_date: Option<DateTime<Utc>>,
    pub rating: u8,
}

impl BookInput {
    fn into_draft(self) -> BookDraft {
        BookDraft {
            title: self.title,
            publish_date: self.publish_date.unwrap_or_else(Utc::now),
            rating: self.rating,
        }
    }

    fn into_changes(self) -> BookChanges {
        BookChanges {
            title: self.title,
            publish_date: self.publish_date,
            rating: self.rating,
        }
    }
}

pub struct BookService {
    books: Arc<dyn BookRepository>,
    audit: Arc<dyn AuditSink>,
}

impl BookService {
    pub fn new(books: Arc<dyn BookRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { books, audit }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        deadline: Deadline,
        input: BookInput,
        owner_id: Uuid,
    ) -> Result<Book, ServiceError> {
        let draft = input.into_draft();
        let book = within(deadline, self.books.create(owner_id, &draft)).await?;

        self.notify(AuditAction::Create, book.id);
        Ok(book)
    }

    pub async fn get_by_id(&self, deadline: Deadline, id: Uuid) -> Result<Book, ServiceError> {
        within(deadline, self.books.get_by_id(id))
            .await?
            .ok_or(ServiceError::BookNotFound)
    }

    /// Every book, oldest first.
    pub async fn get_all(&self, deadline: Deadline) -> Result<Vec<Book>, ServiceError> {
        within(deadline, self.books.get_all()).await
    }

    /// Overwrite a book, keeping its publish date when none is given.
    /// Fails with `BookNotFound` unless `owner_id` wrote it.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        deadline: Deadline,
        id: Uuid,
        owner_id: Uuid,
        input: BookInput,
    ) -> Result<Book, ServiceError> {
        let changes = input.into_changes();
        let book = within(deadline, self.books.update(id, owner_id, &changes))
            .await?
            .ok_or(ServiceError::BookNotFound)?;

        self.notify(AuditAction::Update, book.id);
        Ok(book)
    }

    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        deadline: Deadline,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<(), ServiceError> {
        if !within(deadline, self.books.delete(id, owner_id)).await? {
            return Err(ServiceError::BookNotFound);
        }

        self.notify(AuditAction::Delete, id);
        Ok(())
    }

    fn notify(&self, action: AuditAction, book_id: Uuid) {
        audit::notify(
            &self.audit,
            AuditEvent::now(action, AuditEntity::Book, book_id),
        );
    }
}
