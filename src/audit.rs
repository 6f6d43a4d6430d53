//! Audit notifications for actions taken by the services.
//!
//! Delivery is best-effort: [`notify`] hands the event to the sink on a
//! separate task and only logs failures, so a slow or broken sink can never
//! delay or fail the request that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Register,
    Login,
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Login => write!(f, "login"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    User,
    Book,
}

impl fmt::Display for AuditEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Book => write!(f, "book"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Build an event stamped with the current time.
    pub fn now(action: AuditAction, entity: AuditEntity, entity_id: impl fmt::Display) -> Self {
        Self {
            action,
            entity,
            entity_id: entity_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit queue is full")]
    QueueFull,
    #[error("audit queue is closed")]
    QueueClosed,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn send(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Emits every event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn send(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            audit.action = %event.action,
            audit.entity = %event.entity,
            audit.entity_id = %event.entity_id,
            audit.timestamp = %event.timestamp.to_rfc3339(),
            "audit_event"
        );
        Ok(())
    }
}

/// Pushes events onto a bounded in-process queue without waiting for room.
///
/// The receiving half is handed to whatever forwards events onward (a broker
/// client, a file writer, or a test asserting on what was sent).
#[derive(Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AuditSink for ChannelAuditSink {
    async fn send(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AuditError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AuditError::QueueClosed,
        })
    }
}

/// Deliver `event` in the background, logging and discarding any failure.
pub fn notify(sink: &Arc<dyn AuditSink>, event: AuditEvent) {
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        let action = event.action;
        let entity = event.entity;
        if let Err(e) = sink.send(event).await {
            warn!(%action, %entity, error = %e, "Failed to send audit event");
        }
    });
}
