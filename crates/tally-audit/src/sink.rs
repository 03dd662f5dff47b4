use std::sync::RwLock;

use tracing::info;

use crate::error::AuditError;
use crate::event::AuditEvent;

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Short name used in failure reports.
    fn name(&self) -> &str;

    fn write(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Keeps events in memory, in write order.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event written so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditSink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .write()
            .map_err(|_| AuditError::Sink {
                sink: self.name().to_string(),
                reason: "lock poisoned".into(),
            })?
            .push(event.clone());
        Ok(())
    }
}

/// Emits each event as a structured `tracing` event under `tally::audit`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let old = event.old_value.as_ref().map(serde_json::to_string).transpose()?;
        let new = event.new_value.as_ref().map(serde_json::to_string).transpose()?;
        info!(
            target: "tally::audit",
            id = %event.id,
            action = %event.action,
            actor = %event.actor,
            venue = ?event.venue_id,
            terminal = ?event.actor.terminal_id,
            ip = ?event.actor.ip_address,
            user_agent = ?event.actor.user_agent,
            old = ?old,
            new = ?new,
            success = event.success,
            error = ?event.error_message,
            at = %event.at,
            "audit event"
        );
        Ok(())
    }
}
