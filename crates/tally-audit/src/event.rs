use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_types::{Actor, VenueId};
use uuid::Uuid;

/// Audited operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EntryRecorded,
    EntryReplayed,
    DrawerCounted,
    AlertResolved,
    ChainVerified,
    IncidentAcknowledged,
    IdempotencySwept,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryRecorded => "entry_recorded",
            Self::EntryReplayed => "entry_replayed",
            Self::DrawerCounted => "drawer_counted",
            Self::AlertResolved => "alert_resolved",
            Self::ChainVerified => "chain_verified",
            Self::IncidentAcknowledged => "incident_acknowledged",
            Self::IdempotencySwept => "idempotency_swept",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log record. Written once, never changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    pub actor: Actor,
    pub venue_id: Option<VenueId>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, actor: Actor, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            actor,
            venue_id: None,
            old_value: None,
            new_value: None,
            success: true,
            error_message: None,
            at,
        }
    }

    pub fn venue(mut self, venue: VenueId) -> Self {
        self.venue_id = Some(venue);
        self
    }

    pub fn old(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}
