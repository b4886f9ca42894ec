//! Engine events — the audit trail.
//!
//! RULE: every state change the engine commits is recorded as one event in
//! the `event_log` table. Events are append-only, like complaints themselves.

use crate::{
    complaint::{Category, ComplaintStatus, PhotoStage},
    types::{ComplaintId, ContractorId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ComplaintFiled {
        complaint_id: ComplaintId,
        reference_number: String,
        category: Category,
        nagar_id: String,
        at: Timestamp,
    },
    ComplaintAssigned {
        complaint_id: ComplaintId,
        contractor_id: ContractorId,
        /// "auto" or the officer id.
        assigned_by: String,
        at: Timestamp,
    },
    AssignmentSkipped {
        complaint_id: ComplaintId,
        reason: String,
        at: Timestamp,
    },
    StatusChanged {
        complaint_id: ComplaintId,
        from: ComplaintStatus,
        to: ComplaintStatus,
        at: Timestamp,
    },
    PhotoAttached {
        complaint_id: ComplaintId,
        stage: PhotoStage,
        at: Timestamp,
    },
}

impl EngineEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ComplaintFiled { .. } => "complaint_filed",
            Self::ComplaintAssigned { .. } => "complaint_assigned",
            Self::AssignmentSkipped { .. } => "assignment_skipped",
            Self::StatusChanged { .. } => "status_changed",
            Self::PhotoAttached { .. } => "photo_attached",
        }
    }

    pub fn complaint_id(&self) -> &str {
        match self {
            Self::ComplaintFiled { complaint_id, .. }
            | Self::ComplaintAssigned { complaint_id, .. }
            | Self::AssignmentSkipped { complaint_id, .. }
            | Self::StatusChanged { complaint_id, .. }
            | Self::PhotoAttached { complaint_id, .. } => complaint_id,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            Self::ComplaintFiled { at, .. }
            | Self::ComplaintAssigned { at, .. }
            | Self::AssignmentSkipped { at, .. }
            | Self::StatusChanged { at, .. }
            | Self::PhotoAttached { at, .. } => *at,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub complaint_id: Option<ComplaintId>,
    pub event_type: String,
    pub payload: String, // JSON-serialized EngineEvent
    pub created_at: Timestamp,
}

impl EventLogEntry {
    pub fn from_event(event: &EngineEvent) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            complaint_id: Some(event.complaint_id().to_string()),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: event.at(),
        })
    }

    pub fn decode(&self) -> serde_json::Result<EngineEvent> {
        serde_json::from_str(&self.payload)
    }
}
