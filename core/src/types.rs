//! Shared primitive types used across the whole engine.

use chrono::{DateTime, Utc};

/// Opaque identifier for any stored entity (complaint, contractor, nagar, ...).
pub type EntityId = String;

pub type ComplaintId = EntityId;
pub type ContractorId = EntityId;
pub type NagarId = EntityId;
pub type CityId = EntityId;
pub type StateId = EntityId;
pub type OfficerId = EntityId;

/// All engine timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Timestamps are persisted as UTC milliseconds since the epoch.
pub fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Inverse of [`to_millis`]. Out-of-range values clamp to the epoch.
pub fn from_millis(ms: i64) -> Timestamp {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub fn new_id(prefix: &str) -> EntityId {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}
