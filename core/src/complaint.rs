//! Complaint data model and submission validation.

use crate::{
    error::{EngineError, EngineResult},
    geo::GeoSnapshot,
    types::{CityId, ComplaintId, ContractorId, NagarId, StateId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const MAX_DESCRIPTION_CHARS: usize = 2_000;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// ── Category ───────────────────────────────────────────────────────

/// Closed set. Adding a category is a schema change (see the CHECK in
/// migrations/003_complaints.sql), not a runtime value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Roads,
    Sewage,
    Sanitation,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Roads, Self::Sewage, Self::Sanitation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roads => "roads",
            Self::Sewage => "sewage",
            Self::Sanitation => "sanitation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "category", value: s.to_string() })
    }
}

// ── Status ─────────────────────────────────────────────────────────

/// Stored lifecycle status. `delayed` is deliberately absent: it is a
/// derived overlay (see [`DisplayStatus`] and `delay::is_delayed`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    Assigned,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] =
        [Self::Pending, Self::Assigned, Self::InProgress, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Statuses that count against a contractor's open workload.
    pub fn is_open_work(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseEnumError { kind: "status", value: s.to_string() })
    }
}

/// Status as shown in dashboards and lists: the stored status with the
/// `Delayed` overlay applied to neglected pending complaints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    Delayed,
    Assigned,
    InProgress,
    Resolved,
}

impl From<ComplaintStatus> for DisplayStatus {
    fn from(s: ComplaintStatus) -> Self {
        match s {
            ComplaintStatus::Pending => Self::Pending,
            ComplaintStatus::Assigned => Self::Assigned,
            ComplaintStatus::InProgress => Self::InProgress,
            ComplaintStatus::Resolved => Self::Resolved,
        }
    }
}

// ── Complaint ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStage {
    Before,
    After,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Complaint {
    pub complaint_id: ComplaintId,
    /// Sequential, human-facing. Never used for lookup.
    pub ref_seq: i64,
    pub category: Category,
    pub description: String,
    pub state_id: StateId,
    pub city_id: CityId,
    pub nagar_id: NagarId,
    pub address: Option<String>,
    pub location: Option<GeoPoint>,
    pub citizen_name: String,
    pub citizen_phone: String,
    pub status: ComplaintStatus,
    pub photo_url: Option<String>,
    pub before_photo_url: Option<String>,
    pub after_photo_url: Option<String>,
    pub assigned_contractor_id: Option<ContractorId>,
    pub created_at: Timestamp,
    pub assigned_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Complaint {
    pub fn reference_number(&self) -> String {
        format_reference(self.ref_seq)
    }
}

pub fn format_reference(ref_seq: i64) -> String {
    format!("CIV-{ref_seq:06}")
}

/// A citizen submission before it becomes a stored complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComplaint {
    pub category: Category,
    pub description: String,
    pub state_id: StateId,
    pub city_id: CityId,
    pub nagar_id: NagarId,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub citizen_name: String,
    pub citizen_phone: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl NewComplaint {
    /// Reject a malformed submission. Runs before any store write.
    pub fn validate(&self, geo: &GeoSnapshot) -> EngineResult<()> {
        if self.citizen_name.trim().is_empty() {
            return Err(EngineError::Validation("citizen name is required".into()));
        }
        validate_phone(&self.citizen_phone)?;

        let description = self.description.trim();
        if description.is_empty() {
            return Err(EngineError::Validation("description is required".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(EngineError::Validation(format!(
                "description exceeds {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        if let Some(p) = self.location {
            let lat_ok = (-90.0..=90.0).contains(&p.latitude);
            let lon_ok = (-180.0..=180.0).contains(&p.longitude);
            if !lat_ok || !lon_ok {
                return Err(EngineError::Validation(format!(
                    "coordinates out of range: {}, {}",
                    p.latitude, p.longitude
                )));
            }
        }

        if geo.nagar(&self.nagar_id).is_none() {
            return Err(EngineError::Validation(format!("unknown nagar '{}'", self.nagar_id)));
        }
        if !geo.is_consistent(&self.state_id, &self.city_id, &self.nagar_id) {
            return Err(EngineError::Validation(format!(
                "nagar '{}' is not in city '{}' / state '{}'",
                self.nagar_id, self.city_id, self.state_id
            )));
        }
        Ok(())
    }
}

/// 10–15 ASCII digits, optionally prefixed with `+`.
pub fn validate_phone(phone: &str) -> EngineResult<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let ok = (10..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(EngineError::Validation(format!("invalid phone number '{phone}'")))
    }
}

/// A complaint as returned to callers: stored row plus derived display status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintView {
    pub reference_number: String,
    pub display_status: DisplayStatus,
    pub age_days: i64,
    #[serde(flatten)]
    pub complaint: Complaint,
}
