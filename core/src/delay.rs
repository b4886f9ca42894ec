//! Delay classifier: flags administrative neglect.
//!
//! A complaint is delayed when it is still pending, has no contractor
//! attached, and has waited strictly longer than the threshold. Read-only:
//! this never touches stored status.

use crate::{
    complaint::{Complaint, ComplaintStatus, DisplayStatus},
    types::Timestamp,
};
use chrono::Duration;

pub const DEFAULT_THRESHOLD_DAYS: i64 = 7;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct DelayClassifier {
    threshold: Duration,
}

impl Default for DelayClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_DAYS)
    }
}

impl DelayClassifier {
    pub fn new(threshold_days: i64) -> Self {
        Self {
            threshold: Duration::days(threshold_days),
        }
    }

    pub fn is_delayed(&self, complaint: &Complaint, now: Timestamp) -> bool {
        complaint.status == ComplaintStatus::Pending
            && complaint.assigned_contractor_id.is_none()
            && now - complaint.created_at > self.threshold
    }

    pub fn display_status(&self, complaint: &Complaint, now: Timestamp) -> DisplayStatus {
        if self.is_delayed(complaint, now) {
            DisplayStatus::Delayed
        } else {
            complaint.status.into()
        }
    }
}

/// `is_delayed` with the default seven-day threshold.
pub fn is_delayed(complaint: &Complaint, now: Timestamp) -> bool {
    DelayClassifier::default().is_delayed(complaint, now)
}

/// Whole days elapsed, floor of elapsed milliseconds. Never negative.
pub fn age_in_days(created_at: Timestamp, now: Timestamp) -> i64 {
    let elapsed = (now - created_at).num_milliseconds();
    elapsed.max(0).div_euclid(MS_PER_DAY)
}
