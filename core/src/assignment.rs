//! Assignment engine — binds a pending complaint to one contractor.
//!
//! ALGORITHM:
//!   1. Candidates are the contractors registered in the complaint's nagar.
//!      No city-wide or state-wide fallback.
//!   2. Capacity policy filters candidates (unlimited by default).
//!   3. The selector picks one. `FirstMatch` takes the first registered;
//!      `LeastRecentlyAssigned` spreads work by last assignment time.
//!   4. One compare-and-swap UPDATE moves pending → assigned, guarded by the
//!      status still being pending and the contractor still existing.
//!
//! No candidate is not an error: the complaint stays pending for an officer.
//! Nothing here retries.

use crate::{
    complaint::{Complaint, ComplaintStatus},
    config::{AssignmentConfig, CapacityPolicy, SelectionPolicy},
    contractor::Contractor,
    error::{EngineError, EngineResult},
    lifecycle,
    store::CivicStore,
    types::Timestamp,
};
use std::time::{Duration, Instant};

/// A contractor plus the workload facts selection may need.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub contractor: Contractor,
    pub last_assigned_at: Option<Timestamp>,
    pub open_load: i64,
}

/// Tie-break between several eligible contractors in one nagar.
/// Candidates arrive in registration order.
pub trait ContractorSelector: Send + Sync {
    fn name(&self) -> &'static str;

    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FirstMatch;

impl ContractorSelector for FirstMatch {
    fn name(&self) -> &'static str {
        "first_match"
    }

    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        candidates.first()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecentlyAssigned;

impl ContractorSelector for LeastRecentlyAssigned {
    fn name(&self) -> &'static str {
        "least_recently_assigned"
    }

    fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        // None sorts before Some, so never-assigned contractors win.
        // min_by_key keeps the first of equal keys: registration order breaks ties.
        candidates.iter().min_by_key(|c| c.last_assigned_at)
    }
}

pub fn selector_for(policy: SelectionPolicy) -> Box<dyn ContractorSelector> {
    match policy {
        SelectionPolicy::FirstMatch => Box::new(FirstMatch),
        SelectionPolicy::LeastRecentlyAssigned => Box::new(LeastRecentlyAssigned),
    }
}

/// Drop candidates already at capacity. Order is preserved.
pub fn within_capacity(candidates: Vec<Candidate>, capacity: CapacityPolicy) -> Vec<Candidate> {
    match capacity {
        CapacityPolicy::Unlimited => candidates,
        CapacityPolicy::MaxOpen(max) => candidates
            .into_iter()
            .filter(|c| c.open_load < i64::from(max))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Assigned {
        contractor: Contractor,
        assigned_at: Timestamp,
    },
    /// No contractor in the nagar, none with capacity, or the chosen one
    /// was removed before the update landed.
    NoEligibleContractor,
    /// Lookup plus update ran past the budget; the complaint was left pending.
    TimedOut,
}

impl AssignmentOutcome {
    pub fn contractor(&self) -> Option<&Contractor> {
        match self {
            Self::Assigned { contractor, .. } => Some(contractor),
            _ => None,
        }
    }
}

pub struct AssignmentEngine {
    selector: Box<dyn ContractorSelector>,
    capacity: CapacityPolicy,
    timeout: Duration,
}

impl AssignmentEngine {
    pub fn from_config(config: &AssignmentConfig) -> Self {
        Self {
            selector: selector_for(config.selection),
            capacity: config.capacity,
            timeout: config.timeout(),
        }
    }

    /// Swap in a custom tie-break without touching the engine contract.
    pub fn with_selector(mut self, selector: Box<dyn ContractorSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Try to find a contractor for `complaint` and assign it.
    ///
    /// Fails with `InvalidTransition` if the complaint is not pending, or
    /// stopped being pending before the update (a concurrent assignment won).
    pub fn auto_assign(
        &self,
        store: &CivicStore,
        complaint: &Complaint,
        now: Timestamp,
    ) -> EngineResult<AssignmentOutcome> {
        let started = Instant::now();
        let complaint_id = complaint.complaint_id.as_str();
        if complaint.status != ComplaintStatus::Pending {
            return Err(lifecycle::invalid(
                complaint_id,
                complaint.status,
                ComplaintStatus::Assigned,
            ));
        }

        let candidates = self.candidates(store, &complaint.nagar_id)?;
        if candidates.is_empty() {
            log::info!(
                "complaint {complaint_id}: no eligible contractor in nagar {}",
                complaint.nagar_id
            );
            return Ok(AssignmentOutcome::NoEligibleContractor);
        }
        let Some(chosen) = self.selector.select(&candidates) else {
            return Ok(AssignmentOutcome::NoEligibleContractor);
        };

        if started.elapsed() > self.timeout {
            log::warn!(
                "complaint {complaint_id}: contractor lookup took {:?}, leaving pending",
                started.elapsed()
            );
            return Ok(AssignmentOutcome::TimedOut);
        }

        let contractor = chosen.contractor.clone();
        let change =
            lifecycle::plan_assignment(complaint_id, complaint.status, &contractor.contractor_id)?;
        // The update gets whatever budget the lookup left over.
        let remaining = self.timeout.saturating_sub(started.elapsed());
        let Some(applied) = store.apply_status_change_within(complaint_id, &change, now, remaining)?
        else {
            log::warn!(
                "complaint {complaint_id}: store busy past the {:?} budget, leaving pending",
                self.timeout
            );
            return Ok(AssignmentOutcome::TimedOut);
        };
        if applied {
            log::debug!(
                "complaint {complaint_id}: {} picked contractor {}",
                self.selector.name(),
                contractor.contractor_id
            );
            return Ok(AssignmentOutcome::Assigned {
                contractor,
                assigned_at: now,
            });
        }

        match explain_failed_swap(store, complaint_id, &contractor.contractor_id)? {
            SwapFailure::StatusMoved(actual) => Err(lifecycle::invalid(
                complaint_id,
                actual,
                ComplaintStatus::Assigned,
            )),
            SwapFailure::ContractorGone => {
                log::warn!(
                    "complaint {complaint_id}: contractor {} removed mid-assignment",
                    contractor.contractor_id
                );
                Ok(AssignmentOutcome::NoEligibleContractor)
            }
            SwapFailure::ComplaintGone => Err(EngineError::not_found("complaint", complaint_id)),
        }
    }

    /// Officer-chosen assignment through the same compare-and-swap.
    pub fn assign(
        &self,
        store: &CivicStore,
        complaint: &Complaint,
        contractor: &Contractor,
        now: Timestamp,
    ) -> EngineResult<()> {
        let complaint_id = complaint.complaint_id.as_str();
        let change =
            lifecycle::plan_assignment(complaint_id, complaint.status, &contractor.contractor_id)?;
        if store.apply_status_change(complaint_id, &change, now)? {
            return Ok(());
        }
        match explain_failed_swap(store, complaint_id, &contractor.contractor_id)? {
            SwapFailure::StatusMoved(actual) => Err(lifecycle::invalid(
                complaint_id,
                actual,
                ComplaintStatus::Assigned,
            )),
            SwapFailure::ContractorGone => {
                Err(EngineError::not_found("contractor", &contractor.contractor_id))
            }
            SwapFailure::ComplaintGone => Err(EngineError::not_found("complaint", complaint_id)),
        }
    }

    fn candidates(&self, store: &CivicStore, nagar_id: &str) -> EngineResult<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for contractor in store.contractors_in_nagar(nagar_id)? {
            let last_assigned_at = store.contractor_last_assigned_at(&contractor.contractor_id)?;
            let open_load = store.contractor_open_load(&contractor.contractor_id)?;
            candidates.push(Candidate {
                contractor,
                last_assigned_at,
                open_load,
            });
        }
        Ok(within_capacity(candidates, self.capacity))
    }
}

enum SwapFailure {
    StatusMoved(ComplaintStatus),
    ContractorGone,
    ComplaintGone,
}

fn explain_failed_swap(
    store: &CivicStore,
    complaint_id: &str,
    contractor_id: &str,
) -> EngineResult<SwapFailure> {
    let Some(current) = store.get_complaint(complaint_id)? else {
        return Ok(SwapFailure::ComplaintGone);
    };
    if current.status != ComplaintStatus::Pending {
        return Ok(SwapFailure::StatusMoved(current.status));
    }
    if store.get_contractor(contractor_id)?.is_none() {
        return Ok(SwapFailure::ContractorGone);
    }
    // Status was pending again by the time we looked; report it as a lost race.
    Ok(SwapFailure::StatusMoved(current.status))
}
