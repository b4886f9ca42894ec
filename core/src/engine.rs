//! The complaint engine — entry point for citizen and officer operations.
//!
//! FLOW on filing:
//!   1. Validate the submission against the caller's geography snapshot.
//!   2. Insert as pending; log + notify "created".
//!   3. Run auto-assignment in the same call; on success log + notify
//!      "assigned". Assignment trouble never undoes the filing.
//!
//! RULES:
//!   - Every status change goes through the lifecycle plan and a
//!     compare-and-swap in the store.
//!   - Notifications are handed off, never awaited.
//!   - Reference data is passed in per call; nothing is cached here.

use crate::{
    assignment::{AssignmentEngine, AssignmentOutcome},
    clock::{Clock, ManualClock, SystemClock},
    complaint::{
        format_reference, Complaint, ComplaintStatus, ComplaintView, NewComplaint, PhotoStage,
    },
    config::EngineConfig,
    contractor::{Contractor, ContractorInput, Officer},
    delay::{age_in_days, DelayClassifier},
    error::{EngineError, EngineResult},
    event::{EngineEvent, EventLogEntry},
    geo::GeoSnapshot,
    lifecycle,
    notify::{Notification, Notifier, WebhookDispatcher},
    snapshot::ComplaintSnapshot,
    stats::{DashboardStats, StatisticsAggregator},
    store::CivicStore,
    types::{new_id, ComplaintId, ContractorId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const AUTO_ASSIGNER: &str = "auto";

/// What a citizen gets back after filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingReceipt {
    pub complaint_id: ComplaintId,
    pub reference_number: String,
    pub status: ComplaintStatus,
    pub assigned_contractor_id: Option<ContractorId>,
}

pub struct ComplaintEngine {
    config: EngineConfig,
    store: CivicStore,
    clock: Box<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    assignment: AssignmentEngine,
    classifier: DelayClassifier,
}

impl ComplaintEngine {
    pub fn new(
        config: EngineConfig,
        store: CivicStore,
        clock: Box<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            assignment: AssignmentEngine::from_config(&config.assignment),
            classifier: DelayClassifier::new(config.delay.threshold_days),
            config,
            store,
            clock,
            notifier,
        }
    }

    /// Production wiring: system clock and a webhook dispatcher thread.
    pub fn build(config: EngineConfig, store: CivicStore) -> EngineResult<Self> {
        let dispatcher = WebhookDispatcher::spawn(&config.webhooks)
            .map_err(|e| anyhow::anyhow!("cannot start webhook dispatcher: {e}"))?;
        Ok(Self::new(config, store, Box::new(SystemClock), Arc::new(dispatcher)))
    }

    /// In-memory store, test config, caller-controlled clock and notifier.
    pub fn build_test(clock: ManualClock, notifier: Arc<dyn Notifier>) -> EngineResult<Self> {
        let store = CivicStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(
            EngineConfig::default_test(),
            store,
            Box::new(clock),
            notifier,
        ))
    }

    /// Replace the assignment engine (e.g. a custom selector).
    pub fn with_assignment(mut self, assignment: AssignmentEngine) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn store(&self) -> &CivicStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flush pending notifications. Call once before the process exits.
    pub fn shutdown(&self) {
        self.notifier.close();
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn geo_snapshot(&self) -> EngineResult<GeoSnapshot> {
        self.store.geo_snapshot()
    }

    // ── Citizen ────────────────────────────────────────────────────

    /// File a complaint and attempt auto-assignment.
    pub fn create_complaint(
        &self,
        geo: &GeoSnapshot,
        input: NewComplaint,
    ) -> EngineResult<FilingReceipt> {
        input.validate(geo)?;

        let now = self.now();
        let mut complaint = Complaint {
            complaint_id: new_id("cmp"),
            ref_seq: 0,
            category: input.category,
            description: input.description.trim().to_string(),
            state_id: input.state_id,
            city_id: input.city_id,
            nagar_id: input.nagar_id,
            address: input.address.filter(|a| !a.trim().is_empty()),
            location: input.location,
            citizen_name: input.citizen_name.trim().to_string(),
            citizen_phone: input.citizen_phone,
            status: ComplaintStatus::Pending,
            photo_url: input.photo_url,
            before_photo_url: None,
            after_photo_url: None,
            assigned_contractor_id: None,
            created_at: now,
            assigned_at: None,
            resolved_at: None,
            updated_at: now,
        };
        complaint.ref_seq = self.store.insert_complaint(&complaint)?;
        log::info!(
            "filed {} ({}) in nagar {}",
            complaint.reference_number(),
            complaint.category,
            complaint.nagar_id
        );

        self.record(EngineEvent::ComplaintFiled {
            complaint_id: complaint.complaint_id.clone(),
            reference_number: complaint.reference_number(),
            category: complaint.category,
            nagar_id: complaint.nagar_id.clone(),
            at: now,
        });
        self.notifier.notify(Notification::created(&complaint));

        let mut receipt = FilingReceipt {
            complaint_id: complaint.complaint_id.clone(),
            reference_number: complaint.reference_number(),
            status: ComplaintStatus::Pending,
            assigned_contractor_id: None,
        };

        // The filing stands whatever happens next.
        match self.run_auto_assign(&complaint) {
            Ok(Some(contractor)) => {
                receipt.status = ComplaintStatus::Assigned;
                receipt.assigned_contractor_id = Some(contractor.contractor_id);
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!(
                    "auto-assignment for {} failed: {e}",
                    complaint.reference_number()
                );
                if let Ok(Some(current)) = self.store.get_complaint(&complaint.complaint_id) {
                    receipt.status = current.status;
                    receipt.assigned_contractor_id = current.assigned_contractor_id;
                }
            }
        }
        Ok(receipt)
    }

    pub fn complaint(&self, complaint_id: &str) -> EngineResult<ComplaintView> {
        let complaint = self.load_complaint(complaint_id)?;
        Ok(self.view(complaint))
    }

    /// "My complaints", newest first.
    pub fn complaints_by_phone(&self, phone: &str) -> EngineResult<Vec<ComplaintView>> {
        Ok(self.views(self.store.complaints_by_phone(phone)?))
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Find and attach a contractor. `None` leaves the complaint pending.
    pub fn auto_assign(&self, complaint_id: &str) -> EngineResult<Option<Contractor>> {
        let complaint = self.load_complaint(complaint_id)?;
        self.run_auto_assign(&complaint)
    }

    /// Officer-chosen contractor. Same compare-and-swap as auto-assignment.
    pub fn assign_contractor(&self, complaint_id: &str, contractor_id: &str) -> EngineResult<()> {
        let complaint = self.load_complaint(complaint_id)?;
        let contractor = self
            .store
            .get_contractor(contractor_id)?
            .ok_or_else(|| EngineError::not_found("contractor", contractor_id))?;

        let now = self.now();
        self.assignment.assign(&self.store, &complaint, &contractor, now)?;
        self.after_assignment(&complaint.complaint_id, &contractor, "manual", now);
        Ok(())
    }

    fn run_auto_assign(&self, complaint: &Complaint) -> EngineResult<Option<Contractor>> {
        let now = self.now();
        match self.assignment.auto_assign(&self.store, complaint, now)? {
            AssignmentOutcome::Assigned {
                contractor,
                assigned_at,
            } => {
                self.after_assignment(&complaint.complaint_id, &contractor, AUTO_ASSIGNER, assigned_at);
                Ok(Some(contractor))
            }
            outcome => {
                let reason = match outcome {
                    AssignmentOutcome::TimedOut => "timed_out",
                    _ => "no_eligible_contractor",
                };
                self.record(EngineEvent::AssignmentSkipped {
                    complaint_id: complaint.complaint_id.clone(),
                    reason: reason.to_string(),
                    at: now,
                });
                Ok(None)
            }
        }
    }

    fn after_assignment(
        &self,
        complaint_id: &str,
        contractor: &Contractor,
        assigned_by: &str,
        at: Timestamp,
    ) {
        log::info!(
            "complaint {complaint_id} assigned to {} by {assigned_by}",
            contractor.contractor_id
        );
        self.record(EngineEvent::ComplaintAssigned {
            complaint_id: complaint_id.to_string(),
            contractor_id: contractor.contractor_id.clone(),
            assigned_by: assigned_by.to_string(),
            at,
        });
        match self.store.get_complaint(complaint_id) {
            Ok(Some(current)) => {
                let assigned_at = current.assigned_at.unwrap_or(at);
                self.notifier
                    .notify(Notification::assigned(&current, contractor, assigned_at));
            }
            Ok(None) => log::warn!("complaint {complaint_id} vanished after assignment"),
            Err(e) => log::warn!("cannot reload {complaint_id} for notification: {e}"),
        }
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Move to `target` from whatever status the complaint has right now.
    pub fn update_status(&self, complaint_id: &str, target: ComplaintStatus) -> EngineResult<()> {
        let observed = self.load_complaint(complaint_id)?.status;
        self.update_status_if(complaint_id, observed, target)
    }

    /// Move `observed → target`, failing if someone else moved it first.
    pub fn update_status_if(
        &self,
        complaint_id: &str,
        observed: ComplaintStatus,
        target: ComplaintStatus,
    ) -> EngineResult<()> {
        let change = lifecycle::plan_status_update(complaint_id, observed, target)?;
        let now = self.now();
        if !self.store.apply_status_change(complaint_id, &change, now)? {
            let current = self.load_complaint(complaint_id)?;
            return Err(lifecycle::invalid(complaint_id, current.status, target));
        }
        log::debug!("complaint {complaint_id}: {observed} -> {target}");
        self.record(EngineEvent::StatusChanged {
            complaint_id: complaint_id.to_string(),
            from: observed,
            to: target,
            at: now,
        });
        Ok(())
    }

    pub fn attach_photo(&self, complaint_id: &str, stage: PhotoStage, url: &str) -> EngineResult<()> {
        if url.trim().is_empty() {
            return Err(EngineError::Validation("photo url is required".into()));
        }
        let now = self.now();
        if !self.store.set_complaint_photo(complaint_id, stage, url, now)? {
            return Err(EngineError::not_found("complaint", complaint_id));
        }
        self.record(EngineEvent::PhotoAttached {
            complaint_id: complaint_id.to_string(),
            stage,
            at: now,
        });
        Ok(())
    }

    // ── Officer views ──────────────────────────────────────────────

    pub fn complaints_in_city(&self, city_id: &str) -> EngineResult<Vec<ComplaintView>> {
        Ok(self.views(self.store.complaints_in_city(city_id)?))
    }

    pub fn complaints_for_contractor(&self, contractor_id: &str) -> EngineResult<Vec<ComplaintView>> {
        Ok(self.views(self.store.complaints_for_contractor(contractor_id)?))
    }

    pub fn history(&self, complaint_id: &str) -> EngineResult<Vec<EngineEvent>> {
        self.store
            .events_for_complaint(complaint_id)?
            .iter()
            .map(|e| e.decode().map_err(EngineError::from))
            .collect()
    }

    // ── Contractor management ──────────────────────────────────────

    pub fn add_contractor(
        &self,
        officer: &Officer,
        geo: &GeoSnapshot,
        input: ContractorInput,
    ) -> EngineResult<Contractor> {
        input.validate()?;
        officer.ensure_manages(geo, &input.nagar_id)?;
        let contractor = Contractor {
            contractor_id: new_id("ctr"),
            name: input.name.trim().to_string(),
            phone: input.phone,
            email: input.email,
            nagar_id: input.nagar_id,
            created_at: self.now(),
        };
        self.store.insert_contractor(&contractor)?;
        log::info!(
            "officer {} registered contractor {} in nagar {}",
            officer.officer_id,
            contractor.contractor_id,
            contractor.nagar_id
        );
        Ok(contractor)
    }

    pub fn update_contractor(
        &self,
        officer: &Officer,
        geo: &GeoSnapshot,
        contractor_id: &str,
        input: ContractorInput,
    ) -> EngineResult<Contractor> {
        input.validate()?;
        let existing = self
            .store
            .get_contractor(contractor_id)?
            .ok_or_else(|| EngineError::not_found("contractor", contractor_id))?;
        officer.ensure_manages(geo, &existing.nagar_id)?;
        officer.ensure_manages(geo, &input.nagar_id)?;

        let updated = Contractor {
            name: input.name.trim().to_string(),
            phone: input.phone,
            email: input.email,
            nagar_id: input.nagar_id,
            ..existing
        };
        if !self.store.update_contractor(&updated)? {
            return Err(EngineError::not_found("contractor", contractor_id));
        }
        Ok(updated)
    }

    /// Assigned complaints keep pointing at the removed contractor.
    pub fn remove_contractor(
        &self,
        officer: &Officer,
        geo: &GeoSnapshot,
        contractor_id: &str,
    ) -> EngineResult<()> {
        let existing = self
            .store
            .get_contractor(contractor_id)?
            .ok_or_else(|| EngineError::not_found("contractor", contractor_id))?;
        officer.ensure_manages(geo, &existing.nagar_id)?;
        if !self.store.delete_contractor(contractor_id)? {
            return Err(EngineError::not_found("contractor", contractor_id));
        }
        log::info!("officer {} removed contractor {contractor_id}", officer.officer_id);
        Ok(())
    }

    // ── Statistics ─────────────────────────────────────────────────

    /// Dashboard over all complaints, or one city's when scoped.
    pub fn dashboard(&self, city_scope: Option<&str>) -> EngineResult<DashboardStats> {
        let snapshot = ComplaintSnapshot::capture(&self.store, self.now(), city_scope)?;
        let aggregator = StatisticsAggregator::new(self.config.stats.clone(), self.classifier);
        Ok(aggregator.compute(&snapshot))
    }

    // ── Internals ──────────────────────────────────────────────────

    fn load_complaint(&self, complaint_id: &str) -> EngineResult<Complaint> {
        self.store
            .get_complaint(complaint_id)?
            .ok_or_else(|| EngineError::not_found("complaint", complaint_id))
    }

    fn view(&self, complaint: Complaint) -> ComplaintView {
        let now = self.now();
        ComplaintView {
            reference_number: format_reference(complaint.ref_seq),
            display_status: self.classifier.display_status(&complaint, now),
            age_days: age_in_days(complaint.created_at, now),
            complaint,
        }
    }

    fn views(&self, complaints: Vec<Complaint>) -> Vec<ComplaintView> {
        complaints.into_iter().map(|c| self.view(c)).collect()
    }

    /// Append to the audit trail. The change is already committed, so a
    /// failed write is logged rather than reported to the caller.
    fn record(&self, event: EngineEvent) {
        let result = EventLogEntry::from_event(&event)
            .map_err(EngineError::from)
            .and_then(|entry| self.store.append_event(&entry));
        if let Err(e) = result {
            log::error!("failed to log {} event: {e}", event.type_name());
        }
    }
}
