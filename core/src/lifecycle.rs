//! Complaint lifecycle state machine.
//!
//!   pending ──► assigned ──► in_progress ──► resolved
//!      │            │                           ▲
//!      └────────────┴───────────────────────────┘
//!
//! RULES:
//!   - pending → assigned needs a contractor and stamps assigned_at.
//!   - Officers may jump straight to resolved from any open status.
//!   - resolved is terminal; nothing leaves it.
//!   - Every change is applied against the status the caller observed
//!     (compare-and-swap in the store), so a concurrent writer cannot be
//!     silently overwritten.
//!
//! `delayed` is not a state here. It is an overlay computed by `delay`.

use crate::{
    complaint::ComplaintStatus,
    error::{EngineError, EngineResult},
    types::ContractorId,
};

/// A validated edge of the lifecycle, ready for the store to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ComplaintStatus,
    pub to: ComplaintStatus,
    /// Set only on pending → assigned.
    pub contractor_id: Option<ContractorId>,
}

impl StatusChange {
    pub fn stamps_assigned_at(&self) -> bool {
        self.contractor_id.is_some()
    }

    pub fn stamps_resolved_at(&self) -> bool {
        self.to == ComplaintStatus::Resolved
    }
}

/// Whether `from → to` is an edge of the lifecycle.
pub fn is_allowed(from: ComplaintStatus, to: ComplaintStatus) -> bool {
    use ComplaintStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Assigned)
            | (Assigned, InProgress)
            | (Pending, Resolved)
            | (Assigned, Resolved)
            | (InProgress, Resolved)
    )
}

/// Plan an assignment of `contractor_id` to a complaint observed in `from`.
pub fn plan_assignment(
    complaint_id: &str,
    from: ComplaintStatus,
    contractor_id: &str,
) -> EngineResult<StatusChange> {
    ensure_allowed(complaint_id, from, ComplaintStatus::Assigned)?;
    Ok(StatusChange {
        from,
        to: ComplaintStatus::Assigned,
        contractor_id: Some(contractor_id.to_string()),
    })
}

/// Plan a plain status update. Assignment has its own entry point because it
/// carries a contractor; asking for `assigned` here is rejected.
pub fn plan_status_update(
    complaint_id: &str,
    from: ComplaintStatus,
    to: ComplaintStatus,
) -> EngineResult<StatusChange> {
    if to == ComplaintStatus::Assigned {
        return Err(invalid(complaint_id, from, to));
    }
    ensure_allowed(complaint_id, from, to)?;
    Ok(StatusChange {
        from,
        to,
        contractor_id: None,
    })
}

fn ensure_allowed(
    complaint_id: &str,
    from: ComplaintStatus,
    to: ComplaintStatus,
) -> EngineResult<()> {
    if is_allowed(from, to) {
        Ok(())
    } else {
        Err(invalid(complaint_id, from, to))
    }
}

pub(crate) fn invalid(
    complaint_id: &str,
    from: ComplaintStatus,
    to: ComplaintStatus,
) -> EngineError {
    EngineError::InvalidTransition {
        complaint_id: complaint_id.to_string(),
        from,
        to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComplaintStatus::*;

    #[test]
    fn forward_edges_allowed() {
        assert!(is_allowed(Pending, Assigned));
        assert!(is_allowed(Assigned, InProgress));
        assert!(is_allowed(InProgress, Resolved));
    }

    #[test]
    fn officers_may_skip_to_resolved() {
        assert!(is_allowed(Pending, Resolved));
        assert!(is_allowed(Assigned, Resolved));
    }

    #[test]
    fn resolved_is_terminal() {
        for to in ComplaintStatus::ALL {
            assert!(!is_allowed(Resolved, to), "resolved -> {to} must be refused");
        }
    }

    #[test]
    fn no_backward_edges() {
        assert!(!is_allowed(Assigned, Pending));
        assert!(!is_allowed(InProgress, Assigned));
        assert!(!is_allowed(InProgress, Pending));
        assert!(!is_allowed(Pending, InProgress));
    }

    #[test]
    fn status_update_refuses_assigned_target() {
        let err = plan_status_update("c1", Pending, Assigned).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn assignment_plan_carries_contractor() {
        let change = plan_assignment("c1", Pending, "k1").unwrap();
        assert!(change.stamps_assigned_at());
        assert!(!change.stamps_resolved_at());
        assert_eq!(change.contractor_id.as_deref(), Some("k1"));
    }

    #[test]
    fn assignment_from_assigned_refused() {
        assert!(plan_assignment("c1", Assigned, "k2").is_err());
    }
}
