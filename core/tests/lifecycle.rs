//! Lifecycle state machine, driven through the engine.

mod common;

use civic_core::{complaint::ComplaintStatus, error::EngineError, event::EngineEvent};
use common::*;

#[test]
fn full_forward_path_stamps_timestamps() {
    let w = world();
    add_contractor(&w, KOTHRUD, "Shinde Works");
    let id = file(&w, KOTHRUD);

    let c = w.engine.complaint(&id).unwrap().complaint;
    assert_eq!(c.status, ComplaintStatus::Assigned);
    assert!(c.assigned_at.is_some());
    assert!(c.resolved_at.is_none());

    w.clock.advance(chrono::Duration::hours(3));
    w.engine.update_status(&id, ComplaintStatus::InProgress).unwrap();
    w.clock.advance(chrono::Duration::hours(5));
    w.engine.update_status(&id, ComplaintStatus::Resolved).unwrap();

    let c = w.engine.complaint(&id).unwrap().complaint;
    assert_eq!(c.status, ComplaintStatus::Resolved);
    assert_eq!(c.resolved_at, Some(t0() + chrono::Duration::hours(8)));
    assert_eq!(c.assigned_at, Some(t0()), "assigned_at is never rewritten");
    assert_eq!(c.updated_at, t0() + chrono::Duration::hours(8));
}

#[test]
fn resolved_is_terminal() {
    let w = world();
    let id = file(&w, KOTHRUD);
    w.engine.update_status(&id, ComplaintStatus::Resolved).unwrap();
    let resolved_at = w.engine.complaint(&id).unwrap().complaint.resolved_at;

    w.clock.advance(chrono::Duration::days(1));
    for target in [
        ComplaintStatus::Pending,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
    ] {
        let err = w.engine.update_status(&id, target).unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidTransition { from: ComplaintStatus::Resolved, .. }),
            "resolved -> {target} should be refused, got {err:?}"
        );
    }

    // The stored resolved_at survives every refused attempt.
    assert_eq!(w.engine.complaint(&id).unwrap().complaint.resolved_at, resolved_at);
}

#[test]
fn pending_can_skip_straight_to_resolved() {
    let w = world();
    let id = file(&w, BANER); // no contractor in Baner
    w.engine.update_status(&id, ComplaintStatus::Resolved).unwrap();

    let c = w.engine.complaint(&id).unwrap().complaint;
    assert_eq!(c.status, ComplaintStatus::Resolved);
    assert!(c.resolved_at.is_some());
    assert!(c.assigned_at.is_none());
}

#[test]
fn pending_cannot_jump_to_in_progress() {
    let w = world();
    let id = file(&w, BANER);
    let err = w.engine.update_status(&id, ComplaintStatus::InProgress).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[test]
fn assignment_requires_contractor_path() {
    let w = world();
    let id = file(&w, BANER);
    let err = w.engine.update_status(&id, ComplaintStatus::Assigned).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert_eq!(w.engine.complaint(&id).unwrap().complaint.status, ComplaintStatus::Pending);
}

#[test]
fn stale_observed_status_is_rejected() {
    let w = world();
    add_contractor(&w, KOTHRUD, "Shinde Works");
    let id = file(&w, KOTHRUD); // now assigned

    w.engine.update_status(&id, ComplaintStatus::InProgress).unwrap();

    // A second officer still looking at "assigned" tries to resolve.
    let err = w
        .engine
        .update_status_if(&id, ComplaintStatus::Assigned, ComplaintStatus::Resolved)
        .unwrap_err();
    match err {
        EngineError::InvalidTransition { from, to, .. } => {
            assert_eq!(from, ComplaintStatus::InProgress);
            assert_eq!(to, ComplaintStatus::Resolved);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert_eq!(w.engine.complaint(&id).unwrap().complaint.status, ComplaintStatus::InProgress);
}

#[test]
fn unknown_complaint_is_not_found() {
    let w = world();
    let err = w.engine.update_status("cmp-missing", ComplaintStatus::Resolved).unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "complaint", .. }));
}

#[test]
fn timestamp_invariants_hold_across_a_mixed_population() {
    let w = world();
    add_contractor(&w, KOTHRUD, "Shinde Works");
    let a = file(&w, KOTHRUD);
    let b = file(&w, KOTHRUD);
    let _c = file(&w, BANER);
    let d = file(&w, BANER);
    w.engine.update_status(&a, ComplaintStatus::InProgress).unwrap();
    w.engine.update_status(&b, ComplaintStatus::Resolved).unwrap();
    w.engine.update_status(&d, ComplaintStatus::Resolved).unwrap();

    for c in w.engine.store().all_complaints().unwrap() {
        assert_eq!(
            c.resolved_at.is_some(),
            c.status == ComplaintStatus::Resolved,
            "{}: resolved_at must track resolved status",
            c.complaint_id
        );
        if c.assigned_at.is_some() {
            assert!(
                matches!(
                    c.status,
                    ComplaintStatus::Assigned | ComplaintStatus::InProgress | ComplaintStatus::Resolved
                ),
                "{}: assigned_at set on a {} complaint",
                c.complaint_id,
                c.status
            );
        }
    }
}

#[test]
fn transitions_are_recorded_in_history() {
    let w = world();
    add_contractor(&w, KOTHRUD, "Shinde Works");
    let id = file(&w, KOTHRUD);
    w.engine.update_status(&id, ComplaintStatus::InProgress).unwrap();

    let history = w.engine.history(&id).unwrap();
    let kinds: Vec<&str> = history.iter().map(|e| e.type_name()).collect();
    assert_eq!(kinds, vec!["complaint_filed", "complaint_assigned", "status_changed"]);
    assert!(matches!(
        history[2],
        EngineEvent::StatusChanged { from: ComplaintStatus::Assigned, to: ComplaintStatus::InProgress, .. }
    ));
}
