//! Two engines, two connections, one database file.

mod common;

use civic_core::{
    clock::ManualClock,
    complaint::ComplaintStatus,
    config::EngineConfig,
    engine::ComplaintEngine,
    error::{EngineError, EngineResult},
    notify::NullNotifier,
    store::CivicStore,
};
use common::*;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

fn engine_on(path: &Path) -> ComplaintEngine {
    let store = CivicStore::open_with_timeout(path.to_str().unwrap(), Duration::from_secs(10)).unwrap();
    ComplaintEngine::new(
        EngineConfig::default_test(),
        store,
        Box::new(ManualClock::new(t0())),
        Arc::new(NullNotifier),
    )
}

fn prepared_db(tag: &str) -> PathBuf {
    init_logging();
    let path = temp_db_path(tag);
    let store = CivicStore::open(path.to_str().unwrap()).unwrap();
    store.migrate().unwrap();
    seed_geo(&store);
    store.insert_officer(&pune_officer()).unwrap();
    path
}

/// Run `a` and `b` on separate engines and threads, released together.
fn race<A, B>(path: &Path, a: A, b: B) -> (EngineResult<()>, EngineResult<()>)
where
    A: FnOnce(&ComplaintEngine) -> EngineResult<()> + Send + 'static,
    B: FnOnce(&ComplaintEngine) -> EngineResult<()> + Send + 'static,
{
    let barrier = Arc::new(Barrier::new(2));

    let (path_a, barrier_a) = (path.to_path_buf(), Arc::clone(&barrier));
    let ha = thread::spawn(move || {
        let engine = engine_on(&path_a);
        barrier_a.wait();
        a(&engine)
    });
    let (path_b, barrier_b) = (path.to_path_buf(), Arc::clone(&barrier));
    let hb = thread::spawn(move || {
        let engine = engine_on(&path_b);
        barrier_b.wait();
        b(&engine)
    });

    (ha.join().unwrap(), hb.join().unwrap())
}

#[test]
fn manual_and_auto_assignment_race_has_one_winner() {
    let path = prepared_db("race-assign");
    let setup = engine_on(&path);
    let officer = pune_officer();

    for round in 0..10 {
        let geo = setup.geo_snapshot().unwrap();
        let id = setup
            .create_complaint(&geo, submission(BANER, "9876543210"))
            .unwrap()
            .complaint_id;
        // Filed with no Baner crew, so it is pending; now make both paths viable.
        let local = setup
            .add_contractor(&officer, &geo, contractor_input(BANER, &format!("Baner Crew {round}")))
            .unwrap();
        let manual = setup
            .add_contractor(&officer, &geo, contractor_input(KOTHRUD, &format!("Kothrud Crew {round}")))
            .unwrap();

        let (id_a, id_b) = (id.clone(), id.clone());
        let manual_id = manual.contractor_id.clone();
        let (manual_result, auto_result) = race(
            &path,
            move |e| e.assign_contractor(&id_a, &manual_id),
            move |e| e.auto_assign(&id_b).map(|_| ()),
        );

        let winners = [&manual_result, &auto_result].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "round {round}: {manual_result:?} / {auto_result:?}");
        for loser in [manual_result, auto_result].into_iter().filter_map(Result::err) {
            assert!(
                matches!(loser, EngineError::InvalidTransition { .. }),
                "round {round}: loser got {loser:?}"
            );
        }

        let c = setup.complaint(&id).unwrap().complaint;
        assert_eq!(c.status, ComplaintStatus::Assigned);
        let owner = c.assigned_contractor_id.unwrap();
        assert!(owner == local.contractor_id || owner == manual.contractor_id);

        // Clear the local crew so the next round files as pending again.
        setup.remove_contractor(&officer, &geo, &local.contractor_id).unwrap();
    }

    drop(setup);
    remove_db(&path);
}

#[test]
fn competing_status_updates_from_same_observation() {
    let path = prepared_db("race-status");
    let setup = engine_on(&path);
    let officer = pune_officer();
    let geo = setup.geo_snapshot().unwrap();
    setup
        .add_contractor(&officer, &geo, contractor_input(KOTHRUD, "Shinde Works"))
        .unwrap();
    let id = setup
        .create_complaint(&geo, submission(KOTHRUD, "9876543210"))
        .unwrap()
        .complaint_id;

    let (id_a, id_b) = (id.clone(), id.clone());
    let (start, close) = race(
        &path,
        move |e| e.update_status_if(&id_a, ComplaintStatus::Assigned, ComplaintStatus::InProgress),
        move |e| e.update_status_if(&id_b, ComplaintStatus::Assigned, ComplaintStatus::Resolved),
    );
    assert_eq!(
        [start.is_ok(), close.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "{start:?} / {close:?}"
    );

    let c = setup.complaint(&id).unwrap().complaint;
    if close.is_ok() {
        assert_eq!(c.status, ComplaintStatus::Resolved);
        assert!(c.resolved_at.is_some());
    } else {
        assert_eq!(c.status, ComplaintStatus::InProgress);
        assert!(c.resolved_at.is_none());
    }

    drop(setup);
    remove_db(&path);
}

#[test]
fn concurrent_filings_get_distinct_reference_numbers() {
    let path = prepared_db("race-refs");
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let engine = engine_on(&path);
                let geo = engine.geo_snapshot().unwrap();
                barrier.wait();
                (0..10)
                    .map(|_| {
                        engine
                            .create_complaint(&geo, submission(BANER, "9876543210"))
                            .unwrap()
                            .reference_number
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let refs: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let distinct: HashSet<&String> = refs.iter().collect();
    assert_eq!(refs.len(), 20);
    assert_eq!(distinct.len(), 20);

    remove_db(&path);
}
