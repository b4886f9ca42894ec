//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use civic_core::{
    clock::ManualClock,
    complaint::{Category, NewComplaint},
    contractor::{Contractor, ContractorInput, Officer},
    engine::ComplaintEngine,
    geo::{City, Nagar, State},
    notify::RecordingNotifier,
    store::CivicStore,
    types::Timestamp,
};
use std::{path::PathBuf, sync::Arc};

pub const STATE: &str = "mh";
pub const PUNE: &str = "pune";
pub const NAGPUR: &str = "nagpur";
pub const KOTHRUD: &str = "kothrud";
pub const BANER: &str = "baner";
pub const SITABULDI: &str = "sitabuldi";

pub struct World {
    pub engine: ComplaintEngine,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
    pub officer: Officer,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Monday morning.
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub fn seed_geo(store: &CivicStore) {
    store
        .insert_state(&State { state_id: STATE.into(), name: "Maharashtra".into() })
        .unwrap();
    for (city_id, name) in [(PUNE, "Pune"), (NAGPUR, "Nagpur")] {
        store
            .insert_city(&City { city_id: city_id.into(), state_id: STATE.into(), name: name.into() })
            .unwrap();
    }
    for (nagar_id, city_id, name) in [
        (KOTHRUD, PUNE, "Kothrud"),
        (BANER, PUNE, "Baner"),
        (SITABULDI, NAGPUR, "Sitabuldi"),
    ] {
        store
            .insert_nagar(&Nagar { nagar_id: nagar_id.into(), city_id: city_id.into(), name: name.into() })
            .unwrap();
    }
}

pub fn pune_officer() -> Officer {
    Officer { officer_id: "off-pune".into(), name: "R. Kulkarni".into(), city_id: PUNE.into() }
}

pub fn world() -> World {
    init_logging();
    let clock = ManualClock::new(t0());
    let notifier = RecordingNotifier::new();
    let engine = ComplaintEngine::build_test(clock.clone(), Arc::new(notifier.clone())).unwrap();
    seed_geo(engine.store());
    let officer = pune_officer();
    engine.store().insert_officer(&officer).unwrap();
    World { engine, clock, notifier, officer }
}

pub fn city_of(nagar: &str) -> &'static str {
    if nagar == SITABULDI {
        NAGPUR
    } else {
        PUNE
    }
}

pub fn submission(nagar: &str, phone: &str) -> NewComplaint {
    NewComplaint {
        category: Category::Roads,
        description: "Large pothole outside the school gate".into(),
        state_id: STATE.into(),
        city_id: city_of(nagar).into(),
        nagar_id: nagar.into(),
        address: Some("Lane 7".into()),
        location: None,
        citizen_name: "Asha Patil".into(),
        citizen_phone: phone.into(),
        photo_url: Some("https://img.example/pothole.jpg".into()),
    }
}

pub fn contractor_input(nagar: &str, name: &str) -> ContractorInput {
    ContractorInput {
        name: name.into(),
        phone: "9822000000".into(),
        email: Some(format!("{}@crew.example", name.to_lowercase().replace(' ', "."))),
        nagar_id: nagar.into(),
    }
}

pub fn add_contractor(w: &World, nagar: &str, name: &str) -> Contractor {
    let geo = w.engine.geo_snapshot().unwrap();
    w.engine
        .add_contractor(&w.officer, &geo, contractor_input(nagar, name))
        .unwrap()
}

pub fn file(w: &World, nagar: &str) -> String {
    let geo = w.engine.geo_snapshot().unwrap();
    w.engine
        .create_complaint(&geo, submission(nagar, "9876543210"))
        .unwrap()
        .complaint_id
}

/// Fresh database file in the temp dir.
pub fn temp_db_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("civic-{tag}-{}.db", uuid::Uuid::new_v4().simple()))
}

pub fn remove_db(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
