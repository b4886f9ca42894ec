use crate::{
    complaint::{ComplaintStatus, NewComplaint, PhotoStage},
    contractor::{ContractorInput, Officer},
    engine::ComplaintEngine,
    error::{EngineError, EngineResult},
    geo::{City, Nagar, State},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Commands accepted by the runner's JSON-lines loop.
/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum EngineCommand {
    // ── Reference data (operator) ─────────────────
    AddState(State),
    AddCity(City),
    AddNagar(Nagar),
    AddOfficer(Officer),

    // ── Contractors (officer) ─────────────────────
    AddContractor {
        officer_id: String,
        contractor: ContractorInput,
    },
    UpdateContractor {
        officer_id: String,
        contractor_id: String,
        contractor: ContractorInput,
    },
    RemoveContractor {
        officer_id: String,
        contractor_id: String,
    },

    // ── Complaints ────────────────────────────────
    CreateComplaint {
        complaint: NewComplaint,
    },
    AssignContractor {
        complaint_id: String,
        contractor_id: String,
    },
    UpdateStatus {
        complaint_id: String,
        status: ComplaintStatus,
    },
    AutoAssign {
        complaint_id: String,
    },
    AttachPhoto {
        complaint_id: String,
        stage: PhotoStage,
        url: String,
    },

    // ── Queries ───────────────────────────────────
    GetComplaint {
        complaint_id: String,
    },
    MyComplaints {
        phone: String,
    },
    Dashboard {
        #[serde(default)]
        city_id: Option<String>,
    },

    Quit,
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddState(_) => "add_state",
            Self::AddCity(_) => "add_city",
            Self::AddNagar(_) => "add_nagar",
            Self::AddOfficer(_) => "add_officer",
            Self::AddContractor { .. } => "add_contractor",
            Self::UpdateContractor { .. } => "update_contractor",
            Self::RemoveContractor { .. } => "remove_contractor",
            Self::CreateComplaint { .. } => "create_complaint",
            Self::AssignContractor { .. } => "assign_contractor",
            Self::UpdateStatus { .. } => "update_status",
            Self::AutoAssign { .. } => "auto_assign",
            Self::AttachPhoto { .. } => "attach_photo",
            Self::GetComplaint { .. } => "get_complaint",
            Self::MyComplaints { .. } => "my_complaints",
            Self::Dashboard { .. } => "dashboard",
            Self::Quit => "quit",
        }
    }
}

/// Run one command and return its JSON reply. `Quit` is the caller's job.
pub fn execute(engine: &ComplaintEngine, command: EngineCommand) -> EngineResult<Value> {
    let store = engine.store();
    let reply = match command {
        EngineCommand::AddState(s) => {
            store.insert_state(&s)?;
            json!({ "ok": true })
        }
        EngineCommand::AddCity(c) => {
            store.insert_city(&c)?;
            json!({ "ok": true })
        }
        EngineCommand::AddNagar(n) => {
            store.insert_nagar(&n)?;
            json!({ "ok": true })
        }
        EngineCommand::AddOfficer(o) => {
            store.insert_officer(&o)?;
            json!({ "ok": true })
        }
        EngineCommand::AddContractor {
            officer_id,
            contractor,
        } => {
            let officer = load_officer(engine, &officer_id)?;
            let geo = engine.geo_snapshot()?;
            serde_json::to_value(engine.add_contractor(&officer, &geo, contractor)?)?
        }
        EngineCommand::UpdateContractor {
            officer_id,
            contractor_id,
            contractor,
        } => {
            let officer = load_officer(engine, &officer_id)?;
            let geo = engine.geo_snapshot()?;
            serde_json::to_value(engine.update_contractor(&officer, &geo, &contractor_id, contractor)?)?
        }
        EngineCommand::RemoveContractor {
            officer_id,
            contractor_id,
        } => {
            let officer = load_officer(engine, &officer_id)?;
            let geo = engine.geo_snapshot()?;
            engine.remove_contractor(&officer, &geo, &contractor_id)?;
            json!({ "ok": true })
        }
        EngineCommand::CreateComplaint { complaint } => {
            let geo = engine.geo_snapshot()?;
            serde_json::to_value(engine.create_complaint(&geo, complaint)?)?
        }
        EngineCommand::AssignContractor {
            complaint_id,
            contractor_id,
        } => {
            engine.assign_contractor(&complaint_id, &contractor_id)?;
            json!({ "ok": true })
        }
        EngineCommand::UpdateStatus {
            complaint_id,
            status,
        } => {
            engine.update_status(&complaint_id, status)?;
            json!({ "ok": true })
        }
        EngineCommand::AutoAssign { complaint_id } => {
            let contractor = engine.auto_assign(&complaint_id)?;
            json!({ "assigned_contractor": contractor })
        }
        EngineCommand::AttachPhoto {
            complaint_id,
            stage,
            url,
        } => {
            engine.attach_photo(&complaint_id, stage, &url)?;
            json!({ "ok": true })
        }
        EngineCommand::GetComplaint { complaint_id } => {
            serde_json::to_value(engine.complaint(&complaint_id)?)?
        }
        EngineCommand::MyComplaints { phone } => {
            serde_json::to_value(engine.complaints_by_phone(&phone)?)?
        }
        EngineCommand::Dashboard { city_id } => {
            serde_json::to_value(engine.dashboard(city_id.as_deref())?)?
        }
        EngineCommand::Quit => json!({ "ok": true }),
    };
    Ok(reply)
}

fn load_officer(engine: &ComplaintEngine, officer_id: &str) -> EngineResult<Officer> {
    engine
        .store()
        .get_officer(officer_id)?
        .ok_or_else(|| EngineError::not_found("officer", officer_id))
}
