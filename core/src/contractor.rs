//! Contractors and the officers who manage them.

use crate::{
    error::{EngineError, EngineResult},
    geo::GeoSnapshot,
    types::{CityId, ContractorId, NagarId, OfficerId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// A work crew bound to exactly one nagar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contractor {
    pub contractor_id: ContractorId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub nagar_id: NagarId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractorInput {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub nagar_id: NagarId,
}

impl ContractorInput {
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("contractor name is required".into()));
        }
        crate::complaint::validate_phone(&self.phone)?;
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(EngineError::Validation(format!("invalid email '{email}'")));
            }
        }
        Ok(())
    }
}

/// Authenticated actor scoped to one city. Authentication itself happens
/// outside the engine; the engine only enforces the city boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Officer {
    pub officer_id: OfficerId,
    pub name: String,
    pub city_id: CityId,
}

impl Officer {
    /// Fails with `OutOfScope` unless the nagar belongs to this officer's city.
    pub fn ensure_manages(&self, geo: &GeoSnapshot, nagar_id: &str) -> EngineResult<()> {
        let city = geo
            .city_of_nagar(nagar_id)
            .ok_or_else(|| EngineError::not_found("nagar", nagar_id))?;
        if city != self.city_id {
            return Err(EngineError::OutOfScope {
                officer_id: self.officer_id.clone(),
                city_id: self.city_id.clone(),
            });
        }
        Ok(())
    }
}
