//! Point-in-time view of the complaint set that aggregation runs over.
//!
//! A snapshot is read once and then only borrowed, so every statistic in
//! one dashboard describes the same instant.

use crate::{
    complaint::Complaint,
    error::EngineResult,
    geo::GeoSnapshot,
    store::CivicStore,
    types::{CityId, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintSnapshot {
    pub taken_at: Timestamp,
    /// `Some(city)` when scoped to one officer's city.
    pub city_scope: Option<CityId>,
    pub complaints: Vec<Complaint>,
    pub geo: GeoSnapshot,
}

impl ComplaintSnapshot {
    pub fn capture(
        store: &CivicStore,
        taken_at: Timestamp,
        city_scope: Option<&str>,
    ) -> EngineResult<Self> {
        let complaints = match city_scope {
            Some(city) => store.complaints_in_city(city)?,
            None => store.all_complaints()?,
        };
        Ok(Self {
            taken_at,
            city_scope: city_scope.map(str::to_string),
            complaints,
            geo: store.geo_snapshot()?,
        })
    }

    pub fn from_parts(taken_at: Timestamp, complaints: Vec<Complaint>, geo: GeoSnapshot) -> Self {
        Self {
            taken_at,
            city_scope: None,
            complaints,
            geo,
        }
    }
}
