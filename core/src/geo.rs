//! Geographic reference data: state → city → nagar.
//!
//! The engine never caches this. Callers load a [`GeoSnapshot`] (usually via
//! `CivicStore::geo_snapshot`) and pass it into each call that needs it.

use crate::types::{CityId, NagarId, StateId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    pub state_id: StateId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct City {
    pub city_id: CityId,
    pub state_id: StateId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Nagar {
    pub nagar_id: NagarId,
    pub city_id: CityId,
    pub name: String,
}

/// Read-only view of the geographic hierarchy at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoSnapshot {
    pub states: HashMap<StateId, State>,
    pub cities: HashMap<CityId, City>,
    pub nagars: HashMap<NagarId, Nagar>,
}

impl GeoSnapshot {
    pub fn from_rows(states: Vec<State>, cities: Vec<City>, nagars: Vec<Nagar>) -> Self {
        Self {
            states: states.into_iter().map(|s| (s.state_id.clone(), s)).collect(),
            cities: cities.into_iter().map(|c| (c.city_id.clone(), c)).collect(),
            nagars: nagars.into_iter().map(|n| (n.nagar_id.clone(), n)).collect(),
        }
    }

    pub fn nagar(&self, nagar_id: &str) -> Option<&Nagar> {
        self.nagars.get(nagar_id)
    }

    pub fn city_name(&self, city_id: &str) -> Option<&str> {
        self.cities.get(city_id).map(|c| c.name.as_str())
    }

    /// True when the nagar sits in the city and the city sits in the state.
    pub fn is_consistent(&self, state_id: &str, city_id: &str, nagar_id: &str) -> bool {
        let Some(nagar) = self.nagars.get(nagar_id) else {
            return false;
        };
        let Some(city) = self.cities.get(city_id) else {
            return false;
        };
        nagar.city_id == city_id && city.state_id == state_id && self.states.contains_key(state_id)
    }

    /// City that owns a nagar, if the nagar is known.
    pub fn city_of_nagar(&self, nagar_id: &str) -> Option<&str> {
        self.nagars.get(nagar_id).map(|n| n.city_id.as_str())
    }
}
