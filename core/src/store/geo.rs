use super::CivicStore;
use crate::{
    error::EngineResult,
    geo::{City, GeoSnapshot, Nagar, State},
};
use rusqlite::params;

impl CivicStore {
    // ── Geography ──────────────────────────────────────────────────

    pub fn insert_state(&self, s: &State) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO state (state_id, name) VALUES (?1, ?2)",
            params![s.state_id, s.name],
        )?;
        Ok(())
    }

    pub fn insert_city(&self, c: &City) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO city (city_id, state_id, name) VALUES (?1, ?2, ?3)",
            params![c.city_id, c.state_id, c.name],
        )?;
        Ok(())
    }

    pub fn insert_nagar(&self, n: &Nagar) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO nagar (nagar_id, city_id, name) VALUES (?1, ?2, ?3)",
            params![n.nagar_id, n.city_id, n.name],
        )?;
        Ok(())
    }

    /// Point-in-time read of the whole hierarchy.
    pub fn geo_snapshot(&self) -> EngineResult<GeoSnapshot> {
        let states = self
            .conn
            .prepare("SELECT state_id, name FROM state")?
            .query_map([], |row| {
                Ok(State {
                    state_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let cities = self
            .conn
            .prepare("SELECT city_id, state_id, name FROM city")?
            .query_map([], |row| {
                Ok(City {
                    city_id: row.get(0)?,
                    state_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let nagars = self
            .conn
            .prepare("SELECT nagar_id, city_id, name FROM nagar")?
            .query_map([], |row| {
                Ok(Nagar {
                    nagar_id: row.get(0)?,
                    city_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GeoSnapshot::from_rows(states, cities, nagars))
    }
}
