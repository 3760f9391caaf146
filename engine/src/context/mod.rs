//! National context: the ownership root of the entity graph.
//!
//! The context owns the option catalog, every source, pumping station,
//! connection, solar farm and utility, plus the model settings blocks.
//! Connections not claimed by any utility remain with the context as
//! unassigned (cross-utility) connections. Every `add_*` method validates
//! the references its entity carries, so a dangling id fails at
//! configuration time, not mid-run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::OptionCatalog;
use crate::core::settings::{BondsSettings, NrwModelSettings, SourcesSettings};
use crate::entities::{
    Connection, ConnectionKind, PumpingStation, SolarFarm, State, WaterSource, WaterUtility,
};
use crate::store::{tables, PropertyStore, StoreError};

/// A masterplan or configuration referenced an id that does not exist.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown {kind} reference: '{id}'")]
pub struct UnknownReference {
    /// What kind of entity was looked up ("source", "pipe option", …)
    pub kind: &'static str,
    /// The id that failed to resolve
    pub id: String,
}

impl UnknownReference {
    pub(crate) fn new(kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// The national entity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NationalContext {
    /// Jurisdiction tree
    pub state: State,

    /// Catalog of installable options
    pub catalog: OptionCatalog,

    /// Model settings blocks
    pub bonds_settings: BondsSettings,
    pub nrw_settings: NrwModelSettings,
    pub sources_settings: SourcesSettings,

    /// All water sources, keyed by id
    pub sources: BTreeMap<String, WaterSource>,

    /// All pumping stations, keyed by id
    pub stations: BTreeMap<String, PumpingStation>,

    /// All connections, keyed by id
    pub connections: BTreeMap<String, Connection>,

    /// All solar farms, keyed by id
    pub solar_farms: BTreeMap<String, SolarFarm>,

    /// All utilities, keyed by id
    pub utilities: BTreeMap<String, WaterUtility>,
}

impl NationalContext {
    /// Create a context holding only the jurisdiction tree and the catalog.
    pub fn new(
        state: State,
        catalog: OptionCatalog,
        bonds_settings: BondsSettings,
        nrw_settings: NrwModelSettings,
        sources_settings: SourcesSettings,
    ) -> Self {
        Self {
            state,
            catalog,
            bonds_settings,
            nrw_settings,
            sources_settings,
            sources: BTreeMap::new(),
            stations: BTreeMap::new(),
            connections: BTreeMap::new(),
            solar_farms: BTreeMap::new(),
            utilities: BTreeMap::new(),
        }
    }

    /// Register a source. Its province must exist.
    pub fn add_source(&mut self, source: WaterSource) -> Result<(), UnknownReference> {
        if self.state.province(&source.province_id).is_none() {
            return Err(UnknownReference::new("province", &source.province_id));
        }
        self.sources.insert(source.id.clone(), source);
        Ok(())
    }

    /// Register a pumping station. Its source must exist.
    pub fn add_station(&mut self, station: PumpingStation) -> Result<(), UnknownReference> {
        if !self.sources.contains_key(&station.source_id) {
            return Err(UnknownReference::new("source", &station.source_id));
        }
        self.stations.insert(station.id.clone(), station);
        Ok(())
    }

    /// Register a connection. Both endpoints must exist.
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), UnknownReference> {
        match &connection.kind {
            ConnectionKind::Supply { source_id } => {
                if !self.sources.contains_key(source_id) {
                    return Err(UnknownReference::new("source", source_id));
                }
            }
            ConnectionKind::Peer {
                from_municipality_id,
            } => {
                if self.state.municipality(from_municipality_id).is_none() {
                    return Err(UnknownReference::new(
                        "municipality",
                        from_municipality_id,
                    ));
                }
            }
        }
        if self
            .state
            .municipality(&connection.to_municipality_id)
            .is_none()
        {
            return Err(UnknownReference::new(
                "municipality",
                &connection.to_municipality_id,
            ));
        }
        self.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    /// Register a solar farm. Its connected entity must be a known source
    /// or station.
    pub fn add_solar_farm(&mut self, farm: SolarFarm) -> Result<(), UnknownReference> {
        let target = &farm.connected_entity_id;
        if !self.sources.contains_key(target) && !self.stations.contains_key(target) {
            return Err(UnknownReference::new("source or station", target));
        }
        self.solar_farms.insert(farm.id.clone(), farm);
        Ok(())
    }

    /// Register a utility. Its provinces, supply lines and peer connections
    /// must all exist.
    pub fn add_utility(&mut self, utility: WaterUtility) -> Result<(), UnknownReference> {
        for province_id in &utility.province_ids {
            if self.state.province(province_id).is_none() {
                return Err(UnknownReference::new("province", province_id));
            }
        }
        for (source_id, line) in &utility.supplies {
            if !self.sources.contains_key(source_id) {
                return Err(UnknownReference::new("source", source_id));
            }
            if !self.stations.contains_key(&line.station_id) {
                return Err(UnknownReference::new("pumping station", &line.station_id));
            }
            if !self.connections.contains_key(&line.connection_id) {
                return Err(UnknownReference::new("connection", &line.connection_id));
            }
        }
        for connection_id in &utility.peer_connection_ids {
            if !self.connections.contains_key(connection_id) {
                return Err(UnknownReference::new("connection", connection_id));
            }
        }
        self.utilities.insert(utility.id.clone(), utility);
        Ok(())
    }

    /// Look up a source.
    pub fn source(&self, id: &str) -> Result<&WaterSource, UnknownReference> {
        self.sources
            .get(id)
            .ok_or_else(|| UnknownReference::new("source", id))
    }

    /// Look up a connection.
    pub fn connection(&self, id: &str) -> Result<&Connection, UnknownReference> {
        self.connections
            .get(id)
            .ok_or_else(|| UnknownReference::new("connection", id))
    }

    /// Look up a utility.
    pub fn utility(&self, id: &str) -> Result<&WaterUtility, UnknownReference> {
        self.utilities
            .get(id)
            .ok_or_else(|| UnknownReference::new("water utility", id))
    }

    /// The station assigned to a source.
    pub fn station_for_source(&self, source_id: &str) -> Result<&PumpingStation, UnknownReference> {
        self.stations
            .values()
            .find(|s| s.source_id == source_id)
            .ok_or_else(|| UnknownReference::new("pumping station for source", source_id))
    }

    /// Utility ids in sorted order: the per-year processing order.
    pub fn utility_ids(&self) -> Vec<String> {
        self.utilities.keys().cloned().collect()
    }

    /// Connections not claimed by any utility, sorted by id.
    pub fn unassigned_connection_ids(&self) -> Vec<String> {
        let assigned: BTreeSet<String> = self
            .utilities
            .values()
            .flat_map(|u| u.connection_ids())
            .collect();
        self.connections
            .keys()
            .filter(|id| !assigned.contains(*id))
            .cloned()
            .collect()
    }

    /// Whether a connection is active at `when`: a supply connection follows
    /// its source, a peer connection needs both endpoint municipalities.
    pub fn connection_is_active(&self, connection: &Connection, when: NaiveDate) -> bool {
        let municipality_active = |id: &str| {
            self.state
                .municipality(id)
                .map_or(false, |m| m.is_active(when))
        };

        match &connection.kind {
            ConnectionKind::Supply { source_id } => self
                .sources
                .get(source_id)
                .map_or(false, |s| s.is_active(when)),
            ConnectionKind::Peer {
                from_municipality_id,
            } => {
                municipality_active(from_municipality_id)
                    && municipality_active(&connection.to_municipality_id)
            }
        }
    }

    /// The year's representative temperature: maximum over the year of the
    /// seasonal average-max series. Computed once per year, shared by all
    /// utilities.
    pub fn max_yearly_temperature(
        &self,
        store: &PropertyStore,
        year: i32,
    ) -> Result<f64, StoreError> {
        store.year_max(tables::CLIMATE_AVG_MAX_TEMPERATURE, year, &self.state.id)
    }

    /// Inflation rate for `year` in percentage points (exact lookup;
    /// a missing year is malformed data).
    pub fn inflation(&self, store: &PropertyStore, year: i32) -> Result<f64, StoreError> {
        store.get(
            tables::ECONOMY_INFLATION,
            crate::core::time::year_start(year),
            &self.state.id,
        )
    }
}
