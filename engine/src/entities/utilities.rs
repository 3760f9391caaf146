//! Water utilities.
//!
//! A utility operates the network inside its assigned provinces: it owns a
//! supply line per source (pumping station + supply connection), the peer
//! connections internal to its provinces, its outstanding bond issuances
//! and its solar farms. Municipalities are derived from the provinces, not
//! stored. Balance and water prices are store-backed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::jurisdictions::{Municipality, State};
use crate::entities::BondIssuance;
use crate::store::{tables, PropertyStore, StoreError};

/// The pair of entities that bring one source's water to the utility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyLine {
    pub station_id: String,
    pub connection_id: String,
}

/// A water utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterUtility {
    /// Unique id (e.g. "WU01")
    pub id: String,

    /// Provinces assigned to this utility
    pub province_ids: BTreeSet<String>,

    /// Source id → supply line serving it
    pub supplies: BTreeMap<String, SupplyLine>,

    /// Peer connections fully inside the utility's provinces
    pub peer_connection_ids: BTreeSet<String>,

    /// Outstanding bond issuances
    pub bonds: Vec<BondIssuance>,

    /// Solar farms on this utility's infrastructure
    pub solar_farm_ids: BTreeSet<String>,
}

impl WaterUtility {
    /// Create a utility with no infrastructure attached yet.
    pub fn new(id: impl Into<String>, province_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: id.into(),
            province_ids: province_ids.into_iter().collect(),
            supplies: BTreeMap::new(),
            peer_connection_ids: BTreeSet::new(),
            bonds: Vec::new(),
            solar_farm_ids: BTreeSet::new(),
        }
    }

    /// All municipalities of the utility's provinces, sorted by id.
    /// Computed, never stored.
    pub fn municipalities<'a>(&self, state: &'a State) -> Vec<&'a Municipality> {
        let mut munis: Vec<&Municipality> = state
            .provinces
            .iter()
            .filter(|p| self.province_ids.contains(&p.id))
            .flat_map(|p| p.municipalities.iter())
            .collect();
        munis.sort_by(|a, b| a.id.cmp(&b.id));
        munis
    }

    /// Municipalities active at `when`, sorted by id.
    pub fn active_municipalities<'a>(
        &self,
        state: &'a State,
        when: NaiveDate,
    ) -> Vec<&'a Municipality> {
        self.municipalities(state)
            .into_iter()
            .filter(|m| m.is_active(when))
            .collect()
    }

    /// Ids of all connections the utility operates (supply + peer), sorted.
    pub fn connection_ids(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.peer_connection_ids.clone();
        ids.extend(self.supplies.values().map(|s| s.connection_id.clone()));
        ids.into_iter().collect()
    }

    /// Ids of the utility's pumping stations, sorted.
    pub fn station_ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .supplies
            .values()
            .map(|s| s.station_id.clone())
            .collect();
        ids.into_iter().collect()
    }

    /// Balance in force at `when`.
    pub fn balance(&self, store: &PropertyStore, when: NaiveDate) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::UTILITY_BALANCE, when, &self.id)
    }

    /// Record the balance at `when`.
    pub fn set_balance(
        &self,
        store: &mut PropertyStore,
        when: NaiveDate,
        value: f64,
    ) -> Result<(), StoreError> {
        store.set(tables::UTILITY_BALANCE, when, &self.id, value)
    }

    /// The three water price components in force at `when`:
    /// (fixed, variable, selling).
    pub fn water_prices(
        &self,
        store: &PropertyStore,
        when: NaiveDate,
    ) -> Result<(f64, f64, f64), StoreError> {
        Ok((
            store.get_latest_at_or_before(tables::UTILITY_PRICE_FIXED, when, &self.id)?,
            store.get_latest_at_or_before(tables::UTILITY_PRICE_VARIABLE, when, &self.id)?,
            store.get_latest_at_or_before(tables::UTILITY_PRICE_SELLING, when, &self.id)?,
        ))
    }

    /// Record all three price components at `when`.
    pub fn set_water_prices(
        &self,
        store: &mut PropertyStore,
        when: NaiveDate,
        fixed: f64,
        variable: f64,
        selling: f64,
    ) -> Result<(), StoreError> {
        store.set(tables::UTILITY_PRICE_FIXED, when, &self.id, fixed)?;
        store.set(tables::UTILITY_PRICE_VARIABLE, when, &self.id, variable)?;
        store.set(tables::UTILITY_PRICE_SELLING, when, &self.id, selling)?;
        Ok(())
    }

    /// Total bond payment due in `year` across all issuances.
    pub fn debt_service(&self, year: i32) -> f64 {
        self.bonds.iter().map(|b| b.payment_due(year)).sum()
    }
}
