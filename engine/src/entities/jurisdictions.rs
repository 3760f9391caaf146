//! Jurisdictions: state, provinces, municipalities.
//!
//! The state owns its provinces, provinces own their municipalities.
//! Municipalities carry the dynamic attributes that the NRW model and the
//! demand model operate on: population, disposable income, inner
//! distribution-network age and length, realized demand, all store-backed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::time::year_start;
use crate::store::{tables, PropertyStore, StoreError};

/// Size class of a municipality, derived from population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MunicipalitySize {
    Small,
    Medium,
    Large,
}

impl MunicipalitySize {
    /// Classify a population count.
    pub fn from_population(population: f64) -> Self {
        if population < 20_000.0 {
            MunicipalitySize::Small
        } else if population < 100_000.0 {
            MunicipalitySize::Medium
        } else {
            MunicipalitySize::Large
        }
    }

    /// Canonical lowercase label, as used in cost-table entity ids.
    pub fn name(&self) -> &'static str {
        match self {
            MunicipalitySize::Small => "small",
            MunicipalitySize::Medium => "medium",
            MunicipalitySize::Large => "large",
        }
    }
}

/// Non-revenue-water severity class, derived from the average age of the
/// inner distribution network. `A` is the best state, `E` the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NrwClass {
    A,
    B,
    C,
    D,
    E,
}

impl NrwClass {
    /// Classify a network age (years).
    pub fn from_network_age(age: f64) -> Self {
        if age < 10.0 {
            NrwClass::A
        } else if age < 20.0 {
            NrwClass::B
        } else if age < 30.0 {
            NrwClass::C
        } else if age < 40.0 {
            NrwClass::D
        } else {
            NrwClass::E
        }
    }

    /// Network-age band covered by this class (lower inclusive, upper
    /// exclusive; `E` is open-ended).
    pub fn age_bounds(&self) -> (f64, f64) {
        match self {
            NrwClass::A => (0.0, 10.0),
            NrwClass::B => (10.0, 20.0),
            NrwClass::C => (20.0, 30.0),
            NrwClass::D => (30.0, 40.0),
            NrwClass::E => (40.0, f64::INFINITY),
        }
    }

    /// Share of billed demand lost as non-revenue water for networks in
    /// this class.
    pub fn demand_factor(&self) -> f64 {
        match self {
            NrwClass::A => 0.05,
            NrwClass::B => 0.10,
            NrwClass::C => 0.15,
            NrwClass::D => 0.25,
            NrwClass::E => 0.40,
        }
    }

    /// Severity rank for greedy prioritization (worst first): `E` = 4,
    /// `A` = 0.
    pub fn severity(&self) -> u8 {
        match self {
            NrwClass::A => 0,
            NrwClass::B => 1,
            NrwClass::C => 2,
            NrwClass::D => 3,
            NrwClass::E => 4,
        }
    }

    /// Canonical lowercase label, as used in cost-table entity ids.
    pub fn name(&self) -> &'static str {
        match self {
            NrwClass::A => "a",
            NrwClass::B => "b",
            NrwClass::C => "c",
            NrwClass::D => "d",
            NrwClass::E => "e",
        }
    }
}

/// A municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Municipality {
    /// Unique id (e.g. "GM0356")
    pub id: String,

    /// Display name
    pub display_name: String,

    /// Province this municipality belongs to
    pub province_id: String,

    /// First day the municipality exists; `None` means since before the
    /// data horizon
    pub opened: Option<NaiveDate>,

    /// Day the municipality ceases to exist (merged away); `None` while
    /// open
    pub closed: Option<NaiveDate>,
}

impl Municipality {
    /// Whether the municipality exists at `when`.
    pub fn is_active(&self, when: NaiveDate) -> bool {
        self.opened.map_or(true, |o| o <= when) && self.closed.map_or(true, |c| c > when)
    }

    /// Population in force at `when` (as-of lookup).
    pub fn population(&self, store: &PropertyStore, when: NaiveDate) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::MUNICIPALITY_POPULATION, when, &self.id)
    }

    /// Average disposable income in force at `when`.
    pub fn disposable_income(
        &self,
        store: &PropertyStore,
        when: NaiveDate,
    ) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::MUNICIPALITY_DISPOSABLE_INCOME, when, &self.id)
    }

    /// Average age of the inner distribution network at `when`.
    pub fn network_age(&self, store: &PropertyStore, when: NaiveDate) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::MUNICIPALITY_NETWORK_AGE, when, &self.id)
    }

    /// Length of the inner distribution network at `when` (km).
    pub fn network_length(
        &self,
        store: &PropertyStore,
        when: NaiveDate,
    ) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::MUNICIPALITY_NETWORK_LENGTH, when, &self.id)
    }

    /// NRW severity class at `when`.
    pub fn nrw_class(&self, store: &PropertyStore, when: NaiveDate) -> Result<NrwClass, StoreError> {
        Ok(NrwClass::from_network_age(self.network_age(store, when)?))
    }

    /// Size class at `when`.
    pub fn size_class(
        &self,
        store: &PropertyStore,
        when: NaiveDate,
    ) -> Result<MunicipalitySize, StoreError> {
        Ok(MunicipalitySize::from_population(
            self.population(store, when)?,
        ))
    }

    /// Shift the network age recorded at `when` by `by` years, flooring at
    /// zero. NRW mitigation spends call this with a negative shift.
    pub fn update_network_age(
        &self,
        store: &mut PropertyStore,
        when: NaiveDate,
        by: f64,
    ) -> Result<f64, StoreError> {
        let current = self.network_age(store, when)?;
        let updated = (current + by).max(0.0);
        store.set(tables::MUNICIPALITY_NETWORK_AGE, when, &self.id, updated)?;
        Ok(updated)
    }

    /// Record the realized total demand for a year.
    pub fn track_demand(
        &self,
        store: &mut PropertyStore,
        year: i32,
        value: f64,
    ) -> Result<(), StoreError> {
        store.set(tables::MUNICIPALITY_DEMAND, year_start(year), &self.id, value)
    }
}

/// A province: an administrative grouping of municipalities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Province {
    /// Unique id (e.g. "PV26")
    pub id: String,

    /// Display name
    pub display_name: String,

    /// Municipalities in this province
    pub municipalities: Vec<Municipality>,
}

/// The national state: the root of the jurisdiction tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Unique id (e.g. "NL0000"), also the entity id of national-level
    /// series (inflation, temperature)
    pub id: String,

    /// Display name
    pub display_name: String,

    /// Provinces of the state
    pub provinces: Vec<Province>,
}

impl State {
    /// Find a province by id.
    pub fn province(&self, id: &str) -> Option<&Province> {
        self.provinces.iter().find(|p| p.id == id)
    }

    /// Find a municipality by id anywhere in the state.
    pub fn municipality(&self, id: &str) -> Option<&Municipality> {
        self.provinces
            .iter()
            .flat_map(|p| p.municipalities.iter())
            .find(|m| m.id == id)
    }

    /// All municipalities of the state.
    pub fn municipalities(&self) -> impl Iterator<Item = &Municipality> {
        self.provinces.iter().flat_map(|p| p.municipalities.iter())
    }
}
