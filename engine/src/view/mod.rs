//! Year-bound snapshots of time-varying entities.
//!
//! A view pins an entity to one year and rewrites every dynamic attribute
//! access into a property-store lookup at that year (collection-valued
//! attributes delegate to the underlying activity predicates). Views are
//! read-focused: constructing one never mutates the store.
//!
//! Views of the same entity at different years compare unequal only by
//! year; derived state does not enter equality. The aging step relies on
//! this when it diffs active-municipality sets of consecutive years to
//! detect closures.

use chrono::NaiveDate;

use crate::core::time::year_start;
use crate::entities::jurisdictions::{Municipality, MunicipalitySize, NrwClass, State};
use crate::entities::WaterUtility;
use crate::store::{PropertyStore, StoreError};

/// A municipality at a fixed year.
#[derive(Debug, Clone, Copy)]
pub struct MunicipalityView<'a> {
    municipality: &'a Municipality,
    store: &'a PropertyStore,
    year: i32,
}

impl<'a> MunicipalityView<'a> {
    /// Bind a municipality to a year.
    pub fn new(municipality: &'a Municipality, store: &'a PropertyStore, year: i32) -> Self {
        Self {
            municipality,
            store,
            year,
        }
    }

    /// The wrapped municipality.
    pub fn municipality(&self) -> &'a Municipality {
        self.municipality
    }

    /// Municipality id.
    pub fn id(&self) -> &str {
        &self.municipality.id
    }

    /// The view's year.
    pub fn year(&self) -> i32 {
        self.year
    }

    fn at(&self) -> NaiveDate {
        year_start(self.year)
    }

    /// Whether the municipality exists this year.
    pub fn is_active(&self) -> bool {
        self.municipality.is_active(self.at())
    }

    /// Population this year.
    pub fn population(&self) -> Result<f64, StoreError> {
        self.municipality.population(self.store, self.at())
    }

    /// Average disposable income this year.
    pub fn disposable_income(&self) -> Result<f64, StoreError> {
        self.municipality.disposable_income(self.store, self.at())
    }

    /// Distribution-network age this year.
    pub fn network_age(&self) -> Result<f64, StoreError> {
        self.municipality.network_age(self.store, self.at())
    }

    /// Distribution-network length this year.
    pub fn network_length(&self) -> Result<f64, StoreError> {
        self.municipality.network_length(self.store, self.at())
    }

    /// NRW severity class this year.
    pub fn nrw_class(&self) -> Result<NrwClass, StoreError> {
        self.municipality.nrw_class(self.store, self.at())
    }

    /// Size class this year.
    pub fn size_class(&self) -> Result<MunicipalitySize, StoreError> {
        self.municipality.size_class(self.store, self.at())
    }
}

impl PartialEq for MunicipalityView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.municipality.id == other.municipality.id && self.year == other.year
    }
}

impl Eq for MunicipalityView<'_> {}

/// A water utility at a fixed year.
#[derive(Debug, Clone, Copy)]
pub struct UtilityView<'a> {
    utility: &'a WaterUtility,
    state: &'a State,
    store: &'a PropertyStore,
    year: i32,
}

impl<'a> UtilityView<'a> {
    /// Bind a utility to a year.
    pub fn new(
        utility: &'a WaterUtility,
        state: &'a State,
        store: &'a PropertyStore,
        year: i32,
    ) -> Self {
        Self {
            utility,
            state,
            store,
            year,
        }
    }

    /// The wrapped utility.
    pub fn utility(&self) -> &'a WaterUtility {
        self.utility
    }

    /// Utility id.
    pub fn id(&self) -> &str {
        &self.utility.id
    }

    /// The view's year.
    pub fn year(&self) -> i32 {
        self.year
    }

    fn at(&self) -> NaiveDate {
        year_start(self.year)
    }

    /// Municipalities active this year, as views at the same year, sorted
    /// by id.
    pub fn active_municipalities(&self) -> Vec<MunicipalityView<'a>> {
        self.utility
            .active_municipalities(self.state, self.at())
            .into_iter()
            .map(|m| MunicipalityView::new(m, self.store, self.year))
            .collect()
    }

    /// Ids of municipalities active this year, sorted.
    pub fn active_municipality_ids(&self) -> Vec<String> {
        self.utility
            .active_municipalities(self.state, self.at())
            .into_iter()
            .map(|m| m.id.clone())
            .collect()
    }

    /// Balance this year.
    pub fn balance(&self) -> Result<f64, StoreError> {
        self.utility.balance(self.store, self.at())
    }

    /// Water price components (fixed, variable, selling) this year.
    pub fn water_prices(&self) -> Result<(f64, f64, f64), StoreError> {
        self.utility.water_prices(self.store, self.at())
    }
}

impl PartialEq for UtilityView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.utility.id == other.utility.id && self.year == other.year
    }
}

impl Eq for UtilityView<'_> {}
