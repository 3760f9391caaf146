//! Demand realization.
//!
//! Per municipality and year, the realized demand is built from three
//! parts: billed household demand, billed business demand, and the
//! non-revenue-water surcharge implied by the state of the distribution
//! network. Household demand responds to hot years: the yearly temperature
//! signal is raised to a fixed exponent against a reference maximum, so a
//! heat year lifts residential consumption disproportionately.

use crate::core::time::year_start;
use crate::entities::jurisdictions::Municipality;
use crate::rng::Xorshift64Star;
use crate::store::{tables, PropertyStore, StoreError};

/// Reference yearly maximum temperature the modulation is anchored to.
pub const REFERENCE_T_MAX: f64 = 20.6;

/// Exponent applied to the temperature ratio for household demand.
pub const T_MAX_RATIO_EXPONENT: i32 = 5;

/// Bounds of the random year-to-year modulation factor.
const MODULATION_BOUNDS: (f64, f64) = (0.95, 1.05);

/// Billed and total demand realized for one municipality in one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedDemand {
    pub household: f64,
    pub business: f64,
    pub nrw: f64,
}

impl RealizedDemand {
    /// Billed volume: household plus business.
    pub fn billed(&self) -> f64 {
        self.household + self.business
    }

    /// Total volume put into the network, including losses.
    pub fn total(&self) -> f64 {
        self.billed() + self.nrw
    }
}

/// Realize one municipality's demand for `year` and record the total in
/// the demand table.
///
/// Household demand scales with `(t_max / reference)^5`; business demand
/// does not respond to temperature. Both get an independent uniform
/// modulation factor from the `demand-modulation` stream. The NRW
/// surcharge is the billed volume times the demand factor of the
/// municipality's NRW class.
pub fn realize_municipal_demand(
    municipality: &Municipality,
    year: i32,
    max_yearly_temperature: f64,
    store: &mut PropertyStore,
    state_id: &str,
    modulation_rng: &mut Xorshift64Star,
) -> Result<RealizedDemand, StoreError> {
    let ts = year_start(year);

    let population = municipality.population(store, ts)?;
    let per_capita_household =
        store.get_latest_at_or_before(tables::DEMAND_PER_CAPITA_HOUSEHOLD, ts, state_id)?;
    let per_capita_business =
        store.get_latest_at_or_before(tables::DEMAND_PER_CAPITA_BUSINESS, ts, state_id)?;

    let temperature_factor =
        (max_yearly_temperature / REFERENCE_T_MAX).powi(T_MAX_RATIO_EXPONENT);

    let household = population
        * per_capita_household
        * temperature_factor
        * modulation_rng.uniform(MODULATION_BOUNDS.0, MODULATION_BOUNDS.1);
    let business = population
        * per_capita_business
        * modulation_rng.uniform(MODULATION_BOUNDS.0, MODULATION_BOUNDS.1);

    let nrw = (household + business) * municipality.nrw_class(store, ts)?.demand_factor();

    let realized = RealizedDemand {
        household,
        business,
        nrw,
    };
    municipality.track_demand(store, year, realized.total())?;

    Ok(realized)
}
