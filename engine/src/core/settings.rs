//! Run settings and model parameter blocks.
//!
//! Everything a host must supply to configure a run, minus the bulk data
//! (entity tables and time series, which arrive through the property store
//! and the entity constructors). All blocks are plain serde-deserializable
//! structs; schema-level validation of the files they come from is the
//! host's responsibility.

use serde::{Deserialize, Serialize};

use crate::core::time::Timeline;

/// Last year of the historical period.
///
/// Runs that end at or before this year replay recorded history: pipe and
/// pump lifetimes were already decided by the pre-processing that produced
/// the input data, so the lifetime streams return a fixed constant instead
/// of sampling (see [`crate::rng::RandomStreamManager`]).
pub const HISTORICAL_PERIOD_END: i32 = 2024;

/// Fixed lifetime (years) handed out by the lifetime streams during a
/// historical-period run.
pub const HISTORICAL_FIXED_LIFETIME: u32 = 200;

/// Top-level simulation settings.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::SimulationSettings;
///
/// let settings = SimulationSettings::new(2025, 2050, 12345);
/// assert_eq!(settings.timeline().n_years(), 26);
/// assert!(!settings.is_historical_period());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// First simulated year (inclusive)
    pub start_year: i32,

    /// Last simulated year (inclusive)
    pub end_year: i32,

    /// Master seed for all named random streams
    pub seed: u64,

    /// Yearly lifeline volume per capita (m3), used by affordability metrics
    pub lifeline_volume: f64,

    /// Yearly national capital budget shared across utilities by the
    /// `budget_allocation` policy
    pub national_budget: f64,
}

impl SimulationSettings {
    /// Create settings with default lifeline volume and no national budget.
    pub fn new(start_year: i32, end_year: i32, seed: u64) -> Self {
        Self {
            start_year,
            end_year,
            seed,
            lifeline_volume: 50.0,
            national_budget: 0.0,
        }
    }

    /// The simulated horizon as a [`Timeline`].
    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.start_year, self.end_year)
    }

    /// Whether the whole run lies inside the historical period.
    ///
    /// Lifetime sampling is disabled for historical runs: the decommission
    /// dates are already in the input data and the streams must not consume
    /// entropy that a forward-looking run would need.
    pub fn is_historical_period(&self) -> bool {
        self.end_year <= HISTORICAL_PERIOD_END
    }
}

/// Non-revenue-water model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NrwModelSettings {
    /// Bounds for the sampled success probability of an NRW intervention,
    /// drawn once per (NRW class, size class) pair per application
    pub success_probability_bounds: (f64, f64),
}

impl Default for NrwModelSettings {
    fn default() -> Self {
        Self {
            success_probability_bounds: (0.95, 1.0),
        }
    }
}

/// Bond market settings shared by all issuances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondsSettings {
    /// Risk-free rate in percentage points
    pub risk_free_rate: f64,

    /// Sensitivity of the yield spread to investor demand
    pub spread_sensitivity: f64,

    /// Bond maturity in years
    pub maturity: u32,
}

impl Default for BondsSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: 2.0,
            spread_sensitivity: 1.0,
            maturity: 20,
        }
    }
}

/// Construction parameters for new water sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesSettings {
    /// Allowed surplus over the permit when sizing a groundwater source
    pub groundwater_size_surplus: f64,

    /// Construction size bounds for surface-water sources (m3/day)
    pub surface_water_size_bounds: (f64, f64),

    /// Construction size bounds for desalination sources (m3/day)
    pub desalination_size_bounds: (f64, f64),
}

impl Default for SourcesSettings {
    fn default() -> Self {
        Self {
            groundwater_size_surplus: 0.1,
            surface_water_size_bounds: (1_000.0, 100_000.0),
            desalination_size_bounds: (5_000.0, 50_000.0),
        }
    }
}
