//! End-of-run performance metrics.
//!
//! Computed once after the last simulated year from the property store's
//! complete trace. Affordability follows the lifeline-volume convention:
//! the yearly cost of the lifeline volume at the utility's prices,
//! relative to the 20th percentile of disposable income across the
//! utility's municipalities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::NationalContext;
use crate::core::settings::SimulationSettings;
use crate::core::time::year_start;
use crate::store::{tables, PropertyStore, StoreError};

/// One utility's metrics for one simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityYearMetrics {
    pub year: i32,

    /// Capital expenditure booked this year
    pub capex: f64,

    /// Closing balance
    pub balance: f64,

    /// Total realized demand of the active municipalities
    pub demand: f64,

    /// Lifeline water cost over 20th-percentile disposable income;
    /// `None` when the utility serves no active municipality
    pub affordability: Option<f64>,
}

/// Per-utility yearly metric traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub by_utility: BTreeMap<String, Vec<UtilityYearMetrics>>,
}

/// Compute the full metric set for a finished run.
pub fn compute_metrics(
    settings: &SimulationSettings,
    national: &NationalContext,
    store: &PropertyStore,
) -> Result<Metrics, StoreError> {
    let mut by_utility = BTreeMap::new();

    for utility_id in national.utility_ids() {
        let utility = &national.utilities[&utility_id];
        let mut rows = Vec::with_capacity(settings.timeline().n_years());

        for year in settings.timeline().years() {
            let ts = year_start(year);

            let capex = store
                .get(tables::UTILITY_CAPEX, ts, &utility_id)
                .unwrap_or(0.0);
            let balance = store.get_latest_at_or_before(tables::UTILITY_BALANCE, ts, &utility_id)?;

            let mut demand = 0.0;
            let mut incomes = Vec::new();
            for municipality in utility.active_municipalities(&national.state, ts) {
                demand += store
                    .get(tables::MUNICIPALITY_DEMAND, ts, &municipality.id)
                    .unwrap_or(0.0);
                incomes.push(municipality.disposable_income(store, ts)?);
            }

            let affordability = if incomes.is_empty() {
                None
            } else {
                let (fixed, variable, _) = utility.water_prices(store, ts)?;
                let lifeline_cost = fixed + variable * settings.lifeline_volume;
                Some(lifeline_cost / percentile_20(&mut incomes))
            };

            rows.push(UtilityYearMetrics {
                year,
                capex,
                balance,
                demand,
                affordability,
            });
        }

        by_utility.insert(utility_id, rows);
    }

    Ok(Metrics { by_utility })
}

/// 20th percentile by the nearest-rank method over a small sample.
fn percentile_20(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = ((values.len() as f64) * 0.2).ceil() as usize;
    values[rank.saturating_sub(1).min(values.len() - 1)]
}
