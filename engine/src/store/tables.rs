//! Canonical table names.
//!
//! One constant per table so that writers and readers cannot drift apart on
//! spelling. Entity-id conventions are noted where they are not just an
//! entity's own id.

/// Seasonal average of daily maximum temperature. Entity: state id.
/// Sub-year timestamps (one entry per season).
pub const CLIMATE_AVG_MAX_TEMPERATURE: &str = "climate-avg_max_temperature";

/// Yearly inflation in percentage points. Entity: state id.
pub const ECONOMY_INFLATION: &str = "economy-inflation";

/// Yearly inflation expectation in percentage points. Entity: state id.
pub const ECONOMY_INFLATION_EXPECTATION: &str = "economy-inflation_expectation";

/// Yearly investor demand index in [0, 1]. Entity: state id.
pub const ECONOMY_INVESTOR_DEMAND: &str = "economy-investor_demand";

/// Resident population. Entity: municipality id.
pub const MUNICIPALITY_POPULATION: &str = "municipality-population";

/// Average disposable income. Entity: municipality id.
pub const MUNICIPALITY_DISPOSABLE_INCOME: &str = "municipality-disposable_income";

/// Average age of the inner distribution network (years). Entity:
/// municipality id.
pub const MUNICIPALITY_NETWORK_AGE: &str = "municipality-network_age";

/// Length of the inner distribution network (km). Entity: municipality id.
pub const MUNICIPALITY_NETWORK_LENGTH: &str = "municipality-network_length";

/// Realized total water demand (m3/year). Entity: municipality id.
pub const MUNICIPALITY_DEMAND: &str = "municipality-demand";

/// Per-capita household demand (m3/person/year). Entity: state id.
pub const DEMAND_PER_CAPITA_HOUSEHOLD: &str = "demand-per_capita_household";

/// Per-capita business demand (m3/person/year). Entity: state id.
pub const DEMAND_PER_CAPITA_BUSINESS: &str = "demand-per_capita_business";

/// NRW remediation unit cost (per km of network per year of age bought).
/// Entity: `{state}-{nrw_class}-{size_class}`.
pub const NRW_INTERVENTION_UNIT_COST: &str = "nrw_intervention-unit_cost";

/// Construction unit cost of a new source (per m3/day of capacity).
/// Entity: source kind name.
pub const SOURCE_UNIT_COST: &str = "new_source-unit_cost";

/// Fixed yearly opex of a source. Entity: source kind name.
pub const SOURCE_OPEX_FIXED: &str = "source-opex_fixed";

/// Volumetric non-energy opex of a source. Entity: source kind name.
pub const SOURCE_OPEX_VOLUMETRIC: &str = "source-opex_volumetric";

/// Unit cost of a new pipe (per km). Entity: pipe option id.
pub const PIPE_UNIT_COST: &str = "new_pipe-unit_cost";

/// Embodied emissions factor of a new pipe. Entity: pipe option id.
pub const PIPE_EMISSIONS_FACTOR: &str = "new_pipe-emissions_factor";

/// Unit cost of a new pump. Entity: pump option id.
pub const PUMP_UNIT_COST: &str = "new_pump-unit_cost";

/// Darcy friction factor of an installed pipe. Entity: pipe asset id.
pub const PIPE_FRICTION_FACTOR: &str = "pipe-friction_factor";

/// Unit cost of solar panel capacity (per kW). Entity: state id. Exogenous,
/// never escalated.
pub const SOLAR_PANEL_UNIT_COST: &str = "solar_panel-unit_cost";

/// Electricity unit cost (per kWh). Entity: state id. Exogenous, never
/// escalated.
pub const ELECTRICITY_UNIT_COST: &str = "electricity-unit_cost";

/// Utility financial balance at year end. Entity: utility id.
pub const UTILITY_BALANCE: &str = "utility-balance";

/// Fixed component of the water price. Entity: utility id.
pub const UTILITY_PRICE_FIXED: &str = "utility-price_fixed";

/// Variable component of the water price. Entity: utility id.
pub const UTILITY_PRICE_VARIABLE: &str = "utility-price_variable";

/// Selling (wholesale) component of the water price. Entity: utility id.
pub const UTILITY_PRICE_SELLING: &str = "utility-price_selling";

/// Capital expenditure realized in a year. Entity: utility id.
pub const UTILITY_CAPEX: &str = "utility-capex";

/// Hydraulic result: link flow rate. Entity: connection id.
pub const RESULT_LINK_FLOW: &str = "result-link_flow";

/// Hydraulic result: node pressure. Entity: municipality id.
pub const RESULT_NODE_PRESSURE: &str = "result-node_pressure";

/// Hydraulic result: unmet demand at a node. Entity: municipality id.
pub const RESULT_NODE_DEFICIT: &str = "result-node_deficit";

use crate::store::{PropertyStore, TableKind};

/// Register every table the engine knows about on a fresh store.
///
/// Hosts may register additional tables; the engine only touches these.
pub fn register_standard_tables(store: &mut PropertyStore) {
    use TableKind::{Endogenous, Exogenous};

    store
        .register_table(CLIMATE_AVG_MAX_TEMPERATURE, Exogenous)
        .register_table(ECONOMY_INFLATION, Exogenous)
        .register_table(ECONOMY_INFLATION_EXPECTATION, Exogenous)
        .register_table(ECONOMY_INVESTOR_DEMAND, Exogenous)
        .register_table(MUNICIPALITY_POPULATION, Exogenous)
        .register_table(MUNICIPALITY_DISPOSABLE_INCOME, Exogenous)
        .register_table(MUNICIPALITY_NETWORK_AGE, Endogenous)
        .register_table(MUNICIPALITY_NETWORK_LENGTH, Endogenous)
        .register_table(MUNICIPALITY_DEMAND, Endogenous)
        .register_table(DEMAND_PER_CAPITA_HOUSEHOLD, Exogenous)
        .register_table(DEMAND_PER_CAPITA_BUSINESS, Exogenous)
        .register_table(NRW_INTERVENTION_UNIT_COST, Endogenous)
        .register_table(SOURCE_UNIT_COST, Endogenous)
        .register_table(SOURCE_OPEX_FIXED, Endogenous)
        .register_table(SOURCE_OPEX_VOLUMETRIC, Endogenous)
        .register_table(PIPE_UNIT_COST, Endogenous)
        .register_table(PIPE_EMISSIONS_FACTOR, Exogenous)
        .register_table(PUMP_UNIT_COST, Endogenous)
        .register_table(PIPE_FRICTION_FACTOR, Endogenous)
        .register_table(SOLAR_PANEL_UNIT_COST, Exogenous)
        .register_table(ELECTRICITY_UNIT_COST, Exogenous)
        .register_table(UTILITY_BALANCE, Endogenous)
        .register_table(UTILITY_PRICE_FIXED, Endogenous)
        .register_table(UTILITY_PRICE_VARIABLE, Endogenous)
        .register_table(UTILITY_PRICE_SELLING, Endogenous)
        .register_table(UTILITY_CAPEX, Endogenous)
        .register_table(RESULT_LINK_FLOW, Endogenous)
        .register_table(RESULT_NODE_PRESSURE, Endogenous)
        .register_table(RESULT_NODE_DEFICIT, Endogenous);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tables_register_once() {
        let mut store = PropertyStore::new("full");
        register_standard_tables(&mut store);
        assert!(store.has_table(ECONOMY_INFLATION));
        assert!(store.has_table(UTILITY_BALANCE));
        assert!(store.has_table(RESULT_NODE_DEFICIT));
    }
}
