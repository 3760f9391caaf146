//! Cost escalation.
//!
//! At the end of year t (except the terminal year), every endogenous cost
//! table is escalated into year t+1 using year t+1's inflation rate, the
//! single, explicitly allowed lookahead in the engine. Exogenous unit
//! costs (solar panels, electricity) never escalate; they are supplied by
//! the host over the full horizon.

use crate::context::NationalContext;
use crate::core::time::year_start;
use crate::events::{EventLog, SimulationEvent};
use crate::store::{tables, PropertyStore, StoreError};

/// The endogenous cost tables under inflation escalation.
pub const ESCALATED_TABLES: [&str; 6] = [
    tables::NRW_INTERVENTION_UNIT_COST,
    tables::SOURCE_UNIT_COST,
    tables::SOURCE_OPEX_FIXED,
    tables::SOURCE_OPEX_VOLUMETRIC,
    tables::PUMP_UNIT_COST,
    tables::PIPE_UNIT_COST,
];

/// Escalate all cost tables from year `t` into `t + 1`.
///
/// Every escalated table must carry a value at year `t` for every entity
/// it knows; a hole is a consistency violation (the chain of yearly
/// writes would silently restart from stale data otherwise). Returns the
/// applied inflation rate as a fraction.
pub fn escalate_costs(
    national: &NationalContext,
    store: &mut PropertyStore,
    events: &mut EventLog,
    year: i32,
) -> Result<f64, StoreError> {
    // The t+1 inflation value is assumed to already be there.
    let rate = national.inflation(store, year + 1)? / 100.0;

    let this_year = year_start(year);
    let next_year = year_start(year + 1);

    for table in ESCALATED_TABLES {
        store.assert_annual_continuity(table, year, year)?;

        for entity in store.entities(table)? {
            let base = store.get(table, this_year, &entity)?;
            store.set(table, next_year, &entity, (1.0 + rate) * base)?;
        }
    }

    events.record(SimulationEvent::CostsEscalated {
        year,
        inflation_rate: rate,
    });

    Ok(rate)
}
