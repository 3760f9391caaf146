//! Hydraulic solver interface.
//!
//! The solver is an external collaborator: the driver hands it a merged
//! network description (topology plus this year's realized demand) for one
//! independent sub-network and records whatever comes back. The solver is
//! treated as opaque and total: no partial results, no retries.
//!
//! Independent sub-networks share no mutable property-store state during
//! the call, so an implementation is free to solve them in parallel; the
//! driver writes results back in sorted sub-network-id order regardless,
//! keeping the output byte-stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::time::year_start;
use crate::events::{EventLog, SimulationEvent};
use crate::store::{tables, PropertyStore, StoreError};

/// One link (connection with an active pipe) of a sub-network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub connection_id: String,
    /// Length (km)
    pub distance: f64,
    /// Inner diameter of the active pipe (m)
    pub diameter: f64,
    /// Darcy friction factor of the active pipe this year
    pub friction_factor: f64,
    pub minor_loss_coeff: f64,
}

/// One node (active municipality) of a sub-network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub municipality_id: String,
    /// Realized demand this year (m3)
    pub demand: f64,
}

/// A merged network description for one independent sub-network and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubNetworkSpec {
    /// Sub-network id ("NET-00", "NET-01", …)
    pub id: String,
    pub year: i32,
    /// Utilities whose infrastructure this sub-network merges, sorted
    pub utility_ids: Vec<String>,
    pub links: Vec<LinkSpec>,
    pub nodes: Vec<NodeSpec>,
}

/// Per-asset results for one sub-network and year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    /// Flow per connection
    pub link_flows: BTreeMap<String, f64>,
    /// Pressure per municipality node
    pub node_pressures: BTreeMap<String, f64>,
    /// Unmet demand per municipality node
    pub node_deficits: BTreeMap<String, f64>,
}

/// The external hydraulic solver.
pub trait HydraulicSolver {
    /// Solve one independent sub-network for one year.
    fn solve(&mut self, spec: &SubNetworkSpec) -> SolverOutcome;
}

/// A trivially total solver for tests and dry runs: every node is served
/// at nominal pressure with zero deficit, every link carries zero flow.
///
/// Available in all builds so that integration tests can drive the full
/// yearly loop without a real solver.
#[derive(Debug, Clone, Default)]
pub struct IdleSolver;

/// Nominal pressure reported by [`IdleSolver`].
pub const IDLE_SOLVER_PRESSURE: f64 = 30.0;

impl HydraulicSolver for IdleSolver {
    fn solve(&mut self, spec: &SubNetworkSpec) -> SolverOutcome {
        SolverOutcome {
            link_flows: spec
                .links
                .iter()
                .map(|l| (l.connection_id.clone(), 0.0))
                .collect(),
            node_pressures: spec
                .nodes
                .iter()
                .map(|n| (n.municipality_id.clone(), IDLE_SOLVER_PRESSURE))
                .collect(),
            node_deficits: spec
                .nodes
                .iter()
                .map(|n| (n.municipality_id.clone(), 0.0))
                .collect(),
        }
    }
}

/// Record one sub-network's results into the result tables and the event
/// log. Callers must invoke this in sorted sub-network-id order.
pub fn record_outcome(
    store: &mut PropertyStore,
    events: &mut EventLog,
    spec: &SubNetworkSpec,
    outcome: &SolverOutcome,
) -> Result<(), StoreError> {
    let ts = year_start(spec.year);

    // One columnar write per result table: all of a sub-network's values
    // land at the same timestamp.
    let columnar = |results: &BTreeMap<String, f64>| -> (Vec<String>, Vec<f64>) {
        (
            results.keys().cloned().collect(),
            results.values().copied().collect(),
        )
    };

    let (entities, values) = columnar(&outcome.link_flows);
    store.set_range(tables::RESULT_LINK_FLOW, ts, &entities, &values)?;
    let (entities, values) = columnar(&outcome.node_pressures);
    store.set_range(tables::RESULT_NODE_PRESSURE, ts, &entities, &values)?;
    let (entities, values) = columnar(&outcome.node_deficits);
    store.set_range(tables::RESULT_NODE_DEFICIT, ts, &entities, &values)?;

    events.record(SimulationEvent::SolverRun {
        year: spec.year,
        subnetwork_id: spec.id.clone(),
        n_links: spec.links.len(),
        n_nodes: spec.nodes.len(),
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tables::register_standard_tables;

    #[test]
    fn test_idle_solver_serves_all_nodes() {
        let spec = SubNetworkSpec {
            id: "NET-00".to_string(),
            year: 2026,
            utility_ids: vec!["WU01".to_string()],
            links: vec![LinkSpec {
                connection_id: "CS001".to_string(),
                distance: 10.0,
                diameter: 0.3,
                friction_factor: 0.02,
                minor_loss_coeff: 0.1,
            }],
            nodes: vec![NodeSpec {
                municipality_id: "GM0001".to_string(),
                demand: 1_000.0,
            }],
        };

        let outcome = IdleSolver.solve(&spec);
        assert_eq!(outcome.node_deficits["GM0001"], 0.0);
        assert_eq!(outcome.node_pressures["GM0001"], IDLE_SOLVER_PRESSURE);

        let mut store = PropertyStore::new("test");
        register_standard_tables(&mut store);
        let mut events = EventLog::new();
        record_outcome(&mut store, &mut events, &spec, &outcome).unwrap();

        assert_eq!(
            store
                .get(tables::RESULT_NODE_PRESSURE, year_start(2026), "GM0001")
                .unwrap(),
            IDLE_SOLVER_PRESSURE
        );
        assert_eq!(events.len(), 1);
    }
}
