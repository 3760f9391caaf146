//! Event logging for simulation replay and auditing.
//!
//! Every significant state change during a run is recorded as an event:
//! asset installs, failures and decommissions, policy applications, solver
//! runs, cost escalations. The log is part of the run result: a run's
//! trace is only meaningful as a complete, internally consistent sequence,
//! and two runs with the same seed and inputs must produce identical logs.

use serde::{Deserialize, Serialize};

use crate::masterplan::Scope;

/// Simulation event capturing a state change.
///
/// All events carry the simulated year; within a year, events appear in
/// the log in the order the driver performed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationEvent {
    /// A pipe was installed on a connection
    PipeInstalled {
        year: i32,
        connection_id: String,
        asset_id: String,
        option_id: String,
        cost: f64,
    },

    /// A pump bank was installed on a station
    PumpsInstalled {
        year: i32,
        station_id: String,
        asset_id: String,
        option_id: String,
        n_pumps: u32,
        cost: f64,
    },

    /// An asset reached the end of its sampled lifetime and was replaced
    /// in place
    AssetReplaced {
        year: i32,
        container_id: String,
        failed_asset_id: String,
        new_asset_id: String,
        replacement_cost: f64,
    },

    /// A source was opened
    SourceOpened {
        year: i32,
        source_id: String,
        capacity: f64,
        cost: f64,
    },

    /// A source was closed
    SourceClosed { year: i32, source_id: String },

    /// A solar farm was installed
    SolarInstalled {
        year: i32,
        farm_id: String,
        connected_entity_id: String,
        capacity: f64,
        cost: f64,
    },

    /// An NRW mitigation budget was spent on a utility's municipalities
    NrwBudgetSpent {
        year: i32,
        utility_id: String,
        budget: f64,
        spent: f64,
    },

    /// A utility's water prices were adjusted
    PricesAdjusted {
        year: i32,
        utility_id: String,
        fixed: f64,
        variable: f64,
        selling: f64,
    },

    /// A policy with no further effect this year was resolved and noted
    PolicyApplied {
        year: i32,
        scope: Scope,
        policy: String,
    },

    /// A bond issuance was raised to cover a capex shortfall
    BondIssued {
        year: i32,
        utility_id: String,
        issuance_id: String,
        raised: f64,
    },

    /// The hydraulic solver ran for one independent sub-network
    SolverRun {
        year: i32,
        subnetwork_id: String,
        n_links: usize,
        n_nodes: usize,
    },

    /// Endogenous cost tables were escalated into the next year
    CostsEscalated { year: i32, inflation_rate: f64 },

    /// Physical properties were aged into the next year
    NetworksAged { year: i32, pipes_aged: usize },

    /// A utility's financial balance was updated
    BalanceUpdated {
        year: i32,
        utility_id: String,
        balance: f64,
    },
}

impl SimulationEvent {
    /// The simulated year this event belongs to.
    pub fn year(&self) -> i32 {
        match self {
            SimulationEvent::PipeInstalled { year, .. }
            | SimulationEvent::PumpsInstalled { year, .. }
            | SimulationEvent::AssetReplaced { year, .. }
            | SimulationEvent::SourceOpened { year, .. }
            | SimulationEvent::SourceClosed { year, .. }
            | SimulationEvent::SolarInstalled { year, .. }
            | SimulationEvent::NrwBudgetSpent { year, .. }
            | SimulationEvent::PricesAdjusted { year, .. }
            | SimulationEvent::PolicyApplied { year, .. }
            | SimulationEvent::BondIssued { year, .. }
            | SimulationEvent::SolverRun { year, .. }
            | SimulationEvent::CostsEscalated { year, .. }
            | SimulationEvent::NetworksAged { year, .. }
            | SimulationEvent::BalanceUpdated { year, .. } => *year,
        }
    }
}

/// Append-only event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SimulationEvent>,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&mut self, event: SimulationEvent) {
        self.events.push(event);
    }

    /// All events, in recording order.
    pub fn events(&self) -> &[SimulationEvent] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events belonging to one simulated year, in recording order.
    pub fn events_for_year(&self, year: i32) -> impl Iterator<Item = &SimulationEvent> {
        self.events.iter().filter(move |e| e.year() == year)
    }
}
