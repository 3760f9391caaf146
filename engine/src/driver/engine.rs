//! Yearly simulation driver.
//!
//! Orchestrates one full run. For each simulated year, in this exact
//! order:
//!
//! 1. Resolve and apply national policies (budget allocation).
//! 2. Resolve and apply national interventions (cross-utility pipe
//!    installs), plus the failure-inspection pass over unassigned
//!    connections; accumulate national capex.
//! 3. Compute the year's representative temperature signal once.
//! 4. For each utility in sorted-id order: policies (NRW mitigation,
//!    pricing, bond ratio, in that order), then interventions (open
//!    source, close source, install pipe, install pumps, install solar,
//!    in that order), then the failure-inspection pass over the utility's
//!    containers, then demand realization for its active municipalities.
//! 5. Invoke the hydraulic solver once per independent sub-network and
//!    record results in sorted sub-network-id order.
//! 6. Unless this is the terminal year, escalate cost tables and age
//!    physical properties into the next year.
//! 7. Update each utility's financial balance.
//!
//! Any failure aborts the run immediately; there is no partial-year
//! checkpointing, because the output is only meaningful as a complete,
//! internally consistent year-by-year trace.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::allocation::AllocationError;
use crate::assets::{DecommissionRegistry, LifecycleError};
use crate::context::{NationalContext, UnknownReference};
use crate::core::settings::SimulationSettings;
use crate::core::time::year_start;
use crate::demand::realize_municipal_demand;
use crate::entities::{ConnectionKind, EntityError};
use crate::events::{EventLog, SimulationEvent};
use crate::masterplan::{Masterplan, MasterplanError, Scope};
use crate::metrics::{compute_metrics, Metrics};
use crate::rng::{RandomStreamManager, StreamError};
use crate::store::{tables, PropertyStore, StoreError};

use super::actions;
use super::aging::age_system;
use super::escalation::escalate_costs;
use super::solver::{
    record_outcome, HydraulicSolver, LinkSpec, NodeSpec, SubNetworkSpec,
};

/// Errors that can occur during simulation.
///
/// All of them are fatal: the driver propagates the first failure and
/// aborts the run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Masterplan(#[from] MasterplanError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    UnknownReference(#[from] UnknownReference),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Summary of one simulated year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearResult {
    pub year: i32,

    /// Capital cost of national-scope interventions and replacements
    pub national_capex: f64,

    /// Total capital cost booked per utility (including its national
    /// share)
    pub capex_by_utility: BTreeMap<String, f64>,

    /// The year's representative temperature signal
    pub max_temperature: f64,

    /// Events recorded up to and including this year
    pub events_logged: usize,
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub years: Vec<YearResult>,
    pub metrics: Metrics,
}

/// The yearly simulation driver.
///
/// Single-threaded and strictly sequential: years in order, utilities in
/// sorted-id order within a year. This ordering is load-bearing: asset
/// numbering, the decommission registry and balance bookkeeping all
/// depend on it for run-to-run reproducibility.
pub struct Simulation {
    settings: SimulationSettings,
    national: NationalContext,
    masterplan: Masterplan,
    store: PropertyStore,
    streams: RandomStreamManager,
    registry: DecommissionRegistry,
    events: EventLog,
    solver: Box<dyn HydraulicSolver>,
}

impl Simulation {
    /// Assemble a simulation. The stream manager is spawned from the
    /// settings' master seed; the registry starts empty.
    pub fn new(
        settings: SimulationSettings,
        national: NationalContext,
        masterplan: Masterplan,
        store: PropertyStore,
        solver: Box<dyn HydraulicSolver>,
    ) -> Self {
        let streams = RandomStreamManager::new(settings.seed);
        Self {
            settings,
            national,
            masterplan,
            store,
            streams,
            registry: DecommissionRegistry::new(),
            events: EventLog::new(),
            solver,
        }
    }

    /// Run settings.
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// The property store.
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Mutable access to the property store (host-side seeding and write
    /// audits; the simulation itself writes only through its own steps).
    pub fn store_mut(&mut self) -> &mut PropertyStore {
        &mut self.store
    }

    /// The entity graph.
    pub fn national(&self) -> &NationalContext {
        &self.national
    }

    /// The event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The decommission-override registry.
    pub fn registry(&self) -> &DecommissionRegistry {
        &self.registry
    }

    /// Run every year of the horizon and compute end-of-run metrics.
    pub fn run(&mut self) -> Result<RunResult, SimulationError> {
        let mut years = Vec::with_capacity(self.settings.timeline().n_years());
        for year in self.settings.timeline().years() {
            years.push(self.step_year(year)?);
        }

        let metrics = compute_metrics(&self.settings, &self.national, &self.store)?;
        Ok(RunResult { years, metrics })
    }

    /// Simulate one year. Callers stepping manually must follow the
    /// horizon order; `run` does.
    pub fn step_year(&mut self, year: i32) -> Result<YearResult, SimulationError> {
        // (1) National policies: budget allocation.
        let national_policies = self.masterplan.national_policies(year);
        let shares = actions::share_national_budget(
            &self.national,
            &self.store,
            &self.settings,
            national_policies.budget_allocation.as_ref(),
            year,
        )?;
        if national_policies.budget_allocation.is_some() {
            self.events.record(SimulationEvent::PolicyApplied {
                year,
                scope: Scope::National,
                policy: "budget_allocation".to_string(),
            });
        }

        // (2) National interventions plus the failure-inspection pass
        // over cross-utility connections.
        let national_interventions = self.masterplan.national_interventions(year);
        let mut national_capex = 0.0;
        for item in &national_interventions.install_pipe {
            national_capex += actions::install_pipe_on_connection(
                &mut self.national,
                &mut self.store,
                &mut self.registry,
                &mut self.streams,
                &self.settings,
                &mut self.events,
                &item.connection_id,
                &item.pipe_option_id,
                year,
            )?;
        }
        for connection_id in self.national.unassigned_connection_ids() {
            national_capex += actions::inspect_and_replace_pipe(
                &mut self.national,
                &mut self.store,
                &mut self.registry,
                &mut self.streams,
                &self.settings,
                &mut self.events,
                &connection_id,
                year,
            )?;
        }

        // (3) The year's temperature signal, shared by all utilities.
        let max_temperature = self.national.max_yearly_temperature(&self.store, year)?;

        // (4) Per-utility policies, interventions, inspection, demand.
        let mut capex_by_utility: BTreeMap<String, f64> = BTreeMap::new();
        let mut bond_ratios: BTreeMap<String, f64> = BTreeMap::new();

        for utility_id in self.national.utility_ids() {
            let policies = self.masterplan.utility_policies(&utility_id, year);

            if let Some(nrw) = &policies.nrw_mitigation {
                actions::apply_nrw_mitigation(
                    &self.national,
                    &mut self.store,
                    &mut self.streams,
                    &mut self.events,
                    &utility_id,
                    nrw,
                    year,
                )?;
            }
            if let Some(pricing) = &policies.pricing_adjustment {
                actions::apply_pricing_adjustment(
                    &self.national,
                    &mut self.store,
                    &mut self.events,
                    &utility_id,
                    pricing,
                    year,
                )?;
            }
            if let Some(bond) = &policies.bond_ratio {
                bond_ratios.insert(utility_id.clone(), bond.value);
                self.events.record(SimulationEvent::PolicyApplied {
                    year,
                    scope: Scope::Utility(utility_id.clone()),
                    policy: "bond_ratio".to_string(),
                });
            }

            let interventions = self.masterplan.utility_interventions(&utility_id, year);
            let mut capex = 0.0;
            for item in &interventions.open_source {
                capex += actions::open_source(
                    &mut self.national,
                    &mut self.store,
                    &mut self.registry,
                    &mut self.streams,
                    &self.settings,
                    &mut self.events,
                    item,
                    year,
                )?;
            }
            for item in &interventions.close_source {
                actions::close_source(&mut self.national, &mut self.events, item, year)?;
            }
            for item in &interventions.install_pipe {
                capex += actions::install_pipe_on_connection(
                    &mut self.national,
                    &mut self.store,
                    &mut self.registry,
                    &mut self.streams,
                    &self.settings,
                    &mut self.events,
                    &item.connection_id,
                    &item.pipe_option_id,
                    year,
                )?;
            }
            for item in &interventions.install_pumps {
                capex += actions::install_pump_bank(
                    &mut self.national,
                    &mut self.store,
                    &mut self.registry,
                    &mut self.streams,
                    &self.settings,
                    &mut self.events,
                    item,
                    year,
                )?;
            }
            for item in &interventions.install_solar {
                capex += actions::install_solar_farm(
                    &mut self.national,
                    &self.store,
                    &mut self.events,
                    &utility_id,
                    item,
                    year,
                )?;
            }

            // Failure inspection over the utility's containers.
            for connection_id in self.national.utility(&utility_id)?.connection_ids() {
                capex += actions::inspect_and_replace_pipe(
                    &mut self.national,
                    &mut self.store,
                    &mut self.registry,
                    &mut self.streams,
                    &self.settings,
                    &mut self.events,
                    &connection_id,
                    year,
                )?;
            }
            for station_id in self.national.utility(&utility_id)?.station_ids() {
                capex += actions::inspect_and_replace_pumps(
                    &mut self.national,
                    &mut self.store,
                    &mut self.registry,
                    &mut self.streams,
                    &self.settings,
                    &mut self.events,
                    &station_id,
                    year,
                )?;
            }

            // National capex share, net of the utility's national budget
            // grant.
            let fraction = shares.fractions.get(&utility_id).copied().unwrap_or(0.0);
            let grant = shares.amounts.get(&utility_id).copied().unwrap_or(0.0);
            let national_share = fraction * national_capex;
            capex += (national_share - grant).max(0.0);

            // Demand realization for the active municipalities.
            let ts = year_start(year);
            let state_id = self.national.state.id.clone();
            let utility = self.national.utility(&utility_id)?;
            let municipalities = utility.active_municipalities(&self.national.state, ts);
            let modulation_rng = self.streams.get_mut("demand-modulation")?;
            for municipality in municipalities {
                realize_municipal_demand(
                    municipality,
                    year,
                    max_temperature,
                    &mut self.store,
                    &state_id,
                    modulation_rng,
                )?;
            }

            capex_by_utility.insert(utility_id, capex);
        }

        // (5) Hydraulic simulation per independent sub-network, results
        // written back in sorted sub-network-id order.
        let specs = build_subnetworks(&self.national, &self.store, &self.registry, year)?;
        for spec in &specs {
            let outcome = self.solver.solve(spec);
            record_outcome(&mut self.store, &mut self.events, spec, &outcome)?;
        }

        // (6) Escalation and aging, skipped on the terminal year, which
        // must not read into the unsimulated following year.
        if !self.settings.timeline().is_terminal(year) {
            escalate_costs(&self.national, &mut self.store, &mut self.events, year)?;
            age_system(
                &self.national,
                &mut self.store,
                &self.registry,
                &mut self.streams,
                &self.settings,
                &mut self.events,
                year,
            )?;
        }

        // (7) Financial balances.
        for utility_id in self.national.utility_ids() {
            let capex = capex_by_utility.get(&utility_id).copied().unwrap_or(0.0);
            actions::update_financial_balance(
                &mut self.national,
                &mut self.store,
                &mut self.events,
                &utility_id,
                bond_ratios.get(&utility_id).copied(),
                capex,
                year,
            )?;
        }

        Ok(YearResult {
            year,
            national_capex,
            capex_by_utility,
            max_temperature,
            events_logged: self.events.len(),
        })
    }
}

/// Group utilities into independent sub-networks and build the merged
/// network description for each.
///
/// Two utilities belong to the same sub-network when an active
/// cross-utility connection joins their territories. Sub-network ids are
/// assigned in order of each group's smallest utility id, so grouping is
/// deterministic.
pub fn build_subnetworks(
    national: &NationalContext,
    store: &PropertyStore,
    registry: &DecommissionRegistry,
    year: i32,
) -> Result<Vec<SubNetworkSpec>, SimulationError> {
    let ts = year_start(year);

    // Province → utility map for endpoint resolution.
    let mut province_owner: BTreeMap<String, String> = BTreeMap::new();
    for utility in national.utilities.values() {
        for province_id in &utility.province_ids {
            province_owner.insert(province_id.clone(), utility.id.clone());
        }
    }
    let utility_of_municipality = |municipality_id: &str| -> Option<String> {
        let municipality = national.state.municipality(municipality_id)?;
        province_owner.get(&municipality.province_id).cloned()
    };
    let utility_of_source = |source_id: &str| -> Option<String> {
        let source = national.sources.get(source_id)?;
        province_owner.get(&source.province_id).cloned()
    };

    // Union-find over utility ids, union-by-min for deterministic roots.
    let mut parent: BTreeMap<String, String> = national
        .utilities
        .keys()
        .map(|id| (id.clone(), id.clone()))
        .collect();

    fn find(parent: &mut BTreeMap<String, String>, id: &str) -> String {
        let p = parent[id].clone();
        if p == id {
            return p;
        }
        let root = find(parent, &p);
        parent.insert(id.to_string(), root.clone());
        root
    }
    fn union(parent: &mut BTreeMap<String, String>, a: &str, b: &str) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent.insert(high, low);
        }
    }

    // Active cross-utility connections knot groups together.
    let unassigned = national.unassigned_connection_ids();
    for connection_id in &unassigned {
        let connection = national.connection(connection_id)?;
        if !national.connection_is_active(connection, ts) {
            continue;
        }

        let from_owner = match &connection.kind {
            ConnectionKind::Supply { source_id } => utility_of_source(source_id),
            ConnectionKind::Peer {
                from_municipality_id,
            } => utility_of_municipality(from_municipality_id),
        };
        let to_owner = utility_of_municipality(&connection.to_municipality_id);

        if let (Some(a), Some(b)) = (from_owner, to_owner) {
            union(&mut parent, &a, &b);
        }
    }

    // Collect groups keyed by root (the smallest member id).
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for utility_id in national.utility_ids() {
        let root = find(&mut parent, &utility_id);
        groups.entry(root).or_default().push(utility_id);
    }

    let mut specs = Vec::with_capacity(groups.len());
    for (index, (_, utility_ids)) in groups.into_iter().enumerate() {
        // Links: the member utilities' connections plus the unassigned
        // connections that knot this group together.
        let mut connection_ids: BTreeSet<String> = BTreeSet::new();
        for utility_id in &utility_ids {
            connection_ids.extend(national.utility(utility_id)?.connection_ids());
        }
        for connection_id in &unassigned {
            let connection = national.connection(connection_id)?;
            let in_group = match &connection.kind {
                ConnectionKind::Supply { source_id } => {
                    utility_of_source(source_id).map_or(false, |u| utility_ids.contains(&u))
                }
                ConnectionKind::Peer {
                    from_municipality_id,
                } => utility_of_municipality(from_municipality_id)
                    .map_or(false, |u| utility_ids.contains(&u)),
            };
            if in_group {
                connection_ids.insert(connection_id.clone());
            }
        }

        let mut links = Vec::new();
        for connection_id in &connection_ids {
            let connection = national.connection(connection_id)?;
            if !national.connection_is_active(connection, ts) {
                continue;
            }
            let pipe = match connection.active_pipe(registry, ts) {
                Some(pipe) => pipe,
                None => continue,
            };
            let option = national
                .catalog
                .pipe_option(pipe.option_id())
                .ok_or_else(|| UnknownReference::new("pipe option", pipe.option_id()))?;
            let friction_factor = store
                .get_latest_at_or_before(tables::PIPE_FRICTION_FACTOR, ts, pipe.id())
                .unwrap_or(option.dff_new);

            links.push(LinkSpec {
                connection_id: connection_id.clone(),
                distance: connection.distance,
                diameter: option.diameter,
                friction_factor,
                minor_loss_coeff: connection.minor_loss_coeff,
            });
        }

        // Nodes: the groups' active municipalities with this year's
        // realized demand.
        let mut municipality_ids: BTreeSet<String> = BTreeSet::new();
        for utility_id in &utility_ids {
            let utility = national.utility(utility_id)?;
            for municipality in utility.active_municipalities(&national.state, ts) {
                municipality_ids.insert(municipality.id.clone());
            }
        }
        let mut nodes = Vec::new();
        for municipality_id in municipality_ids {
            let demand = store.get(tables::MUNICIPALITY_DEMAND, ts, &municipality_id)?;
            nodes.push(NodeSpec {
                municipality_id,
                demand,
            });
        }

        specs.push(SubNetworkSpec {
            id: format!("NET-{:02}", index),
            year,
            utility_ids,
            links,
            nodes,
        });
    }

    Ok(specs)
}
