//! Waterplan Simulator Core - Rust Engine
//!
//! Discrete-annual-time simulation engine for evaluating long-horizon
//! water-infrastructure masterplans over a network of interdependent
//! entities (sources, pumping stations, connections, municipalities,
//! utilities), with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: horizon and run settings
//! - **rng**: deterministic named random streams
//! - **store**: time-indexed property store (the single shared mutable
//!   resource)
//! - **assets**: replaceable-asset lifecycle (install / age / fail /
//!   decommission / replace)
//! - **catalog**: pipe and pump option templates
//! - **entities**: the domain graph (jurisdictions, sources, stations,
//!   connections, utilities, bonds, solar)
//! - **context**: ownership root and reference validation
//! - **view**: year-bound entity snapshots
//! - **masterplan**: sticky policies and one-shot interventions
//! - **allocation**: budget distribution strategies
//! - **demand**: yearly demand realization
//! - **driver**: the yearly orchestration loop
//! - **metrics**: end-of-run performance metrics
//! - **events**: the audit/replay event log
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded, named streams)
//! 2. Year t state is fully materialized before year t+1 is touched; the
//!    inflation-escalation step is the single allowed lookahead
//! 3. At most one asset is active per container at any instant
//! 4. Failures abort the run; a trace is only meaningful complete

// Module declarations
pub mod allocation;
pub mod assets;
pub mod catalog;
pub mod context;
pub mod core;
pub mod demand;
pub mod driver;
pub mod entities;
pub mod events;
pub mod masterplan;
pub mod metrics;
pub mod rng;
pub mod store;
pub mod view;

// Re-exports for convenience
pub use allocation::{
    custom_shares, greedy_by_priority, proportional_by_weight, AllocationError, PriorityRecipient,
};
pub use assets::{Asset, AssetSeries, DecommissionRegistry, LifecycleError, Lifespan, Replacement};
pub use catalog::{OptionCatalog, PipeOption, PumpOption};
pub use context::{NationalContext, UnknownReference};
pub use crate::core::settings::{
    BondsSettings, NrwModelSettings, SimulationSettings, SourcesSettings,
};
pub use crate::core::time::Timeline;
pub use driver::{
    HydraulicSolver, IdleSolver, RunResult, Simulation, SimulationError, SolverOutcome,
    SubNetworkSpec, YearResult,
};
pub use entities::{
    bond_price, BondIssuance, Connection, ConnectionKind, EntityError, Municipality,
    MunicipalitySize, NrwClass, Province, PumpingStation, SolarFarm, SourceKind, State,
    SupplyLine, WaterSource, WaterUtility,
};
pub use events::{EventLog, SimulationEvent};
pub use masterplan::{Masterplan, MasterplanError, Scope, YearEntry};
pub use metrics::{Metrics, UtilityYearMetrics};
pub use rng::{LifetimeSampler, RandomStreamManager, Xorshift64Star};
pub use store::{PropertyStore, PropertyTable, StoreError, TableKind};
pub use view::{MunicipalityView, UtilityView};
