//! Core building blocks: simulation horizon and run settings.

pub mod settings;
pub mod time;

pub use settings::{
    BondsSettings, NrwModelSettings, SimulationSettings, SourcesSettings, HISTORICAL_PERIOD_END,
};
pub use time::{year_end, year_start, Timeline};
