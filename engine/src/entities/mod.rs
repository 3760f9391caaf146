//! Domain entities.
//!
//! Entities are constructed once during system configuration and then
//! mutated in place only through designated setters during the yearly
//! driver. No entity is ever deleted: deactivation is expressed purely
//! through time-bounded activity predicates, which preserves full history
//! for year-bound snapshots.
//!
//! Every dynamic (time-varying) attribute is backed by the property store;
//! entity methods that read or write such attributes take the store as an
//! explicit argument.

pub mod connections;
pub mod economy;
pub mod energy;
pub mod jurisdictions;
pub mod sources;
pub mod stations;
pub mod utilities;

use chrono::NaiveDate;
use thiserror::Error;

pub use connections::{Connection, ConnectionKind};
pub use economy::{bond_price, raise_amount, BondIssuance};
pub use energy::SolarFarm;
pub use jurisdictions::{Municipality, MunicipalitySize, NrwClass, Province, State};
pub use sources::{SourceKind, WaterSource};
pub use stations::PumpingStation;
pub use utilities::{SupplyLine, WaterUtility};

/// Errors from entity state transitions.
#[derive(Debug, Error, PartialEq)]
pub enum EntityError {
    #[error("Source {source_id} is already active at {when}")]
    SourceAlreadyOpen { source_id: String, when: NaiveDate },

    #[error("Source {source_id} has never been activated and cannot be closed")]
    SourceNeverActivated { source_id: String },

    #[error("Closure date {when} must be after activation date {activated} for source {source_id}")]
    CloseBeforeOpen {
        source_id: String,
        when: NaiveDate,
        activated: NaiveDate,
    },

    #[error("Source {source_id} is already closed")]
    SourceAlreadyClosed { source_id: String },
}
