//! Pumping stations.
//!
//! A station lifts water out of one assigned source. Its pumps are managed
//! as a single bank: the station's [`AssetSeries`] holds one active
//! pump-bank asset at a time, and `pump_count` records how many identical
//! pumps the bank contains. Install and replacement costs scale with that
//! count (the station's cost quantity, the way a connection's is its
//! distance).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assets::{Asset, AssetSeries, DecommissionRegistry};

/// A pumping station bound to one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpingStation {
    /// Unique id (e.g. "PS001")
    pub id: String,

    /// Source this station pumps from
    pub source_id: String,

    /// Pump banks installed over time
    pub pumps: AssetSeries,

    /// Number of identical pumps in the currently installed bank
    pub pump_count: u32,
}

impl PumpingStation {
    /// Create a station with an empty pump series.
    pub fn new(id: impl Into<String>, source_id: impl Into<String>) -> Self {
        let id = id.into();
        let pumps = AssetSeries::new(id.clone());
        Self {
            id,
            source_id: source_id.into(),
            pumps,
            pump_count: 0,
        }
    }

    /// The pump bank active at `when`, if any.
    pub fn active_pump_bank(
        &self,
        registry: &DecommissionRegistry,
        when: NaiveDate,
    ) -> Option<&Asset> {
        self.pumps.active_asset(registry, when)
    }

    /// Whether a pump bank is active at `when`.
    pub fn has_active_pumps(&self, registry: &DecommissionRegistry, when: NaiveDate) -> bool {
        self.active_pump_bank(registry, when).is_some()
    }
}
