//! Solar farms.
//!
//! A solar farm is attached to a source or a pumping station and offsets
//! that entity's electricity demand while active. Farms are simple dated
//! installations; they are not replaceable assets (no stochastic failure).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A solar farm attached to a source or station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarFarm {
    /// Unique id (e.g. "SF003")
    pub id: String,

    /// Installed capacity (kW)
    pub capacity: f64,

    pub installation_date: NaiveDate,

    /// `None` while open-ended
    pub decommission_date: Option<NaiveDate>,

    /// Source or pumping-station id this farm powers
    pub connected_entity_id: String,
}

impl SolarFarm {
    /// Whether the farm produces at `when`.
    pub fn is_active(&self, when: NaiveDate) -> bool {
        self.installation_date <= when && self.decommission_date.map_or(true, |d| d > when)
    }
}
