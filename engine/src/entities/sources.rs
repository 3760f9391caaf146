//! Water sources: groundwater wells, surface-water intakes, desalination
//! plants.
//!
//! Sources carry their activity window directly (activation and closure
//! dates) rather than through the asset lifecycle: a source is a site, not
//! a replaceable unit. Opening and closing are the only mutations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::EntityError;

/// Kind of a water source. The kind is also the entity id of the source
/// cost series (construction and opex costs vary by kind, not by site).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    Groundwater,
    SurfaceWater,
    Desalination,
}

impl SourceKind {
    /// Canonical lowercase label, used as the cost-table entity id.
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Groundwater => "groundwater",
            SourceKind::SurfaceWater => "surface_water",
            SourceKind::Desalination => "desalination",
        }
    }
}

/// A water source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterSource {
    /// Unique id (e.g. "SG014")
    pub id: String,

    /// Source kind
    pub kind: SourceKind,

    /// Province the source sits in
    pub province_id: String,

    /// Display name
    pub display_name: String,

    /// Closest municipality (hydraulic attachment point)
    pub closest_municipality_id: String,

    /// Nominal production capacity (m3/day)
    pub nominal_capacity: f64,

    /// First day the source produces; `None` for a planned, not yet opened
    /// source
    pub activation_date: Option<NaiveDate>,

    /// Day the source stops producing; `None` while open-ended
    pub closure_date: Option<NaiveDate>,

    /// Volumetric energy factor (kWh/m3): pumping, treatment
    pub opex_energy_factor: f64,
}

impl WaterSource {
    /// Whether the source produces at `when`.
    pub fn is_active(&self, when: NaiveDate) -> bool {
        match self.activation_date {
            None => false,
            Some(activated) => {
                when >= activated && self.closure_date.map_or(true, |c| when < c)
            }
        }
    }

    /// Activate the source at `when` with the given construction capacity.
    ///
    /// Fails when the source is already active at `when`.
    pub fn open(&mut self, when: NaiveDate, capacity: f64) -> Result<(), EntityError> {
        if self.is_active(when) {
            return Err(EntityError::SourceAlreadyOpen {
                source_id: self.id.clone(),
                when,
            });
        }

        self.activation_date = Some(when);
        self.closure_date = None;
        self.nominal_capacity = capacity;
        Ok(())
    }

    /// Close the source effective at `when`.
    ///
    /// Fails when the source was never activated, is already closed, or
    /// `when` does not lie strictly after the activation date.
    pub fn close(&mut self, when: NaiveDate) -> Result<(), EntityError> {
        let activated = self
            .activation_date
            .ok_or_else(|| EntityError::SourceNeverActivated {
                source_id: self.id.clone(),
            })?;

        if self.closure_date.is_some() {
            return Err(EntityError::SourceAlreadyClosed {
                source_id: self.id.clone(),
            });
        }
        if when <= activated {
            return Err(EntityError::CloseBeforeOpen {
                source_id: self.id.clone(),
                when,
                activated,
            });
        }

        self.closure_date = Some(when);
        Ok(())
    }
}
