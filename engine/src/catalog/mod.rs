//! Catalog of installable asset options.
//!
//! Options are the immutable templates assets are built from: a pipe option
//! fixes diameter, material, friction behavior and lifetime bounds; a pump
//! option fixes its hydraulic design point and lifetime bounds. Unit-cost
//! series live in the property store (they escalate with inflation), keyed
//! by option id.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{tables, PropertyStore, StoreError};

/// A pipe option: the catalog template for installable pipes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeOption {
    /// Option id (e.g. "PI01")
    pub id: String,

    /// Inner diameter (m)
    pub diameter: f64,

    /// Material label
    pub material: String,

    /// Darcy friction factor of a freshly installed pipe
    pub dff_new: f64,

    /// Yearly friction-factor decay bounds (uniformly sampled per pipe per
    /// year)
    pub dff_decay_rate: (f64, f64),

    /// Lifetime bounds in years: lower inclusive, upper exclusive
    pub lifetime: (u32, u32),
}

impl PipeOption {
    /// Unit cost (per km) in force at `when`, carried forward from the most
    /// recent escalation.
    pub fn unit_cost(&self, store: &PropertyStore, when: NaiveDate) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::PIPE_UNIT_COST, when, &self.id)
    }
}

/// A pump option: the catalog template for installable pump banks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpOption {
    /// Option id (e.g. "PU01")
    pub id: String,

    /// Display name
    pub name: String,

    /// Nominal/design flow rate (m3/h)
    pub nominal_flow_rate: f64,

    /// Lifetime bounds in years: lower inclusive, upper exclusive
    pub lifetime: (u32, u32),
}

impl PumpOption {
    /// Unit cost (per pump) in force at `when`.
    pub fn unit_cost(&self, store: &PropertyStore, when: NaiveDate) -> Result<f64, StoreError> {
        store.get_latest_at_or_before(tables::PUMP_UNIT_COST, when, &self.id)
    }
}

/// All options known to a run, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionCatalog {
    pipe_options: BTreeMap<String, PipeOption>,
    pump_options: BTreeMap<String, PumpOption>,
}

impl OptionCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pipe option.
    ///
    /// # Panics
    /// Panics on a duplicate id (catalog ids are unique by construction).
    pub fn add_pipe_option(&mut self, option: PipeOption) -> &mut Self {
        let prior = self.pipe_options.insert(option.id.clone(), option);
        assert!(prior.is_none(), "Duplicate pipe option id");
        self
    }

    /// Add a pump option.
    ///
    /// # Panics
    /// Panics on a duplicate id.
    pub fn add_pump_option(&mut self, option: PumpOption) -> &mut Self {
        let prior = self.pump_options.insert(option.id.clone(), option);
        assert!(prior.is_none(), "Duplicate pump option id");
        self
    }

    /// Look up a pipe option.
    pub fn pipe_option(&self, id: &str) -> Option<&PipeOption> {
        self.pipe_options.get(id)
    }

    /// Look up a pump option.
    pub fn pump_option(&self, id: &str) -> Option<&PumpOption> {
        self.pump_options.get(id)
    }

    /// All pipe option ids, sorted.
    pub fn pipe_option_ids(&self) -> impl Iterator<Item = &str> {
        self.pipe_options.keys().map(|s| s.as_str())
    }

    /// All pump option ids, sorted.
    pub fn pump_option_ids(&self) -> impl Iterator<Item = &str> {
        self.pump_options.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::year_start;
    use crate::store::tables::register_standard_tables;

    fn pipe_option() -> PipeOption {
        PipeOption {
            id: "PI01".to_string(),
            diameter: 0.3,
            material: "PVC".to_string(),
            dff_new: 0.015,
            dff_decay_rate: (0.0005, 0.002),
            lifetime: (40, 60),
        }
    }

    #[test]
    fn test_unit_cost_carries_forward() {
        let mut store = PropertyStore::new("test");
        register_standard_tables(&mut store);
        store
            .set(tables::PIPE_UNIT_COST, year_start(2000), "PI01", 1_000.0)
            .unwrap();

        let option = pipe_option();
        assert_eq!(option.unit_cost(&store, year_start(2004)).unwrap(), 1_000.0);
        assert!(option.unit_cost(&store, year_start(1999)).is_err());
    }

    #[test]
    #[should_panic(expected = "Duplicate pipe option id")]
    fn test_duplicate_option_panics() {
        let mut catalog = OptionCatalog::new();
        catalog.add_pipe_option(pipe_option());
        catalog.add_pipe_option(pipe_option());
    }
}
