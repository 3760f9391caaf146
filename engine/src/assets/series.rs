//! Ordered asset series: the container half of the lifecycle.
//!
//! A series owns the assets ever installed on one container (a connection's
//! pipes, a station's pump banks), in installation order. Ids are derived
//! deterministically from the container id and a monotonic counter that is
//! never reused, so a fixed seed reproduces identical ids across runs.
//!
//! At most one asset is active at any instant: installing a new asset
//! decommissions the previously active one that has no explicit
//! construction-time decommission date, effective exactly at the new
//! installation date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assets::asset::{Asset, DecommissionRegistry, LifecycleError};
use crate::core::time::year_start;
use crate::rng::LifetimeSampler;

/// How a newly installed asset's end of life is determined: an explicit
/// historical decommission date, or a lifetime sampled at install time.
#[derive(Debug)]
pub enum Lifespan<'a, 'b> {
    /// Historical information: the decommission date is already known
    Until(NaiveDate),
    /// Sample a lifetime from the option's bounds at install time
    Sampled(&'a mut LifetimeSampler<'b>),
}

/// Outcome of an inspect-and-replace pass that found a failing asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Asset that reached the end of its sampled lifetime
    pub failed_asset_id: String,
    /// Its in-place successor (same option)
    pub new_asset_id: String,
    /// Catalog option shared by both
    pub option_id: String,
    /// Failure date, which is also the successor's installation date
    pub installed_at: NaiveDate,
}

/// The assets installed on one container over time.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use waterplan_simulator_core_rs::assets::{AssetSeries, DecommissionRegistry, Lifespan};
/// use waterplan_simulator_core_rs::rng::{LifetimeSampler, Xorshift64Star};
///
/// let mut registry = DecommissionRegistry::new();
/// let mut series = AssetSeries::new("C1");
/// let mut rng = Xorshift64Star::new(128);
/// let mut sampler = LifetimeSampler::Stream(&mut rng);
///
/// let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
/// series
///     .install("PI01", (40, 60), date, Lifespan::Sampled(&mut sampler), &mut registry)
///     .unwrap();
///
/// let active = series.active_asset(&registry, date).unwrap();
/// assert_eq!(active.id(), "C1-00");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSeries {
    container_id: String,
    assets: Vec<Asset>,
}

impl AssetSeries {
    /// Empty series for a container.
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            assets: Vec::new(),
        }
    }

    /// Container id this series belongs to.
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// All assets ever installed, in installation order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Number of assets ever installed (also the next asset index).
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether nothing was ever installed.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// First asset active at `when`, if any.
    pub fn active_asset(&self, registry: &DecommissionRegistry, when: NaiveDate) -> Option<&Asset> {
        self.assets.iter().find(|a| a.is_active(registry, when))
    }

    /// Whether any asset is active at `when`.
    pub fn has_active_asset(&self, registry: &DecommissionRegistry, when: NaiveDate) -> bool {
        self.active_asset(registry, when).is_some()
    }

    /// Install a new asset.
    ///
    /// The asset id is `{container_id}-{count:02}` where `count` is the
    /// number of previously installed assets. If an active asset with no
    /// explicit construction-time decommission date exists at the
    /// installation instant, it is decommissioned effective exactly then
    /// (replacement semantics): an asset is never active concurrently with
    /// its successor.
    pub fn install(
        &mut self,
        option_id: &str,
        lifetime_bounds: (u32, u32),
        installation_date: NaiveDate,
        lifespan: Lifespan<'_, '_>,
        registry: &mut DecommissionRegistry,
    ) -> Result<&Asset, LifecycleError> {
        let asset_id = format!("{}-{:02}", self.container_id, self.assets.len());

        if let Some(active) = self.active_asset(registry, installation_date) {
            if active.construction_decommission_date().is_none() {
                active.decommission(registry, installation_date)?;
            }
        }

        let asset = match lifespan {
            Lifespan::Until(date) => Asset::with_decommission_date(
                asset_id,
                option_id.to_string(),
                installation_date,
                date,
            ),
            Lifespan::Sampled(sampler) => Asset::with_sampled_lifetime(
                asset_id,
                option_id.to_string(),
                installation_date,
                sampler.sample(lifetime_bounds),
            ),
        };

        self.assets.push(asset);
        Ok(self.assets.last().unwrap())
    }

    /// Inspect the active asset at `year`; if its sampled lifetime runs out
    /// this year, fail it and install a same-option replacement at the
    /// failure date with a freshly sampled lifetime.
    ///
    /// Returns `None` when there is no active asset or it is not failing.
    /// The caller prices the replacement (unit cost at the failure date
    /// times the container's cost quantity).
    pub fn replace_failing(
        &mut self,
        year: i32,
        lifetime_bounds: (u32, u32),
        sampler: &mut LifetimeSampler<'_>,
        registry: &mut DecommissionRegistry,
    ) -> Result<Option<Replacement>, LifecycleError> {
        let when = year_start(year);

        let (failed_id, option_id) = match self.active_asset(registry, when) {
            Some(active) if active.is_failing_in(year) => {
                (active.id().to_string(), active.option_id().to_string())
            }
            _ => return Ok(None),
        };

        let failed = self
            .assets
            .iter()
            .find(|a| a.id() == failed_id)
            .expect("failing asset found above");
        let failure_date = failed.fail(registry)?;

        let new_asset = self.install(
            &option_id,
            lifetime_bounds,
            failure_date,
            Lifespan::Sampled(sampler),
            registry,
        )?;

        Ok(Some(Replacement {
            failed_asset_id: failed_id,
            new_asset_id: new_asset.id().to_string(),
            option_id,
            installed_at: failure_date,
        }))
    }
}
