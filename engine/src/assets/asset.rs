//! Single-asset lifecycle state machine.
//!
//! An asset moves `Pending → Active → Decommissioned` (terminal). Its
//! effective decommission date is resolved from three sources in strict
//! precedence order:
//!
//! 1. a construction-time date (historical data; immutable),
//! 2. an entry in the [`DecommissionRegistry`] (user decision or failure),
//! 3. nothing; the asset stays active indefinitely.
//!
//! The sampled lifetime never yields a date by itself: `fail()` derives the
//! date and writes it into the registry, so a later explicit decommission
//! can still override a merely-sampled horizon.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::time::year_start;

/// Errors that can occur during asset lifecycle operations.
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("Decommission date {when} must be after installation date {installed} for asset {asset}")]
    DecommissionBeforeInstallation {
        asset: String,
        when: NaiveDate,
        installed: NaiveDate,
    },

    #[error("Asset {asset} has an explicit decommission date; it cannot be changed")]
    ImmutableDecommissionDate { asset: String },

    #[error("Asset {asset} has no sampled lifetime and cannot fail")]
    NoSampledLifetime { asset: String },
}

/// Decommission overrides, keyed by asset id.
///
/// Owned by the simulation context and passed into lifecycle operations,
/// never shared global state, so concurrent test runs stay isolated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecommissionRegistry {
    overrides: BTreeMap<String, NaiveDate>,
}

impl DecommissionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override date for an asset, if any.
    pub fn get(&self, asset_id: &str) -> Option<NaiveDate> {
        self.overrides.get(asset_id).copied()
    }

    fn set(&mut self, asset_id: &str, when: NaiveDate) {
        self.overrides.insert(asset_id.to_string(), when);
    }

    /// Number of recorded overrides.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether no override has been recorded.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// A physical installed asset (a pipe or a pump bank, not its catalog
/// option).
///
/// Construction invariant: exactly one of {explicit decommission date,
/// sampled lifetime} is present. Historical assets come with the date;
/// forward-looking installs come with a sampled lifetime.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use waterplan_simulator_core_rs::assets::{Asset, DecommissionRegistry};
///
/// let registry = DecommissionRegistry::new();
/// let asset = Asset::with_sampled_lifetime(
///     "C1-00".to_string(),
///     "PI01".to_string(),
///     NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
///     47,
/// );
///
/// assert!(asset.is_active(&registry, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()));
/// assert!(!asset.is_active(&registry, NaiveDate::from_ymd_opt(1999, 6, 1).unwrap()));
/// assert!(asset.is_failing_in(2047));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Deterministic id: `{container_id}-{index:02}`
    id: String,

    /// Catalog option this asset was built from
    option_id: String,

    installation_date: NaiveDate,

    /// Construction-time decommission date (historical data). Immutable.
    decommission_date: Option<NaiveDate>,

    /// Sampled lifetime in years; `None` when a decommission date is
    /// historically known.
    sampled_lifetime: Option<u32>,
}

impl Asset {
    /// Historical asset with a known decommission date.
    pub fn with_decommission_date(
        id: String,
        option_id: String,
        installation_date: NaiveDate,
        decommission_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            option_id,
            installation_date,
            decommission_date: Some(decommission_date),
            sampled_lifetime: None,
        }
    }

    /// Forward-looking asset with a sampled lifetime.
    pub fn with_sampled_lifetime(
        id: String,
        option_id: String,
        installation_date: NaiveDate,
        sampled_lifetime: u32,
    ) -> Self {
        Self {
            id,
            option_id,
            installation_date,
            decommission_date: None,
            sampled_lifetime: Some(sampled_lifetime),
        }
    }

    /// Asset id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Catalog option id.
    pub fn option_id(&self) -> &str {
        &self.option_id
    }

    /// Installation date.
    pub fn installation_date(&self) -> NaiveDate {
        self.installation_date
    }

    /// Construction-time decommission date, if one exists.
    pub fn construction_decommission_date(&self) -> Option<NaiveDate> {
        self.decommission_date
    }

    /// Sampled lifetime in years, if one exists.
    pub fn sampled_lifetime(&self) -> Option<u32> {
        self.sampled_lifetime
    }

    /// Effective decommission date: construction date first, registry
    /// override second.
    pub fn effective_decommission(&self, registry: &DecommissionRegistry) -> Option<NaiveDate> {
        self.decommission_date.or_else(|| registry.get(&self.id))
    }

    /// Whether the asset is active at `when`: installed at or before, and
    /// not yet effectively decommissioned (the decommission instant itself
    /// is inactive).
    pub fn is_active(&self, registry: &DecommissionRegistry, when: NaiveDate) -> bool {
        self.installation_date <= when
            && self
                .effective_decommission(registry)
                .map_or(true, |d| d > when)
    }

    /// Whether the sampled lifetime runs out exactly in `year`.
    ///
    /// Always false for assets without a sampled lifetime.
    pub fn is_failing_in(&self, year: i32) -> bool {
        match self.sampled_lifetime {
            Some(lifetime) => self.installation_date.year() + lifetime as i32 == year,
            None => false,
        }
    }

    /// Record a decommission decision effective at `when`.
    ///
    /// Overwrites any earlier registry entry for this asset. Fails when the
    /// asset carries an immutable construction-time date, or when `when`
    /// does not lie strictly after the installation date.
    pub fn decommission(
        &self,
        registry: &mut DecommissionRegistry,
        when: NaiveDate,
    ) -> Result<(), LifecycleError> {
        if self.decommission_date.is_some() {
            return Err(LifecycleError::ImmutableDecommissionDate {
                asset: self.id.clone(),
            });
        }
        if when <= self.installation_date {
            return Err(LifecycleError::DecommissionBeforeInstallation {
                asset: self.id.clone(),
                when,
                installed: self.installation_date,
            });
        }

        registry.set(&self.id, when);
        Ok(())
    }

    /// Fail the asset at the end of its sampled lifetime.
    ///
    /// Equivalent to decommissioning at January 1st of
    /// `installation year + sampled lifetime`; returns that date.
    pub fn fail(&self, registry: &mut DecommissionRegistry) -> Result<NaiveDate, LifecycleError> {
        let lifetime = self
            .sampled_lifetime
            .ok_or_else(|| LifecycleError::NoSampledLifetime {
                asset: self.id.clone(),
            })?;

        let when = year_start(self.installation_date.year() + lifetime as i32);
        self.decommission(registry, when)?;
        Ok(when)
    }
}
