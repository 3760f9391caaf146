//! Masterplan resolution.
//!
//! A masterplan is a sparse, year-keyed log of policy settings and
//! physical interventions, each targeting either the national tier or one
//! utility. Resolution semantics differ by kind:
//!
//! - **Policies are sticky**: for each policy name and scope, the entry at
//!   the largest year ≤ the queried year wins; absent means absent (the
//!   caller skips that action).
//! - **Interventions are one-shot**: only entries exactly at the queried
//!   year apply; absent entries resolve to an empty list, never inherited
//!   from a prior year.
//!
//! Duplicate entries for the same (year, scope) are rejected at load:
//! behavior under duplicates is undefined by the file format and must
//! never be silently resolved.

pub mod types;

use std::collections::BTreeMap;

use thiserror::Error;

pub use types::{
    AllocationRule, BondRatioPolicy, BudgetAllocationPolicy, CloseSourceItem, InstallPipeItem,
    InstallPumpsItem, InstallSolarItem, NationalInterventions, NationalPolicies,
    NrwMitigationPolicy, NrwRule, OpenSourceItem, PricingArgs, PricingPolicy, PricingRule,
    PumpInstallBehaviour, Scope, UtilityEntry, UtilityInterventions, UtilityPolicies, YearEntry,
};

/// Errors raised while indexing a masterplan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MasterplanError {
    #[error("Duplicate masterplan entry for year {0}")]
    DuplicateYear(i32),

    #[error("Duplicate masterplan block for utility '{utility}' in year {year}")]
    DuplicateUtilityBlock { year: i32, utility: String },
}

/// Sticky policy values in force for the national tier at one year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedNationalPolicies {
    pub budget_allocation: Option<BudgetAllocationPolicy>,
}

/// Sticky policy values in force for one utility at one year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedUtilityPolicies {
    pub nrw_mitigation: Option<NrwMitigationPolicy>,
    pub pricing_adjustment: Option<PricingPolicy>,
    pub bond_ratio: Option<BondRatioPolicy>,
}

/// The indexed masterplan.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::masterplan::{Masterplan, YearEntry};
///
/// let entries: Vec<YearEntry> = serde_json::from_str(r#"[
///     { "year": 2026, "national_policies":
///         { "budget_allocation": { "policy": "by_population" } } }
/// ]"#).unwrap();
///
/// let plan = Masterplan::from_entries(entries).unwrap();
/// // Sticky: still in force three years later.
/// assert!(plan.national_policies(2029).budget_allocation.is_some());
/// assert!(plan.national_policies(2025).budget_allocation.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Masterplan {
    national_policies: BTreeMap<i32, NationalPolicies>,
    national_interventions: BTreeMap<i32, NationalInterventions>,
    utility_policies: BTreeMap<(i32, String), UtilityPolicies>,
    utility_interventions: BTreeMap<(i32, String), UtilityInterventions>,
}

impl Masterplan {
    /// Index a list of year entries.
    ///
    /// Rejects duplicate years and duplicate utility blocks within a year:
    /// two entries for the same (year, scope) would make "last one wins"
    /// silently order-dependent.
    pub fn from_entries(entries: Vec<YearEntry>) -> Result<Self, MasterplanError> {
        let mut plan = Masterplan::default();

        for entry in entries {
            let year = entry.year;
            if plan.national_policies.contains_key(&year)
                || plan.national_interventions.contains_key(&year)
                || plan.utility_policies.keys().any(|(y, _)| *y == year)
                || plan.utility_interventions.keys().any(|(y, _)| *y == year)
            {
                return Err(MasterplanError::DuplicateYear(year));
            }

            if let Some(policies) = entry.national_policies {
                plan.national_policies.insert(year, policies);
            }
            if let Some(interventions) = entry.national_interventions {
                plan.national_interventions.insert(year, interventions);
            }

            for block in entry.water_utilities {
                let key = (year, block.utility_id.clone());
                let seen = plan.utility_policies.contains_key(&key)
                    || plan.utility_interventions.contains_key(&key);
                if seen {
                    return Err(MasterplanError::DuplicateUtilityBlock {
                        year,
                        utility: block.utility_id,
                    });
                }

                if let Some(policies) = block.policies {
                    plan.utility_policies.insert(key.clone(), policies);
                }
                if let Some(interventions) = block.interventions {
                    plan.utility_interventions.insert(key, interventions);
                }
            }
        }

        Ok(plan)
    }

    /// National policies in force at `year` (sticky, per policy name).
    pub fn national_policies(&self, year: i32) -> ResolvedNationalPolicies {
        let mut resolved = ResolvedNationalPolicies::default();

        for (_, policies) in self.national_policies.range(..=year).rev() {
            if resolved.budget_allocation.is_none() {
                resolved.budget_allocation = policies.budget_allocation.clone();
            }
            if resolved.budget_allocation.is_some() {
                break;
            }
        }

        resolved
    }

    /// Policies in force for `utility` at `year` (sticky, independently
    /// per policy name).
    pub fn utility_policies(&self, utility: &str, year: i32) -> ResolvedUtilityPolicies {
        let mut resolved = ResolvedUtilityPolicies::default();

        // Descending scan over years ≤ `year`, first hit per name wins.
        for ((y, scope), policies) in self.utility_policies.iter().rev() {
            if *y > year || scope != utility {
                continue;
            }
            if resolved.nrw_mitigation.is_none() {
                resolved.nrw_mitigation = policies.nrw_mitigation.clone();
            }
            if resolved.pricing_adjustment.is_none() {
                resolved.pricing_adjustment = policies.pricing_adjustment.clone();
            }
            if resolved.bond_ratio.is_none() {
                resolved.bond_ratio = policies.bond_ratio;
            }
            if resolved.nrw_mitigation.is_some()
                && resolved.pricing_adjustment.is_some()
                && resolved.bond_ratio.is_some()
            {
                break;
            }
        }

        resolved
    }

    /// National interventions for exactly `year` (one-shot; empty lists
    /// when absent).
    pub fn national_interventions(&self, year: i32) -> NationalInterventions {
        self.national_interventions
            .get(&year)
            .cloned()
            .unwrap_or_default()
    }

    /// Interventions for `utility` at exactly `year` (one-shot; empty
    /// lists when absent).
    pub fn utility_interventions(&self, utility: &str, year: i32) -> UtilityInterventions {
        self.utility_interventions
            .get(&(year, utility.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Years with any entry, sorted.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .national_policies
            .keys()
            .chain(self.national_interventions.keys())
            .copied()
            .chain(self.utility_policies.keys().map(|(y, _)| *y))
            .chain(self.utility_interventions.keys().map(|(y, _)| *y))
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}
