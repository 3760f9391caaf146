//! Masterplan payload types.
//!
//! The set of valid policy and intervention names is closed: payloads are
//! typed structs with `deny_unknown_fields`, so a masterplan carrying an
//! unrecognized name fails at load time, never at resolve time. Field
//! names mirror the masterplan file schema (`policy`, `policy_args`, …),
//! whose validation is otherwise the host's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Targeting level of a policy or intervention.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// The national tier
    National,
    /// One specific water utility
    Utility(String),
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How the national capital budget is split across utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationRule {
    ByPopulation,
    ByInversePopulation,
    ByIncome,
    ByInverseIncome,
    Custom,
}

/// National policy: split the yearly national budget across utilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetAllocationPolicy {
    /// Allocation rule
    #[serde(rename = "policy")]
    pub rule: AllocationRule,

    /// Explicit per-utility shares, required by the `custom` rule
    #[serde(rename = "policy_args", default)]
    pub shares: Option<BTreeMap<String, f64>>,
}

/// How an NRW mitigation budget is distributed over municipalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NrwRule {
    ByNrwClass,
    ByPopulation,
    Custom,
}

/// Utility policy: spend a budget on distribution-network remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NrwMitigationPolicy {
    /// Budget for the year
    pub budget: f64,

    /// Distribution rule
    #[serde(rename = "policy")]
    pub rule: NrwRule,

    /// Explicit per-municipality shares, required by the `custom` rule
    #[serde(rename = "policy_args", default)]
    pub shares: Option<BTreeMap<String, f64>>,
}

/// How water prices move from one year to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingRule {
    ByInflation,
    Custom,
}

/// Per-component escalation rates for the `custom` pricing rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingArgs {
    pub fixed_component: f64,
    pub variable_component: f64,
    pub selling_price: f64,
}

/// Utility policy: adjust the three water price components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingPolicy {
    #[serde(rename = "policy")]
    pub rule: PricingRule,

    #[serde(rename = "policy_args", default)]
    pub args: Option<PricingArgs>,
}

/// Utility policy: target bond-to-debt ratio for funding capex shortfalls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BondRatioPolicy {
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Interventions
// ---------------------------------------------------------------------------

/// Install a pipe on an existing connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallPipeItem {
    pub connection_id: String,
    pub pipe_option_id: String,
}

/// How a pump install relates to the pumps already on the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpInstallBehaviour {
    /// Decommission the active bank first, then install
    Replace,
    /// Install on a station with no active bank
    New,
}

/// Install a bank of pumps on the station of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallPumpsItem {
    pub source_id: String,
    pub pump_option_id: String,
    pub n_pumps: u32,
    pub behaviour: PumpInstallBehaviour,
}

/// Open (activate) a source, equipping its station and supply connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenSourceItem {
    pub source_id: String,
    pub source_capacity: f64,
    pub pump_option_id: String,
    pub n_pumps: u32,
    pub pipe_option_id: String,
}

/// Close a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseSourceItem {
    pub source_id: String,
}

/// Install a solar farm on a source or pumping station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallSolarItem {
    pub connected_entity_id: String,
    pub capacity: f64,
}

// ---------------------------------------------------------------------------
// Year entries
// ---------------------------------------------------------------------------

/// National policies block of one year entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NationalPolicies {
    #[serde(default)]
    pub budget_allocation: Option<BudgetAllocationPolicy>,
}

/// National interventions block of one year entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NationalInterventions {
    #[serde(default)]
    pub install_pipe: Vec<InstallPipeItem>,
}

/// Utility policies block of one year entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtilityPolicies {
    #[serde(default)]
    pub nrw_mitigation: Option<NrwMitigationPolicy>,

    #[serde(default)]
    pub pricing_adjustment: Option<PricingPolicy>,

    #[serde(default)]
    pub bond_ratio: Option<BondRatioPolicy>,
}

/// Utility interventions block of one year entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtilityInterventions {
    #[serde(default)]
    pub open_source: Vec<OpenSourceItem>,

    #[serde(default)]
    pub close_source: Vec<CloseSourceItem>,

    #[serde(default)]
    pub install_pipe: Vec<InstallPipeItem>,

    #[serde(default)]
    pub install_pumps: Vec<InstallPumpsItem>,

    #[serde(default)]
    pub install_solar: Vec<InstallSolarItem>,
}

/// One utility's block inside a year entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtilityEntry {
    #[serde(rename = "water_utility")]
    pub utility_id: String,

    #[serde(default)]
    pub policies: Option<UtilityPolicies>,

    #[serde(default)]
    pub interventions: Option<UtilityInterventions>,
}

/// One year of the masterplan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearEntry {
    pub year: i32,

    #[serde(default)]
    pub national_policies: Option<NationalPolicies>,

    #[serde(default)]
    pub national_interventions: Option<NationalInterventions>,

    #[serde(default)]
    pub water_utilities: Vec<UtilityEntry>,
}
