//! Resolution-law tests for the masterplan: sticky policies, one-shot
//! interventions, duplicate rejection.

use waterplan_simulator_core_rs::masterplan::{
    Masterplan, MasterplanError, NrwRule, UtilityInterventions, YearEntry,
};

fn entries(json: &str) -> Vec<YearEntry> {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_sticky_policy_law() {
    // policies(year, scope)[p] equals the value set at the largest
    // y <= year with an entry containing p for that scope.
    let plan = Masterplan::from_entries(entries(
        r#"[
            { "year": 2025, "national_policies": {
                "budget_allocation": { "policy": "by_population" } } },
            { "year": 2030, "national_policies": {
                "budget_allocation": { "policy": "by_income" } } }
        ]"#,
    ))
    .unwrap();

    use waterplan_simulator_core_rs::masterplan::AllocationRule;

    for year in 2025..2030 {
        assert_eq!(
            plan.national_policies(year).budget_allocation.unwrap().rule,
            AllocationRule::ByPopulation
        );
    }
    for year in 2030..2040 {
        assert_eq!(
            plan.national_policies(year).budget_allocation.unwrap().rule,
            AllocationRule::ByIncome
        );
    }
    assert!(plan.national_policies(2024).budget_allocation.is_none());
}

#[test]
fn test_future_entries_do_not_affect_earlier_queries() {
    let base = entries(
        r#"[
            { "year": 2025, "water_utilities": [
                { "water_utility": "WU01", "policies": {
                    "nrw_mitigation": { "budget": 100, "policy": "by_population" } } }
            ] }
        ]"#,
    );

    let with_future = {
        let mut extended = base.clone();
        extended.extend(entries(
            r#"[
                { "year": 2035, "water_utilities": [
                    { "water_utility": "WU01", "policies": {
                        "nrw_mitigation": { "budget": 999, "policy": "by_nrw_class" } } }
                ] }
            ]"#,
        ));
        Masterplan::from_entries(extended).unwrap()
    };
    let without_future = Masterplan::from_entries(base).unwrap();

    // Adding an entry strictly after the queried year changes nothing.
    for year in 2025..2035 {
        assert_eq!(
            with_future.utility_policies("WU01", year),
            without_future.utility_policies("WU01", year)
        );
    }

    let late = with_future.utility_policies("WU01", 2035);
    assert_eq!(late.nrw_mitigation.as_ref().unwrap().budget, 999.0);
    assert_eq!(late.nrw_mitigation.unwrap().rule, NrwRule::ByNrwClass);
}

#[test]
fn test_policy_names_resolve_independently() {
    let plan = Masterplan::from_entries(entries(
        r#"[
            { "year": 2025, "water_utilities": [
                { "water_utility": "WU01", "policies": {
                    "nrw_mitigation": { "budget": 100, "policy": "by_population" },
                    "pricing_adjustment": { "policy": "by_inflation" } } }
            ] },
            { "year": 2030, "water_utilities": [
                { "water_utility": "WU01", "policies": {
                    "nrw_mitigation": { "budget": 200, "policy": "by_population" } } }
            ] }
        ]"#,
    ))
    .unwrap();

    // In 2032, the 2030 budget is in force but pricing still carries the
    // 2025 setting: each name resolves independently.
    let resolved = plan.utility_policies("WU01", 2032);
    assert_eq!(resolved.nrw_mitigation.unwrap().budget, 200.0);
    assert!(resolved.pricing_adjustment.is_some());
}

#[test]
fn test_one_shot_intervention_law() {
    let plan = Masterplan::from_entries(entries(
        r#"[
            { "year": 2027, "water_utilities": [
                { "water_utility": "WU01", "interventions": {
                    "install_pipe": [
                        { "connection_id": "CS001", "pipe_option_id": "PI01" }
                    ],
                    "close_source": [ { "source_id": "SG001" } ] } }
            ] }
        ]"#,
    ))
    .unwrap();

    // Exactly at 2027: present.
    let at = plan.utility_interventions("WU01", 2027);
    assert_eq!(at.install_pipe.len(), 1);
    assert_eq!(at.close_source.len(), 1);

    // Any other year: every known intervention name resolves to empty;
    // an installed pipe does not reappear in the following year's view.
    for year in [2026, 2028, 2035] {
        assert_eq!(
            plan.utility_interventions("WU01", year),
            UtilityInterventions::default()
        );
    }

    // National tier has its own one-shot log.
    assert!(plan.national_interventions(2027).install_pipe.is_empty());
}

#[test]
fn test_duplicate_entries_rejected_at_load() {
    let err = Masterplan::from_entries(entries(
        r#"[
            { "year": 2025, "national_policies": {
                "budget_allocation": { "policy": "by_population" } } },
            { "year": 2025, "water_utilities": [] }
        ]"#,
    ))
    .unwrap_err();
    assert_eq!(err, MasterplanError::DuplicateYear(2025));

    let err = Masterplan::from_entries(entries(
        r#"[
            { "year": 2025, "water_utilities": [
                { "water_utility": "WU01",
                  "interventions": { "close_source": [ { "source_id": "SG001" } ] } },
                { "water_utility": "WU01",
                  "interventions": { "close_source": [ { "source_id": "SG002" } ] } }
            ] }
        ]"#,
    ))
    .unwrap_err();
    assert_eq!(
        err,
        MasterplanError::DuplicateUtilityBlock {
            year: 2025,
            utility: "WU01".to_string()
        }
    );
}

#[test]
fn test_unknown_names_rejected_at_parse() {
    // Unknown intervention name.
    let parsed: Result<Vec<YearEntry>, _> = serde_json::from_str(
        r#"[
            { "year": 2025, "water_utilities": [
                { "water_utility": "WU01", "interventions": {
                    "install_fountain": [] } }
            ] }
        ]"#,
    );
    assert!(parsed.is_err());

    // Unknown enum value for a known policy.
    let parsed: Result<Vec<YearEntry>, _> = serde_json::from_str(
        r#"[
            { "year": 2025, "national_policies": {
                "budget_allocation": { "policy": "by_vibes" } } }
        ]"#,
    );
    assert!(parsed.is_err());
}
