//! Allocation strategy tests, including the conservation property under
//! randomized inputs.

use std::collections::BTreeMap;

use proptest::prelude::*;
use waterplan_simulator_core_rs::allocation::{
    custom_shares, greedy_by_priority, proportional_by_weight, AllocationError,
    PriorityRecipient,
};

#[test]
fn test_greedy_nrw_scenario() {
    // Budget 1,000,000 over remediation costs 400k, 600k, 900k in
    // priority order 1, 2, 3: allocations 400k, 600k, 0 and the whole
    // budget spent.
    let recipients = vec![
        PriorityRecipient {
            id: "GM0001".to_string(),
            severity: 4,
            tiebreak: 45.0,
            full_cost: 400_000.0,
        },
        PriorityRecipient {
            id: "GM0002".to_string(),
            severity: 3,
            tiebreak: 32.0,
            full_cost: 600_000.0,
        },
        PriorityRecipient {
            id: "GM0003".to_string(),
            severity: 2,
            tiebreak: 25.0,
            full_cost: 900_000.0,
        },
    ];

    let (allocation, spent) = greedy_by_priority(1_000_000.0, &recipients);
    assert_eq!(allocation["GM0001"], 400_000.0);
    assert_eq!(allocation["GM0002"], 600_000.0);
    assert_eq!(allocation["GM0003"], 0.0);
    assert_eq!(spent, 1_000_000.0);
}

#[test]
fn test_proportional_population_scenario() {
    // Budget 100 over populations [10, 30, 60]: allocations [10, 30, 60].
    let recipients = vec![
        ("GM0001".to_string(), 10.0),
        ("GM0002".to_string(), 30.0),
        ("GM0003".to_string(), 60.0),
    ];

    let allocation = proportional_by_weight(100.0, &recipients).unwrap();
    assert_eq!(allocation["GM0001"], 10.0);
    assert_eq!(allocation["GM0002"], 30.0);
    assert_eq!(allocation["GM0003"], 60.0);
}

#[test]
fn test_custom_shares_limits() {
    let ids: Vec<String> = vec!["A".to_string(), "B".to_string()];

    let ok = BTreeMap::from([("A".to_string(), 0.6), ("B".to_string(), 0.4)]);
    let allocation = custom_shares(1_000.0, &ids, &ok).unwrap();
    assert_eq!(allocation["A"], 600.0);
    assert_eq!(allocation["B"], 400.0);

    let too_much = BTreeMap::from([("A".to_string(), 0.6), ("B".to_string(), 0.6)]);
    assert!(matches!(
        custom_shares(1_000.0, &ids, &too_much).unwrap_err(),
        AllocationError::InvalidShares(_)
    ));

    let out_of_range = BTreeMap::from([("A".to_string(), 1.2)]);
    assert!(matches!(
        custom_shares(1_000.0, &ids, &out_of_range).unwrap_err(),
        AllocationError::InvalidShares(_)
    ));
}

proptest! {
    /// Greedy conservation: allocations never sum past the budget, and
    /// no recipient receives more than its own remediation cost.
    #[test]
    fn prop_greedy_conserves_budget(
        budget in 0.0f64..10_000_000.0,
        costs in proptest::collection::vec(0.0f64..2_000_000.0, 0..12),
        severities in proptest::collection::vec(0u8..5, 0..12),
    ) {
        let recipients: Vec<PriorityRecipient> = costs
            .iter()
            .enumerate()
            .map(|(i, cost)| PriorityRecipient {
                id: format!("R{:02}", i),
                severity: severities.get(i).copied().unwrap_or(0),
                tiebreak: *cost,
                full_cost: *cost,
            })
            .collect();

        let (allocation, spent) = greedy_by_priority(budget, &recipients);

        let total: f64 = allocation.values().sum();
        prop_assert!(total <= budget + 1e-6);
        prop_assert!((total - spent).abs() < 1e-6);
        for recipient in &recipients {
            prop_assert!(allocation[&recipient.id] <= recipient.full_cost + 1e-6);
        }
    }

    /// Proportional conservation: with positive weights the allocation
    /// sums to exactly the budget (floating tolerance).
    #[test]
    fn prop_proportional_sums_to_budget(
        budget in 0.0f64..10_000_000.0,
        weights in proptest::collection::vec(0.001f64..1_000_000.0, 1..12),
    ) {
        let recipients: Vec<(String, f64)> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("R{:02}", i), *w))
            .collect();

        let allocation = proportional_by_weight(budget, &recipients).unwrap();
        let total: f64 = allocation.values().sum();
        prop_assert!((total - budget).abs() < budget.max(1.0) * 1e-9);
    }

    /// Custom-share conservation: valid shares never allocate more than
    /// the budget.
    #[test]
    fn prop_custom_shares_conserve_budget(
        budget in 0.0f64..1_000_000.0,
        raw_shares in proptest::collection::vec(0.0f64..1.0, 1..8),
    ) {
        let total_raw: f64 = raw_shares.iter().sum();
        // Normalize down so the sum stays strictly ≤ 1 despite rounding.
        let scale = if total_raw > 1.0 { (1.0 - 1e-9) / total_raw } else { 1.0 };

        let ids: Vec<String> = (0..raw_shares.len()).map(|i| format!("R{:02}", i)).collect();
        let shares: BTreeMap<String, f64> = ids
            .iter()
            .cloned()
            .zip(raw_shares.iter().map(|s| s * scale))
            .collect();

        let allocation = custom_shares(budget, &ids, &shares).unwrap();
        let total: f64 = allocation.values().sum();
        prop_assert!(total <= budget + 1e-6);
    }
}
