//! Budget allocation strategies.
//!
//! Three interchangeable ways of distributing a fixed budget across a set
//! of recipients. All three are pure functions: they never touch the
//! property store, and applying the returned allocation is the caller's
//! job. Conservation holds for all of them: allocations never sum to more
//! than the budget.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised by allocation strategies.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("Invalid shares: {0}")]
    InvalidShares(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),
}

/// A recipient in a greedy allocation, with everything the walk needs
/// precomputed from the recipient's current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityRecipient {
    /// Recipient id
    pub id: String,

    /// Severity class rank; higher is worse and served first
    pub severity: u8,

    /// Continuous tie-break metric; higher served first within a class
    pub tiebreak: f64,

    /// Estimated cost of full remediation, from the recipient's current
    /// state and the current year's unit-cost lookup
    pub full_cost: f64,
}

/// Allocate proportionally to a per-recipient weight.
///
/// The allocation sums to exactly the budget (up to floating tolerance)
/// whenever some weight is positive. Order-insensitive.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::allocation::proportional_by_weight;
///
/// let recipients = vec![
///     ("A".to_string(), 10.0),
///     ("B".to_string(), 30.0),
///     ("C".to_string(), 60.0),
/// ];
/// let allocation = proportional_by_weight(100.0, &recipients).unwrap();
/// assert_eq!(allocation["A"], 10.0);
/// assert_eq!(allocation["B"], 30.0);
/// assert_eq!(allocation["C"], 60.0);
/// ```
pub fn proportional_by_weight(
    budget: f64,
    recipients: &[(String, f64)],
) -> Result<BTreeMap<String, f64>, AllocationError> {
    if recipients.iter().any(|(_, w)| *w < 0.0 || !w.is_finite()) {
        return Err(AllocationError::InvalidWeights(
            "weights must be finite and non-negative".to_string(),
        ));
    }

    let total: f64 = recipients.iter().map(|(_, w)| w).sum();
    if !recipients.is_empty() && total <= 0.0 {
        return Err(AllocationError::InvalidWeights(
            "at least one weight must be positive".to_string(),
        ));
    }

    Ok(recipients
        .iter()
        .map(|(id, weight)| (id.clone(), budget * weight / total))
        .collect())
}

/// Allocate greedily by priority.
///
/// Recipients are totally ordered by (severity descending, tie-break
/// descending, id ascending as the final determinism guard). The walk
/// allocates each recipient the lesser of its full remediation cost and
/// the remaining budget, and stops once the budget is exhausted. Returns
/// the allocation and the total spent.
pub fn greedy_by_priority(
    budget: f64,
    recipients: &[PriorityRecipient],
) -> (BTreeMap<String, f64>, f64) {
    let mut ordered: Vec<&PriorityRecipient> = recipients.iter().collect();
    ordered.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.tiebreak.partial_cmp(&a.tiebreak).unwrap_or(Ordering::Equal))
            .then(a.id.cmp(&b.id))
    });

    let mut allocation: BTreeMap<String, f64> =
        recipients.iter().map(|r| (r.id.clone(), 0.0)).collect();
    let mut spent = 0.0;

    for recipient in ordered {
        let remaining = budget - spent;
        if remaining <= 0.0 {
            break;
        }
        let granted = recipient.full_cost.min(remaining);
        allocation.insert(recipient.id.clone(), granted);
        spent += granted;
    }

    (allocation, spent)
}

/// Allocate by explicit fractional shares.
///
/// Each share must lie in [0, 1] and the shares must sum to at most 1.
/// Recipients without a share get 0; shares keyed to unknown recipient ids
/// allocate nothing.
pub fn custom_shares(
    budget: f64,
    recipient_ids: &[String],
    shares: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, AllocationError> {
    for (id, share) in shares {
        if !(0.0..=1.0).contains(share) {
            return Err(AllocationError::InvalidShares(format!(
                "share for '{}' is not between 0 and 1: {}",
                id, share
            )));
        }
    }

    let total: f64 = shares.values().sum();
    if total > 1.0 {
        return Err(AllocationError::InvalidShares(format!(
            "shares sum to {}, which exceeds 1",
            total
        )));
    }

    Ok(recipient_ids
        .iter()
        .map(|id| (id.clone(), budget * shares.get(id).copied().unwrap_or(0.0)))
        .collect())
}
