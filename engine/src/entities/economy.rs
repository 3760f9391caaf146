//! Bonds and bond pricing.
//!
//! Utilities fund capital shortfalls by issuing bonds. An issuance is a
//! batch of identical fixed-coupon bonds; the price of a new issuance is
//! derived from the inflation-expectation and investor-demand series in
//! force at the issue year.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::settings::BondsSettings;
use crate::core::time::year_start;
use crate::store::{tables, PropertyStore, StoreError};

/// Face value of a single bond.
pub const BOND_FACE_VALUE: f64 = 100.0;

/// A batch of identical bonds issued by one utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondIssuance {
    /// Unique id: "BI-{utility}-{year}"
    pub id: String,

    /// Number of bonds in the batch
    pub n_bonds: u64,

    /// Issue date
    pub issue_date: NaiveDate,

    /// Maturity date
    pub maturity_date: NaiveDate,

    /// Annual coupon rate in percentage points
    pub coupon_rate: f64,
}

impl BondIssuance {
    /// Total annual coupon payment for the batch.
    pub fn interest(&self) -> f64 {
        self.n_bonds as f64 * BOND_FACE_VALUE * self.coupon_rate / 100.0
    }

    /// Total principal repayment at maturity.
    pub fn principal(&self) -> f64 {
        self.n_bonds as f64 * BOND_FACE_VALUE
    }

    /// Whether the batch has matured by `year`.
    pub fn is_mature(&self, year: i32) -> bool {
        year_start(year) >= self.maturity_date
    }

    /// Total payment due in `year`: the coupon while outstanding, plus the
    /// principal in the maturity year. Zero outside the issuance's life.
    pub fn payment_due(&self, year: i32) -> f64 {
        let current = year_start(year);

        if current < self.issue_date || current > self.maturity_date {
            return 0.0;
        }

        let mut payment = self.interest();
        if current.year() == self.maturity_date.year() {
            payment += self.principal();
        }
        payment
    }
}

/// Present value of a single bond.
///
/// Pure function: discounts the coupon stream and the face repayment at the
/// given yield over `horizon` years.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::entities::bond_price;
///
/// // Coupon equal to yield prices at par.
/// let price = bond_price(100.0, 0.05, 0.05, 10);
/// assert!((price - 100.0).abs() < 1e-9);
/// ```
pub fn bond_price(face_value: f64, coupon_rate: f64, yield_rate: f64, horizon: u32) -> f64 {
    let coupon = coupon_rate * face_value;

    let mut pv_coupons = 0.0;
    let mut disc = 1.0;
    for _ in 1..=horizon {
        disc /= 1.0 + yield_rate;
        pv_coupons += coupon * disc;
    }

    pv_coupons + face_value * disc
}

/// Price and create a new issuance raising at least `value`.
///
/// The coupon is the risk-free rate plus the inflation expectation in force
/// at the issue year; the yield adds a spread that widens as investor
/// demand falls. The bond count is rounded up, so the amount actually
/// raised can slightly exceed `value`.
pub fn raise_amount(
    store: &PropertyStore,
    settings: &BondsSettings,
    state_id: &str,
    value: f64,
    year: i32,
    utility_id: &str,
) -> Result<(f64, BondIssuance), StoreError> {
    let ts = year_start(year);

    let expectation =
        store.get_latest_at_or_before(tables::ECONOMY_INFLATION_EXPECTATION, ts, state_id)?;
    let demand = store.get_latest_at_or_before(tables::ECONOMY_INVESTOR_DEMAND, ts, state_id)?;

    let coupon = settings.risk_free_rate + expectation;
    let yield_rate = coupon + settings.spread_sensitivity * (1.0 - demand);

    let price = bond_price(
        BOND_FACE_VALUE,
        coupon / 100.0,
        yield_rate / 100.0,
        settings.maturity,
    );

    let n_bonds = (value / price).ceil() as u64;
    let raised = n_bonds as f64 * price;

    let issuance = BondIssuance {
        id: format!("BI-{}-{}", utility_id, year),
        n_bonds,
        issue_date: ts,
        maturity_date: year_start(year + settings.maturity as i32),
        coupon_rate: coupon,
    };

    Ok((raised, issuance))
}
