//! Time management for the simulation
//!
//! The simulation operates in discrete annual steps. Calendar timestamps
//! (`chrono::NaiveDate`) are used for everything finer than a year: asset
//! installation dates, seasonal climate entries, store timestamps. A year `y`
//! maps to the timestamp `y-01-01`, so "at year y" and "at y-01-01" are
//! interchangeable throughout the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Convert a calendar year to its canonical timestamp (January 1st).
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::core::time::year_start;
///
/// let ts = year_start(2000);
/// assert_eq!(ts.to_string(), "2000-01-01");
/// ```
pub fn year_start(year: i32) -> NaiveDate {
    // Jan 1 exists for every representable year.
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
}

/// Last calendar day of a year (December 31st).
pub fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap()
}

/// The simulated horizon: a closed range of calendar years.
///
/// Years are stepped strictly in order; year `t` state is fully materialized
/// before year `t + 1` is touched. The terminal year is special: the driver
/// skips cost escalation and physical aging there because both write into the
/// following (unsimulated) year.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::Timeline;
///
/// let timeline = Timeline::new(2000, 2004);
/// assert_eq!(timeline.n_years(), 5);
/// assert!(timeline.is_terminal(2004));
/// assert!(!timeline.is_terminal(2003));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// First simulated year (inclusive)
    start_year: i32,
    /// Last simulated year (inclusive)
    end_year: i32,
}

impl Timeline {
    /// Create a new timeline over `[start_year, end_year]`.
    ///
    /// # Panics
    /// Panics if `end_year < start_year`.
    pub fn new(start_year: i32, end_year: i32) -> Self {
        assert!(
            end_year >= start_year,
            "end_year must not precede start_year"
        );
        Self {
            start_year,
            end_year,
        }
    }

    /// First simulated year.
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Last simulated year.
    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    /// Iterate the simulated years in order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }

    /// Number of simulated years.
    pub fn n_years(&self) -> usize {
        (self.end_year - self.start_year + 1) as usize
    }

    /// Whether `year` is the last simulated year.
    pub fn is_terminal(&self, year: i32) -> bool {
        year == self.end_year
    }

    /// Whether `year` falls inside the simulated horizon.
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }
}
