//! Temporal property store
//!
//! The single shared mutable resource of the simulation: a named collection
//! of tables, each mapping `(timestamp, entity id)` to a scalar value. Every
//! dynamic attribute of every entity (populations, prices, friction
//! factors, balances, realized demand) lives here; entities hold only ids
//! and static data and read/write through explicit store references.
//!
//! # Table kinds
//!
//! - **Exogenous** tables are loaded once and never written by the
//!   simulation (climate, inflation, populations).
//! - **Endogenous** tables are written by the simulation as it runs (costs
//!   under escalation, network ages, balances, results).
//!
//! Writing an exogenous table is a consistency violation, not a silent
//! overwrite.
//!
//! # Critical Invariants
//!
//! 1. Within one table, each (timestamp, entity) pair has at most one value;
//!    writes at an existing pair overwrite.
//! 2. The timestamp axis of each entity series is strictly increasing
//!    (guaranteed by the ordered-map representation).
//! 3. Annually-stepped tables must have no year gaps over the simulated
//!    horizon before year t+1 is read; this is asserted, never repaired.

pub mod persistence;
pub mod tables;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::time::year_start;

/// Errors raised by store operations.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("No value in table '{table}' for entity '{entity}' at {timestamp}")]
    NotFound {
        table: String,
        entity: String,
        timestamp: NaiveDate,
    },

    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("I/O failed: {0}")]
    Io(String),
}

/// Whether the simulation may write a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Supplied by the host, read-only for the simulation
    Exogenous,
    /// Written by the simulation as it runs
    Endogenous,
}

/// One table: a set of per-entity time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyTable {
    kind: TableKind,
    /// entity id -> (timestamp -> value), both axes ordered
    series: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl PropertyTable {
    fn new(kind: TableKind) -> Self {
        Self {
            kind,
            series: BTreeMap::new(),
        }
    }

    /// Table kind.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Ids of all entities with at least one entry.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    /// Full series for one entity, if present.
    pub fn series(&self, entity: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.series.get(entity)
    }
}

/// A named collection of property tables.
///
/// # Example
/// ```
/// use waterplan_simulator_core_rs::store::{PropertyStore, TableKind};
/// use waterplan_simulator_core_rs::core::time::year_start;
///
/// let mut store = PropertyStore::new("demo");
/// store.register_table("utility-balance", TableKind::Endogenous);
///
/// store.set("utility-balance", year_start(2000), "WU01", 125_000.0).unwrap();
/// let balance = store.get("utility-balance", year_start(2000), "WU01").unwrap();
/// assert_eq!(balance, 125_000.0);
///
/// // As-of lookup: the 2000 value is still in force in 2003.
/// let carried = store
///     .get_latest_at_or_before("utility-balance", year_start(2003), "WU01")
///     .unwrap();
/// assert_eq!(carried, 125_000.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyStore {
    name: String,
    tables: BTreeMap<String, PropertyTable>,

    /// Per-cell write counter, active only while a write audit runs.
    /// Not part of the persisted state.
    #[serde(skip)]
    write_audit: Option<BTreeMap<(String, NaiveDate, String), u32>>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
            write_audit: None,
        }
    }

    /// Store name (used as the dump file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a table. Re-registering an existing table is a consistency
    /// violation (the kind of a table is fixed for the life of the store).
    pub fn register_table(
        &mut self,
        table: impl Into<String>,
        kind: TableKind,
    ) -> &mut Self {
        let table = table.into();
        assert!(
            !self.tables.contains_key(&table),
            "Table '{}' registered twice",
            table
        );
        self.tables.insert(table, PropertyTable::new(kind));
        self
    }

    /// Whether a table exists.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Names of all registered tables.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    /// Look up a table by name.
    pub fn table(&self, table: &str) -> Result<&PropertyTable, StoreError> {
        self.tables
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// Start (or restart) a write audit: every simulation write from here
    /// on is counted per (table, timestamp, entity) cell.
    ///
    /// During a simulated year, all writes are attributable to exactly one
    /// (component, entity) pair, so no cell may be written twice within
    /// one year. That invariant is verified by tests through this audit
    /// rather than enforced by a lock.
    pub fn begin_write_audit(&mut self) {
        self.write_audit = Some(BTreeMap::new());
    }

    /// Cells written more than once since the audit began.
    pub fn audited_duplicate_writes(&self) -> Vec<(String, NaiveDate, String)> {
        self.write_audit
            .iter()
            .flat_map(|counts| counts.iter())
            .filter(|(_, count)| **count > 1)
            .map(|(cell, _)| cell.clone())
            .collect()
    }

    fn audit_write(&mut self, table: &str, timestamp: NaiveDate, entity: &str) {
        if let Some(counts) = &mut self.write_audit {
            *counts
                .entry((table.to_string(), timestamp, entity.to_string()))
                .or_insert(0) += 1;
        }
    }

    fn table_mut_for_write(&mut self, table: &str) -> Result<&mut PropertyTable, StoreError> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        if t.kind == TableKind::Exogenous {
            return Err(StoreError::ConsistencyViolation(format!(
                "table '{}' is exogenous and cannot be written by the simulation",
                table
            )));
        }
        Ok(t)
    }

    /// Exact lookup. Fails with `NotFound` when the (timestamp, entity)
    /// pair is absent.
    pub fn get(&self, table: &str, timestamp: NaiveDate, entity: &str) -> Result<f64, StoreError> {
        self.table(table)?
            .series
            .get(entity)
            .and_then(|s| s.get(&timestamp))
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                entity: entity.to_string(),
                timestamp,
            })
    }

    /// As-of lookup: latest value at or before `timestamp`.
    ///
    /// This is the primitive behind every "persists until overridden"
    /// behavior in the engine (sticky prices, carried-forward costs). Fails
    /// with `NotFound` only when no entry exists at or before the timestamp.
    pub fn get_latest_at_or_before(
        &self,
        table: &str,
        timestamp: NaiveDate,
        entity: &str,
    ) -> Result<f64, StoreError> {
        self.table(table)?
            .series
            .get(entity)
            .and_then(|s| s.range(..=timestamp).next_back())
            .map(|(_, v)| *v)
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                entity: entity.to_string(),
                timestamp,
            })
    }

    /// Write one cell. Overwrites an existing value at the same pair.
    pub fn set(
        &mut self,
        table: &str,
        timestamp: NaiveDate,
        entity: &str,
        value: f64,
    ) -> Result<(), StoreError> {
        self.table_mut_for_write(table)?
            .series
            .entry(entity.to_string())
            .or_default()
            .insert(timestamp, value);
        self.audit_write(table, timestamp, entity);
        Ok(())
    }

    /// Batched columnar write: one timestamp, many entities.
    pub fn set_range(
        &mut self,
        table: &str,
        timestamp: NaiveDate,
        entities: &[String],
        values: &[f64],
    ) -> Result<(), StoreError> {
        if entities.len() != values.len() {
            return Err(StoreError::ConsistencyViolation(format!(
                "set_range on '{}': {} entities but {} values",
                table,
                entities.len(),
                values.len()
            )));
        }

        let t = self.table_mut_for_write(table)?;
        for (entity, value) in entities.iter().zip(values) {
            t.series
                .entry(entity.clone())
                .or_default()
                .insert(timestamp, *value);
        }
        for entity in entities {
            self.audit_write(table, timestamp, entity);
        }
        Ok(())
    }

    /// Load one cell of an exogenous table. Only valid before the run
    /// starts; the simulation itself must use `set`.
    pub fn load(
        &mut self,
        table: &str,
        timestamp: NaiveDate,
        entity: &str,
        value: f64,
    ) -> Result<(), StoreError> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;
        t.series
            .entry(entity.to_string())
            .or_default()
            .insert(timestamp, value);
        Ok(())
    }

    /// Ids of all entities present in a table.
    pub fn entities(&self, table: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.table(table)?.series.keys().cloned().collect())
    }

    /// Full series for one entity.
    pub fn series(
        &self,
        table: &str,
        entity: &str,
    ) -> Result<&BTreeMap<NaiveDate, f64>, StoreError> {
        self.table(table)?
            .series
            .get(entity)
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                entity: entity.to_string(),
                timestamp: NaiveDate::MIN,
            })
    }

    /// Maximum value over all entries of one entity within a calendar year.
    ///
    /// Used for sub-year-resolution tables (the seasonal temperature series)
    /// where a year's representative value is its maximum.
    pub fn year_max(&self, table: &str, year: i32, entity: &str) -> Result<f64, StoreError> {
        let from = year_start(year);
        let to = year_start(year + 1);
        self.table(table)?
            .series
            .get(entity)
            .and_then(|s| {
                s.range(from..to)
                    .map(|(_, v)| *v)
                    .fold(None, |acc: Option<f64>, v| {
                        Some(acc.map_or(v, |a| a.max(v)))
                    })
            })
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                entity: entity.to_string(),
                timestamp: from,
            })
    }

    /// Assert that an annually-stepped table has a January-1 entry for every
    /// year in `[from_year, to_year]`, for every entity that appears in the
    /// table. A hole is a consistency violation; malformed data is never
    /// silently repaired.
    pub fn assert_annual_continuity(
        &self,
        table: &str,
        from_year: i32,
        to_year: i32,
    ) -> Result<(), StoreError> {
        let t = self.table(table)?;
        for (entity, series) in &t.series {
            for year in from_year..=to_year {
                if !series.contains_key(&year_start(year)) {
                    return Err(StoreError::ConsistencyViolation(format!(
                        "table '{}' entity '{}' has no value for year {}",
                        table, entity, year
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table(kind: TableKind) -> PropertyStore {
        let mut store = PropertyStore::new("test");
        store.register_table("t", kind);
        store
    }

    #[test]
    fn test_get_missing_pair_is_not_found() {
        let store = store_with_table(TableKind::Endogenous);
        let err = store.get("t", year_start(2000), "X").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_table() {
        let store = store_with_table(TableKind::Endogenous);
        let err = store.get("nope", year_start(2000), "X").unwrap_err();
        assert_eq!(err, StoreError::UnknownTable("nope".to_string()));
    }

    #[test]
    fn test_set_overwrites_existing_pair() {
        let mut store = store_with_table(TableKind::Endogenous);
        store.set("t", year_start(2000), "X", 1.0).unwrap();
        store.set("t", year_start(2000), "X", 2.0).unwrap();
        assert_eq!(store.get("t", year_start(2000), "X").unwrap(), 2.0);
    }

    #[test]
    fn test_exogenous_table_rejects_simulation_writes() {
        let mut store = store_with_table(TableKind::Exogenous);
        let err = store.set("t", year_start(2000), "X", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation(_)));

        // The load path (host-side) still works.
        store.load("t", year_start(2000), "X", 1.0).unwrap();
        assert_eq!(store.get("t", year_start(2000), "X").unwrap(), 1.0);
    }

    #[test]
    fn test_as_of_lookup_carries_last_value_forward() {
        let mut store = store_with_table(TableKind::Endogenous);
        store.set("t", year_start(2000), "X", 10.0).unwrap();
        store.set("t", year_start(2005), "X", 20.0).unwrap();

        assert_eq!(
            store
                .get_latest_at_or_before("t", year_start(2003), "X")
                .unwrap(),
            10.0
        );
        assert_eq!(
            store
                .get_latest_at_or_before("t", year_start(2005), "X")
                .unwrap(),
            20.0
        );
        assert_eq!(
            store
                .get_latest_at_or_before("t", year_start(2030), "X")
                .unwrap(),
            20.0
        );

        let err = store
            .get_latest_at_or_before("t", year_start(1999), "X")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_set_range_length_mismatch() {
        let mut store = store_with_table(TableKind::Endogenous);
        let err = store
            .set_range(
                "t",
                year_start(2000),
                &["A".to_string(), "B".to_string()],
                &[1.0],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation(_)));
    }

    #[test]
    fn test_set_range_writes_all_entities() {
        let mut store = store_with_table(TableKind::Endogenous);
        store
            .set_range(
                "t",
                year_start(2001),
                &["A".to_string(), "B".to_string()],
                &[1.5, 2.5],
            )
            .unwrap();
        assert_eq!(store.get("t", year_start(2001), "A").unwrap(), 1.5);
        assert_eq!(store.get("t", year_start(2001), "B").unwrap(), 2.5);
    }

    #[test]
    fn test_year_max_over_seasonal_entries() {
        let mut store = store_with_table(TableKind::Exogenous);
        let spring = NaiveDate::from_ymd_opt(2000, 4, 1).unwrap();
        let summer = NaiveDate::from_ymd_opt(2000, 7, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2001, 7, 1).unwrap();
        store.load("t", spring, "NL", 14.2).unwrap();
        store.load("t", summer, "NL", 24.8).unwrap();
        store.load("t", next, "NL", 30.0).unwrap();

        assert_eq!(store.year_max("t", 2000, "NL").unwrap(), 24.8);
    }

    #[test]
    fn test_write_audit_counts_duplicates() {
        let mut store = store_with_table(TableKind::Endogenous);
        store.set("t", year_start(2000), "X", 1.0).unwrap();

        store.begin_write_audit();
        store.set("t", year_start(2001), "X", 2.0).unwrap();
        store.set("t", year_start(2001), "Y", 3.0).unwrap();
        assert!(store.audited_duplicate_writes().is_empty());

        store.set("t", year_start(2001), "X", 4.0).unwrap();
        assert_eq!(
            store.audited_duplicate_writes(),
            vec![("t".to_string(), year_start(2001), "X".to_string())]
        );

        // Restarting the audit clears the counts.
        store.begin_write_audit();
        assert!(store.audited_duplicate_writes().is_empty());
    }

    #[test]
    fn test_annual_continuity_detects_gap() {
        let mut store = store_with_table(TableKind::Endogenous);
        store.set("t", year_start(2000), "X", 1.0).unwrap();
        store.set("t", year_start(2001), "X", 1.0).unwrap();
        store.set("t", year_start(2003), "X", 1.0).unwrap(); // 2002 missing

        assert!(store.assert_annual_continuity("t", 2000, 2001).is_ok());
        let err = store.assert_annual_continuity("t", 2000, 2003).unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation(_)));
    }
}
