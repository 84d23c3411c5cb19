//! Full-batch data quality audit.
//!
//! [`run_quality_checks`] computes, in a fixed order, non-null counts, null
//! counts, the duplicate-row count, and empty-string counts for text columns.
//! The report holds plain `u64` counters so it serializes to portable JSON
//! numbers, and per-column maps are ordered by column name.
//!
//! # Example
//!
//! ```rust
//! use medallion_core::models::TierRecord;
//! use medallion_core::quality::run_quality_checks;
//! use medallion_core::table::Table;
//!
//! let rec = TierRecord { source_file: "raw/a.txt".into(), content: " ".into(), word_count: None };
//! let report = run_quality_checks(&Table::from_records(&[rec.clone(), rec]));
//! assert_eq!(report.duplicate_rows, 1);
//! assert_eq!(report.total_empty_strings, 2);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::table::{ColumnKind, Table, Value};

/// Result of a quality audit. Field order matches the order the checks run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_non_nulls: u64,
    pub non_nulls_by_column: BTreeMap<String, u64>,
    pub total_nulls: u64,
    pub nulls_by_column: BTreeMap<String, u64>,
    pub duplicate_rows: u64,
    pub total_empty_strings: u64,
    pub empty_strings_by_column: BTreeMap<String, u64>,
}

impl QualityReport {
    /// True when no checks ran (the audited batch had no rows).
    pub fn is_empty(&self) -> bool {
        *self == QualityReport::default()
    }
}

/// Audit a unioned batch. An empty batch yields an empty report.
pub fn run_quality_checks(table: &Table) -> QualityReport {
    if table.is_empty() {
        return QualityReport::default();
    }

    let mut report = QualityReport::default();
    check_nulls(table, &mut report);
    report.duplicate_rows = count_duplicates(table);
    check_empty_strings(table, &mut report);
    report
}

fn check_nulls(table: &Table, report: &mut QualityReport) {
    for (idx, column) in table.columns().iter().enumerate() {
        let nulls = table.rows().iter().filter(|row| row[idx].is_null()).count() as u64;
        let non_nulls = table.num_rows() as u64 - nulls;
        report
            .non_nulls_by_column
            .insert(column.name.clone(), non_nulls);
        report.nulls_by_column.insert(column.name.clone(), nulls);
        report.total_non_nulls += non_nulls;
        report.total_nulls += nulls;
    }
}

/// Hashable projection of a cell. Floats compare by bit pattern so that two
/// byte-identical rows always match.
#[derive(PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Text(&'a str),
    Numeric(u64),
    Count(i64),
}

fn cell_key(value: &Value) -> CellKey<'_> {
    match value {
        Value::Null => CellKey::Null,
        Value::Text(s) => CellKey::Text(s),
        Value::Numeric(f) => CellKey::Numeric(f.to_bits()),
        Value::Count(n) => CellKey::Count(*n),
    }
}

/// Rows that exactly match at least one earlier row.
fn count_duplicates(table: &Table) -> u64 {
    let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(table.num_rows());
    let mut duplicates = 0;
    for row in table.rows() {
        let key: Vec<CellKey<'_>> = row.iter().map(cell_key).collect();
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    duplicates
}

fn check_empty_strings(table: &Table, report: &mut QualityReport) {
    for (idx, column) in table.columns().iter().enumerate() {
        if column.kind != ColumnKind::Text {
            continue;
        }
        let empty = table
            .rows()
            .iter()
            .filter(|row| matches!(&row[idx], Value::Text(s) if s.trim().is_empty()))
            .count() as u64;
        report
            .empty_strings_by_column
            .insert(column.name.clone(), empty);
        report.total_empty_strings += empty;
    }
}
