//! Row-oriented in-memory table with an explicit column schema.
//!
//! Bronze and silver blobs decode into a [`Table`]. Every column carries a
//! [`ColumnKind`] so downstream checks (e.g. the empty-string check that only
//! applies to text) can dispatch on the schema instead of inspecting values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::TierRecord;

pub const FILE_COLUMN: &str = "file";
pub const CONTENT_COLUMN: &str = "content";
pub const WORD_COUNT_COLUMN: &str = "word_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Numeric,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single cell. `Null` is valid in a column of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Numeric(f64),
    Count(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Value::Null, _)
                | (Value::Text(_), ColumnKind::Text)
                | (Value::Numeric(_), ColumnKind::Numeric)
                | (Value::Count(_), ColumnKind::Count)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a bronze/silver table from records. `word_count` is included
    /// as a column only when every record carries one.
    pub fn from_records(records: &[TierRecord]) -> Self {
        let with_counts = !records.is_empty() && records.iter().all(|r| r.word_count.is_some());
        let mut columns = vec![
            Column::new(FILE_COLUMN, ColumnKind::Text),
            Column::new(CONTENT_COLUMN, ColumnKind::Text),
        ];
        if with_counts {
            columns.push(Column::new(WORD_COUNT_COLUMN, ColumnKind::Count));
        }
        let rows = records
            .iter()
            .map(|r| {
                let mut row = vec![
                    Value::Text(r.source_file.clone()),
                    Value::Text(r.content.clone()),
                ];
                if with_counts {
                    row.push(r.word_count.map(Value::Count).unwrap_or(Value::Null));
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append a row, checking arity and per-column kinds.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Schema {
                column: String::new(),
                message: format!(
                    "row has {} values but table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        for (value, column) in row.iter().zip(&self.columns) {
            if !value.fits(column.kind) {
                return Err(PipelineError::Schema {
                    column: column.name.clone(),
                    message: format!("value {:?} does not fit {:?}", value, column.kind),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append (or replace) a column computed from each existing row.
    pub fn with_column<F>(mut self, column: Column, mut derive: F) -> Result<Self>
    where
        F: FnMut(&[Value], &[Column]) -> Value,
    {
        let existing = self.column_index(&column.name);
        let mut derived = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let value = derive(row, &self.columns);
            if !value.fits(column.kind) {
                return Err(PipelineError::Schema {
                    column: column.name.clone(),
                    message: format!("derived value {:?} does not fit {:?}", value, column.kind),
                });
            }
            derived.push(value);
        }
        match existing {
            Some(idx) => {
                self.columns[idx] = column;
                for (row, value) in self.rows.iter_mut().zip(derived) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(column);
                for (row, value) in self.rows.iter_mut().zip(derived) {
                    row.push(value);
                }
            }
        }
        Ok(self)
    }

    /// Concatenate tables, unioning their columns by name in first-seen
    /// order. Missing cells are filled with `Null`.
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let mut columns: Vec<Column> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for table in tables {
            for column in &table.columns {
                match positions.get(&column.name) {
                    Some(&idx) if columns[idx].kind != column.kind => {
                        return Err(PipelineError::Schema {
                            column: column.name.clone(),
                            message: format!(
                                "kind {:?} conflicts with {:?}",
                                column.kind, columns[idx].kind
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        positions.insert(column.name.clone(), columns.len());
                        columns.push(column.clone());
                    }
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(Table::num_rows).sum());
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|c| positions[&c.name])
                .collect();
            for row in &table.rows {
                let mut out = vec![Value::Null; columns.len()];
                for (value, &target) in row.iter().zip(&mapping) {
                    out[target] = value.clone();
                }
                rows.push(out);
            }
        }

        Ok(Table { columns, rows })
    }

    /// Read the table back as tier records. Requires `file` and `content`
    /// text columns; `word_count` is picked up when present.
    pub fn to_records(&self) -> Result<Vec<TierRecord>> {
        let file_idx = self.required_column(FILE_COLUMN, ColumnKind::Text)?;
        let content_idx = self.required_column(CONTENT_COLUMN, ColumnKind::Text)?;
        let count_idx = self
            .column_index(WORD_COUNT_COLUMN)
            .filter(|&i| self.columns[i].kind == ColumnKind::Count);

        Ok(self
            .rows
            .iter()
            .map(|row| TierRecord {
                source_file: row[file_idx].as_text().unwrap_or("unknown").to_string(),
                content: row[content_idx].as_text().unwrap_or_default().to_string(),
                word_count: count_idx.and_then(|i| match row[i] {
                    Value::Count(n) => Some(n),
                    _ => None,
                }),
            })
            .collect())
    }

    fn required_column(&self, name: &str, kind: ColumnKind) -> Result<usize> {
        match self.column_index(name) {
            Some(idx) if self.columns[idx].kind == kind => Ok(idx),
            Some(idx) => Err(PipelineError::Schema {
                column: name.to_string(),
                message: format!("expected {:?}, found {:?}", kind, self.columns[idx].kind),
            }),
            None => Err(PipelineError::Schema {
                column: name.to_string(),
                message: "column missing".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, content: &str) -> TierRecord {
        TierRecord {
            source_file: file.to_string(),
            content: content.to_string(),
            word_count: None,
        }
    }

    #[test]
    fn test_from_records_bronze_shape() {
        let table = Table::from_records(&[record("raw/a.txt", "hello")]);
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["file", "content"]);
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn test_push_row_rejects_wrong_kind() {
        let mut table = Table::new(vec![Column::new("n", ColumnKind::Count)]);
        assert!(table.push_row(vec![Value::Count(1)]).is_ok());
        assert!(table.push_row(vec![Value::Null]).is_ok());
        assert!(table.push_row(vec![Value::Text("x".into())]).is_err());
        assert!(table.push_row(vec![]).is_err());
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let table = Table::from_records(&[record("raw/a.txt", "one two")]);
        let table = table
            .with_column(Column::new("word_count", ColumnKind::Count), |_, _| {
                Value::Count(2)
            })
            .unwrap();
        assert_eq!(table.columns().len(), 3);
        let table = table
            .with_column(Column::new("word_count", ColumnKind::Count), |_, _| {
                Value::Count(5)
            })
            .unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.rows()[0][2], Value::Count(5));
    }

    #[test]
    fn test_concat_unions_columns() {
        let bronze = Table::from_records(&[record("raw/a.txt", "a")]);
        let silver = Table::from_records(&[TierRecord {
            word_count: Some(1),
            ..record("raw/b.txt", "b")
        }]);
        let combined = Table::concat(&[bronze, silver]).unwrap();
        assert_eq!(combined.columns().len(), 3);
        assert_eq!(combined.num_rows(), 2);
        assert_eq!(combined.rows()[0][2], Value::Null);
        assert_eq!(combined.rows()[1][2], Value::Count(1));
    }

    #[test]
    fn test_concat_rejects_kind_conflict() {
        let mut a = Table::new(vec![Column::new("x", ColumnKind::Text)]);
        a.push_row(vec![Value::Text("1".into())]).unwrap();
        let mut b = Table::new(vec![Column::new("x", ColumnKind::Count)]);
        b.push_row(vec![Value::Count(1)]).unwrap();
        assert!(Table::concat(&[a, b]).is_err());
    }

    #[test]
    fn test_concat_empty() {
        let combined = Table::concat(&[]).unwrap();
        assert!(combined.is_empty());
        assert!(combined.columns().is_empty());
    }

    #[test]
    fn test_to_records_requires_content() {
        let table = Table::new(vec![Column::new("file", ColumnKind::Text)]);
        assert!(table.to_records().is_err());
    }
}
