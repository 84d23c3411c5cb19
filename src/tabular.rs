//! Parquet codec for bronze and silver tables.
//!
//! Each tier blob is a single-file Parquet document. Column kinds map onto
//! Arrow types as follows:
//!
//! | [`ColumnKind`] | Written as | Accepted on read |
//! |----------------|------------|------------------|
//! | `Text`         | `Utf8`     | `Utf8`, `LargeUtf8` |
//! | `Count`        | `Int64`    | any signed or unsigned integer |
//! | `Numeric`      | `Float64`  | `Float16`, `Float32`, `Float64` |
//!
//! Any other Arrow type fails with [`PipelineError::Decode`].

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use medallion_core::table::{Column, ColumnKind, Table, Value};
use medallion_core::{PipelineError, Result};

fn arrow_type(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Text => DataType::Utf8,
        ColumnKind::Numeric => DataType::Float64,
        ColumnKind::Count => DataType::Int64,
    }
}

fn column_kind(data_type: &DataType) -> Option<ColumnKind> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnKind::Text),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(ColumnKind::Count),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(ColumnKind::Numeric),
        _ => None,
    }
}

fn table_schema(table: &Table) -> SchemaRef {
    Arc::new(Schema::new(
        table
            .columns()
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.kind), true))
            .collect::<Vec<_>>(),
    ))
}

fn build_array(table: &Table, index: usize, kind: ColumnKind) -> ArrayRef {
    let cells = table.rows().iter().map(|row| &row[index]);
    match kind {
        ColumnKind::Text => Arc::new(StringArray::from(
            cells
                .map(|v| match v {
                    Value::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Numeric => Arc::new(Float64Array::from(
            cells
                .map(|v| match v {
                    Value::Numeric(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Count => Arc::new(Int64Array::from(
            cells
                .map(|v| match v {
                    Value::Count(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
    }
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Serialize a table as a Parquet document destined for blob `name`.
pub fn encode_table(name: &str, table: &Table) -> Result<Vec<u8>> {
    let schema = table_schema(table);
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| build_array(table, i, c.kind))
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| PipelineError::storage(name, format!("record batch build failed: {e}")))?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))
        .map_err(|e| PipelineError::storage(name, format!("parquet writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| PipelineError::storage(name, format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| PipelineError::storage(name, format!("parquet close failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Decode a Parquet document into a [`Table`]. `name` is used in errors only.
pub fn decode_table(name: &str, bytes: &[u8]) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))
        .map_err(|e| PipelineError::decode(name, format!("parquet reader init failed: {e}")))?;

    let schema = builder.schema().clone();
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let kind = column_kind(field.data_type()).ok_or_else(|| {
            PipelineError::decode(
                name,
                format!(
                    "column '{}' has unsupported type {}",
                    field.name(),
                    field.data_type()
                ),
            )
        })?;
        columns.push(Column::new(field.name().clone(), kind));
    }

    let reader = builder
        .build()
        .map_err(|e| PipelineError::decode(name, format!("parquet reader build failed: {e}")))?;

    let mut table = Table::new(columns.clone());
    for batch in reader {
        let batch =
            batch.map_err(|e| PipelineError::decode(name, format!("parquet read failed: {e}")))?;
        let arrays = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cast(batch.column(i), &arrow_type(c.kind)).map_err(|e| {
                    PipelineError::decode(name, format!("column '{}': {e}", c.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let values = columns
                .iter()
                .zip(&arrays)
                .map(|(c, array)| cell(array.as_ref(), c.kind, row))
                .collect();
            table.push_row(values)?;
        }
    }
    Ok(table)
}

fn cell(array: &dyn Array, kind: ColumnKind, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    let any = array.as_any();
    match kind {
        ColumnKind::Text => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::Text(a.value(row).to_string())),
        ColumnKind::Numeric => any
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Numeric(a.value(row))),
        ColumnKind::Count => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Count(a.value(row))),
    }
    .unwrap_or(Value::Null)
}
