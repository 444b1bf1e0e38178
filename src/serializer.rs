//! Serialization of merged rows to an Avro object container.
//!
//! Each merged row becomes one record. Key columns are written as they are, with `date` as
//! `YYYY-MM-DD 00:00:00` text and `time` as an integer. Quantities are written as floating
//! point. Undefined and NaN values are omitted, which requires the field to be nullable.

use crate::error::PipelineError;
use crate::merge::{MergedRow, OutputColumn, UnifiedTable};
use crate::metrics;
use crate::schema::{FieldKind, FieldLayout, FieldSpec, OutputSchema};
use crate::types::keys::{OUTPUT_DATE_FORMAT, TIME};
use crate::types::{Cell, RowKey};

use apache_avro::types::Value;
use apache_avro::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A value taken from a merged row, before it is coerced to its field type.
#[derive(Clone, Debug, PartialEq)]
enum Datum {
    Omitted,
    Text(String),
    Integer(f64),
    Real(f64),
}

fn type_error(field: &FieldSpec, reason: String) -> PipelineError {
    PipelineError::SerializationType {
        field: field.name.clone(),
        reason,
    }
}

/// Returns the integer value of `value`, truncating towards zero.
fn truncate(field: &FieldSpec, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() {
        Ok(value.trunc())
    } else {
        Err(type_error(field, format!("value {} is not an integer", value)))
    }
}

/// Coerce a datum to the Avro value of its field.
fn coerce(field: &FieldSpec, datum: Datum) -> Result<Value, PipelineError> {
    let value = match (datum, field.kind) {
        (Datum::Omitted, _) => {
            return match field.layout {
                FieldLayout::Nullable { null, .. } => Ok(Value::Union(null, Box::new(Value::Null))),
                FieldLayout::Plain => Err(type_error(
                    field,
                    "value is undefined and the field is not nullable".to_string(),
                )),
            }
        }
        (Datum::Text(text), FieldKind::String) => Value::String(text),
        (Datum::Integer(value), FieldKind::Int) => {
            let value = truncate(field, value)?;
            if value < i32::MIN as f64 || value > i32::MAX as f64 {
                return Err(type_error(field, format!("value {} is out of range for int", value)));
            }
            Value::Int(value as i32)
        }
        (Datum::Integer(value), FieldKind::Long) => {
            let value = truncate(field, value)?;
            // i64::MAX is not representable as f64, its nearest value is 2^63.
            if value < i64::MIN as f64 || value >= i64::MAX as f64 {
                return Err(type_error(field, format!("value {} is out of range for long", value)));
            }
            Value::Long(value as i64)
        }
        (Datum::Integer(value), FieldKind::Float) => Value::Float(truncate(field, value)? as f32),
        (Datum::Integer(value), FieldKind::Double) => Value::Double(truncate(field, value)?),
        (Datum::Real(value), FieldKind::Float) => Value::Float(value as f32),
        (Datum::Real(value), FieldKind::Double) => Value::Double(value),
        (datum, kind) => {
            return Err(type_error(
                field,
                format!("{:?} cannot be written as {}", datum, kind),
            ))
        }
    };
    Ok(match field.layout {
        FieldLayout::Nullable { value: branch, .. } => Value::Union(branch, Box::new(value)),
        FieldLayout::Plain => value,
    })
}

/// Returns the datum of an output column in a row.
fn datum<K: RowKey>(row: &MergedRow<K>, column: &OutputColumn) -> Result<Datum, PipelineError> {
    let datum = match column {
        OutputColumn::Key(name) => match row.key.cell(name) {
            Some(Cell::Date(date)) => {
                let text = date.format(OUTPUT_DATE_FORMAT).map_err(|error| {
                    PipelineError::SerializationType {
                        field: name.to_string(),
                        reason: error.to_string(),
                    }
                })?;
                Datum::Text(text)
            }
            Some(Cell::Number(value)) if *name == TIME => Datum::Integer(value),
            Some(Cell::Number(value)) => Datum::Real(value),
            None => Datum::Omitted,
        },
        OutputColumn::Quantity { position, .. } => match row.values.get(*position) {
            Some(Some(value)) if !value.is_nan() => Datum::Real(*value),
            _ => Datum::Omitted,
        },
    };
    Ok(datum)
}

/// Writes merged rows as records of an output schema.
pub struct RecordSerializer<'a, W: Write> {
    schema: &'a OutputSchema,
    /// For each schema field, the output column that fills it
    sources: Vec<Option<OutputColumn>>,
    writer: Writer<'a, W>,
    rows: usize,
}

impl<'a, W: Write> RecordSerializer<'a, W> {
    /// Return a new RecordSerializer writing to `writer`.
    ///
    /// Fails if an output column has no field in the schema.
    ///
    /// # Arguments
    ///
    /// * `schema`: Schema of the output records
    /// * `columns`: Output columns of the merged table
    /// * `writer`: Destination of the object container
    pub fn new(
        schema: &'a OutputSchema,
        columns: &[OutputColumn],
        writer: W,
    ) -> Result<Self, PipelineError> {
        if let Some(column) = columns
            .iter()
            .find(|column| schema.field(column.field()).is_none())
        {
            return Err(PipelineError::SerializationType {
                field: column.field().to_string(),
                reason: "field is not declared by the output schema".to_string(),
            });
        }
        let sources = schema
            .fields()
            .iter()
            .map(|field| {
                columns
                    .iter()
                    .find(|column| column.field() == field.name)
                    .cloned()
            })
            .collect();
        Ok(RecordSerializer {
            schema,
            sources,
            writer: Writer::new(schema.schema(), writer),
            rows: 0,
        })
    }

    /// Append one row to the output.
    pub fn append<K: RowKey>(&mut self, row: &MergedRow<K>) -> Result<(), PipelineError> {
        let mut fields = Vec::with_capacity(self.sources.len());
        for (field, source) in self.schema.fields().iter().zip(&self.sources) {
            let datum = match source {
                Some(column) => datum(row, column)?,
                None => Datum::Omitted,
            };
            fields.push((field.name.clone(), coerce(field, datum)?));
        }
        self.writer.append(Value::Record(fields))?;
        self.rows += 1;
        Ok(())
    }

    /// Returns the number of rows appended.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush the container and return the underlying writer.
    pub fn finish(self) -> Result<W, PipelineError> {
        Ok(self.writer.into_inner()?)
    }
}

/// Write a merged table as records of an output schema.
///
/// Returns the number of rows written and the underlying writer.
pub fn write_table<K: RowKey, W: Write>(
    table: &UnifiedTable<K>,
    schema: &OutputSchema,
    writer: W,
) -> Result<(usize, W), PipelineError> {
    let mut serializer = RecordSerializer::new(schema, &table.output_columns(), writer)?;
    for row in table.rows() {
        serializer.append(row)?;
    }
    let rows = serializer.rows();
    metrics::ROWS_WRITTEN.inc_by(rows as u64);
    Ok((rows, serializer.finish()?))
}

/// Write a merged table to a file, creating its parent directories.
///
/// The file is removed if writing fails.
pub fn write_file<K: RowKey>(
    table: &UnifiedTable<K>,
    schema: &OutputSchema,
    path: &Path,
) -> Result<usize, PipelineError> {
    let io_error = |source| PipelineError::OutputIo {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = File::create(path).map_err(io_error)?;
    let result = write_table(table, schema, BufWriter::new(file)).and_then(|(rows, writer)| {
        writer
            .into_inner()
            .map_err(|error| io_error(error.into_error()))?
            .sync_all()
            .map_err(io_error)?;
        Ok(rows)
    });
    if result.is_err() {
        let _ = std::fs::remove_file(path);
    }
    result
}
