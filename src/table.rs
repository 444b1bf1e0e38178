//! Per-source tables of reduced values.

use std::fmt;

use crate::error::PipelineError;
use crate::types::{LocationKey, RowKey, TimeStepKey};

use hashbrown::HashSet;
use ndarray::{ArrayView1, ArrayViewD, ErrorKind, Ix1, Ix2, ShapeError};
use time::{Date, Duration};
use tracing::{event, Level};

/// Largest time offset, in days, accepted when deriving dates. Beyond the range of [Date].
const MAX_OFFSET_DAYS: f64 = 1.0e7;

/// Identity of a quantity column: the source it came from and its variable name.
///
/// Qualifying columns by source keeps two sources with the same variable name apart.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ColumnId {
    /// Position of the source in the input list
    pub source: usize,
    /// Name of the quantity variable
    pub name: String,
}

impl ColumnId {
    pub fn new(source: usize, name: &str) -> Self {
        ColumnId {
            source,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.source)
    }
}

/// A reduced value and the coordinates that locate it.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<K> {
    pub key: K,
    pub value: f64,
}

impl<K> Record<K> {
    pub fn new(key: K, value: f64) -> Self {
        Record { key, value }
    }
}

/// The records of one source, in the order they were built.
#[derive(Clone, Debug)]
pub struct Table<K> {
    column: ColumnId,
    records: Vec<Record<K>>,
}

impl<K: RowKey> Table<K> {
    /// Returns a table from its records.
    ///
    /// Fails with [PipelineError::DuplicateKey] if two records share a key.
    pub fn from_records(column: ColumnId, records: Vec<Record<K>>) -> Result<Self, PipelineError> {
        {
            let mut seen = HashSet::with_capacity(records.len());
            for record in &records {
                if !seen.insert(&record.key) {
                    return Err(PipelineError::DuplicateKey {
                        key: record.key.describe(),
                        source_index: column.source,
                    });
                }
            }
        }
        Ok(Table { column, records })
    }

    /// Returns the column this table contributes.
    pub fn column(&self) -> &ColumnId {
        &self.column
    }

    /// Returns the records of this table.
    pub fn records(&self) -> &[Record<K>] {
        &self.records
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split the table into its column and records.
    pub fn into_parts(self) -> (ColumnId, Vec<Record<K>>) {
        (self.column, self.records)
    }
}

/// Returns the value to store for a reduced cell, or `None` if the cell is not materialized.
///
/// Zero marks an empty cell. Non-finite sums cannot be written and are dropped with a warning.
fn materialize(value: f64, column: &ColumnId) -> Option<f64> {
    if value == 0.0 {
        None
    } else if !value.is_finite() {
        event!(Level::WARN, column = %column, value, "dropping non-finite reduced value");
        None
    } else {
        Some(value)
    }
}

fn incompatible_shape() -> PipelineError {
    PipelineError::ShapeInvalid(ShapeError::from_kind(ErrorKind::IncompatibleShape))
}

/// Build a per-location table from a `latitude × longitude` reduced array.
///
/// Cells are visited in row-major order and zero cells are skipped.
///
/// # Arguments
///
/// * `column`: Column the table contributes
/// * `reduced`: Quantity summed over time
/// * `latitude`: Latitude axis, indexed by the first axis of `reduced`
/// * `longitude`: Longitude axis, indexed by the second axis of `reduced`
pub fn spatial_table(
    column: ColumnId,
    reduced: ArrayViewD<f64>,
    latitude: ArrayView1<f64>,
    longitude: ArrayView1<f64>,
) -> Result<Table<LocationKey>, PipelineError> {
    let reduced = reduced.into_dimensionality::<Ix2>()?;
    if reduced.dim() != (latitude.len(), longitude.len()) {
        return Err(incompatible_shape());
    }
    let records = reduced
        .indexed_iter()
        .filter_map(|((i, j), value)| {
            materialize(*value, &column)
                .map(|value| Record::new(LocationKey::new(latitude[i], longitude[j]), value))
        })
        .collect();
    Table::from_records(column, records)
}

/// Returns `start + trunc(offset)` days, or `None` if the offset cannot be applied.
pub fn offset_date(start: Date, offset: f64) -> Option<Date> {
    let days = offset.trunc();
    if !days.is_finite() || days.abs() > MAX_OFFSET_DAYS {
        return None;
    }
    start.checked_add(Duration::days(days as i64))
}

/// Build a per-time-step table from a reduced array over time.
///
/// Each record is keyed by the raw time offset and the date it denotes relative to
/// `start_date`. Zero cells are skipped.
///
/// # Arguments
///
/// * `column`: Column the table contributes
/// * `reduced`: Quantity summed over space
/// * `time`: Time axis holding day offsets from `start_date`
/// * `start_date`: Date of offset zero
pub fn temporal_table(
    column: ColumnId,
    reduced: ArrayViewD<f64>,
    time: ArrayView1<f64>,
    start_date: Date,
) -> Result<Table<TimeStepKey>, PipelineError> {
    let reduced = reduced.into_dimensionality::<Ix1>()?;
    if reduced.len() != time.len() {
        return Err(incompatible_shape());
    }
    let mut records = Vec::new();
    for (i, value) in reduced.indexed_iter() {
        let Some(value) = materialize(*value, &column) else {
            continue;
        };
        let offset = time[i];
        let date = offset_date(start_date, offset).ok_or_else(|| {
            PipelineError::source_read(
                column.to_string(),
                format!("time offset {} cannot be applied to {}", offset, start_date),
            )
        })?;
        records.push(Record::new(TimeStepKey::new(date, offset), value));
    }
    Table::from_records(column, records)
}
