//! Outer join of per-source tables.
//!
//! Tables are joined left to right on their row key. The key set of the result is the union of
//! the key sets of every table, in order of first appearance. A source that has no record for a
//! key leaves its column undefined in that row.

use crate::error::{self, PipelineError};
use crate::metrics;
use crate::models::FailurePolicy;
use crate::pipeline::Stage;
use crate::table::{ColumnId, Table};
use crate::types::RowKey;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use tracing::{event, Level};

/// A row of the unified table: a key and one optional value per column.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedRow<K> {
    pub key: K,
    /// Values indexed like [UnifiedTable::columns]. `None` if the source had no record.
    pub values: Vec<Option<f64>>,
}

/// A column of the output record, in output order.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputColumn {
    /// A key column
    Key(&'static str),
    /// A quantity column
    Quantity {
        /// Index into [UnifiedTable::columns]
        position: usize,
        /// Output field name
        field: String,
    },
}

impl OutputColumn {
    /// Returns the output field name of the column.
    pub fn field(&self) -> &str {
        match self {
            OutputColumn::Key(name) => name,
            OutputColumn::Quantity { field, .. } => field,
        }
    }
}

/// The result of joining all tables.
#[derive(Clone, Debug)]
pub struct UnifiedTable<K> {
    columns: Vec<ColumnId>,
    rows: Vec<MergedRow<K>>,
    index: HashMap<K, usize>,
}

impl<K: RowKey> Default for UnifiedTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RowKey> UnifiedTable<K> {
    /// Return an empty UnifiedTable with no columns.
    pub fn new() -> Self {
        UnifiedTable {
            columns: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Outer join a table onto this one, adding its column.
    ///
    /// Rows for keys not seen before are appended after the existing rows, in the table's
    /// record order.
    pub fn outer_join(&mut self, table: Table<K>) {
        let (column, records) = table.into_parts();
        self.columns.push(column);
        let width = self.columns.len();
        let position = width - 1;
        for row in &mut self.rows {
            row.values.push(None);
        }
        for record in records {
            match self.index.entry(record.key) {
                Entry::Occupied(entry) => {
                    self.rows[*entry.get()].values[position] = Some(record.value);
                }
                Entry::Vacant(entry) => {
                    let mut values = vec![None; width];
                    values[position] = Some(record.value);
                    self.rows.push(MergedRow {
                        key: entry.key().clone(),
                        values,
                    });
                    entry.insert(self.rows.len() - 1);
                }
            }
        }
    }

    /// Returns the quantity columns, in join order.
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Returns the rows, in order of first appearance of their key.
    pub fn rows(&self) -> &[MergedRow<K>] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value of a column at a key, or `None` if it is undefined.
    pub fn value(&self, key: &K, column: &ColumnId) -> Option<f64> {
        let row = &self.rows[*self.index.get(key)?];
        let position = self.columns.iter().position(|c| c == column)?;
        row.values[position]
    }

    /// Returns the output field name of each column.
    ///
    /// A variable name shared by several sources, or by a key column, is suffixed with the
    /// 1-based source position.
    pub fn field_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                let shared = self
                    .columns
                    .iter()
                    .filter(|other| other.name == column.name)
                    .count()
                    > 1
                    || K::COLUMNS.contains(&column.name.as_str());
                if shared {
                    format!("{}_{}", column.name, column.source + 1)
                } else {
                    column.name.clone()
                }
            })
            .collect()
    }

    /// Returns the columns of the output record.
    ///
    /// The first quantity comes first, followed by the key columns and the remaining
    /// quantities.
    pub fn output_columns(&self) -> Vec<OutputColumn> {
        let mut quantities = self
            .field_names()
            .into_iter()
            .enumerate()
            .map(|(position, field)| OutputColumn::Quantity { position, field });
        let mut columns = Vec::with_capacity(self.columns.len() + K::COLUMNS.len());
        columns.extend(quantities.next());
        columns.extend(K::COLUMNS.iter().copied().map(OutputColumn::Key));
        columns.extend(quantities);
        columns
    }
}

/// A source that could not be tabulated.
#[derive(Debug)]
pub struct SourceFailure {
    /// Position of the source in the input list
    pub source_index: usize,
    pub error: PipelineError,
}

/// Outcome of a merge.
#[derive(Debug)]
pub struct MergeReport<K> {
    pub table: UnifiedTable<K>,
    /// Sources skipped under [FailurePolicy::Skip]
    pub failures: Vec<SourceFailure>,
}

/// Merge a sequence of per-source results.
///
/// Results are consumed lazily in order. Under [FailurePolicy::Abort] the first failure is
/// returned and the remaining results are never pulled. Under [FailurePolicy::Skip] failures
/// are collected in the report. Fails with [PipelineError::MergeKeyMismatch] if no table
/// remains to join.
///
/// # Arguments
///
/// * `results`: One result per source, in input order
/// * `policy`: What to do with a failed source
pub fn merge_results<K, I>(results: I, policy: FailurePolicy) -> Result<MergeReport<K>, PipelineError>
where
    K: RowKey,
    I: IntoIterator<Item = Result<Table<K>, PipelineError>>,
{
    let mut table = UnifiedTable::new();
    let mut failures = Vec::new();
    for (source_index, result) in results.into_iter().enumerate() {
        match result {
            Ok(source_table) => {
                metrics::SOURCES_PROCESSED.with_label_values(&["merged"]).inc();
                metrics::observe_stage(Stage::Merging, || table.outer_join(source_table));
            }
            Err(error) => {
                metrics::SOURCES_PROCESSED.with_label_values(&["failed"]).inc();
                if policy == FailurePolicy::Abort {
                    return Err(error);
                }
                event!(
                    Level::WARN,
                    source_index,
                    kind = %error.kind(),
                    causes = ?error::causes(&error),
                    "skipping source: {}",
                    error
                );
                failures.push(SourceFailure {
                    source_index,
                    error,
                });
            }
        }
    }
    if table.columns().is_empty() {
        return Err(PipelineError::MergeKeyMismatch {
            key: K::COLUMNS.join(", "),
        });
    }
    Ok(MergeReport { table, failures })
}

/// Merge tables that are all available, in order.
pub fn merge_tables<K: RowKey>(tables: Vec<Table<K>>) -> Result<UnifiedTable<K>, PipelineError> {
    merge_results(tables.into_iter().map(Ok), FailurePolicy::Abort).map(|report| report.table)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;
    use crate::table::Record;
    use crate::types::{LocationKey, TimeStepKey};
    use time::macros::date;

    fn location_table(source: usize, name: &str, records: &[(f64, f64, f64)]) -> Table<LocationKey> {
        let records = records
            .iter()
            .map(|(latitude, longitude, value)| {
                Record::new(LocationKey::new(*latitude, *longitude), *value)
            })
            .collect();
        Table::from_records(ColumnId::new(source, name), records).unwrap()
    }

    fn keys(table: &UnifiedTable<LocationKey>) -> Vec<LocationKey> {
        table.rows().iter().map(|row| row.key).collect()
    }

    #[test]
    fn two_files_scenario() {
        // A holds (1, 1) and (1, 2); B holds (1, 2) and (2, 2).
        let a = location_table(0, "a", &[(1.0, 1.0, 5.0), (1.0, 2.0, 3.0)]);
        let b = location_table(1, "b", &[(1.0, 2.0, 7.0), (2.0, 2.0, 1.0)]);
        let merged = merge_tables(vec![a, b]).unwrap();
        assert_eq!(
            vec![
                LocationKey::new(1.0, 1.0),
                LocationKey::new(1.0, 2.0),
                LocationKey::new(2.0, 2.0)
            ],
            keys(&merged)
        );
        assert_eq!(
            vec![
                vec![Some(5.0), None],
                vec![Some(3.0), Some(7.0)],
                vec![None, Some(1.0)]
            ],
            merged
                .rows()
                .iter()
                .map(|row| row.values.clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(vec!["a", "b"], merged.field_names());
    }

    #[test]
    fn key_set_is_union_in_any_order() {
        let tables = || {
            vec![
                location_table(0, "a", &[(1.0, 1.0, 1.0), (2.0, 2.0, 2.0)]),
                location_table(1, "b", &[(3.0, 3.0, 3.0)]),
                location_table(2, "c", &[(2.0, 2.0, 4.0), (4.0, 4.0, 5.0)]),
            ]
        };
        let forward = merge_tables(tables()).unwrap();
        let mut reversed = tables();
        reversed.reverse();
        let backward = merge_tables(reversed).unwrap();
        let mut forward_keys = keys(&forward);
        let mut backward_keys = keys(&backward);
        assert_eq!(4, forward_keys.len());
        let by_coordinates = |a: &LocationKey, b: &LocationKey| {
            (a.latitude, a.longitude)
                .partial_cmp(&(b.latitude, b.longitude))
                .unwrap()
        };
        forward_keys.sort_by(by_coordinates);
        backward_keys.sort_by(by_coordinates);
        assert_eq!(forward_keys, backward_keys);
    }

    #[test]
    fn values_are_preserved() {
        let tables = vec![
            location_table(0, "a", &[(1.0, 1.0, 1.5), (2.0, 2.0, -2.5)]),
            location_table(1, "b", &[(2.0, 2.0, 4.0)]),
        ];
        let expected: Vec<(ColumnId, LocationKey, f64)> = tables
            .iter()
            .flat_map(|table| {
                table
                    .records()
                    .iter()
                    .map(|record| (table.column().clone(), record.key, record.value))
                    .collect::<Vec<_>>()
            })
            .collect();
        let merged = merge_tables(tables).unwrap();
        for (column, key, value) in expected {
            assert_eq!(Some(value), merged.value(&key, &column));
        }
        assert_eq!(
            None,
            merged.value(&LocationKey::new(1.0, 1.0), &ColumnId::new(1, "b"))
        );
    }

    #[test]
    fn empty_table_keeps_its_column() {
        let tables = vec![
            location_table(0, "a", &[(1.0, 1.0, 1.0)]),
            location_table(1, "b", &[]),
        ];
        let merged = merge_tables(tables).unwrap();
        assert_eq!(2, merged.columns().len());
        assert_eq!(vec![Some(1.0), None], merged.rows()[0].values);
    }

    #[test]
    fn shared_names_are_qualified() {
        let tables = vec![
            location_table(0, "afp", &[(1.0, 1.0, 1.0)]),
            location_table(1, "precip", &[(1.0, 1.0, 2.0)]),
            location_table(2, "afp", &[(1.0, 1.0, 3.0)]),
        ];
        let merged = merge_tables(tables).unwrap();
        assert_eq!(vec!["afp_1", "precip", "afp_3"], merged.field_names());
        assert_eq!(vec![Some(1.0), Some(2.0), Some(3.0)], merged.rows()[0].values);
    }

    #[test]
    fn key_column_names_are_qualified() {
        let tables = vec![
            location_table(0, "afp", &[(1.0, 1.0, 1.0)]),
            location_table(1, "latitude", &[(1.0, 1.0, 2.0)]),
        ];
        let merged = merge_tables(tables).unwrap();
        assert_eq!(vec!["afp", "latitude_2"], merged.field_names());
        let schema = crate::schema::OutputSchema::derive("point", &merged.output_columns()).unwrap();
        assert_eq!(4, schema.fields().len());
    }

    #[test]
    fn output_columns_order() {
        let tables = vec![
            location_table(0, "a", &[(1.0, 1.0, 1.0)]),
            location_table(1, "b", &[(1.0, 1.0, 2.0)]),
        ];
        let merged = merge_tables(tables).unwrap();
        assert_eq!(
            vec![
                OutputColumn::Quantity {
                    position: 0,
                    field: "a".to_string()
                },
                OutputColumn::Key("latitude"),
                OutputColumn::Key("longitude"),
                OutputColumn::Quantity {
                    position: 1,
                    field: "b".to_string()
                },
            ],
            merged.output_columns()
        );
    }

    #[test]
    fn temporal_output_columns() {
        let key = TimeStepKey::new(date!(2020 - 01 - 06), 5.0);
        let table = Table::from_records(ColumnId::new(0, "afp"), vec![Record::new(key, 4.0)]).unwrap();
        let merged = merge_tables(vec![table]).unwrap();
        let fields: Vec<String> = merged
            .output_columns()
            .iter()
            .map(|column| column.field().to_string())
            .collect();
        assert_eq!(vec!["afp", "time", "date"], fields);
    }

    #[test]
    fn temporal_offsets_are_file_relative() {
        // The same offset from two start dates denotes two different days.
        let a = Table::from_records(
            ColumnId::new(0, "a"),
            vec![Record::new(TimeStepKey::new(date!(2020 - 01 - 06), 5.0), 1.0)],
        )
        .unwrap();
        let b = Table::from_records(
            ColumnId::new(1, "b"),
            vec![Record::new(TimeStepKey::new(date!(2021 - 01 - 06), 5.0), 2.0)],
        )
        .unwrap();
        let merged = merge_tables(vec![a, b]).unwrap();
        assert_eq!(2, merged.len());
    }

    #[test]
    fn abort_stops_at_first_failure() {
        let mut pulled = 0;
        let results = (0..3).map(|index| {
            pulled += 1;
            if index == 1 {
                Err(PipelineError::source_read("b.json", "unreadable"))
            } else {
                Ok(location_table(index, "a", &[(1.0, 1.0, 1.0)]))
            }
        });
        let error = merge_results(results, FailurePolicy::Abort).unwrap_err();
        assert_eq!("failed to read source b.json: unreadable", error.to_string());
        assert_eq!(2, pulled);
    }

    #[test]
    fn skip_continues_past_failure() {
        let results = vec![
            Ok(location_table(0, "a", &[(1.0, 1.0, 1.0)])),
            Err(PipelineError::source_read("b.json", "unreadable")),
            Ok(location_table(2, "c", &[(2.0, 2.0, 2.0)])),
        ];
        let report = merge_results(results, FailurePolicy::Skip).unwrap();
        assert_eq!(2, report.table.columns().len());
        assert_eq!(2, report.table.len());
        assert_eq!(1, report.failures.len());
        assert_eq!(1, report.failures[0].source_index);
        assert_eq!(vec!["a", "c"], report.table.field_names());
    }

    #[test]
    fn no_tables() {
        let error = merge_tables::<LocationKey>(vec![]).unwrap_err();
        assert_eq!(ErrorKind::MergeKeyMismatch, error.kind());
        assert_eq!(
            "no usable input source to merge on (latitude, longitude)",
            error.to_string()
        );
    }

    #[test]
    fn all_sources_skipped() {
        let results: Vec<Result<Table<TimeStepKey>, PipelineError>> =
            vec![Err(PipelineError::source_read("a.json", "unreadable"))];
        let error = merge_results(results, FailurePolicy::Skip).unwrap_err();
        assert_eq!(ErrorKind::MergeKeyMismatch, error.kind());
    }
}
