//! Pipeline driver.
//!
//! A run loads each source in turn, reduces and tabulates it, merges the tables and writes the
//! merged rows. At most one grid is held in memory at a time.

use crate::error::PipelineError;
use crate::merge::{self, SourceFailure};
use crate::metrics;
use crate::models::PipelineConfig;
use crate::operation::Aggregation;
use crate::schema::OutputSchema;
use crate::serializer;

use strum_macros::Display;
use tracing::{event, Level};
use validator::Validate;

/// Stages of a run
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Stage {
    Init,
    Loading,
    Reducing,
    Building,
    Merging,
    Serializing,
    Done,
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunSummary {
    /// Output field names, in output order
    pub columns: Vec<String>,
    pub rows_written: usize,
    /// Sources skipped under [FailurePolicy::Skip](crate::models::FailurePolicy::Skip)
    pub failures: Vec<SourceFailure>,
}

/// Run an aggregation over the configured sources.
///
/// Prints `Parsing <path>` for each source and the merged column list to stdout.
pub fn run<A: Aggregation>(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let schema = metrics::observe_stage(Stage::Init, || {
        config.validate()?;
        config
            .schema
            .as_deref()
            .map(OutputSchema::load)
            .transpose()
    })?;
    event!(
        Level::INFO,
        aggregation = A::NAME,
        sources = config.sources.len(),
        on_error = %config.on_error,
        "starting run"
    );

    let results = config
        .sources
        .iter()
        .enumerate()
        .map(|(source_index, spec)| -> Result<_, PipelineError> {
            println!("Parsing {}", spec.id());
            let table = A::tabulate(spec, source_index)?;
            metrics::RECORDS_BUILT
                .with_label_values(&[A::NAME])
                .inc_by(table.len() as u64);
            Ok(table)
        });
    let report = merge::merge_results(results, config.on_error)?;

    let columns = report.table.output_columns();
    let names: Vec<String> = columns
        .iter()
        .map(|column| column.field().to_string())
        .collect();
    println!("\nColumns: {}", names.join(", "));

    let schema = match schema {
        Some(schema) => schema,
        None => OutputSchema::derive(A::SCHEMA_NAME, &columns)?,
    };
    let rows_written = metrics::observe_stage(Stage::Serializing, || {
        serializer::write_file(&report.table, &schema, &config.output)
    })?;
    event!(
        Level::INFO,
        stage = %Stage::Done,
        output = %config.output.display(),
        rows = rows_written,
        skipped = report.failures.len(),
        "run complete"
    );
    Ok(RunSummary {
        columns: names,
        rows_written,
        failures: report.failures,
    })
}
