//! Application entry points for each aggregation.

use crate::cli::{Command, CommandLineArgs, RunArgs};
use crate::error::{self, PipelineError};
use crate::metrics;
use crate::operation::Aggregation;
use crate::operations::{Spatial, Temporal};
use crate::pipeline::{self, RunSummary};

/// Run the aggregation selected on the command line.
pub fn run(args: &CommandLineArgs) -> Result<RunSummary, PipelineError> {
    match &args.command {
        Command::Spatial(run_args) => run_aggregation::<Spatial>(run_args),
        Command::Temporal(run_args) => run_aggregation::<Temporal>(run_args),
    }
}

/// Run one aggregation, then write metrics if requested.
///
/// Metrics are written whether or not the run succeeds.
fn run_aggregation<A: Aggregation>(args: &RunArgs) -> Result<RunSummary, PipelineError> {
    let metrics_path = args.metrics_path()?;
    let config = args.to_config::<A>()?;
    let result = pipeline::run::<A>(&config);
    if let Some(path) = metrics_path {
        if let Err(metrics_error) = metrics::write_metrics(&path) {
            if result.is_ok() {
                return Err(metrics_error);
            }
            error::log_error(&metrics_error);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;
    use crate::test_utils::write_json_grid;
    use clap::Parser;

    fn parse(args: Vec<String>) -> CommandLineArgs {
        CommandLineArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn run_temporal_from_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json_grid(
            dir.path(),
            "afp_20200101_20201231.json",
            "afp",
            &[0.0, 4.0],
            &[1.0],
            &[1.0],
            &[0.0, 5.0],
            None,
        );
        let output = dir.path().join("out/timeSeries.avro");
        let metrics_file = dir.path().join("gridfold.prom");
        metrics::register_metrics().unwrap();
        let args = parse(vec![
            "gridfold".to_string(),
            "temporal".to_string(),
            "--output".to_string(),
            output.display().to_string(),
            "--metrics-file".to_string(),
            metrics_file.display().to_string(),
            path.display().to_string(),
        ]);
        let summary = run(&args).unwrap();
        assert_eq!(vec!["afp", "time", "date"], summary.columns);
        assert_eq!(1, summary.rows_written);
        assert!(output.exists());
        let text = std::fs::read_to_string(&metrics_file).unwrap();
        assert!(text.contains("rows_written"));
    }

    #[test]
    fn run_spatial_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("data.avro");
        let args = parse(vec![
            "gridfold".to_string(),
            "spatial".to_string(),
            "--output".to_string(),
            output.display().to_string(),
            dir.path().join("missing.json").display().to_string(),
        ]);
        let error = run(&args).unwrap_err();
        assert_eq!(ErrorKind::SourceRead, error.kind());
        assert!(!output.exists());
    }
}
