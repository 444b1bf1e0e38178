//! Command Line Interface (CLI) arguments.

use crate::error::PipelineError;
use crate::models::{FailurePolicy, PipelineConfig, SourceSpec};
use crate::operation::Aggregation;

use clap::{Args, Parser, Subcommand};
use expanduser::expanduser;
use std::path::PathBuf;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use validator::{ValidationError, ValidationErrors};

/// Accepted start date formats.
const DATE_FORMATS: [&[FormatItem<'static>]; 2] = [
    format_description!("[year][month][day]"),
    format_description!("[year]-[month]-[day]"),
];

/// Gridfold command line interface
#[derive(Clone, Debug, Parser)]
#[command(
    name = "gridfold",
    version,
    about = "Reduce gridded measurement files and merge them into an Avro record stream"
)]
pub struct CommandLineArgs {
    /// Aggregation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available aggregations
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Sum each source over time, producing one record per grid location
    Spatial(RunArgs),
    /// Sum each source over space, producing one record per time step
    Temporal(RunArgs),
}

/// An input source argument: a path with an optional start date.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceArg {
    pub path: String,
    pub start_date: Option<Date>,
}

/// Arguments shared by both aggregations
#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Input sources, as PATH or PATH@YYYY-MM-DD. Temporal sources without an explicit date take
    /// it from the file name, e.g. afp_20200101_20201231.nc starts on 2020-01-01.
    #[arg(required = true, value_parser = parse_source)]
    pub sources: Vec<SourceArg>,
    /// Avro schema of the output records. Derived from the merged columns if not given.
    #[arg(long, env = "GRIDFOLD_SCHEMA")]
    pub schema: Option<String>,
    /// Output file. Defaults to resources/data.avro (spatial) or resources/timeSeries.avro
    /// (temporal).
    #[arg(long, env = "GRIDFOLD_OUTPUT")]
    pub output: Option<String>,
    /// What to do when a source cannot be read
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort, env = "GRIDFOLD_ON_ERROR")]
    pub on_error: FailurePolicy,
    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, env = "GRIDFOLD_METRICS_FILE")]
    pub metrics_file: Option<String>,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

/// Parse a `PATH[@YYYY-MM-DD]` source argument.
///
/// The suffix after the last `@` is only taken as a start date if it parses as one, so paths
/// containing `@` are accepted as they are.
fn parse_source(arg: &str) -> Result<SourceArg, String> {
    if arg.is_empty() {
        return Err("source must not be empty".to_string());
    }
    if let Some((path, date)) = arg.rsplit_once('@') {
        if let Ok(start_date) = parse_date(date) {
            return Ok(SourceArg {
                path: path.to_string(),
                start_date: Some(start_date),
            });
        }
    }
    Ok(SourceArg {
        path: arg.to_string(),
        start_date: None,
    })
}

/// Parse a start date given as `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Result<Date, PipelineError> {
    DATE_FORMATS
        .iter()
        .find_map(|format| Date::parse(text, format).ok())
        .ok_or_else(|| PipelineError::InvalidStartDate {
            value: text.to_string(),
            reason: "expected YYYYMMDD or YYYY-MM-DD".to_string(),
        })
}

/// Returns the start date encoded in a source's file name.
///
/// The date is the first `.`-separated part of the second to last `_`-separated part of the
/// path, so `data/afp_20200101_20201231.nc` starts on 2020-01-01.
pub fn start_date_from_filename(path: &str) -> Result<Date, PipelineError> {
    let segments: Vec<&str> = path.split('_').collect();
    let token = match segments.len().checked_sub(2) {
        Some(index) => segments[index].split('.').next().unwrap_or_default(),
        None => {
            return Err(PipelineError::InvalidStartDate {
                value: path.to_string(),
                reason: "file name carries no date".to_string(),
            })
        }
    };
    parse_date(token)
}

/// Expand a leading `~` in a path.
pub fn expand_path(path: &str) -> Result<PathBuf, PipelineError> {
    expanduser(path).map_err(|error| {
        let mut validation_error = ValidationError::new("failed to expand ~ in path");
        validation_error.add_param("path".into(), &path);
        validation_error.add_param("reason".into(), &error.to_string());
        let mut errors = ValidationErrors::new();
        errors.add("path", validation_error);
        PipelineError::ConfigInvalid(errors)
    })
}

impl RunArgs {
    /// Build the configuration of an aggregation run.
    pub fn to_config<A: Aggregation>(&self) -> Result<PipelineConfig, PipelineError> {
        let sources = self
            .sources
            .iter()
            .map(|source| {
                let mut spec = SourceSpec::new(expand_path(&source.path)?);
                spec.start_date = match source.start_date {
                    Some(start_date) => Some(start_date),
                    None if A::NEEDS_START_DATE => Some(start_date_from_filename(&source.path)?),
                    None => None,
                };
                Ok(spec)
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        let output = expand_path(self.output.as_deref().unwrap_or(A::DEFAULT_OUTPUT))?;
        let mut config = PipelineConfig::new(sources, output);
        config.schema = self.schema.as_deref().map(expand_path).transpose()?;
        config.on_error = self.on_error;
        Ok(config)
    }

    /// Returns the expanded metrics file path, if one was given.
    pub fn metrics_path(&self) -> Result<Option<PathBuf>, PipelineError> {
        self.metrics_file.as_deref().map(expand_path).transpose()
    }
}
