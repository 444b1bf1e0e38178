//! Data types and associated functions and methods

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use strum_macros::Display;
use time::Date;
use validator::{Validate, ValidationError};

/// Axes collapsed by a reduction
///
/// Grids are laid out as `time × latitude × longitude`.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Reduction {
    /// Collapse the leading time axis, leaving `latitude × longitude`
    #[strum(serialize = "all-time")]
    AllTime,
    /// Collapse both spatial axes, leaving `time`
    #[strum(serialize = "all-space")]
    AllSpace,
}

impl Reduction {
    /// Returns the collapsed axes in ascending order.
    pub fn axes(self) -> &'static [usize] {
        match self {
            Self::AllTime => &[0],
            Self::AllSpace => &[1, 2],
        }
    }
}

/// An input source and the parameters needed to interpret it.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSpec {
    /// Location of the source
    pub path: PathBuf,
    /// Date that the source's time offsets count from. Required by the temporal pipeline.
    pub start_date: Option<Date>,
}

impl SourceSpec {
    /// Return a new SourceSpec without a start date.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SourceSpec {
            path: path.into(),
            start_date: None,
        }
    }

    /// Return this SourceSpec with a start date.
    pub fn with_start_date(mut self, start_date: Date) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Returns the path as a string for diagnostics.
    pub fn id(&self) -> String {
        self.path.display().to_string()
    }
}

/// What to do when an input source cannot be tabulated
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run at the first failing source
    #[default]
    Abort,
    /// Record the failure and carry on with the remaining sources
    Skip,
}

/// Configuration of one pipeline run
#[derive(Clone, Debug, PartialEq, Validate)]
#[validate(schema(function = "validate_pipeline_config"))]
pub struct PipelineConfig {
    /// Input sources, in merge order
    pub sources: Vec<SourceSpec>,
    /// Output record schema. Derived from the merged columns when absent.
    pub schema: Option<PathBuf>,
    /// Output file
    #[validate(custom = "validate_output")]
    pub output: PathBuf,
    /// Policy for failing sources
    pub on_error: FailurePolicy,
}

impl PipelineConfig {
    /// Return a new PipelineConfig that aborts on the first failure and derives its schema.
    pub fn new(sources: Vec<SourceSpec>, output: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            sources,
            schema: None,
            output: output.into(),
            on_error: FailurePolicy::default(),
        }
    }
}

/// Validate pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ValidationError> {
    if config.sources.is_empty() {
        return Err(ValidationError::new("at least one input source is required"));
    }
    Ok(())
}

/// Validate the output path
fn validate_output(output: &Path) -> Result<(), ValidationError> {
    if output.as_os_str().is_empty() {
        return Err(ValidationError::new("output path must not be empty"));
    }
    if output.file_name().is_none() {
        let mut error = ValidationError::new("output path must name a file");
        error.add_param("output".into(), &output.display().to_string());
        return Err(error);
    }
    Ok(())
}
