//! Error handling.

use ndarray::ShapeError;
use strum_macros::Display;
use thiserror::Error;
use tracing::{event, Level};

/// Coarse classification of pipeline failures.
///
/// The command line reports every failure with the same message, so the kind is what keeps
/// the underlying causes distinguishable in logs and tests.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
    /// Input source missing, unreadable or with the wrong variable set
    SourceRead,
    /// Output schema missing or malformed
    SchemaLoad,
    /// No table was available to join on
    MergeKeyMismatch,
    /// A value could not be cast to the type declared by the output schema
    SerializationType,
    /// Invalid run configuration
    Config,
    /// Failure writing the output stream or metrics
    Output,
}

/// Pipeline error type
///
/// This type encapsulates the various errors that may occur during a run.
/// Every variant aborts the run unless the failing source is skipped by the merge policy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Error opening or decoding an input source
    #[error("failed to read source {path}: {reason}")]
    SourceRead { path: String, reason: String },

    /// A required variable is absent from an input source
    #[error("variable {name} not found in source {path}")]
    MissingVariable { path: String, name: String },

    /// Temporal sources need a start date to derive calendar dates
    #[error("no start date given for source {path}")]
    MissingStartDate { path: String },

    /// A start date could not be parsed
    #[error("invalid start date {value:?}: {reason}")]
    InvalidStartDate { value: String, reason: String },

    /// The same key appeared twice within one source
    #[error("duplicate key ({key}) in source {source_index}")]
    DuplicateKey { key: String, source_index: usize },

    /// Error creating ndarray Array from Shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error reading a schema file
    #[error("failed to read schema file {path}")]
    SchemaRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a schema document
    #[error("failed to parse schema")]
    SchemaParse(#[source] apache_avro::Error),

    /// Schema parsed but uses types the serializer cannot produce
    #[error("unsupported schema: {reason}")]
    SchemaUnsupported { reason: String },

    /// No source produced a table, so there is nothing to join on
    #[error("no usable input source to merge on ({key})")]
    MergeKeyMismatch { key: String },

    /// A value does not fit the field declared by the output schema
    #[error("cannot write field {field}: {reason}")]
    SerializationType { field: String, reason: String },

    /// Error encoding records into the output container
    #[error("failed to encode output record")]
    Encode(#[from] apache_avro::Error),

    /// Error creating or writing the output file
    #[error("failed to write output {path}")]
    OutputIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error validating the run configuration
    #[error("configuration is not valid")]
    ConfigInvalid(#[from] validator::ValidationErrors),

    /// Error gathering or encoding metrics
    #[error("failed to export metrics")]
    Metrics(#[from] prometheus::Error),
}

impl PipelineError {
    /// Returns the coarse [ErrorKind] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceRead { .. }
            | PipelineError::MissingVariable { .. }
            | PipelineError::MissingStartDate { .. }
            | PipelineError::DuplicateKey { .. }
            | PipelineError::ShapeInvalid(_) => ErrorKind::SourceRead,

            PipelineError::SchemaRead { .. }
            | PipelineError::SchemaParse(_)
            | PipelineError::SchemaUnsupported { .. } => ErrorKind::SchemaLoad,

            PipelineError::MergeKeyMismatch { .. } => ErrorKind::MergeKeyMismatch,

            PipelineError::SerializationType { .. } => ErrorKind::SerializationType,

            PipelineError::InvalidStartDate { .. } | PipelineError::ConfigInvalid(_) => {
                ErrorKind::Config
            }

            PipelineError::Encode(_)
            | PipelineError::OutputIo { .. }
            | PipelineError::Metrics(_) => ErrorKind::Output,
        }
    }

    /// Shorthand for a [PipelineError::SourceRead] error.
    pub fn source_read(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::SourceRead {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Returns the messages of the chain of errors that caused `error`, outermost first.
///
/// Consecutive duplicate messages are removed.
pub fn causes<E>(error: &E) -> Vec<String>
where
    E: std::error::Error,
{
    let mut caused_by = Vec::new();
    let mut current = error.source();
    while let Some(source) = current {
        caused_by.push(source.to_string());
        current = source.source();
    }
    caused_by.dedup();
    caused_by
}

/// Log an error and its causes.
pub fn log_error(error: &PipelineError) {
    event!(Level::ERROR, kind = %error.kind(), "{}", error);
    for cause in causes(error) {
        event!(Level::ERROR, "Caused by: {}", cause);
    }
}
