//! Prometheus metrics.
//!
//! Metrics are gathered into [REGISTRY] and written out in the text exposition format, so that
//! a run can be scraped through a node exporter textfile collector.

use crate::error::PipelineError;
use crate::pipeline::Stage;

use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::path::Path;
use tracing::{span, Level};

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Input source counter by outcome
    pub static ref SOURCES_PROCESSED: IntCounterVec = IntCounterVec::new(
        Opts::new("sources_processed", "The number of input sources processed"),
        &["outcome"]
    ).unwrap();
    // Record counter by aggregation
    pub static ref RECORDS_BUILT: IntCounterVec = IntCounterVec::new(
        Opts::new("records_built", "The number of non-zero records built from input sources"),
        &["aggregation"]
    ).unwrap();
    // Output row counter
    pub static ref ROWS_WRITTEN: IntCounter = IntCounter::new(
        "rows_written", "The number of merged rows written to the output"
    ).unwrap();
    // Stage histogram by duration
    pub static ref STAGE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("stage_duration", "The time taken by each pipeline stage"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(), // Change buckets here if desired
        },
        &["stage"],
    ).unwrap();
}

/// Register all metrics with [REGISTRY].
///
/// Metrics that are already registered are left as they are.
pub fn register_metrics() -> Result<(), PipelineError> {
    let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
        Box::new(SOURCES_PROCESSED.clone()),
        Box::new(RECORDS_BUILT.clone()),
        Box::new(ROWS_WRITTEN.clone()),
        Box::new(STAGE_DURATION.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => (),
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}

/// Returns the registered metrics in the text exposition format.
pub fn gather() -> Result<String, PipelineError> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|error| prometheus::Error::Msg(error.to_string()).into())
}

/// Write the registered metrics to a file.
pub fn write_metrics(path: &Path) -> Result<(), PipelineError> {
    let text = gather()?;
    std::fs::write(path, text).map_err(|source| PipelineError::OutputIo {
        path: path.display().to_string(),
        source,
    })
}

/// Run a pipeline stage within a span, recording its duration.
pub fn observe_stage<T>(stage: Stage, f: impl FnOnce() -> T) -> T {
    let _span = span!(Level::DEBUG, "stage", %stage).entered();
    let timer = STAGE_DURATION
        .with_label_values(&[&stage.to_string()])
        .start_timer();
    let result = f();
    timer.observe_duration();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_stage_returns_result() {
        let before = STAGE_DURATION
            .with_label_values(&["Merging"])
            .get_sample_count();
        assert_eq!(42, observe_stage(Stage::Merging, || 42));
        let after = STAGE_DURATION
            .with_label_values(&["Merging"])
            .get_sample_count();
        assert!(after > before);
    }

    #[test]
    fn register_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
        ROWS_WRITTEN.inc_by(0);
        assert!(gather().unwrap().contains("rows_written"));
    }

    #[test]
    fn write_metrics_file() {
        register_metrics().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridfold.prom");
        write_metrics(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# TYPE rows_written counter"));
    }
}
