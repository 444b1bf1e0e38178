//! This file defines the gridfold binary entry point.

use gridfold::app;
use gridfold::cli;
use gridfold::error;
use gridfold::metrics;
use gridfold::tracing;

use std::process::exit;

/// Application entry point
fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    let outcome = metrics::register_metrics().and_then(|()| app::run(&args));
    if let Err(error) = outcome {
        error::log_error(&error);
        println!(
            "Error! Make sure to provide a list of grid files, such as: gridfold spatial path-to-data/*.nc"
        );
        exit(1)
    }
}
