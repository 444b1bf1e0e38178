//! Grid sources.
//!
//! A source exposes named numeric variables. The loader asks a source for exactly four of them:
//! one quantity and the `latitude`, `longitude` and `time` coordinates.

use crate::error::PipelineError;
use crate::types::Missing;

use ndarray::ArrayD;
use std::path::Path;

pub mod json;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf_file;

/// Trait for readers of gridded variables.
pub trait GridSource {
    /// Returns an identifier of the source for diagnostics.
    fn id(&self) -> &str;

    /// Returns the names of the variables held by the source, in declaration order.
    fn variable_names(&self) -> Vec<String>;

    /// Read a variable into memory.
    ///
    /// # Arguments
    ///
    /// * `name`: Name of the variable
    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, PipelineError>;

    /// Returns the missing data descriptor of a variable, if it declares one.
    fn missing(&self, name: &str) -> Option<Missing<f64>>;
}

/// Open a grid source, selecting the reader from the file extension.
///
/// `.json` files are read as JSON grid documents. `.nc`, `.nc4` and `.cdf` files are read as
/// NetCDF when the `netcdf` feature is enabled.
pub fn open(path: &Path) -> Result<Box<dyn GridSource>, PipelineError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("json") => Ok(Box::new(json::open(path)?)),
        Some("nc") | Some("nc4") | Some("cdf") => open_netcdf(path),
        _ => Err(PipelineError::source_read(
            path.display().to_string(),
            "unrecognised source format",
        )),
    }
}

#[cfg(feature = "netcdf")]
fn open_netcdf(path: &Path) -> Result<Box<dyn GridSource>, PipelineError> {
    Ok(Box::new(netcdf_file::NetcdfSource::open(path)?))
}

#[cfg(not(feature = "netcdf"))]
fn open_netcdf(path: &Path) -> Result<Box<dyn GridSource>, PipelineError> {
    Err(PipelineError::source_read(
        path.display().to_string(),
        "NetCDF support is not enabled in this build",
    ))
}
