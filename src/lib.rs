//! This crate reduces gridded measurement files and merges the results into a single Avro record
//! stream.
//!
//! Each input source holds one quantity on a `time × latitude × longitude` grid, along with its
//! coordinate axes. Two aggregations are provided:
//!
//! * [Spatial](operations::Spatial) sums every location over all time steps, producing one row
//!   per location keyed by `latitude` and `longitude`.
//! * [Temporal](operations::Temporal) sums every time step over all locations, producing one row
//!   per step keyed by `time` and `date`.
//!
//! Zero sums are dropped, the per-source tables are outer joined in input order and the merged
//! rows are written against an Avro schema, with undefined cells written as `null`.
//!
//! gridfold is built on top of a number of open source components.
//!
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used in numerical
//!   computation.
//! * [Apache Avro](apache_avro) encodes the output records.
//! * [Serde](serde) performs deserialisation of JSON grid documents.
//! * [netCDF](https://docs.unidata.ucar.edu/netcdf-c/current/) files are read through the
//!   optional `netcdf` feature.

pub mod app;
pub mod array;
pub mod cli;
pub mod error;
pub mod loader;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod operation;
pub mod operations;
pub mod pipeline;
pub mod schema;
pub mod serializer;
pub mod sources;
pub mod table;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;
