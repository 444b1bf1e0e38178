//! Reductions and the aggregations built on them.
//!
//! Each aggregation is implemented as a struct that implements the
//! [Aggregation](crate::operation::Aggregation) trait.

use crate::error::PipelineError;
use crate::loader::Grid;
use crate::models::{Reduction, SourceSpec};
use crate::operation::{Aggregation, Element};
use crate::table::{self, ColumnId, Table};
use crate::types::{LocationKey, Missing, TimeStepKey};

use ndarray::{ArrayD, ArrayViewD, Axis, ErrorKind, ShapeError};

/// Sums an array over the axes selected by a reduction.
///
/// Elements flagged by `missing`, and NaN elements, do not contribute to the sum. A cell whose
/// elements are all excluded sums to zero. Summation follows the array's iteration order.
///
/// # Arguments
///
/// * `array`: A `time × latitude × longitude` array
/// * `reduction`: Axes to collapse
/// * `missing`: Optional missing data descriptor
pub fn reduce_sum<T: Element>(
    array: ArrayViewD<T>,
    reduction: Reduction,
    missing: Option<&Missing<T>>,
) -> Result<ArrayD<T>, PipelineError> {
    if array.ndim() != 3 {
        return Err(PipelineError::ShapeInvalid(ShapeError::from_kind(
            ErrorKind::IncompatibleShape,
        )));
    }
    let include = |val: &T| !val.is_nan() && !missing.map_or(false, |m| m.is_missing(val));
    let axes = reduction.axes();
    // Sum over first axis
    let mut result = array.fold_axis(Axis(axes[0]), T::zero(), |sum, val| {
        if include(val) {
            *sum + *val
        } else {
            *sum
        }
    });
    // Sum over remaining axes. Each fold removes an axis, shifting the later ones down.
    if let Some(remaining_axes) = axes.get(1..) {
        for (n, axis) in remaining_axes.iter().enumerate() {
            result = result.fold_axis(Axis(axis - n - 1), T::zero(), |total, sum| *total + *sum);
        }
    }
    Ok(result)
}

/// Aggregate over time, producing one row per grid location.
pub struct Spatial {}

impl Aggregation for Spatial {
    type Key = LocationKey;
    const NAME: &'static str = "spatial";
    const REDUCTION: Reduction = Reduction::AllTime;
    const SCHEMA_NAME: &'static str = "point";
    const DEFAULT_OUTPUT: &'static str = "resources/data.avro";
    const NEEDS_START_DATE: bool = false;

    fn build_table(
        grid: &Grid,
        reduced: ArrayViewD<f64>,
        _spec: &SourceSpec,
        source_index: usize,
    ) -> Result<Table<LocationKey>, PipelineError> {
        table::spatial_table(
            ColumnId::new(source_index, &grid.quantity_name),
            reduced,
            grid.latitude.view(),
            grid.longitude.view(),
        )
    }
}

/// Aggregate over space, producing one row per time step.
pub struct Temporal {}

impl Aggregation for Temporal {
    type Key = TimeStepKey;
    const NAME: &'static str = "temporal";
    const REDUCTION: Reduction = Reduction::AllSpace;
    const SCHEMA_NAME: &'static str = "timestamp";
    const DEFAULT_OUTPUT: &'static str = "resources/timeSeries.avro";
    const NEEDS_START_DATE: bool = true;

    fn build_table(
        grid: &Grid,
        reduced: ArrayViewD<f64>,
        spec: &SourceSpec,
        source_index: usize,
    ) -> Result<Table<TimeStepKey>, PipelineError> {
        let start_date = spec
            .start_date
            .ok_or_else(|| PipelineError::MissingStartDate { path: spec.id() })?;
        table::temporal_table(
            ColumnId::new(source_index, &grid.quantity_name),
            reduced,
            grid.time.view(),
            start_date,
        )
    }
}
