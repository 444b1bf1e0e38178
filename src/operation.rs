use crate::error::PipelineError;
use crate::loader::{self, Grid};
use crate::metrics;
use crate::models::{Reduction, SourceSpec};
use crate::operations;
use crate::pipeline::Stage;
use crate::table::Table;
use crate::types::RowKey;

use ndarray::ArrayViewD;
use tracing::{event, Level};

/// Trait for array elements.
pub trait Element:
    Clone
    + Copy
    + PartialOrd
    + num_traits::Float
    + num_traits::FromPrimitive
    + std::fmt::Debug
{
}

/// Blanket implementation of Element.
impl<T> Element for T where
    T: Clone
        + Copy
        + PartialOrd
        + num_traits::Float
        + num_traits::FromPrimitive
        + std::fmt::Debug
{
}

/// Trait for aggregations.
///
/// An aggregation picks the axes to collapse and turns the reduced array of one grid into a
/// table keyed by the coordinates that remain. This forms the contract between the pipeline
/// driver and the spatial and temporal variants.
pub trait Aggregation {
    /// Key of the rows produced by this aggregation.
    type Key: RowKey;

    /// Name used in logs.
    const NAME: &'static str;

    /// Axes collapsed by this aggregation.
    const REDUCTION: Reduction;

    /// Record name used when deriving the output schema.
    const SCHEMA_NAME: &'static str;

    /// Output location used when none is configured.
    const DEFAULT_OUTPUT: &'static str;

    /// Whether every source must carry an explicit start date.
    const NEEDS_START_DATE: bool;

    /// Build the table of one source from its reduced array.
    ///
    /// # Arguments
    ///
    /// * `grid`: The grid that was reduced, providing the coordinate axes
    /// * `reduced`: The quantity reduced over [Self::REDUCTION]
    /// * `spec`: The source the grid was loaded from
    /// * `source_index`: Position of the source in the input list
    fn build_table(
        grid: &Grid,
        reduced: ArrayViewD<f64>,
        spec: &SourceSpec,
        source_index: usize,
    ) -> Result<Table<Self::Key>, PipelineError>;

    /// Reduce a loaded grid and build its table.
    fn tabulate_grid(
        grid: &Grid,
        spec: &SourceSpec,
        source_index: usize,
    ) -> Result<Table<Self::Key>, PipelineError> {
        let reduced = metrics::observe_stage(Stage::Reducing, || {
            operations::reduce_sum(grid.quantity.view(), Self::REDUCTION, grid.missing.as_ref())
        })?;
        let table = metrics::observe_stage(Stage::Building, || {
            Self::build_table(grid, reduced.view(), spec, source_index)
        })?;
        event!(
            Level::DEBUG,
            aggregation = Self::NAME,
            source = %grid.id,
            records = table.len(),
            "built table"
        );
        Ok(table)
    }

    /// Load, reduce and tabulate one source.
    ///
    /// The grid is dropped before returning, so only its table outlives the call.
    fn tabulate(spec: &SourceSpec, source_index: usize) -> Result<Table<Self::Key>, PipelineError> {
        let grid = metrics::observe_stage(Stage::Loading, || loader::load_grid(spec))?;
        Self::tabulate_grid(&grid, spec, source_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::table::{ColumnId, Record};
    use crate::test_utils;
    use crate::types::LocationKey;

    struct TestAggregation {}

    impl Aggregation for TestAggregation {
        type Key = LocationKey;
        const NAME: &'static str = "test";
        const REDUCTION: Reduction = Reduction::AllTime;
        const SCHEMA_NAME: &'static str = "test";
        const DEFAULT_OUTPUT: &'static str = "test.avro";
        const NEEDS_START_DATE: bool = false;

        fn build_table(
            grid: &Grid,
            reduced: ArrayViewD<f64>,
            _spec: &SourceSpec,
            source_index: usize,
        ) -> Result<Table<LocationKey>, PipelineError> {
            // One record holding the total of the reduced array.
            let column = ColumnId::new(source_index, &grid.quantity_name);
            let record = Record::new(LocationKey::new(0.0, 0.0), reduced.sum());
            Table::from_records(column, vec![record])
        }
    }

    #[test]
    fn tabulate_grid_reduces_before_building() {
        let grid = test_utils::get_test_grid();
        let spec = SourceSpec::new("test.json");
        let table = TestAggregation::tabulate_grid(&grid, &spec, 2).unwrap();
        assert_eq!(&ColumnId::new(2, "afp"), table.column());
        assert_eq!(1, table.len());
        assert_eq!(grid.quantity.sum(), table.records()[0].value);
    }

    #[test]
    fn tabulate_missing_file() {
        let spec = SourceSpec::new("does/not/exist.json");
        let error = TestAggregation::tabulate(&spec, 0).unwrap_err();
        assert_eq!(crate::error::ErrorKind::SourceRead, error.kind());
    }
}
