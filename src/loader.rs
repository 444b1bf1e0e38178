//! Grid loading.
//!
//! A grid source must hold exactly four variables. Their roles follow declaration order: one
//! quantity laid out `time × latitude × longitude`, then the `latitude`, `longitude` and `time`
//! coordinates. Variable names are free, only their position matters.

use crate::array;
use crate::error::PipelineError;
use crate::models::SourceSpec;
use crate::sources::{self, GridSource};
use crate::types::Missing;

use ndarray::{Array1, ArrayD};
use tracing::{event, Level};

/// Number of variables a grid source must hold.
pub const VARIABLE_COUNT: usize = 4;

/// A quantity and its coordinate axes, held in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    /// Identifier of the source the grid was read from
    pub id: String,
    /// Name of the quantity variable
    pub quantity_name: String,
    /// Quantity, shaped `time × latitude × longitude`
    pub quantity: ArrayD<f64>,
    /// Missing data descriptor of the quantity
    pub missing: Option<Missing<f64>>,
    pub latitude: Array1<f64>,
    pub longitude: Array1<f64>,
    /// Day offsets from the source's start date
    pub time: Array1<f64>,
}

/// Read a coordinate variable and check that every element is finite.
fn read_axis(source: &dyn GridSource, name: &str) -> Result<Array1<f64>, PipelineError> {
    let axis = array::into_axis(source.read_variable(name)?, name, source.id())?;
    if let Some(index) = array::first_non_finite(axis.view()) {
        return Err(PipelineError::source_read(
            source.id(),
            format!("coordinate {} has a non-finite value at index {}", name, index),
        ));
    }
    Ok(axis)
}

impl Grid {
    /// Read and validate a grid from a source.
    ///
    /// Fails if the source does not hold exactly [VARIABLE_COUNT] variables, if a coordinate is
    /// not one dimensional or not finite, or if the quantity's shape does not match the
    /// coordinate axes.
    pub fn from_source(source: &dyn GridSource) -> Result<Self, PipelineError> {
        let id = source.id().to_string();
        let [quantity_name, latitude_name, longitude_name, time_name]: [String; VARIABLE_COUNT] =
            source.variable_names().try_into().map_err(|names: Vec<String>| {
                PipelineError::source_read(
                    &id,
                    format!(
                        "expected {} variables, found {}: {}",
                        VARIABLE_COUNT,
                        names.len(),
                        names.join(", ")
                    ),
                )
            })?;

        let latitude = read_axis(source, &latitude_name)?;
        let longitude = read_axis(source, &longitude_name)?;
        let time = read_axis(source, &time_name)?;

        let quantity = source.read_variable(&quantity_name)?;
        let expected = [time.len(), latitude.len(), longitude.len()];
        if quantity.shape() != expected {
            return Err(PipelineError::source_read(
                &id,
                format!(
                    "quantity {} has shape {:?}, expected {:?} (time × latitude × longitude)",
                    quantity_name,
                    quantity.shape(),
                    expected
                ),
            ));
        }

        let missing = source.missing(&quantity_name);
        if let Some(missing) = &missing {
            missing
                .validate()
                .map_err(|error| PipelineError::source_read(&id, error.to_string()))?;
        }

        Ok(Grid {
            id,
            quantity_name,
            quantity,
            missing,
            latitude,
            longitude,
            time,
        })
    }
}

/// Load the grid of one input source.
///
/// The source is closed before returning.
pub fn load_grid(spec: &SourceSpec) -> Result<Grid, PipelineError> {
    let source = sources::open(&spec.path)?;
    let grid = Grid::from_source(source.as_ref())?;
    event!(
        Level::DEBUG,
        source = %grid.id,
        quantity = %grid.quantity_name,
        shape = ?grid.quantity.shape(),
        "loaded grid"
    );
    Ok(grid)
}
