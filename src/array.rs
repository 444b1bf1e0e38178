//! Functions and utilities for working with [ndarray] objects.

use crate::error::PipelineError;

use ndarray::prelude::*;

/// Returns the shape of an array holding `size` elements.
///
/// # Arguments
///
/// * `size`: Number of elements in the array
/// * `shape`: Optional declared shape
pub fn get_shape(size: usize, shape: Option<&[usize]>) -> Vec<usize> {
    // Use the provided shape, or fall back to a 1D array.
    shape.map(|shape| shape.to_vec()).unwrap_or(vec![size])
}

/// Returns an owned dynamic-dimensional array from a shape and row-major data.
///
/// # Arguments
///
/// * `shape`: The shape of the array
/// * `data`: Elements of the array in row-major order. Its length must equal the product of
///   `shape`.
pub fn build_array(shape: &[usize], data: Vec<f64>) -> Result<ArrayD<f64>, PipelineError> {
    ArrayD::from_shape_vec(IxDyn(shape), data).map_err(PipelineError::ShapeInvalid)
}

/// Convert a coordinate variable into a 1D axis.
///
/// # Arguments
///
/// * `array`: The coordinate variable
/// * `name`: Name of the variable, for diagnostics
/// * `source`: Identifier of the source the variable came from, for diagnostics
pub fn into_axis(array: ArrayD<f64>, name: &str, source: &str) -> Result<Array1<f64>, PipelineError> {
    let ndim = array.ndim();
    array.into_dimensionality::<Ix1>().map_err(|_| {
        PipelineError::source_read(
            source,
            format!("coordinate {} must be one dimensional, found {} dimensions", name, ndim),
        )
    })
}

/// Returns the index of the first non-finite element of `axis`, if any.
pub fn first_non_finite(axis: ArrayView1<f64>) -> Option<usize> {
    axis.iter().position(|value| !value.is_finite())
}
