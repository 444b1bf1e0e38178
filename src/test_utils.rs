use crate::loader::Grid;
use crate::sources::memory::MemorySource;
use crate::types::Missing;

use ndarray::{array, ArrayD};
use std::path::{Path, PathBuf};

/// Quantity of the test grid, laid out `time × latitude × longitude`.
///
/// Summed over time: `[[0, 2], [3, 6]]`. Summed over space: `[10, 1]`.
pub(crate) fn get_test_quantity() -> ArrayD<f64> {
    array![[[1.0, 2.0], [3.0, 4.0]], [[-1.0, 0.0], [0.0, 2.0]]].into_dyn()
}

/// Create a 2 × 2 × 2 grid with a quantity named `afp`.
pub(crate) fn get_test_grid() -> Grid {
    Grid {
        id: "test.json".to_string(),
        quantity_name: "afp".to_string(),
        quantity: get_test_quantity(),
        missing: None,
        latitude: array![10.0, 20.0],
        longitude: array![100.0, 200.0],
        time: array![0.0, 5.0],
    }
}

/// Create an in-memory source holding the test grid.
pub(crate) fn get_test_source() -> MemorySource {
    MemorySource::new("memory")
        .with_variable("afp", get_test_quantity())
        .with_variable("latitude", array![10.0, 20.0].into_dyn())
        .with_variable("longitude", array![100.0, 200.0].into_dyn())
        .with_variable("time", array![0.0, 5.0].into_dyn())
}

/// Write a JSON grid document to `dir` and return its path.
///
/// # Arguments
///
/// * `dir`: Directory to write to
/// * `file_name`: Name of the file
/// * `quantity`: Name of the quantity variable
/// * `data`: Quantity in row-major order, shaped `time × latitude × longitude`
/// * `latitude`, `longitude`, `time`: Coordinate axes
/// * `missing`: Optional missing data descriptor of the quantity
#[allow(clippy::too_many_arguments)]
pub(crate) fn write_json_grid(
    dir: &Path,
    file_name: &str,
    quantity: &str,
    data: &[f64],
    latitude: &[f64],
    longitude: &[f64],
    time: &[f64],
    missing: Option<Missing<f64>>,
) -> PathBuf {
    let shape = [time.len(), latitude.len(), longitude.len()];
    let document = serde_json::json!({
        "variables": [
            {"name": quantity, "shape": shape, "data": data, "missing": missing},
            {"name": "latitude", "data": latitude},
            {"name": "longitude", "data": longitude},
            {"name": "time", "data": time},
        ]
    });
    let path = dir.join(file_name);
    std::fs::write(&path, document.to_string()).unwrap();
    path
}
