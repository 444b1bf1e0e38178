//! NetCDF grid source.
//!
//! Requires the system NetCDF and HDF5 libraries (`libnetcdf-dev libhdf5-dev`).

use crate::array;
use crate::error::PipelineError;
use crate::sources::GridSource;
use crate::types::Missing;

use ndarray::ArrayD;
use netcdf::AttributeValue;
use std::path::Path;

/// A NetCDF file opened for reading.
pub struct NetcdfSource {
    id: String,
    file: netcdf::File,
}

impl NetcdfSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let id = path.display().to_string();
        let file = netcdf::open(path)
            .map_err(|error| PipelineError::source_read(&id, error.to_string()))?;
        Ok(NetcdfSource { id, file })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable, PipelineError> {
        self.file
            .variable(name)
            .ok_or_else(|| PipelineError::MissingVariable {
                path: self.id.clone(),
                name: name.to_string(),
            })
    }
}

/// Returns the numeric elements of an attribute, or `None` for text attributes.
fn attribute_numbers(value: AttributeValue) -> Option<Vec<f64>> {
    let numbers = match value {
        AttributeValue::Uchar(x) => vec![x as f64],
        AttributeValue::Uchars(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Schar(x) => vec![x as f64],
        AttributeValue::Schars(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Ushort(x) => vec![x as f64],
        AttributeValue::Ushorts(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Short(x) => vec![x as f64],
        AttributeValue::Shorts(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Uint(x) => vec![x as f64],
        AttributeValue::Uints(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Int(x) => vec![x as f64],
        AttributeValue::Ints(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Ulonglong(x) => vec![x as f64],
        AttributeValue::Ulonglongs(x) => x.into_iter().map(|x| x as f64).collect(),
        AttributeValue::Longlong(x) => vec![x as f64],
        AttributeValue::Longlongs(x) => x.into_iter().map(|x| x as f64).collect(),
        AttributeValue::Float(x) => vec![x as f64],
        AttributeValue::Floats(x) => x.into_iter().map(f64::from).collect(),
        AttributeValue::Double(x) => vec![x],
        AttributeValue::Doubles(x) => x,
        AttributeValue::Str(_) | AttributeValue::Strs(_) => return None,
    };
    Some(numbers)
}

/// Returns the numeric value of a variable attribute, if present.
fn numeric_attribute(variable: &netcdf::Variable, name: &str) -> Option<Vec<f64>> {
    // Probing an absent attribute makes HDF5 print to stderr.
    if !variable.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    let value = variable.attribute_value(name)?.ok()?;
    attribute_numbers(value).filter(|numbers| !numbers.is_empty())
}

/// Build a missing data descriptor from CF attributes.
///
/// `_FillValue` and `missing_value` take precedence over the valid range attributes.
fn missing_from_attributes(variable: &netcdf::Variable) -> Option<Missing<f64>> {
    let mut values: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| numeric_attribute(variable, name))
        .flatten()
        .collect();
    values.dedup();
    match values.len() {
        0 => (),
        1 => return Some(Missing::MissingValue(values[0])),
        _ => return Some(Missing::MissingValues(values)),
    }
    if let Some(range) = numeric_attribute(variable, "valid_range") {
        if let [min, max] = range[..] {
            return Some(Missing::ValidRange(min, max));
        }
    }
    let min = numeric_attribute(variable, "valid_min").map(|values| values[0]);
    let max = numeric_attribute(variable, "valid_max").map(|values| values[0]);
    match (min, max) {
        (Some(min), Some(max)) => Some(Missing::ValidRange(min, max)),
        (Some(min), None) => Some(Missing::ValidMin(min)),
        (None, Some(max)) => Some(Missing::ValidMax(max)),
        (None, None) => None,
    }
}

/// CF packing of a variable: stored values unpack to `value * scale_factor + add_offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Packing {
    scale_factor: f64,
    add_offset: f64,
}

/// Returns the packing of a variable, if it declares `scale_factor` or `add_offset`.
fn packing(variable: &netcdf::Variable) -> Option<Packing> {
    let scale_factor = numeric_attribute(variable, "scale_factor").map(|values| values[0]);
    let add_offset = numeric_attribute(variable, "add_offset").map(|values| values[0]);
    if scale_factor.is_none() && add_offset.is_none() {
        return None;
    }
    Some(Packing {
        scale_factor: scale_factor.unwrap_or(1.0),
        add_offset: add_offset.unwrap_or(0.0),
    })
}

/// Unpack stored values in place.
///
/// `missing` describes packed values. Elements it flags become NaN instead of being unpacked.
fn unpack(values: &mut [f64], packing: Packing, missing: Option<&Missing<f64>>) {
    for value in values.iter_mut() {
        *value = if missing.map_or(false, |missing| missing.is_missing(value)) {
            f64::NAN
        } else {
            *value * packing.scale_factor + packing.add_offset
        };
    }
}

impl GridSource for NetcdfSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|variable| variable.name()).collect()
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, PipelineError> {
        let variable = self.variable(name)?;
        let shape: Vec<usize> = variable
            .dimensions()
            .iter()
            .map(|dimension| dimension.len())
            .collect();
        let mut data: Vec<f64> = variable
            .get_values(..)
            .map_err(|error| PipelineError::source_read(&self.id, error.to_string()))?;
        if let Some(packing) = packing(&variable) {
            unpack(&mut data, packing, missing_from_attributes(&variable).as_ref());
        }
        array::build_array(&shape, data)
    }

    fn missing(&self, name: &str) -> Option<Missing<f64>> {
        let variable = self.file.variable(name)?;
        // Packed variables are masked while unpacking.
        if packing(&variable).is_some() {
            return None;
        }
        missing_from_attributes(&variable)
    }
}
