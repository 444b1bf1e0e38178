//! Missing data descriptors
//!
//! Grids can contain missing data which should be ignored during reduction. There are multiple
//! ways to describe the missing data. Currently we support:
//!
//! * A single missing value
//! * Multiple missing values
//! * A valid minimum value
//! * A valid maximum value
//! * A valid range of values

use serde::{Deserialize, Serialize};
use validator::ValidationError;

use crate::operation::Element;

/// Missing data
///
/// This enum can represent all known descriptions of missing data used in NetCDF4 files
/// (`_FillValue`/`missing_value`, `valid_min`, `valid_max` and `valid_range` attributes).
/// It is generic over the type of missing data values; sources describe missing data as `f64`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Missing<T> {
    /// A single missing value
    MissingValue(T),
    /// Multple missing values
    MissingValues(Vec<T>),
    /// Valid minimum
    ValidMin(T),
    /// Valid maxiumum
    ValidMax(T),
    /// Valid range
    ValidRange(T, T),
}

impl<T: PartialOrd + Serialize> Missing<T> {
    /// Validate a missing data descriptor.
    ///
    /// Valid ranges must have a minimum strictly less than their maximum.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Missing::ValidRange(min, max) = self {
            if min >= max {
                let mut error =
                    ValidationError::new("Missing data valid range min must be less than max");
                error.add_param("min".into(), min);
                error.add_param("max".into(), max);
                return Err(error);
            };
        };
        Ok(())
    }
}

impl<T: Element> Missing<T> {
    /// Filter function to check whether the provided value is a 'missing' value
    pub fn is_missing(&self, x: &T) -> bool {
        match self {
            Missing::MissingValue(value) => x == value,
            Missing::MissingValues(values) => values.contains(x),
            Missing::ValidMin(min) => x < min,
            Missing::ValidMax(max) => x > max,
            Missing::ValidRange(min, max) => x < min || x > max,
        }
    }
}
