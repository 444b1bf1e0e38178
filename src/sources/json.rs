//! JSON grid documents.
//!
//! A document lists its variables, each with a name, an optional shape and row-major data:
//!
//! ```json
//! {
//!   "variables": [
//!     {"name": "afp", "shape": [2, 1, 1], "data": [1.5, null], "missing": {"missing_value": -9999.0}},
//!     {"name": "latitude", "data": [51.5]},
//!     {"name": "longitude", "data": [-0.1]},
//!     {"name": "time", "data": [0, 1]}
//!   ]
//! }
//! ```
//!
//! `null` elements are read as NaN and are excluded from reductions.

use crate::array;
use crate::error::PipelineError;
use crate::sources::memory::MemorySource;
use crate::types::Missing;

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

/// A variable of a JSON grid document
#[derive(Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_variable"))]
pub struct VariableDocument {
    /// Name of the variable
    #[validate(length(min = 1, message = "variable name must not be empty"))]
    pub name: String,
    /// Shape of the variable. One dimensional if absent.
    pub shape: Option<Vec<usize>>,
    /// Elements in row-major order
    pub data: Vec<Option<f64>>,
    /// Missing data descriptor
    pub missing: Option<Missing<f64>>,
}

/// A JSON grid document
#[derive(Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GridDocument {
    /// Variables of the document
    #[validate]
    #[validate(length(min = 1, message = "document must declare at least one variable"))]
    pub variables: Vec<VariableDocument>,
}

/// Validate a variable's shape against its data
fn validate_variable(variable: &VariableDocument) -> Result<(), ValidationError> {
    if let Some(shape) = &variable.shape {
        let size: usize = shape.iter().product();
        if size != variable.data.len() {
            let mut error = ValidationError::new("variable data length must match its shape");
            error.add_param("name".into(), &variable.name);
            error.add_param("size".into(), &size);
            error.add_param("length".into(), &variable.data.len());
            return Err(error);
        }
    }
    if let Some(missing) = &variable.missing {
        missing.validate()?;
    }
    Ok(())
}

/// Convert a validated document into an in-memory source.
pub fn into_source(id: &str, document: GridDocument) -> Result<MemorySource, PipelineError> {
    let mut source = MemorySource::new(id);
    for variable in document.variables {
        let shape = array::get_shape(variable.data.len(), variable.shape.as_deref());
        let data = variable
            .data
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect();
        let data = array::build_array(&shape, data)?;
        source = source.with_variable_missing(&variable.name, data, variable.missing);
    }
    Ok(source)
}

/// Read a JSON grid document from a file.
pub fn open(path: &Path) -> Result<MemorySource, PipelineError> {
    let id = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|error| PipelineError::source_read(&id, error.to_string()))?;
    let document: GridDocument = serde_json::from_str(&text)
        .map_err(|error| PipelineError::source_read(&id, error.to_string()))?;
    document
        .validate()
        .map_err(|error| PipelineError::source_read(&id, error.to_string()))?;
    into_source(&id, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sources::GridSource;
    use ndarray::{array, IxDyn};
    use serde_test::{assert_de_tokens, assert_de_tokens_error, Token};

    fn get_test_variable() -> VariableDocument {
        VariableDocument {
            name: "afp".to_string(),
            shape: Some(vec![2]),
            data: vec![Some(1.5), None],
            missing: None,
        }
    }

    #[test]
    fn test_variable_tokens() {
        assert_de_tokens(
            &get_test_variable(),
            &[
                Token::Struct {
                    name: "VariableDocument",
                    len: 3,
                },
                Token::Str("name"),
                Token::Str("afp"),
                Token::Str("shape"),
                Token::Some,
                Token::Seq { len: Some(1) },
                Token::U64(2),
                Token::SeqEnd,
                Token::Str("data"),
                Token::Seq { len: Some(2) },
                Token::Some,
                Token::F64(1.5),
                Token::None,
                Token::SeqEnd,
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn test_variable_missing_data() {
        assert_de_tokens_error::<VariableDocument>(
            &[
                Token::Struct {
                    name: "VariableDocument",
                    len: 1,
                },
                Token::Str("name"),
                Token::Str("afp"),
                Token::StructEnd,
            ],
            "missing field `data`",
        )
    }

    #[test]
    fn test_variable_unknown_field() {
        assert_de_tokens_error::<VariableDocument>(
            &[
                Token::Struct {
                    name: "VariableDocument",
                    len: 1,
                },
                Token::Str("units"),
            ],
            "unknown field `units`, expected one of `name`, `shape`, `data`, `missing`",
        )
    }

    #[test]
    fn test_validate_variable() {
        get_test_variable().validate().unwrap();
    }

    #[test]
    #[should_panic(expected = "variable data length must match its shape")]
    fn test_validate_shape_mismatch() {
        let mut variable = get_test_variable();
        variable.shape = Some(vec![3]);
        variable.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "Missing data valid range min must be less than max")]
    fn test_validate_invalid_missing() {
        let mut variable = get_test_variable();
        variable.missing = Some(Missing::ValidRange(1.0, 0.0));
        variable.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "document must declare at least one variable")]
    fn test_validate_empty_document() {
        GridDocument { variables: vec![] }.validate().unwrap()
    }

    #[test]
    fn test_into_source() {
        let document = GridDocument {
            variables: vec![get_test_variable()],
        };
        let source = into_source("doc", document).unwrap();
        let data = source.read_variable("afp").unwrap();
        assert_eq!(1.5, data[IxDyn(&[0])]);
        assert!(data[IxDyn(&[1])].is_nan());
    }

    #[test]
    fn test_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(
            &path,
            r#"{"variables": [{"name": "afp", "shape": [1, 2], "data": [1, 2], "missing": {"valid_min": 0}}]}"#,
        )
        .unwrap();
        let source = open(&path).unwrap();
        assert_eq!(
            array![[1.0, 2.0]].into_dyn(),
            source.read_variable("afp").unwrap()
        );
        assert_eq!(Some(Missing::ValidMin(0.0)), source.missing("afp"));
    }

    #[test]
    fn test_open_missing_file() {
        let error = open(Path::new("does/not/exist.json")).err().unwrap();
        assert!(error
            .to_string()
            .starts_with("failed to read source does/not/exist.json: "));
    }

    #[test]
    fn test_open_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(&path, "{").unwrap();
        assert!(open(&path).is_err());
    }
}
