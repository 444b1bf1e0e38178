//! Output record schemas.
//!
//! An output schema is an Avro record whose fields are `int`, `long`, `float`, `double` or
//! `string`, optionally in a union with `null`.

use crate::error::PipelineError;
use crate::merge::OutputColumn;
use crate::types::keys::{DATE, LATITUDE, LONGITUDE, TIME};

use apache_avro::Schema;
use std::path::Path;
use strum_macros::Display;

/// Type of an output field.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum FieldKind {
    Int,
    Long,
    Float,
    Double,
    String,
}

impl FieldKind {
    fn from_schema(schema: &Schema) -> Option<Self> {
        match schema {
            Schema::Int => Some(Self::Int),
            Schema::Long => Some(Self::Long),
            Schema::Float => Some(Self::Float),
            Schema::Double => Some(Self::Double),
            Schema::String => Some(Self::String),
            _ => None,
        }
    }
}

/// Whether a field may be omitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldLayout {
    /// The field must always hold a value
    Plain,
    /// The field is a union of `null` and a value, with the given branch indices
    Nullable { null: u32, value: u32 },
}

/// A field of an output schema.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub layout: FieldLayout,
}

impl FieldSpec {
    fn from_field(name: &str, schema: &Schema) -> Result<Self, PipelineError> {
        let unsupported = || PipelineError::SchemaUnsupported {
            reason: format!("field {} has type {:?}", name, schema),
        };
        let (kind, layout) = match schema {
            Schema::Union(union) => match union.variants() {
                [Schema::Null, value] => (
                    FieldKind::from_schema(value),
                    FieldLayout::Nullable { null: 0, value: 1 },
                ),
                [value, Schema::Null] => (
                    FieldKind::from_schema(value),
                    FieldLayout::Nullable { null: 1, value: 0 },
                ),
                _ => (None, FieldLayout::Plain),
            },
            schema => (FieldKind::from_schema(schema), FieldLayout::Plain),
        };
        Ok(FieldSpec {
            name: name.to_string(),
            kind: kind.ok_or_else(unsupported)?,
            layout,
        })
    }

    /// Returns whether the field may be omitted.
    pub fn is_nullable(&self) -> bool {
        matches!(self.layout, FieldLayout::Nullable { .. })
    }
}

/// A parsed output schema and its fields.
#[derive(Clone, Debug)]
pub struct OutputSchema {
    schema: Schema,
    fields: Vec<FieldSpec>,
}

impl OutputSchema {
    /// Load a schema from a file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::SchemaRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a schema from its JSON text.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let schema = Schema::parse_str(text).map_err(PipelineError::SchemaParse)?;
        Self::from_schema(schema)
    }

    /// Check that a schema is a record of supported fields.
    pub fn from_schema(schema: Schema) -> Result<Self, PipelineError> {
        let fields = match &schema {
            Schema::Record(record) => record
                .fields
                .iter()
                .map(|field| FieldSpec::from_field(&field.name, &field.schema))
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(PipelineError::SchemaUnsupported {
                    reason: format!("expected a record, found {:?}", other),
                })
            }
        };
        Ok(OutputSchema { schema, fields })
    }

    /// Derive a schema from the columns of a merged table.
    ///
    /// Quantities are optional doubles, `latitude` and `longitude` are doubles, `time` is an int
    /// and `date` is a string.
    ///
    /// # Arguments
    ///
    /// * `name`: Name of the record
    /// * `columns`: Output columns, in field order
    pub fn derive(name: &str, columns: &[OutputColumn]) -> Result<Self, PipelineError> {
        let fields = columns
            .iter()
            .map(|column| match column {
                OutputColumn::Key(key) => {
                    let kind = match *key {
                        LATITUDE | LONGITUDE => FieldKind::Double,
                        TIME => FieldKind::Int,
                        DATE => FieldKind::String,
                        other => {
                            return Err(PipelineError::SchemaUnsupported {
                                reason: format!("no type known for key column {}", other),
                            })
                        }
                    };
                    Ok(serde_json::json!({"name": key, "type": kind.to_string()}))
                }
                OutputColumn::Quantity { field, .. } => Ok(serde_json::json!({
                    "name": field,
                    "type": ["null", FieldKind::Double.to_string()],
                    "default": null,
                })),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let document = serde_json::json!({
            "type": "record",
            "name": name,
            "fields": fields,
        });
        Self::parse(&document.to_string())
    }

    /// Returns the Avro schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the fields, in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}
