//! In-memory grid source.

use crate::error::PipelineError;
use crate::sources::GridSource;
use crate::types::Missing;

use ndarray::ArrayD;

struct Variable {
    name: String,
    data: ArrayD<f64>,
    missing: Option<Missing<f64>>,
}

/// A source whose variables are held in memory.
pub struct MemorySource {
    id: String,
    variables: Vec<Variable>,
}

impl MemorySource {
    /// Return a new MemorySource with no variables.
    pub fn new(id: impl Into<String>) -> Self {
        MemorySource {
            id: id.into(),
            variables: Vec::new(),
        }
    }

    /// Return this MemorySource with an additional variable.
    pub fn with_variable(self, name: &str, data: ArrayD<f64>) -> Self {
        self.with_variable_missing(name, data, None)
    }

    /// Return this MemorySource with an additional variable and its missing data descriptor.
    pub fn with_variable_missing(
        mut self,
        name: &str,
        data: ArrayD<f64>,
        missing: Option<Missing<f64>>,
    ) -> Self {
        self.variables.push(Variable {
            name: name.to_string(),
            data,
            missing,
        });
        self
    }

    fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }
}

impl GridSource for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|variable| variable.name.clone())
            .collect()
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, PipelineError> {
        self.variable(name)
            .map(|variable| variable.data.clone())
            .ok_or_else(|| PipelineError::MissingVariable {
                path: self.id.clone(),
                name: name.to_string(),
            })
    }

    fn missing(&self, name: &str) -> Option<Missing<f64>> {
        self.variable(name)
            .and_then(|variable| variable.missing.clone())
    }
}
