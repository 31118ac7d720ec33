//! Column declarations.

use std::fmt;
use std::sync::Arc;

use crate::compile::Definition;
use crate::types::{DataType, Value};

#[derive(Clone)]
pub(crate) enum ColumnSource {
    Constant(Value),
    Expression(String),
    Field(String),
    Definition {
        definition: Arc<dyn Definition>,
        arguments: Vec<String>,
    },
}

/// Declaration of a column, handed to `Dataflow::define`.
#[derive(Clone)]
pub struct ColumnSpec {
    pub(crate) source: ColumnSource,
    pub(crate) data_type: Option<DataType>,
}

impl ColumnSpec {
    /// A column holding the same value on every row.
    pub fn constant(value: impl Into<Value>) -> Self {
        ColumnSpec {
            source: ColumnSource::Constant(value.into()),
            data_type: None,
        }
    }

    /// A column computed from a textual expression over other columns.
    ///
    /// Identifiers naming existing columns or selections become
    /// dependencies; other identifiers are left for the compiler.
    pub fn expression(source: impl Into<String>) -> Self {
        ColumnSpec {
            source: ColumnSource::Expression(source.into()),
            data_type: None,
        }
    }

    /// A column read from the named dataset field.
    pub fn field(name: impl Into<String>) -> Self {
        ColumnSpec {
            source: ColumnSource::Field(name.into()),
            data_type: None,
        }
    }

    /// A column computed by an external definition from named columns.
    pub fn definition<I, S>(definition: impl Definition + 'static, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::shared_definition(Arc::new(definition), arguments)
    }

    /// Like [`ColumnSpec::definition`], sharing an existing definition.
    pub fn shared_definition<I, S>(definition: Arc<dyn Definition>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSpec {
            source: ColumnSource::Definition {
                definition,
                arguments: arguments.into_iter().map(Into::into).collect(),
            },
            data_type: None,
        }
    }

    /// Declares the column type. The produced type must equal it, or be
    /// INT64 when FLOAT64 is declared.
    #[must_use]
    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Short description used in logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.source {
            ColumnSource::Constant(v) => format!("constant {v}"),
            ColumnSource::Expression(s) => format!("expression '{s}'"),
            ColumnSource::Field(f) => format!("field '{f}'"),
            ColumnSource::Definition { arguments, .. } => {
                format!("definition({})", arguments.join(", "))
            }
        }
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("source", &self.describe())
            .field("data_type", &self.data_type)
            .finish()
    }
}

impl From<Value> for ColumnSpec {
    fn from(value: Value) -> Self {
        ColumnSpec::constant(value)
    }
}

impl From<&str> for ColumnSpec {
    fn from(source: &str) -> Self {
        ColumnSpec::expression(source)
    }
}
