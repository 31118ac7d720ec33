//! Error types for lazyflow dataflow operations.

use thiserror::Error;

/// Result type alias using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// Error types for lazyflow dataflow operations.
///
/// Every variant except the I/O and CSV wrappers describes a contract
/// violation made while constructing the graph; none of them is transient.
#[derive(Debug, Error)]
pub enum FlowError {
    // ==================== Declaration Errors ====================
    /// A column, selection or query name is already taken.
    #[error("Naming conflict: {kind} '{name}' already exists")]
    NamingConflict { kind: &'static str, name: String },

    /// A referenced column, selection, query or symbol does not exist.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// The expression resolver could not parse an expression.
    #[error("Resolution error in '{expression}' at line {line}, column {col} near '{fragment}': {message}")]
    ResolutionError {
        expression: String,
        fragment: String,
        line: usize,
        col: usize,
        message: String,
    },

    /// The expression compiler rejected an expression.
    #[error("Compilation error in '{source_text}': {message}")]
    CompilationError { source_text: String, message: String },

    /// Type mismatch between a declaration and what it consumes.
    #[error("Type error in {context}: expected {expected}, got {actual}")]
    TypeError {
        context: String,
        expected: String,
        actual: String,
    },

    /// Wrong number of arguments handed to a query fill or definition.
    #[error("Arity error in {context}: expected {expected} argument(s), got {actual}")]
    ArityError {
        context: String,
        expected: usize,
        actual: usize,
    },

    // ==================== Variation Errors ====================
    /// A variation could not be registered or propagated.
    #[error("Variation error for '{name}': {message}")]
    VariationError { name: String, message: String },

    /// A result was requested for a variation the query does not carry.
    #[error("Unknown variation '{variation}' for query '{query}'")]
    UnknownVariation { query: String, variation: String },

    // ==================== Lifecycle Errors ====================
    /// The dataflow is write-locked after materialization.
    #[error("Dataflow already materialized: cannot {0}")]
    Materialized(String),

    // ==================== Execution Errors ====================
    /// Dataset binding or reading failed.
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// General execution errors.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Worker thread panicked during a parallel pass.
    #[error("Worker thread panicked: {0}")]
    ThreadPanic(String),

    /// I/O error while reading a dataset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error while reading a dataset.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FlowError {
    /// Shorthand for a type mismatch error.
    pub(crate) fn type_error(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        FlowError::TypeError {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Shorthand for a variation error.
    pub(crate) fn variation(name: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::VariationError {
            name: name.into(),
            message: message.into(),
        }
    }
}
