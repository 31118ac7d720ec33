//! Expression compiler contract.
//!
//! The dataflow hands every resolved expression to an [`ExpressionCompiler`]
//! together with its typed observable parameters and gets back a callable.
//! The callable pulls parameter values through [`Arguments`] only when it
//! needs them, so untaken branches of `&&`, `||` and `?:` never compute their
//! columns.

mod interpreter;

use std::sync::Arc;

use crate::error::Result;
use crate::types::{DataType, Value};

pub use interpreter::Interpreter;

/// Observable parameter access for one row.
pub trait Arguments {
    /// Returns the value of parameter `index`, computing it on first use.
    ///
    /// # Errors
    ///
    /// Returns any error raised while computing the underlying column.
    fn value(&mut self, index: usize) -> Result<Value>;

    /// Row number of the entry being evaluated.
    fn entry(&self) -> u64;
}

/// A compiled per-row callable.
pub trait CompiledExpression: Send + Sync {
    /// Type of every value this callable returns.
    fn output_type(&self) -> DataType;

    /// Evaluates the callable for the current row.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` on arithmetic faults, or any error raised
    /// while reading a parameter.
    fn evaluate(&self, arguments: &mut dyn Arguments) -> Result<Value>;
}

/// Turns a resolved expression plus typed parameters into a callable.
pub trait ExpressionCompiler: Send + Sync {
    /// Compiles `source`, where `parameters[i]` is reachable as
    /// `name.value()` and read through `Arguments::value(i)`.
    ///
    /// # Errors
    ///
    /// Returns `CompilationError` carrying the source text on failure.
    fn compile(
        &self,
        source: &str,
        parameters: &[(String, DataType)],
    ) -> Result<Arc<dyn CompiledExpression>>;
}

/// An externally provided per-row computation over named columns.
pub trait Definition: Send + Sync {
    /// Type of the produced value.
    fn output_type(&self) -> DataType;

    /// Expected number of arguments, if fixed.
    fn arity(&self) -> Option<usize> {
        None
    }

    /// Computes the value for one row from already-evaluated arguments.
    ///
    /// # Errors
    ///
    /// Implementations report failures as `ExecutionError`.
    fn evaluate(&self, arguments: &[Value]) -> Result<Value>;
}

impl<F> Definition for (DataType, F)
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn output_type(&self) -> DataType {
        self.0
    }

    fn evaluate(&self, arguments: &[Value]) -> Result<Value> {
        (self.1)(arguments)
    }
}
