//! Built-in tree-walking expression compiler.

use std::sync::Arc;

use crate::binder::{Binder, BoundExpression};
use crate::error::{FlowError, Result};
use crate::executor::evaluate;
use crate::parser::parse_expression;
use crate::types::{DataType, Value};

use super::{Arguments, CompiledExpression, ExpressionCompiler};

/// Default compiler: parses, type-checks and interprets expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    /// Creates a new interpreter.
    #[must_use]
    pub fn new() -> Self {
        Interpreter
    }
}

impl ExpressionCompiler for Interpreter {
    fn compile(
        &self,
        source: &str,
        parameters: &[(String, DataType)],
    ) -> Result<Arc<dyn CompiledExpression>> {
        let ast = parse_expression(source).map_err(|e| match e {
            FlowError::ResolutionError { message, .. } => FlowError::CompilationError {
                source_text: source.to_string(),
                message,
            },
            other => other,
        })?;
        let bound = Binder::new(source, parameters).bind(&ast)?;
        Ok(Arc::new(Interpreted { bound }))
    }
}

/// A bound expression ready for row-wise evaluation.
#[derive(Debug)]
struct Interpreted {
    bound: BoundExpression,
}

impl CompiledExpression for Interpreted {
    fn output_type(&self) -> DataType {
        self.bound.data_type()
    }

    fn evaluate(&self, arguments: &mut dyn Arguments) -> Result<Value> {
        evaluate(&self.bound, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        values: Vec<Value>,
        reads: Vec<usize>,
    }

    impl Arguments for Fixed {
        fn value(&mut self, index: usize) -> Result<Value> {
            self.reads.push(index);
            Ok(self.values[index].clone())
        }

        fn entry(&self) -> u64 {
            7
        }
    }

    fn params(list: &[(&str, DataType)]) -> Vec<(String, DataType)> {
        list.iter().map(|(n, t)| ((*n).to_string(), *t)).collect()
    }

    #[test]
    fn test_compile_and_evaluate() {
        let compiled = Interpreter
            .compile(
                "x.value() * 2.0 + y.value()",
                &params(&[("x", DataType::Float64), ("y", DataType::Int64)]),
            )
            .unwrap();
        assert_eq!(compiled.output_type(), DataType::Float64);
        let mut args = Fixed {
            values: vec![Value::Float64(1.5), Value::Int64(4)],
            reads: vec![],
        };
        assert_eq!(compiled.evaluate(&mut args).unwrap(), Value::Float64(7.0));
    }

    #[test]
    fn test_untaken_branch_is_not_read() {
        let compiled = Interpreter
            .compile(
                "false && y.value()",
                &params(&[("y", DataType::Bool)]),
            )
            .unwrap();
        let mut args = Fixed {
            values: vec![Value::Bool(true)],
            reads: vec![],
        };
        assert_eq!(compiled.evaluate(&mut args).unwrap(), Value::Bool(false));
        assert!(args.reads.is_empty());
    }

    #[test]
    fn test_entry_intrinsic() {
        let compiled = Interpreter.compile("entry + 1", &[]).unwrap();
        let mut args = Fixed {
            values: vec![],
            reads: vec![],
        };
        assert_eq!(compiled.evaluate(&mut args).unwrap(), Value::Int64(8));
    }

    #[test]
    fn test_syntax_error_is_compilation_error() {
        let err = Interpreter.compile("1 +", &[]).err().expect("expected compilation error");
        assert!(matches!(err, FlowError::CompilationError { ref source_text, .. } if source_text == "1 +"));
    }
}
