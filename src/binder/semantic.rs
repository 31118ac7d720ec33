//! Semantic analysis and binding.

use crate::error::{FlowError, Result};
use crate::parser::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::types::{DataType, Value};

use super::expression::{BoundExpression, BuiltinFunction};
use super::scope::{BinderScope, Intrinsic};

/// Binds a parsed expression against typed parameters.
pub struct Binder<'a> {
    source: &'a str,
    scope: BinderScope,
}

impl<'a> Binder<'a> {
    /// Creates a binder for `source` with the given ordered parameters.
    #[must_use]
    pub fn new(source: &'a str, parameters: &[(String, DataType)]) -> Self {
        Binder {
            source,
            scope: BinderScope::new(parameters),
        }
    }

    /// Binds an expression tree, checking types bottom-up.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` for unknown symbols or functions, and
    /// `CompilationError` for type errors.
    pub fn bind(&self, expr: &Expr) -> Result<BoundExpression> {
        match expr {
            Expr::Literal(literal) => Ok(BoundExpression::Literal {
                value: match literal {
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::Int64(i) => Value::Int64(*i),
                    Literal::Float64(f) => Value::Float64(*f),
                    Literal::String(s) => Value::String(s.clone()),
                },
            }),
            Expr::Accessor(id) => match self.scope.parameter(&id.name) {
                Some(p) => Ok(BoundExpression::Parameter {
                    index: p.index,
                    data_type: p.data_type,
                }),
                None => Err(self.unresolved(&id.name)),
            },
            Expr::Identifier(id) => {
                if let Some(p) = self.scope.parameter(&id.name) {
                    return Ok(BoundExpression::Parameter {
                        index: p.index,
                        data_type: p.data_type,
                    });
                }
                match BinderScope::intrinsic(&id.name) {
                    Some(Intrinsic::Pi) => Ok(BoundExpression::Literal {
                        value: Value::Float64(std::f64::consts::PI),
                    }),
                    Some(Intrinsic::E) => Ok(BoundExpression::Literal {
                        value: Value::Float64(std::f64::consts::E),
                    }),
                    Some(Intrinsic::Entry) => Ok(BoundExpression::Entry),
                    None => Err(self.unresolved(&id.name)),
                }
            }
            Expr::Call {
                function,
                arguments,
            } => {
                let Some(builtin) = BuiltinFunction::from_name(&function.name) else {
                    return Err(self.unresolved(&function.name));
                };
                if arguments.len() != builtin.arity() {
                    return Err(self.compile_error(format!(
                        "{}() takes {} argument(s), got {}",
                        builtin.name(),
                        builtin.arity(),
                        arguments.len()
                    )));
                }
                let arguments = arguments
                    .iter()
                    .map(|a| self.bind(a))
                    .collect::<Result<Vec<_>>>()?;
                let types: Vec<DataType> = arguments.iter().map(BoundExpression::data_type).collect();
                if let Some(bad) = types.iter().find(|t| !t.is_numeric()) {
                    return Err(self.compile_error(format!(
                        "{}() expects numeric arguments, got {bad}",
                        builtin.name()
                    )));
                }
                Ok(BoundExpression::Function {
                    function: builtin,
                    data_type: builtin.output_type(&types),
                    arguments,
                })
            }
            Expr::Unary { op, operand } => {
                let operand = self.bind(operand)?;
                let operand_type = operand.data_type();
                let data_type = match op {
                    UnaryOp::Neg if operand_type.is_numeric() => operand_type,
                    UnaryOp::Not if operand_type == DataType::Bool => DataType::Bool,
                    UnaryOp::Neg => {
                        return Err(self.compile_error(format!("cannot negate {operand_type}")))
                    }
                    UnaryOp::Not => {
                        return Err(self.compile_error(format!("'!' expects BOOL, got {operand_type}")))
                    }
                };
                Ok(BoundExpression::Unary {
                    op: *op,
                    operand: Box::new(operand),
                    data_type,
                })
            }
            Expr::Binary { left, op, right } => self.bind_binary(left, *op, right),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.bind(condition)?;
                if condition.data_type() != DataType::Bool {
                    return Err(self.compile_error(format!(
                        "condition must be BOOL, got {}",
                        condition.data_type()
                    )));
                }
                let then_branch = self.bind(then_branch)?;
                let else_branch = self.bind(else_branch)?;
                let (a, b) = (then_branch.data_type(), else_branch.data_type());
                let data_type = if a == b {
                    a
                } else {
                    a.promote(b).ok_or_else(|| {
                        self.compile_error(format!("conditional branches differ: {a} vs {b}"))
                    })?
                };
                Ok(BoundExpression::Conditional {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                    data_type,
                })
            }
        }
    }

    fn bind_binary(&self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<BoundExpression> {
        let left = Box::new(self.bind(left)?);
        let right = Box::new(self.bind(right)?);
        let (lt, rt) = (left.data_type(), right.data_type());

        if op.is_logical() {
            if lt != DataType::Bool || rt != DataType::Bool {
                return Err(self.compile_error(format!("'{op}' expects BOOL operands, got {lt} and {rt}")));
            }
            return Ok(BoundExpression::Logical { left, op, right });
        }

        if op.is_comparison() {
            let ordered = matches!(op, BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte);
            let comparable = lt.promote(rt).is_some()
                || (lt == rt && (lt == DataType::String || (lt == DataType::Bool && !ordered)));
            if !comparable {
                return Err(self.compile_error(format!("cannot compare {lt} {op} {rt}")));
            }
            return Ok(BoundExpression::Comparison { left, op, right });
        }

        let data_type = lt
            .promote(rt)
            .ok_or_else(|| self.compile_error(format!("cannot apply '{op}' to {lt} and {rt}")))?;
        Ok(BoundExpression::Arithmetic {
            left,
            op,
            right,
            data_type,
        })
    }

    fn unresolved(&self, name: &str) -> FlowError {
        FlowError::UnresolvedReference(format!(
            "'{name}' in '{}' is neither a column nor a known symbol",
            self.source
        ))
    }

    fn compile_error(&self, message: String) -> FlowError {
        FlowError::CompilationError {
            source_text: self.source.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn bind(source: &str, params: &[(&str, DataType)]) -> Result<BoundExpression> {
        let params: Vec<(String, DataType)> =
            params.iter().map(|(n, t)| ((*n).to_string(), *t)).collect();
        let expr = parse_expression(source)?;
        Binder::new(source, &params).bind(&expr)
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        let bound = bind("n.value() * 2 + 1", &[("n", DataType::Int64)]).unwrap();
        assert_eq!(bound.data_type(), DataType::Int64);
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let bound = bind("n.value() / 2.0", &[("n", DataType::Int64)]).unwrap();
        assert_eq!(bound.data_type(), DataType::Float64);
    }

    #[test]
    fn test_comparison_is_bool() {
        let bound = bind("x.value() > 0", &[("x", DataType::Float64)]).unwrap();
        assert_eq!(bound.data_type(), DataType::Bool);
    }

    #[test]
    fn test_unknown_symbol_is_unresolved() {
        let err = bind("x.value() > threshold", &[("x", DataType::Float64)]).unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference(ref m) if m.contains("threshold")));
    }

    #[test]
    fn test_logical_requires_bool() {
        let err = bind("x.value() && true", &[("x", DataType::Float64)]).unwrap_err();
        assert!(matches!(err, FlowError::CompilationError { .. }));
    }

    #[test]
    fn test_function_arity_checked() {
        let err = bind("pow(2.0)", &[]).unwrap_err();
        assert!(matches!(err, FlowError::CompilationError { ref message, .. } if message.contains("pow")));
    }

    #[test]
    fn test_intrinsics() {
        assert_eq!(bind("entry % 2 == 0", &[]).unwrap().data_type(), DataType::Bool);
        assert_eq!(bind("2 * pi", &[]).unwrap().data_type(), DataType::Float64);
    }

    #[test]
    fn test_conditional_promotes_branches() {
        let bound = bind("true ? 1 : 2.5", &[]).unwrap();
        assert_eq!(bound.data_type(), DataType::Float64);
        assert!(bind("true ? 1 : \"one\"", &[]).is_err());
    }
}
