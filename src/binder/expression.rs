//! Bound expression definitions.

use crate::parser::ast::{BinaryOp, UnaryOp};
use crate::types::{DataType, Value};

/// Expression after binding: every node carries its result type.
#[derive(Debug, Clone)]
pub enum BoundExpression {
    /// Literal value (constant).
    Literal { value: Value },

    /// Observable parameter, read lazily from the row.
    Parameter { index: usize, data_type: DataType },

    /// Current row number.
    Entry,

    /// Negation or logical NOT.
    Unary {
        op: UnaryOp,
        operand: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Arithmetic operations.
    Arithmetic {
        left: Box<BoundExpression>,
        op: BinaryOp,
        right: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Binary comparison.
    Comparison {
        left: Box<BoundExpression>,
        op: BinaryOp,
        right: Box<BoundExpression>,
    },

    /// Short-circuiting AND/OR.
    Logical {
        left: Box<BoundExpression>,
        op: BinaryOp,
        right: Box<BoundExpression>,
    },

    /// `condition ? then_branch : else_branch`, only the taken arm is evaluated.
    Conditional {
        condition: Box<BoundExpression>,
        then_branch: Box<BoundExpression>,
        else_branch: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Built-in math function call.
    Function {
        function: BuiltinFunction,
        arguments: Vec<BoundExpression>,
        data_type: DataType,
    },
}

impl BoundExpression {
    /// Returns the data type of this expression.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            BoundExpression::Literal { value } => value.data_type(),
            BoundExpression::Entry => DataType::Int64,
            BoundExpression::Comparison { .. } | BoundExpression::Logical { .. } => DataType::Bool,
            BoundExpression::Parameter { data_type, .. }
            | BoundExpression::Unary { data_type, .. }
            | BoundExpression::Arithmetic { data_type, .. }
            | BoundExpression::Conditional { data_type, .. }
            | BoundExpression::Function { data_type, .. } => *data_type,
        }
    }
}

/// Math functions understood by the built-in interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Pow,
    Min,
    Max,
    Floor,
    Ceil,
    Round,
    Sin,
    Cos,
    Tan,
    Atan2,
}

impl BuiltinFunction {
    /// Looks up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => BuiltinFunction::Abs,
            "sqrt" => BuiltinFunction::Sqrt,
            "exp" => BuiltinFunction::Exp,
            "log" => BuiltinFunction::Log,
            "log10" => BuiltinFunction::Log10,
            "pow" => BuiltinFunction::Pow,
            "min" => BuiltinFunction::Min,
            "max" => BuiltinFunction::Max,
            "floor" => BuiltinFunction::Floor,
            "ceil" => BuiltinFunction::Ceil,
            "round" => BuiltinFunction::Round,
            "sin" => BuiltinFunction::Sin,
            "cos" => BuiltinFunction::Cos,
            "tan" => BuiltinFunction::Tan,
            "atan2" => BuiltinFunction::Atan2,
            _ => return None,
        })
    }

    /// Returns the name of this function.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Sqrt => "sqrt",
            BuiltinFunction::Exp => "exp",
            BuiltinFunction::Log => "log",
            BuiltinFunction::Log10 => "log10",
            BuiltinFunction::Pow => "pow",
            BuiltinFunction::Min => "min",
            BuiltinFunction::Max => "max",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Sin => "sin",
            BuiltinFunction::Cos => "cos",
            BuiltinFunction::Tan => "tan",
            BuiltinFunction::Atan2 => "atan2",
        }
    }

    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            BuiltinFunction::Pow
            | BuiltinFunction::Min
            | BuiltinFunction::Max
            | BuiltinFunction::Atan2 => 2,
            _ => 1,
        }
    }

    /// Result type for numeric arguments of the given types.
    ///
    /// `abs`, `min` and `max` keep integers integral; everything else
    /// yields FLOAT64.
    #[must_use]
    pub fn output_type(&self, argument_types: &[DataType]) -> DataType {
        match self {
            BuiltinFunction::Abs | BuiltinFunction::Min | BuiltinFunction::Max => argument_types
                .iter()
                .copied()
                .try_fold(DataType::Int64, DataType::promote)
                .unwrap_or(DataType::Float64),
            _ => DataType::Float64,
        }
    }
}
