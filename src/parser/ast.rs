//! Abstract Syntax Tree definitions for row expressions.

use std::fmt;

/// Byte range of a token within the expression source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// An identifier together with where it appeared.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// A parsed row expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal constant.
    Literal(Literal),
    /// Bare identifier: a column reference before resolution, an intrinsic after.
    Identifier(Identifier),
    /// Observable accessor `name.value()` produced by the resolver.
    Accessor(Identifier),
    /// Function call.
    Call {
        function: Identifier,
        arguments: Vec<Expr>,
    },
    /// Unary operation.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `condition ? then_branch : else_branch`.
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

impl Expr {
    /// Visits every identifier in the tree, in source order.
    ///
    /// The callback receives the identifier and its role in the expression.
    pub fn walk_identifiers<'a>(&'a self, f: &mut impl FnMut(&'a Identifier, IdentifierRole)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Identifier(id) => f(id, IdentifierRole::Symbol),
            Expr::Accessor(id) => f(id, IdentifierRole::Accessor),
            Expr::Call {
                function,
                arguments,
            } => {
                f(function, IdentifierRole::Function);
                for arg in arguments {
                    arg.walk_identifiers(f);
                }
            }
            Expr::Unary { operand, .. } => operand.walk_identifiers(f),
            Expr::Binary { left, right, .. } => {
                left.walk_identifiers(f);
                right.walk_identifiers(f);
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.walk_identifiers(f);
                then_branch.walk_identifiers(f);
                else_branch.walk_identifiers(f);
            }
        }
    }
}

/// Position an identifier occupies in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierRole {
    /// Plain identifier.
    Symbol,
    /// Receiver of `.value()`.
    Accessor,
    /// Name of a called function.
    Function,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (-).
    Neg,
    /// Logical negation (!).
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    /// Parses an operator token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Lte,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Gte,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Neq,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Returns true for `< <= > >= == !=`.
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
                | BinaryOp::Eq
                | BinaryOp::Neq
        )
    }

    /// Returns true for `&&` and `||`.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
