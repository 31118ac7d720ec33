//! Row expression parsing.
//!
//! Expressions are the textual formulas used by expression columns and
//! selections, e.g. `x > 0 && abs(eta) < 2.5`.

pub mod ast;
mod grammar;

pub use grammar::parse_expression;
