//! Binder module for expression analysis.
//!
//! The binder performs two separate jobs:
//! - Resolution: discovering which identifiers of an expression name
//!   registered columns and rewriting them into observable accessors.
//! - Binding: type-checking a resolved expression against typed
//!   parameters, as done by the built-in interpreter.

mod expression;
mod resolver;
mod scope;
mod semantic;

pub use expression::{BoundExpression, BuiltinFunction};
pub use resolver::{resolve, resolve_with, Resolution};
pub use scope::{BinderScope, BoundParameter, Intrinsic};
pub use semantic::Binder;
