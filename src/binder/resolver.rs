//! Expression resolver.
//!
//! Finds which identifiers of a row expression name registered columns and
//! rewrites those references into observable accessors (`name.value()`), so
//! the compiled callable decides when each column value is actually read.

use std::collections::{BTreeSet, HashSet};

use crate::error::{FlowError, Result};
use crate::parser::ast::{IdentifierRole, Span};
use crate::parser::parse_expression;

/// Outcome of resolving one expression against the known column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Known columns referenced by the expression.
    pub dependencies: BTreeSet<String>,
    /// Expression with every dependency rewritten to `name.value()`.
    pub rewritten: String,
}

impl Resolution {
    /// Dependencies in the order they are bound as compiler parameters.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }
}

/// Resolves an expression against a predicate telling which names are columns.
///
/// Identifiers that are not known columns are passed through verbatim; they
/// are left for the compiler to interpret (math functions, constants, row
/// intrinsics). Function names are never treated as dependencies.
///
/// # Errors
///
/// Returns `ResolutionError` if the expression is syntactically invalid, and
/// `UnresolvedReference` if an explicit `name.value()` accessor names an
/// unknown column.
pub fn resolve<F>(expression: &str, is_known: F) -> Result<Resolution>
where
    F: Fn(&str) -> bool,
{
    let ast = parse_expression(expression)?;

    let mut dependencies = BTreeSet::new();
    let mut rewrites: Vec<Span> = Vec::new();
    let mut unknown_accessor = None;

    ast.walk_identifiers(&mut |id, role| match role {
        IdentifierRole::Symbol if is_known(&id.name) => {
            dependencies.insert(id.name.clone());
            rewrites.push(id.span);
        }
        IdentifierRole::Accessor => {
            if is_known(&id.name) {
                dependencies.insert(id.name.clone());
            } else if unknown_accessor.is_none() {
                unknown_accessor = Some(id.name.clone());
            }
        }
        IdentifierRole::Symbol | IdentifierRole::Function => {}
    });

    if let Some(name) = unknown_accessor {
        return Err(FlowError::UnresolvedReference(format!(
            "column '{name}' accessed in '{expression}' is not defined"
        )));
    }

    Ok(Resolution {
        dependencies,
        rewritten: rewrite(expression, &mut rewrites),
    })
}

/// Resolves an expression against an explicit set of known names.
///
/// # Errors
///
/// See [`resolve`].
pub fn resolve_with(expression: &str, known: &HashSet<String>) -> Result<Resolution> {
    resolve(expression, |name| known.contains(name))
}

fn rewrite(expression: &str, spans: &mut [Span]) -> String {
    spans.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(expression.len() + spans.len() * 8);
    let mut cursor = 0;
    for span in spans.iter() {
        out.push_str(&expression[cursor..span.start]);
        out.push_str(&expression[span.start..span.end]);
        out.push_str(".value()");
        cursor = span.end;
    }
    out.push_str(&expression[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_resolve_known_and_external_identifiers() {
        let res = resolve_with("sqrt(x*x + y*y) < pi", &known(&["x", "y"])).unwrap();
        assert_eq!(res.dependencies, ["x", "y"].iter().map(|s| (*s).to_string()).collect());
        assert_eq!(
            res.rewritten,
            "sqrt(x.value()*x.value() + y.value()*y.value()) < pi"
        );
    }

    #[test]
    fn test_function_names_are_not_dependencies() {
        let res = resolve_with("abs(abs)", &known(&["abs"])).unwrap();
        assert_eq!(res.rewritten, "abs(abs.value())");
        assert_eq!(res.dependencies.len(), 1);
    }

    #[test]
    fn test_existing_accessor_is_kept() {
        let res = resolve_with("x.value() + 1", &known(&["x"])).unwrap();
        assert_eq!(res.rewritten, "x.value() + 1");
        assert!(res.dependencies.contains("x"));
    }

    #[test]
    fn test_unknown_accessor_is_rejected() {
        let err = resolve_with("z.value() + 1", &known(&["x"])).unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference(_)));
    }

    #[test]
    fn test_invalid_syntax_does_not_degrade_to_no_dependencies() {
        let err = resolve_with("x + (y", &known(&["x", "y"])).unwrap_err();
        assert!(matches!(err, FlowError::ResolutionError { .. }));
    }
}
