//! Pest parser integration for the row expression grammar.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{FlowError, Result};
use crate::parser::ast::{BinaryOp, Expr, Identifier, Literal, Span, UnaryOp};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct ExpressionParser;

/// Longest source fragment quoted back in a resolution error.
const MAX_FRAGMENT_LEN: usize = 24;

/// Parses a row expression string into an [`Expr`] tree.
///
/// # Errors
///
/// Returns a `ResolutionError` naming the offending fragment if the
/// expression is syntactically invalid.
pub fn parse_expression(source: &str) -> Result<Expr> {
    let mut pairs = ExpressionParser::parse(Rule::expression, source).map_err(|e| {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c))
            | pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        let offset = match e.location {
            pest::error::InputLocation::Pos(p) | pest::error::InputLocation::Span((p, _)) => p,
        };
        resolution_error(source, offset, line, col, e.variant.message().to_string())
    })?;

    let Some(expression) = pairs.next() else {
        return Err(resolution_error(source, 0, 1, 1, "empty expression".into()));
    };
    match expression.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::conditional => build_expr(source, inner),
        _ => Err(resolution_error(source, 0, 1, 1, "empty expression".into())),
    }
}

fn resolution_error(source: &str, offset: usize, line: usize, col: usize, message: String) -> FlowError {
    let rest = source.get(offset..).unwrap_or_default().trim();
    let fragment = if rest.is_empty() {
        "<end of input>".to_string()
    } else {
        rest.chars().take(MAX_FRAGMENT_LEN).collect()
    };
    FlowError::ResolutionError {
        expression: source.to_string(),
        fragment,
        line,
        col,
        message,
    }
}

fn build_expr(source: &str, pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::conditional => build_conditional(source, pair),
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_chain(source, pair),
        Rule::unary => build_unary(source, pair),
        Rule::call => build_call(source, pair),
        Rule::accessor => {
            let id = first_identifier(source, pair)?;
            Ok(Expr::Accessor(id))
        }
        Rule::identifier => Ok(Expr::Identifier(identifier(&pair))),
        Rule::float => {
            let text = pair.as_str();
            let value = text.parse::<f64>().map_err(|e| {
                let (line, col) = pair.line_col();
                resolution_error(source, pair.as_span().start(), line, col, e.to_string())
            })?;
            Ok(Expr::Literal(Literal::Float64(value)))
        }
        Rule::integer => {
            let text = pair.as_str();
            let value = text.parse::<i64>().map_err(|e| {
                let (line, col) = pair.line_col();
                resolution_error(source, pair.as_span().start(), line, col, e.to_string())
            })?;
            Ok(Expr::Literal(Literal::Int64(value)))
        }
        Rule::boolean => Ok(Expr::Literal(Literal::Bool(pair.as_str() == "true"))),
        Rule::string => {
            let inner = pair
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            Ok(Expr::Literal(Literal::String(inner)))
        }
        other => {
            let (line, col) = pair.line_col();
            Err(resolution_error(
                source,
                pair.as_span().start(),
                line,
                col,
                format!("unexpected token {other:?}"),
            ))
        }
    }
}

fn build_conditional(source: &str, pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let Some(first) = inner.next() else {
        return Err(resolution_error(source, 0, 1, 1, "empty conditional".into()));
    };
    let condition = build_expr(source, first)?;
    match (inner.next(), inner.next()) {
        (Some(then_pair), Some(else_pair)) => Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(build_expr(source, then_pair)?),
            else_branch: Box::new(build_expr(source, else_pair)?),
        }),
        _ => Ok(condition),
    }
}

/// Builds a left-associative chain `operand (op operand)*`.
fn build_chain(source: &str, pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let Some(first) = inner.next() else {
        return Err(resolution_error(source, 0, 1, 1, "empty operand".into()));
    };
    let mut left = build_expr(source, first)?;

    while let Some(op_pair) = inner.next() {
        let (line, col) = op_pair.line_col();
        let start = op_pair.as_span().start();
        let Some(op) = BinaryOp::from_token(op_pair.as_str()) else {
            return Err(resolution_error(
                source,
                start,
                line,
                col,
                format!("unknown operator '{}'", op_pair.as_str()),
            ));
        };
        let Some(right_pair) = inner.next() else {
            return Err(resolution_error(source, start, line, col, "missing operand".into()));
        };
        let right = build_expr(source, right_pair)?;
        left = Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn build_unary(source: &str, pair: Pair<Rule>) -> Result<Expr> {
    let mut ops = Vec::new();
    let mut operand = None;

    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::unary_op {
            ops.push(if inner.as_str() == "-" {
                UnaryOp::Neg
            } else {
                UnaryOp::Not
            });
        } else {
            operand = Some(build_expr(source, inner)?);
        }
    }

    let Some(mut expr) = operand else {
        return Err(resolution_error(source, 0, 1, 1, "missing operand".into()));
    };
    // Innermost operator binds first
    for op in ops.into_iter().rev() {
        expr = Expr::Unary {
            op,
            operand: Box::new(expr),
        };
    }
    Ok(expr)
}

fn build_call(source: &str, pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let Some(name) = inner.next() else {
        return Err(resolution_error(source, 0, 1, 1, "missing function name".into()));
    };
    let function = identifier(&name);
    let arguments = inner
        .map(|arg| build_expr(source, arg))
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::Call {
        function,
        arguments,
    })
}

fn first_identifier(source: &str, pair: Pair<Rule>) -> Result<Identifier> {
    let (line, col) = pair.line_col();
    let start = pair.as_span().start();
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| identifier(&p))
        .ok_or_else(|| resolution_error(source, start, line, col, "missing identifier".into()))
}

fn identifier(pair: &Pair<Rule>) -> Identifier {
    let span = pair.as_span();
    Identifier {
        name: pair.as_str().to_string(),
        span: Span {
            start: span.start(),
            end: span.end(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("a + b * 2 > 3 && !c").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::And);
        let Expr::Binary { op, left, .. } = *left else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Gt);
        let Expr::Binary { op, right, .. } = *left else {
            panic!("expected addition");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_parse_conditional_and_call() {
        let expr = parse_expression("x > 0 ? sqrt(x) : -x").unwrap();
        let Expr::Conditional { then_branch, else_branch, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*then_branch, Expr::Call { ref function, .. } if function.name == "sqrt"));
        assert!(matches!(*else_branch, Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(
            parse_expression("1.5e2").unwrap(),
            Expr::Literal(Literal::Float64(150.0))
        );
        assert_eq!(parse_expression("42").unwrap(), Expr::Literal(Literal::Int64(42)));
        assert_eq!(parse_expression("true").unwrap(), Expr::Literal(Literal::Bool(true)));
        assert_eq!(
            parse_expression("\"mu\"").unwrap(),
            Expr::Literal(Literal::String("mu".into()))
        );
    }

    #[test]
    fn test_identifier_starting_with_keyword() {
        let expr = parse_expression("trueness").unwrap();
        assert!(matches!(expr, Expr::Identifier(ref id) if id.name == "trueness"));
    }

    #[test]
    fn test_accessor_span() {
        let expr = parse_expression("  pt.value()").unwrap();
        let Expr::Accessor(id) = expr else {
            panic!("expected accessor");
        };
        assert_eq!(id.name, "pt");
        assert_eq!(id.span, Span { start: 2, end: 4 });
    }

    #[test]
    fn test_invalid_expression_names_fragment() {
        let err = parse_expression("x > > 1").unwrap_err();
        match err {
            FlowError::ResolutionError { fragment, col, .. } => {
                assert_eq!(fragment, "> 1");
                assert_eq!(col, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
