//! Selection declarations and the selection context.
//!
//! Selections form a forest under the implicit root. A new selection
//! compounds onto the preselection named by a [`SelectionContext`]: the
//! dataflow keeps one context that advances with every `apply`, which
//! yields sequential chains, while an explicit context or `.at(name)`
//! branches from any earlier selection.

use super::column::ColumnSpec;
use super::node::{NodeId, SelectionOp};

/// Declaration of a selection, handed to `Dataflow::apply`.
#[derive(Debug, Clone)]
pub struct SelectionSpec {
    pub(crate) operation: SelectionOp,
    pub(crate) decision: ColumnSpec,
    pub(crate) preselection: Option<String>,
}

impl SelectionSpec {
    /// A selection computing its decision from any column declaration.
    #[must_use]
    pub fn new(operation: SelectionOp, decision: ColumnSpec) -> Self {
        SelectionSpec {
            operation,
            decision,
            preselection: None,
        }
    }

    /// A boolean cut given as an expression.
    pub fn filter(expression: impl Into<String>) -> Self {
        Self::new(SelectionOp::Filter, ColumnSpec::expression(expression))
    }

    /// A multiplicative weight given as an expression.
    pub fn weight(expression: impl Into<String>) -> Self {
        Self::new(SelectionOp::Weight, ColumnSpec::expression(expression))
    }

    /// Compounds onto the named selection instead of the current context.
    #[must_use]
    pub fn at(mut self, preselection: impl Into<String>) -> Self {
        self.preselection = Some(preselection.into());
        self
    }

    /// Returns the operation.
    #[must_use]
    pub fn operation(&self) -> SelectionOp {
        self.operation
    }
}

/// Immutable pointer to the selection new selections compound onto.
///
/// A context remembers which dataflow handed it out. The root context
/// belongs to every dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionContext {
    owner: u64,
    current: Option<NodeId>,
}

impl SelectionContext {
    /// Context at the root: all rows pass with the dataset weight.
    #[must_use]
    pub fn root() -> Self {
        SelectionContext {
            owner: 0,
            current: None,
        }
    }

    pub(crate) fn at(owner: u64, selection: NodeId) -> Self {
        SelectionContext {
            owner,
            current: Some(selection),
        }
    }

    /// Id of the dataflow that handed out this context; 0 at the root.
    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    /// The preselection a new selection in this context receives.
    #[must_use]
    pub fn preselection(&self) -> Option<NodeId> {
        self.current
    }

    /// Returns true at the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.current.is_none()
    }
}
