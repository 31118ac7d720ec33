//! Arena nodes of a dataflow graph.

use std::fmt;
use std::sync::Arc;

use crate::compile::{CompiledExpression, Definition};
use crate::dataset::DatasetField;
use crate::types::{DataType, Value};

/// Index of a node in its dataflow's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Position in the arena, which is also the declaration order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Registered, not yet computed.
    Declared,
    /// Computed by the materialization pass.
    Materialized,
}

/// How a selection combines its decision with its preselection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOp {
    /// Boolean cut: `passed = pre.passed && decision`.
    Filter,
    /// Multiplicative weight: `weight = pre.weight * decision`.
    Weight,
}

impl SelectionOp {
    /// Type of the selection when read as a column.
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            SelectionOp::Filter => DataType::Bool,
            SelectionOp::Weight => DataType::Float64,
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SelectionOp::Filter => "filter",
            SelectionOp::Weight => "weight",
        }
    }
}

/// What a column computes per row.
#[derive(Clone)]
pub enum ColumnKind {
    /// The same value on every row.
    Constant(Value),
    /// A compiled expression over other nodes.
    Expression {
        source: String,
        rewritten: String,
        compiled: Arc<dyn CompiledExpression>,
        arguments: Vec<NodeId>,
    },
    /// A field read from the dataset.
    Field { field: DatasetField },
    /// An external computation over other nodes.
    Definition {
        definition: Arc<dyn Definition>,
        arguments: Vec<NodeId>,
    },
}

impl ColumnKind {
    /// Nodes this column reads, in parameter order.
    #[must_use]
    pub fn arguments(&self) -> &[NodeId] {
        match self {
            ColumnKind::Expression { arguments, .. } | ColumnKind::Definition { arguments, .. } => {
                arguments
            }
            ColumnKind::Constant(_) | ColumnKind::Field { .. } => &[],
        }
    }

    /// Returns the kind name used in plans.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Constant(_) => "constant",
            ColumnKind::Expression { .. } => "expression",
            ColumnKind::Field { .. } => "field",
            ColumnKind::Definition { .. } => "definition",
        }
    }

    fn with_arguments(&self, arguments: Vec<NodeId>) -> ColumnKind {
        match self {
            ColumnKind::Expression {
                source,
                rewritten,
                compiled,
                ..
            } => ColumnKind::Expression {
                source: source.clone(),
                rewritten: rewritten.clone(),
                compiled: Arc::clone(compiled),
                arguments,
            },
            ColumnKind::Definition { definition, .. } => ColumnKind::Definition {
                definition: Arc::clone(definition),
                arguments,
            },
            other => other.clone(),
        }
    }
}

impl fmt::Debug for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            ColumnKind::Expression {
                source, arguments, ..
            } => f
                .debug_struct("Expression")
                .field("source", source)
                .field("arguments", arguments)
                .finish_non_exhaustive(),
            ColumnKind::Field { field } => f.debug_struct("Field").field("field", field).finish(),
            ColumnKind::Definition { arguments, .. } => f
                .debug_struct("Definition")
                .field("arguments", arguments)
                .finish_non_exhaustive(),
        }
    }
}

/// Column or selection payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A per-row value.
    Column(ColumnKind),
    /// A compounding filter or weight.
    Selection {
        operation: SelectionOp,
        /// None means the root selection.
        preselection: Option<NodeId>,
        /// Anonymous column holding the raw decision.
        decision: NodeId,
    },
}

impl NodeKind {
    /// Nodes that must be computed before this one.
    ///
    /// For selections the preselection comes first, then the decision.
    #[must_use]
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Column(kind) => kind.arguments().to_vec(),
            NodeKind::Selection {
                preselection,
                decision,
                ..
            } => preselection.iter().copied().chain([*decision]).collect(),
        }
    }

    /// Same node with its inputs replaced, in [`NodeKind::inputs`] order.
    pub(crate) fn with_inputs(&self, inputs: Vec<NodeId>) -> NodeKind {
        match self {
            NodeKind::Column(kind) => NodeKind::Column(kind.with_arguments(inputs)),
            NodeKind::Selection {
                operation,
                preselection,
                decision,
            } => {
                let mut inputs = inputs.into_iter();
                let preselection = (*preselection).and_then(|_| inputs.next());
                NodeKind::Selection {
                    operation: *operation,
                    preselection,
                    decision: inputs.next().unwrap_or(*decision),
                }
            }
        }
    }

    /// Returns true for selections.
    #[must_use]
    pub fn is_selection(&self) -> bool {
        matches!(self, NodeKind::Selection { .. })
    }
}

/// One node of the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// Arena index.
    pub id: NodeId,
    /// Public name, or a derived label for anonymous nodes.
    pub name: String,
    /// Payload.
    pub kind: NodeKind,
    /// Type of the per-row value.
    pub data_type: DataType,
    /// Lifecycle state.
    pub state: NodeState,
    /// Nominal node and variation name, for variation instances.
    pub variation_of: Option<(NodeId, String)>,
}
