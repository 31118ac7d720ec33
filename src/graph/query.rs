//! Booked queries and their per-selection instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::query::Aggregation;

use super::node::{NodeId, NodeState};

/// Nodes one evaluation of a query instance reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceNodes {
    /// Selection gating the rows.
    pub selection: NodeId,
    /// Fill groups, each a list of column nodes.
    pub fills: Vec<Vec<NodeId>>,
}

impl InstanceNodes {
    /// Selection first, then every fill column in order.
    #[must_use]
    pub fn inputs(&self) -> Vec<NodeId> {
        std::iter::once(self.selection)
            .chain(self.fills.iter().flatten().copied())
            .collect()
    }

    /// Regroups flattened fill columns like `shape`.
    pub(crate) fn from_inputs(selection: NodeId, fills: &[NodeId], shape: &[Vec<NodeId>]) -> Self {
        let mut rest = fills.iter().copied();
        InstanceNodes {
            selection,
            fills: shape
                .iter()
                .map(|group| rest.by_ref().take(group.len()).collect())
                .collect(),
        }
    }
}

/// A query evaluated at one selection.
#[derive(Debug, Clone)]
pub struct QueryInstance {
    /// Public name of the booked selection.
    pub selection_name: String,
    /// Nominal evaluation.
    pub nominal: InstanceNodes,
    /// Variation name -> evaluation with substituted inputs.
    pub variations: BTreeMap<String, InstanceNodes>,
}

/// A booked query.
#[derive(Clone)]
pub struct QueryNode {
    /// Query name.
    pub name: String,
    /// Aggregation shared by every instance.
    pub aggregation: Arc<dyn Aggregation>,
    /// Fill groups as declared.
    pub fills: Vec<Vec<NodeId>>,
    /// One instance per booked selection, in booking order.
    pub instances: Vec<QueryInstance>,
    /// Lifecycle state.
    pub state: NodeState,
}

impl QueryNode {
    /// Instance booked at the named selection.
    #[must_use]
    pub fn instance(&self, selection: &str) -> Option<&QueryInstance> {
        self.instances.iter().find(|i| i.selection_name == selection)
    }
}

impl fmt::Debug for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryNode")
            .field("name", &self.name)
            .field("aggregation", &self.aggregation.name())
            .field("fills", &self.fills)
            .field("instances", &self.instances)
            .field("state", &self.state)
            .finish()
    }
}
