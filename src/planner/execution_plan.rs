//! Execution plan: the pruned, dependency-ordered graph of one pass.

use std::fmt;
use std::sync::Arc;

use crate::graph::{ColumnKind, InstanceNodes, Node, NodeId, NodeKind};
use crate::query::Aggregation;

/// One query evaluation scheduled in the pass.
#[derive(Clone)]
pub struct PlannedInstance {
    /// Query name.
    pub query: String,
    /// Name of the booked selection.
    pub selection: String,
    /// Variation name, None for nominal.
    pub variation: Option<String>,
    /// Aggregation to evaluate.
    pub aggregation: Arc<dyn Aggregation>,
    /// Nodes the evaluation reads.
    pub nodes: InstanceNodes,
}

impl fmt::Debug for PlannedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedInstance")
            .field("query", &self.query)
            .field("selection", &self.selection)
            .field("variation", &self.variation)
            .field("aggregation", &self.aggregation.name())
            .field("nodes", &self.nodes)
            .finish()
    }
}

/// Everything a row engine needs to run one pass.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Arena snapshot, indexed by `NodeId`.
    pub(crate) nodes: Vec<Node>,
    /// Reachable nodes, dependencies first.
    pub(crate) order: Vec<NodeId>,
    /// Scheduled query evaluations.
    pub(crate) instances: Vec<PlannedInstance>,
    /// Weight of the root selection.
    pub(crate) root_weight: f64,
}

impl ExecutionPlan {
    /// Returns a node of the snapshot.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Size of the arena snapshot.
    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes computed by the pass, in dependency order.
    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Query evaluations of the pass.
    #[must_use]
    pub fn instances(&self) -> &[PlannedInstance] {
        &self.instances
    }

    /// Weight every row starts from.
    #[must_use]
    pub fn root_weight(&self) -> f64 {
        self.root_weight
    }

    /// Returns true if the pass has nothing to evaluate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn label(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    fn format_node(&self, f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
        let inputs: Vec<&str> = node.kind.inputs().iter().map(|i| self.label(*i)).collect();
        match &node.kind {
            NodeKind::Column(kind) => {
                write!(f, "  {} {}: {}", node.id, node.name, kind.name())?;
                match kind {
                    ColumnKind::Constant(v) => write!(f, " {v}")?,
                    ColumnKind::Expression { rewritten, .. } => write!(f, " '{rewritten}'")?,
                    ColumnKind::Field { field } => write!(f, " '{}'", field.name)?,
                    ColumnKind::Definition { .. } => {}
                }
                write!(f, " -> {}", node.data_type)?;
                if !inputs.is_empty() {
                    write!(f, " [{}]", inputs.join(", "))?;
                }
                writeln!(f)
            }
            NodeKind::Selection {
                operation,
                preselection,
                decision,
            } => {
                let pre = preselection.map_or("<root>", |p| self.label(p));
                writeln!(
                    f,
                    "  {} {}: {} {} on {}",
                    node.id,
                    node.name,
                    operation.name(),
                    self.label(*decision),
                    pre
                )
            }
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for id in &self.order {
            self.format_node(f, self.node(*id))?;
        }
        writeln!(f, "Queries:")?;
        for instance in &self.instances {
            let variation = instance.variation.as_deref().unwrap_or("nominal");
            let fills: Vec<String> = instance
                .nodes
                .fills
                .iter()
                .map(|group| {
                    let names: Vec<&str> = group.iter().map(|c| self.label(*c)).collect();
                    format!("({})", names.join(", "))
                })
                .collect();
            writeln!(
                f,
                "  {}@{} [{variation}]: {}{} at {}",
                instance.query,
                instance.selection,
                instance.aggregation.name(),
                fills.join(""),
                self.label(instance.nodes.selection)
            )?;
        }
        Ok(())
    }
}
