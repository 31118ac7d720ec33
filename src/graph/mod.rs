//! Dataflow graph: node arena, columns, selections, variations, queries.

mod column;
mod node;
mod query;
mod registry;
mod selection;
pub mod variation;

pub use column::ColumnSpec;
pub(crate) use column::ColumnSource;
pub use node::{ColumnKind, Node, NodeId, NodeKind, NodeState, SelectionOp};
pub use query::{InstanceNodes, QueryInstance, QueryNode};
pub use registry::Registry;
pub use selection::{SelectionContext, SelectionSpec};
pub use variation::{VariationAxis, VariationSet, Variations};
