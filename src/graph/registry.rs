//! Node registry: the arena, its public namespace and booked queries.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{FlowError, Result};
use crate::query::Aggregation;
use crate::types::DataType;

use super::node::{Node, NodeId, NodeKind, NodeState};
use super::query::{InstanceNodes, QueryInstance, QueryNode};
use super::variation::{Variations, SEPARATOR};

/// Central registry of every node owned by one dataflow.
///
/// Columns and selections share one public namespace; queries have their
/// own. Variation instances and selection decisions live in the arena
/// without a public name.
#[derive(Debug, Default)]
pub struct Registry {
    /// Arena, indexed by `NodeId`.
    nodes: Vec<Node>,
    /// Public name -> node.
    names: HashMap<String, NodeId>,
    /// Public nodes in declaration order.
    declared: Vec<NodeId>,
    /// Booked queries in booking order.
    queries: Vec<QueryNode>,
    /// Query name -> position in `queries`.
    query_names: HashMap<String, usize>,
    /// Variation axes and sets.
    variations: Variations,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id the next arena node receives.
    fn next_id(&self) -> NodeId {
        NodeId::new(self.nodes.len())
    }

    /// Fails if `name` is taken by a column or selection.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` naming the kind of the existing node.
    pub fn check_name(&self, name: &str) -> Result<()> {
        match self.names.get(name) {
            Some(existing) => Err(FlowError::NamingConflict {
                kind: if self.node(*existing).kind.is_selection() {
                    "selection"
                } else {
                    "column"
                },
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Registers a node, plus one instance per variation its inputs carry.
    ///
    /// Public nodes enter the namespace; anonymous ones only the arena.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` for a taken public name and
    /// `VariationError` if the inputs' variations cannot be combined.
    pub fn add_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        data_type: DataType,
        public: bool,
    ) -> Result<NodeId> {
        if public {
            self.check_name(name)?;
        }
        let inputs = kind.inputs();
        let universe = self.variations.universe(name, &inputs)?;

        let id = self.push(name.to_string(), kind.clone(), data_type, None);
        if public {
            self.names.insert(name.to_string(), id);
            self.declared.push(id);
        }

        if !universe.is_empty() {
            let mut variants = BTreeMap::new();
            for (variation, combination) in universe.combinations() {
                let substituted = self.variations.substitute(&inputs, &combination);
                let instance = self.push(
                    format!("{name}@{variation}"),
                    kind.with_inputs(substituted),
                    data_type,
                    Some((id, variation.clone())),
                );
                variants.insert(variation, instance);
            }
            self.variations.record(id, universe, variants);
        }
        Ok(id)
    }

    fn push(
        &mut self,
        name: String,
        kind: NodeKind,
        data_type: DataType,
        variation_of: Option<(NodeId, String)>,
    ) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node {
            id,
            name,
            kind,
            data_type,
            state: NodeState::Declared,
            variation_of,
        });
        id
    }

    /// Looks up a public column or selection.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Looks up a public column or selection.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the name is unknown.
    pub fn resolve(&self, name: &str) -> Result<NodeId> {
        self.lookup(name).ok_or_else(|| {
            FlowError::UnresolvedReference(format!("no column or selection named '{name}'"))
        })
    }

    /// Looks up a public selection.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if no selection has that name.
    pub fn resolve_selection(&self, name: &str) -> Result<NodeId> {
        match self.lookup(name) {
            Some(id) if self.node(id).kind.is_selection() => Ok(id),
            _ => Err(FlowError::UnresolvedReference(format!(
                "no selection named '{name}'"
            ))),
        }
    }

    /// Returns true if `name` is a column or selection.
    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Returns a node by id.
    ///
    /// Ids are only handed out by this registry, so they are always valid.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Returns a node by id, or `None` if this registry never issued it.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All arena nodes, in declaration order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Number of arena nodes, anonymous ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Public names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(|id| self.node(*id).name.as_str())
    }

    /// Nodes reading `id`, directly or through other nodes.
    ///
    /// Inputs always precede their readers in the arena, so one forward
    /// sweep is enough.
    #[must_use]
    pub fn downstream(&self, id: NodeId) -> HashSet<NodeId> {
        let mut reached = HashSet::from([id]);
        for node in self.nodes.iter().skip(id.index() + 1) {
            if node.kind.inputs().iter().any(|input| reached.contains(input)) {
                reached.insert(node.id);
            }
        }
        reached.remove(&id);
        reached
    }

    /// `ids` and every node they read, directly or through other nodes.
    #[must_use]
    pub fn upstream(&self, ids: &[NodeId]) -> HashSet<NodeId> {
        let mut reached: HashSet<NodeId> = ids.iter().copied().collect();
        for node in self.nodes.iter().rev() {
            if reached.contains(&node.id) {
                reached.extend(node.kind.inputs());
            }
        }
        reached
    }

    /// Returns true if any query reads one of `ids`.
    fn is_queried(&self, ids: &HashSet<NodeId>) -> bool {
        self.queries
            .iter()
            .flat_map(|q| &q.instances)
            .any(|instance| instance.nominal.inputs().iter().any(|n| ids.contains(n)))
    }

    /// Variation axes and sets.
    #[must_use]
    pub fn variations(&self) -> &Variations {
        &self.variations
    }

    /// Registers `alternatives` as named variations of the nominal column.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` for unknown columns, `TypeError` if an
    /// alternative's type differs from the nominal's, and `VariationError`
    /// for every other illegal combination.
    pub fn vary(&mut self, nominal: &str, alternatives: &[(String, String)]) -> Result<()> {
        let nominal_id = self.resolve(nominal)?;
        let nominal_node = self.node(nominal_id);
        if nominal_node.kind.is_selection() {
            return Err(FlowError::variation(
                nominal,
                "selections cannot be varied directly; vary a column they read",
            ));
        }
        if self.variations.is_varied(nominal_id) {
            return Err(FlowError::variation(nominal, "column is already varied"));
        }
        if alternatives.is_empty() {
            return Err(FlowError::variation(nominal, "no alternatives given"));
        }

        let data_type = nominal_node.data_type;
        let mut seen = HashSet::new();
        let mut variants = BTreeMap::new();
        for (variation, alternative) in alternatives {
            if variation.is_empty() {
                return Err(FlowError::variation(nominal, "variation names must not be empty"));
            }
            if variation.contains(SEPARATOR) {
                return Err(FlowError::variation(
                    nominal,
                    format!("variation '{variation}' must not contain '{SEPARATOR}'"),
                ));
            }
            if !seen.insert(variation.as_str()) {
                return Err(FlowError::variation(
                    nominal,
                    format!("variation '{variation}' given twice"),
                ));
            }
            let alt_id = self.resolve(alternative)?;
            let alt = self.node(alt_id);
            if alt_id == nominal_id {
                return Err(FlowError::variation(
                    nominal,
                    format!("variation '{variation}' is the nominal column itself"),
                ));
            }
            if alt.kind.is_selection() || self.variations.is_varied(alt_id) {
                return Err(FlowError::variation(
                    nominal,
                    format!("alternative '{alternative}' must be an unvaried column"),
                ));
            }
            if alt.data_type != data_type {
                return Err(FlowError::type_error(
                    format!("variation '{variation}' of '{nominal}'"),
                    data_type,
                    alt.data_type,
                ));
            }
            variants.insert(variation.clone(), alt_id);
        }

        // Alternatives may be derived from the nominal. Anything else that
        // already reads it would never see the variations.
        let alternative_ids: Vec<NodeId> = variants.values().copied().collect();
        let feeding = self.upstream(&alternative_ids);
        let mut dependents = self.downstream(nominal_id);
        let stray = dependents.iter().any(|d| !feeding.contains(d));
        dependents.insert(nominal_id);
        if stray || self.is_queried(&dependents) {
            return Err(FlowError::variation(
                nominal,
                "column already has dependents; vary it before using it",
            ));
        }
        self.variations.add_axis(nominal_id, variants);
        Ok(())
    }

    /// Registers a query with one instance per booked selection.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` if the query name is taken and
    /// `VariationError` if an instance's variations cannot be combined.
    pub fn add_query(
        &mut self,
        name: &str,
        aggregation: Arc<dyn Aggregation>,
        fills: Vec<Vec<NodeId>>,
        selections: &[NodeId],
    ) -> Result<()> {
        if self.query_names.contains_key(name) {
            return Err(FlowError::NamingConflict {
                kind: "query",
                name: name.to_string(),
            });
        }

        let flat: Vec<NodeId> = fills.iter().flatten().copied().collect();
        let mut instances = Vec::with_capacity(selections.len());
        for &selection in selections {
            let nominal = InstanceNodes {
                selection,
                fills: fills.clone(),
            };
            let inputs = nominal.inputs();
            let universe = self
                .variations
                .universe(&format!("{name}@{}", self.node(selection).name), &inputs)?;
            let variations = universe
                .combinations()
                .into_iter()
                .map(|(variation, combination)| {
                    let selection = self
                        .variations
                        .substitute(&[selection], &combination)
                        .first()
                        .copied()
                        .unwrap_or(selection);
                    let fills = self.variations.substitute(&flat, &combination);
                    (
                        variation,
                        InstanceNodes::from_inputs(selection, &fills, &nominal.fills),
                    )
                })
                .collect();
            instances.push(QueryInstance {
                selection_name: self.node(selection).name.clone(),
                nominal,
                variations,
            });
        }

        self.query_names.insert(name.to_string(), self.queries.len());
        self.queries.push(QueryNode {
            name: name.to_string(),
            aggregation,
            fills,
            instances,
            state: NodeState::Declared,
        });
        Ok(())
    }

    /// Looks up a query by name.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&QueryNode> {
        self.query_names.get(name).map(|&i| &self.queries[i])
    }

    /// All queries in booking order.
    #[must_use]
    pub fn queries(&self) -> &[QueryNode] {
        &self.queries
    }

    pub(crate) fn queries_mut(&mut self) -> &mut [QueryNode] {
        &mut self.queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::ColumnKind;
    use crate::types::Value;

    fn constant(registry: &mut Registry, name: &str, value: f64) -> NodeId {
        registry
            .add_node(
                name,
                NodeKind::Column(ColumnKind::Constant(Value::Float64(value))),
                DataType::Float64,
                true,
            )
            .unwrap()
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = Registry::new();
        constant(&mut registry, "x", 1.0);
        let err = registry
            .add_node(
                "x",
                NodeKind::Column(ColumnKind::Constant(Value::Float64(2.0))),
                DataType::Float64,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::NamingConflict { kind: "column", .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_anonymous_nodes_stay_out_of_namespace() {
        let mut registry = Registry::new();
        let id = registry
            .add_node(
                "hidden",
                NodeKind::Column(ColumnKind::Constant(Value::Bool(true))),
                DataType::Bool,
                false,
            )
            .unwrap();
        assert!(registry.lookup("hidden").is_none());
        assert_eq!(registry.node(id).name, "hidden");
        assert_eq!(registry.names().count(), 0);
    }

    #[test]
    fn test_vary_rejects_type_mismatch() {
        let mut registry = Registry::new();
        constant(&mut registry, "x", 1.0);
        registry
            .add_node(
                "flag",
                NodeKind::Column(ColumnKind::Constant(Value::Bool(true))),
                DataType::Bool,
                true,
            )
            .unwrap();
        let err = registry
            .vary("x", &[("up".to_string(), "flag".to_string())])
            .unwrap_err();
        assert!(matches!(err, FlowError::TypeError { .. }));
    }

    #[test]
    fn test_vary_rejects_separator_in_name() {
        let mut registry = Registry::new();
        constant(&mut registry, "x", 1.0);
        constant(&mut registry, "x_up", 2.0);
        let err = registry
            .vary("x", &[("up,left".to_string(), "x_up".to_string())])
            .unwrap_err();
        assert!(matches!(err, FlowError::VariationError { .. }));
    }

    #[test]
    fn test_vary_rejects_duplicate_names() {
        let mut registry = Registry::new();
        constant(&mut registry, "x", 1.0);
        constant(&mut registry, "x_up", 2.0);
        let alternatives = vec![
            ("up".to_string(), "x_up".to_string()),
            ("up".to_string(), "x_up".to_string()),
        ];
        assert!(matches!(
            registry.vary("x", &alternatives),
            Err(FlowError::VariationError { .. })
        ));
        assert!(!registry.variations().is_varied(registry.lookup("x").unwrap()));
    }
}
