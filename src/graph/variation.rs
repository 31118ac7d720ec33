//! Systematic variation bookkeeping.
//!
//! Every `vary` call opens an axis: a nominal node and its named
//! alternatives. Axes meeting in one node are grouped: axes with identical
//! name sets are correlated and move together, axes with disjoint name sets
//! are independent. A node is instantiated once per combination that picks
//! nominal or one name from each group, all-nominal excluded. Partially
//! overlapping axes have no unambiguous meaning and are rejected.
//!
//! A combination is named by its component names, sorted and joined with
//! `,`, so `up` crossed with `left` is `left,up`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{FlowError, Result};

use super::node::NodeId;

/// Separator between the components of a combined variation name.
pub const SEPARATOR: &str = ",";

/// Names introduced by one `vary` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationAxis {
    /// The varied nominal node.
    pub nominal: NodeId,
    /// Variation names of the axis.
    pub names: BTreeSet<String>,
}

/// Variation instances of one nominal node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationSet {
    /// Axes the node depends on.
    pub axes: BTreeSet<usize>,
    /// Single variation names of those axes.
    pub components: BTreeSet<String>,
    /// Variation name -> instance node.
    pub variants: BTreeMap<String, NodeId>,
}

impl VariationSet {
    /// Variation names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Instance for the named variation.
    #[must_use]
    pub fn variant(&self, name: &str) -> Option<NodeId> {
        self.variants.get(name).copied()
    }

    /// Instance matching the part of `combination` this node carries.
    ///
    /// Returns `None` if the node carries none of its components.
    #[must_use]
    pub fn project(&self, combination: &BTreeSet<String>) -> Option<NodeId> {
        let own: BTreeSet<String> = combination.intersection(&self.components).cloned().collect();
        if own.is_empty() {
            None
        } else {
            self.variant(&combined_name(&own))
        }
    }
}

/// Combined variations of a set of inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Universe {
    /// Union of the inputs' axes.
    pub axes: BTreeSet<usize>,
    /// Name sets of the independent groups, in axis order.
    pub groups: Vec<BTreeSet<String>>,
}

impl Universe {
    /// Returns true if no input is varied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every single variation name of the groups.
    #[must_use]
    pub fn components(&self) -> BTreeSet<String> {
        self.groups.iter().flatten().cloned().collect()
    }

    /// Every combination of at most one name per group, all-nominal
    /// excluded, ordered by combined name.
    #[must_use]
    pub fn combinations(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut combinations = vec![BTreeSet::new()];
        for group in &self.groups {
            let mut next = Vec::with_capacity(combinations.len() * (group.len() + 1));
            for combination in &combinations {
                next.push(combination.clone());
                for name in group {
                    let mut extended = combination.clone();
                    extended.insert(name.clone());
                    next.push(extended);
                }
            }
            combinations = next;
        }
        combinations
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|c| (combined_name(&c), c))
            .collect()
    }
}

/// Joins sorted component names into one variation name.
#[must_use]
pub fn combined_name(components: &BTreeSet<String>) -> String {
    let list: Vec<&str> = components.iter().map(String::as_str).collect();
    list.join(SEPARATOR)
}

/// Rewrites a variation name with its components sorted.
///
/// `up,left` and `left,up` name the same combination.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let components: BTreeSet<String> = name.split(SEPARATOR).map(str::to_string).collect();
    combined_name(&components)
}

/// All axes and variation sets of one dataflow.
#[derive(Debug, Clone, Default)]
pub struct Variations {
    axes: Vec<VariationAxis>,
    sets: HashMap<NodeId, VariationSet>,
}

impl Variations {
    /// Opens an axis on `nominal` and records its alternatives.
    pub fn add_axis(&mut self, nominal: NodeId, variants: BTreeMap<String, NodeId>) -> usize {
        let axis = self.axes.len();
        let names: BTreeSet<String> = variants.keys().cloned().collect();
        self.axes.push(VariationAxis {
            nominal,
            names: names.clone(),
        });
        self.sets.insert(
            nominal,
            VariationSet {
                axes: BTreeSet::from([axis]),
                components: names,
                variants,
            },
        );
        axis
    }

    /// Records the instances of a derived node.
    pub fn record(&mut self, nominal: NodeId, universe: Universe, variants: BTreeMap<String, NodeId>) {
        let components = universe.components();
        self.sets.insert(
            nominal,
            VariationSet {
                axes: universe.axes,
                components,
                variants,
            },
        );
    }

    /// Variation set of a node, if it is varied.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&VariationSet> {
        self.sets.get(&node)
    }

    /// Returns true if the node carries variations.
    #[must_use]
    pub fn is_varied(&self, node: NodeId) -> bool {
        self.sets.contains_key(&node)
    }

    /// All axes in creation order.
    #[must_use]
    pub fn axes(&self) -> &[VariationAxis] {
        &self.axes
    }

    /// Combines the variations of `inputs` for a node called `name`.
    ///
    /// # Errors
    ///
    /// Returns `VariationError` if two axes partially overlap.
    pub fn universe(&self, name: &str, inputs: &[NodeId]) -> Result<Universe> {
        let axes: BTreeSet<usize> = inputs
            .iter()
            .filter_map(|id| self.sets.get(id))
            .flat_map(|set| set.axes.iter().copied())
            .collect();

        let mut groups: Vec<BTreeSet<String>> = Vec::new();
        for &axis in &axes {
            let names = &self.axes[axis].names;
            if groups.iter().any(|g| g == names) {
                continue;
            }
            if let Some(other) = groups.iter().find(|g| !g.is_disjoint(names)) {
                return Err(FlowError::variation(
                    name,
                    format!(
                        "variations {} and {} partially overlap",
                        format_names(other),
                        format_names(names)
                    ),
                ));
            }
            groups.push(names.clone());
        }
        Ok(Universe { axes, groups })
    }

    /// Replaces every input with its instance for `combination`.
    ///
    /// Each input takes the components it carries; inputs carrying none
    /// stay nominal.
    #[must_use]
    pub fn substitute(&self, inputs: &[NodeId], combination: &BTreeSet<String>) -> Vec<NodeId> {
        inputs
            .iter()
            .map(|id| {
                self.sets
                    .get(id)
                    .and_then(|set| set.project(combination))
                    .unwrap_or(*id)
            })
            .collect()
    }
}

fn format_names(names: &BTreeSet<String>) -> String {
    let list: Vec<&str> = names.iter().map(String::as_str).collect();
    format!("{{{}}}", list.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> NodeId {
        NodeId::new(i)
    }

    fn variants(pairs: &[(&str, usize)]) -> BTreeMap<String, NodeId> {
        pairs.iter().map(|(n, i)| ((*n).to_string(), id(*i))).collect()
    }

    fn combination(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_disjoint_axes_cross() {
        let mut v = Variations::default();
        v.add_axis(id(0), variants(&[("up", 1), ("down", 2)]));
        v.add_axis(id(3), variants(&[("scale", 4)]));
        let u = v.universe("z", &[id(0), id(3)]).unwrap();
        let names: Vec<String> = u.combinations().into_keys().collect();
        assert_eq!(names, vec!["down", "down,scale", "scale", "scale,up", "up"]);

        let inputs = [id(0), id(3)];
        assert_eq!(v.substitute(&inputs, &combination(&["scale"])), vec![id(0), id(4)]);
        assert_eq!(v.substitute(&inputs, &combination(&["up"])), vec![id(1), id(3)]);
        assert_eq!(v.substitute(&inputs, &combination(&["scale", "up"])), vec![id(1), id(4)]);
    }

    #[test]
    fn test_identical_axes_correlate() {
        let mut v = Variations::default();
        v.add_axis(id(0), variants(&[("up", 1)]));
        v.add_axis(id(2), variants(&[("up", 3)]));
        let u = v.universe("z", &[id(0), id(2)]).unwrap();
        assert_eq!(u.combinations().len(), 1);
        assert_eq!(v.substitute(&[id(0), id(2)], &combination(&["up"])), vec![id(1), id(3)]);
    }

    #[test]
    fn test_derived_inputs_project_combinations() {
        let mut v = Variations::default();
        v.add_axis(id(0), variants(&[("up", 1)]));
        v.add_axis(id(2), variants(&[("left", 3)]));
        let u = v.universe("c", &[id(0), id(2)]).unwrap();
        v.record(
            id(4),
            u,
            variants(&[("left", 5), ("left,up", 6), ("up", 7)]),
        );
        v.add_axis(id(8), variants(&[("big", 9)]));

        let u = v.universe("d", &[id(4), id(8)]).unwrap();
        assert_eq!(u.combinations().len(), 7);
        let inputs = [id(4), id(8)];
        assert_eq!(v.substitute(&inputs, &combination(&["big", "up"])), vec![id(7), id(9)]);
        assert_eq!(v.substitute(&inputs, &combination(&["left", "up"])), vec![id(6), id(8)]);
        assert_eq!(v.substitute(&inputs, &combination(&["big"])), vec![id(4), id(9)]);
    }

    #[test]
    fn test_partial_overlap_rejected() {
        let mut v = Variations::default();
        v.add_axis(id(0), variants(&[("up", 1), ("down", 2)]));
        v.add_axis(id(3), variants(&[("up", 4)]));
        let err = v.universe("z", &[id(0), id(3)]).unwrap_err();
        assert!(matches!(err, FlowError::VariationError { ref name, .. } if name == "z"));
    }

    #[test]
    fn test_canonical_name_sorts_components() {
        assert_eq!(canonical_name("up,left"), "left,up");
        assert_eq!(canonical_name("up"), "up");
    }

    #[test]
    fn test_unvaried_inputs() {
        let v = Variations::default();
        assert!(v.universe("z", &[id(0)]).unwrap().is_empty());
    }
}
