//! Planner module.
//!
//! The planner turns the registry into an [`ExecutionPlan`]: it schedules
//! every booked query instance (nominal and variations), keeps only the
//! nodes those instances reach, and orders them so each node follows its
//! dependencies, breaking ties by declaration order.

mod execution_plan;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

pub use execution_plan::{ExecutionPlan, PlannedInstance};

use crate::error::{FlowError, Result};
use crate::graph::{NodeId, Registry};

/// Builds execution plans from a registry.
pub struct Planner<'a> {
    registry: &'a Registry,
    root_weight: f64,
}

impl<'a> Planner<'a> {
    /// Creates a planner over `registry` with unit root weight.
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Planner {
            registry,
            root_weight: 1.0,
        }
    }

    /// Sets the weight of the root selection.
    #[must_use]
    pub fn with_root_weight(mut self, weight: f64) -> Self {
        self.root_weight = weight;
        self
    }

    /// Generates the plan.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the reachable graph has a cycle.
    pub fn plan(&self) -> Result<ExecutionPlan> {
        let instances = self.instances();
        let roots: Vec<NodeId> = instances.iter().flat_map(|i| i.nodes.inputs()).collect();
        let order = self.order(&roots)?;
        Ok(ExecutionPlan {
            nodes: self.registry.nodes().to_vec(),
            order,
            instances,
            root_weight: self.root_weight,
        })
    }

    fn instances(&self) -> Vec<PlannedInstance> {
        let mut planned = Vec::new();
        for query in self.registry.queries() {
            for instance in &query.instances {
                planned.push(PlannedInstance {
                    query: query.name.clone(),
                    selection: instance.selection_name.clone(),
                    variation: None,
                    aggregation: query.aggregation.clone(),
                    nodes: instance.nominal.clone(),
                });
                for (variation, nodes) in &instance.variations {
                    planned.push(PlannedInstance {
                        query: query.name.clone(),
                        selection: instance.selection_name.clone(),
                        variation: Some(variation.clone()),
                        aggregation: query.aggregation.clone(),
                        nodes: nodes.clone(),
                    });
                }
            }
        }
        planned
    }

    /// Kahn's algorithm over the nodes reachable from `roots`.
    fn order(&self, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut reachable: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if reachable.contains_key(&id) {
                continue;
            }
            let inputs = self.registry.node(id).kind.inputs();
            stack.extend(inputs.iter().copied());
            reachable.insert(id, inputs);
        }

        let mut pending: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (id, inputs) in &reachable {
            let mut unique = inputs.clone();
            unique.sort_unstable();
            unique.dedup();
            pending.insert(*id, unique.len());
            for input in unique {
                dependents.entry(input).or_default().push(*id);
            }
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();
        let mut order = Vec::with_capacity(reachable.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(n) = pending.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push(Reverse(*dependent));
                    }
                }
            }
        }

        if order.len() != reachable.len() {
            return Err(FlowError::ExecutionError(
                "dependency cycle in the dataflow graph".to_string(),
            ));
        }
        Ok(order)
    }
}
