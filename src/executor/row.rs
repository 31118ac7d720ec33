//! Lazy per-row evaluation of an execution plan.

use crate::compile::Arguments;
use crate::dataset::{Dataset, Partition};
use crate::error::{FlowError, Result};
use crate::graph::{ColumnKind, NodeId, NodeKind, SelectionOp};
use crate::planner::ExecutionPlan;
use crate::query::{Accumulator, Output};
use crate::types::Value;

/// Evaluates plan nodes for one row at a time, each at most once per row.
///
/// Values are computed on demand and cached with the row's generation, so
/// a node nobody asks for on a given row is never computed.
pub struct RowEvaluator<'a> {
    plan: &'a ExecutionPlan,
    dataset: &'a dyn Dataset,
    entry: u64,
    generation: u64,
    value_stamps: Vec<u64>,
    values: Vec<Value>,
    selection_stamps: Vec<u64>,
    selections: Vec<(bool, f64)>,
}

impl<'a> RowEvaluator<'a> {
    /// Creates an evaluator with empty caches.
    #[must_use]
    pub fn new(plan: &'a ExecutionPlan, dataset: &'a dyn Dataset) -> Self {
        let n = plan.arena_len();
        RowEvaluator {
            plan,
            dataset,
            entry: 0,
            generation: 0,
            value_stamps: vec![0; n],
            values: vec![Value::Bool(false); n],
            selection_stamps: vec![0; n],
            selections: vec![(false, 0.0); n],
        }
    }

    /// Moves to a new row, invalidating every cached value.
    pub fn begin_row(&mut self, entry: u64) {
        self.entry = entry;
        self.generation += 1;
    }

    /// Value of a node for the current row.
    ///
    /// # Errors
    ///
    /// Returns dataset, compiler or type errors raised while computing it.
    pub fn value(&mut self, id: NodeId) -> Result<Value> {
        let slot = id.index();
        if self.value_stamps[slot] == self.generation {
            return Ok(self.values[slot].clone());
        }

        let plan = self.plan;
        let node = plan.node(id);
        let value = match &node.kind {
            NodeKind::Column(ColumnKind::Constant(v)) => v.clone(),
            NodeKind::Column(ColumnKind::Field { field }) => self.dataset.read(field, self.entry)?,
            NodeKind::Column(ColumnKind::Expression {
                compiled,
                arguments,
                ..
            }) => compiled.evaluate(&mut RowArguments {
                evaluator: &mut *self,
                arguments,
            })?,
            NodeKind::Column(ColumnKind::Definition {
                definition,
                arguments,
            }) => {
                let values = arguments
                    .iter()
                    .map(|a| self.value(*a))
                    .collect::<Result<Vec<_>>>()?;
                definition.evaluate(&values)?
            }
            NodeKind::Selection { operation, .. } => {
                let (passed, weight) = self.selection(id)?;
                match operation {
                    SelectionOp::Filter => Value::Bool(passed),
                    SelectionOp::Weight => Value::Float64(weight),
                }
            }
        };

        let actual = value.data_type();
        let value = value.cast(node.data_type).ok_or_else(|| {
            FlowError::type_error(format!("column '{}'", node.name), node.data_type, actual)
        })?;
        self.value_stamps[slot] = self.generation;
        self.values[slot] = value.clone();
        Ok(value)
    }

    /// Compounded `(passed, weight)` of a selection for the current row.
    ///
    /// The decision is not evaluated when the preselection fails.
    ///
    /// # Errors
    ///
    /// Returns errors raised while computing the decision, or `TypeError`
    /// if a filter decision is not boolean or a weight is not numeric.
    pub fn selection(&mut self, id: NodeId) -> Result<(bool, f64)> {
        let slot = id.index();
        if self.selection_stamps[slot] == self.generation {
            return Ok(self.selections[slot]);
        }

        let plan = self.plan;
        let node = plan.node(id);
        let NodeKind::Selection {
            operation,
            preselection,
            decision,
        } = &node.kind
        else {
            return Err(FlowError::ExecutionError(format!(
                "'{}' is not a selection",
                node.name
            )));
        };

        let (pre_passed, pre_weight) = match preselection {
            Some(pre) => self.selection(*pre)?,
            None => (true, plan.root_weight()),
        };
        let result = if pre_passed {
            let value = self.value(*decision)?;
            match operation {
                SelectionOp::Filter => {
                    let passed = value.as_bool().ok_or_else(|| {
                        FlowError::type_error(
                            format!("filter '{}'", node.name),
                            "BOOL",
                            value.data_type(),
                        )
                    })?;
                    (passed, pre_weight)
                }
                SelectionOp::Weight => {
                    let weight = value.to_f64().ok_or_else(|| {
                        FlowError::type_error(
                            format!("weight '{}'", node.name),
                            "a numeric value",
                            value.data_type(),
                        )
                    })?;
                    (true, pre_weight * weight)
                }
            }
        } else {
            (false, pre_weight)
        };

        self.selection_stamps[slot] = self.generation;
        self.selections[slot] = result;
        Ok(result)
    }

    /// Current row number.
    #[must_use]
    pub fn entry(&self) -> u64 {
        self.entry
    }
}

/// Observable parameters of one expression, backed by the row cache.
struct RowArguments<'e, 'a> {
    evaluator: &'e mut RowEvaluator<'a>,
    arguments: &'a [NodeId],
}

impl Arguments for RowArguments<'_, '_> {
    fn value(&mut self, index: usize) -> Result<Value> {
        let id = self.arguments.get(index).copied().ok_or_else(|| {
            FlowError::ExecutionError(format!("expression parameter {index} is not bound"))
        })?;
        self.evaluator.value(id)
    }

    fn entry(&self) -> u64 {
        self.evaluator.entry
    }
}

/// Runs every planned query instance over one partition.
///
/// # Errors
///
/// Returns the first error raised by any row.
pub fn run_partition(
    plan: &ExecutionPlan,
    dataset: &dyn Dataset,
    partition: Partition,
) -> Result<Vec<Output>> {
    let mut evaluator = RowEvaluator::new(plan, dataset);
    let mut accumulators: Vec<Box<dyn Accumulator>> = plan
        .instances()
        .iter()
        .map(|i| i.aggregation.accumulator())
        .collect();
    let mut fill = Vec::new();

    for entry in partition.rows() {
        evaluator.begin_row(entry);
        for (instance, accumulator) in plan.instances().iter().zip(accumulators.iter_mut()) {
            let (passed, weight) = evaluator.selection(instance.nodes.selection)?;
            if !passed {
                continue;
            }
            accumulator.count(weight);
            for group in &instance.nodes.fills {
                fill.clear();
                for column in group {
                    fill.push(evaluator.value(*column)?);
                }
                accumulator.fill(&fill, weight)?;
            }
        }
    }

    Ok(accumulators.into_iter().map(|a| a.finish()).collect())
}
