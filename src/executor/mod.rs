//! Executor module for dataflow passes.
//!
//! An [`ExecutionEngine`] runs an [`ExecutionPlan`] over the partitions of
//! a dataset and returns one merged output per planned query instance.
//! The bundled [`RowEngine`] evaluates rows lazily and fans partitions out
//! over a rayon pool.

mod evaluate;
mod row;

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::dataset::{Dataset, Partition};
use crate::error::{FlowError, Result};
use crate::planner::ExecutionPlan;
use crate::query::Output;

pub use evaluate::evaluate;
pub use row::{run_partition, RowEvaluator};

/// Runs a plan over a dataset.
pub trait ExecutionEngine: Send + Sync {
    /// Processes every partition, then merges per-partition outputs.
    ///
    /// Returns one output per `plan.instances()` entry, in the same order.
    /// No output is visible before every partition has finished.
    ///
    /// # Errors
    ///
    /// Returns the first row error, or `ThreadPanic` if a worker panicked.
    fn execute(
        &self,
        plan: &ExecutionPlan,
        dataset: &dyn Dataset,
        partitions: &[Partition],
    ) -> Result<Vec<Output>>;
}

/// Default engine: lazy row evaluation, one worker per partition.
#[derive(Debug, Clone, Copy)]
pub struct RowEngine {
    threads: usize,
}

impl Default for RowEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RowEngine {
    /// Creates an engine with `threads` workers; 0 uses all cores.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        RowEngine { threads }
    }

    /// Returns the configured number of workers.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn run_sequential(
        plan: &ExecutionPlan,
        dataset: &dyn Dataset,
        partitions: &[Partition],
    ) -> Result<Vec<Vec<Output>>> {
        partitions
            .iter()
            .map(|p| run_partition(plan, dataset, *p))
            .collect()
    }

    fn run_parallel(
        &self,
        plan: &ExecutionPlan,
        dataset: &dyn Dataset,
        partitions: &[Partition],
    ) -> Result<Vec<Vec<Output>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| FlowError::ExecutionError(format!("cannot start worker pool: {e}")))?;

        let results: Mutex<Vec<(usize, Vec<Output>)>> = Mutex::new(Vec::new());
        let fatal: Mutex<Option<FlowError>> = Mutex::new(None);

        pool.install(|| {
            partitions.par_iter().enumerate().for_each(|(index, partition)| {
                if fatal.lock().is_some() {
                    return;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    run_partition(plan, dataset, *partition)
                }))
                .unwrap_or_else(|panic| Err(FlowError::ThreadPanic(panic_message(&*panic))));
                match outcome {
                    Ok(outputs) => {
                        trace!(index, rows = partition.len(), "partition finished");
                        results.lock().push((index, outputs));
                    }
                    Err(e) => {
                        fatal.lock().get_or_insert(e);
                    }
                }
            });
        });

        if let Some(e) = fatal.into_inner() {
            return Err(e);
        }
        let mut results = results.into_inner();
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, outputs)| outputs).collect())
    }
}

impl ExecutionEngine for RowEngine {
    fn execute(
        &self,
        plan: &ExecutionPlan,
        dataset: &dyn Dataset,
        partitions: &[Partition],
    ) -> Result<Vec<Output>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let per_partition = if self.threads == 1 || partitions.len() <= 1 {
            debug!(partitions = partitions.len(), "running single-threaded pass");
            Self::run_sequential(plan, dataset, partitions)?
        } else {
            debug!(
                partitions = partitions.len(),
                threads = self.threads,
                "running multi-threaded pass"
            );
            self.run_parallel(plan, dataset, partitions)?
        };

        let mut columns: Vec<Vec<Output>> = plan.instances().iter().map(|_| Vec::new()).collect();
        for outputs in per_partition {
            for (column, output) in columns.iter_mut().zip(outputs) {
                column.push(output);
            }
        }
        plan.instances()
            .iter()
            .zip(columns)
            .map(|(instance, parts)| instance.aggregation.merge(parts))
            .collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
