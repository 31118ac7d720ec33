//! lazyflow - lazy row-wise dataflow engine
//!
//! Columns, selections and queries are declared against a [`Dataflow`];
//! nothing is computed until a result is requested, at which point one
//! pass over the dataset fills every booked query, including all of its
//! systematic variations.

pub mod binder;
pub mod compile;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod graph;
pub mod parser;
pub mod planner;
pub mod query;
pub mod types;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

pub use compile::{Definition, ExpressionCompiler, Interpreter};
pub use dataset::{CsvDataset, CsvOptions, Dataset, MemoryDataset};
pub use error::{FlowError, Result};
pub use executor::{ExecutionEngine, RowEngine};
pub use graph::{ColumnSpec, NodeId, NodeState, SelectionContext, SelectionOp, SelectionSpec};
pub use query::{
    Aggregation, Booked, Count, Counter, Histogram, Histogram1D, Output, QueryResult, QuerySpec,
    ResultRequest, Series, WeightedSum,
};
pub use types::{DataType, Value};

use binder::resolve;
use dataset::partition::{split, truncate};
use dataset::Partition;
use graph::{ColumnKind, ColumnSource, NodeKind, Registry};
use planner::Planner;

/// Configuration for a materialization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataflowConfig {
    /// Worker threads; 1 runs single-threaded, 0 uses every core.
    pub threads: usize,
    /// Process at most this many rows, counted from the first.
    pub row_limit: Option<u64>,
    /// Weight of every row at the root selection.
    pub weight: f64,
}

impl Default for DataflowConfig {
    fn default() -> Self {
        DataflowConfig {
            threads: 1,
            row_limit: None,
            weight: 1.0,
        }
    }
}

impl DataflowConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Limits the pass to the first `rows` rows.
    #[must_use]
    pub fn with_row_limit(mut self, rows: u64) -> Self {
        self.row_limit = Some(rows);
        self
    }

    /// Sets the global dataset weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    fn worker_count(&self) -> usize {
        if self.threads == 0 {
            rayon::current_num_threads()
        } else {
            self.threads
        }
    }
}

static NEXT_DATAFLOW_ID: AtomicU64 = AtomicU64::new(1);

/// A lazily evaluated dataflow over one dataset.
///
/// Declarations are checked eagerly; evaluation is deferred until the
/// first result request (or an explicit [`Dataflow::materialize`]). After
/// that pass the dataflow is write-locked.
pub struct Dataflow {
    /// Process-unique id stamped on the contexts this dataflow hands out.
    id: u64,
    /// Nodes, namespaces, variations and queries.
    registry: Registry,
    /// Preselection for the next `apply`.
    context: SelectionContext,
    /// Bound dataset, if any.
    dataset: Option<Arc<dyn Dataset>>,
    /// Compiler for expression columns.
    compiler: Arc<dyn ExpressionCompiler>,
    /// Engine override; `None` uses a `RowEngine` sized by the config.
    engine: Option<Arc<dyn ExecutionEngine>>,
    /// Pass configuration.
    config: DataflowConfig,
    /// Results keyed by (query, selection).
    results: HashMap<(String, String), Arc<QueryResult>>,
    /// Whether the pass has run.
    materialized: bool,
    /// Number of dataset passes performed.
    passes: usize,
}

impl Default for Dataflow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dataflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataflow")
            .field("nodes", &self.registry.len())
            .field("queries", &self.registry.queries().len())
            .field("config", &self.config)
            .field("materialized", &self.materialized)
            .finish_non_exhaustive()
    }
}

impl Dataflow {
    /// Creates an empty dataflow with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DataflowConfig::default())
    }

    /// Creates an empty dataflow with the given configuration.
    #[must_use]
    pub fn with_config(config: DataflowConfig) -> Self {
        Dataflow {
            id: NEXT_DATAFLOW_ID.fetch_add(1, Ordering::Relaxed),
            registry: Registry::new(),
            context: SelectionContext::root(),
            dataset: None,
            compiler: Arc::new(Interpreter::new()),
            engine: None,
            config,
            results: HashMap::new(),
            materialized: false,
            passes: 0,
        }
    }

    /// Replaces the expression compiler.
    #[must_use]
    pub fn with_compiler(mut self, compiler: impl ExpressionCompiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Replaces the execution engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl ExecutionEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DataflowConfig {
        &self.config
    }

    /// Returns the node registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn ensure_writable(&self, action: impl Into<String>) -> Result<()> {
        if self.materialized {
            Err(FlowError::Materialized(action.into()))
        } else {
            Ok(())
        }
    }

    // ==================== Dataset ====================

    /// Binds the dataset the pass reads from.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` if a dataset is already bound.
    pub fn load(&mut self, dataset: impl Dataset + 'static) -> Result<()> {
        self.load_shared(Arc::new(dataset))
    }

    /// Binds a shared dataset.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` if a dataset is already bound.
    pub fn load_shared(&mut self, dataset: Arc<dyn Dataset>) -> Result<()> {
        self.ensure_writable("load a dataset")?;
        if self.dataset.is_some() {
            return Err(FlowError::DatasetError(
                "a dataset is already loaded".to_string(),
            ));
        }
        debug!(rows = dataset.row_count(), "dataset loaded");
        self.dataset = Some(dataset);
        Ok(())
    }

    // ==================== Columns ====================

    /// Declares a column.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` for a taken name, `UnresolvedReference`,
    /// `ResolutionError` or `CompilationError` for a bad expression,
    /// `DatasetError` for a field column without a dataset, `ArityError`
    /// and `TypeError` for mismatched definitions, and `Materialized`
    /// once the dataflow has run.
    pub fn define(&mut self, name: &str, spec: impl Into<ColumnSpec>) -> Result<NodeId> {
        self.ensure_writable(format!("define column '{name}'"))?;
        self.registry.check_name(name)?;
        let spec = spec.into();
        let (kind, data_type) = self.build_column(name, &spec)?;
        let id = self
            .registry
            .add_node(name, NodeKind::Column(kind), data_type, true)?;
        debug!(column = name, %data_type, source = %spec.describe(), "column defined");
        Ok(id)
    }

    fn build_column(&self, name: &str, spec: &ColumnSpec) -> Result<(ColumnKind, DataType)> {
        let (kind, produced) = match &spec.source {
            ColumnSource::Constant(value) => {
                (ColumnKind::Constant(value.clone()), value.data_type())
            }
            ColumnSource::Expression(source) => {
                let resolution = resolve(source, |n| self.registry.is_known(n))?;
                let mut parameters = Vec::with_capacity(resolution.dependencies.len());
                let mut arguments = Vec::with_capacity(resolution.dependencies.len());
                for dependency in resolution.parameters() {
                    let id = self.registry.resolve(dependency)?;
                    parameters.push((dependency.to_string(), self.registry.node(id).data_type));
                    arguments.push(id);
                }
                let compiled = self.compiler.compile(&resolution.rewritten, &parameters)?;
                let output = compiled.output_type();
                (
                    ColumnKind::Expression {
                        source: source.clone(),
                        rewritten: resolution.rewritten,
                        compiled,
                        arguments,
                    },
                    output,
                )
            }
            ColumnSource::Field(field) => {
                let dataset = self.dataset.as_ref().ok_or_else(|| {
                    FlowError::DatasetError(format!(
                        "column '{name}' reads field '{field}' but no dataset is loaded"
                    ))
                })?;
                let field = dataset.declare_field(field)?;
                let data_type = field.data_type;
                (ColumnKind::Field { field }, data_type)
            }
            ColumnSource::Definition {
                definition,
                arguments,
            } => {
                if let Some(expected) = definition.arity() {
                    if expected != arguments.len() {
                        return Err(FlowError::ArityError {
                            context: format!("definition of '{name}'"),
                            expected,
                            actual: arguments.len(),
                        });
                    }
                }
                let arguments = arguments
                    .iter()
                    .map(|a| self.registry.resolve(a))
                    .collect::<Result<Vec<_>>>()?;
                (
                    ColumnKind::Definition {
                        definition: definition.clone(),
                        arguments,
                    },
                    definition.output_type(),
                )
            }
        };

        let Some(declared) = spec.data_type else {
            return Ok((kind, produced));
        };
        let widens = produced == DataType::Int64 && declared == DataType::Float64;
        if produced != declared && !widens {
            return Err(FlowError::type_error(
                format!("column '{name}'"),
                declared,
                produced,
            ));
        }
        let kind = match kind {
            ColumnKind::Constant(value) => ColumnKind::Constant(value.cast(declared).ok_or_else(
                || FlowError::type_error(format!("column '{name}'"), declared, produced),
            )?),
            other => other,
        };
        Ok((kind, declared))
    }

    // ==================== Selections ====================

    /// Applies a selection at the current context, then moves the context
    /// onto it.
    ///
    /// A spec carrying `.at(name)` compounds onto that selection instead.
    ///
    /// # Errors
    ///
    /// See [`Dataflow::apply_in`].
    pub fn apply(&mut self, name: &str, spec: SelectionSpec) -> Result<NodeId> {
        let context = self.context;
        let id = self.apply_in(&context, name, spec)?;
        self.context = SelectionContext::at(self.id, id);
        Ok(id)
    }

    /// Applies a selection under an explicit context without moving the
    /// dataflow's own context.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` for a taken name, `UnresolvedReference`
    /// for an unknown preselection or column, `TypeError` for a filter
    /// decision that is not boolean or a weight that is not numeric, and
    /// `Materialized` once the dataflow has run. A context handed out by
    /// another dataflow is an `UnresolvedReference` too.
    pub fn apply_in(
        &mut self,
        context: &SelectionContext,
        name: &str,
        spec: SelectionSpec,
    ) -> Result<NodeId> {
        self.ensure_writable(format!("apply selection '{name}'"))?;
        self.registry.check_name(name)?;
        self.check_context(context)?;

        let preselection = match &spec.preselection {
            Some(pre) => Some(self.registry.resolve_selection(pre)?),
            None => context.preselection(),
        };

        let decision_name = format!("{name}#decision");
        let (kind, data_type) = self.build_column(&decision_name, &spec.decision)?;
        let accepted = match spec.operation {
            SelectionOp::Filter => data_type == DataType::Bool,
            SelectionOp::Weight => data_type.is_numeric(),
        };
        if !accepted {
            return Err(FlowError::type_error(
                format!("{} '{name}'", spec.operation.name()),
                if spec.operation == SelectionOp::Filter {
                    "BOOL"
                } else {
                    "a numeric type"
                },
                data_type,
            ));
        }

        let decision =
            self.registry
                .add_node(&decision_name, NodeKind::Column(kind), data_type, false)?;
        let id = self.registry.add_node(
            name,
            NodeKind::Selection {
                operation: spec.operation,
                preselection,
                decision,
            },
            spec.operation.data_type(),
            true,
        )?;
        debug!(
            selection = name,
            operation = spec.operation.name(),
            preselection = preselection.map_or("<root>", |p| self.registry.node(p).name.as_str()),
            "selection applied"
        );
        Ok(id)
    }

    /// The context the next `apply` compounds onto.
    #[must_use]
    pub fn context(&self) -> SelectionContext {
        self.context
    }

    /// The context of an existing selection.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if no selection has that name.
    pub fn context_at(&self, selection: &str) -> Result<SelectionContext> {
        Ok(SelectionContext::at(
            self.id,
            self.registry.resolve_selection(selection)?,
        ))
    }

    /// Moves the dataflow's own context.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the context was handed out by
    /// another dataflow.
    pub fn set_context(&mut self, context: SelectionContext) -> Result<()> {
        self.check_context(&context)?;
        self.context = context;
        Ok(())
    }

    fn check_context(&self, context: &SelectionContext) -> Result<()> {
        let Some(selection) = context.preselection() else {
            return Ok(());
        };
        let owned = context.owner() == self.id
            && self
                .registry
                .get(selection)
                .is_some_and(|node| node.kind.is_selection());
        if owned {
            Ok(())
        } else {
            Err(FlowError::UnresolvedReference(
                "selection context belongs to another dataflow".to_string(),
            ))
        }
    }

    // ==================== Variations ====================

    /// Registers alternative columns as named variations of `nominal`.
    ///
    /// # Errors
    ///
    /// Returns `VariationError` or `TypeError` for illegal variations,
    /// `UnresolvedReference` for unknown columns, and `Materialized` once
    /// the dataflow has run.
    pub fn vary<I, V, A>(&mut self, nominal: &str, alternatives: I) -> Result<()>
    where
        I: IntoIterator<Item = (V, A)>,
        V: Into<String>,
        A: Into<String>,
    {
        self.ensure_writable(format!("vary column '{nominal}'"))?;
        let alternatives: Vec<(String, String)> = alternatives
            .into_iter()
            .map(|(v, a)| (v.into(), a.into()))
            .collect();
        self.registry.vary(nominal, &alternatives)?;
        debug!(
            column = nominal,
            variations = alternatives.len(),
            "column varied"
        );
        Ok(())
    }

    // ==================== Queries ====================

    /// Books a query at the union of the `QuerySpec::at` selections and
    /// `selections`, in order, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns `NamingConflict` for a taken query name,
    /// `UnresolvedReference` for unknown columns or selections (or none at
    /// all), `ArityError` and `TypeError` for fills the aggregation
    /// rejects, and `Materialized` once the dataflow has run.
    pub fn book<I, S>(&mut self, name: &str, spec: QuerySpec, selections: I) -> Result<Booked>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_writable(format!("book query '{name}'"))?;

        let mut booked: Vec<String> = Vec::new();
        for selection in spec
            .selections
            .iter()
            .cloned()
            .chain(selections.into_iter().map(Into::into))
        {
            if !booked.contains(&selection) {
                booked.push(selection);
            }
        }
        if booked.is_empty() {
            return Err(FlowError::UnresolvedReference(format!(
                "query '{name}' is not booked at any selection"
            )));
        }
        let selection_ids = booked
            .iter()
            .map(|s| self.registry.resolve_selection(s))
            .collect::<Result<Vec<_>>>()?;

        let mut fills = Vec::with_capacity(spec.fills.len());
        for group in &spec.fills {
            let ids = group
                .iter()
                .map(|c| self.registry.resolve(c))
                .collect::<Result<Vec<_>>>()?;
            let types: Vec<DataType> = ids
                .iter()
                .map(|id| self.registry.node(*id).data_type)
                .collect();
            spec.aggregation.validate(&types)?;
            fills.push(ids);
        }
        if fills.is_empty() {
            if let Some(expected) = spec.aggregation.arity().filter(|n| *n > 0) {
                return Err(FlowError::ArityError {
                    context: format!("query '{name}' has no fill"),
                    expected,
                    actual: 0,
                });
            }
        }

        self.registry
            .add_query(name, spec.aggregation.clone(), fills, &selection_ids)?;
        debug!(
            query = name,
            aggregation = spec.aggregation_name(),
            selections = booked.len(),
            "query booked"
        );
        Ok(Booked::new(name.to_string(), booked))
    }

    // ==================== Materialization ====================

    /// Runs the single dataset pass that fills every booked query.
    ///
    /// Idempotent: after the first successful call it does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` if queries are booked but no dataset is
    /// loaded, and any error raised while evaluating rows. A failed pass
    /// leaves the dataflow unmaterialized.
    pub fn materialize(&mut self) -> Result<()> {
        if self.materialized {
            return Ok(());
        }
        if self.registry.queries().is_empty() {
            info!("no queries booked; nothing to materialize");
            self.materialized = true;
            return Ok(());
        }
        let source = self.dataset.clone().ok_or_else(|| {
            FlowError::DatasetError("queries are booked but no dataset is loaded".to_string())
        })?;

        let plan = Planner::new(&self.registry)
            .with_root_weight(self.config.weight)
            .plan()?;

        let mut partitions = source.partition();
        if let Some(limit) = self.config.row_limit {
            partitions = truncate(&partitions, limit);
        }
        let workers = self.config.worker_count();
        if workers > 1 {
            partitions = split(&partitions, workers);
        }
        let rows: u64 = partitions.iter().map(Partition::len).sum();

        info!(
            rows,
            partitions = partitions.len(),
            nodes = plan.order().len(),
            instances = plan.instances().len(),
            "starting dataflow pass"
        );

        let outputs = match &self.engine {
            Some(engine) => engine.execute(&plan, source.as_ref(), &partitions)?,
            None => RowEngine::new(workers).execute(&plan, source.as_ref(), &partitions)?,
        };
        if outputs.len() != plan.instances().len() {
            return Err(FlowError::ExecutionError(format!(
                "engine returned {} outputs for {} query instances",
                outputs.len(),
                plan.instances().len()
            )));
        }

        let mut grouped: Vec<((String, String), Option<Output>, BTreeMap<String, Output>)> =
            Vec::new();
        for (instance, output) in plan.instances().iter().zip(outputs) {
            let key = (instance.query.clone(), instance.selection.clone());
            let position = match grouped.iter().position(|(k, _, _)| *k == key) {
                Some(p) => p,
                None => {
                    grouped.push((key, None, BTreeMap::new()));
                    grouped.len() - 1
                }
            };
            let entry = &mut grouped[position];
            match &instance.variation {
                Some(variation) => {
                    entry.2.insert(variation.clone(), output);
                }
                None => entry.1 = Some(output),
            }
        }
        let mut results = HashMap::with_capacity(grouped.len());
        for ((query, selection), nominal, variations) in grouped {
            let nominal = nominal.ok_or_else(|| {
                FlowError::ExecutionError(format!("no nominal output for '{query}@{selection}'"))
            })?;
            let result = QueryResult::new(query.clone(), selection.clone(), nominal, variations);
            results.insert((query, selection), Arc::new(result));
        }

        let nodes = self.registry.nodes_mut();
        for id in plan.order() {
            let node = &mut nodes[id.index()];
            node.state = NodeState::Materialized;
            trace!(node = %id, name = %node.name, "node materialized");
        }
        for query in self.registry.queries_mut() {
            query.state = NodeState::Materialized;
        }

        self.results = results;
        self.materialized = true;
        self.passes += 1;
        info!(rows, results = self.results.len(), "dataflow pass finished");
        Ok(())
    }

    /// Returns true once the pass has run.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Number of dataset passes performed so far (0 or 1).
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Result of a query at one selection, materializing if needed.
    ///
    /// Repeated requests return the same shared result.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the query is unknown or not booked
    /// at `selection`, and any error of [`Dataflow::materialize`].
    pub fn result(&mut self, query: &str, selection: &str) -> Result<Arc<QueryResult>> {
        let node = self.registry.query(query).ok_or_else(|| {
            FlowError::UnresolvedReference(format!("no query named '{query}'"))
        })?;
        if node.instance(selection).is_none() {
            return Err(FlowError::UnresolvedReference(format!(
                "query '{query}' is not booked at selection '{selection}'"
            )));
        }
        self.materialize()?;
        self.results
            .get(&(query.to_string(), selection.to_string()))
            .cloned()
            .ok_or_else(|| {
                FlowError::ExecutionError(format!("no result recorded for '{query}@{selection}'"))
            })
    }

    /// Output addressed by a request, nominal or varied.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Dataflow::result`], and `UnknownVariation`
    /// if the instance carries no such variation.
    pub fn get(&mut self, request: &ResultRequest) -> Result<Output> {
        let result = self.result(&request.query, &request.selection)?;
        match &request.variation {
            Some(variation) => result.variation(variation).cloned(),
            None => Ok(result.nominal().clone()),
        }
    }

    /// Books a `Counter` at each selection, for a cutflow read back with
    /// [`Dataflow::cutflow`].
    ///
    /// # Errors
    ///
    /// See [`Dataflow::book`].
    pub fn book_cutflow<I, S>(&mut self, name: &str, selections: I) -> Result<Booked>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.book(name, QuerySpec::new(Counter::new()), selections)
    }

    /// Nominal yield at every booked selection, in booking order.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Dataflow::result`], and `TypeError` if the
    /// query does not produce counts.
    pub fn cutflow(&mut self, booked: &Booked) -> Result<Vec<(String, Count)>> {
        booked
            .selections()
            .iter()
            .map(|selection| -> Result<(String, Count)> {
                let result = self.result(booked.query(), selection)?;
                let count = result.nominal().as_count().ok_or_else(|| {
                    FlowError::type_error(
                        format!("cutflow of '{}'", booked.query()),
                        "a count",
                        result.nominal().kind(),
                    )
                })?;
                Ok((selection.clone(), *count))
            })
            .collect()
    }

    /// Renders the execution plan without running it.
    ///
    /// # Errors
    ///
    /// Returns planning errors.
    pub fn explain(&self) -> Result<String> {
        let plan = Planner::new(&self.registry)
            .with_root_weight(self.config.weight)
            .plan()?;
        Ok(plan.to_string())
    }

    // ==================== Inspection ====================

    /// Preselection of a selection; `None` means it sits at the root.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if no selection has that name.
    pub fn preselection_of(&self, selection: &str) -> Result<Option<String>> {
        let id = self.registry.resolve_selection(selection)?;
        match &self.registry.node(id).kind {
            NodeKind::Selection { preselection, .. } => {
                Ok(preselection.map(|p| self.registry.node(p).name.clone()))
            }
            NodeKind::Column(_) => Ok(None),
        }
    }

    /// Every selection with its preselection, in declaration order.
    #[must_use]
    pub fn selection_tree(&self) -> Vec<(String, Option<String>)> {
        self.selection_names()
            .into_iter()
            .filter_map(|name| {
                let parent = self.preselection_of(&name).ok()?;
                Some((name, parent))
            })
            .collect()
    }

    /// Public names a column or selection reads.
    ///
    /// For a selection these are the columns its decision reads.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the name is unknown.
    pub fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        let id = self.registry.resolve(name)?;
        let column = match &self.registry.node(id).kind {
            NodeKind::Column(column) => column,
            NodeKind::Selection { decision, .. } => match &self.registry.node(*decision).kind {
                NodeKind::Column(column) => column,
                NodeKind::Selection { .. } => return Ok(BTreeSet::new()),
            },
        };
        Ok(column
            .arguments()
            .iter()
            .map(|a| self.registry.node(*a).name.clone())
            .collect())
    }

    /// Variation names a column or selection carries, sorted.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the name is unknown.
    pub fn variation_names(&self, name: &str) -> Result<Vec<String>> {
        let id = self.registry.resolve(name)?;
        Ok(self
            .registry
            .variations()
            .get(id)
            .map(|set| set.names().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Lifecycle state of a column or selection.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the name is unknown.
    pub fn node_state(&self, name: &str) -> Result<NodeState> {
        Ok(self.registry.node(self.registry.resolve(name)?).state)
    }

    /// Type of a column or selection.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the name is unknown.
    pub fn data_type_of(&self, name: &str) -> Result<DataType> {
        Ok(self.registry.node(self.registry.resolve(name)?).data_type)
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.public_names(false)
    }

    /// Selection names in declaration order.
    #[must_use]
    pub fn selection_names(&self) -> Vec<String> {
        self.public_names(true)
    }

    fn public_names(&self, selections: bool) -> Vec<String> {
        self.registry
            .names()
            .filter(|n| {
                self.registry
                    .lookup(n)
                    .is_some_and(|id| self.registry.node(id).kind.is_selection() == selections)
            })
            .map(str::to_string)
            .collect()
    }

    /// Query names in booking order.
    #[must_use]
    pub fn query_names(&self) -> Vec<String> {
        self.registry.queries().iter().map(|q| q.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataflow() -> Dataflow {
        let mut df = Dataflow::new();
        df.load(
            MemoryDataset::new()
                .with_column("x", vec![-1.0, 2.0, 3.0, -4.0, 5.0])
                .unwrap(),
        )
        .unwrap();
        df
    }

    #[test]
    fn test_config_defaults() {
        let config = DataflowConfig::default();
        assert_eq!(config.threads, 1);
        assert_eq!(config.row_limit, None);
        assert!((config.weight - 1.0).abs() < f64::EPSILON);

        let config = DataflowConfig::new()
            .with_threads(4)
            .with_row_limit(10)
            .with_weight(0.5);
        assert_eq!(config.threads, 4);
        assert_eq!(config.row_limit, Some(10));
    }

    #[test]
    fn test_define_field_without_dataset() {
        let mut df = Dataflow::new();
        let err = df.define("x", ColumnSpec::field("x")).unwrap_err();
        assert!(matches!(err, FlowError::DatasetError(_)));
    }

    #[test]
    fn test_second_load_rejected() {
        let mut df = dataflow();
        let err = df.load(MemoryDataset::new()).unwrap_err();
        assert!(matches!(err, FlowError::DatasetError(_)));
    }

    #[test]
    fn test_declared_type_widens_integer_constant() {
        let mut df = Dataflow::new();
        df.define("n", ColumnSpec::constant(3i64).with_type(DataType::Float64))
            .unwrap();
        assert_eq!(df.data_type_of("n").unwrap(), DataType::Float64);

        let err = df
            .define("b", ColumnSpec::constant(true).with_type(DataType::Int64))
            .unwrap_err();
        assert!(matches!(err, FlowError::TypeError { .. }));
    }

    #[test]
    fn test_filter_requires_boolean_decision() {
        let mut df = dataflow();
        df.define("x", ColumnSpec::field("x")).unwrap();
        let err = df.apply("bad", SelectionSpec::filter("x + 1")).unwrap_err();
        assert!(matches!(err, FlowError::TypeError { .. }));
        assert!(df.selection_names().is_empty());
    }

    #[test]
    fn test_apply_advances_context() {
        let mut df = dataflow();
        df.define("x", ColumnSpec::field("x")).unwrap();
        assert!(df.context().is_root());
        df.apply("a", SelectionSpec::filter("x > 0")).unwrap();
        df.apply("b", SelectionSpec::weight("2.0")).unwrap();
        assert_eq!(df.preselection_of("b").unwrap().as_deref(), Some("a"));
        assert_eq!(df.context(), df.context_at("b").unwrap());
    }

    #[test]
    fn test_materialize_without_queries_is_trivial() {
        let mut df = Dataflow::new();
        df.materialize().unwrap();
        assert!(df.is_materialized());
        assert_eq!(df.passes(), 0);
    }

    #[test]
    fn test_queries_without_dataset_fail() {
        let mut df = Dataflow::new();
        df.define("one", ColumnSpec::constant(1.0)).unwrap();
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        df.book("n", QuerySpec::new(Counter), ["all"]).unwrap();
        let err = df.materialize().unwrap_err();
        assert!(matches!(err, FlowError::DatasetError(_)));
        assert!(!df.is_materialized());
    }

    #[test]
    fn test_book_requires_fill_for_unary_aggregation() {
        let mut df = dataflow();
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        let err = df.book("s", QuerySpec::new(WeightedSum), ["all"]).unwrap_err();
        assert!(matches!(err, FlowError::ArityError { expected: 1, .. }));
    }

    #[test]
    fn test_book_merges_selections_in_order() {
        let mut df = dataflow();
        df.define("x", ColumnSpec::field("x")).unwrap();
        df.apply("a", SelectionSpec::filter("x > 0")).unwrap();
        df.apply("b", SelectionSpec::filter("x > 2")).unwrap();
        let booked = df
            .book("n", QuerySpec::new(Counter).at(["b", "a"]), ["a", "b"])
            .unwrap();
        assert_eq!(booked.selections(), ["b".to_string(), "a".to_string()]);
        assert_eq!(df.query_names(), vec!["n".to_string()]);
    }
}
