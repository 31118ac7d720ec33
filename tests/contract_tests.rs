//! Contract tests for the collaborator traits and the public Dataflow API.

use lazyflow::compile::{CompiledExpression, ExpressionCompiler, Interpreter};
use lazyflow::dataset::{Dataset, DatasetField, Partition};
use lazyflow::executor::{ExecutionEngine, RowEngine};
use lazyflow::planner::ExecutionPlan;
use lazyflow::query::{Accumulator, Aggregation};
use lazyflow::{
    ColumnSpec, Counter, DataType, Dataflow, DataflowConfig, FlowError, Output, QuerySpec,
    ResultRequest, SelectionSpec, Value,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Rows `0..rows` with one Int64 field `i` equal to the row number.
struct Sequence {
    rows: u64,
    chunk: u64,
}

impl Dataset for Sequence {
    fn declare_field(&self, name: &str) -> lazyflow::Result<DatasetField> {
        if name == "i" {
            Ok(DatasetField {
                index: 0,
                name: name.to_string(),
                data_type: DataType::Int64,
            })
        } else {
            Err(FlowError::UnresolvedReference(format!("no field '{name}'")))
        }
    }

    fn row_count(&self) -> u64 {
        self.rows
    }

    fn partition(&self) -> Vec<Partition> {
        (0..self.rows)
            .step_by(usize::try_from(self.chunk).unwrap_or(1))
            .map(|s| Partition::new(s, (s + self.chunk).min(self.rows)))
            .collect()
    }

    fn read(&self, _field: &DatasetField, row: u64) -> lazyflow::Result<Value> {
        i64::try_from(row)
            .map(Value::Int64)
            .map_err(|e| FlowError::DatasetError(e.to_string()))
    }
}

fn sequence(rows: u64, chunk: u64) -> Dataflow {
    let mut df = Dataflow::new();
    df.load(Sequence { rows, chunk }).unwrap();
    df.define("i", ColumnSpec::field("i")).unwrap();
    df
}

// =============================================================================
// Dataset Contract Tests
// =============================================================================

mod dataset_contracts {
    use super::*;

    #[test]
    fn test_custom_dataset_partitions_are_all_read() {
        let mut df = sequence(95, 10);
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        df.book("n", QuerySpec::new(Counter), ["all"]).unwrap();
        let n = df.get(&ResultRequest::new("n", "all")).unwrap();
        assert_eq!(n.as_count().unwrap().entries, 95);
    }

    #[test]
    fn test_entry_intrinsic_matches_row_number() {
        let mut df = sequence(20, 3);
        df.apply("same", SelectionSpec::filter("i == entry")).unwrap();
        df.book("n", QuerySpec::new(Counter), ["same"]).unwrap();
        let n = df.get(&ResultRequest::new("n", "same")).unwrap();
        assert_eq!(n.as_count().unwrap().entries, 20);
    }

    #[test]
    fn test_integer_columns_stay_integer() {
        let mut df = sequence(4, 4);
        df.define("half", ColumnSpec::expression("i / 2")).unwrap();
        df.define("ratio", ColumnSpec::expression("i / 2.0")).unwrap();
        assert_eq!(df.data_type_of("half").unwrap(), DataType::Int64);
        assert_eq!(df.data_type_of("ratio").unwrap(), DataType::Float64);
    }
}

// =============================================================================
// Compiler Contract Tests
// =============================================================================

mod compiler_contracts {
    use super::*;

    /// Records every source text handed to the compiler.
    struct Recording {
        sources: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl ExpressionCompiler for Recording {
        fn compile(
            &self,
            source: &str,
            parameters: &[(String, DataType)],
        ) -> lazyflow::Result<Arc<dyn CompiledExpression>> {
            self.sources.lock().push((
                source.to_string(),
                parameters.iter().map(|(n, _)| n.clone()).collect(),
            ));
            Interpreter::new().compile(source, parameters)
        }
    }

    #[test]
    fn test_compiler_receives_rewritten_source() {
        let sources = Arc::new(Mutex::new(Vec::new()));
        let mut df = Dataflow::new().with_compiler(Recording {
            sources: sources.clone(),
        });
        df.define("a", ColumnSpec::constant(1.0)).unwrap();
        df.define("b", ColumnSpec::constant(2.0)).unwrap();
        df.define("c", ColumnSpec::expression("sqrt(b*b + a*a) + pi"))
            .unwrap();

        let recorded = sources.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].0,
            "sqrt(b.value()*b.value() + a.value()*a.value()) + pi"
        );
        assert_eq!(recorded[0].1, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_compilation_failure_names_source() {
        let mut df = Dataflow::new();
        let err = df
            .define("c", ColumnSpec::expression("nosuchfn(1.0)"))
            .unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference(_)));

        let err = df
            .define("d", ColumnSpec::expression("sqrt(1.0, 2.0)"))
            .unwrap_err();
        match err {
            FlowError::CompilationError { source_text, .. } => {
                assert_eq!(source_text, "sqrt(1.0, 2.0)");
            }
            other => panic!("expected compilation error, got {other:?}"),
        }
    }

    #[test]
    fn test_short_circuit_skips_unneeded_columns() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut df = sequence(10, 10);
        df.define(
            "expensive",
            ColumnSpec::definition(
                (DataType::Bool, move |_: &[Value]| -> lazyflow::Result<Value> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Bool(true))
                }),
                ["i"],
            ),
        )
        .unwrap();
        df.apply("cut", SelectionSpec::filter("i < 3 && expensive"))
            .unwrap();
        df.book("n", QuerySpec::new(Counter), ["cut"]).unwrap();
        let n = df.get(&ResultRequest::new("n", "cut")).unwrap();

        assert_eq!(n.as_count().unwrap().entries, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

// =============================================================================
// Aggregation Contract Tests
// =============================================================================

mod aggregation_contracts {
    use super::*;

    /// Largest filled value; merges by taking the maximum.
    struct Maximum;

    struct MaximumState(Option<f64>);

    impl Accumulator for MaximumState {
        fn count(&mut self, _weight: f64) {}

        fn fill(&mut self, values: &[Value], _weight: f64) -> lazyflow::Result<()> {
            let v = values[0]
                .to_f64()
                .ok_or_else(|| FlowError::ExecutionError("not numeric".into()))?;
            self.0 = Some(self.0.map_or(v, |m| m.max(v)));
            Ok(())
        }

        fn finish(self: Box<Self>) -> Output {
            Output::Sum(self.0.unwrap_or(f64::NEG_INFINITY))
        }
    }

    impl Aggregation for Maximum {
        fn name(&self) -> &str {
            "max"
        }

        fn arity(&self) -> Option<usize> {
            Some(1)
        }

        fn accumulator(&self) -> Box<dyn Accumulator> {
            Box::new(MaximumState(None))
        }

        fn merge(&self, parts: Vec<Output>) -> lazyflow::Result<Output> {
            let mut best = f64::NEG_INFINITY;
            for part in parts {
                let v = part
                    .as_sum()
                    .ok_or_else(|| FlowError::ExecutionError("mixed outputs".into()))?;
                best = best.max(v);
            }
            Ok(Output::Sum(best))
        }
    }

    #[test]
    fn test_custom_aggregation_merges_partitions() {
        let mut df = Dataflow::with_config(DataflowConfig::new().with_threads(3));
        df.load(Sequence {
            rows: 50,
            chunk: 7,
        })
        .unwrap();
        df.define("i", ColumnSpec::field("i")).unwrap();
        df.apply("odd", SelectionSpec::filter("i % 2 == 1")).unwrap();
        df.book("top", QuerySpec::new(Maximum).fill(["i"]), ["odd"])
            .unwrap();

        let top = df.get(&ResultRequest::new("top", "odd")).unwrap();
        assert_eq!(top.as_sum(), Some(49.0));
    }

    #[test]
    fn test_fill_arity_checked_at_booking() {
        let mut df = sequence(5, 5);
        df.define("j", ColumnSpec::expression("i * 2")).unwrap();
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        let err = df
            .book("top", QuerySpec::new(Maximum).fill(["i", "j"]), ["all"])
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::ArityError {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(df.query_names().is_empty());
    }

    #[test]
    fn test_unknown_fill_column() {
        let mut df = sequence(5, 5);
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        let err = df
            .book("top", QuerySpec::new(Maximum).fill(["nope"]), ["all"])
            .unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference(_)));
    }

    #[test]
    fn test_query_without_selection() {
        let mut df = sequence(5, 5);
        let err = df
            .book("n", QuerySpec::new(Counter), Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedReference(_)));
    }

    #[test]
    fn test_duplicate_query_name() {
        let mut df = sequence(5, 5);
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        df.book("n", QuerySpec::new(Counter), ["all"]).unwrap();
        let err = df.book("n", QuerySpec::new(Counter), ["all"]).unwrap_err();
        assert!(matches!(err, FlowError::NamingConflict { kind: "query", .. }));
    }
}

// =============================================================================
// Engine Contract Tests
// =============================================================================

mod engine_contracts {
    use super::*;

    /// Delegates to the row engine and counts passes.
    struct Counting {
        passes: Arc<AtomicUsize>,
    }

    impl ExecutionEngine for Counting {
        fn execute(
            &self,
            plan: &ExecutionPlan,
            dataset: &dyn Dataset,
            partitions: &[Partition],
        ) -> lazyflow::Result<Vec<Output>> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            RowEngine::default().execute(plan, dataset, partitions)
        }
    }

    /// Fails every pass.
    struct Broken;

    impl ExecutionEngine for Broken {
        fn execute(
            &self,
            _plan: &ExecutionPlan,
            _dataset: &dyn Dataset,
            _partitions: &[Partition],
        ) -> lazyflow::Result<Vec<Output>> {
            Err(FlowError::ExecutionError("engine offline".into()))
        }
    }

    #[test]
    fn test_one_pass_serves_every_query() {
        let passes = Arc::new(AtomicUsize::new(0));
        let mut df = Dataflow::new().with_engine(Counting {
            passes: passes.clone(),
        });
        df.load(Sequence { rows: 30, chunk: 8 }).unwrap();
        df.define("i", ColumnSpec::field("i")).unwrap();
        df.apply("small", SelectionSpec::filter("i < 10")).unwrap();
        df.apply_in(
            &lazyflow::SelectionContext::root(),
            "large",
            SelectionSpec::filter("i >= 10"),
        )
        .unwrap();
        df.book("n", QuerySpec::new(Counter), ["small", "large"])
            .unwrap();

        let small = df.result("n", "small").unwrap();
        let large = df.result("n", "large").unwrap();
        assert_eq!(small.nominal().as_count().unwrap().entries, 10);
        assert_eq!(large.nominal().as_count().unwrap().entries, 20);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_engine_failure_leaves_dataflow_writable() {
        let mut df = Dataflow::new().with_engine(Broken);
        df.load(Sequence { rows: 3, chunk: 3 }).unwrap();
        df.apply("all", SelectionSpec::filter("true")).unwrap();
        df.book("n", QuerySpec::new(Counter), ["all"]).unwrap();

        let err = df.materialize().unwrap_err();
        assert!(matches!(err, FlowError::ExecutionError(_)));
        assert!(!df.is_materialized());
        df.define("later", ColumnSpec::constant(1.0)).unwrap();
    }
}
