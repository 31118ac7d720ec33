//! Aggregation contract and the built-in aggregations.
//!
//! Each worker owns one [`Accumulator`] per query instance and fills it
//! with the rows of its partition. After every worker has finished, the
//! per-partition outputs are combined with [`Aggregation::merge`], which
//! must be commutative and associative over partitions.

use crate::error::{FlowError, Result};
use crate::types::{DataType, Value};

use super::output::{Count, Histogram, Output};

/// Definition of an aggregation a query evaluates.
pub trait Aggregation: Send + Sync {
    /// Name used in plans and error messages.
    fn name(&self) -> &str;

    /// Columns each fill group must supply, if fixed.
    fn arity(&self) -> Option<usize>;

    /// Validates the types of one fill group.
    ///
    /// # Errors
    ///
    /// Returns `ArityError` or `TypeError` for unusable groups.
    fn validate(&self, types: &[DataType]) -> Result<()> {
        match self.arity() {
            Some(expected) if expected != types.len() => Err(FlowError::ArityError {
                context: format!("fill of '{}'", self.name()),
                expected,
                actual: types.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Creates an empty per-partition accumulator.
    fn accumulator(&self) -> Box<dyn Accumulator>;

    /// Combines per-partition outputs, given in partition order.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the parts are not of this aggregation's
    /// output kind or cannot be combined.
    fn merge(&self, parts: Vec<Output>) -> Result<Output>;
}

/// Per-partition state of one query instance.
pub trait Accumulator: Send {
    /// Records one passing row, before any fills for it.
    fn count(&mut self, weight: f64);

    /// Records one fill group of one passing row.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the values cannot be consumed.
    fn fill(&mut self, values: &[Value], weight: f64) -> Result<()>;

    /// Returns the accumulated output.
    fn finish(self: Box<Self>) -> Output;
}

fn numeric(aggregation: &str, types: &[DataType]) -> Result<()> {
    match types.iter().find(|t| !t.is_numeric()) {
        Some(t) => Err(FlowError::type_error(
            format!("fill of '{aggregation}'"),
            "a numeric column",
            t,
        )),
        None => Ok(()),
    }
}

fn mismatch(aggregation: &str, output: &Output) -> FlowError {
    FlowError::ExecutionError(format!(
        "cannot merge {} output into '{aggregation}'",
        output.kind()
    ))
}

fn fill_value(aggregation: &str, values: &[Value]) -> Result<f64> {
    values
        .first()
        .and_then(Value::to_f64)
        .ok_or_else(|| FlowError::ExecutionError(format!("'{aggregation}' expects one numeric value")))
}

// ============================================================================
// Counter
// ============================================================================

/// Counts passing rows with their weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counter;

impl Counter {
    /// Creates a counter.
    #[must_use]
    pub fn new() -> Self {
        Counter
    }
}

#[derive(Default)]
struct CounterState {
    entries: u64,
    sumw: f64,
    sumw2: f64,
}

impl Aggregation for Counter {
    fn name(&self) -> &str {
        "count"
    }

    fn arity(&self) -> Option<usize> {
        Some(0)
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(CounterState::default())
    }

    fn merge(&self, parts: Vec<Output>) -> Result<Output> {
        let mut total = Count::default();
        let mut sumw2 = 0.0;
        for part in parts {
            let c = match part {
                Output::Count(c) => c,
                other => return Err(mismatch(self.name(), &other)),
            };
            total.entries += c.entries;
            total.value += c.value;
            sumw2 += c.error * c.error;
        }
        total.error = sumw2.sqrt();
        Ok(Output::Count(total))
    }
}

impl Accumulator for CounterState {
    fn count(&mut self, weight: f64) {
        self.entries += 1;
        self.sumw += weight;
        self.sumw2 += weight * weight;
    }

    fn fill(&mut self, _values: &[Value], _weight: f64) -> Result<()> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> Output {
        Output::Count(Count {
            entries: self.entries,
            value: self.sumw,
            error: self.sumw2.sqrt(),
        })
    }
}

// ============================================================================
// WeightedSum
// ============================================================================

/// Sums a numeric column, each value scaled by the row weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedSum;

impl WeightedSum {
    /// Creates a weighted sum.
    #[must_use]
    pub fn new() -> Self {
        WeightedSum
    }
}

struct SumState(f64);

impl Aggregation for WeightedSum {
    fn name(&self) -> &str {
        "sum"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn validate(&self, types: &[DataType]) -> Result<()> {
        if types.len() != 1 {
            return Err(FlowError::ArityError {
                context: format!("fill of '{}'", self.name()),
                expected: 1,
                actual: types.len(),
            });
        }
        numeric(self.name(), types)
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SumState(0.0))
    }

    fn merge(&self, parts: Vec<Output>) -> Result<Output> {
        let mut total = 0.0;
        for part in parts {
            match part {
                Output::Sum(s) => total += s,
                other => return Err(mismatch(self.name(), &other)),
            }
        }
        Ok(Output::Sum(total))
    }
}

impl Accumulator for SumState {
    fn count(&mut self, _weight: f64) {}

    fn fill(&mut self, values: &[Value], weight: f64) -> Result<()> {
        self.0 += fill_value("sum", values)? * weight;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Output {
        Output::Sum(self.0)
    }
}

// ============================================================================
// Series
// ============================================================================

/// Collects the values of one column for every passing row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Series;

impl Series {
    /// Creates a series collector.
    #[must_use]
    pub fn new() -> Self {
        Series
    }
}

struct SeriesState(Vec<Value>);

impl Aggregation for Series {
    fn name(&self) -> &str {
        "series"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(SeriesState(Vec::new()))
    }

    fn merge(&self, parts: Vec<Output>) -> Result<Output> {
        let mut all = Vec::new();
        for part in parts {
            match part {
                Output::Series(values) => all.extend(values),
                other => return Err(mismatch(self.name(), &other)),
            }
        }
        Ok(Output::Series(all))
    }
}

impl Accumulator for SeriesState {
    fn count(&mut self, _weight: f64) {}

    fn fill(&mut self, values: &[Value], _weight: f64) -> Result<()> {
        let value = values.first().cloned().ok_or_else(|| {
            FlowError::ExecutionError("'series' expects one value per fill".to_string())
        })?;
        self.0.push(value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Output {
        Output::Series(self.0)
    }
}

// ============================================================================
// Histogram
// ============================================================================

/// Fills a uniformly binned histogram with weighted values.
#[derive(Debug, Clone)]
pub struct Histogram1D {
    edges: Vec<f64>,
}

impl Histogram1D {
    /// Creates `bins` equal-width bins over `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if `bins` is zero or the range is empty.
    pub fn new(bins: usize, min: f64, max: f64) -> Result<Self> {
        if bins == 0 || min.is_nan() || max.is_nan() || min >= max {
            return Err(FlowError::ExecutionError(format!(
                "invalid histogram binning: {bins} bins over [{min}, {max})"
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let width = (max - min) / bins as f64;
        #[allow(clippy::cast_precision_loss)]
        let edges = (0..=bins).map(|i| min + width * i as f64).collect();
        Ok(Histogram1D { edges })
    }

    fn empty(&self) -> Histogram {
        let slots = self.edges.len() + 1;
        Histogram {
            edges: self.edges.clone(),
            contents: vec![0.0; slots],
            sumw2: vec![0.0; slots],
            entries: 0,
        }
    }
}

struct HistogramState(Histogram);

impl Aggregation for Histogram1D {
    fn name(&self) -> &str {
        "histogram"
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn validate(&self, types: &[DataType]) -> Result<()> {
        if types.len() != 1 {
            return Err(FlowError::ArityError {
                context: format!("fill of '{}'", self.name()),
                expected: 1,
                actual: types.len(),
            });
        }
        numeric(self.name(), types)
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(HistogramState(self.empty()))
    }

    fn merge(&self, parts: Vec<Output>) -> Result<Output> {
        let mut total = self.empty();
        for part in parts {
            let h = match part {
                Output::Histogram(h) => h,
                other => return Err(mismatch(self.name(), &other)),
            };
            if h.edges != total.edges {
                return Err(FlowError::ExecutionError(
                    "cannot merge histograms with different binning".to_string(),
                ));
            }
            for (t, c) in total.contents.iter_mut().zip(&h.contents) {
                *t += c;
            }
            for (t, c) in total.sumw2.iter_mut().zip(&h.sumw2) {
                *t += c;
            }
            total.entries += h.entries;
        }
        Ok(Output::Histogram(total))
    }
}

impl Accumulator for HistogramState {
    fn count(&mut self, _weight: f64) {}

    fn fill(&mut self, values: &[Value], weight: f64) -> Result<()> {
        let x = fill_value("histogram", values)?;
        let edges = &self.0.edges;
        let slot = if x.is_nan() || x < edges[0] {
            0
        } else {
            // partition_point gives the first edge strictly above x
            edges.partition_point(|e| *e <= x)
        };
        self.0.contents[slot] += weight;
        self.0.sumw2[slot] += weight * weight;
        self.0.entries += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Output {
        Output::Histogram(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_errors_merge_in_quadrature() {
        let counter = Counter;
        let mut a = counter.accumulator();
        a.count(2.0);
        let mut b = counter.accumulator();
        b.count(1.0);
        b.count(2.0);
        let merged = counter.merge(vec![a.finish(), b.finish()]).unwrap();
        let count = merged.as_count().unwrap();
        assert_eq!(count.entries, 3);
        assert!((count.value - 5.0).abs() < 1e-12);
        assert!((count.error - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_slots() {
        let hist = Histogram1D::new(2, 0.0, 2.0).unwrap();
        let mut acc = hist.accumulator();
        for x in [-1.0, 0.0, 0.5, 1.0, 2.0, 5.0] {
            acc.fill(&[Value::Float64(x)], 1.0).unwrap();
        }
        let out = acc.finish();
        let h = out.as_histogram().unwrap();
        assert_eq!(h.underflow(), 1.0);
        assert_eq!(h.bin(0), Some(2.0));
        assert_eq!(h.bin(1), Some(1.0));
        assert_eq!(h.overflow(), 2.0);
        assert_eq!(h.entries, 6);
    }

    #[test]
    fn test_histogram_rejects_bad_binning() {
        assert!(Histogram1D::new(0, 0.0, 1.0).is_err());
        assert!(Histogram1D::new(3, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_sum_requires_numeric() {
        assert!(WeightedSum.validate(&[DataType::String]).is_err());
        assert!(WeightedSum.validate(&[DataType::Int64]).is_ok());
        assert!(matches!(
            Counter.validate(&[DataType::Int64]),
            Err(FlowError::ArityError { expected: 0, .. })
        ));
    }

    #[test]
    fn test_merge_kind_mismatch() {
        assert!(Counter.merge(vec![Output::Sum(1.0)]).is_err());
    }
}
