//! Immutable aggregation outputs.

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Weighted tally: raw entries, sum of weights and its statistical error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Count {
    /// Number of rows counted.
    pub entries: u64,
    /// Sum of weights.
    pub value: f64,
    /// Square root of the sum of squared weights.
    pub error: f64,
}

/// Uniformly binned 1-D histogram.
///
/// `contents` and `sumw2` hold `bins + 2` slots: underflow first, then the
/// regular bins, then overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges, `bins + 1` values.
    pub edges: Vec<f64>,
    /// Sum of weights per slot.
    pub contents: Vec<f64>,
    /// Sum of squared weights per slot.
    pub sumw2: Vec<f64>,
    /// Number of fills.
    pub entries: u64,
}

impl Histogram {
    /// Number of regular bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Content of regular bin `i` (0-based).
    #[must_use]
    pub fn bin(&self, i: usize) -> Option<f64> {
        (i < self.bins()).then(|| self.contents[i + 1])
    }

    /// Statistical error of regular bin `i`.
    #[must_use]
    pub fn bin_error(&self, i: usize) -> Option<f64> {
        (i < self.bins()).then(|| self.sumw2[i + 1].sqrt())
    }

    /// Weight that fell below the first edge.
    #[must_use]
    pub fn underflow(&self) -> f64 {
        self.contents.first().copied().unwrap_or(0.0)
    }

    /// Weight that fell at or above the last edge.
    #[must_use]
    pub fn overflow(&self) -> f64 {
        self.contents.last().copied().unwrap_or(0.0)
    }

    /// Sum of weights in regular bins.
    #[must_use]
    pub fn integral(&self) -> f64 {
        let n = self.contents.len();
        if n < 2 {
            return 0.0;
        }
        self.contents[1..n - 1].iter().sum()
    }
}

/// Result of one query instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Output {
    /// Weighted row count.
    Count(Count),
    /// Weighted sum of a column.
    Sum(f64),
    /// Column values of passing rows, in row order.
    Series(Vec<Value>),
    /// Binned distribution.
    Histogram(Histogram),
}

impl Output {
    /// Returns the count if this is a count output.
    #[must_use]
    pub fn as_count(&self) -> Option<&Count> {
        match self {
            Output::Count(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the sum if this is a sum output.
    #[must_use]
    pub fn as_sum(&self) -> Option<f64> {
        match self {
            Output::Sum(s) => Some(*s),
            _ => None,
        }
    }

    /// Returns the values if this is a series output.
    #[must_use]
    pub fn as_series(&self) -> Option<&[Value]> {
        match self {
            Output::Series(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the histogram if this is a histogram output.
    #[must_use]
    pub fn as_histogram(&self) -> Option<&Histogram> {
        match self {
            Output::Histogram(h) => Some(h),
            _ => None,
        }
    }

    /// Short name of the output kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Output::Count(_) => "count",
            Output::Sum(_) => "sum",
            Output::Series(_) => "series",
            Output::Histogram(_) => "histogram",
        }
    }
}
