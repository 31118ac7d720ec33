//! Query bookkeeping: aggregations, their outputs and result handles.

mod aggregation;
mod output;
mod spec;

pub use aggregation::{Accumulator, Aggregation, Counter, Histogram1D, Series, WeightedSum};
pub use output::{Count, Histogram, Output};
pub use spec::{Booked, QueryResult, QuerySpec, ResultRequest};
