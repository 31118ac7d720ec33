//! Dataset adapter contract and the bundled in-process datasets.
//!
//! A dataset declares the fields it can provide, splits its rows into
//! partitions, and serves typed values per (field, row) during a pass.

mod csv;
mod memory;
pub mod partition;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DataType, Value};

pub use self::csv::{CsvDataset, CsvOptions};
pub use memory::MemoryDataset;
pub use partition::Partition;

/// A field declared by a dataset for reading during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetField {
    /// Position of the field within the dataset.
    pub index: usize,
    /// Field name.
    pub name: String,
    /// Semantic type of every value of this field.
    pub data_type: DataType,
}

/// Source of rows for a dataflow.
pub trait Dataset: Send + Sync {
    /// Declares a field for reading and reports its type.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the dataset has no such field.
    fn declare_field(&self, name: &str) -> Result<DatasetField>;

    /// Total number of rows.
    fn row_count(&self) -> u64;

    /// Splits the rows into contiguous ranges, in row order.
    fn partition(&self) -> Vec<Partition> {
        vec![Partition::new(0, self.row_count())]
    }

    /// Reads one value of a declared field.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` for rows outside the dataset.
    fn read(&self, field: &DatasetField, row: u64) -> Result<Value>;
}
