//! In-memory columnar dataset.

use crate::error::{FlowError, Result};
use crate::types::{DataType, Value};

use super::{Dataset, DatasetField, Partition};

/// A named, typed column of values.
#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

/// Dataset backed by columns held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    columns: Vec<MemoryColumn>,
    rows: u64,
    partition_size: Option<u64>,
}

impl MemoryDataset {
    /// Creates an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column whose type is taken from its first value.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError` if the column is empty and carries no type,
    /// if values disagree in type, if the length differs from existing
    /// columns, or if the name is taken.
    pub fn with_column<V: Into<Value>>(self, name: &str, values: Vec<V>) -> Result<Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let Some(first) = values.first() else {
            return Err(FlowError::DatasetError(format!(
                "cannot infer the type of empty column '{name}'"
            )));
        };
        let data_type = first.data_type();
        self.with_typed_column(name, data_type, values)
    }

    /// Adds a column of the given type, widening INT64 values to FLOAT64
    /// where requested.
    ///
    /// # Errors
    ///
    /// See [`MemoryDataset::with_column`].
    pub fn with_typed_column(
        mut self,
        name: &str,
        data_type: DataType,
        values: Vec<Value>,
    ) -> Result<Self> {
        if self.columns.iter().any(|c| c.name == name) {
            return Err(FlowError::DatasetError(format!(
                "column '{name}' defined twice"
            )));
        }
        let len = values.len() as u64;
        if !self.columns.is_empty() && len != self.rows {
            return Err(FlowError::DatasetError(format!(
                "column '{name}' has {len} rows, expected {}",
                self.rows
            )));
        }
        let values = values
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                let actual = v.data_type();
                v.cast(data_type).ok_or_else(|| {
                    FlowError::DatasetError(format!(
                        "column '{name}' row {row}: expected {data_type}, got {actual}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.rows = len;
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data_type,
            values,
        });
        Ok(self)
    }

    /// Splits rows into partitions of at most `size` rows.
    #[must_use]
    pub fn with_partition_size(mut self, size: u64) -> Self {
        self.partition_size = Some(size.max(1));
        self
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Dataset for MemoryDataset {
    fn declare_field(&self, name: &str) -> Result<DatasetField> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|index| DatasetField {
                index,
                name: name.to_string(),
                data_type: self.columns[index].data_type,
            })
            .ok_or_else(|| {
                FlowError::UnresolvedReference(format!("dataset has no field '{name}'"))
            })
    }

    fn row_count(&self) -> u64 {
        self.rows
    }

    fn partition(&self) -> Vec<Partition> {
        let Some(size) = self.partition_size else {
            return vec![Partition::new(0, self.rows)];
        };
        let mut parts = Vec::new();
        let mut start = 0;
        while start < self.rows {
            let end = (start + size).min(self.rows);
            parts.push(Partition::new(start, end));
            start = end;
        }
        parts
    }

    fn read(&self, field: &DatasetField, row: u64) -> Result<Value> {
        let column = self.columns.get(field.index).ok_or_else(|| {
            FlowError::DatasetError(format!("field '{}' is not declared", field.name))
        })?;
        usize::try_from(row)
            .ok()
            .and_then(|r| column.values.get(r))
            .cloned()
            .ok_or_else(|| {
                FlowError::DatasetError(format!(
                    "row {row} out of range for field '{}' ({} rows)",
                    field.name, self.rows
                ))
            })
    }
}
