//! CSV-backed dataset.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::types::{DataType, Value};

use super::{Dataset, DatasetField, MemoryDataset, Partition};

/// Configuration for reading a CSV file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field separator (default: ',').
    pub delimiter: char,
    /// Quote character (default: '"').
    pub quote: char,
    /// Whether the first row is a header (default: true).
    pub has_header: bool,
    /// Declared column types; other columns are inferred.
    pub types: HashMap<String, DataType>,
    /// Rows per partition (default: one partition).
    pub partition_size: Option<u64>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            has_header: true,
            types: HashMap::new(),
            partition_size: None,
        }
    }
}

impl CsvOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the quote character.
    #[must_use]
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Declares the type of one column instead of inferring it.
    #[must_use]
    pub fn with_type(mut self, column: &str, data_type: DataType) -> Self {
        self.types.insert(column.to_string(), data_type);
        self
    }

    /// Sets the number of rows per partition.
    #[must_use]
    pub fn with_partition_size(mut self, size: u64) -> Self {
        self.partition_size = Some(size);
        self
    }
}

/// Dataset read eagerly from a CSV file.
///
/// Without a header, columns are named `column0`, `column1`, ...
#[derive(Debug, Clone)]
pub struct CsvDataset {
    inner: MemoryDataset,
}

impl CsvDataset {
    /// Reads a CSV file with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value does not
    /// parse as its declared type.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &CsvOptions::default())
    }

    /// Reads a CSV file with the given options.
    ///
    /// # Errors
    ///
    /// See [`CsvDataset::open`].
    pub fn open_with(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, options)
    }

    /// Reads CSV text from any reader.
    ///
    /// # Errors
    ///
    /// See [`CsvDataset::open`].
    pub fn from_reader<R: std::io::Read>(reader: R, options: &CsvOptions) -> Result<Self> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(options.delimiter as u8)
            .quote(options.quote as u8)
            .has_headers(options.has_header)
            .from_reader(reader);

        let mut names: Vec<String> = if options.has_header {
            reader.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            if !options.has_header && names.is_empty() {
                names = (0..record.len()).map(|i| format!("column{i}")).collect();
                cells = vec![Vec::new(); names.len()];
            }
            if record.len() != names.len() {
                return Err(FlowError::DatasetError(format!(
                    "CSV row {} has {} fields, expected {}",
                    idx + 1,
                    record.len(),
                    names.len()
                )));
            }
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(field.trim().to_string());
            }
        }

        let mut inner = MemoryDataset::new();
        for (name, column) in names.iter().zip(cells) {
            let data_type = match options.types.get(name) {
                Some(declared) => *declared,
                None => infer_type(&column),
            };
            let values = column
                .iter()
                .enumerate()
                .map(|(row, text)| {
                    parse_value(text, data_type).ok_or_else(|| {
                        FlowError::DatasetError(format!(
                            "column '{name}' row {}: cannot parse '{text}' as {data_type}",
                            row + 1
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            inner = inner.with_typed_column(name, data_type, values)?;
        }
        if let Some(size) = options.partition_size {
            inner = inner.with_partition_size(size);
        }
        Ok(CsvDataset { inner })
    }

    /// Returns the column names in file order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.inner.column_names()
    }
}

/// Picks the narrowest type every cell parses as: INT64, FLOAT64, BOOL,
/// then STRING.
fn infer_type(cells: &[String]) -> DataType {
    [DataType::Int64, DataType::Float64, DataType::Bool]
        .into_iter()
        .find(|t| !cells.is_empty() && cells.iter().all(|c| parse_value(c, *t).is_some()))
        .unwrap_or(DataType::String)
}

fn parse_value(text: &str, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Int64 => text.parse().ok().map(Value::Int64),
        DataType::Float64 => text.parse().ok().map(Value::Float64),
        DataType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        DataType::String => Some(Value::String(text.to_string())),
    }
}

impl Dataset for CsvDataset {
    fn declare_field(&self, name: &str) -> Result<DatasetField> {
        self.inner.declare_field(name)
    }

    fn row_count(&self) -> u64 {
        self.inner.row_count()
    }

    fn partition(&self) -> Vec<Partition> {
        self.inner.partition()
    }

    fn read(&self, field: &DatasetField, row: u64) -> Result<Value> {
        self.inner.read(field, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infers_types() {
        let text = "x,n,flag,label\n1.5,1,true,a\n-2,2,false,b\n";
        let ds = CsvDataset::from_reader(text.as_bytes(), &CsvOptions::default()).unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.declare_field("x").unwrap().data_type, DataType::Float64);
        assert_eq!(ds.declare_field("n").unwrap().data_type, DataType::Int64);
        assert_eq!(ds.declare_field("flag").unwrap().data_type, DataType::Bool);
        assert_eq!(ds.declare_field("label").unwrap().data_type, DataType::String);
    }

    #[test]
    fn test_declared_type_wins() {
        let options = CsvOptions::new().with_type("n", DataType::Float64);
        let ds = CsvDataset::from_reader("n\n1\n2\n".as_bytes(), &options).unwrap();
        let field = ds.declare_field("n").unwrap();
        assert_eq!(ds.read(&field, 1).unwrap(), Value::Float64(2.0));
    }

    #[test]
    fn test_headerless_names() {
        let options = CsvOptions::new().with_header(false).with_delimiter(';');
        let ds = CsvDataset::from_reader("1;2\n3;4\n".as_bytes(), &options).unwrap();
        assert_eq!(ds.column_names(), vec!["column0", "column1"]);
    }

    #[test]
    fn test_bad_declared_value() {
        let options = CsvOptions::new().with_type("n", DataType::Int64);
        let err = CsvDataset::from_reader("n\n1\nx\n".as_bytes(), &options).unwrap_err();
        assert!(matches!(err, FlowError::DatasetError(ref m) if m.contains("'x'")));
    }
}
