//! Value types shared by columns, datasets and query outputs.

mod value;

pub use value::{DataType, Value};
