//! Binder scope for parameter and intrinsic lookup.

use std::collections::HashMap;

use crate::types::DataType;

/// Names visible to an expression while it is being bound.
#[derive(Debug, Clone, Default)]
pub struct BinderScope {
    /// Parameter name -> bound parameter info.
    parameters: HashMap<String, BoundParameter>,
}

impl BinderScope {
    /// Creates a scope from an ordered parameter list.
    #[must_use]
    pub fn new(parameters: &[(String, DataType)]) -> Self {
        let parameters = parameters
            .iter()
            .enumerate()
            .map(|(index, (name, data_type))| {
                (
                    name.clone(),
                    BoundParameter {
                        index,
                        data_type: *data_type,
                    },
                )
            })
            .collect();
        BinderScope { parameters }
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<BoundParameter> {
        self.parameters.get(name).copied()
    }

    /// Looks up an intrinsic symbol by name.
    #[must_use]
    pub fn intrinsic(name: &str) -> Option<Intrinsic> {
        match name {
            "pi" => Some(Intrinsic::Pi),
            "e" => Some(Intrinsic::E),
            "entry" => Some(Intrinsic::Entry),
            _ => None,
        }
    }

    /// Number of parameters in scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns true if no parameters are in scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// A parameter slot in the compiled callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundParameter {
    /// Position in the argument list.
    pub index: usize,
    /// Declared value type.
    pub data_type: DataType,
}

/// Symbols the interpreter provides without any column behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// The constant pi.
    Pi,
    /// Euler's number.
    E,
    /// Row number of the entry being processed.
    Entry,
}
