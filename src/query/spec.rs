//! Query declarations and result handles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FlowError, Result};
use crate::graph::variation::canonical_name;

use super::aggregation::Aggregation;
use super::output::Output;

/// An aggregation plus its fill groups and booked selections.
#[derive(Clone)]
pub struct QuerySpec {
    pub(crate) aggregation: Arc<dyn Aggregation>,
    pub(crate) fills: Vec<Vec<String>>,
    pub(crate) selections: Vec<String>,
}

impl QuerySpec {
    /// Creates a query evaluating `aggregation`.
    pub fn new(aggregation: impl Aggregation + 'static) -> Self {
        Self::from_arc(Arc::new(aggregation))
    }

    /// Creates a query from a shared aggregation.
    #[must_use]
    pub fn from_arc(aggregation: Arc<dyn Aggregation>) -> Self {
        QuerySpec {
            aggregation,
            fills: Vec::new(),
            selections: Vec::new(),
        }
    }

    /// Appends one fill group: the columns handed to one fill per row.
    #[must_use]
    pub fn fill<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fills.push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Books the query at the given selections.
    #[must_use]
    pub fn at<I, S>(mut self, selections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections.extend(selections.into_iter().map(Into::into));
        self
    }

    /// Returns the aggregation name.
    #[must_use]
    pub fn aggregation_name(&self) -> &str {
        self.aggregation.name()
    }

    /// Returns the fill groups.
    #[must_use]
    pub fn fills(&self) -> &[Vec<String>] {
        &self.fills
    }
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("aggregation", &self.aggregation.name())
            .field("fills", &self.fills)
            .field("selections", &self.selections)
            .finish()
    }
}

/// Address of one result: query, selection and optional variation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultRequest {
    /// Query name.
    pub query: String,
    /// Selection the query was booked at.
    pub selection: String,
    /// Variation name, or None for nominal.
    pub variation: Option<String>,
}

impl ResultRequest {
    /// Requests the nominal result of `query` at `selection`.
    pub fn new(query: impl Into<String>, selection: impl Into<String>) -> Self {
        ResultRequest {
            query: query.into(),
            selection: selection.into(),
            variation: None,
        }
    }

    /// Narrows the request to a named variation.
    #[must_use]
    pub fn variation(mut self, name: impl Into<String>) -> Self {
        self.variation = Some(name.into());
        self
    }
}

/// Handle returned by booking a query: one lazy request per selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booked {
    query: String,
    selections: Vec<String>,
}

impl Booked {
    pub(crate) fn new(query: String, selections: Vec<String>) -> Self {
        Booked { query, selections }
    }

    /// Query name.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Booked selections, in booking order.
    #[must_use]
    pub fn selections(&self) -> &[String] {
        &self.selections
    }

    /// Request for the nominal result at one selection.
    #[must_use]
    pub fn request(&self, selection: &str) -> ResultRequest {
        ResultRequest::new(self.query.clone(), selection)
    }

    /// Requests for every booked selection.
    #[must_use]
    pub fn requests(&self) -> Vec<ResultRequest> {
        self.selections.iter().map(|s| self.request(s)).collect()
    }
}

/// Materialized outputs of one query instance.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    query: String,
    selection: String,
    nominal: Output,
    variations: BTreeMap<String, Output>,
}

impl QueryResult {
    pub(crate) fn new(
        query: String,
        selection: String,
        nominal: Output,
        variations: BTreeMap<String, Output>,
    ) -> Self {
        QueryResult {
            query,
            selection,
            nominal,
            variations,
        }
    }

    /// Query name.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Selection the instance was booked at.
    #[must_use]
    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// Nominal output.
    #[must_use]
    pub fn nominal(&self) -> &Output {
        &self.nominal
    }

    /// Output under the named variation.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariation` if the instance carries no such variation.
    ///
    /// Combined variations may name their components in any order.
    pub fn variation(&self, name: &str) -> Result<&Output> {
        self.variations
            .get(name)
            .or_else(|| self.variations.get(&canonical_name(name)))
            .ok_or_else(|| FlowError::UnknownVariation {
                query: format!("{}@{}", self.query, self.selection),
                variation: name.to_string(),
            })
    }

    /// Outputs under several variations, in the order asked.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariation` for the first name the instance does not
    /// carry.
    pub fn variations<I, S>(&self, names: I) -> Result<Vec<&Output>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.variation(name.as_ref()))
            .collect()
    }

    /// Names of the variations carried by this instance, sorted.
    #[must_use]
    pub fn variation_names(&self) -> Vec<&str> {
        self.variations.keys().map(String::as_str).collect()
    }
}
