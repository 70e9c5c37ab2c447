use disco_core::errors::DiscError;
use serde::{Deserialize, Serialize};

use crate::serde::{from_json_slice, from_yaml_slice};

/// Loosely typed positional method parameter.
///
/// Parameters are typed only when the row is encoded, so a malformed payload
/// surfaces as [`DiscError::InvalidParameter`] rather than a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// Keyword such as a probability mode.
    Text(String),
    /// Single row of numbers.
    Vector(Vec<f64>),
    /// Rows of numbers.
    Matrix(Vec<Vec<f64>>),
}

impl Param {
    /// Interprets the parameter as a non-negative integer.
    pub fn as_count(&self) -> Option<usize> {
        match self {
            Param::Int(value) => usize::try_from(*value).ok(),
            Param::Float(value) if *value >= 0.0 && value.fract() == 0.0 => {
                Some(*value as usize)
            }
            _ => None,
        }
    }

    /// Interprets the parameter as a keyword.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Param::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interprets the parameter as rows of numbers; a vector is a single row.
    pub fn as_rows(&self) -> Option<Vec<Vec<f64>>> {
        match self {
            Param::Vector(row) => Some(vec![row.clone()]),
            Param::Matrix(rows) => Some(rows.clone()),
            _ => None,
        }
    }
}

impl From<usize> for Param {
    fn from(value: usize) -> Self {
        Param::Int(value as i64)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<Vec<f64>> for Param {
    fn from(value: Vec<f64>) -> Self {
        Param::Vector(value)
    }
}

impl From<Vec<Vec<f64>>> for Param {
    fn from(value: Vec<Vec<f64>>) -> Self {
        Param::Matrix(value)
    }
}

/// One row of the method table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRow {
    /// Category index; may be omitted on every row of a single-category raster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<usize>,
    /// Variable index within the category.
    pub variable: usize,
    /// Method name, e.g. `equal-width`.
    pub method: String,
    /// Positional method parameters.
    #[serde(default)]
    pub params: Vec<Param>,
}

impl MethodRow {
    /// Creates a row without a category column.
    pub fn new(variable: usize, method: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            category: None,
            variable,
            method: method.into(),
            params,
        }
    }

    /// Sets the category column.
    pub fn in_category(mut self, category: usize) -> Self {
        self.category = Some(category);
        self
    }
}

/// Ordered method assignments, one row per converted variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodTable {
    rows: Vec<MethodRow>,
}

impl MethodTable {
    /// Wraps the provided rows.
    pub fn new(rows: Vec<MethodRow>) -> Self {
        Self { rows }
    }

    /// Rows in input order.
    pub fn rows(&self) -> &[MethodRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table assigns no method.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Loads a table from a YAML sequence of rows.
    pub fn from_yaml_slice(data: &[u8]) -> Result<Self, DiscError> {
        from_yaml_slice(data)
    }

    /// Loads a table from a JSON array of rows.
    pub fn from_json_slice(data: &[u8]) -> Result<Self, DiscError> {
        from_json_slice(data)
    }
}

impl FromIterator<MethodRow> for MethodTable {
    fn from_iter<I: IntoIterator<Item = MethodRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
