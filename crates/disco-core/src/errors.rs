//! Structured error types shared across disco crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`DiscError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (row index, category, variable, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the discretization engine.
///
/// Every family except [`DiscError::Convergence`] and [`DiscError::Serde`] is
/// raised while validating the method table, before any slice is transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum DiscError {
    /// Method table layout inconsistent with the raster.
    #[error("input shape error: {0}")]
    InputShape(ErrorInfo),
    /// The same (category, variable) pair is assigned more than once.
    #[error("duplicate assignment: {0}")]
    DuplicateAssignment(ErrorInfo),
    /// Unrecognised method name.
    #[error("invalid method: {0}")]
    InvalidMethod(ErrorInfo),
    /// Malformed method parameters.
    #[error("invalid parameter: {0}")]
    InvalidParameter(ErrorInfo),
    /// A max-mutual-information reference cannot be resolved.
    #[error("dependency error: {0}")]
    Dependency(ErrorInfo),
    /// Max-mutual-information requests more bins than the search allows.
    #[error("bin count exceeded: {0}")]
    BinCountExceeded(ErrorInfo),
    /// Manual mixture probabilities do not match the requested state count.
    #[error("probability mismatch: {0}")]
    ProbabilityMismatch(ErrorInfo),
    /// A manual mixture probability row does not sum to one.
    #[error("probability normalization error: {0}")]
    ProbabilityNormalization(ErrorInfo),
    /// Raw values that the selected method cannot bin.
    #[error("invalid data: {0}")]
    InvalidData(ErrorInfo),
    /// Likelihood optimisation ran out of budget before converging.
    #[error("convergence failure: {0}")]
    Convergence(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl DiscError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            DiscError::InputShape(info)
            | DiscError::DuplicateAssignment(info)
            | DiscError::InvalidMethod(info)
            | DiscError::InvalidParameter(info)
            | DiscError::Dependency(info)
            | DiscError::BinCountExceeded(info)
            | DiscError::ProbabilityMismatch(info)
            | DiscError::ProbabilityNormalization(info)
            | DiscError::InvalidData(info)
            | DiscError::Convergence(info)
            | DiscError::Serde(info) => info,
        }
    }

    /// Returns true when the error was raised by table validation.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DiscError::Convergence(_) | DiscError::Serde(_))
    }
}
