use disco_core::{DiscretizationProvenance, Raster, SampleAxis, VarRef};
use serde::{Deserialize, Serialize};

use crate::encode::MethodKind;

/// Outcome of one method-table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    /// Position of the row in the input table.
    pub row: usize,
    /// Variable the row converted.
    pub target: VarRef,
    /// Method applied, with its validated payload.
    pub method: MethodKind,
    /// Sample-axis mode of the variable; `None` for identity rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<SampleAxis>,
    /// One edge row per canonical time bin, `bins + 1` cells each; empty for identity.
    #[serde(with = "crate::serde::edge_table")]
    pub edges: Vec<Vec<f64>>,
    /// False when any Poisson fit of the variable stopped short of its tolerances.
    pub converged: bool,
}

/// States raster with per-row metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discretization {
    /// Same variant and shapes as the input; binned slices hold 1-based states.
    pub states: Raster,
    /// One entry per table row, in input row order.
    pub results: Vec<MethodResult>,
    /// Hashes identifying inputs and output.
    pub provenance: DiscretizationProvenance,
}

impl Discretization {
    /// Result of the row that converted `target`, if any.
    pub fn result_for(&self, target: VarRef) -> Option<&MethodResult> {
        self.results.iter().find(|result| result.target == target)
    }

    /// Returns true when every Poisson fit met its tolerances.
    pub fn all_converged(&self) -> bool {
        self.results.iter().all(|result| result.converged)
    }
}
