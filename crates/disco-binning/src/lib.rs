#![deny(missing_docs)]
#![doc = "Shared binning primitives and the per-row binners used by the disco engine."]

/// Equal-count binning on tie-aware ranks.
pub mod equal_count;
/// Equal-width binning between the observed extremes.
pub mod equal_width;
/// Contingency tables and mutual information.
pub mod info;
/// Exhaustive mutual-information-optimal partitioning.
pub mod max_mi;
/// Derivative-free local minimisation.
pub mod minimize;
/// Poisson mixture-likelihood clustering.
pub mod poisson;
/// Edge binning, ranking and relabelling helpers.
pub mod primitives;

use serde::{Deserialize, Serialize};

pub use equal_count::equal_count;
pub use equal_width::equal_width;
pub use info::{index_labels, mutual_information, ContingencyTable};
pub use max_mi::{max_mutual_info, MAX_MI_BINS};
pub use minimize::{nelder_mead, Minimum, MinimizerOpts};
pub use poisson::{poisson_mixture, PoissonFit};
pub use primitives::{bin_by_edges, distinct_sorted, tie_aware_rank};

/// Result of binning one canonical row of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBinning {
    /// Contiguous 1-based state per sample.
    pub states: Vec<u32>,
    /// Edge or boundary row of `bins + 1` cells; unset cells are `NaN`.
    pub edges: Vec<f64>,
    /// False only when a likelihood fit stopped before meeting its tolerances.
    pub converged: bool,
}

impl RowBinning {
    pub(crate) fn exact(states: Vec<u32>, edges: Vec<f64>) -> Self {
        Self {
            states,
            edges,
            converged: true,
        }
    }

    /// Number of distinct states realised in the row.
    pub fn realised_states(&self) -> usize {
        self.states.iter().copied().max().unwrap_or(0) as usize
    }
}
