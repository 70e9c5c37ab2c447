use disco_binning::MinimizerOpts;
use disco_core::errors::DiscError;
use serde::{Deserialize, Serialize};

use crate::serde::{from_json_slice, from_yaml_slice};

fn default_probability_tolerance() -> f64 {
    1e-9
}

fn default_concurrency() -> usize {
    1
}

/// What to do when a Poisson-mixture fit exhausts its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergencePolicy {
    /// Abort the whole call with [`DiscError::Convergence`].
    #[default]
    Fail,
    /// Keep the best vertex found and flag the result as unconverged.
    Keep,
}

/// Options governing a discretization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizeOpts {
    /// Allowed deviation of a manual probability row sum from one; `0.0` demands exact equality.
    #[serde(default = "default_probability_tolerance")]
    pub probability_tolerance: f64,
    /// Worker threads used to bin the time bins of one variable.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Handling of Poisson fits that stop before converging.
    #[serde(default)]
    pub on_non_convergence: ConvergencePolicy,
    /// Nelder-Mead budget and tolerances for Poisson fits.
    #[serde(default)]
    pub minimizer: MinimizerOpts,
}

impl Default for DiscretizeOpts {
    fn default() -> Self {
        Self {
            probability_tolerance: default_probability_tolerance(),
            concurrency: default_concurrency(),
            on_non_convergence: ConvergencePolicy::default(),
            minimizer: MinimizerOpts::default(),
        }
    }
}

impl DiscretizeOpts {
    /// Options that reproduce exact probability-sum checking.
    pub fn strict() -> Self {
        Self {
            probability_tolerance: 0.0,
            ..Self::default()
        }
    }

    /// Loads options from YAML bytes; omitted fields take their defaults.
    pub fn from_yaml_slice(data: &[u8]) -> Result<Self, DiscError> {
        from_yaml_slice(data)
    }

    /// Loads options from JSON bytes; omitted fields take their defaults.
    pub fn from_json_slice(data: &[u8]) -> Result<Self, DiscError> {
        from_json_slice(data)
    }
}
