use argmin::core::{
    CostFunction, Error as BackendError, Executor, State, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;
use disco_core::{DiscError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::trace;

fn default_max_iters_per_param() -> u64 {
    400
}

fn default_tol_f() -> f64 {
    1e-10
}

/// Budget and tolerance for [`nelder_mead`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinimizerOpts {
    /// Iteration budget per free parameter.
    #[serde(default = "default_max_iters_per_param")]
    pub max_iters_per_param: u64,
    /// Standard deviation of objective values across the simplex at convergence.
    #[serde(default = "default_tol_f")]
    pub tol_f: f64,
}

impl Default for MinimizerOpts {
    fn default() -> Self {
        Self {
            max_iters_per_param: default_max_iters_per_param(),
            tol_f: default_tol_f(),
        }
    }
}

/// Best point found by a minimisation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    /// Best vertex of the final simplex.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fx: f64,
    /// Completed iterations.
    pub iterations: u64,
    /// Objective evaluations performed.
    pub evaluations: u64,
    /// True when the solver met its tolerance inside the budget.
    pub converged: bool,
}

/// Adapts a plain closure to the solver's cost interface.
struct Objective<F>(F);

impl<F> CostFunction for Objective<F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, BackendError> {
        // The simplex is ordered with partial comparisons.
        let value = (self.0)(param);
        Ok(if value.is_nan() { f64::INFINITY } else { value })
    }
}

fn backend_error(err: BackendError) -> DiscError {
    DiscError::Convergence(
        ErrorInfo::new("minimizer-backend", "nelder-mead solver failed")
            .with_context("cause", err),
    )
}

/// Initial simplex: `x0` plus one vertex per coordinate, perturbed by 5%
/// (or set to `0.00025` when the coordinate is zero).
fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(x0.len() + 1);
    vertices.push(x0.to_vec());
    for j in 0..x0.len() {
        let mut vertex = x0.to_vec();
        vertex[j] = if vertex[j] != 0.0 {
            1.05 * vertex[j]
        } else {
            0.00025
        };
        vertices.push(vertex);
    }
    vertices
}

/// Minimises `objective` with the Nelder-Mead simplex method starting at `x0`.
///
/// Non-finite objective values are treated as `+inf`, so infeasible regions
/// can be expressed by returning `f64::INFINITY`. Running out of iterations is
/// not an error: the best vertex is returned with `converged == false`.
pub fn nelder_mead<F>(
    objective: F,
    x0: &[f64],
    opts: &MinimizerOpts,
) -> Result<Minimum, DiscError>
where
    F: Fn(&[f64]) -> f64,
{
    if x0.is_empty() {
        let fx = objective(x0);
        return Ok(Minimum {
            x: Vec::new(),
            fx,
            iterations: 0,
            evaluations: 1,
            converged: true,
        });
    }

    let max_iters = opts.max_iters_per_param * x0.len() as u64;
    let solver = NelderMead::new(initial_simplex(x0))
        .with_sd_tolerance(opts.tol_f)
        .map_err(backend_error)?;
    let result = Executor::new(Objective(objective), solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(backend_error)?;

    let state = result.state();
    let x = state.get_best_param().cloned().ok_or_else(|| {
        DiscError::Convergence(ErrorInfo::new(
            "minimizer-backend",
            "nelder-mead solver returned no parameters",
        ))
    })?;
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );
    let minimum = Minimum {
        x,
        fx: state.get_best_cost(),
        iterations: state.get_iter(),
        evaluations: state.get_func_counts().get("cost_count").copied().unwrap_or(0),
        converged,
    };

    trace!(
        iterations = minimum.iterations,
        evaluations = minimum.evaluations,
        converged,
        fx = minimum.fx,
        "nelder-mead finished"
    );
    Ok(minimum)
}
