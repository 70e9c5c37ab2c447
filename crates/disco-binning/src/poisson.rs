use disco_core::DiscError;
use statrs::function::gamma::ln_gamma;

use crate::minimize::{nelder_mead, Minimum, MinimizerOpts};
use crate::primitives::{degenerate, distinct_sorted, extremes, linspace, state_minima_row};
use crate::RowBinning;

/// Outcome of fitting a Poisson mixture to one row of counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonFit {
    /// State assignment and per-state minimum boundaries.
    pub binning: RowBinning,
    /// Fitted rates in ascending order; empty for the degenerate case.
    pub rates: Vec<f64>,
    /// Minimiser report; `None` when no fit was necessary.
    pub minimum: Option<Minimum>,
}

/// Distinct counts with multiplicities and cached `ln Gamma(x + 1)`.
struct Counts {
    values: Vec<f64>,
    multiplicity: Vec<f64>,
    log_factorial: Vec<f64>,
}

impl Counts {
    fn new(values: &[f64]) -> Self {
        let distinct = distinct_sorted(values);
        let mut multiplicity = vec![0.0; distinct.len()];
        for value in values {
            let idx = distinct.partition_point(|d| d < value);
            multiplicity[idx] += 1.0;
        }
        let log_factorial = distinct.iter().map(|x| ln_gamma(x + 1.0)).collect();
        Self {
            values: distinct,
            multiplicity,
            log_factorial,
        }
    }

    fn negative_log_likelihood(&self, log_weights: &[f64], rates: &[f64]) -> f64 {
        if rates.iter().any(|rate| !rate.is_finite() || *rate <= 0.0) {
            return f64::INFINITY;
        }
        let log_rates: Vec<f64> = rates.iter().map(|rate| rate.ln()).collect();
        let mut terms = vec![0.0; rates.len()];
        let mut total = 0.0;
        for ((x, count), log_fact) in self
            .values
            .iter()
            .zip(&self.multiplicity)
            .zip(&self.log_factorial)
        {
            for (s, term) in terms.iter_mut().enumerate() {
                *term = log_weights[s] + x * log_rates[s] - rates[s] - log_fact;
            }
            let peak = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if peak == f64::NEG_INFINITY {
                return f64::INFINITY;
            }
            let sum: f64 = terms.iter().map(|t| (t - peak).exp()).sum();
            total += count * (peak + sum.ln());
        }
        -total
    }
}

/// Rate guesses evenly spaced strictly inside `[lo, hi]`.
fn initial_rates(lo: f64, hi: f64, states: usize) -> Vec<f64> {
    let grid = linspace(lo, hi, states + 2);
    grid[1..=states].to_vec()
}

/// Index of the state maximising `weight * Poisson(x; rate)`; first wins on ties.
fn most_likely_state(x: f64, log_weights: &[f64], rates: &[f64]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (s, (log_w, rate)) in log_weights.iter().zip(rates).enumerate() {
        let score = log_w + x * rate.ln() - rate;
        if score > best_score {
            best = s;
            best_score = score;
        }
    }
    best
}

/// Orders fitted states by the smallest value they captured and renumbers them `1..=k`.
fn relabel_by_value(values: &[f64], fitted: &[usize], states: usize) -> Vec<u32> {
    let mut minima = vec![f64::INFINITY; states];
    let mut seen = vec![false; states];
    for (&value, &state) in values.iter().zip(fitted) {
        minima[state] = minima[state].min(value);
        seen[state] = true;
    }
    let mut present: Vec<usize> = (0..states).filter(|&s| seen[s]).collect();
    present.sort_by(|&a, &b| minima[a].total_cmp(&minima[b]).then(a.cmp(&b)));
    let mut label = vec![0u32; states];
    for (rank, &s) in present.iter().enumerate() {
        label[s] = rank as u32 + 1;
    }
    fitted.iter().map(|&s| label[s]).collect()
}

/// Clusters counts into `states` Poisson components by maximum likelihood.
///
/// `weights` holds one mixing weight per state. Rates are fitted with
/// [`nelder_mead`] from guesses evenly spaced inside the observed range, then
/// each observation is assigned to its most likely weighted component. An
/// exhausted budget is reported through `converged`; only a solver failure is
/// an error.
pub fn poisson_mixture(
    values: &[f64],
    states: usize,
    weights: &[f64],
    opts: &MinimizerOpts,
) -> Result<PoissonFit, DiscError> {
    if let Some(binning) = degenerate(values, states) {
        return Ok(PoissonFit {
            binning,
            rates: Vec::new(),
            minimum: None,
        });
    }

    let counts = Counts::new(values);
    let log_weights: Vec<f64> = weights.iter().map(|w| w.ln()).collect();
    let (lo, hi) = extremes(values);
    let guess = initial_rates(lo, hi, states);
    let minimum = nelder_mead(
        |rates| counts.negative_log_likelihood(&log_weights, rates),
        &guess,
        opts,
    )?;

    let fitted: Vec<usize> = values
        .iter()
        .map(|&x| most_likely_state(x, &log_weights, &minimum.x))
        .collect();
    let state_labels = relabel_by_value(values, &fitted, states);
    let edges = state_minima_row(values, &state_labels, states);

    let mut rates = minimum.x.clone();
    rates.sort_by(|a, b| a.total_cmp(b));
    Ok(PoissonFit {
        binning: RowBinning {
            states: state_labels,
            edges,
            converged: minimum.converged,
        },
        rates,
        minimum: Some(minimum),
    })
}
