use crate::primitives::{degenerate, relabel_contiguous, state_minima_row, tie_aware_rank};
use crate::RowBinning;

fn count_distinct(labels: &[usize]) -> usize {
    let mut seen = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Bins values into `bins` groups of (approximately) equal occupancy.
///
/// Bins are `ceil(levels * rank / n)` over tie-aware ranks. Ties can merge bins,
/// in which case `levels` is raised until `bins` groups appear; an overshoot
/// backs off one level, so the result never has more than `bins` states.
pub fn equal_count(values: &[f64], bins: usize) -> RowBinning {
    if let Some(binning) = degenerate(values, bins) {
        return binning;
    }
    let ranks = tie_aware_rank(values);
    let total = values.len() as f64;
    let assign = |levels: usize| -> Vec<usize> {
        ranks
            .iter()
            .map(|rank| (levels as f64 * rank / total).ceil() as usize)
            .collect()
    };

    // Ranks differ by at least one half, so this many levels separates every
    // distinct value.
    let ceiling = 2 * values.len() + bins;
    let mut levels = bins;
    let mut labels = assign(levels);
    while count_distinct(&labels) < bins && levels < ceiling {
        levels += 1;
        labels = assign(levels);
    }
    if count_distinct(&labels) > bins {
        levels -= 1;
        labels = assign(levels);
    }

    let states = relabel_contiguous(&labels);
    let edges = state_minima_row(values, &states, bins);
    RowBinning::exact(states, edges)
}
