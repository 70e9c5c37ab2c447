use crate::RowBinning;

/// Sorted distinct values of `values`.
pub fn distinct_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup_by(|a, b| a == b);
    sorted
}

/// Fractional 1-based ranks; tied values share the average of their rank range.
pub fn tie_aware_rank(values: &[f64]) -> Vec<f64> {
    let mut pairs: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
    let mut ranks = vec![0.0; values.len()];
    let mut idx = 0;
    while idx < pairs.len() {
        let start = idx;
        let value = pairs[idx].1;
        while idx < pairs.len() && pairs[idx].1 == value {
            idx += 1;
        }
        let rank_value = (start + idx - 1) as f64 / 2.0 + 1.0;
        for &(original_idx, _) in &pairs[start..idx] {
            ranks[original_idx] = rank_value;
        }
    }
    ranks
}

/// Zero-based bin index of each value under half-open `(edge[i], edge[i + 1]]` bins.
///
/// Values at or below the first edge land in bin 0 and values above the last
/// edge land in the last bin, so outer edges of `-inf`/`+inf` never leave a
/// value unbinned.
pub fn bin_by_edges(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let last = edges.len().saturating_sub(2);
    values
        .iter()
        .map(|value| {
            let below = edges.partition_point(|edge| edge < value);
            below.saturating_sub(1).min(last)
        })
        .collect()
}

/// Renumbers arbitrary labels to `1..=k` preserving label order.
pub fn relabel_contiguous(labels: &[usize]) -> Vec<u32> {
    let mut present: Vec<usize> = labels.to_vec();
    present.sort_unstable();
    present.dedup();
    labels
        .iter()
        .map(|label| present.partition_point(|p| p < label) as u32 + 1)
        .collect()
}

/// `points` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![end],
        _ => {
            let step = (end - start) / (points - 1) as f64;
            let mut out: Vec<f64> = (0..points).map(|idx| start + idx as f64 * step).collect();
            out[points - 1] = end;
            out
        }
    }
}

/// Row of `len` unset cells.
pub(crate) fn unset_row(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Minimum and maximum of a non-empty sample.
pub(crate) fn extremes(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Shared fallback when the row holds no more distinct values than requested bins.
///
/// Each value maps to its rank among the distinct values; the edge row lists
/// the distinct values themselves.
pub(crate) fn degenerate(values: &[f64], bins: usize) -> Option<RowBinning> {
    let distinct = distinct_sorted(values);
    if distinct.len() > bins {
        return None;
    }
    let states = values
        .iter()
        .map(|value| distinct.partition_point(|d| d < value) as u32 + 1)
        .collect();
    let mut edges = unset_row(bins + 1);
    edges[..distinct.len()].copy_from_slice(&distinct);
    Some(RowBinning::exact(states, edges))
}

/// Boundary row: `-inf`, the minimum value of states `2..=bins`, `+inf`.
///
/// `states` must already be contiguous and ordered by value.
pub(crate) fn state_minima_row(values: &[f64], states: &[u32], bins: usize) -> Vec<f64> {
    let mut row = unset_row(bins + 1);
    row[0] = f64::NEG_INFINITY;
    row[bins] = f64::INFINITY;
    for (&value, &state) in values.iter().zip(states) {
        let slot = state as usize - 1;
        if slot == 0 || slot >= bins {
            continue;
        }
        if row[slot].is_nan() || value < row[slot] {
            row[slot] = value;
        }
    }
    row
}
