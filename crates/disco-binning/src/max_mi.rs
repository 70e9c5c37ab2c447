use itertools::Itertools;

use crate::info::{index_labels, mutual_information, ContingencyTable};
use crate::primitives::{bin_by_edges, distinct_sorted, relabel_contiguous, unset_row};
use crate::RowBinning;

/// Largest bin count accepted by [`max_mutual_info`].
///
/// The search visits `C(k, bins - 1)` partitions for `k` distinct values,
/// which stays tractable for realistic sample sizes only up to three bins.
pub const MAX_MI_BINS: usize = 3;

fn padded(edges: &[f64], bins: usize) -> Vec<f64> {
    let mut row = unset_row(bins + 1);
    row[..edges.len()].copy_from_slice(edges);
    row
}

/// Chooses the split points that maximise mutual information with `side`.
///
/// Every `bins - 1` combination of the distinct sorted values is a candidate,
/// visited in ascending lexicographic index order; the first partition
/// reaching the maximum wins. With fewer distinct values than splits every
/// distinct value becomes a split. `side` holds the already-resolved states of
/// the reference variable and must be as long as `values`.
pub fn max_mutual_info(values: &[f64], side: &[f64], bins: usize) -> RowBinning {
    debug_assert_eq!(values.len(), side.len());
    let distinct = distinct_sorted(values);
    if distinct.len() <= 1 {
        let edges = [f64::NEG_INFINITY, f64::INFINITY];
        return RowBinning::exact(vec![1; values.len()], padded(&edges, bins));
    }

    let splits = bins.saturating_sub(1).min(distinct.len());
    let side_labels = index_labels(side);

    let mut best_mi = f64::NEG_INFINITY;
    let mut best: Option<(Vec<f64>, Vec<usize>)> = None;
    for combo in (0..distinct.len()).combinations(splits) {
        let mut edges = Vec::with_capacity(splits + 2);
        edges.push(f64::NEG_INFINITY);
        edges.extend(combo.iter().map(|&idx| distinct[idx]));
        edges.push(f64::INFINITY);
        let labels = bin_by_edges(values, &edges);
        let mi = mutual_information(&ContingencyTable::from_labels(&labels, &side_labels));
        if mi > best_mi {
            best_mi = mi;
            best = Some((edges, labels));
        }
    }

    match best {
        Some((edges, labels)) => RowBinning::exact(relabel_contiguous(&labels), padded(&edges, bins)),
        None => {
            let edges = [f64::NEG_INFINITY, f64::INFINITY];
            RowBinning::exact(vec![1; values.len()], padded(&edges, bins))
        }
    }
}
