use crate::primitives::{bin_by_edges, degenerate, extremes, linspace, relabel_contiguous};
use crate::RowBinning;

/// Splits the observed range into `bins` equally wide half-open intervals.
///
/// The outer edges are widened to `-inf`/`+inf` after spacing so every value is
/// captured. Empty intervals are skipped when states are numbered.
pub fn equal_width(values: &[f64], bins: usize) -> RowBinning {
    if let Some(binning) = degenerate(values, bins) {
        return binning;
    }
    let (lo, hi) = extremes(values);
    let mut edges = linspace(lo, hi, bins + 1);
    edges[0] = f64::NEG_INFINITY;
    edges[bins] = f64::INFINITY;
    let labels = bin_by_edges(values, &edges);
    RowBinning::exact(relabel_contiguous(&labels), edges)
}
