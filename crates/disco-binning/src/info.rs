use serde::{Deserialize, Serialize};

use crate::primitives::distinct_sorted;

/// Joint occurrence counts of two discrete labelings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    rows: usize,
    cols: usize,
    counts: Vec<u64>,
}

impl ContingencyTable {
    /// Creates an empty `rows x cols` table.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            counts: vec![0; rows * cols],
        }
    }

    /// Cross-tabulates two zero-based labelings of equal length.
    pub fn from_labels(a: &[usize], b: &[usize]) -> Self {
        let rows = a.iter().copied().max().map_or(0, |m| m + 1);
        let cols = b.iter().copied().max().map_or(0, |m| m + 1);
        let mut table = Self::zeros(rows, cols);
        for (&i, &j) in a.iter().zip(b) {
            table.increment(i, j);
        }
        table
    }

    /// Adds one observation to cell `(row, col)`.
    pub fn increment(&mut self, row: usize, col: usize) {
        self.counts[row * self.cols + col] += 1;
    }

    /// Count in cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.counts[row * self.cols + col]
    }

    /// Table dimensions as `(rows, cols)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of observations.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Maps arbitrary discrete values to zero-based labels in ascending value order.
pub fn index_labels(values: &[f64]) -> Vec<usize> {
    let distinct = distinct_sorted(values);
    values
        .iter()
        .map(|value| distinct.partition_point(|d| d < value))
        .collect()
}

/// Mutual information in bits of the empirical joint distribution of `table`.
pub fn mutual_information(table: &ContingencyTable) -> f64 {
    let total = table.total();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    let (rows, cols) = table.dims();
    let mut row_sums = vec![0u64; rows];
    let mut col_sums = vec![0u64; cols];
    for i in 0..rows {
        for j in 0..cols {
            let count = table.get(i, j);
            row_sums[i] += count;
            col_sums[j] += count;
        }
    }
    let mut mi = 0.0;
    for i in 0..rows {
        for j in 0..cols {
            let count = table.get(i, j);
            if count == 0 {
                continue;
            }
            let joint = count as f64 / n;
            let expected = (row_sums[i] as f64 / n) * (col_sums[j] as f64 / n);
            mi += joint * (joint / expected).log2();
        }
    }
    mi.max(0.0)
}
