//! Dense tensors and category rasters indexed `[variable, time bin, trial]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DiscError, ErrorInfo};

fn shape_error(code: &str, message: impl Into<String>) -> DiscError {
    DiscError::InputShape(ErrorInfo::new(code, message))
}

/// Dense row-major tensor with axes `[variable, time bin, trial]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor3 {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl Tensor3 {
    /// Creates a tensor from its shape and row-major data.
    pub fn new(shape: [usize; 3], data: Vec<f64>) -> Result<Self, DiscError> {
        let tensor = Self { shape, data };
        tensor.check()?;
        Ok(tensor)
    }

    /// Builds a tensor by evaluating `f(variable, time_bin, trial)` for every cell.
    pub fn from_fn<F>(shape: [usize; 3], mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(shape.iter().product());
        for variable in 0..shape[0] {
            for time_bin in 0..shape[1] {
                for trial in 0..shape[2] {
                    data.push(f(variable, time_bin, trial));
                }
            }
        }
        Self { shape, data }
    }

    /// Verifies that the data length agrees with the declared shape.
    ///
    /// Tensors decoded through serde bypass [`Tensor3::new`], so consumers call
    /// this before trusting the layout.
    pub fn check(&self) -> Result<(), DiscError> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(DiscError::InputShape(
                ErrorInfo::new("tensor-length", "tensor data length disagrees with its shape")
                    .with_context("expected", expected)
                    .with_context("actual", self.data.len()),
            ));
        }
        Ok(())
    }

    /// Returns the `[variables, time bins, trials]` shape.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of variables.
    pub fn variables(&self) -> usize {
        self.shape[0]
    }

    /// Number of time bins.
    pub fn time_bins(&self) -> usize {
        self.shape[1]
    }

    /// Number of trials.
    pub fn trials(&self) -> usize {
        self.shape[2]
    }

    /// Row-major backing storage.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    fn offset(&self, variable: usize, time_bin: usize, trial: usize) -> usize {
        (variable * self.shape[1] + time_bin) * self.shape[2] + trial
    }

    /// Returns a single cell.
    pub fn get(&self, variable: usize, time_bin: usize, trial: usize) -> f64 {
        self.data[self.offset(variable, time_bin, trial)]
    }

    /// Row-major `[time bin, trial]` values of one variable.
    pub fn variable_values(&self, variable: usize) -> &[f64] {
        let len = self.shape[1] * self.shape[2];
        let start = variable * len;
        &self.data[start..start + len]
    }

    /// Extracts the canonical sample matrix for a variable.
    ///
    /// Single-trial variables swap the time and trial axes so time becomes the
    /// sample axis of a single canonical row.
    pub fn canonical_slice(&self, variable: usize) -> (Slice2, SampleAxis) {
        let axis = SampleAxis::for_shape(self.shape);
        let values = self.variable_values(variable).to_vec();
        let slice = match axis {
            SampleAxis::Trials => Slice2::new(self.shape[1], self.shape[2], values),
            SampleAxis::SingleTrial => Slice2::new(1, self.shape[1], values),
        };
        (slice, axis)
    }

    /// Writes a canonical sample matrix back into the slot of `variable`.
    pub fn write_canonical(
        &mut self,
        variable: usize,
        axis: SampleAxis,
        slice: &Slice2,
    ) -> Result<(), DiscError> {
        let (rows, cols) = axis.canonical_dims(self.shape);
        if slice.rows() != rows || slice.cols() != cols {
            return Err(shape_error(
                "slice-shape",
                format!(
                    "canonical slice {}x{} does not fit variable {variable} ({rows}x{cols})",
                    slice.rows(),
                    slice.cols()
                ),
            ));
        }
        // Both modes share the same memory layout; only the view differs.
        for time_bin in 0..self.shape[1] {
            for trial in 0..self.shape[2] {
                let value = match axis {
                    SampleAxis::Trials => slice.get(time_bin, trial),
                    SampleAxis::SingleTrial => slice.get(0, time_bin),
                };
                let idx = self.offset(variable, time_bin, trial);
                self.data[idx] = value;
            }
        }
        Ok(())
    }
}

/// Orientation of the sample axis for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleAxis {
    /// Samples run across trials, one canonical row per time bin.
    Trials,
    /// Exactly one trial: samples run across time in a single canonical row.
    SingleTrial,
}

impl SampleAxis {
    /// Selects the axis mode from a tensor shape.
    pub fn for_shape(shape: [usize; 3]) -> Self {
        if shape[2] == 1 {
            SampleAxis::SingleTrial
        } else {
            SampleAxis::Trials
        }
    }

    /// Returns `(canonical rows, samples per row)` for a tensor shape.
    pub fn canonical_dims(self, shape: [usize; 3]) -> (usize, usize) {
        match self {
            SampleAxis::Trials => (shape[1], shape[2]),
            SampleAxis::SingleTrial => (1, shape[1]),
        }
    }
}

/// Row-major matrix of canonical rows by samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice2 {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Slice2 {
    /// Creates a slice; `data.len()` must equal `rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    /// Assembles a slice from equally sized rows.
    pub fn from_rows(rows: Vec<Vec<f64>>, cols: usize) -> Self {
        let count = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self::new(count, cols, data)
    }

    /// Number of canonical rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of samples per row.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns one cell.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Borrows a canonical row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
}

/// Address of a variable within a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarRef {
    /// Category index.
    pub category: usize,
    /// Variable index within the category.
    pub variable: usize,
}

impl VarRef {
    /// Creates a new variable address.
    pub fn new(category: usize, variable: usize) -> Self {
        Self { category, variable }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.category, self.variable)
    }
}

/// Either one bare tensor or an ordered collection of category tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Raster {
    /// A single tensor, treated as a one-category raster.
    Bare(Tensor3),
    /// Ordered category tensors addressed by index.
    Categories(Vec<Tensor3>),
}

impl Raster {
    /// Borrows the tensors in category order.
    pub fn categories(&self) -> &[Tensor3] {
        match self {
            Raster::Bare(tensor) => std::slice::from_ref(tensor),
            Raster::Categories(tensors) => tensors,
        }
    }

    /// Number of categories.
    pub fn num_categories(&self) -> usize {
        self.categories().len()
    }

    /// Returns true when the raster wraps a bare tensor.
    pub fn is_bare(&self) -> bool {
        matches!(self, Raster::Bare(_))
    }

    /// Rebuilds a raster of the same variant from category tensors.
    pub fn with_categories(&self, mut tensors: Vec<Tensor3>) -> Result<Raster, DiscError> {
        match self {
            Raster::Bare(_) => {
                if tensors.len() != 1 {
                    return Err(shape_error(
                        "bare-arity",
                        "a bare raster must be rebuilt from exactly one tensor",
                    ));
                }
                Ok(Raster::Bare(tensors.remove(0)))
            }
            Raster::Categories(_) => Ok(Raster::Categories(tensors)),
        }
    }

    /// Shapes of all category tensors in order.
    pub fn shapes(&self) -> Vec<[usize; 3]> {
        self.categories().iter().map(Tensor3::shape).collect()
    }
}

impl From<Tensor3> for Raster {
    fn from(tensor: Tensor3) -> Self {
        Raster::Bare(tensor)
    }
}

impl From<Vec<Tensor3>> for Raster {
    fn from(tensors: Vec<Tensor3>) -> Self {
        Raster::Categories(tensors)
    }
}
