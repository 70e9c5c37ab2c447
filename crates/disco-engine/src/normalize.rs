use disco_core::errors::{DiscError, ErrorInfo};
use disco_core::{Raster, Tensor3, VarRef};

use crate::table::{MethodTable, Param};

fn shape_error(code: &str, message: impl Into<String>) -> DiscError {
    DiscError::InputShape(ErrorInfo::new(code, message))
}

/// Method row with its category resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    /// Position of the row in the input table.
    pub row: usize,
    /// Variable the row converts.
    pub target: VarRef,
    /// Method name as written in the table.
    pub method: String,
    /// Positional parameters as written in the table.
    pub params: Vec<Param>,
}

/// Raster and method table in canonical form.
#[derive(Debug, Clone)]
pub struct Normalized<'a> {
    /// Category tensors in index order.
    pub categories: &'a [Tensor3],
    /// Rows with an explicit category, in input order.
    pub rows: Vec<TargetRow>,
}

impl Normalized<'_> {
    /// Tensor holding `target`.
    pub fn tensor(&self, target: VarRef) -> &Tensor3 {
        &self.categories[target.category]
    }

    /// Returns true when `target` addresses an existing variable.
    pub fn contains(&self, target: VarRef) -> bool {
        self.categories
            .get(target.category)
            .is_some_and(|tensor| target.variable < tensor.variables())
    }
}

/// Canonicalises the raster into a category sequence and gives every row a category.
///
/// The category column may be omitted only when the raster holds exactly one
/// category, and it must be either present on every row or on none.
pub fn normalize<'a>(raster: &'a Raster, table: &MethodTable) -> Result<Normalized<'a>, DiscError> {
    let categories = raster.categories();
    if categories.is_empty() {
        return Err(shape_error("empty-raster", "raster holds no category"));
    }
    for (index, tensor) in categories.iter().enumerate() {
        tensor.check().map_err(|err| match err {
            DiscError::InputShape(info) => DiscError::InputShape(info.with_context("category", index)),
            other => other,
        })?;
    }

    let with_category = table.rows().iter().filter(|row| row.category.is_some()).count();
    if with_category != 0 && with_category != table.len() {
        return Err(DiscError::InputShape(
            ErrorInfo::new(
                "category-column-mixed",
                "the category column must be present on every row or on none",
            )
            .with_context("rows_with_category", with_category)
            .with_context("rows", table.len()),
        ));
    }
    if with_category == 0 && !table.is_empty() && categories.len() > 1 {
        return Err(DiscError::InputShape(
            ErrorInfo::new(
                "category-column-missing",
                "the category column may only be omitted for a single-category raster",
            )
            .with_context("categories", categories.len()),
        ));
    }

    let mut rows = Vec::with_capacity(table.len());
    for (row, entry) in table.rows().iter().enumerate() {
        let target = VarRef::new(entry.category.unwrap_or(0), entry.variable);
        let Some(tensor) = categories.get(target.category) else {
            return Err(DiscError::InputShape(
                ErrorInfo::new("category-range", "row names a category outside the raster")
                    .with_context("row", row)
                    .with_context("category", target.category)
                    .with_context("categories", categories.len()),
            ));
        };
        if target.variable >= tensor.variables() {
            return Err(DiscError::InputShape(
                ErrorInfo::new("variable-range", "row names a variable outside its category")
                    .with_context("row", row)
                    .with_context("target", target)
                    .with_context("variables", tensor.variables()),
            ));
        }
        rows.push(TargetRow {
            row,
            target,
            method: entry.method.clone(),
            params: entry.params.clone(),
        });
    }

    Ok(Normalized { categories, rows })
}
