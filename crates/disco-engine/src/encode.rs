use std::collections::BTreeMap;

use disco_binning::MAX_MI_BINS;
use disco_core::errors::{DiscError, ErrorInfo};
use disco_core::{SampleAxis, VarRef};
use serde::{Deserialize, Serialize};

use crate::config::DiscretizeOpts;
use crate::normalize::{Normalized, TargetRow};

/// Mixing weights of a Poisson mixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum MixtureWeights {
    /// Every state weighs `1 / states`.
    Uniform,
    /// One row per canonical time bin, or a single row shared by all of them.
    Manual {
        /// Probability rows, each with one entry per state.
        rows: Vec<Vec<f64>>,
    },
}

impl MixtureWeights {
    /// Weights applied to canonical row `time_bin`.
    pub fn for_time_bin(&self, states: usize, time_bin: usize) -> Vec<f64> {
        match self {
            MixtureWeights::Uniform => vec![1.0 / states as f64; states],
            MixtureWeights::Manual { rows } if rows.len() == 1 => rows[0].clone(),
            MixtureWeights::Manual { rows } => rows[time_bin].clone(),
        }
    }
}

/// Typed method assignment of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MethodKind {
    /// Values are already discrete and pass through unchanged.
    Identity,
    /// Equally wide intervals over the observed range.
    EqualWidth {
        /// Requested bin count.
        bins: usize,
    },
    /// Intervals of equal occupancy.
    EqualCount {
        /// Requested bin count.
        bins: usize,
    },
    /// Splits maximising mutual information with a resolved reference variable.
    MaxMutualInfo {
        /// Variable whose states form the side vector.
        reference: VarRef,
        /// Canonical time bin of the reference supplying the side vector.
        ref_time_bin: usize,
        /// Requested bin count, at most [`MAX_MI_BINS`].
        bins: usize,
    },
    /// Maximum-likelihood Poisson mixture clustering.
    PoissonMixture {
        /// Requested state count.
        states: usize,
        /// Mixing weights.
        weights: MixtureWeights,
    },
}

impl MethodKind {
    /// Execution rank; every kind a max-mutual-information row may reference ranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            MethodKind::Identity => 0,
            MethodKind::EqualWidth { .. } => 1,
            MethodKind::EqualCount { .. } => 2,
            MethodKind::PoissonMixture { .. } => 3,
            MethodKind::MaxMutualInfo { .. } => 4,
        }
    }

    /// Canonical method name.
    pub fn name(&self) -> &'static str {
        match self {
            MethodKind::Identity => "identity",
            MethodKind::EqualWidth { .. } => "equal-width",
            MethodKind::EqualCount { .. } => "equal-count",
            MethodKind::MaxMutualInfo { .. } => "max-mutual-information",
            MethodKind::PoissonMixture { .. } => "poisson-mixture",
        }
    }

    /// Requested bin or state count; `None` for identity.
    pub fn bins(&self) -> Option<usize> {
        match self {
            MethodKind::Identity => None,
            MethodKind::EqualWidth { bins }
            | MethodKind::EqualCount { bins }
            | MethodKind::MaxMutualInfo { bins, .. } => Some(*bins),
            MethodKind::PoissonMixture { states, .. } => Some(*states),
        }
    }
}

/// Validated method record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedMethod {
    /// Position of the source row in the input table.
    pub row: usize,
    /// Variable this record converts.
    pub target: VarRef,
    /// Typed method and payload.
    pub kind: MethodKind,
}

#[derive(Clone, Copy)]
enum MethodName {
    Identity,
    EqualWidth,
    EqualCount,
    MaxMutualInfo,
    PoissonMixture,
}

impl MethodName {
    fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "identity" => Some(MethodName::Identity),
            "equalwidth" => Some(MethodName::EqualWidth),
            "equalcount" => Some(MethodName::EqualCount),
            "maxmutualinformation" | "maxmutualinfo" => Some(MethodName::MaxMutualInfo),
            "poissonmixture" => Some(MethodName::PoissonMixture),
            _ => None,
        }
    }
}

fn row_info(row: &TargetRow, code: &str, message: impl Into<String>) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("row", row.row)
        .with_context("target", row.target)
        .with_context("method", &row.method)
}

fn param_error(row: &TargetRow, message: impl Into<String>) -> DiscError {
    DiscError::InvalidParameter(row_info(row, "params", message))
}

fn expect_arity(row: &TargetRow, allowed: &[usize]) -> Result<(), DiscError> {
    if allowed.contains(&row.params.len()) {
        Ok(())
    } else {
        Err(DiscError::InvalidParameter(
            row_info(row, "param-count", "unexpected number of parameters")
                .with_context("expected", format!("{allowed:?}"))
                .with_context("actual", row.params.len()),
        ))
    }
}

fn count_param(row: &TargetRow, idx: usize, what: &str) -> Result<usize, DiscError> {
    row.params[idx]
        .as_count()
        .ok_or_else(|| param_error(row, format!("{what} must be a non-negative integer")))
}

fn positive_param(row: &TargetRow, idx: usize, what: &str) -> Result<usize, DiscError> {
    match count_param(row, idx, what)? {
        0 => Err(param_error(row, format!("{what} must be at least 1"))),
        value => Ok(value),
    }
}

fn canonical_rows(normalized: &Normalized<'_>, target: VarRef) -> (usize, usize) {
    let shape = normalized.tensor(target).shape();
    SampleAxis::for_shape(shape).canonical_dims(shape)
}

fn encode_weights(
    row: &TargetRow,
    normalized: &Normalized<'_>,
    states: usize,
    opts: &DiscretizeOpts,
) -> Result<MixtureWeights, DiscError> {
    let mode = match row.params.get(1) {
        None => "uniform",
        Some(param) => param
            .as_text()
            .ok_or_else(|| param_error(row, "probability mode must be `uniform` or `manual`"))?,
    };
    match mode {
        "uniform" => {
            expect_arity(row, &[1, 2])?;
            Ok(MixtureWeights::Uniform)
        }
        "manual" => {
            expect_arity(row, &[3])?;
            let rows = row.params[2]
                .as_rows()
                .ok_or_else(|| param_error(row, "manual probabilities must be numeric rows"))?;
            let (time_bins, _) = canonical_rows(normalized, row.target);
            if rows.len() != 1 && rows.len() != time_bins {
                return Err(DiscError::ProbabilityMismatch(
                    row_info(row, "probability-rows", "expected one probability row or one per time bin")
                        .with_context("rows", rows.len())
                        .with_context("time_bins", time_bins),
                ));
            }
            for (idx, probabilities) in rows.iter().enumerate() {
                if probabilities.len() != states {
                    return Err(DiscError::ProbabilityMismatch(
                        row_info(row, "probability-count", "probability count differs from state count")
                            .with_context("probability_row", idx)
                            .with_context("probabilities", probabilities.len())
                            .with_context("states", states),
                    ));
                }
                if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
                    return Err(DiscError::ProbabilityNormalization(
                        row_info(row, "probability-range", "probabilities must be finite and non-negative")
                            .with_context("probability_row", idx),
                    ));
                }
                let sum = probabilities.iter().fold(0.0, |acc, p| acc + p);
                if (sum - 1.0).abs() > opts.probability_tolerance {
                    return Err(DiscError::ProbabilityNormalization(
                        row_info(row, "probability-sum", "probability row does not sum to one")
                            .with_context("probability_row", idx)
                            .with_context("sum", sum)
                            .with_context("tolerance", opts.probability_tolerance),
                    ));
                }
            }
            Ok(MixtureWeights::Manual { rows })
        }
        other => Err(param_error(
            row,
            format!("unknown probability mode `{other}`, expected `uniform` or `manual`"),
        )),
    }
}

fn encode_row(
    row: &TargetRow,
    normalized: &Normalized<'_>,
    opts: &DiscretizeOpts,
) -> Result<MethodKind, DiscError> {
    let name = MethodName::parse(&row.method).ok_or_else(|| {
        DiscError::InvalidMethod(row_info(row, "unknown-method", "unrecognised method name").with_hint(
            "expected identity, equal-width, equal-count, max-mutual-information or poisson-mixture",
        ))
    })?;
    match name {
        MethodName::Identity => {
            expect_arity(row, &[0])?;
            Ok(MethodKind::Identity)
        }
        MethodName::EqualWidth => {
            expect_arity(row, &[1])?;
            Ok(MethodKind::EqualWidth {
                bins: positive_param(row, 0, "bins")?,
            })
        }
        MethodName::EqualCount => {
            expect_arity(row, &[1])?;
            Ok(MethodKind::EqualCount {
                bins: positive_param(row, 0, "bins")?,
            })
        }
        MethodName::MaxMutualInfo => {
            expect_arity(row, &[4])?;
            let reference = VarRef::new(
                count_param(row, 0, "reference category")?,
                count_param(row, 1, "reference variable")?,
            );
            let ref_time_bin = count_param(row, 2, "reference time bin")?;
            let bins = positive_param(row, 3, "bins")?;
            if bins > MAX_MI_BINS {
                return Err(DiscError::BinCountExceeded(
                    row_info(row, "mi-bins", "max-mutual-information supports at most 3 bins")
                        .with_context("bins", bins)
                        .with_hint("the split search is exhaustive over C(values, bins - 1)"),
                ));
            }
            Ok(MethodKind::MaxMutualInfo {
                reference,
                ref_time_bin,
                bins,
            })
        }
        MethodName::PoissonMixture => {
            if row.params.is_empty() {
                return Err(param_error(row, "poisson-mixture needs a state count"));
            }
            let states = positive_param(row, 0, "states")?;
            let weights = encode_weights(row, normalized, states, opts)?;
            Ok(MethodKind::PoissonMixture { states, weights })
        }
    }
}

fn check_reference(
    method: &EncodedMethod,
    assigned: &BTreeMap<VarRef, &MethodKind>,
    normalized: &Normalized<'_>,
) -> Result<(), DiscError> {
    let MethodKind::MaxMutualInfo {
        reference,
        ref_time_bin,
        ..
    } = &method.kind
    else {
        return Ok(());
    };
    let dependency = |code: &str, message: &str| {
        DiscError::Dependency(
            ErrorInfo::new(code, message)
                .with_context("row", method.row)
                .with_context("target", method.target)
                .with_context("reference", reference),
        )
    };
    if *reference == method.target {
        return Err(dependency("reference-self", "a variable cannot reference itself"));
    }
    if !normalized.contains(*reference) {
        return Err(dependency("reference-range", "reference lies outside the raster"));
    }
    match assigned.get(reference) {
        None => {
            return Err(dependency(
                "reference-unassigned",
                "reference has no method in the table",
            ))
        }
        Some(MethodKind::PoissonMixture { .. }) => {
            return Err(dependency(
                "reference-kind",
                "a poisson-mixture variable cannot serve as a reference",
            ))
        }
        Some(MethodKind::MaxMutualInfo { .. }) => {
            return Err(dependency(
                "reference-kind",
                "a max-mutual-information variable is not resolved before other max-mutual-information rows",
            ))
        }
        Some(_) => {}
    }
    let (ref_rows, ref_samples) = canonical_rows(normalized, *reference);
    if *ref_time_bin >= ref_rows {
        return Err(DiscError::Dependency(
            ErrorInfo::new("reference-time-bin", "reference time bin does not exist")
                .with_context("row", method.row)
                .with_context("ref_time_bin", ref_time_bin)
                .with_context("time_bins", ref_rows),
        ));
    }
    let (_, samples) = canonical_rows(normalized, method.target);
    if samples != ref_samples {
        return Err(DiscError::Dependency(
            ErrorInfo::new("reference-samples", "reference and target differ in sample count")
                .with_context("row", method.row)
                .with_context("samples", samples)
                .with_context("reference_samples", ref_samples),
        ));
    }
    Ok(())
}

fn check_values(method: &EncodedMethod, normalized: &Normalized<'_>) -> Result<(), DiscError> {
    let mut slots = vec![method.target];
    if let MethodKind::MaxMutualInfo { reference, .. } = &method.kind {
        slots.push(*reference);
    }
    for slot in slots {
        let values = normalized.tensor(slot).variable_values(slot.variable);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DiscError::InvalidData(
                ErrorInfo::new("non-finite", "slice to be binned holds non-finite values")
                    .with_context("row", method.row)
                    .with_context("variable", slot),
            ));
        }
    }
    if let MethodKind::PoissonMixture { .. } = method.kind {
        let values = normalized.tensor(method.target).variable_values(method.target.variable);
        if values.iter().any(|v| *v < 0.0) {
            return Err(DiscError::InvalidData(
                ErrorInfo::new("negative-count", "poisson-mixture needs non-negative counts")
                    .with_context("row", method.row)
                    .with_context("variable", method.target),
            ));
        }
    }
    Ok(())
}

/// Types every row and validates the table as a whole.
///
/// All checks run before anything is transformed: uniqueness of targets,
/// method names and payloads, max-mutual-information references, manual
/// probabilities and the raw values of every slice that will be binned.
/// Records are returned in input row order.
pub fn encode(
    normalized: &Normalized<'_>,
    opts: &DiscretizeOpts,
) -> Result<Vec<EncodedMethod>, DiscError> {
    let mut owners: BTreeMap<VarRef, usize> = BTreeMap::new();
    for row in &normalized.rows {
        if let Some(first) = owners.insert(row.target, row.row) {
            return Err(DiscError::DuplicateAssignment(
                row_info(row, "duplicate-target", "variable is assigned more than one method")
                    .with_context("first_row", first),
            ));
        }
    }

    let encoded = normalized
        .rows
        .iter()
        .map(|row| {
            Ok(EncodedMethod {
                row: row.row,
                target: row.target,
                kind: encode_row(row, normalized, opts)?,
            })
        })
        .collect::<Result<Vec<_>, DiscError>>()?;

    let assigned: BTreeMap<VarRef, &MethodKind> = encoded
        .iter()
        .map(|method| (method.target, &method.kind))
        .collect();
    for method in &encoded {
        check_reference(method, &assigned, normalized)?;
    }
    for method in encoded.iter().filter(|m| m.kind != MethodKind::Identity) {
        check_values(method, normalized)?;
    }
    Ok(encoded)
}

/// Indices of `encoded` in execution order.
///
/// Identity, equal-width, equal-count and poisson-mixture rows all run before
/// any max-mutual-information row; ties are broken by target so the order
/// does not depend on table row order.
pub fn execution_order(encoded: &[EncodedMethod]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..encoded.len()).collect();
    order.sort_by_key(|&idx| (encoded[idx].kind.rank(), encoded[idx].target));
    order
}
