use std::collections::BTreeSet;

use disco_binning::{
    equal_count, equal_width, max_mutual_info, poisson_mixture, Minimum, RowBinning,
};
use disco_core::errors::{DiscError, ErrorInfo};
use disco_core::{DiscretizationProvenance, Raster, Slice2, Tensor3, VarRef};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::{ConvergencePolicy, DiscretizeOpts};
use crate::encode::{encode, execution_order, EncodedMethod, MethodKind};
use crate::hash::stable_hash_string;
use crate::normalize::{normalize, Normalized};
use crate::report::{Discretization, MethodResult};
use crate::table::MethodTable;

/// Binning of one canonical row plus the minimiser report of a Poisson fit.
struct RowOutcome {
    binning: RowBinning,
    minimum: Option<Minimum>,
}

fn bin_row(
    kind: &MethodKind,
    values: &[f64],
    time_bin: usize,
    side: &[f64],
    opts: &DiscretizeOpts,
) -> Result<RowOutcome, DiscError> {
    let outcome = match kind {
        MethodKind::Identity => RowOutcome {
            binning: RowBinning {
                states: Vec::new(),
                edges: Vec::new(),
                converged: true,
            },
            minimum: None,
        },
        MethodKind::EqualWidth { bins } => RowOutcome {
            binning: equal_width(values, *bins),
            minimum: None,
        },
        MethodKind::EqualCount { bins } => RowOutcome {
            binning: equal_count(values, *bins),
            minimum: None,
        },
        MethodKind::MaxMutualInfo { bins, .. } => RowOutcome {
            binning: max_mutual_info(values, side, *bins),
            minimum: None,
        },
        MethodKind::PoissonMixture { states, weights } => {
            let weights = weights.for_time_bin(*states, time_bin);
            let fit = poisson_mixture(values, *states, &weights, &opts.minimizer)?;
            RowOutcome {
                binning: fit.binning,
                minimum: fit.minimum,
            }
        }
    };
    Ok(outcome)
}

/// States of the reference slice row feeding a max-mutual-information target.
fn side_vector(
    output: &[Tensor3],
    resolved: &BTreeSet<VarRef>,
    method: &EncodedMethod,
) -> Result<Vec<f64>, DiscError> {
    let MethodKind::MaxMutualInfo {
        reference,
        ref_time_bin,
        ..
    } = &method.kind
    else {
        return Ok(Vec::new());
    };
    if !resolved.contains(reference) {
        return Err(DiscError::Dependency(
            ErrorInfo::new("reference-unresolved", "reference read before it was discretized")
                .with_context("row", method.row)
                .with_context("target", method.target)
                .with_context("reference", reference),
        ));
    }
    let (slice, _) = output[reference.category].canonical_slice(reference.variable);
    Ok(slice.row(*ref_time_bin).to_vec())
}

fn check_convergence(
    method: &EncodedMethod,
    outcomes: &[RowOutcome],
    opts: &DiscretizeOpts,
) -> Result<bool, DiscError> {
    let mut converged = true;
    for (time_bin, outcome) in outcomes.iter().enumerate() {
        let Some(minimum) = outcome.minimum.as_ref().filter(|m| !m.converged) else {
            continue;
        };
        converged = false;
        match opts.on_non_convergence {
            ConvergencePolicy::Fail => {
                return Err(DiscError::Convergence(
                    ErrorInfo::new("nelder-mead-budget", "poisson-mixture fit exhausted its budget")
                        .with_context("row", method.row)
                        .with_context("target", method.target)
                        .with_context("time_bin", time_bin)
                        .with_context("iterations", minimum.iterations)
                        .with_context("evaluations", minimum.evaluations)
                        .with_hint("raise max_iters_per_param or set on_non_convergence to keep"),
                ))
            }
            ConvergencePolicy::Keep => warn!(
                row = method.row,
                variable = %method.target,
                time_bin,
                iterations = minimum.iterations,
                evaluations = minimum.evaluations,
                "keeping unconverged poisson-mixture fit"
            ),
        }
    }
    Ok(converged)
}

fn run_method(
    method: &EncodedMethod,
    normalized: &Normalized<'_>,
    output: &mut [Tensor3],
    resolved: &BTreeSet<VarRef>,
    pool: &rayon::ThreadPool,
    opts: &DiscretizeOpts,
) -> Result<MethodResult, DiscError> {
    let target = method.target;
    let (slice, axis) = normalized.tensor(target).canonical_slice(target.variable);
    let side = side_vector(output, resolved, method)?;
    debug!(
        method = method.kind.name(),
        variable = %target,
        axis = ?axis,
        rows = slice.rows(),
        samples = slice.cols(),
        "discretizing variable"
    );

    let outcomes: Vec<RowOutcome> = pool.install(|| {
        (0..slice.rows())
            .into_par_iter()
            .map(|time_bin| bin_row(&method.kind, slice.row(time_bin), time_bin, &side, opts))
            .collect::<Result<_, _>>()
    })?;
    let converged = check_convergence(method, &outcomes, opts)?;

    let states = Slice2::from_rows(
        outcomes
            .iter()
            .map(|outcome| outcome.binning.states.iter().map(|&s| f64::from(s)).collect())
            .collect(),
        slice.cols(),
    );
    output[target.category].write_canonical(target.variable, axis, &states)?;

    Ok(MethodResult {
        row: method.row,
        target,
        method: method.kind.clone(),
        axis: Some(axis),
        edges: outcomes.into_iter().map(|outcome| outcome.binning.edges).collect(),
        converged,
    })
}

fn identity_result(method: &EncodedMethod) -> MethodResult {
    MethodResult {
        row: method.row,
        target: method.target,
        method: MethodKind::Identity,
        axis: None,
        edges: Vec::new(),
        converged: true,
    }
}

fn provenance(
    raster: &Raster,
    encoded: &[EncodedMethod],
    opts: &DiscretizeOpts,
    states: &Raster,
) -> Result<DiscretizationProvenance, DiscError> {
    let mut assignments: Vec<(VarRef, &MethodKind)> =
        encoded.iter().map(|m| (m.target, &m.kind)).collect();
    assignments.sort_by_key(|(target, _)| *target);
    Ok(DiscretizationProvenance {
        schema_version: Default::default(),
        input_hash: stable_hash_string(raster)?,
        table_hash: stable_hash_string(&assignments)?,
        opts_hash: stable_hash_string(opts)?,
        states_hash: stable_hash_string(states)?,
    })
}

/// Converts every variable named in `table` into integer states.
///
/// The table is validated in full before any slice is touched; any error
/// returns without output. Rows then run in dependency order: identity,
/// equal-width, equal-count and poisson-mixture variables first, then
/// max-mutual-information variables reading their already-resolved
/// references. Variables absent from the table are copied verbatim.
pub fn discretize(
    raster: &Raster,
    table: &MethodTable,
    opts: &DiscretizeOpts,
) -> Result<Discretization, DiscError> {
    let normalized = normalize(raster, table)?;
    let encoded = encode(&normalized, opts)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.concurrency.max(1))
        .build()
        .map_err(|err| {
            DiscError::InvalidParameter(
                ErrorInfo::new("thread-pool", err.to_string())
                    .with_context("concurrency", opts.concurrency),
            )
        })?;

    let mut output: Vec<Tensor3> = normalized.categories.to_vec();
    let mut resolved: BTreeSet<VarRef> = BTreeSet::new();
    let mut results: Vec<Option<MethodResult>> = vec![None; encoded.len()];
    for idx in execution_order(&encoded) {
        let method = &encoded[idx];
        let result = match method.kind {
            MethodKind::Identity => identity_result(method),
            _ => run_method(method, &normalized, &mut output, &resolved, &pool, opts)?,
        };
        resolved.insert(method.target);
        results[idx] = Some(result);
    }

    let states = raster.with_categories(output)?;
    let provenance = provenance(raster, &encoded, opts, &states)?;
    debug!(
        rows = encoded.len(),
        states_hash = %provenance.states_hash,
        "discretization finished"
    );
    Ok(Discretization {
        states,
        results: results.into_iter().flatten().collect(),
        provenance,
    })
}
