use disco_engine::{
    discretize, ConvergencePolicy, DiscError, Discretization, DiscretizeOpts, MethodKind,
    MethodRow, MethodTable, MinimizerOpts, Raster, SampleAxis, Tensor3, VarRef,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

fn edge_bits(out: &Discretization, target: VarRef) -> Vec<Vec<u64>> {
    out.result_for(target)
        .map(|result| result.edges.iter().map(|row| bits(row)).collect())
        .unwrap_or_default()
}

fn state_bits(raster: &Raster) -> Vec<Vec<u64>> {
    raster.categories().iter().map(|t| bits(t.data())).collect()
}

fn mi(variable: usize, reference: (usize, usize), time_bin: usize, bins: usize) -> MethodRow {
    MethodRow::new(
        variable,
        "max-mutual-information",
        vec![reference.0.into(), reference.1.into(), time_bin.into(), bins.into()],
    )
}

fn poisson_counts(seed: u64, rate: f64, count: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Poisson::new(rate).unwrap();
    (0..count).map(|_| dist.sample(&mut rng)).collect()
}

fn two_clusters(seed: u64) -> Vec<f64> {
    let mut values = poisson_counts(2 * seed, 2.0, 500);
    values.extend(poisson_counts(2 * seed + 1, 50.0, 500));
    values
}

#[test]
fn identity_and_uncovered_slices_are_bitwise_copies() {
    let special = [f64::NAN, -0.0, f64::INFINITY, 1e-300];
    let tensor = Tensor3::from_fn([3, 2, 4], |v, t, k| match v {
        0 => (t * 4 + k) as f64,
        _ => special[(t + k) % special.len()],
    });
    let table = MethodTable::new(vec![
        MethodRow::new(1, "identity", vec![]),
        MethodRow::new(0, "equal-width", vec![2.into()]),
    ]);
    let out = discretize(&tensor.clone().into(), &table, &DiscretizeOpts::default()).unwrap();
    let states = &out.states.categories()[0];
    for variable in [1, 2] {
        assert_eq!(
            bits(states.variable_values(variable)),
            bits(tensor.variable_values(variable))
        );
    }
    let identity = out.result_for(VarRef::new(0, 1)).unwrap();
    assert!(identity.edges.is_empty());
    assert_eq!(identity.axis, None);
}

#[test]
fn equal_width_worked_example() {
    let tensor = Tensor3::new([1, 1, 6], vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
    let table = MethodTable::new(vec![MethodRow::new(0, "equal-width", vec![2.into()])]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    assert!(matches!(out.states, Raster::Bare(_)));
    assert_eq!(
        out.states.categories()[0].data(),
        &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
    );
    let result = &out.results[0];
    assert_eq!(result.axis, Some(SampleAxis::Trials));
    assert_eq!(result.edges, vec![vec![f64::NEG_INFINITY, 5.0, f64::INFINITY]]);
    assert!(result.converged);
}

#[test]
fn single_trial_bins_across_time() {
    let tensor = Tensor3::new([1, 6, 1], vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
    let table = MethodTable::new(vec![MethodRow::new(0, "equal-count", vec![3.into()])]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    assert_eq!(out.states.shapes(), vec![[1, 6, 1]]);
    assert_eq!(
        out.states.categories()[0].data(),
        &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]
    );
    let result = &out.results[0];
    assert_eq!(result.axis, Some(SampleAxis::SingleTrial));
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].len(), 4);
}

#[test]
fn each_time_bin_is_binned_on_its_own() {
    // Time bin 1 is time bin 0 scaled by 100, so both get the same states.
    let tensor = Tensor3::from_fn([1, 2, 6], |_, t, k| k as f64 * if t == 0 { 1.0 } else { 100.0 });
    let table = MethodTable::new(vec![MethodRow::new(0, "equal-width", vec![3.into()])]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    let data = out.states.categories()[0].data();
    assert_eq!(data[..6], data[6..]);
    let edges = &out.results[0].edges;
    assert_eq!(edges.len(), 2);
    assert!((edges[1][1] - 100.0 * edges[0][1]).abs() < 1e-9);
}

#[test]
fn categories_keep_their_variant_and_shapes() {
    let raster = Raster::Categories(vec![
        Tensor3::from_fn([2, 3, 4], |v, t, k| (v + t * k) as f64),
        Tensor3::from_fn([1, 5, 1], |_, t, _| (t % 3) as f64),
    ]);
    let table = MethodTable::new(vec![
        MethodRow::new(1, "equal-count", vec![2.into()]).in_category(0),
        MethodRow::new(0, "equal-width", vec![2.into()]).in_category(1),
    ]);
    let out = discretize(&raster, &table, &DiscretizeOpts::default()).unwrap();
    assert!(matches!(out.states, Raster::Categories(_)));
    assert_eq!(out.states.shapes(), raster.shapes());
    assert_eq!(
        out.states.categories()[0].variable_values(0),
        raster.categories()[0].variable_values(0)
    );
    assert!(out.states.categories()[1]
        .data()
        .iter()
        .all(|s| *s == 1.0 || *s == 2.0));
}

#[test]
fn binned_slices_hold_contiguous_states() {
    let tensor = Tensor3::from_fn([3, 4, 9], |v, t, k| ((v + 1) * (t + 2) * k % 7) as f64);
    let table = MethodTable::new(vec![
        MethodRow::new(0, "equal-width", vec![3.into()]),
        MethodRow::new(1, "equal-count", vec![3.into()]),
        mi(2, (0, 0), 1, 3),
    ]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    let states = &out.states.categories()[0];
    for variable in 0..3 {
        for time_bin in 0..4 {
            let mut seen: Vec<u64> = (0..9)
                .map(|k| states.get(variable, time_bin, k) as u64)
                .collect();
            seen.sort_unstable();
            seen.dedup();
            let expected: Vec<u64> = (1..=seen.len() as u64).collect();
            assert_eq!(seen, expected, "variable {variable} time bin {time_bin}");
        }
    }
}

#[test]
fn results_follow_input_row_order() {
    let tensor = Tensor3::from_fn([4, 1, 6], |v, _, k| (v * k) as f64);
    let table = MethodTable::new(vec![
        mi(3, (0, 1), 0, 2),
        MethodRow::new(2, "poisson-mixture", vec![2.into()]),
        MethodRow::new(1, "equal-width", vec![2.into()]),
        MethodRow::new(0, "identity", vec![]),
    ]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    let rows: Vec<(usize, usize)> = out.results.iter().map(|r| (r.row, r.target.variable)).collect();
    assert_eq!(rows, vec![(0, 3), (1, 2), (2, 1), (3, 0)]);
    assert!(matches!(out.results[0].method, MethodKind::MaxMutualInfo { .. }));
}

#[test]
fn mutual_information_reads_resolved_reference_states() {
    let tensor = Tensor3::from_fn([2, 1, 6], |v, _, k| (v * 10 + k) as f64);
    // The dependent row comes first in the table on purpose.
    let table = MethodTable::new(vec![
        mi(1, (0, 0), 0, 2),
        MethodRow::new(0, "equal-width", vec![2.into()]),
    ]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    let states = &out.states.categories()[0];
    assert_eq!(states.variable_values(0), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    assert_eq!(states.variable_values(1), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    assert_eq!(
        out.results[0].edges,
        vec![vec![f64::NEG_INFINITY, 12.0, f64::INFINITY]]
    );
}

#[test]
fn mutual_information_across_categories() {
    let raster = Raster::Categories(vec![
        Tensor3::from_fn([1, 3, 4], |_, t, k| (t * 4 + k) as f64),
        Tensor3::from_fn([1, 1, 4], |_, _, k| (k * k) as f64),
    ]);
    let table = MethodTable::new(vec![
        MethodRow::new(0, "equal-width", vec![2.into()]).in_category(0),
        mi(0, (0, 0), 2, 2).in_category(1),
    ]);
    let out = discretize(&raster, &table, &DiscretizeOpts::default()).unwrap();
    // Reference time bin 2 holds 8..=11 and splits evenly into two states.
    assert_eq!(
        out.states.categories()[1].data(),
        &[1.0, 1.0, 2.0, 2.0]
    );
}

#[test]
fn poisson_mixture_separates_rates_end_to_end() {
    let values = two_clusters(2024);
    let tensor = Tensor3::new([1, 1, values.len()], values.clone()).unwrap();
    let table = MethodTable::new(vec![MethodRow::new(0, "poisson-mixture", vec![2.into()])]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    assert!(out.all_converged());

    let states = out.states.categories()[0].data();
    let mut distinct = states.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    assert_eq!(distinct, vec![1.0, 2.0]);

    let boundary = out.results[0].edges[0][1];
    assert!(boundary > 2.0 && boundary < 50.0, "boundary {boundary}");
    for (value, state) in values.iter().zip(states) {
        assert_eq!(*state == 2.0, *value >= boundary);
    }
}

#[test]
fn manual_weights_per_time_bin() {
    let mut data = two_clusters(3);
    data.extend(two_clusters(4));
    let tensor = Tensor3::new([1, 2, 1000], data).unwrap();
    let table = MethodTable::new(vec![MethodRow::new(
        0,
        "poisson-mixture",
        vec![2.into(), "manual".into(), vec![vec![0.5, 0.5], vec![0.3, 0.7]].into()],
    )]);
    let out = discretize(&tensor.into(), &table, &DiscretizeOpts::default()).unwrap();
    let result = &out.results[0];
    assert_eq!(result.edges.len(), 2);
    for row in &result.edges {
        assert!(row[1] > 2.0 && row[1] < 50.0);
    }
}

#[test]
fn single_manual_row_is_broadcast_to_every_time_bin() {
    let mut data = Vec::new();
    for seed in 5..8 {
        data.extend(two_clusters(seed));
    }
    let tensor: Raster = Tensor3::new([1, 3, 1000], data).unwrap().into();
    let manual = |rows: Vec<Vec<f64>>| {
        MethodTable::new(vec![MethodRow::new(
            0,
            "poisson-mixture",
            vec![2.into(), "manual".into(), rows.into()],
        )])
    };

    let broadcast = discretize(&tensor, &manual(vec![vec![0.3, 0.7]]), &DiscretizeOpts::default())
        .unwrap();
    let explicit = discretize(
        &tensor,
        &manual(vec![vec![0.3, 0.7]; 3]),
        &DiscretizeOpts::default(),
    )
    .unwrap();

    let result = &broadcast.results[0];
    assert_eq!(result.edges.len(), 3);
    assert!(result.converged);
    for row in &result.edges {
        assert!(row[1] > 2.0 && row[1] < 50.0, "boundary {}", row[1]);
    }
    assert_eq!(state_bits(&broadcast.states), state_bits(&explicit.states));
    let target = VarRef::new(0, 0);
    assert_eq!(edge_bits(&broadcast, target), edge_bits(&explicit, target));
}

#[test]
fn mutual_information_on_single_trial_variables() {
    // One trial, so time is the sample axis and there is a single canonical row.
    let tensor: Raster =
        Tensor3::from_fn([2, 6, 1], |v, t, _| if v == 0 { t as f64 } else { 10.0 * t as f64 })
            .into();
    let table = MethodTable::new(vec![
        MethodRow::new(0, "equal-width", vec![2.into()]),
        mi(1, (0, 0), 0, 2),
    ]);
    let out = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap();
    let states = &out.states.categories()[0];
    assert_eq!(states.variable_values(0), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    assert_eq!(states.variable_values(1), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);

    let result = &out.results[1];
    assert!(matches!(result.method, MethodKind::MaxMutualInfo { ref_time_bin: 0, .. }));
    assert_eq!(result.axis, Some(SampleAxis::SingleTrial));
    assert_eq!(result.edges, vec![vec![f64::NEG_INFINITY, 20.0, f64::INFINITY]]);

    let table = MethodTable::new(vec![
        MethodRow::new(0, "equal-width", vec![2.into()]),
        mi(1, (0, 0), 1, 2),
    ]);
    let err = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap_err();
    assert_eq!(err.info().code, "reference-time-bin");
}

#[test]
fn non_convergence_policy() {
    let values = two_clusters(9);
    let tensor: Raster = Tensor3::new([1, 1, values.len()], values).unwrap().into();
    let table = MethodTable::new(vec![MethodRow::new(0, "poisson-mixture", vec![2.into()])]);
    let starved = MinimizerOpts {
        max_iters_per_param: 1,
        ..MinimizerOpts::default()
    };

    let fail = DiscretizeOpts {
        minimizer: starved.clone(),
        ..DiscretizeOpts::default()
    };
    let err = discretize(&tensor, &table, &fail).unwrap_err();
    assert!(matches!(err, DiscError::Convergence(_)));
    assert!(!err.is_validation());

    let keep = DiscretizeOpts {
        minimizer: starved,
        on_non_convergence: ConvergencePolicy::Keep,
        ..DiscretizeOpts::default()
    };
    let out = discretize(&tensor, &table, &keep).unwrap();
    assert!(!out.results[0].converged);
    assert!(!out.all_converged());
    assert!(out.states.categories()[0].data().iter().all(|s| *s >= 1.0));
}

#[test]
fn provenance_is_reproducible() {
    let tensor: Raster = Tensor3::from_fn([2, 2, 5], |v, t, k| (v + t + k * k) as f64).into();
    let table = MethodTable::new(vec![
        MethodRow::new(0, "equal-count", vec![2.into()]),
        MethodRow::new(1, "equal-width", vec![3.into()]),
    ]);
    let a = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap();
    let b = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap();
    assert_eq!(a.provenance, b.provenance);
    assert_eq!(a.provenance.states_hash.len(), 64);

    let c = discretize(&tensor, &table, &DiscretizeOpts::strict()).unwrap();
    assert_ne!(a.provenance.opts_hash, c.provenance.opts_hash);
    assert_eq!(a.provenance.states_hash, c.provenance.states_hash);
}

#[test]
fn thread_count_does_not_change_output() {
    let mut data = Vec::new();
    for seed in 0..4 {
        data.extend(two_clusters(seed));
    }
    let tensor: Raster = Tensor3::new([2, 2, 1000], data).unwrap().into();
    let table = MethodTable::new(vec![
        MethodRow::new(0, "poisson-mixture", vec![2.into()]),
        MethodRow::new(1, "equal-count", vec![3.into()]),
    ]);
    let serial = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap();
    let parallel = discretize(
        &tensor,
        &table,
        &DiscretizeOpts {
            concurrency: 4,
            ..DiscretizeOpts::default()
        },
    )
    .unwrap();
    assert_eq!(state_bits(&serial.states), state_bits(&parallel.states));
    for target in [VarRef::new(0, 0), VarRef::new(0, 1)] {
        assert_eq!(edge_bits(&serial, target), edge_bits(&parallel, target));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn row_order_does_not_change_output(
        data in proptest::collection::vec(0u8..20, 60),
        rows in Just(vec![
            MethodRow::new(0, "equal-width", vec![3.into()]),
            MethodRow::new(1, "equal-count", vec![2.into()]),
            mi(2, (0, 0), 1, 3),
            MethodRow::new(3, "identity", vec![]),
        ]).prop_shuffle(),
    ) {
        let tensor: Raster = Tensor3::new([4, 3, 5], data.into_iter().map(f64::from).collect())
            .unwrap()
            .into();
        let reference_table = MethodTable::new(vec![
            MethodRow::new(0, "equal-width", vec![3.into()]),
            MethodRow::new(1, "equal-count", vec![2.into()]),
            mi(2, (0, 0), 1, 3),
            MethodRow::new(3, "identity", vec![]),
        ]);
        let expected = discretize(&tensor, &reference_table, &DiscretizeOpts::default()).unwrap();
        let shuffled = discretize(&tensor, &MethodTable::new(rows), &DiscretizeOpts::default()).unwrap();

        prop_assert_eq!(state_bits(&expected.states), state_bits(&shuffled.states));
        prop_assert_eq!(&expected.provenance.table_hash, &shuffled.provenance.table_hash);
        for variable in 0..4 {
            let target = VarRef::new(0, variable);
            prop_assert_eq!(edge_bits(&expected, target), edge_bits(&shuffled, target));
        }
    }

    #[test]
    fn output_shape_matches_input(
        variables in 1usize..4,
        time_bins in 1usize..4,
        trials in 1usize..6,
        bins in 1usize..5,
    ) {
        let tensor: Raster = Tensor3::from_fn([variables, time_bins, trials], |v, t, k| {
            ((v * 7 + t * 3 + k * 5) % 11) as f64
        })
        .into();
        let table = MethodTable::new(
            (0..variables)
                .map(|v| MethodRow::new(v, "equal-width", vec![bins.into()]))
                .collect(),
        );
        let out = discretize(&tensor, &table, &DiscretizeOpts::default()).unwrap();
        prop_assert!(out.states.is_bare());
        prop_assert_eq!(out.states.shapes(), tensor.shapes());
        for result in &out.results {
            let rows = if trials == 1 { 1 } else { time_bins };
            prop_assert_eq!(result.edges.len(), rows);
            prop_assert!(result.edges.iter().all(|row| row.len() == bins + 1));
        }
    }
}
