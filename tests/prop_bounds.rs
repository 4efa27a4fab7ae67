//! Property-based tests for chromosome bounds and active-set invariants.
//!
//! These tests verify that every chromosome produced by the constructor
//! or any mutator stays within its per-gene bounds, and that the active
//! set always reflects reachability from the outputs.
//! Run with: cargo test --release prop_bounds

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use dcgp::{Expression, GridConfig, KernelSet};

fn small_shapes() -> impl Strategy<Value = (usize, usize, usize, usize, usize, usize, u64)> {
    (
        1usize..4,
        1usize..4,
        1usize..4,
        1usize..5,
        1usize..6,
        1usize..4,
        any::<u64>(),
    )
}

fn build(n: usize, m: usize, r: usize, c: usize, l: usize, a: usize, seed: u64) -> Expression<f64> {
    let kernels = KernelSet::from_names(&["sum", "diff", "mul", "div"]).unwrap();
    Expression::new(&GridConfig::new(n, m, r, c, l, a), &kernels, seed).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Constructor samples every gene inside its bounds.
    #[test]
    fn prop_constructor_within_bounds((n, m, r, c, l, a, seed) in small_shapes()) {
        let ex = build(n, m, r, c, l, a, seed);
        for (i, &g) in ex.chromosome().iter().enumerate() {
            prop_assert!(g >= ex.grid().lower_bounds()[i]);
            prop_assert!(g <= ex.grid().upper_bounds()[i]);
        }
    }

    /// Mutation never leaves the bounds, and never touches a gene whose
    /// bounds admit a single value.
    #[test]
    fn prop_mutation_preserves_bounds((n, m, r, c, l, a, seed) in small_shapes()) {
        let mut ex = build(n, m, r, c, l, a, seed);
        let frozen: Vec<(usize, usize)> = ex
            .chromosome()
            .iter()
            .enumerate()
            .filter(|&(i, _)| ex.grid().lower_bounds()[i] == ex.grid().upper_bounds()[i])
            .map(|(i, &g)| (i, g))
            .collect();

        for _ in 0..10 {
            ex.mutate_active(3);
            ex.mutate_random(3);
        }

        for (i, &g) in ex.chromosome().iter().enumerate() {
            prop_assert!(g >= ex.grid().lower_bounds()[i]);
            prop_assert!(g <= ex.grid().upper_bounds()[i]);
        }
        for (i, g) in frozen {
            prop_assert_eq!(ex.chromosome()[i], g);
        }
    }

    /// The current chromosome always round-trips through `set`.
    #[test]
    fn prop_set_roundtrip((n, m, r, c, l, a, seed) in small_shapes()) {
        let mut ex = build(n, m, r, c, l, a, seed);
        ex.mutate_active(5);
        let snapshot = ex.chromosome().to_vec();
        prop_assert!(ex.set(&snapshot).is_ok());
        prop_assert_eq!(ex.chromosome(), &snapshot[..]);
    }

    /// Every active grid node only reads nodes with smaller ids, and
    /// everything it reads is active too.
    #[test]
    fn prop_active_nodes_point_backward((n, m, r, c, l, a, seed) in small_shapes()) {
        let mut ex = build(n, m, r, c, l, a, seed);
        ex.mutate_random(4);
        for &node in ex.active_nodes() {
            if node < n {
                continue;
            }
            let g = ex.grid().gene_start(node);
            let arity = ex.grid().node_arity(node);
            for &src in &ex.chromosome()[g + 1..=g + arity] {
                prop_assert!(src < node);
                prop_assert!(ex.active_nodes().contains(&src));
            }
        }
    }

    /// Active genes are exactly the genes of active grid nodes plus the
    /// output genes.
    #[test]
    fn prop_active_genes_back_active_nodes((n, m, r, c, l, a, seed) in small_shapes()) {
        let ex = build(n, m, r, c, l, a, seed);
        let mut expected: Vec<usize> = Vec::new();
        for &node in ex.active_nodes() {
            if node < n {
                continue;
            }
            let g = ex.grid().gene_start(node);
            expected.extend(g..=g + ex.grid().node_arity(node));
        }
        expected.extend(ex.grid().first_output_gene()..ex.grid().len());
        prop_assert_eq!(ex.active_genes(), &expected[..]);
    }

    /// Evaluation is pure: same inputs, bit-identical outputs.
    #[test]
    fn prop_evaluate_pure((n, m, r, c, l, a, seed) in small_shapes(), x in -10.0f64..10.0) {
        let ex = build(n, m, r, c, l, a, seed);
        let inputs = vec![x; n];
        let first = ex.evaluate(&inputs).unwrap();
        let second = ex.evaluate(&inputs).unwrap();
        for (p, q) in first.iter().zip(&second) {
            prop_assert!(p.to_bits() == q.to_bits());
        }
    }
}
