use assert_matches::assert_matches;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::*;

use crate::asr::{
    compute_domains, AncestorDomain, AncestralStateReconstruction, CancellationToken,
    ParsimonySearch, SearchError, TieBreak,
};
use crate::species::{Species, Traits};
use crate::tree::tests::{random_species, worked_example};
use crate::tree::{
    NodeIdx::{self, Internal as I, Leaf as L},
    Tree,
};
use crate::{build_tree, resolve_parsimony, species, traits, InvariantViolation};

fn all_states(n_traits: usize) -> Vec<Traits> {
    (0..1usize << n_traits)
        .map(|i| (0..n_traits).map(|pos| (i >> pos) & 1 == 1).collect())
        .collect()
}

/// Minimal score over every combination of the given candidate states per ancestor.
fn brute_force_score(tree: &Tree, candidates: &[(NodeIdx, Vec<Traits>)]) -> usize {
    let mut states: Vec<Traits> = tree.nodes().map(|n| n.traits().clone()).collect();
    candidates
        .iter()
        .map(|(_, options)| 0..options.len())
        .multi_cartesian_product()
        .map(|combination| {
            for ((node_idx, options), &choice) in candidates.iter().zip(&combination) {
                states[usize::from(node_idx)] = options[choice].clone();
            }
            let mut score = 0;
            for (node_idx, _) in candidates {
                for child in tree.children(node_idx) {
                    score += states[usize::from(node_idx)].hamming(&states[usize::from(child)]);
                }
            }
            score
        })
        .min()
        .unwrap()
}

fn domain_candidates(tree: &Tree) -> Vec<(NodeIdx, Vec<Traits>)> {
    tree.internal_preorder()
        .into_iter()
        .map(|idx| (idx, tree.node(&idx).domain().unwrap().states().collect()))
        .collect()
}

fn resolved_states(tree: &Tree) -> Vec<(NodeIdx, String)> {
    tree.internal_preorder()
        .into_iter()
        .map(|idx| (idx, tree.traits(&idx).to_string()))
        .collect()
}

#[test]
fn worked_example_golden() {
    let tree = build_tree(&worked_example()).unwrap();
    let (score, tree) = resolve_parsimony(tree).unwrap();
    assert_eq!(score, 8);
    assert_eq!(tree.parsimony_score(), Some(8));
    assert_eq!(
        resolved_states(&tree),
        vec![
            (I(12), "11101".to_string()),
            (I(11), "11001".to_string()),
            (I(10), "11001".to_string()),
            (I(8), "11001".to_string()),
            (I(9), "10001".to_string()),
            (I(7), "10001".to_string()),
        ]
    );
}

#[test]
fn worked_example_statistics() {
    let mut tree = build_tree(&worked_example()).unwrap();
    let result = ParsimonySearch::new().run(&mut tree).unwrap();
    assert_eq!(result.score, 8);
    let seeded = result.seeded_score.unwrap();
    assert!(seeded >= result.score);
    assert!(result.explored >= tree.internals().len());

    let mut tree = build_tree(&worked_example()).unwrap();
    let unseeded = ParsimonySearch::new()
        .with_seeding(false)
        .run(&mut tree)
        .unwrap();
    assert_eq!(unseeded.score, 8);
    assert_eq!(unseeded.seeded_score, None);
}

#[test]
fn worked_example_resolved_twice() {
    let tree = build_tree(&worked_example()).unwrap();
    let (score, tree) = resolve_parsimony(tree).unwrap();
    let first = resolved_states(&tree);
    let (again, tree) = resolve_parsimony(tree).unwrap();
    assert_eq!(again, score);
    assert_eq!(resolved_states(&tree), first);
}

#[rstest]
#[case::two_species(
    vec![species!("A", [0, 1]), species!("B", [1, 0])],
    2,
    vec![(I(2), "11")]
)]
#[case::three_species(
    vec![species!("A", [1, 1, 0]), species!("B", [1, 0, 0]), species!("C", [0, 0, 1])],
    3,
    vec![(I(4), "101"), (I(3), "100")]
)]
#[case::identical_pairs(
    vec![
        species!("A", [0, 0, 0]),
        species!("B", [1, 1, 1]),
        species!("C", [0, 0, 0]),
        species!("D", [1, 1, 1]),
    ],
    3,
    vec![(I(6), "111"), (I(4), "000"), (I(5), "111")]
)]
fn small_fixtures(
    #[case] species: Vec<Species>,
    #[case] expected_score: usize,
    #[case] expected_states: Vec<(NodeIdx, &str)>,
) {
    let (score, tree) = resolve_parsimony(build_tree(&species).unwrap()).unwrap();
    assert_eq!(score, expected_score);
    let expected: Vec<_> = expected_states
        .into_iter()
        .map(|(idx, state)| (idx, state.to_string()))
        .collect();
    assert_eq!(resolved_states(&tree), expected);
}

#[test]
fn single_species_scores_zero() {
    let mut tree = build_tree(&[species!("A", [1, 0, 1])]).unwrap();
    let result = ParsimonySearch::new().run(&mut tree).unwrap();
    assert_eq!(result.score, 0);
    assert_eq!(result.explored, 0);
    assert!(tree.is_resolved());
    assert_eq!(tree.to_newick(), "A[&traits=101];");
}

#[test]
fn domains_fix_shared_positions() {
    let mut tree = build_tree(&[
        species!("A", [1, 1, 0, 0]),
        species!("B", [1, 0, 0, 1]),
        species!("C", [0, 0, 0, 0]),
    ])
    .unwrap();
    compute_domains(&mut tree).unwrap();
    // all pairs at distance 2, so (A,B) first, then ((A,B),C)
    let ab = tree.node(&I(3)).domain().unwrap();
    assert_eq!(ab.to_string(), "1*0*");
    assert_eq!(ab.free_positions(), [1, 3]);
    assert_eq!(ab.size(), Some(4));
    assert_eq!(tree.traits(&I(3)), &traits![1, 0, 0, 0]);
    let root = tree.node(&I(4)).domain().unwrap();
    assert_eq!(root.to_string(), "**0*");
    assert!(root.is_fixed(2));
    assert!(!root.is_fixed(3));
}

#[test]
fn domain_enumeration() {
    let mut tree =
        build_tree(&[species!("A", [1, 0, 1, 0]), species!("B", [0, 0, 1, 1])]).unwrap();
    compute_domains(&mut tree).unwrap();
    let domain: &AncestorDomain = tree.root().domain().unwrap();
    let states: Vec<String> = domain.states().map(|s| s.to_string()).collect();
    assert_eq!(states, vec!["0010", "1010", "0011", "1011"]);
    for (candidate, state) in domain.states().enumerate() {
        assert_eq!(domain.index_of(&state), candidate);
        assert!(domain.contains(&state));
    }
    assert_eq!(domain.project(&traits![1, 1, 0, 1]), traits![1, 0, 1, 1]);
    assert!(!domain.contains(&traits![1, 1, 1, 1]));
}

#[rstest]
#[case(3, 4)]
#[case(6, 5)]
#[case(10, 8)]
fn domain_size_is_power_of_free_positions(#[case] n: usize, #[case] n_traits: usize) {
    let mut rng = StdRng::seed_from_u64((n * 31 + n_traits) as u64);
    let mut tree = build_tree(&random_species(&mut rng, n, n_traits)).unwrap();
    compute_domains(&mut tree).unwrap();
    for node in tree.internals() {
        let domain = node.domain().unwrap();
        assert_eq!(domain.size(), Some(1 << domain.free_count()));
        if let [L(left), L(right)] = node.children() {
            let distance = tree.traits(&L(*left)).hamming(tree.traits(&L(*right)));
            assert_eq!(domain.free_count(), distance);
        }
    }
}

#[test]
fn pruned_search_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..60 {
        let n = rng.gen_range(2..=6);
        let n_traits = rng.gen_range(1..=5);
        let mut tree = build_tree(&random_species(&mut rng, n, n_traits)).unwrap();
        compute_domains(&mut tree).unwrap();
        let expected = brute_force_score(&tree, &domain_candidates(&tree));
        let result = ParsimonySearch::new().run(&mut tree).unwrap();
        assert_eq!(result.score, expected);
        assert_eq!(tree.parsimony_score(), Some(expected));
    }
}

#[test]
fn domains_keep_unrestricted_optimum() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..25 {
        let n = rng.gen_range(2..=4);
        let n_traits = rng.gen_range(1..=3);
        let mut tree = build_tree(&random_species(&mut rng, n, n_traits)).unwrap();
        let candidates: Vec<_> = tree
            .internal_preorder()
            .into_iter()
            .map(|idx| (idx, all_states(n_traits)))
            .collect();
        let expected = brute_force_score(&tree, &candidates);
        let result = ParsimonySearch::new().run(&mut tree).unwrap();
        assert_eq!(result.score, expected);
    }
}

#[test]
fn seeding_does_not_change_score() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..30 {
        let n = rng.gen_range(2..=8);
        let n_traits = rng.gen_range(1..=5);
        let species = random_species(&mut rng, n, n_traits);
        let mut seeded = build_tree(&species).unwrap();
        let mut unseeded = seeded.clone();
        let seeded_result = ParsimonySearch::new().run(&mut seeded).unwrap();
        let unseeded_result = ParsimonySearch::new()
            .with_seeding(false)
            .run(&mut unseeded)
            .unwrap();
        assert_eq!(seeded_result.score, unseeded_result.score);
        assert!(seeded_result.seeded_score.unwrap() >= seeded_result.score);
    }
}

#[test]
fn resolving_twice_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..30 {
        let n = rng.gen_range(2..=8);
        let n_traits = rng.gen_range(1..=5);
        let species = random_species(&mut rng, n, n_traits);
        let (first, tree) = resolve_parsimony(build_tree(&species).unwrap()).unwrap();
        let (second, tree) = resolve_parsimony(tree).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.parsimony_score(), Some(first));
    }
}

#[test]
fn greatest_index_independent_of_seeding() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..30 {
        let n = rng.gen_range(2..=7);
        let n_traits = rng.gen_range(1..=4);
        let species = random_species(&mut rng, n, n_traits);
        let search = ParsimonySearch::new().with_tie_break(TieBreak::GreatestIndex);
        let mut seeded = build_tree(&species).unwrap();
        let mut unseeded = seeded.clone();
        let mut last_found = seeded.clone();
        let score = search.run(&mut seeded).unwrap().score;
        assert_eq!(
            search
                .clone()
                .with_seeding(false)
                .run(&mut unseeded)
                .unwrap()
                .score,
            score
        );
        assert_eq!(resolved_states(&seeded), resolved_states(&unseeded));
        assert_eq!(ParsimonySearch::new().run(&mut last_found).unwrap().score, score);
    }
}

#[test]
fn parallel_search_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(6);
    for _ in 0..20 {
        let n = rng.gen_range(2..=8);
        let n_traits = rng.gen_range(1..=5);
        let species = random_species(&mut rng, n, n_traits);
        let mut sequential = build_tree(&species).unwrap();
        let mut parallel = sequential.clone();
        let expected = ParsimonySearch::new()
            .with_tie_break(TieBreak::GreatestIndex)
            .run(&mut sequential)
            .unwrap();
        let result = ParsimonySearch::new().run_parallel(&mut parallel).unwrap();
        assert_eq!(result.score, expected.score);
        assert_eq!(resolved_states(&parallel), resolved_states(&sequential));
    }
}

#[test]
fn parallel_search_worked_example() {
    let mut tree = build_tree(&worked_example()).unwrap();
    let result = ParsimonySearch::new()
        .with_seeding(false)
        .run_parallel(&mut tree)
        .unwrap();
    assert_eq!(result.score, 8);
    assert_eq!(tree.parsimony_score(), Some(8));
}

#[test]
fn cancelled_search_leaves_tree_unresolved() {
    let token = CancellationToken::new();
    token.cancel();
    let mut tree = build_tree(&worked_example()).unwrap();
    let search = ParsimonySearch::new().with_cancellation(token.clone());
    let err = search.run(&mut tree).unwrap_err();
    assert_matches!(err.downcast_ref::<SearchError>(), Some(SearchError::Cancelled));
    assert!(!tree.is_resolved());
    assert_eq!(tree.parsimony_score(), None);
    let err = search.run_parallel(&mut tree).unwrap_err();
    assert_matches!(err.downcast_ref::<SearchError>(), Some(SearchError::Cancelled));
}

#[test]
fn cancelled_search_keeps_previous_states() {
    let tree = build_tree(&worked_example()).unwrap();
    let (_, mut tree) = resolve_parsimony(tree).unwrap();
    let before = resolved_states(&tree);
    let token = CancellationToken::new();
    let search = ParsimonySearch::new().with_cancellation(token.clone());
    token.cancel();
    assert!(token.is_cancelled());
    assert!(search.run(&mut tree).is_err());
    assert_eq!(resolved_states(&tree), before);
    assert_eq!(tree.parsimony_score(), Some(8));
}

#[test]
fn search_without_domains_is_an_invariant_violation() {
    let mut tree = build_tree(&worked_example()).unwrap();
    let err = ParsimonySearch::new()
        .reconstruct_ancestral_states_unchecked(&mut tree)
        .unwrap_err();
    assert_matches!(err.downcast_ref::<InvariantViolation>(), Some(_));
}

#[test]
fn search_on_incomplete_tree_fails() {
    let mut tree = Tree::new(&worked_example()).unwrap();
    let err = ParsimonySearch::new().run(&mut tree).unwrap_err();
    assert_matches!(err.downcast_ref::<InvariantViolation>(), Some(_));
}

#[test]
fn domain_too_large() {
    let species = vec![
        Species::new("A", &[0; 64]).unwrap(),
        Species::new("B", &[1; 64]).unwrap(),
    ];
    let mut tree = build_tree(&species).unwrap();
    let err = ParsimonySearch::new().run(&mut tree).unwrap_err();
    assert_matches!(
        err.downcast_ref::<SearchError>(),
        Some(SearchError::DomainTooLarge { node: I(2), free: 64 })
    );
}
