use crate::asr::AncestorDomain;
use crate::species::Traits;
use crate::tree::{NodeIdx, Tree};

/// Per position, 1 if strictly more than half of `leaves` carry the trait.
pub(crate) fn majority_state(tree: &Tree, leaves: &[NodeIdx]) -> Traits {
    (0..tree.n_traits())
        .map(|pos| {
            let present = leaves
                .iter()
                .filter(|leaf| tree.traits(leaf).get(pos))
                .count();
            present * 2 > leaves.len()
        })
        .collect()
}

/// Writes a trial state for every ancestor in `order` into `states` and returns the
/// candidate index of each trial state within its domain.
///
/// Ancestors above three or more leaves take the majority of their leaves. Ancestors of
/// exactly two leaves copy their parent's trial state at the positions their children
/// disagree on, or 0 at the root. `order` must list parents before their children.
pub(crate) fn seed_states(
    tree: &Tree,
    order: &[NodeIdx],
    domains: &[&AncestorDomain],
    states: &mut [Traits],
) -> Vec<usize> {
    debug_assert_eq!(order.len(), domains.len());
    order
        .iter()
        .zip(domains)
        .map(|(node_idx, domain)| {
            let leaves = tree.leaf_descendants(node_idx);
            let trial = if leaves.len() >= 3 {
                domain.project(&majority_state(tree, &leaves))
            } else {
                match tree.parent(node_idx) {
                    Some(parent) => domain.project(&states[usize::from(parent)]),
                    None => domain.template().clone(),
                }
            };
            let candidate = domain.index_of(&trial);
            states[usize::from(node_idx)] = trial;
            candidate
        })
        .collect()
}
