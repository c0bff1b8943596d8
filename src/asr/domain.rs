use std::fmt::{Display, Formatter};

use anyhow::bail;
use fixedbitset::FixedBitSet;
use log::info;

use crate::species::Traits;
use crate::tree::{NodeIdx, Tree};
use crate::{InvariantViolation, Result};

/// Candidate states of an internal node.
///
/// A position is fixed when both children are known to hold the same value there and
/// free otherwise. The domain enumerates all `2^k` assignments of the `k` free
/// positions: candidate `i` gives the `j`-th free position the value of bit `j` of `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorDomain {
    template: Traits,
    free: Vec<usize>,
}

/// Trait values of a node together with the positions at which they are settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartialState {
    known: FixedBitSet,
    values: Traits,
}

impl PartialState {
    pub(crate) fn known(values: &Traits) -> Self {
        let mut known = FixedBitSet::with_capacity(values.len());
        known.insert_range(..);
        Self {
            known,
            values: values.clone(),
        }
    }

    pub(crate) fn from_domain(domain: &AncestorDomain) -> Self {
        let mut known = FixedBitSet::with_capacity(domain.template.len());
        known.insert_range(..);
        for &pos in &domain.free {
            known.set(pos, false);
        }
        Self {
            known,
            values: domain.template.clone(),
        }
    }

    fn is_known(&self, pos: usize) -> bool {
        self.known.contains(pos)
    }
}

impl AncestorDomain {
    pub(crate) fn from_children(left: &PartialState, right: &PartialState) -> Self {
        debug_assert_eq!(left.values.len(), right.values.len());
        let mut template = Traits::zeros(left.values.len());
        let mut free = Vec::new();
        for pos in 0..left.values.len() {
            let shared = left.is_known(pos)
                && right.is_known(pos)
                && left.values.get(pos) == right.values.get(pos);
            if shared {
                template.set(pos, left.values.get(pos));
            } else {
                free.push(pos);
            }
        }
        Self { template, free }
    }

    /// Number of candidate states, `None` if it does not fit into a `usize`.
    pub fn size(&self) -> Option<usize> {
        u32::try_from(self.free.len())
            .ok()
            .and_then(|shift| 1usize.checked_shl(shift))
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn free_positions(&self) -> &[usize] {
        &self.free
    }

    pub fn is_fixed(&self, pos: usize) -> bool {
        self.free.binary_search(&pos).is_err()
    }

    /// Fixed values with every free position set to 0.
    pub fn template(&self) -> &Traits {
        &self.template
    }

    pub fn state(&self, candidate: usize) -> Traits {
        let mut traits = self.template.clone();
        self.write_state(candidate, &mut traits);
        traits
    }

    /// Overwrites `traits` with candidate `candidate` without allocating.
    pub fn write_state(&self, candidate: usize, traits: &mut Traits) {
        debug_assert!(self.size().is_none_or(|size| candidate < size));
        traits.copy_from(&self.template);
        for (bit, &pos) in self.free.iter().enumerate() {
            traits.set(pos, (candidate >> bit) & 1 == 1);
        }
    }

    /// Candidate index whose free positions match `traits`, fixed positions are ignored.
    pub fn index_of(&self, traits: &Traits) -> usize {
        self.free
            .iter()
            .enumerate()
            .filter(|&(_, &pos)| traits.get(pos))
            .map(|(bit, _)| 1usize << bit)
            .sum()
    }

    /// Closest member of the domain: fixed positions from the template, the rest from `traits`.
    pub fn project(&self, traits: &Traits) -> Traits {
        let mut projected = self.template.clone();
        for &pos in &self.free {
            projected.set(pos, traits.get(pos));
        }
        projected
    }

    pub fn contains(&self, traits: &Traits) -> bool {
        traits.len() == self.template.len()
            && (0..traits.len())
                .filter(|&pos| self.is_fixed(pos))
                .all(|pos| traits.get(pos) == self.template.get(pos))
    }

    /// All candidate states in enumeration order.
    pub fn states(&self) -> impl Iterator<Item = Traits> + '_ {
        self.size()
            .into_iter()
            .flat_map(move |size| (0..size).map(move |candidate| self.state(candidate)))
    }
}

impl Display for AncestorDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for pos in 0..self.template.len() {
            match self.is_fixed(pos) {
                true if self.template.get(pos) => write!(f, "1")?,
                true => write!(f, "0")?,
                false => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

fn partial_state(tree: &Tree, node_idx: &NodeIdx) -> Result<PartialState> {
    let node = tree.node(node_idx);
    if node.is_resolved() {
        return Ok(PartialState::known(node.traits()));
    }
    match node.domain() {
        Some(domain) => Ok(PartialState::from_domain(domain)),
        None => bail!(InvariantViolation::new(format!(
            "{} has neither a state nor a domain",
            node_idx
        ))),
    }
}

/// Computes the domain of every internal node bottom-up from the current states of its
/// children. Unresolved children contribute only the positions their own domain fixes.
pub fn compute_domains(tree: &mut Tree) -> Result<()> {
    if !tree.is_complete() {
        bail!(InvariantViolation::new(
            "domains requested for an incomplete tree"
        ));
    }
    let postorder = tree.postorder().to_vec();
    let mut total_free = 0;
    for node_idx in postorder.iter().filter(|idx| matches!(idx, NodeIdx::Internal(_))) {
        let [left, right] = match tree.children(node_idx) {
            &[left, right] => [left, right],
            children => bail!(InvariantViolation::new(format!(
                "{} has {} children instead of 2",
                node_idx,
                children.len()
            ))),
        };
        let domain = AncestorDomain::from_children(
            &partial_state(tree, &left)?,
            &partial_state(tree, &right)?,
        );
        total_free += domain.free_count();
        let node = tree.node_mut(node_idx);
        if !node.resolved {
            node.traits.copy_from(domain.template());
        }
        node.domain = Some(domain);
    }
    info!(
        "Computed domains of {} ancestors with {} free positions in total",
        tree.internals().len(),
        total_free
    );
    Ok(())
}
