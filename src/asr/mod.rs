use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::tree::{NodeIdx, Tree};
use crate::Result;

mod domain;
pub use domain::*;
mod seeding;
pub(crate) use seeding::*;
mod search;
pub use search::*;

pub trait AncestralStateReconstruction {
    /// Checks the topology and recomputes every domain before searching, so it can be
    /// called on freshly built and on already resolved trees alike.
    fn reconstruct_ancestral_states(&self, tree: &mut Tree) -> Result<ParsimonyResult> {
        tree.validate_topology()?;
        compute_domains(tree)?;
        self.reconstruct_ancestral_states_unchecked(tree)
    }

    /// Expects every internal node to carry a domain already.
    fn reconstruct_ancestral_states_unchecked(&self, tree: &mut Tree) -> Result<ParsimonyResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsimonyResult {
    pub score: usize,
    /// Score of the majority-vote starting states, when seeding was used.
    pub seeded_score: Option<usize>,
    /// Candidate states evaluated.
    pub explored: usize,
    /// Branches abandoned because their partial score reached the bound.
    pub pruned: usize,
}

impl ParsimonyResult {
    pub(crate) fn trivial() -> Self {
        Self {
            score: 0,
            seeded_score: None,
            explored: 0,
            pruned: 0,
        }
    }
}

/// Rule deciding which of several equally parsimonious assignments is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The assignment found last in enumeration order wins.
    #[default]
    LastFound,
    /// The assignment with the lexicographically greatest candidate indices wins,
    /// compared from the root down. Independent of the order branches are explored in.
    GreatestIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    Cancelled,
    DomainTooLarge { node: NodeIdx, free: usize },
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::Cancelled => write!(f, "Parsimony search was cancelled"),
            SearchError::DomainTooLarge { node, free } => write!(
                f,
                "{} has {} free positions, too many candidate states to enumerate",
                node, free
            ),
        }
    }
}

impl std::error::Error for SearchError {}

/// Shared flag that stops a running search at the next candidate it evaluates.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
