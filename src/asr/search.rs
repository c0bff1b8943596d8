use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use log::{debug, info, warn};

use crate::asr::{
    compute_domains, seed_states, AncestorDomain, AncestralStateReconstruction,
    CancellationToken, ParsimonyResult, SearchError, TieBreak,
};
use crate::species::Traits;
use crate::tree::{NodeIdx, Tree};
use crate::{InvariantViolation, Result};

/// Search spaces above `2^UNBOUNDED_WARNING_BITS` combinations get a runtime warning.
const UNBOUNDED_WARNING_BITS: usize = 32;

/// Exact branch-and-bound search for the most parsimonious ancestor states.
///
/// Ancestors are assigned from the last one in preorder up to the root, so both children
/// of a node always carry a state once the node itself is visited. A branch is abandoned
/// as soon as its partial score reaches the best complete score found so far. The
/// runtime is exponential in the number of free positions and is not bounded.
///
/// # Example
/// ```
/// use phylo_ancestry::asr::{AncestralStateReconstruction, ParsimonySearch, TieBreak};
/// use phylo_ancestry::{build_tree, species};
///
/// let mut tree = build_tree(&[
///     species!("A", [1, 1, 0]),
///     species!("B", [1, 0, 0]),
///     species!("C", [0, 0, 1]),
/// ])
/// .unwrap();
/// let search = ParsimonySearch::new().with_tie_break(TieBreak::GreatestIndex);
/// let result = search.reconstruct_ancestral_states(&mut tree).unwrap();
/// assert_eq!(result.score, 3);
/// assert!(tree.is_resolved());
/// ```
#[derive(Debug, Clone)]
pub struct ParsimonySearch {
    seeding: bool,
    tie_break: TieBreak,
    cancellation: Option<CancellationToken>,
}

impl Default for ParsimonySearch {
    fn default() -> Self {
        Self::new()
    }
}

impl ParsimonySearch {
    pub fn new() -> Self {
        Self {
            seeding: true,
            tie_break: TieBreak::LastFound,
            cancellation: None,
        }
    }

    /// Starts from the score of majority-vote ancestor states instead of an unbounded
    /// score. Only affects how much of the search space is explored.
    pub fn with_seeding(mut self, seeding: bool) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn run(&self, tree: &mut Tree) -> Result<ParsimonyResult> {
        self.reconstruct_ancestral_states(tree)
    }

    /// Searches the subtrees below each candidate of the first searched ancestor
    /// independently, in parallel when the `par-search` feature is enabled.
    ///
    /// Score ties are always broken by [`TieBreak::GreatestIndex`] so the result does not
    /// depend on the order in which the branches finish.
    pub fn run_parallel(&self, tree: &mut Tree) -> Result<ParsimonyResult> {
        tree.validate_topology()?;
        compute_domains(tree)?;
        let search = self.clone().with_tie_break(TieBreak::GreatestIndex);
        let Some(ctx) = search.prepare(tree)? else {
            return Ok(ParsimonyResult::trivial());
        };
        let top = ctx.order.len() - 1;
        let bound = AtomicUsize::new(ctx.best_score);
        let branches = explore_branches(&ctx, top, &bound)?;
        let best = branches
            .iter()
            .min_by(|a, b| {
                a.best_score
                    .cmp(&b.best_score)
                    .then_with(|| b.best.cmp(&a.best))
            })
            .map(|branch| (branch.best_score, branch.best.clone()))
            .unwrap_or((ctx.best_score, ctx.best.clone()));
        let result = ParsimonyResult {
            score: best.0,
            seeded_score: ctx.seeded_score,
            explored: branches.iter().map(|b| b.explored).sum(),
            pruned: branches.iter().map(|b| b.pruned).sum(),
        };
        let n_branches = branches.len();
        let states = ctx.states_of(&best.1);
        drop(branches);
        drop(ctx);
        write_states(tree, states);
        info!(
            "Finished parallel search over {} branches with score {}",
            n_branches, result.score
        );
        Ok(result)
    }

    fn prepare<'a>(&'a self, tree: &'a Tree) -> Result<Option<SearchContext<'a>>> {
        let order = tree.internal_preorder();
        if order.is_empty() {
            return Ok(None);
        }
        let mut domains = Vec::with_capacity(order.len());
        let mut sizes = Vec::with_capacity(order.len());
        for node_idx in &order {
            let Some(domain) = tree.node(node_idx).domain() else {
                bail!(InvariantViolation::new(format!(
                    "{} reached the search without a domain",
                    node_idx
                )));
            };
            let Some(size) = domain.size() else {
                bail!(SearchError::DomainTooLarge {
                    node: *node_idx,
                    free: domain.free_count(),
                });
            };
            domains.push(domain);
            sizes.push(size);
        }
        let total_free: usize = domains.iter().map(|d| d.free_count()).sum();
        if total_free > UNBOUNDED_WARNING_BITS {
            warn!(
                "Search space spans 2^{} combinations, the search may not finish in reasonable time",
                total_free
            );
        }
        let nodes = order.iter().map(usize::from).collect();
        let children = order
            .iter()
            .map(|idx| {
                let children = tree.children(idx);
                [usize::from(children[0]), usize::from(children[1])]
            })
            .collect();
        let mut ctx = SearchContext {
            nodes,
            children,
            domains,
            sizes,
            states: tree.nodes().map(|node| node.traits().clone()).collect(),
            current: vec![0; order.len()],
            best: vec![0; order.len()],
            best_score: usize::MAX,
            seeded_score: None,
            tie_break: self.tie_break,
            cancellation: self.cancellation.as_ref(),
            shared_bound: None,
            explored: 0,
            pruned: 0,
            order,
        };
        if self.seeding {
            ctx.best = seed_states(tree, &ctx.order, &ctx.domains, &mut ctx.states);
            ctx.best_score = ctx.total_cost();
            ctx.seeded_score = Some(ctx.best_score);
            info!("Majority seeding gives an upper bound of {}", ctx.best_score);
        }
        Ok(Some(ctx))
    }
}

impl AncestralStateReconstruction for ParsimonySearch {
    fn reconstruct_ancestral_states_unchecked(&self, tree: &mut Tree) -> Result<ParsimonyResult> {
        let Some(mut ctx) = self.prepare(tree)? else {
            return Ok(ParsimonyResult::trivial());
        };
        info!(
            "Starting parsimony search over {} ancestors",
            ctx.order.len()
        );
        ctx.search(ctx.order.len() - 1, 0)?;
        let result = ParsimonyResult {
            score: ctx.best_score,
            seeded_score: ctx.seeded_score,
            explored: ctx.explored,
            pruned: ctx.pruned,
        };
        let states = ctx.states_of(&ctx.best);
        drop(ctx);
        write_states(tree, states);
        info!(
            "Finished parsimony search with score {} after {} candidates",
            result.score, result.explored
        );
        Ok(result)
    }
}

fn write_states(tree: &mut Tree, states: Vec<(NodeIdx, Traits)>) {
    for (node_idx, traits) in states {
        let node = tree.node_mut(&node_idx);
        node.traits = traits;
        node.resolved = true;
    }
    debug_assert!(tree.is_resolved());
}

/// Mutable state of one search, states are indexed by node and `current`/`best` by
/// search position.
#[derive(Clone)]
struct SearchContext<'a> {
    order: Vec<NodeIdx>,
    nodes: Vec<usize>,
    children: Vec<[usize; 2]>,
    domains: Vec<&'a AncestorDomain>,
    sizes: Vec<usize>,
    states: Vec<Traits>,
    current: Vec<usize>,
    best: Vec<usize>,
    best_score: usize,
    seeded_score: Option<usize>,
    tie_break: TieBreak,
    cancellation: Option<&'a CancellationToken>,
    shared_bound: Option<&'a AtomicUsize>,
    explored: usize,
    pruned: usize,
}

impl SearchContext<'_> {
    fn search(&mut self, pos: usize, partial: usize) -> Result<()> {
        for candidate in 0..self.sizes[pos] {
            self.visit(pos, candidate, partial)?;
        }
        Ok(())
    }

    fn visit(&mut self, pos: usize, candidate: usize, partial: usize) -> Result<()> {
        if self.cancellation.is_some_and(|token| token.is_cancelled()) {
            bail!(SearchError::Cancelled);
        }
        self.explored += 1;
        self.domains[pos].write_state(candidate, &mut self.states[self.nodes[pos]]);
        self.current[pos] = candidate;
        let cost = partial + self.node_cost(pos);
        if pos == 0 {
            self.offer(cost);
        } else if self.prunes(cost) {
            self.pruned += 1;
        } else {
            self.search(pos - 1, cost)?;
        }
        Ok(())
    }

    fn node_cost(&self, pos: usize) -> usize {
        let state = &self.states[self.nodes[pos]];
        self.children[pos]
            .iter()
            .map(|&child| state.hamming(&self.states[child]))
            .sum()
    }

    fn total_cost(&self) -> usize {
        (0..self.nodes.len()).map(|pos| self.node_cost(pos)).sum()
    }

    fn bound(&self) -> usize {
        match self.shared_bound {
            Some(shared) => self.best_score.min(shared.load(Ordering::Relaxed)),
            None => self.best_score,
        }
    }

    fn prunes(&self, cost: usize) -> bool {
        match self.tie_break {
            TieBreak::LastFound => cost >= self.bound(),
            TieBreak::GreatestIndex => cost > self.bound(),
        }
    }

    fn offer(&mut self, score: usize) {
        let accept = match self.tie_break {
            TieBreak::LastFound => score <= self.best_score,
            TieBreak::GreatestIndex => {
                score < self.best_score || (score == self.best_score && self.current > self.best)
            }
        };
        if !accept {
            return;
        }
        if score < self.best_score {
            debug!("Improved parsimony bound from {} to {}", self.best_score, score);
        }
        self.best_score = score;
        self.best.clone_from(&self.current);
        if let Some(shared) = self.shared_bound {
            shared.fetch_min(score, Ordering::Relaxed);
        }
    }

    fn states_of(&self, candidates: &[usize]) -> Vec<(NodeIdx, Traits)> {
        self.order
            .iter()
            .zip(&self.domains)
            .zip(candidates)
            .map(|((node_idx, domain), &candidate)| (*node_idx, domain.state(candidate)))
            .collect()
    }
}

cfg_if::cfg_if! {
if #[cfg(feature = "par-search")] {
fn explore_branches<'a>(
    ctx: &SearchContext<'a>,
    top: usize,
    bound: &'a AtomicUsize,
) -> Result<Vec<SearchContext<'a>>> {
    use rayon::prelude::*;
    (0..ctx.sizes[top])
        .into_par_iter()
        .map(|candidate| -> Result<SearchContext<'a>> {
            let mut branch = ctx.clone();
            branch.shared_bound = Some(bound);
            branch.visit(top, candidate, 0)?;
            Ok(branch)
        })
        .collect()
}
} else {
fn explore_branches<'a>(
    ctx: &SearchContext<'a>,
    top: usize,
    bound: &'a AtomicUsize,
) -> Result<Vec<SearchContext<'a>>> {
    (0..ctx.sizes[top])
        .map(|candidate| -> Result<SearchContext<'a>> {
            let mut branch = ctx.clone();
            branch.shared_bound = Some(bound);
            branch.visit(top, candidate, 0)?;
            Ok(branch)
        })
        .collect()
}
}
}
