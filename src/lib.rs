#![cfg_attr(coverage, feature(coverage_attribute))]
//! UPGMA tree building and maximum parsimony ancestral state reconstruction for
//! binary presence/absence trait matrices.
//!
//! The usual flow is [`build_tree`] on validated [`species::Species`] followed by
//! [`resolve_parsimony`], which assigns the most parsimonious trait vector to every
//! ancestor node of the tree.
//!
//! The parsimony search is an exact branch-and-bound over all candidate ancestor
//! states. Its runtime is exponential in the number of ancestors with several free
//! trait positions and is not bounded: use [`asr::CancellationToken`] to stop a search
//! that takes too long.
//!
//! # Example
//! ```
//! use phylo_ancestry::{build_tree, resolve_parsimony, species};
//!
//! let species = vec![
//!     species!("A", [1, 0, 0, 0, 1]),
//!     species!("B", [1, 1, 1, 0, 0]),
//!     species!("C", [1, 0, 1, 0, 1]),
//! ];
//! let tree = build_tree(&species).unwrap();
//! assert_eq!(tree.len(), 5);
//! let (score, tree) = resolve_parsimony(tree).unwrap();
//! assert!(tree.is_resolved());
//! assert_eq!(tree.parsimony_score(), Some(score));
//! ```
use std::error::Error;
use std::fmt;

use anyhow::Error as AnyError;

mod macros;

pub mod asr;
pub mod io;
pub mod species;
pub mod tree;

use crate::asr::{AncestralStateReconstruction, ParsimonySearch};
use crate::species::Species;
use crate::tree::{Tree, TreeBuilder, UPGMABuilder};

pub type Result<T> = std::result::Result<T, AnyError>;

/// Internal defect, e.g. a node reaching the search without a domain or a corrupted
/// distance matrix. Never caused by bad input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub message: String,
}

impl InvariantViolation {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl Error for InvariantViolation {}

/// Builds the UPGMA tree over the given species, keeping their order as leaf indices.
///
/// Fails with [`species::InputValidationError`] if the list is empty, names are
/// repeated or trait vectors differ in length.
pub fn build_tree(species: &[Species]) -> Result<Tree> {
    UPGMABuilder::new().build_tree(species)
}

/// Runs the default parsimony search (seeded, reference tie-breaking) and returns the
/// minimal parsimony score together with the resolved tree.
///
/// Runtime is exponential in the worst case and has no cutoff.
pub fn resolve_parsimony(mut tree: Tree) -> Result<(usize, Tree)> {
    let result = ParsimonySearch::new().reconstruct_ancestral_states(&mut tree)?;
    Ok((result.score, tree))
}
