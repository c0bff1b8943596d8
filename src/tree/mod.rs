use std::fmt::{Display, Formatter};

use anyhow::bail;
use itertools::Itertools;
use nalgebra::DMatrix;

use crate::species::{validate_species, Species, Traits};
use crate::{InvariantViolation, Result};

mod tree_builder;
pub use tree_builder::*;
mod tree_node;
pub use tree_node::*;
mod upgma_builder;
pub use upgma_builder::*;
pub(crate) mod upgma_matrices;

use NodeIdx::{Internal as Int, Leaf};

/// Pairwise distances between the current working clusters.
pub type DistanceMatrix = DMatrix<f64>;

#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

impl Display for NodeIdx {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Int(idx) => write!(f, "Internal node {}", idx),
            Leaf(idx) => write!(f, "Leaf node {}", idx),
        }
    }
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl From<&NodeIdx> for usize {
    fn from(node_idx: &NodeIdx) -> usize {
        usize::from(*node_idx)
    }
}

/// Rooted binary tree over `n` species stored as an arena of `2n - 1` nodes.
///
/// Leaves occupy indices `0..n` in input order, internal nodes `n..2n-1` in the order
/// they were created, so the root is always the last node.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIdx,
    pub(crate) nodes: Vec<Node>,
    pub(crate) n: usize,
    pub(crate) n_traits: usize,
    pub(crate) postorder: Vec<NodeIdx>,
    pub(crate) preorder: Vec<NodeIdx>,
    pub(crate) complete: bool,
    pub(crate) initial_distances: Option<DistanceMatrix>,
}

impl Tree {
    /// Creates the leaves of a tree. With a single species the tree is already complete.
    pub fn new(species: &[Species]) -> Result<Self> {
        let n_traits = validate_species(species)?;
        let n = species.len();
        let mut nodes = Vec::with_capacity(2 * n - 1);
        nodes.extend(
            species
                .iter()
                .enumerate()
                .map(|(idx, s)| Node::new_leaf(idx, s)),
        );
        let mut tree = Self {
            root: if n == 1 { Leaf(0) } else { Int(2 * n - 2) },
            nodes,
            n,
            n_traits,
            postorder: Vec::new(),
            preorder: Vec::new(),
            complete: n == 1,
            initial_distances: None,
        };
        if tree.complete {
            tree.compute_postorder();
            tree.compute_preorder();
        }
        Ok(tree)
    }

    /// Joins two existing subtrees under a new internal node with index `parent_idx`.
    pub fn add_parent(&mut self, parent_idx: usize, left: &NodeIdx, right: &NodeIdx) {
        debug_assert_eq!(parent_idx, self.nodes.len());
        debug_assert!(parent_idx < 2 * self.n - 1);
        let height = 1 + self.node(left).height.max(self.node(right).height);
        self.nodes.push(Node::new_internal(
            parent_idx,
            [*left, *right],
            height,
            self.n_traits,
        ));
        self.nodes[usize::from(left)].add_parent(&Int(parent_idx));
        self.nodes[usize::from(right)].add_parent(&Int(parent_idx));
    }

    pub(crate) fn compute_postorder(&mut self) {
        debug_assert!(self.complete);
        let mut order = Vec::<NodeIdx>::with_capacity(self.len());
        let mut stack = Vec::<NodeIdx>::with_capacity(self.len());
        stack.push(self.root);
        while let Some(node_idx) = stack.pop() {
            order.push(node_idx);
            stack.extend(self.children(&node_idx).iter().copied());
        }
        order.reverse();
        self.postorder = order;
    }

    pub(crate) fn compute_preorder(&mut self) {
        debug_assert!(self.complete);
        self.preorder = self.preorder_subroot(&self.root);
    }

    pub fn preorder_subroot(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.len());
        let mut stack = Vec::<NodeIdx>::with_capacity(self.n);
        stack.push(*subroot_idx);
        while let Some(node_idx) = stack.pop() {
            order.push(node_idx);
            stack.extend(self.children(&node_idx).iter().rev().copied());
        }
        order
    }

    pub fn postorder(&self) -> &[NodeIdx] {
        debug_assert!(
            self.complete,
            "Tree must be complete to get postorder traversal"
        );
        &self.postorder
    }

    pub fn preorder(&self) -> &[NodeIdx] {
        debug_assert!(
            self.complete,
            "Tree must be complete to get preorder traversal"
        );
        &self.preorder
    }

    /// Internal nodes in preorder: the root first, then the left subtree, then the right.
    pub fn internal_preorder(&self) -> Vec<NodeIdx> {
        self.preorder
            .iter()
            .filter(|idx| matches!(idx, Int(_)))
            .copied()
            .collect()
    }

    pub fn root(&self) -> &Node {
        self.node(&self.root)
    }

    /// Number of nodes, `2n - 1` for `n` leaves once the tree is complete.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn n_traits(&self) -> usize {
        self.n_traits
    }

    pub fn leaves(&self) -> &[Node] {
        &self.nodes[..self.n]
    }

    pub fn internals(&self) -> &[Node] {
        &self.nodes[self.n..]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node(&self, node_idx: &NodeIdx) -> &Node {
        &self.nodes[usize::from(node_idx)]
    }

    pub(crate) fn node_mut(&mut self, node_idx: &NodeIdx) -> &mut Node {
        &mut self.nodes[usize::from(node_idx)]
    }

    pub fn children(&self, node_idx: &NodeIdx) -> &[NodeIdx] {
        &self.node(node_idx).children
    }

    pub fn parent(&self, node_idx: &NodeIdx) -> Option<NodeIdx> {
        self.node(node_idx).parent
    }

    pub fn traits(&self, node_idx: &NodeIdx) -> &Traits {
        &self.node(node_idx).traits
    }

    pub fn height(&self, node_idx: &NodeIdx) -> usize {
        self.node(node_idx).height
    }

    pub fn node_id(&self, node_idx: &NodeIdx) -> &str {
        &self.node(node_idx).id
    }

    pub fn by_id(&self, id: &str) -> &Node {
        let idx = self.try_idx(id);
        match idx {
            Ok(idx) => self.node(&idx),
            Err(_) => panic!("No node with id {} found in the tree", id),
        }
    }

    pub fn try_idx(&self, id: &str) -> Result<NodeIdx> {
        match self.nodes.iter().find(|node| node.id == id) {
            Some(node) => Ok(node.idx),
            None => bail!("No node with id {} found in the tree", id),
        }
    }

    pub fn leaf_ids(&self) -> Vec<String> {
        self.leaves().iter().map(|node| node.id.clone()).collect()
    }

    /// Leaves below `node_idx` from left to right, a leaf is its own only descendant.
    pub fn leaf_descendants(&self, node_idx: &NodeIdx) -> Vec<NodeIdx> {
        self.preorder_subroot(node_idx)
            .into_iter()
            .filter(|idx| matches!(idx, Leaf(_)))
            .collect()
    }

    /// Leaf-to-leaf Hamming distances of the input species, kept for diagnostics.
    pub fn initial_distances(&self) -> Option<&DistanceMatrix> {
        self.initial_distances.as_ref()
    }

    /// True once every internal node carries a state chosen by a parsimony search.
    pub fn is_resolved(&self) -> bool {
        self.complete && self.internals().iter().all(|node| node.resolved)
    }

    /// Parsimony score of the current states, `None` while any ancestor is unresolved.
    pub fn parsimony_score(&self) -> Option<usize> {
        if !self.is_resolved() {
            return None;
        }
        Some(
            self.internals()
                .iter()
                .map(|node| self.cost_to_children(&node.idx))
                .sum(),
        )
    }

    /// Hamming distance of a node's current state to both of its children.
    pub fn cost_to_children(&self, node_idx: &NodeIdx) -> usize {
        let traits = self.traits(node_idx);
        self.children(node_idx)
            .iter()
            .map(|child| traits.hamming(self.traits(child)))
            .sum()
    }

    /// Checks the structural invariants of a complete binary tree.
    pub fn validate_topology(&self) -> Result<()> {
        if !self.complete {
            bail!(InvariantViolation::new("tree topology is not complete"));
        }
        if self.len() != 2 * self.n - 1 {
            bail!(InvariantViolation::new(format!(
                "tree over {} leaves has {} nodes instead of {}",
                self.n,
                self.len(),
                2 * self.n - 1
            )));
        }
        let parentless: Vec<_> = self.nodes.iter().filter(|n| n.parent.is_none()).collect();
        if parentless.len() != 1 || parentless[0].idx != self.root {
            bail!(InvariantViolation::new(format!(
                "expected the root to be the only parentless node, found {}",
                parentless.len()
            )));
        }
        if let Some(node) = self.internals().iter().find(|n| n.children.len() != 2) {
            bail!(InvariantViolation::new(format!(
                "{} has {} children instead of 2",
                node.idx,
                node.children.len()
            )));
        }
        Ok(())
    }

    /// Newick string of the tree, every node annotated with its trait vector once known.
    ///
    /// # Example
    /// ```
    /// use phylo_ancestry::{build_tree, species};
    ///
    /// let tree = build_tree(&[species!("A", [1, 0]), species!("B", [1, 1])]).unwrap();
    /// assert_eq!(tree.to_newick(), "(A[&traits=10],B[&traits=11]);");
    /// ```
    pub fn to_newick(&self) -> String {
        format!("{};", self.subtree_to_newick(&self.root))
    }

    fn subtree_to_newick(&self, node_idx: &NodeIdx) -> String {
        let node = self.node(node_idx);
        let mut newick = match node.idx {
            Int(_) => format!(
                "({})",
                node.children
                    .iter()
                    .map(|child| self.subtree_to_newick(child))
                    .join(",")
            ),
            Leaf(_) => String::new(),
        };
        newick.push_str(&node.id);
        if node.resolved {
            newick.push_str(&format!("[&traits={}]", node.traits));
        }
        newick
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_newick())
    }
}
