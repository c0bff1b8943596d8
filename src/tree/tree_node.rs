use std::fmt::{Debug, Display};

use crate::asr::AncestorDomain;
use crate::species::{Species, Traits};
use crate::tree::NodeIdx::{self, Internal as Int, Leaf};

#[derive(Clone)]
pub struct Node {
    pub idx: NodeIdx,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub height: usize,
    pub id: String,
    pub(crate) traits: Traits,
    pub(crate) resolved: bool,
    pub(crate) domain: Option<AncestorDomain>,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.idx)
        } else {
            write!(f, "{} with id {}", self.idx, self.id)
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            writeln!(
                f,
                "{:?}:{} [{}], parent: {:?}, children: {:?}",
                self.idx, self.height, self.traits, self.parent, self.children,
            )
        } else {
            writeln!(
                f,
                "({}) {:?}:{} [{}], parent: {:?}, children: {:?}",
                self.id, self.idx, self.height, self.traits, self.parent, self.children,
            )
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        (self.idx == other.idx)
            && (self.parent == other.parent)
            && (self.children == other.children)
            && (self.height == other.height)
            && (self.id == other.id)
            && (self.resolved == other.resolved)
            && (!self.resolved || self.traits == other.traits)
    }
}

impl Node {
    pub(crate) fn new_leaf(idx: usize, species: &Species) -> Self {
        Self {
            idx: Leaf(idx),
            parent: None,
            children: Vec::new(),
            height: 1,
            id: species.name.clone(),
            traits: species.traits.clone(),
            resolved: true,
            domain: None,
        }
    }

    pub(crate) fn new_internal(
        idx: usize,
        children: [NodeIdx; 2],
        height: usize,
        n_traits: usize,
    ) -> Self {
        Self {
            idx: Int(idx),
            parent: None,
            children: children.to_vec(),
            height,
            id: String::new(),
            traits: Traits::zeros(n_traits),
            resolved: false,
            domain: None,
        }
    }

    pub(crate) fn add_parent(&mut self, parent_idx: &NodeIdx) {
        debug_assert!(matches!(parent_idx, Int(_)));
        self.parent = Some(*parent_idx);
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.idx, Leaf(_))
    }

    /// Current trait vector. For an internal node that has not been resolved yet these
    /// are the positions shared by its children with the remaining positions absent.
    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    /// Leaves are always resolved, internal nodes once a parsimony search finished.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn children(&self) -> &[NodeIdx] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    /// Candidate states, available for internal nodes after domains were computed.
    pub fn domain(&self) -> Option<&AncestorDomain> {
        self.domain.as_ref()
    }
}
