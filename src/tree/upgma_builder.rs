use anyhow::bail;
use log::{debug, info};

use crate::species::Species;
use crate::tree::tree_builder::TreeBuilder;
use crate::tree::upgma_matrices::UPGMAMat;
use crate::tree::Tree;
use crate::{InvariantViolation, Result};

/// Agglomerative clustering that always joins the closest pair of clusters.
///
/// Ties are broken by taking the first closest pair in row-major order of the working
/// matrix, so the same input order always yields the same topology. The merged cluster
/// takes the matrix slot of the second cluster of the pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct UPGMABuilder;

impl TreeBuilder for UPGMABuilder {
    fn build_tree(&self, species: &[Species]) -> Result<Tree> {
        let mut tree = Tree::new(species)?;
        info!(
            "Building UPGMA tree over {} species with {} traits",
            species.len(),
            tree.n_traits
        );
        let upgma_data = UPGMAMat::from_species(species);
        tree.initial_distances = Some(upgma_data.distances.clone());
        let tree = UPGMABuilder::build_upgma_tree_from_matrix(upgma_data, tree)?;
        info!("Finished building UPGMA tree with {} nodes", tree.len());
        Ok(tree)
    }
}

impl UPGMABuilder {
    pub fn new() -> Self {
        Self
    }

    fn build_upgma_tree_from_matrix(mut upgma_data: UPGMAMat, mut tree: Tree) -> Result<Tree> {
        let n = upgma_data.distances.ncols();
        if n == 1 {
            return Ok(tree);
        }
        let root_idx = usize::from(&tree.root);
        for cur_idx in n..=root_idx {
            if !upgma_data.is_valid() {
                bail!(InvariantViolation::new(format!(
                    "corrupted distance matrix before merge {}:\n{}",
                    cur_idx - n,
                    upgma_data
                )));
            }
            let (i, j) = upgma_data.closest_pair();
            debug!(
                "Merging {} and {} at distance {} into node {}",
                upgma_data.idx[i],
                upgma_data.idx[j],
                upgma_data.distances[(i, j)],
                cur_idx
            );
            tree.add_parent(cur_idx, &upgma_data.idx[i], &upgma_data.idx[j]);
            upgma_data = upgma_data
                .recompute_merged_distances(i, j)
                .replace_merged_node(j, cur_idx)
                .remove_merged_node(i);
        }
        debug_assert_eq!(upgma_data.idx, vec![tree.root]);
        tree.complete = true;
        tree.compute_postorder();
        tree.compute_preorder();
        Ok(tree)
    }
}
