use std::fmt::{Display, Formatter, Result};

use crate::species::Species;
use crate::tree::{
    DistanceMatrix,
    NodeIdx::{self, Internal as Int},
};

#[derive(Debug, Clone)]
pub(crate) struct UPGMAMat {
    pub(crate) idx: Vec<NodeIdx>,
    pub(crate) distances: DistanceMatrix,
}

impl Display for UPGMAMat {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{:?}\n {}", self.idx, self.distances)
    }
}

impl UPGMAMat {
    /// Hamming distances between all pairs of species.
    pub(crate) fn from_species(species: &[Species]) -> Self {
        let n = species.len();
        let mut distances = DistanceMatrix::zeros(n, n);
        for i in 0..n {
            for j in (i + 1)..n {
                let dist = species[i].traits.hamming(&species[j].traits) as f64;
                distances[(i, j)] = dist;
                distances[(j, i)] = dist;
            }
        }
        Self {
            idx: (0..n).map(NodeIdx::Leaf).collect(),
            distances,
        }
    }

    /// First closest pair `(i, j)` with `i < j` in row-major order over the upper triangle.
    pub(crate) fn closest_pair(&self) -> (usize, usize) {
        debug_assert!(
            self.distances.ncols() > 1,
            "The matrix must contain at least two clusters."
        );
        let n = self.distances.nrows();
        let mut arg_min = (0, 1);
        let mut val_min = f64::INFINITY;
        for i in 0..n - 1 {
            for j in (i + 1)..n {
                let val = self.distances[(i, j)];
                if val < val_min {
                    val_min = val;
                    arg_min = (i, j);
                }
            }
        }
        arg_min
    }

    /// Writes the distances of the merged cluster into row and column `j`. The new
    /// distance to every other cluster is the plain mean of the two old distances,
    /// regardless of how many leaves each side holds.
    pub(crate) fn recompute_merged_distances(mut self, i: usize, j: usize) -> Self {
        debug_assert!(i < j);
        let n = self.distances.ncols();
        for k in (0..n).filter(|&k| k != i && k != j) {
            let new_dist = (self.distances[(i, k)] + self.distances[(j, k)]) / 2.0;
            self.distances[(j, k)] = new_dist;
            self.distances[(k, j)] = new_dist;
        }
        self.distances[(j, j)] = 0.0;
        self
    }

    pub(crate) fn replace_merged_node(mut self, j: usize, idx_new: usize) -> Self {
        self.idx[j] = Int(idx_new);
        self
    }

    /// Drops the first merged cluster, the merged cluster keeps the slot of the second.
    pub(crate) fn remove_merged_node(mut self, i: usize) -> Self {
        self.distances = self.distances.remove_rows_at(&[i]).remove_columns_at(&[i]);
        self.idx.remove(i);
        self
    }

    /// Symmetric with a zero diagonal and no negative or NaN entries.
    pub(crate) fn is_valid(&self) -> bool {
        let n = self.distances.nrows();
        if n != self.distances.ncols() || n != self.idx.len() {
            return false;
        }
        (0..n).all(|i| {
            self.distances[(i, i)] == 0.0
                && (0..i).all(|j| {
                    let d = self.distances[(i, j)];
                    d >= 0.0 && d == self.distances[(j, i)]
                })
        })
    }
}
