use crate::species::Species;
use crate::tree::Tree;
use crate::Result;

pub trait TreeBuilder {
    fn build_tree(&self, species: &[Species]) -> Result<Tree>;
}
