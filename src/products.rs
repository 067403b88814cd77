//! Raw reaction products and their flattening into a deduplicated set of
//! canonical structures.
//!
//! Products that cannot be canonicalized are counted and logged at debug
//! level.

use std::collections::BTreeSet;

use tracing::debug;

use crate::atom::Atom;
use crate::bond::SmilesBond;
use crate::mol::Mol;
use crate::smiles::{parse_smiles, SmilesError};
use crate::structure::{CanonicalStructure, Canonicalizer};

/// A product graph straight out of the reaction runner, before any
/// normalization.
#[derive(Debug, Clone)]
pub struct PredictedProduct {
    pub structure: Mol<Atom, SmilesBond>,
}

impl PredictedProduct {
    pub fn new(structure: Mol<Atom, SmilesBond>) -> Self {
        Self { structure }
    }

    pub fn from_smiles(smiles: &str) -> Result<Self, SmilesError> {
        parse_smiles(smiles).map(Self::new)
    }
}

/// Engine output: products nested by rule, match and product template.
#[derive(Debug, Clone)]
pub enum ProductNode {
    Structure(PredictedProduct),
    Group(Vec<ProductNode>),
}

impl ProductNode {
    /// Number of structures below this node.
    pub fn structure_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                ProductNode::Structure(_) => count += 1,
                ProductNode::Group(children) => stack.extend(children),
            }
        }
        count
    }
}

impl From<PredictedProduct> for ProductNode {
    fn from(product: PredictedProduct) -> Self {
        ProductNode::Structure(product)
    }
}

/// Distinct canonical products, plus how many raw products failed to
/// canonicalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSet {
    pub structures: BTreeSet<CanonicalStructure>,
    pub discarded: usize,
}

impl ProductSet {
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn smiles(&self) -> impl Iterator<Item = &str> {
        self.structures.iter().map(|s| s.smiles.as_str())
    }

    pub fn identity_keys(&self) -> BTreeSet<&str> {
        self.structures
            .iter()
            .map(|s| s.identity_key.as_str())
            .collect()
    }
}

/// Flattens nested engine output and deduplicates it by canonical SMILES.
///
/// Products that cannot be canonicalized are dropped and counted in
/// [`ProductSet::discarded`].
pub fn flatten_and_dedup(
    results: impl IntoIterator<Item = ProductNode>,
    canonicalizer: &Canonicalizer,
) -> ProductSet {
    let mut set = ProductSet::default();
    let mut worklist: Vec<ProductNode> = results.into_iter().collect();
    while let Some(node) = worklist.pop() {
        match node {
            ProductNode::Group(children) => worklist.extend(children),
            ProductNode::Structure(product) => {
                match canonicalizer.canonicalize_mol(product.structure) {
                    Ok(canonical) => {
                        set.structures.insert(canonical);
                    }
                    Err(err) => {
                        debug!(error = %err, "discarding predicted product");
                        set.discarded += 1;
                    }
                }
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(smiles: &str) -> ProductNode {
        PredictedProduct::from_smiles(smiles).unwrap().into()
    }

    #[test]
    fn nested_groups_are_flattened() {
        let nested = vec![
            ProductNode::Group(vec![leaf("CCO"), ProductNode::Group(vec![leaf("OCC")])]),
            ProductNode::Group(vec![ProductNode::Group(vec![ProductNode::Group(vec![leaf("C=O")])])]),
            leaf("c1ccccc1"),
        ];
        let set = flatten_and_dedup(nested, &Canonicalizer::default());
        assert_eq!(set.len(), 3);
        assert_eq!(set.discarded, 0);
    }

    #[test]
    fn duplicates_collapse_by_canonical_form() {
        let set = flatten_and_dedup(
            vec![leaf("C(O)C"), leaf("CCO"), leaf("OCC")],
            &Canonicalizer::default(),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.identity_keys().len(), 1);
    }

    #[test]
    fn failures_are_counted_not_fatal() {
        // pentavalent carbon parses but fails the valence check
        let set = flatten_and_dedup(
            vec![leaf("C(C)(C)(C)(C)C"), leaf("CC")],
            &Canonicalizer::default(),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.discarded, 1);
    }

    #[test]
    fn empty_input_gives_empty_set() {
        let set = flatten_and_dedup(Vec::new(), &Canonicalizer::default());
        assert!(set.is_empty());
        assert_eq!(ProductNode::Group(vec![]).structure_count(), 0);
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut node = leaf("CC");
        for _ in 0..1_000 {
            node = ProductNode::Group(vec![node]);
        }
        assert_eq!(node.structure_count(), 1);
        let set = flatten_and_dedup(vec![node], &Canonicalizer::default());
        assert_eq!(set.len(), 1);
    }
}
