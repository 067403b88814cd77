//! Rule application: one compiled rule against one molecule, or a whole
//! library against it, yielding raw product trees.

use tracing::debug;

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
use crate::products::{PredictedProduct, ProductNode};
use crate::rules::{RuleLibrary, TransformationRule};

/// Default cap on match combinations expanded per rule application.
pub const DEFAULT_MAX_PRODUCTS: usize = 1000;

/// Applies compiled rules to single molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformationEngine {
    max_products: usize,
}

impl Default for TransformationEngine {
    fn default() -> Self {
        Self {
            max_products: DEFAULT_MAX_PRODUCTS,
        }
    }
}

impl TransformationEngine {
    pub fn new(max_products: usize) -> Self {
        Self {
            max_products: max_products.max(1),
        }
    }

    pub fn max_products(&self) -> usize {
        self.max_products
    }

    /// Runs one rule against `molecule`, which must already be prepared
    /// (aromaticity perceived).
    ///
    /// Returns one group per match, each holding one structure per product
    /// template. Matches are not deduplicated. Rules that need more than one
    /// reactant never fire here.
    pub fn apply(&self, molecule: &Mol<Atom, Bond>, rule: &TransformationRule) -> Vec<ProductNode> {
        if !rule.is_single_reactant() {
            return Vec::new();
        }
        let output = match rule.compiled().run(&[molecule], self.max_products) {
            Ok(output) => output,
            Err(err) => {
                debug!(pattern = rule.pattern_text(), error = %err, "rule not applicable");
                return Vec::new();
            }
        };
        if output.truncated {
            debug!(
                pattern = rule.pattern_text(),
                cap = self.max_products,
                "match enumeration truncated"
            );
        }
        output
            .product_sets
            .into_iter()
            .map(|set| {
                ProductNode::Group(
                    set.into_iter()
                        .map(|mol| ProductNode::Structure(PredictedProduct::new(mol)))
                        .collect(),
                )
            })
            .collect()
    }

    /// Runs every rule of `library`, one group per rule in library order.
    pub fn apply_library(&self, molecule: &Mol<Atom, Bond>, library: &RuleLibrary) -> Vec<ProductNode> {
        library
            .iter()
            .map(|rule| ProductNode::Group(self.apply(molecule, rule)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::flatten_and_dedup;
    use crate::rules::RuleCategory;
    use crate::structure::{prepare, Canonicalizer};

    fn library(patterns: &[&str]) -> RuleLibrary {
        RuleLibrary::from_patterns(patterns.iter().copied(), RuleCategory::Biological).unwrap()
    }

    fn canonical(smiles: &str) -> String {
        Canonicalizer::default().canonicalize(smiles).unwrap().smiles
    }

    #[test]
    fn oxidation_of_ethanol() {
        let lib = library(&["[CH2:1][OH:2]>>[C:1]=[O:2]"]);
        let mol = prepare("CCO").unwrap();
        let nodes = TransformationEngine::default().apply(&mol, &lib.rules()[0]);
        assert_eq!(nodes.len(), 1);
        let set = flatten_and_dedup(nodes, &Canonicalizer::default());
        assert_eq!(set.smiles().collect::<Vec<_>>(), [canonical("CC=O")]);
    }

    #[test]
    fn symmetric_matches_duplicate_until_flattened() {
        let lib = library(&["[CH2:1][OH:2]>>[C:1]=[O:2]"]);
        let mol = prepare("OCCO").unwrap();
        let nodes = TransformationEngine::default().apply(&mol, &lib.rules()[0]);
        assert_eq!(nodes.len(), 2);
        let set = flatten_and_dedup(nodes, &Canonicalizer::default());
        assert_eq!(set.len(), 1);
        assert_eq!(set.smiles().next(), Some(canonical("OCC=O").as_str()));
    }

    #[test]
    fn no_match_is_empty() {
        let lib = library(&["[N:1]>>[N:1]C"]);
        let mol = prepare("CCO").unwrap();
        assert!(TransformationEngine::default().apply(&mol, &lib.rules()[0]).is_empty());
    }

    #[test]
    fn multi_reactant_rules_are_skipped() {
        let lib = library(&["[C:1]Br.[N:2]>>[C:1][N:2]"]);
        let mol = prepare("CBr").unwrap();
        assert!(TransformationEngine::default().apply(&mol, &lib.rules()[0]).is_empty());
    }

    #[test]
    fn library_groups_follow_rule_order() {
        let lib = library(&["[N:1]>>[N:1]C", "[OH:1]>>[O:1]C", "[C:1][OH:2]>>[C:1]"]);
        let mol = prepare("CCO").unwrap();
        let groups = TransformationEngine::default().apply_library(&mol, &lib);
        let counts: Vec<usize> = groups.iter().map(ProductNode::structure_count).collect();
        assert_eq!(counts, [0, 1, 1]);
    }

    #[test]
    fn product_cap_applies() {
        let lib = library(&["[c:1][cH:2]>>[c:1][c:2]O"]);
        let mol = prepare("c1ccccc1").unwrap();
        let nodes = TransformationEngine::new(3).apply(&mol, &lib.rules()[0]);
        assert_eq!(nodes.len(), 3);
        let set = flatten_and_dedup(nodes, &Canonicalizer::default());
        assert_eq!(set.smiles().collect::<Vec<_>>(), [canonical("Oc1ccccc1")]);
    }
}
