mod error;
mod parser;
pub mod query;

pub use error::SmartsError;
pub use query::{AtomExpr, BondExpr, MatchContext};

use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::{AtomId, Mol};
use crate::rings::RingInfo;
use crate::substruct::{get_substruct_matches_with, AtomMapping};

pub fn from_smarts(s: &str) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
    parser::parse(s)
}

pub fn has_smarts_match(target: &Mol<Atom, Bond>, query: &Mol<AtomExpr, BondExpr>) -> bool {
    let rings = RingInfo::symmetrized_sssr(target);
    !get_smarts_matches_limited(target, &rings, query, Some(1)).is_empty()
}

pub fn get_smarts_matches(
    target: &Mol<Atom, Bond>,
    query: &Mol<AtomExpr, BondExpr>,
) -> Vec<AtomMapping> {
    let rings = RingInfo::symmetrized_sssr(target);
    get_smarts_matches_limited(target, &rings, query, None)
}

/// Every mapping of `query` into `target`, stopping after `limit` mappings.
///
/// Mappings that cover the same target atoms in a different order are all
/// reported. Stereo primitives do not constrain the search.
pub fn get_smarts_matches_limited(
    target: &Mol<Atom, Bond>,
    ring_info: &RingInfo,
    query: &Mol<AtomExpr, BondExpr>,
    limit: Option<usize>,
) -> Vec<AtomMapping> {
    let ctx = MatchContext::new(target, ring_info);
    get_substruct_matches_with(
        target,
        query,
        |t, q| query.atom(q).matches(&ctx, t),
        |t, q| query.bond(q).matches(&ctx, t),
        limit,
    )
}

/// Reference order of a query atom's tetrahedral tag: a hydrogen slot first
/// when the atom fixes a nonzero `H` count, then neighbours by index.
pub(crate) fn template_reference(mol: &Mol<AtomExpr, BondExpr>, idx: NodeIndex) -> Vec<AtomId> {
    let mut out = Vec::with_capacity(4);
    if mol.atom(idx).explicit_h().unwrap_or(0) > 0 {
        out.push(AtomId::ImplicitH(idx));
    }
    out.extend(mol.sorted_neighbors(idx).into_iter().map(AtomId::Node));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::prepare;

    fn mol(smiles: &str) -> Mol<Atom, Bond> {
        prepare(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn smarts(s: &str) -> Mol<AtomExpr, BondExpr> {
        from_smarts(s).unwrap_or_else(|e| panic!("bad SMARTS {s:?}: {e}"))
    }

    fn count(smiles: &str, pattern: &str) -> usize {
        get_smarts_matches(&mol(smiles), &smarts(pattern)).len()
    }

    #[test]
    fn parse_precedence_comma_semicolon() {
        let q = smarts("[C,N;H1]");
        let AtomExpr::And(parts) = q.atom(NodeIndex::new(0)) else {
            panic!("expected And");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], AtomExpr::Or(or_parts) if or_parts.len() == 2));
        assert!(matches!(parts[1], AtomExpr::TotalHCount(1)));
    }

    #[test]
    fn parse_high_and_explicit() {
        let q = smarts("[c,n&H1]");
        let AtomExpr::Or(parts) = q.atom(NodeIndex::new(0)) else {
            panic!("expected Or");
        };
        assert!(matches!(&parts[1], AtomExpr::And(and) if and.len() == 2));
    }

    #[test]
    fn single_atom_counts() {
        assert_eq!(count("CC", "[#6]"), 2);
        assert_eq!(count("CCO", "[#6]"), 2);
        assert_eq!(count("c1ccncc1", "[#7]"), 1);
        assert_eq!(count("c1ccccc1", "[a]"), 6);
        assert_eq!(count("C1CCCCC1", "[a]"), 0);
        assert_eq!(count("C1CCCCC1", "[A]"), 6);
        assert_eq!(count("CCO", "*"), 3);
        assert_eq!(count("CCC", "[D2]"), 1);
        assert_eq!(count("CCC", "[D1]"), 2);
        assert_eq!(count("C", "[v4]"), 1);
        assert_eq!(count("CCO", "[H1]"), 1);
        assert_eq!(count("CC1CCCCC1", "[R0]"), 1);
        assert_eq!(count("c1ccc2ccccc2c1", "[R2]"), 2);
        assert_eq!(count("[Na+].[Cl-]", "[+1]"), 1);
        assert_eq!(count("[Na+].[Cl-]", "[Cl-]"), 1);
        assert_eq!(count("CCO", "[!C]"), 1);
        assert_eq!(count("CC1CCCCC1", "[C;R]"), 6);
    }

    #[test]
    fn bond_semantics() {
        assert_eq!(count("c1ccccc1", "c:c"), 12);
        assert_eq!(count("c1ccccc1", "cc"), 12);
        assert_eq!(count("c1ccccc1", "c-c"), 0);
        assert_eq!(count("c1ccccc1", "c=c"), 0);
        assert_eq!(count("CC", "C~C"), 2);
        assert_eq!(count("CC", "C-C"), 2);
        assert_eq!(count("CC", "C=C"), 0);
        assert_eq!(count("C=CC", "C!-C"), 2);
        assert_eq!(count("C=CC", "C=,-C"), 4);
        assert_eq!(count("C1CC1CC", "C-;!@C"), 4);
    }

    #[test]
    fn mappings_are_not_uniquified() {
        assert_eq!(count("C1CC1", "C1CC1"), 6);
        assert_eq!(count("c1ccccc1", "c1ccccc1"), 12);
    }

    #[test]
    fn recursive_queries() {
        assert_eq!(count("Oc1ccccc1", "[$([OH])]"), 1);
        assert_eq!(count("c1ccccc1", "[$(cc)]"), 6);
        assert_eq!(count("OCC(=O)O", "[CX4;$(C[OH])]"), 1);
    }

    #[test]
    fn chirality_does_not_constrain_matching() {
        assert_eq!(count("C[C@H](N)O", "[C@@H](C)(N)O"), 1);
        assert_eq!(count("C[C@H](N)O", "[C@H](C)(N)O"), 1);
    }

    #[test]
    fn limit_is_respected() {
        let target = mol("c1ccccc1");
        let rings = RingInfo::sssr(&target);
        let found = get_smarts_matches_limited(&target, &rings, &smarts("cc"), Some(3));
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn has_match() {
        assert!(has_smarts_match(&mol("CN"), &smarts("[#6][#7]")));
        assert!(!has_smarts_match(&mol("CO"), &smarts("[#6][#7]")));
    }

    #[test]
    fn reference_order_of_template_atoms() {
        let q = smarts("[C@H:1](F)Cl");
        assert_eq!(
            template_reference(&q, NodeIndex::new(0)),
            vec![
                AtomId::ImplicitH(NodeIndex::new(0)),
                AtomId::Node(NodeIndex::new(1)),
                AtomId::Node(NodeIndex::new(2)),
            ]
        );
    }
}
