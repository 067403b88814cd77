use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::substruct::get_substruct_match_with;

/// AST node for a SMARTS atom query expression.
///
/// Each variant represents a primitive test or a logical combination of tests.
/// During substructure search, [`AtomExpr::matches`] evaluates the expression
/// tree against a target atom.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// Matches any atom (wildcard `*`).
    True,
    /// Matches by element. `aromatic` is `None` for `#n` (either), `Some(true)`
    /// for lowercase (`c`), `Some(false)` for uppercase (`C`).
    Element {
        atomic_num: u8,
        aromatic: Option<bool>,
    },
    /// Matches any aromatic atom (`a`).
    Aromatic,
    /// Matches any aliphatic atom (`A`).
    Aliphatic,
    Isotope(u16),
    /// Number of explicit neighbours (`D`).
    Degree(u8),
    /// Sum of bond orders plus hydrogens (`v`).
    Valence(u8),
    /// Explicit neighbours plus hydrogens (`X`).
    Connectivity(u8),
    /// Implicit plus explicit hydrogens (`H`).
    TotalHCount(u8),
    /// Implicit hydrogens only (`h`).
    ImplicitHCount(u8),
    /// Number of SSSR rings containing the atom (`R<n>`, `R0` for acyclic).
    RingMembership(u8),
    /// Size of the smallest SSSR ring containing the atom (`r<n>`).
    SmallestRingSize(u8),
    /// Number of ring bonds on the atom (`x<n>`).
    RingBondCount(u8),
    Charge(i8),
    /// Matches atoms in at least one ring (bare `R` or `r`).
    InRing,
    /// A recursive SMARTS sub-query (`$(...)`). Its first atom is anchored on
    /// the atom under test.
    Recursive(Box<Mol<AtomExpr, BondExpr>>),
    /// Atom map class (`:n`). Always matches.
    AtomMapClass(u16),
    /// Tetrahedral tag (`@`/`@@`), expressed in the query's reference order.
    /// Always matches; the tag only matters when a reaction template
    /// rewrites stereo.
    Chirality(Chirality),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

/// AST node for a SMARTS bond query expression.
///
/// Implicit bonds in SMARTS default to [`BondExpr::SingleOrAromatic`], unlike
/// SMILES where implicit bonds are always single.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// Matches any bond (`~`).
    True,
    /// Non-aromatic single bond (`-`).
    Single,
    /// Non-aromatic double bond (`=`).
    Double,
    Triple,
    /// Aromatic bond (`:`).
    Aromatic,
    /// Ring bond (`@`).
    Ring,
    /// Default SMARTS bond: matches single or aromatic.
    SingleOrAromatic,
    /// Directional single bonds (`/`, `\`). Direction is not checked.
    Up,
    Down,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

/// Target molecule plus the ring data that ring primitives need.
pub struct MatchContext<'a> {
    pub mol: &'a Mol<Atom, Bond>,
    pub ring_info: &'a RingInfo,
}

impl<'a> MatchContext<'a> {
    pub fn new(mol: &'a Mol<Atom, Bond>, ring_info: &'a RingInfo) -> Self {
        Self { mol, ring_info }
    }

    fn total_h(&self, idx: NodeIndex) -> u8 {
        let explicit = self
            .mol
            .neighbors(idx)
            .filter(|&nb| self.mol.atom(nb).atomic_num == 1)
            .count() as u8;
        self.mol.atom(idx).hydrogen_count + explicit
    }

    fn valence(&self, idx: NodeIndex) -> u8 {
        let bonds: u8 = self
            .mol
            .bonds_of(idx)
            .map(|e| self.mol.bond(e).order.valence())
            .sum();
        bonds + self.mol.atom(idx).hydrogen_count
    }

    fn ring_bond_count(&self, idx: NodeIndex) -> u8 {
        self.mol
            .neighbors(idx)
            .filter(|&nb| self.ring_info.is_ring_bond(self.mol, idx, nb))
            .count() as u8
    }
}

impl AtomExpr {
    pub fn matches(&self, ctx: &MatchContext, idx: NodeIndex) -> bool {
        let atom = ctx.mol.atom(idx);
        match self {
            AtomExpr::True => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => atom.atomic_num == *atomic_num && aromatic.is_none_or(|a| atom.is_aromatic == a),
            AtomExpr::Aromatic => atom.is_aromatic,
            AtomExpr::Aliphatic => !atom.is_aromatic,
            AtomExpr::Isotope(iso) => atom.isotope == *iso,
            AtomExpr::Degree(d) => ctx.mol.degree(idx) == *d as usize,
            AtomExpr::Valence(v) => ctx.valence(idx) == *v,
            AtomExpr::Connectivity(x) => {
                ctx.mol.degree(idx) + atom.hydrogen_count as usize == *x as usize
            }
            AtomExpr::TotalHCount(h) => ctx.total_h(idx) == *h,
            AtomExpr::ImplicitHCount(h) => atom.hydrogen_count == *h,
            AtomExpr::RingMembership(n) => ctx.ring_info.ring_count(idx) == *n as usize,
            AtomExpr::SmallestRingSize(r) => {
                ctx.ring_info.smallest_ring_size(idx).unwrap_or(0) == *r as usize
            }
            AtomExpr::RingBondCount(x) => ctx.ring_bond_count(idx) == *x,
            AtomExpr::Charge(c) => atom.formal_charge == *c,
            AtomExpr::InRing => ctx.ring_info.is_ring_atom(idx),
            AtomExpr::Recursive(inner) => recursive_match(inner, ctx, idx),
            AtomExpr::AtomMapClass(_) | AtomExpr::Chirality(_) => true,
            AtomExpr::And(exprs) => exprs.iter().all(|e| e.matches(ctx, idx)),
            AtomExpr::Or(exprs) => exprs.iter().any(|e| e.matches(ctx, idx)),
            AtomExpr::Not(expr) => !expr.matches(ctx, idx),
        }
    }

    /// The `:n` class carried by this expression, if any. `0` counts as none.
    pub fn map_class(&self) -> Option<u16> {
        match self {
            AtomExpr::AtomMapClass(0) => None,
            AtomExpr::AtomMapClass(n) => Some(*n),
            AtomExpr::And(parts) => parts.iter().find_map(AtomExpr::map_class),
            _ => None,
        }
    }

    /// The tetrahedral tag of this expression, looking through `&`.
    pub fn chirality(&self) -> Chirality {
        match self {
            AtomExpr::Chirality(c) => *c,
            AtomExpr::And(parts) => parts
                .iter()
                .map(AtomExpr::chirality)
                .find(|c| *c != Chirality::None)
                .unwrap_or(Chirality::None),
            _ => Chirality::None,
        }
    }

    /// Hydrogen count fixed by an `H<n>` primitive at the top level.
    pub fn explicit_h(&self) -> Option<u8> {
        match self {
            AtomExpr::TotalHCount(h) => Some(*h),
            AtomExpr::And(parts) => parts.iter().find_map(AtomExpr::explicit_h),
            _ => None,
        }
    }

    pub(crate) fn map_chirality(&mut self, f: &impl Fn(Chirality) -> Chirality) {
        match self {
            AtomExpr::Chirality(c) => *c = f(*c),
            AtomExpr::And(parts) => parts.iter_mut().for_each(|p| p.map_chirality(f)),
            _ => {}
        }
    }
}

impl BondExpr {
    pub fn matches(&self, ctx: &MatchContext, edge: EdgeIndex) -> bool {
        let bond = ctx.mol.bond(edge);
        match self {
            BondExpr::True => true,
            BondExpr::Single | BondExpr::Up | BondExpr::Down => {
                bond.order == BondOrder::Single && !bond.is_aromatic
            }
            BondExpr::Double => bond.order == BondOrder::Double && !bond.is_aromatic,
            BondExpr::Triple => bond.order == BondOrder::Triple,
            BondExpr::Aromatic => bond.is_aromatic,
            BondExpr::SingleOrAromatic => bond.is_aromatic || bond.order == BondOrder::Single,
            BondExpr::Ring => ctx
                .mol
                .bond_endpoints(edge)
                .is_some_and(|(a, b)| ctx.ring_info.is_ring_bond(ctx.mol, a, b)),
            BondExpr::And(exprs) => exprs.iter().all(|e| e.matches(ctx, edge)),
            BondExpr::Or(exprs) => exprs.iter().any(|e| e.matches(ctx, edge)),
            BondExpr::Not(expr) => !expr.matches(ctx, edge),
        }
    }

    /// The plain order this bond writes into a product, if it names one.
    pub fn plain_order(&self) -> Option<BondOrder> {
        match self {
            BondExpr::Single | BondExpr::Up | BondExpr::Down => Some(BondOrder::Single),
            BondExpr::Double => Some(BondOrder::Double),
            BondExpr::Triple => Some(BondOrder::Triple),
            _ => None,
        }
    }
}

fn recursive_match(inner: &Mol<AtomExpr, BondExpr>, ctx: &MatchContext, idx: NodeIndex) -> bool {
    if inner.atom_count() == 0 {
        return false;
    }
    let anchor = NodeIndex::new(0);
    get_substruct_match_with(
        ctx.mol,
        inner,
        |t, q| (q != anchor || t == idx) && inner.atom(q).matches(ctx, t),
        |t, q| inner.bond(q).matches(ctx, t),
    )
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smarts::from_smarts;
    use crate::structure::prepare;

    fn first_atom(smarts: &str) -> AtomExpr {
        let q = from_smarts(smarts).unwrap();
        q.atom(NodeIndex::new(0)).clone()
    }

    fn hits(smarts: &str, smiles: &str) -> Vec<usize> {
        let expr = first_atom(smarts);
        let mol = prepare(smiles).unwrap();
        let rings = RingInfo::sssr(&mol);
        let ctx = MatchContext::new(&mol, &rings);
        mol.atoms()
            .filter(|&i| expr.matches(&ctx, i))
            .map(|i| i.index())
            .collect()
    }

    #[test]
    fn counting_primitives() {
        assert_eq!(hits("[CH3]", "CC(C)O"), vec![0, 2]);
        assert_eq!(hits("[D3]", "CC(C)O"), vec![1]);
        assert_eq!(hits("[X4]", "CC(C)O"), vec![0, 1, 2]);
        assert_eq!(hits("[v2]", "CC(C)O"), vec![3]);
        assert_eq!(hits("[h1]", "CC(C)O"), vec![1, 3]);
    }

    #[test]
    fn ring_primitives() {
        assert_eq!(hits("[R]", "C1CC1C"), vec![0, 1, 2]);
        assert_eq!(hits("[R0]", "C1CC1C"), vec![3]);
        assert_eq!(hits("[r3]", "C1CC1C"), vec![0, 1, 2]);
        assert_eq!(hits("[x3]", "C1CC1C"), Vec::<usize>::new());
        assert_eq!(hits("[x2]", "C1CC1C"), vec![0, 1, 2]);
    }

    #[test]
    fn aromatic_and_charge() {
        assert_eq!(hits("[a]", "c1ccccc1O"), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(hits("[#8]", "c1ccccc1O"), vec![6]);
        assert_eq!(hits("[N+]", "C[N+](C)(C)C"), vec![1]);
        assert_eq!(hits("[O-]", "CC(=O)[O-]"), vec![3]);
    }

    #[test]
    fn recursive_anchor() {
        // Carbon attached to a hydroxyl.
        assert_eq!(hits("[$([CX4][OH])]", "CCO"), vec![1]);
        assert_eq!(hits("[C;!$(C=O)]", "CC(=O)C"), vec![0, 3]);
    }

    #[test]
    fn bond_primitives() {
        let mol = prepare("c1ccccc1C=C").unwrap();
        let rings = RingInfo::sssr(&mol);
        let ctx = MatchContext::new(&mol, &rings);
        let ring_edge = mol.bond_between(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        let double = mol.bond_between(NodeIndex::new(6), NodeIndex::new(7)).unwrap();
        let link = mol.bond_between(NodeIndex::new(5), NodeIndex::new(6)).unwrap();

        assert!(BondExpr::Aromatic.matches(&ctx, ring_edge));
        assert!(BondExpr::Ring.matches(&ctx, ring_edge));
        assert!(!BondExpr::Double.matches(&ctx, ring_edge));
        assert!(BondExpr::Double.matches(&ctx, double));
        assert!(BondExpr::Single.matches(&ctx, link));
        assert!(!BondExpr::Ring.matches(&ctx, link));
        assert!(BondExpr::SingleOrAromatic.matches(&ctx, ring_edge));
        assert!(!BondExpr::SingleOrAromatic.matches(&ctx, double));
    }

    #[test]
    fn map_class_lookup() {
        assert_eq!(first_atom("[C:3]").map_class(), Some(3));
        assert_eq!(first_atom("[C;H1:12]").map_class(), Some(12));
        assert_eq!(first_atom("[C]").map_class(), None);
        assert_eq!(first_atom("[OH1:2]").explicit_h(), Some(1));
    }
}
