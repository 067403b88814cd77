use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{BondStereo, SmilesBond, SmilesBondOrder};
use crate::mol::{permutation_parity, AtomId, Mol};
use crate::smiles::parse_tree::{ParseAtom, ParseTree};
use crate::smiles::tokenizer::{BondToken, ChiralityToken};

pub fn build_mol(tree: &ParseTree) -> Mol<Atom, SmilesBond> {
    let mut mol = Mol::new();
    let indices: Vec<NodeIndex> = tree
        .atoms
        .iter()
        .map(|p| {
            mol.add_atom(Atom {
                atomic_num: p.element.atomic_num(),
                formal_charge: p.charge,
                isotope: p.isotope,
                chirality: Chirality::None,
                hydrogen_count: 0,
                is_aromatic: p.is_aromatic,
            })
        })
        .collect();

    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        for neighbor in &parse_atom.neighbors {
            let j = neighbor.atom_idx;
            if j <= i || mol.bond_between(indices[i], indices[j]).is_some() {
                continue;
            }
            let order = resolve_bond_order(
                neighbor.bond,
                parse_atom.is_aromatic,
                tree.atoms[j].is_aromatic,
            );
            mol.add_bond(indices[i], indices[j], SmilesBond::new(order));
        }
    }

    resolve_hydrogen_counts(&mut mol, tree, &indices);
    resolve_chirality(&mut mol, tree, &indices);
    resolve_ez_stereo(&mut mol, tree, &indices);

    mol
}

fn resolve_bond_order(
    bond_tok: Option<BondToken>,
    from_aromatic: bool,
    to_aromatic: bool,
) -> SmilesBondOrder {
    match bond_tok {
        Some(BondToken::Single) => SmilesBondOrder::Single,
        Some(BondToken::Double) => SmilesBondOrder::Double,
        Some(BondToken::Triple) => SmilesBondOrder::Triple,
        Some(BondToken::Aromatic) => SmilesBondOrder::Aromatic,
        Some(BondToken::Up) | Some(BondToken::Down) => SmilesBondOrder::Single,
        None if from_aromatic && to_aromatic => SmilesBondOrder::Aromatic,
        None => SmilesBondOrder::Implicit,
    }
}

/// Converts the written `@`/`@@` into a tag over the reference order.
///
/// Written order is: preceding atom, the bracket hydrogen, then ring-closure
/// and branch neighbours as they appear in the string.
fn resolve_chirality(mol: &mut Mol<Atom, SmilesBond>, tree: &ParseTree, indices: &[NodeIndex]) {
    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        let written_tag = match parse_atom.chirality {
            ChiralityToken::None => continue,
            ChiralityToken::CounterClockwise => Chirality::Ccw,
            ChiralityToken::Clockwise => Chirality::Cw,
        };
        let center = indices[i];
        let has_h = mol.atom(center).hydrogen_count > 0;

        let mut written: Vec<AtomId> = parse_atom
            .neighbors
            .iter()
            .map(|n| AtomId::Node(indices[n.atom_idx]))
            .collect();
        if has_h {
            let at = usize::from(parse_atom.has_preceding);
            written.insert(at, AtomId::ImplicitH(center));
        }

        let reference = mol.stereo_neighbors(center);
        if written.len() != reference.len() || reference.len() < 3 {
            continue;
        }
        let even = permutation_parity(&written, &reference);
        mol.atom_mut(center).chirality = written_tag.permuted(even);
    }
}

fn resolve_ez_stereo(mol: &mut Mol<Atom, SmilesBond>, tree: &ParseTree, indices: &[NodeIndex]) {
    let edges: Vec<_> = mol.bonds().collect();
    for edge in edges {
        if mol.bond(edge).order != SmilesBondOrder::Double {
            continue;
        }
        let Some((a, b)) = mol.bond_endpoints(edge) else {
            continue;
        };
        let left = directional_neighbor(&tree.atoms[a.index()], b.index());
        let right = directional_neighbor(&tree.atoms[b.index()], a.index());
        if let (Some((x, dx)), Some((y, dy))) = (left, right) {
            // outward symbols that agree put the substituents on the same side
            let trans = dx != dy;
            mol.bond_mut(edge).stereo = BondStereo::from_refs(indices[x], indices[y], trans);
        }
    }
}

fn directional_neighbor(atom: &ParseAtom, other_end: usize) -> Option<(usize, BondToken)> {
    atom.neighbors.iter().find_map(|n| match n.bond {
        Some(b) if b.is_directional() && n.atom_idx != other_end => Some((n.atom_idx, b)),
        _ => None,
    })
}

fn resolve_hydrogen_counts(
    mol: &mut Mol<Atom, SmilesBond>,
    tree: &ParseTree,
    indices: &[NodeIndex],
) {
    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        let h_count = if parse_atom.is_bracket {
            parse_atom.hcount.unwrap_or(0)
        } else {
            compute_implicit_h(mol, indices[i], parse_atom)
        };
        mol.atom_mut(indices[i]).hydrogen_count = h_count;
    }
}

fn compute_implicit_h(mol: &Mol<Atom, SmilesBond>, node: NodeIndex, parse_atom: &ParseAtom) -> u8 {
    let used = bond_order_sum(mol, node);
    let Some(target) = parse_atom
        .element
        .default_valences()
        .iter()
        .copied()
        .find(|&v| v >= used)
    else {
        return 0;
    };

    let h = target - used;
    if parse_atom.is_aromatic {
        h.saturating_sub(1)
    } else {
        h
    }
}

pub(crate) fn bond_order_sum(mol: &Mol<Atom, SmilesBond>, node: NodeIndex) -> u8 {
    mol.bonds_of(node)
        .map(|e| match mol.bond(e).order {
            SmilesBondOrder::Double => 2,
            SmilesBondOrder::Triple => 3,
            SmilesBondOrder::Single | SmilesBondOrder::Aromatic | SmilesBondOrder::Implicit => 1,
        })
        .fold(0u8, u8::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_tree::build_parse_tree;
    use crate::smiles::tokenizer::tokenize;

    fn parse(s: &str) -> Mol<Atom, SmilesBond> {
        let tokens = tokenize(s).unwrap();
        let tree = build_parse_tree(&tokens).unwrap();
        build_mol(&tree)
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn methane_h_count() {
        let mol = parse("C");
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).hydrogen_count, 4);
    }

    #[test]
    fn ethene_h_counts() {
        let mol = parse("C=C");
        assert_eq!(mol.atom(n(0)).hydrogen_count, 2);
        assert_eq!(mol.atom(n(1)).hydrogen_count, 2);
    }

    #[test]
    fn bracket_no_h() {
        let mol = parse("[C]");
        assert_eq!(mol.atom(n(0)).hydrogen_count, 0);
    }

    #[test]
    fn aromatic_carbon_benzene() {
        let mol = parse("c1ccccc1");
        for i in 0..6 {
            let atom = mol.atom(n(i));
            assert!(atom.is_aromatic);
            assert_eq!(atom.hydrogen_count, 1, "atom {i} should have 1 H");
        }
    }

    #[test]
    fn hypervalent_sulfur_picks_next_valence() {
        let mol = parse("CS(=O)(=O)C");
        assert_eq!(mol.atom(n(1)).hydrogen_count, 0);
    }

    #[test]
    fn chirality_matches_reference_order_when_written_in_it() {
        // written F, Cl, Br == reference order, so the tag is unchanged
        let mol = parse("F[C@](Cl)(Br)I");
        assert_eq!(mol.atom(n(1)).chirality, Chirality::Ccw);
    }

    #[test]
    fn swapping_two_neighbours_inverts_the_stored_tag() {
        let a = parse("F[C@](Cl)(Br)I");
        let b = parse("F[C@](Br)(Cl)I");
        // same tag in text, atoms 2 and 3 swapped element: mirror images
        assert_eq!(a.atom(n(1)).chirality, b.atom(n(1)).chirality);
        assert_eq!(a.atom(n(2)).atomic_num, b.atom(n(3)).atomic_num);
    }

    #[test]
    fn implicit_h_follows_preceding_atom() {
        // written: F, H, Cl, Br. Reference: H, F, Cl, Br. One transposition.
        let mol = parse("F[C@H](Cl)Br");
        assert_eq!(mol.atom(n(1)).chirality, Chirality::Cw);
    }

    #[test]
    fn leading_implicit_h() {
        // written: H, F, Cl, Br == reference order
        let mol = parse("[C@H](F)(Cl)Br");
        assert_eq!(mol.atom(n(0)).chirality, Chirality::Ccw);
    }

    #[test]
    fn trans_and_cis_from_directional_bonds() {
        let trans = parse("F/C=C/F");
        let cis = parse("F/C=C\\F");
        let branch_cis = parse("C(/F)=C/F");
        let e = trans.bond_between(n(1), n(2)).unwrap();
        assert!(matches!(trans.bond(e).stereo, BondStereo::Trans(_, _)));
        let e = cis.bond_between(n(1), n(2)).unwrap();
        assert!(matches!(cis.bond(e).stereo, BondStereo::Cis(_, _)));
        let e = branch_cis.bond_between(n(0), n(2)).unwrap();
        assert!(matches!(branch_cis.bond(e).stereo, BondStereo::Cis(_, _)));
    }

    #[test]
    fn stereo_refs_follow_bond_endpoint_order() {
        let mol = parse("F/C=C/Cl");
        let e = mol.bond_between(n(1), n(2)).unwrap();
        let (a, _) = mol.bond_endpoints(e).unwrap();
        let (ra, rb, _) = mol.bond(e).stereo.refs().unwrap();
        assert!(mol.bond_between(a, ra).is_some());
        assert_ne!(ra, rb);
    }
}
