//! Hückel aromaticity perception over the symmetrized SSSR.
//!
//! Every ring is scored by summing per-atom π-electron contributions; a ring
//! with 4n+2 electrons marks its atoms and bonds aromatic. Two rings that
//! share exactly one bond are also scored as a single envelope, which picks
//! up systems such as azulene whose rings fail on their own.

use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder};
use crate::mol::Mol;
use crate::rings::RingInfo;

const SP2_CAPABLE: [u8; 9] = [
    5,  // B
    6,  // C
    7,  // N
    8,  // O
    15, // P
    16, // S
    33, // As
    34, // Se
    52, // Te
];

/// Recomputes the aromatic flags of every atom and bond from the Kekulé
/// bond orders. Flags set before the call are discarded.
pub fn perceive_aromaticity(mol: &mut Mol<Atom, Bond>, rings: &RingInfo) {
    let mut atom_flags = vec![false; mol.atom_count()];
    let mut bond_flags = vec![false; mol.bond_count()];

    let mut mark = |mol: &Mol<Atom, Bond>, ring: &[NodeIndex]| {
        for (i, &a) in ring.iter().enumerate() {
            atom_flags[a.index()] = true;
            let b = ring[(i + 1) % ring.len()];
            if let Some(e) = mol.bond_between(a, b) {
                bond_flags[e.index()] = true;
            }
        }
    };

    let all = rings.rings();
    for ring in all {
        if ring_is_aromatic(mol, rings, ring) {
            mark(mol, ring);
        }
    }

    for (i, r1) in all.iter().enumerate() {
        for r2 in &all[i + 1..] {
            let shared: Vec<NodeIndex> = r1.iter().copied().filter(|a| r2.contains(a)).collect();
            if shared.len() != 2 || mol.bond_between(shared[0], shared[1]).is_none() {
                continue;
            }
            let mut envelope: Vec<NodeIndex> = r1.clone();
            envelope.extend(r2.iter().copied().filter(|a| !shared.contains(a)));
            if ring_is_aromatic(mol, rings, &envelope) {
                mark(mol, r1);
                mark(mol, r2);
            }
        }
    }

    for node in mol.atoms().collect::<Vec<_>>() {
        mol.atom_mut(node).is_aromatic = atom_flags[node.index()];
    }
    for edge in mol.bonds().collect::<Vec<_>>() {
        mol.bond_mut(edge).is_aromatic = bond_flags[edge.index()];
    }
}

/// Scores a set of ring atoms. The atoms need not be in cyclic order.
fn ring_is_aromatic(mol: &Mol<Atom, Bond>, rings: &RingInfo, atoms: &[NodeIndex]) -> bool {
    if atoms.len() < 3 {
        return false;
    }
    if atoms
        .iter()
        .any(|&a| !SP2_CAPABLE.contains(&mol.atom(a).atomic_num))
    {
        return false;
    }
    let has_ring_triple = atoms.iter().any(|&a| {
        mol.neighbors(a).any(|w| {
            atoms.contains(&w)
                && mol
                    .bond_between(a, w)
                    .is_some_and(|e| mol.bond(e).order == BondOrder::Triple)
        })
    });
    if has_ring_triple {
        return false;
    }

    let mut total: u8 = 0;
    for &a in atoms {
        match pi_electrons(mol, rings, a) {
            Some(e) => total = total.saturating_add(e),
            None => return false,
        }
    }
    is_huckel(total)
}

/// π electrons the atom donates to a ring it belongs to, or `None` when the
/// atom cannot take part in an aromatic system.
fn pi_electrons(mol: &Mol<Atom, Bond>, rings: &RingInfo, idx: NodeIndex) -> Option<u8> {
    let atom = mol.atom(idx);
    let charge = atom.formal_charge;
    let total_degree = mol.degree(idx) + atom.hydrogen_count as usize;

    let doubles: Vec<NodeIndex> = mol
        .neighbors(idx)
        .filter(|&w| {
            mol.bond_between(idx, w)
                .is_some_and(|e| mol.bond(e).order == BondOrder::Double)
        })
        .collect();

    match doubles.as_slice() {
        [] => {}
        [w] if rings.is_ring_bond(mol, idx, *w) => return Some(1),
        [w] => {
            // exocyclic double bond
            let partner = mol.atom(*w).atomic_num;
            return match atom.atomic_num {
                6 if matches!(partner, 7 | 8 | 16) => Some(0),
                _ => None,
            };
        }
        _ => return None,
    }

    match (atom.atomic_num, charge) {
        (6, -1) => Some(2),
        (6, 1) => Some(0),
        (7, 0) | (15, 0) | (33, 0) if total_degree <= 3 => Some(2),
        (7, -1) => Some(2),
        (8, 0) | (16, 0) | (34, 0) | (52, 0) if total_degree <= 2 => Some(2),
        (5, 0) if total_degree <= 3 => Some(0),
        _ => None,
    }
}

fn is_huckel(pi_electrons: u8) -> bool {
    pi_electrons >= 2 && (pi_electrons - 2).is_multiple_of(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn perceived(s: &str) -> Mol<Atom, Bond> {
        let mut mol = from_smiles(s).unwrap();
        let rings = RingInfo::symmetrized_sssr(&mol);
        perceive_aromaticity(&mut mol, &rings);
        mol
    }

    fn aromatic_atoms(mol: &Mol<Atom, Bond>) -> usize {
        mol.atoms().filter(|&a| mol.atom(a).is_aromatic).count()
    }

    fn aromatic_bonds(mol: &Mol<Atom, Bond>) -> usize {
        mol.bonds().filter(|&e| mol.bond(e).is_aromatic).count()
    }

    #[test]
    fn kekule_benzene() {
        let mol = perceived("C1=CC=CC=C1");
        assert_eq!(aromatic_atoms(&mol), 6);
        assert_eq!(aromatic_bonds(&mol), 6);
    }

    #[test]
    fn heterocycles() {
        for (s, atoms) in [
            ("C1=CC=NC=C1", 6),
            ("N1C=CC=C1", 5),
            ("O1C=CC=C1", 5),
            ("S1C=CC=C1", 5),
            ("C1=CC2=CC=CC=C2C=C1", 10),
            ("C1=CC=C2C(=C1)C=CN2", 9),
            ("[CH-]1C=CC=C1", 5),
            ("O=C1C=CC=CN1", 6),
        ] {
            assert_eq!(aromatic_atoms(&perceived(s)), atoms, "{s}");
        }
    }

    #[test]
    fn non_aromatic_rings() {
        for s in [
            "C1CCCCC1",
            "C1=CCC=C1",
            "C1=CC=CC=CC=C1",
            "O=C1C=CC(=O)C=C1",
            "C=C1C=CC=C1",
        ] {
            assert_eq!(aromatic_atoms(&perceived(s)), 0, "{s}");
        }
    }

    #[test]
    fn substituents_stay_aliphatic() {
        let mol = perceived("OC1=CC=CC=C1");
        assert!(!mol.atom(NodeIndex::new(0)).is_aromatic);
        assert_eq!(aromatic_atoms(&mol), 6);
        assert_eq!(aromatic_bonds(&mol), 6);
    }

    #[test]
    fn azulene_via_envelope() {
        let mol = perceived("C1=CC2=CC=CC=CC2=C1");
        assert_eq!(aromatic_atoms(&mol), 10);
        assert_eq!(aromatic_bonds(&mol), 11);
    }

    #[test]
    fn flags_are_recomputed() {
        let mut mol = from_smiles("C1CCCCC1").unwrap();
        for a in mol.atoms().collect::<Vec<_>>() {
            mol.atom_mut(a).is_aromatic = true;
        }
        let rings = RingInfo::symmetrized_sssr(&mol);
        perceive_aromaticity(&mut mol, &rings);
        assert_eq!(aromatic_atoms(&mol), 0);
    }

    #[test]
    fn huckel_rule() {
        assert!(is_huckel(2));
        assert!(is_huckel(6));
        assert!(is_huckel(10));
        assert!(!is_huckel(4));
        assert!(!is_huckel(8));
        assert!(!is_huckel(0));
    }
}
