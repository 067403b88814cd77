use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::BondStereo;
use crate::mol::{permutation_parity, AtomId, Mol};
use crate::traits::HasBondStereo;

/// Explicit hydrogens that can be folded into their neighbour's count: plain
/// `[H]` atoms with a single heavy-atom neighbour.
fn foldable_hydrogens<B>(mol: &Mol<Atom, B>) -> Vec<Option<NodeIndex>> {
    mol.atoms()
        .map(|idx| {
            let atom = mol.atom(idx);
            if atom.atomic_num != 1
                || atom.isotope != 0
                || atom.formal_charge != 0
                || atom.hydrogen_count != 0
            {
                return None;
            }
            let mut neighbors = mol.neighbors(idx);
            let (Some(parent), None) = (neighbors.next(), neighbors.next()) else {
                return None;
            };
            (mol.atom(parent).atomic_num != 1).then_some(parent)
        })
        .collect()
}

/// Removes explicit hydrogen atoms, adding them to the hydrogen count of the
/// atom they were bonded to.
///
/// A tetrahedral centre that loses exactly one explicit hydrogen keeps its
/// configuration with the hydrogen now implicit. A double bond whose stereo
/// reference was a removed hydrogen switches to the other substituent on that
/// end, or loses its stereo when there is none.
pub fn remove_hs<B: HasBondStereo + Clone>(mol: &Mol<Atom, B>) -> Mol<Atom, B> {
    let parent_of = foldable_hydrogens(mol);
    if parent_of.iter().all(Option::is_none) {
        return mol.clone();
    }

    let keep: Vec<bool> = parent_of.iter().map(Option::is_none).collect();
    let (mut result, remap) = mol.induced_subgraph(&keep);

    let mut extra_h = vec![0u8; mol.atom_count()];
    for parent in parent_of.iter().flatten() {
        extra_h[parent.index()] += 1;
    }

    for old in mol.atoms() {
        let Some(new) = remap[old.index()] else {
            continue;
        };
        let added = extra_h[old.index()];
        if added == 0 {
            continue;
        }
        let before = mol.atom(old);
        let chirality = if before.chirality == Chirality::None {
            Chirality::None
        } else if before.hydrogen_count + added > 1 {
            Chirality::None
        } else {
            let moved: Vec<AtomId> = mol
                .stereo_neighbors(old)
                .into_iter()
                .map(|id| match id {
                    AtomId::Node(w) => remap[w.index()].map_or(AtomId::ImplicitH(new), AtomId::Node),
                    AtomId::ImplicitH(_) => AtomId::ImplicitH(new),
                })
                .collect();
            result.atom_mut(new).hydrogen_count = before.hydrogen_count + added;
            let even = permutation_parity(&moved, &result.stereo_neighbors(new));
            before.chirality.permuted(even)
        };
        let atom = result.atom_mut(new);
        atom.hydrogen_count = before.hydrogen_count + added;
        atom.chirality = chirality;
    }

    for edge in result.bonds().collect::<Vec<_>>() {
        let Some((x, y, trans)) = result.bond(edge).bond_stereo().refs() else {
            continue;
        };
        let Some((a, b)) = result.bond_endpoints(edge) else {
            continue;
        };
        let stereo = match (
            replacement_ref(mol, &remap, &result, a, b, x),
            replacement_ref(mol, &remap, &result, b, a, y),
        ) {
            (Some((nx, fx)), Some((ny, fy))) => BondStereo::from_refs(nx, ny, trans ^ fx ^ fy),
            _ => BondStereo::None,
        };
        *result.bond_mut(edge).bond_stereo_mut() = stereo;
    }

    result
}

/// Maps an old stereo reference into the folded molecule. Returns the new
/// reference and whether it sits on the opposite side of the old one.
fn replacement_ref<B>(
    old_mol: &Mol<Atom, B>,
    remap: &[Option<NodeIndex>],
    new_mol: &Mol<Atom, B>,
    end: NodeIndex,
    other: NodeIndex,
    old_ref: NodeIndex,
) -> Option<(NodeIndex, bool)> {
    if old_ref.index() >= old_mol.atom_count() {
        return None;
    }
    if let Some(r) = remap[old_ref.index()] {
        return Some((r, false));
    }
    new_mol
        .sorted_neighbors(end)
        .into_iter()
        .find(|&w| w != other)
        .map(|w| (w, true))
}
