use petgraph::graph::NodeIndex;

use crate::atom::Atom;
use crate::mol::{permutation_parity, remap_stereo, AtomId, Mol};
use crate::traits::HasBondStereo;

/// Connected components, each sorted by atom index, in order of their lowest
/// atom.
pub fn connected_components<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for node in mol.atoms() {
        if visited[node.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(current);
            for neighbor in mol.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenumberError {
    LengthMismatch { expected: usize, got: usize },
    InvalidPermutation,
}

impl std::fmt::Display for RenumberError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, got } => {
                write!(f, "new_order length {got} != atom count {expected}")
            }
            Self::InvalidPermutation => write!(f, "new_order is not a valid permutation"),
        }
    }
}

impl std::error::Error for RenumberError {}

fn validate_permutation(new_order: &[usize], n: usize) -> Result<(), RenumberError> {
    if new_order.len() != n {
        return Err(RenumberError::LengthMismatch {
            expected: n,
            got: new_order.len(),
        });
    }
    let mut seen = vec![false; n];
    for &idx in new_order {
        if idx >= n || seen[idx] {
            return Err(RenumberError::InvalidPermutation);
        }
        seen[idx] = true;
    }
    Ok(())
}

/// Rebuilds the molecule with atom `new_order[i]` placed at index `i`.
///
/// Bonds are re-added in their original order. Chirality tags are re-expressed
/// against the new reference order and double-bond references are remapped,
/// so the result describes the same stereoisomer.
pub fn renumber_atoms<B: HasBondStereo + Clone>(
    mol: &Mol<Atom, B>,
    new_order: &[usize],
) -> Result<Mol<Atom, B>, RenumberError> {
    let n = mol.atom_count();
    validate_permutation(new_order, n)?;

    let mut new_mol = Mol::new();
    for &old_idx in new_order {
        new_mol.add_atom(mol.atom(NodeIndex::new(old_idx)).clone());
    }

    let mut old_to_new = vec![NodeIndex::new(0); n];
    for (new_idx, &old_idx) in new_order.iter().enumerate() {
        old_to_new[old_idx] = NodeIndex::new(new_idx);
    }

    for edge in mol.bonds() {
        let Some((a, b)) = mol.bond_endpoints(edge) else {
            continue;
        };
        let mut bond = mol.bond(edge).clone();
        let stereo = remap_stereo(bond.bond_stereo(), |x| Some(old_to_new[x.index()]));
        *bond.bond_stereo_mut() = stereo;
        new_mol.add_bond(old_to_new[a.index()], old_to_new[b.index()], bond);
    }

    for old in mol.atoms() {
        let new = old_to_new[old.index()];
        let moved: Vec<AtomId> = mol
            .stereo_neighbors(old)
            .into_iter()
            .map(|id| match id {
                AtomId::Node(w) => AtomId::Node(old_to_new[w.index()]),
                AtomId::ImplicitH(_) => AtomId::ImplicitH(new),
            })
            .collect();
        let even = permutation_parity(&moved, &new_mol.stereo_neighbors(new));
        let atom = new_mol.atom_mut(new);
        atom.chirality = atom.chirality.permuted(even);
    }

    Ok(new_mol)
}
