//! Kekulization assigns alternating single and double bonds to aromatic ring systems.
//!
//! The input is a `Mol<Atom, SmilesBond>` whose aromatic bonds come from
//! lowercase SMILES atoms or from a reaction product that kept aromatic
//! bonds. The output is a `Mol<Atom, Bond>` with concrete single/double
//! bonds. Atoms that need a double bond are paired up by augmenting-path
//! matching over aromatic bonds, with a bounded exhaustive search for the
//! odd-cycle cases greedy augmentation misses.

use std::collections::{HashSet, VecDeque};
use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;

use crate::atom::Atom;
use crate::bond::{Bond, BondOrder, SmilesBond, SmilesBondOrder};
use crate::element::Element;
use crate::mol::Mol;

const SEARCH_LIMIT: usize = 100_000;

/// Error returned when no valid Kekulé structure exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KekulizeError {
    /// The given atoms could not be assigned a double bond.
    #[error("cannot kekulize aromatic system: unmatched atoms [{}]", join_indices(.0))]
    Unkekulizable(Vec<NodeIndex>),
}

fn join_indices(atoms: &[NodeIndex]) -> String {
    atoms
        .iter()
        .map(|idx| idx.index().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

type AromaticAdjacency = Vec<Vec<(NodeIndex, EdgeIndex)>>;

/// Convert a molecule with aromatic bonds into one with explicit Kekulé bonds.
///
/// Every atom that needs a double bond receives exactly one. Aromatic input
/// bonds keep `is_aromatic = true` until perception runs again. Atom indices,
/// chirality and double-bond stereo are carried over unchanged.
pub fn kekulize(mol: Mol<Atom, SmilesBond>) -> Result<Mol<Atom, Bond>, KekulizeError> {
    let n = mol.atom_count();
    let mut aromatic_adj: AromaticAdjacency = vec![vec![]; n];
    for e in mol.bonds() {
        if mol.bond(e).order != SmilesBondOrder::Aromatic {
            continue;
        }
        if let Some((a, b)) = mol.bond_endpoints(e) {
            aromatic_adj[a.index()].push((b, e));
            aromatic_adj[b.index()].push((a, e));
        }
    }

    let needs_double: Vec<bool> = mol
        .atoms()
        .map(|node| !aromatic_adj[node.index()].is_empty() && needs_double_bond(&mol, node))
        .collect();

    let mut matched_edge: Vec<Option<EdgeIndex>> = vec![None; n];
    for component in aromatic_components(&mol, &aromatic_adj) {
        let candidates: Vec<NodeIndex> = component
            .into_iter()
            .filter(|&v| needs_double[v.index()])
            .collect();

        for &start in &candidates {
            if matched_edge[start.index()].is_none() {
                augment(&mol, &aromatic_adj, &needs_double, &mut matched_edge, start);
            }
        }

        if candidates.iter().any(|&v| matched_edge[v.index()].is_none()) {
            for &v in &candidates {
                matched_edge[v.index()] = None;
            }
            let mut budget = SEARCH_LIMIT;
            if !exhaustive_match(
                &mol,
                &aromatic_adj,
                &needs_double,
                &mut matched_edge,
                &candidates,
                &mut budget,
            ) {
                let unmatched = candidates
                    .iter()
                    .copied()
                    .filter(|&v| matched_edge[v.index()].is_none())
                    .collect();
                return Err(KekulizeError::Unkekulizable(unmatched));
            }
        }
    }

    let doubles: HashSet<EdgeIndex> = matched_edge.iter().filter_map(|e| *e).collect();
    Ok(mol.map(
        |_, atom| atom.clone(),
        |edge, bond| {
            let (order, is_aromatic) = match bond.order {
                SmilesBondOrder::Aromatic if doubles.contains(&edge) => (BondOrder::Double, true),
                SmilesBondOrder::Aromatic => (BondOrder::Single, true),
                SmilesBondOrder::Implicit | SmilesBondOrder::Single => (BondOrder::Single, false),
                SmilesBondOrder::Double => (BondOrder::Double, false),
                SmilesBondOrder::Triple => (BondOrder::Triple, false),
            };
            Bond {
                order,
                is_aromatic,
                stereo: bond.stereo,
            }
        },
    ))
}

/// An aromatic atom needs a double bond when exactly one unit of valence is
/// missing. A bare charged atom two short (`[n+]` with no H) also takes one.
fn needs_double_bond(mol: &Mol<Atom, SmilesBond>, node: NodeIndex) -> bool {
    let atom = mol.atom(node);
    let Some(elem) = Element::from_atomic_num(atom.atomic_num) else {
        return false;
    };
    let used = crate::smiles::bond_order_sum(mol, node).saturating_add(atom.hydrogen_count);
    let Some(target) = elem
        .allowed_valences(atom.formal_charge)
        .iter()
        .copied()
        .find(|&v| v >= used)
    else {
        return false;
    };
    let gap = target - used;
    gap == 1 || (gap == 2 && atom.hydrogen_count == 0 && atom.formal_charge != 0)
}

fn aromatic_components(mol: &Mol<Atom, SmilesBond>, adj: &AromaticAdjacency) -> Vec<Vec<NodeIndex>> {
    let mut seen = vec![false; mol.atom_count()];
    let mut components = Vec::new();
    for node in mol.atoms() {
        if adj[node.index()].is_empty() || seen[node.index()] {
            continue;
        }
        let mut stack = vec![node];
        let mut comp = Vec::new();
        seen[node.index()] = true;
        while let Some(v) = stack.pop() {
            comp.push(v);
            for &(w, _) in &adj[v.index()] {
                if !seen[w.index()] {
                    seen[w.index()] = true;
                    stack.push(w);
                }
            }
        }
        comp.sort_unstable();
        components.push(comp);
    }
    components
}

fn augment(
    mol: &Mol<Atom, SmilesBond>,
    adj: &AromaticAdjacency,
    needs_double: &[bool],
    matched_edge: &mut [Option<EdgeIndex>],
    start: NodeIndex,
) -> bool {
    let n = mol.atom_count();
    let mut prev: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::from([start]);
    visited[start.index()] = true;

    while let Some(u) = queue.pop_front() {
        for &(v, e) in &adj[u.index()] {
            if !needs_double[v.index()] || visited[v.index()] || Some(e) == matched_edge[u.index()] {
                continue;
            }
            visited[v.index()] = true;
            prev[v.index()] = Some((u, e));

            let Some(matched_e) = matched_edge[v.index()] else {
                flip_path(matched_edge, &prev, start, v);
                return true;
            };
            let Some((ea, eb)) = mol.bond_endpoints(matched_e) else {
                continue;
            };
            let w = if ea == v { eb } else { ea };
            if !visited[w.index()] {
                visited[w.index()] = true;
                prev[w.index()] = Some((v, matched_e));
                queue.push_back(w);
            }
        }
    }
    false
}

fn flip_path(
    matched_edge: &mut [Option<EdgeIndex>],
    prev: &[Option<(NodeIndex, EdgeIndex)>],
    start: NodeIndex,
    end: NodeIndex,
) {
    let mut cur = end;
    let mut is_new_match = true;
    while cur != start {
        let Some((p, e)) = prev[cur.index()] else {
            return;
        };
        if is_new_match {
            matched_edge[cur.index()] = Some(e);
            matched_edge[p.index()] = Some(e);
        }
        is_new_match = !is_new_match;
        cur = p;
    }
}

/// Depth-first perfect matching over the candidates, most constrained atom
/// first. Gives up after `budget` steps.
fn exhaustive_match(
    mol: &Mol<Atom, SmilesBond>,
    adj: &AromaticAdjacency,
    needs_double: &[bool],
    matched_edge: &mut [Option<EdgeIndex>],
    candidates: &[NodeIndex],
    budget: &mut usize,
) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    let options = |v: NodeIndex, matched: &[Option<EdgeIndex>]| -> Vec<(NodeIndex, EdgeIndex)> {
        adj[v.index()]
            .iter()
            .copied()
            .filter(|&(w, _)| needs_double[w.index()] && matched[w.index()].is_none())
            .collect()
    };

    let next = candidates
        .iter()
        .copied()
        .filter(|&v| matched_edge[v.index()].is_none())
        .min_by_key(|&v| options(v, matched_edge).len());
    let Some(v) = next else {
        return true;
    };

    for (w, e) in options(v, matched_edge) {
        matched_edge[v.index()] = Some(e);
        matched_edge[w.index()] = Some(e);
        if exhaustive_match(mol, adj, needs_double, matched_edge, candidates, budget) {
            return true;
        }
        matched_edge[v.index()] = None;
        matched_edge[w.index()] = None;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn kek(s: &str) -> Result<Mol<Atom, Bond>, KekulizeError> {
        kekulize(parse_smiles(s).unwrap())
    }

    fn count_double_bonds(mol: &Mol<Atom, Bond>) -> usize {
        mol.bonds()
            .filter(|&e| mol.bond(e).order == BondOrder::Double)
            .count()
    }

    fn at_most_one_double_per_aromatic_atom(mol: &Mol<Atom, Bond>) -> bool {
        mol.atoms().all(|node| {
            !mol.atom(node).is_aromatic
                || mol
                    .bonds_of(node)
                    .filter(|&e| mol.bond(e).order == BondOrder::Double)
                    .count()
                    <= 1
        })
    }

    #[test]
    fn benzene() {
        let mol = kek("c1ccccc1").unwrap();
        assert_eq!(count_double_bonds(&mol), 3);
        assert!(at_most_one_double_per_aromatic_atom(&mol));
        assert!(mol.bonds().all(|e| mol.bond(e).is_aromatic));
    }

    #[test]
    fn fused_systems() {
        assert_eq!(count_double_bonds(&kek("c1ccc2ccccc2c1").unwrap()), 5);
        assert_eq!(count_double_bonds(&kek("c1ccc2cc3ccccc3cc2c1").unwrap()), 7);
    }

    #[test]
    fn five_membered_heterocycles() {
        for s in ["[nH]1cccc1", "o1cccc1", "s1cccc1", "c1c[nH]cn1", "[cH-]1cccc1"] {
            assert_eq!(count_double_bonds(&kek(s).unwrap()), 2, "{s}");
        }
    }

    #[test]
    fn pyridine_and_pyridinium() {
        for s in ["c1ccncc1", "C[n+]1ccccc1", "c1cc[nH+]cc1", "[n+]1ccccc1"] {
            let mol = kek(s).unwrap();
            assert_eq!(count_double_bonds(&mol), 3, "{s}");
        }
    }

    #[test]
    fn indole() {
        let mol = kek("c1ccc2[nH]ccc2c1").unwrap();
        assert_eq!(count_double_bonds(&mol), 4);
        assert!(at_most_one_double_per_aromatic_atom(&mol));
    }

    #[test]
    fn pyridone_exocyclic_carbonyl() {
        let mol = kek("O=c1cccc[nH]1").unwrap();
        // C=O plus two ring doubles
        assert_eq!(count_double_bonds(&mol), 3);
    }

    #[test]
    fn odd_ring_unkekulizable() {
        assert!(matches!(kek("c1cccc1"), Err(KekulizeError::Unkekulizable(_))));
        assert!(kek("[c-]1cccc1").is_err());
    }

    #[test]
    fn non_aromatic_passthrough() {
        let mol = kek("C=CC").unwrap();
        assert_eq!(count_double_bonds(&mol), 1);
        assert!(mol.bonds().all(|e| !mol.bond(e).is_aromatic));
    }

    #[test]
    fn stereo_preserved() {
        let mol = kek("F/C=C/F").unwrap();
        let e = mol.bond_between(NodeIndex::new(1), NodeIndex::new(2)).unwrap();
        assert!(matches!(mol.bond(e).stereo, crate::bond::BondStereo::Trans(_, _)));
    }

    #[test]
    fn error_display() {
        let err = KekulizeError::Unkekulizable(vec![NodeIndex::new(0), NodeIndex::new(3)]);
        assert_eq!(
            err.to_string(),
            "cannot kekulize aromatic system: unmatched atoms [0, 3]"
        );
    }
}
