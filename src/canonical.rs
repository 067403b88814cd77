//! Canonical atom ranking.
//!
//! Ranks start from hashed atom invariants and are refined by Morgan-style
//! neighbour propagation, then by tetrahedral and double-bond stereo. Any
//! remaining ties are broken by promoting one tied atom at a time and keeping
//! the promotion whose invariant trace sorts first, which does not depend on
//! the input numbering.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder, BondStereo};
use crate::mol::{permutation_parity, AtomId, Mol};
use crate::rings::RingInfo;

struct Fnv1aHasher(u64);

impl Fnv1aHasher {
    fn new() -> Self {
        Self(0xcbf29ce484222325)
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

fn fnv<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut h = Fnv1aHasher::new();
    value.hash(&mut h);
    h.finish()
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct AtomInvariant {
    atomic_num: u8,
    degree: u8,
    hydrogen_count: u8,
    formal_charge: i8,
    is_aromatic: bool,
    isotope: u16,
    singles: u8,
    doubles: u8,
    triples: u8,
    aromatic_bonds: u8,
}

fn atom_invariant(mol: &Mol<Atom, Bond>, idx: NodeIndex) -> AtomInvariant {
    let atom = mol.atom(idx);
    let mut inv = AtomInvariant {
        atomic_num: atom.atomic_num,
        degree: mol.degree(idx) as u8,
        hydrogen_count: atom.hydrogen_count,
        formal_charge: atom.formal_charge,
        is_aromatic: atom.is_aromatic,
        isotope: atom.isotope,
        singles: 0,
        doubles: 0,
        triples: 0,
        aromatic_bonds: 0,
    };
    for edge in mol.bonds_of(idx) {
        let bond = mol.bond(edge);
        if bond.is_aromatic {
            inv.aromatic_bonds += 1;
            continue;
        }
        match bond.order {
            BondOrder::Single => inv.singles += 1,
            BondOrder::Double => inv.doubles += 1,
            BondOrder::Triple => inv.triples += 1,
        }
    }
    inv
}

fn ranks_from_values<T: Ord>(values: &[T]) -> Vec<usize> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].cmp(&values[b]));
    let mut ranks = vec![0usize; n];
    for i in 1..n {
        ranks[indices[i]] = if values[indices[i]] == values[indices[i - 1]] {
            ranks[indices[i - 1]]
        } else {
            i
        };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted: Vec<usize> = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn morgan_refine(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>) {
    let mut prev_distinct = count_distinct(ranks);
    loop {
        let values: Vec<(usize, Vec<usize>)> = mol
            .atoms()
            .map(|node| {
                let mut nb: Vec<usize> = mol.neighbors(node).map(|w| ranks[w.index()]).collect();
                nb.sort_unstable();
                (ranks[node.index()], nb)
            })
            .collect();
        let new_ranks = ranks_from_values(&values);
        let distinct = count_distinct(&new_ranks);
        if distinct <= prev_distinct {
            return;
        }
        *ranks = new_ranks;
        prev_distinct = distinct;
    }
}

/// Chirality of `idx` re-expressed against its neighbours sorted by rank.
/// `None` when the neighbour ranks are tied and no order can be fixed.
fn ranked_chirality(mol: &Mol<Atom, Bond>, idx: NodeIndex, ranks: &[usize]) -> Option<Chirality> {
    let chirality = mol.atom(idx).chirality;
    if chirality == Chirality::None {
        return None;
    }
    let n = mol.atom_count();
    let seq: Vec<usize> = mol
        .stereo_neighbors(idx)
        .into_iter()
        .map(|id| match id {
            AtomId::Node(w) => ranks[w.index()],
            AtomId::ImplicitH(_) => n,
        })
        .collect();
    let mut sorted = seq.clone();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return None;
    }
    Some(chirality.permuted(permutation_parity(&seq, &sorted)))
}

/// `Some(trans)` for a stereo double bond, measured between the highest-ranked
/// substituent on each end.
fn ranked_ez(mol: &Mol<Atom, Bond>, a: NodeIndex, b: NodeIndex, ranks: &[usize]) -> Option<bool> {
    let edge = mol.bond_between(a, b)?;
    let (first, _) = mol.bond_endpoints(edge)?;
    let (x, y, trans) = mol.bond(edge).stereo.refs()?;
    let (ref_a, ref_b) = if first == a { (x, y) } else { (y, x) };

    let top = |end: NodeIndex, other: NodeIndex| -> Option<NodeIndex> {
        let mut subs: Vec<NodeIndex> = mol.neighbors(end).filter(|&w| w != other).collect();
        subs.sort_by_key(|w| std::cmp::Reverse(ranks[w.index()]));
        match subs.as_slice() {
            [only] => Some(*only),
            [hi, next, ..] if ranks[hi.index()] != ranks[next.index()] => Some(*hi),
            _ => None,
        }
    };
    let top_a = top(a, b)?;
    let top_b = top(b, a)?;
    let flips = (top_a != ref_a) as u8 + (top_b != ref_b) as u8;
    Some(trans ^ (flips == 1))
}

fn stereo_refine(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>) {
    let mut values: Vec<(usize, u8)> = ranks.iter().map(|&r| (r, 0)).collect();
    let mut any = false;
    for node in mol.atoms() {
        match ranked_chirality(mol, node, ranks) {
            Some(Chirality::Cw) => values[node.index()].1 = 1,
            Some(Chirality::Ccw) => values[node.index()].1 = 2,
            _ => continue,
        }
        any = true;
    }
    for edge in mol.bonds() {
        let Some((a, b)) = mol.bond_endpoints(edge) else {
            continue;
        };
        if let Some(trans) = ranked_ez(mol, a, b, ranks) {
            let tag = if trans { 3 } else { 4 };
            values[a.index()].1 = values[a.index()].1.max(tag);
            values[b.index()].1 = values[b.index()].1.max(tag);
            any = true;
        }
    }
    if any {
        *ranks = ranks_from_values(&values);
    }
}

fn refine(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>) {
    morgan_refine(mol, ranks);
    loop {
        let prev = count_distinct(ranks);
        stereo_refine(mol, ranks);
        morgan_refine(mol, ranks);
        if count_distinct(ranks) <= prev {
            break;
        }
    }
}

fn initial_ranks(mol: &Mol<Atom, Bond>) -> (Vec<AtomInvariant>, Vec<usize>) {
    let invariants: Vec<AtomInvariant> = mol.atoms().map(|i| atom_invariant(mol, i)).collect();
    let hashes: Vec<u64> = invariants.iter().map(fnv).collect();
    let ranks = ranks_from_values(&hashes);
    (invariants, ranks)
}

/// Topological equivalence classes, ignoring stereo. Atoms with equal values
/// are interchangeable by a graph automorphism (up to refinement strength).
pub fn symmetry_classes(mol: &Mol<Atom, Bond>) -> Vec<usize> {
    let (_, mut ranks) = initial_ranks(mol);
    morgan_refine(mol, &mut ranks);
    ranks
}

/// Canonical rank of every atom, a permutation of `0..n`.
pub fn canonical_ordering(mol: &Mol<Atom, Bond>) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let (invariants, mut ranks) = initial_ranks(mol);
    refine(mol, &mut ranks);
    if count_distinct(&ranks) < n {
        break_ties(mol, &mut ranks, &invariants);
    }
    ranks_from_values(&ranks)
}

fn break_ties(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>, invariants: &[AtomInvariant]) {
    let n = ranks.len();
    while count_distinct(ranks) < n {
        let Some(tied_rank) = find_best_tied_rank(mol, ranks) else {
            return;
        };
        let tied_atoms: Vec<usize> = (0..n).filter(|&i| ranks[i] == tied_rank).collect();

        let mut best: Option<(Vec<u64>, Vec<usize>)> = None;
        for &candidate in &tied_atoms {
            let mut trial = ranks.clone();
            // Ranks are positions in a sorted list, so `n` sorts after all of them.
            trial[candidate] = n;
            refine(mol, &mut trial);
            let trace = invariant_trace(mol, &trial, invariants);
            if best.as_ref().is_none_or(|(t, _)| trace < *t) {
                best = Some((trace, trial));
            }
        }
        match best {
            Some((_, trial)) => *ranks = ranks_from_values(&trial),
            None => return,
        }
    }
}

fn invariant_trace(mol: &Mol<Atom, Bond>, ranks: &[usize], invariants: &[AtomInvariant]) -> Vec<u64> {
    let mut order: Vec<usize> = (0..ranks.len()).collect();
    order.sort_by_key(|&i| ranks[i]);
    order
        .into_iter()
        .map(|i| {
            let node = NodeIndex::new(i);
            let mut h = Fnv1aHasher::new();
            invariants[i].hash(&mut h);
            let mut nb: Vec<usize> = mol.neighbors(node).map(|w| ranks[w.index()]).collect();
            nb.sort_unstable();
            nb.hash(&mut h);
            ranked_chirality(mol, node, ranks).hash(&mut h);
            for w in mol.sorted_neighbors(node) {
                ranked_ez(mol, node, w, ranks).hash(&mut h);
            }
            h.finish()
        })
        .collect()
}

/// Prefer tied classes without stereocentres so that stereo refinement can
/// use the resolved neighbourhood.
fn find_best_tied_rank(mol: &Mol<Atom, Bond>, ranks: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &r in ranks {
        *counts.entry(r).or_insert(0) += 1;
    }
    let has_stereo = |r: usize| {
        mol.atoms()
            .any(|a| ranks[a.index()] == r && mol.atom(a).chirality != Chirality::None)
    };
    let tied = || counts.iter().filter(|&(_, &c)| c > 1).map(|(&r, _)| r);
    tied().filter(|&r| !has_stereo(r)).min().or_else(|| tied().min())
}

/// Drops tetrahedral and double-bond descriptors that do not describe a real
/// stereo element.
///
/// A tetrahedral centre needs at least three distinct references and at most
/// one hydrogen. Topologically equivalent neighbours void it unless the atom
/// sits in a ring that carries another stereocentre (the cis/trans ring case).
/// A double bond loses its stereo when either end has no substituent or two
/// equivalent ones, or when it sits in a ring smaller than eight atoms.
pub fn clear_nonstereo(mol: &mut Mol<Atom, Bond>, rings: &RingInfo) {
    for node in mol.atoms().collect::<Vec<_>>() {
        let atom = mol.atom(node);
        if atom.chirality == Chirality::None {
            continue;
        }
        let refs = mol.stereo_neighbors(node).len();
        if !(3..=4).contains(&refs) || atom.hydrogen_count > 1 {
            mol.atom_mut(node).chirality = Chirality::None;
        }
    }

    let classes = symmetry_classes(mol);
    let tied = |subs: &[NodeIndex]| {
        let mut c: Vec<usize> = subs.iter().map(|w| classes[w.index()]).collect();
        c.sort_unstable();
        c.windows(2).any(|w| w[0] == w[1])
    };

    let voided: Vec<NodeIndex> = mol
        .atoms()
        .filter(|&node| mol.atom(node).chirality != Chirality::None)
        .filter(|&node| tied(&mol.sorted_neighbors(node)))
        .filter(|&node| {
            !rings.atom_rings(node).any(|ring| {
                ring.iter()
                    .any(|&o| o != node && mol.atom(o).chirality != Chirality::None)
            })
        })
        .collect();
    for node in voided {
        mol.atom_mut(node).chirality = Chirality::None;
    }

    for edge in mol.bonds().collect::<Vec<_>>() {
        if mol.bond(edge).stereo == BondStereo::None {
            continue;
        }
        let Some((a, b)) = mol.bond_endpoints(edge) else {
            continue;
        };
        let bond = mol.bond(edge);
        let end_ok = |end: NodeIndex, other: NodeIndex| {
            let subs: Vec<NodeIndex> = mol.neighbors(end).filter(|&w| w != other).collect();
            !subs.is_empty() && !tied(&subs)
        };
        let in_small_ring = rings
            .rings()
            .iter()
            .any(|r| r.len() < 8 && r.contains(&a) && r.contains(&b));
        let keep = bond.order == BondOrder::Double
            && !bond.is_aromatic
            && !in_small_ring
            && end_ok(a, b)
            && end_ok(b, a);
        if !keep {
            mol.bond_mut(edge).stereo = BondStereo::None;
        }
    }
}
