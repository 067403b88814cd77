//! Ring perception: smallest set of smallest rings and its symmetrized form.
//!
//! Candidates come from Horton's construction (one shortest-path cycle per
//! bond and pivot atom), ordered by size, and are accepted while they stay
//! linearly independent over GF(2) in edge space.

use std::collections::VecDeque;

use petgraph::algo::connected_components;
use petgraph::graph::NodeIndex;

use crate::mol::Mol;

#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
    // ring ids per atom, and per-bond ring membership, indexed by graph index
    atom_rings: Vec<Vec<usize>>,
    ring_bonds: Vec<bool>,
}

impl RingInfo {
    /// Smallest set of smallest rings. When several equally small rings are
    /// interchangeable the pick depends on atom numbering.
    pub fn sssr<A, B>(mol: &Mol<A, B>) -> Self {
        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return Self::from_rings(mol, Vec::new());
        }
        let candidates = horton_candidates(mol);
        let rings = select_independent_rings(&candidates, num_expected, mol);
        Self::from_rings(mol, rings)
    }

    /// SSSR plus every equally small Horton candidate that is a combination
    /// of already accepted rings. Independent of atom numbering, which makes
    /// it the basis for aromaticity and ring queries.
    pub fn symmetrized_sssr<A, B>(mol: &Mol<A, B>) -> Self {
        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return Self::from_rings(mol, Vec::new());
        }

        let num_edges = mol.bond_count();
        let candidates = horton_candidates(mol);

        let mut basis = CycleBasis::default();
        let mut accepted: Vec<Vec<u64>> = Vec::new();
        let mut largest_needed = 0;

        for ring in &candidates {
            let bv = ring_to_edge_bitvector(ring, num_edges, mol);
            if bv.iter().all(|&w| w == 0) || accepted.contains(&bv) {
                continue;
            }
            if basis.len() < num_expected {
                if basis.try_add(&bv) {
                    largest_needed = ring.len();
                    accepted.push(bv);
                }
            } else if ring.len() <= largest_needed && basis.spans(&bv) {
                accepted.push(bv);
            } else if ring.len() > largest_needed {
                break;
            }
        }

        let mut rings: Vec<Vec<NodeIndex>> = accepted
            .iter()
            .filter_map(|bv| bv_to_ring(bv, mol))
            .map(|r| normalize_ring(&r))
            .collect();
        rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        rings.dedup();
        Self::from_rings(mol, rings)
    }

    fn from_rings<A, B>(mol: &Mol<A, B>, rings: Vec<Vec<NodeIndex>>) -> Self {
        let mut atom_rings = vec![Vec::new(); mol.atom_count()];
        let mut ring_bonds = vec![false; mol.bond_count()];
        for (id, ring) in rings.iter().enumerate() {
            for (i, &atom) in ring.iter().enumerate() {
                atom_rings[atom.index()].push(id);
                let next = ring[(i + 1) % ring.len()];
                if let Some(edge) = mol.bond_between(atom, next) {
                    ring_bonds[edge.index()] = true;
                }
            }
        }
        Self {
            rings,
            atom_rings,
            ring_bonds,
        }
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.atom_rings
            .get(atom.index())
            .is_some_and(|ids| !ids.is_empty())
    }

    pub fn is_ring_bond<A, B>(&self, mol: &Mol<A, B>, a: NodeIndex, b: NodeIndex) -> bool {
        mol.bond_between(a, b)
            .and_then(|e| self.ring_bonds.get(e.index()).copied())
            .unwrap_or(false)
    }

    /// Number of rings the atom belongs to.
    pub fn ring_count(&self, atom: NodeIndex) -> usize {
        self.atom_rings.get(atom.index()).map_or(0, Vec::len)
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.atom_rings
            .get(atom.index())?
            .iter()
            .map(|&id| self.rings[id].len())
            .min()
    }

    pub fn atom_rings(&self, atom: NodeIndex) -> impl Iterator<Item = &[NodeIndex]> + '_ {
        self.atom_rings
            .get(atom.index())
            .into_iter()
            .flatten()
            .map(|&id| self.rings[id].as_slice())
    }

    /// Cyclomatic number: bonds - atoms + connected components.
    pub fn expected_ring_count<A, B>(mol: &Mol<A, B>) -> usize {
        let v = mol.atom_count();
        let e = mol.bond_count();
        let c = connected_components(mol.graph());
        (e + c).saturating_sub(v)
    }
}

struct ShortestPaths {
    dist: Vec<Vec<u32>>,
    pred: Vec<Vec<Option<NodeIndex>>>,
}

impl ShortestPaths {
    fn new<A, B>(mol: &Mol<A, B>) -> Self {
        let n = mol.atom_count();
        let mut dist = vec![vec![u32::MAX; n]; n];
        let mut pred = vec![vec![None; n]; n];
        for src in 0..n {
            dist[src][src] = 0;
            let mut queue = VecDeque::from([NodeIndex::new(src)]);
            while let Some(cur) = queue.pop_front() {
                let d = dist[src][cur.index()];
                // sorted so the predecessor choice does not depend on insertion order
                for nb in mol.sorted_neighbors(cur) {
                    if dist[src][nb.index()] == u32::MAX {
                        dist[src][nb.index()] = d + 1;
                        pred[src][nb.index()] = Some(cur);
                        queue.push_back(nb);
                    }
                }
            }
        }
        Self { dist, pred }
    }

    fn path(&self, src: NodeIndex, dst: NodeIndex) -> Vec<NodeIndex> {
        let mut path = vec![dst];
        let mut cur = dst;
        while cur != src {
            match self.pred[src.index()][cur.index()] {
                Some(p) => {
                    path.push(p);
                    cur = p;
                }
                None => return Vec::new(),
            }
        }
        path.reverse();
        path
    }
}

fn horton_candidates<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let paths = ShortestPaths::new(mol);
    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();

    for edge in mol.bonds() {
        let Some((u, v)) = mol.bond_endpoints(edge) else {
            continue;
        };
        for w in (0..n).map(NodeIndex::new) {
            let du = paths.dist[w.index()][u.index()];
            let dv = paths.dist[w.index()][v.index()];
            if du == u32::MAX || dv == u32::MAX || du as usize + dv as usize + 1 < 3 {
                continue;
            }
            let path_u = paths.path(w, u);
            let path_v = paths.path(w, v);
            if path_u.is_empty() || path_v.is_empty() || share_internal_node(&path_u, &path_v) {
                continue;
            }
            let mut ring = path_u;
            ring.extend(path_v[1..].iter().rev());
            candidates.push(normalize_ring(&ring));
        }
    }

    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.dedup();
    candidates
}

fn share_internal_node(path_u: &[NodeIndex], path_v: &[NodeIndex]) -> bool {
    path_u.len() >= 2
        && path_v.len() >= 2
        && path_u[1..].iter().any(|node| path_v[1..].contains(node))
}

fn bv_to_ring<A, B>(bv: &[u64], mol: &Mol<A, B>) -> Option<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let mut adj: Vec<Vec<NodeIndex>> = vec![vec![]; n];

    for edge in mol.bonds() {
        let idx = edge.index();
        if bv[idx / 64] & (1u64 << (idx % 64)) == 0 {
            continue;
        }
        let (u, v) = mol.bond_endpoints(edge)?;
        adj[u.index()].push(v);
        adj[v.index()].push(u);
    }

    // only simple cycles: every member has exactly two ring bonds
    if adj.iter().any(|nbs| !nbs.is_empty() && nbs.len() != 2) {
        return None;
    }

    let start = (0..n).find(|&i| !adj[i].is_empty())?;
    let mut ring = vec![NodeIndex::new(start)];
    let mut prev = start;
    let mut cur = adj[start].first()?.index();

    while cur != start {
        ring.push(NodeIndex::new(cur));
        let next = adj[cur].iter().find(|&&nb| nb.index() != prev)?.index();
        prev = cur;
        cur = next;
    }

    Some(ring)
}

fn ring_to_edge_bitvector<A, B>(ring: &[NodeIndex], num_edges: usize, mol: &Mol<A, B>) -> Vec<u64> {
    let mut bv = vec![0u64; num_edges.div_ceil(64)];
    let len = ring.len();
    for i in 0..len {
        if let Some(edge) = mol.bond_between(ring[i], ring[(i + 1) % len]) {
            let idx = edge.index();
            bv[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    bv
}

fn select_independent_rings<A, B>(
    candidates: &[Vec<NodeIndex>],
    num_needed: usize,
    mol: &Mol<A, B>,
) -> Vec<Vec<NodeIndex>> {
    let num_edges = mol.bond_count();
    let mut result = Vec::with_capacity(num_needed);
    let mut basis = CycleBasis::default();

    for ring in candidates {
        if basis.len() >= num_needed {
            break;
        }
        let bv = ring_to_edge_bitvector(ring, num_edges, mol);
        if bv.iter().all(|&w| w == 0) {
            continue;
        }
        if basis.try_add(&bv) {
            result.push(ring.clone());
        }
    }

    result.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    result
}

/// GF(2) row space kept in reduced echelon form: each row owns a pivot bit
/// that no other row has set.
#[derive(Default)]
struct CycleBasis {
    rows: Vec<(usize, Vec<u64>)>,
}

impl CycleBasis {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn reduce(&self, bv: &[u64]) -> Vec<u64> {
        let mut v = bv.to_vec();
        for (p, row) in &self.rows {
            if bit(&v, *p) {
                xor_into(&mut v, row);
            }
        }
        v
    }

    fn spans(&self, bv: &[u64]) -> bool {
        self.reduce(bv).iter().all(|&w| w == 0)
    }

    fn try_add(&mut self, candidate: &[u64]) -> bool {
        let v = self.reduce(candidate);
        let Some(p) = leading_bit(&v) else {
            return false;
        };
        for (_, row) in self.rows.iter_mut() {
            if bit(row, p) {
                xor_into(row, &v);
            }
        }
        self.rows.push((p, v));
        true
    }
}

fn bit(bv: &[u64], p: usize) -> bool {
    bv[p / 64] & (1u64 << (p % 64)) != 0
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b) {
        *aw ^= *bw;
    }
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, &w)| i * 64 + w.trailing_zeros() as usize)
}

fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let Some(min_pos) = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, idx)| idx)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };

    let len = ring.len();
    let mut normalized: Vec<NodeIndex> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}
