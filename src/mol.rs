use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::atom::Atom;
use crate::bond::BondStereo;

/// One slot in a stereocentre's reference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomId {
    Node(NodeIndex),
    /// The implicit hydrogen(s) of the given centre.
    ImplicitH(NodeIndex),
}

/// Molecular graph with atom type `A` and bond type `B`.
pub struct Mol<A, B> {
    graph: UnGraph<A, B>,
}

impl<A, B> Mol<A, B> {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
        }
    }

    pub fn graph(&self) -> &UnGraph<A, B> {
        &self.graph
    }

    pub fn atom(&self, idx: NodeIndex) -> &A {
        &self.graph[idx]
    }

    pub fn atom_mut(&mut self, idx: NodeIndex) -> &mut A {
        &mut self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &B {
        &self.graph[idx]
    }

    pub fn bond_mut(&mut self, idx: EdgeIndex) -> &mut B {
        &mut self.graph[idx]
    }

    pub fn add_atom(&mut self, atom: A) -> NodeIndex {
        self.graph.add_node(atom)
    }

    pub fn add_bond(&mut self, a: NodeIndex, b: NodeIndex, bond: B) -> EdgeIndex {
        self.graph.add_edge(a, b, bond)
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    /// Neighbours in ascending node index, independent of insertion order.
    pub fn sorted_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        out.sort_unstable();
        out
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors(idx).count()
    }

    pub fn bonds_of(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn bond_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    /// Maps every atom and bond into a new graph with the same topology.
    pub fn map<A2, B2>(
        &self,
        mut atom_fn: impl FnMut(NodeIndex, &A) -> A2,
        mut bond_fn: impl FnMut(EdgeIndex, &B) -> B2,
    ) -> Mol<A2, B2> {
        Mol {
            graph: self
                .graph
                .map(|n, a| atom_fn(n, a), |e, b| bond_fn(e, b)),
        }
    }
}

impl<A: Clone, B: Clone> Mol<A, B> {
    /// Copies the atoms flagged in `keep`, preserving their relative order,
    /// together with every bond between two kept atoms. The returned table
    /// maps old indices to new ones.
    pub fn induced_subgraph(&self, keep: &[bool]) -> (Mol<A, B>, Vec<Option<NodeIndex>>) {
        let mut out = Mol::new();
        let mut remap = vec![None; self.atom_count()];
        for idx in self.atoms() {
            if keep.get(idx.index()).copied().unwrap_or(false) {
                remap[idx.index()] = Some(out.add_atom(self.atom(idx).clone()));
            }
        }
        for edge in self.bonds() {
            let Some((a, b)) = self.bond_endpoints(edge) else {
                continue;
            };
            if let (Some(na), Some(nb)) = (remap[a.index()], remap[b.index()]) {
                out.add_bond(na, nb, self.bond(edge).clone());
            }
        }
        (out, remap)
    }
}

impl<B> Mol<Atom, B> {
    /// Reference order for the atom's tetrahedral tag: implicit H first,
    /// then neighbours by ascending index.
    pub fn stereo_neighbors(&self, idx: NodeIndex) -> Vec<AtomId> {
        let mut out = Vec::with_capacity(4);
        if self.atom(idx).hydrogen_count > 0 {
            out.push(AtomId::ImplicitH(idx));
        }
        out.extend(self.sorted_neighbors(idx).into_iter().map(AtomId::Node));
        out
    }
}

/// Rewrites node references in double-bond stereo after atoms move.
pub(crate) fn remap_stereo(
    stereo: BondStereo,
    remap: impl Fn(NodeIndex) -> Option<NodeIndex>,
) -> BondStereo {
    match stereo.refs() {
        Some((a, b, trans)) => match (remap(a), remap(b)) {
            (Some(a), Some(b)) => BondStereo::from_refs(a, b, trans),
            _ => BondStereo::None,
        },
        None => BondStereo::None,
    }
}

impl<A: Clone, B: Clone> Clone for Mol<A, B> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
        }
    }
}

impl<A, B> Default for Mol<A, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: PartialEq, B: PartialEq> PartialEq for Mol<A, B> {
    fn eq(&self, other: &Self) -> bool {
        if self.atom_count() != other.atom_count() || self.bond_count() != other.bond_count() {
            return false;
        }
        if self.atoms().any(|idx| self.atom(idx) != other.atom(idx)) {
            return false;
        }
        self.bonds().all(|idx| {
            self.bond(idx) == other.bond(idx)
                && self.bond_endpoints(idx) == other.bond_endpoints(idx)
        })
    }
}

impl<A: std::fmt::Debug, B: std::fmt::Debug> std::fmt::Debug for Mol<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mol")
            .field("atom_count", &self.atom_count())
            .field("bond_count", &self.bond_count())
            .finish()
    }
}

/// `true` when `to` is an even permutation of `from`. Sequences that are not
/// permutations of each other count as odd.
pub(crate) fn permutation_parity<T: Eq>(from: &[T], to: &[T]) -> bool {
    let n = from.len();
    if n != to.len() {
        return false;
    }
    let mut perm = Vec::with_capacity(n);
    for f in from {
        match to.iter().position(|t| t == f) {
            Some(p) => perm.push(p),
            None => return false,
        }
    }
    let mut visited = vec![false; n];
    let mut swaps = 0usize;
    for i in 0..n {
        if visited[i] {
            continue;
        }
        let mut cycle_len = 0;
        let mut j = i;
        while !visited[j] {
            visited[j] = true;
            j = perm[j];
            cycle_len += 1;
        }
        swaps += cycle_len - 1;
    }
    swaps % 2 == 0
}
