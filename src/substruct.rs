use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// `(query atom, target atom)` pairs, sorted by query atom.
pub type AtomMapping = Vec<(NodeIndex, NodeIndex)>;

/// First mapping under caller-supplied predicates. Both predicates receive
/// the target index first and the query index second.
pub fn get_substruct_match_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(NodeIndex, NodeIndex) -> bool,
    bond_match: impl Fn(EdgeIndex, EdgeIndex) -> bool,
) -> Option<AtomMapping> {
    get_substruct_matches_with(target, query, atom_match, bond_match, Some(1))
        .into_iter()
        .next()
}

/// Every mapping of `query` onto a subgraph of `target`, in search order.
///
/// Automorphic mappings onto the same target atoms are all reported. With
/// `limit`, the search stops once that many mappings have been found.
pub fn get_substruct_matches_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(NodeIndex, NodeIndex) -> bool,
    bond_match: impl Fn(EdgeIndex, EdgeIndex) -> bool,
    limit: Option<usize>,
) -> Vec<AtomMapping> {
    let mut vf2 = Vf2::new(target, query, atom_match, bond_match, limit);
    vf2.recurse(0);
    vf2.results
}

struct Vf2<'a, A1, B1, A2, B2, FA, FB> {
    target: &'a Mol<A1, B1>,
    query: &'a Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
    limit: Option<usize>,
    /// Query atoms in visiting order, each paired with an earlier query
    /// neighbour when one exists.
    query_order: Vec<(NodeIndex, Option<NodeIndex>)>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    results: Vec<AtomMapping>,
}

impl<'a, A1, B1, A2, B2, FA, FB> Vf2<'a, A1, B1, A2, B2, FA, FB>
where
    FA: Fn(NodeIndex, NodeIndex) -> bool,
    FB: Fn(EdgeIndex, EdgeIndex) -> bool,
{
    fn new(
        target: &'a Mol<A1, B1>,
        query: &'a Mol<A2, B2>,
        atom_match: FA,
        bond_match: FB,
        limit: Option<usize>,
    ) -> Self {
        Self {
            target,
            query,
            atom_match,
            bond_match,
            limit,
            query_order: connected_order(query),
            query_map: vec![None; query.atom_count()],
            target_used: vec![false; target.atom_count()],
            results: Vec::new(),
        }
    }

    fn done(&self) -> bool {
        self.limit.is_some_and(|l| self.results.len() >= l)
    }

    fn recurse(&mut self, depth: usize) {
        if self.done() {
            return;
        }
        if depth == self.query_order.len() {
            let mut mapping: AtomMapping = self
                .query_map
                .iter()
                .enumerate()
                .filter_map(|(q, t)| t.map(|t| (NodeIndex::new(q), t)))
                .collect();
            mapping.sort_unstable();
            self.results.push(mapping);
            return;
        }

        let (query_node, anchor) = self.query_order[depth];
        let candidates: Vec<NodeIndex> = match anchor.and_then(|a| self.query_map[a.index()]) {
            Some(t_anchor) => self.target.sorted_neighbors(t_anchor),
            None => self.target.atoms().collect(),
        };

        for target_node in candidates {
            if self.target_used[target_node.index()] || !self.is_feasible(query_node, target_node)
            {
                continue;
            }

            self.query_map[query_node.index()] = Some(target_node);
            self.target_used[target_node.index()] = true;

            self.recurse(depth + 1);

            self.query_map[query_node.index()] = None;
            self.target_used[target_node.index()] = false;

            if self.done() {
                return;
            }
        }
    }

    fn is_feasible(&self, query_node: NodeIndex, target_node: NodeIndex) -> bool {
        if self.target.degree(target_node) < self.query.degree(query_node) {
            return false;
        }
        if !(self.atom_match)(target_node, query_node) {
            return false;
        }

        for q_neighbor in self.query.neighbors(query_node) {
            let Some(t_mapped) = self.query_map[q_neighbor.index()] else {
                continue;
            };
            let Some(q_bond) = self.query.bond_between(query_node, q_neighbor) else {
                return false;
            };
            match self.target.bond_between(target_node, t_mapped) {
                Some(t_bond) if (self.bond_match)(t_bond, q_bond) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Breadth-first order over each query component, starting from its most
/// connected atom, so every atom after the first of a component has an
/// already-placed neighbour.
fn connected_order<A, B>(query: &Mol<A, B>) -> Vec<(NodeIndex, Option<NodeIndex>)> {
    let mut seeds: Vec<NodeIndex> = query.atoms().collect();
    seeds.sort_by_key(|&n| (std::cmp::Reverse(query.degree(n)), n));

    let mut placed = vec![false; query.atom_count()];
    let mut order = Vec::with_capacity(query.atom_count());
    for seed in seeds {
        if placed[seed.index()] {
            continue;
        }
        placed[seed.index()] = true;
        order.push((seed, None));
        let mut head = order.len() - 1;
        while head < order.len() {
            let (current, _) = order[head];
            head += 1;
            for nb in query.sorted_neighbors(current) {
                if !placed[nb.index()] {
                    placed[nb.index()] = true;
                    order.push((nb, Some(current)));
                }
            }
        }
    }
    order
}
