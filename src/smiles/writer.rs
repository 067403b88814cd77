use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::canonical::canonical_ordering;
use crate::element::Element;
use crate::graph_ops::connected_components;
use crate::mol::{permutation_parity, AtomId, Mol};

/// Writes the molecule as canonical SMILES: fragments ordered by their lowest
/// canonical rank, traversal and branch order driven by the ranks.
///
/// The output only depends on the graph and its labels, so two numberings of
/// the same molecule produce the same string. Aromaticity and non-stereo
/// descriptors are taken as they are; callers that need a normalized form
/// run perception first.
pub fn to_canonical_smiles(mol: &Mol<Atom, Bond>) -> String {
    let ranks = canonical_ordering(mol);
    let dirs = compute_bond_directions(mol, &ranks);
    let mut components = connected_components(mol);
    components.sort_by_key(|c| c.iter().map(|a| ranks[a.index()]).min());
    components
        .iter()
        .map(|component| write_fragment(mol, component, &ranks, &dirs))
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn flip(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    fn as_char(self) -> char {
        match self {
            Direction::Up => '/',
            Direction::Down => '\\',
        }
    }
}

/// Spanning tree of one fragment plus its ring-closure bonds.
struct Traversal {
    start: NodeIndex,
    parent: Vec<Option<NodeIndex>>,
    children: Vec<Vec<NodeIndex>>,
    /// Partners whose ring bond opens at this atom (written first here).
    ring_opens: Vec<Vec<NodeIndex>>,
    /// Partners whose ring bond closes at this atom.
    ring_closes: Vec<Vec<NodeIndex>>,
}

/// Neighbours of `node` from lowest to highest rank.
fn ranked_neighbors(mol: &Mol<Atom, Bond>, node: NodeIndex, ranks: &[usize]) -> Vec<NodeIndex> {
    let mut nbs = mol.sorted_neighbors(node);
    nbs.sort_by_key(|w| ranks[w.index()]);
    nbs
}

fn traverse(mol: &Mol<Atom, Bond>, component: &[NodeIndex], ranks: &[usize]) -> Option<Traversal> {
    let n = mol.atom_count();
    let start = *component.iter().min_by_key(|a| ranks[a.index()])?;
    let neighbor_lists: Vec<Vec<NodeIndex>> = mol.atoms().map(|node| ranked_neighbors(mol, node, ranks)).collect();

    let mut t = Traversal {
        start,
        parent: vec![None; n],
        children: vec![Vec::new(); n],
        ring_opens: vec![Vec::new(); n],
        ring_closes: vec![Vec::new(); n],
    };
    let mut visited = vec![false; n];
    let mut edge_seen = vec![false; mol.bond_count()];
    let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
    visited[start.index()] = true;

    while let Some((node, next)) = stack.last_mut() {
        let node = *node;
        let Some(&neighbor) = neighbor_lists[node.index()].get(*next) else {
            stack.pop();
            continue;
        };
        *next += 1;
        let Some(edge) = mol.bond_between(node, neighbor) else {
            continue;
        };
        if edge_seen[edge.index()] {
            continue;
        }
        edge_seen[edge.index()] = true;
        if visited[neighbor.index()] {
            t.ring_opens[neighbor.index()].push(node);
            t.ring_closes[node.index()].push(neighbor);
        } else {
            visited[neighbor.index()] = true;
            t.parent[neighbor.index()] = Some(node);
            t.children[node.index()].push(neighbor);
            stack.push((neighbor, 0));
        }
    }
    Some(t)
}

/// Chooses `/` and `\` marks for every stereo double bond. Keys are
/// `(from, to)` and hold the mark as read from `from`; both orientations are
/// stored. Marks already placed for a conjugated neighbour are reused.
///
/// Bonds are visited by the ranks of their ends, each end marks its
/// lowest-ranked single-bonded substituent, and the lower-ranked end of a
/// bond with no prior marks starts with `/`. The marks therefore follow the
/// canonical ranks and never the input numbering.
fn compute_bond_directions(mol: &Mol<Atom, Bond>, ranks: &[usize]) -> HashMap<(NodeIndex, NodeIndex), Direction> {
    let mut dirs: HashMap<(NodeIndex, NodeIndex), Direction> = HashMap::new();
    let markable = |u: NodeIndex, v: NodeIndex| {
        mol.bond_between(u, v).is_some_and(|e| {
            let b = mol.bond(e);
            b.order == BondOrder::Single && !b.is_aromatic
        })
    };
    // (substituent, whether it sits across from the stored reference)
    let pick = |end: NodeIndex, other: NodeIndex, reference: NodeIndex| {
        ranked_neighbors(mol, end, ranks)
            .into_iter()
            .find(|&w| w != other && markable(end, w))
            .map(|w| (w, w != reference))
    };

    let mut stereo_bonds: Vec<(NodeIndex, NodeIndex, NodeIndex, NodeIndex, bool)> = mol
        .bonds()
        .filter(|&e| mol.bond(e).order == BondOrder::Double)
        .filter_map(|e| {
            let (x, y, trans) = mol.bond(e).stereo.refs()?;
            let (a, b) = mol.bond_endpoints(e)?;
            // the stored references belong to the bond's own endpoint order
            let (x, y) = if mol.bond_between(a, x).is_some() { (x, y) } else { (y, x) };
            Some(if ranks[a.index()] <= ranks[b.index()] {
                (a, b, x, y, trans)
            } else {
                (b, a, y, x, trans)
            })
        })
        .collect();
    stereo_bonds.sort_by_key(|&(a, b, ..)| (ranks[a.index()], ranks[b.index()]));

    for (a, b, x, y, trans) in stereo_bonds {
        let (Some((sa, flip_a)), Some((sb, flip_b))) = (pick(a, b, x), pick(b, a, y)) else {
            continue;
        };
        let trans = trans ^ flip_a ^ flip_b;

        let existing = |end: NodeIndex, other: NodeIndex, sub: NodeIndex| {
            ranked_neighbors(mol, end, ranks)
                .into_iter()
                .filter(|&w| w != other)
                .find_map(|w| dirs.get(&(end, w)).map(|&d| if w == sub { d } else { d.flip() }))
        };
        let relate = |d: Direction| if trans { d.flip() } else { d };
        let da = existing(a, b, sa)
            .or_else(|| existing(b, a, sb).map(relate))
            .unwrap_or(Direction::Up);
        let db = relate(da);

        for (end, sub, d) in [(a, sa, da), (b, sb, db)] {
            dirs.entry((end, sub)).or_insert(d);
            dirs.entry((sub, end)).or_insert(d.flip());
        }
    }
    dirs
}

struct Writer<'a> {
    mol: &'a Mol<Atom, Bond>,
    t: Traversal,
    dirs: &'a HashMap<(NodeIndex, NodeIndex), Direction>,
    ring_ids: HashMap<(NodeIndex, NodeIndex), usize>,
    in_use: Vec<bool>,
    out: String,
}

impl Writer<'_> {
    /// Neighbours in the order a reader will meet them after this atom.
    fn output_order(&self, node: NodeIndex) -> Vec<AtomId> {
        let i = node.index();
        let mut order = Vec::with_capacity(4);
        if let Some(p) = self.t.parent[i] {
            order.push(AtomId::Node(p));
        }
        if self.mol.atom(node).hydrogen_count > 0 {
            order.push(AtomId::ImplicitH(node));
        }
        order.extend(self.t.ring_closes[i].iter().copied().map(AtomId::Node));
        order.extend(self.t.ring_opens[i].iter().copied().map(AtomId::Node));
        order.extend(self.t.children[i].iter().copied().map(AtomId::Node));
        order
    }

    fn output_chirality(&self, node: NodeIndex) -> Chirality {
        let stored = self.mol.atom(node).chirality;
        if stored == Chirality::None {
            return stored;
        }
        let reference = self.mol.stereo_neighbors(node);
        stored.permuted(permutation_parity(&reference, &self.output_order(node)))
    }

    fn allocate_ring_id(&mut self) -> usize {
        match self.in_use.iter().skip(1).position(|&used| !used) {
            Some(p) => {
                self.in_use[p + 1] = true;
                p + 1
            }
            None => {
                self.in_use.push(true);
                self.in_use.len() - 1
            }
        }
    }

    fn write_node(&mut self, node: NodeIndex) {
        let chirality = self.output_chirality(node);
        write_atom_symbol(self.mol, node, chirality, &mut self.out);

        let closes = self.t.ring_closes[node.index()].clone();
        let mut released = Vec::with_capacity(closes.len());
        for other in closes {
            if let Some(id) = self.ring_ids.remove(&(other, node)) {
                write_ring_digit(id, &mut self.out);
                released.push(id);
            }
        }
        for other in self.t.ring_opens[node.index()].clone() {
            let id = self.allocate_ring_id();
            self.ring_ids.insert((node, other), id);
            self.write_bond(node, other);
            write_ring_digit(id, &mut self.out);
        }
        for id in released {
            self.in_use[id] = false;
        }

        let kids = self.t.children[node.index()].clone();
        let last = kids.len().saturating_sub(1);
        for (i, child) in kids.into_iter().enumerate() {
            let is_branch = i < last;
            if is_branch {
                self.out.push('(');
            }
            self.write_bond(node, child);
            self.write_node(child);
            if is_branch {
                self.out.push(')');
            }
        }
    }

    fn write_bond(&mut self, from: NodeIndex, to: NodeIndex) {
        if let Some(dir) = self.dirs.get(&(from, to)) {
            self.out.push(dir.as_char());
            return;
        }
        let Some(edge) = self.mol.bond_between(from, to) else {
            return;
        };
        let bond = self.mol.bond(edge);
        let both_aromatic = self.mol.atom(from).is_aromatic && self.mol.atom(to).is_aromatic;
        if bond.is_aromatic {
            if !both_aromatic {
                self.out.push(':');
            }
            return;
        }
        match bond.order {
            BondOrder::Single if both_aromatic => self.out.push('-'),
            BondOrder::Single => {}
            BondOrder::Double => self.out.push('='),
            BondOrder::Triple => self.out.push('#'),
        }
    }
}

fn write_fragment(
    mol: &Mol<Atom, Bond>,
    component: &[NodeIndex],
    ranks: &[usize],
    dirs: &HashMap<(NodeIndex, NodeIndex), Direction>,
) -> String {
    let Some(t) = traverse(mol, component, ranks) else {
        return String::new();
    };
    let start = t.start;
    let mut writer = Writer {
        mol,
        t,
        dirs,
        ring_ids: HashMap::new(),
        in_use: vec![true],
        out: String::new(),
    };
    writer.write_node(start);
    writer.out
}

fn write_ring_digit(id: usize, out: &mut String) {
    if id <= 9 {
        out.push_str(&id.to_string());
    } else {
        out.push('%');
        out.push_str(&id.to_string());
    }
}

fn write_atom_symbol(mol: &Mol<Atom, Bond>, node: NodeIndex, chirality: Chirality, out: &mut String) {
    let atom = mol.atom(node);
    let elem = Element::from_atomic_num(atom.atomic_num);
    match elem {
        Some(e) if can_write_bare(mol, node, e) => push_symbol(e, atom.is_aromatic, out),
        _ => write_bracket_atom(atom, elem, chirality, out),
    }
}

fn push_symbol(elem: Element, aromatic: bool, out: &mut String) {
    if aromatic {
        out.extend(elem.symbol().chars().map(|c| c.to_ascii_lowercase()));
    } else {
        out.push_str(elem.symbol());
    }
}

fn can_write_bare(mol: &Mol<Atom, Bond>, node: NodeIndex, elem: Element) -> bool {
    let atom = mol.atom(node);
    if !elem.is_organic_subset()
        || atom.isotope != 0
        || atom.formal_charge != 0
        || atom.chirality != Chirality::None
    {
        return false;
    }
    if atom.is_aromatic && !matches!(elem, Element::B | Element::C | Element::N | Element::O | Element::P | Element::S) {
        return false;
    }
    atom.hydrogen_count == implicit_h_for_bare_atom(elem, atom.is_aromatic, reader_bond_order_sum(mol, node))
}

/// The hydrogen count a reader assigns to a bare atom with this bond order sum.
fn implicit_h_for_bare_atom(elem: Element, is_aromatic: bool, bos: u8) -> u8 {
    let Some(target) = elem.default_valences().iter().copied().find(|&v| v >= bos) else {
        return 0;
    };
    let h = target - bos;
    if is_aromatic {
        h.saturating_sub(1)
    } else {
        h
    }
}

/// Bond order sum as the reader will see it: unmarked aromatic bonds count 1.
fn reader_bond_order_sum(mol: &Mol<Atom, Bond>, node: NodeIndex) -> u8 {
    mol.bonds_of(node)
        .map(|e| {
            let bond = mol.bond(e);
            if bond.is_aromatic {
                1
            } else {
                bond.order.valence()
            }
        })
        .fold(0u8, u8::saturating_add)
}

fn write_bracket_atom(atom: &Atom, elem: Option<Element>, chirality: Chirality, out: &mut String) {
    out.push('[');
    if atom.isotope != 0 {
        out.push_str(&atom.isotope.to_string());
    }
    match elem {
        Some(e) => push_symbol(e, atom.is_aromatic, out),
        None => out.push('*'),
    }
    match chirality {
        Chirality::Ccw => out.push('@'),
        Chirality::Cw => out.push_str("@@"),
        Chirality::None => {}
    }
    if atom.hydrogen_count > 0 {
        out.push('H');
        if atom.hydrogen_count > 1 {
            out.push_str(&atom.hydrogen_count.to_string());
        }
    }
    if atom.formal_charge != 0 {
        out.push(if atom.formal_charge > 0 { '+' } else { '-' });
        if atom.formal_charge.abs() > 1 {
            out.push_str(&atom.formal_charge.unsigned_abs().to_string());
        }
    }
    out.push(']');
}
