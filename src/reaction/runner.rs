use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder, BondStereo, SmilesBond, SmilesBondOrder};
use crate::element::Element;
use crate::mol::{permutation_parity, remap_stereo, AtomId, Mol};
use crate::rings::RingInfo;
use crate::smarts::{get_smarts_matches_limited, template_reference, AtomExpr, BondExpr};
use crate::substruct::AtomMapping;

use super::error::ReactionError;
use super::Reaction;

/// Everything one application of a reaction produced.
#[derive(Debug, Clone, Default)]
pub struct ReactionOutput {
    /// One entry per match combination, holding one molecule per product
    /// template in template order.
    pub product_sets: Vec<Vec<Mol<Atom, SmilesBond>>>,
    /// Set when match enumeration stopped at the product cap.
    pub truncated: bool,
}

impl Reaction {
    /// Apply this reaction to one molecule per reactant template.
    ///
    /// Every match is expanded, including matches that differ only by a
    /// symmetry of the template, so the output commonly holds duplicates.
    /// At most `max_products` product sets are generated. No match is not an
    /// error and yields an empty output.
    pub fn run(
        &self,
        reactants: &[&Mol<Atom, Bond>],
        max_products: usize,
    ) -> Result<ReactionOutput, ReactionError> {
        if reactants.len() != self.reactant_templates.len() {
            return Err(ReactionError::WrongReactantCount {
                expected: self.reactant_templates.len(),
                got: reactants.len(),
            });
        }

        let mut truncated = false;
        let mut per_template: Vec<Vec<AtomMapping>> = Vec::with_capacity(reactants.len());
        for (tmpl, mol) in self.reactant_templates.iter().zip(reactants) {
            let rings = RingInfo::symmetrized_sssr(mol);
            let mut found =
                get_smarts_matches_limited(mol, &rings, tmpl, Some(max_products.saturating_add(1)));
            if found.len() > max_products {
                found.truncate(max_products);
                truncated = true;
            }
            if found.is_empty() {
                return Ok(ReactionOutput::default());
            }
            per_template.push(found);
        }

        let combinations = cartesian_product(&per_template, max_products, &mut truncated);
        let bond_pairs = mapped_bond_pairs(&self.reactant_templates);
        let product_sets = combinations
            .iter()
            .map(|combo| {
                let state = MatchState::new(&self.reactant_templates, combo);
                self.product_templates
                    .iter()
                    .map(|tmpl| {
                        ProductBuilder {
                            reaction: self,
                            tmpl,
                            state: &state,
                            reactants,
                            bond_pairs: &bond_pairs,
                        }
                        .build()
                    })
                    .collect()
            })
            .collect();

        Ok(ReactionOutput {
            product_sets,
            truncated,
        })
    }
}

/// Where each template atom of one match combination landed.
struct MatchState {
    by_map: HashMap<u16, (usize, NodeIndex)>,
    map_of: Vec<HashMap<NodeIndex, u16>>,
    template_of: Vec<HashMap<NodeIndex, NodeIndex>>,
    matched: Vec<HashSet<NodeIndex>>,
}

impl MatchState {
    fn new(templates: &[Mol<AtomExpr, BondExpr>], combo: &[&AtomMapping]) -> Self {
        let mut state = MatchState {
            by_map: HashMap::new(),
            map_of: vec![HashMap::new(); combo.len()],
            template_of: vec![HashMap::new(); combo.len()],
            matched: vec![HashSet::new(); combo.len()],
        };
        for (ri, (tmpl, mapping)) in templates.iter().zip(combo).enumerate() {
            for &(q, t) in mapping.iter() {
                state.matched[ri].insert(t);
                state.template_of[ri].insert(t, q);
                if let Some(map_num) = tmpl.atom(q).map_class() {
                    state.by_map.insert(map_num, (ri, t));
                    state.map_of[ri].insert(t, map_num);
                }
            }
        }
        state
    }
}

struct ProductBuilder<'a> {
    reaction: &'a Reaction,
    tmpl: &'a Mol<AtomExpr, BondExpr>,
    state: &'a MatchState,
    reactants: &'a [&'a Mol<Atom, Bond>],
    bond_pairs: &'a HashSet<(u16, u16)>,
}

impl ProductBuilder<'_> {
    fn build(&self) -> Mol<Atom, SmilesBond> {
        let mut product: Mol<Atom, SmilesBond> = Mol::new();
        let mut placed: HashMap<(usize, NodeIndex), NodeIndex> = HashMap::new();
        let mut sources: Vec<Option<(usize, NodeIndex)>> = Vec::new();

        for tp in self.tmpl.atoms() {
            let expr = self.tmpl.atom(tp);
            let source = expr
                .map_class()
                .and_then(|m| self.state.by_map.get(&m).copied());
            let mut atom = match source {
                Some((ri, t)) => self.reactants[ri].atom(t).clone(),
                None => Atom::default(),
            };
            apply_template_atom(&mut atom, expr);
            let p = product.add_atom(atom);
            if let Some(src) = source {
                placed.insert(src, p);
            }
            sources.push(source);
        }

        self.carry_substituents(&mut product, &mut placed, &sources);
        self.add_template_bonds(&mut product, &placed, &sources);
        self.add_reactant_bonds(&mut product, &placed);

        for p in product.atoms().collect::<Vec<_>>() {
            let aromatic = product
                .bonds_of(p)
                .any(|e| product.bond(e).order == SmilesBondOrder::Aromatic);
            product.atom_mut(p).is_aromatic = aromatic;
        }
        for tp in self.tmpl.atoms() {
            let h = match self.tmpl.atom(tp).explicit_h() {
                Some(h) => h,
                None => implied_hydrogens(&product, tp).unwrap_or(product.atom(tp).hydrogen_count),
            };
            product.atom_mut(tp).hydrogen_count = h;
        }
        // carried atoms that lost a bond to a deleted atom are re-saturated
        for (&(ri, r), &p) in &placed {
            if p.index() < self.tmpl.atom_count() || product.degree(p) == self.reactants[ri].degree(r) {
                continue;
            }
            if let Some(h) = implied_hydrogens(&product, p) {
                product.atom_mut(p).hydrogen_count = h;
            }
        }
        for tp in self.tmpl.atoms() {
            let tag = self.product_chirality(&product, &placed, tp, sources[tp.index()]);
            product.atom_mut(tp).chirality = tag;
        }
        for (&(ri, r), &p) in &placed {
            if p.index() >= self.tmpl.atom_count() {
                let tag = transfer_chirality(self.reactants[ri], ri, r, &product, p, &placed);
                product.atom_mut(p).chirality = tag;
            }
        }
        drop_dangling_bond_stereo(&mut product);
        product
    }

    /// Copies unmatched reactant atoms reachable from the mapped atoms
    /// without passing through another matched atom.
    fn carry_substituents(
        &self,
        product: &mut Mol<Atom, SmilesBond>,
        placed: &mut HashMap<(usize, NodeIndex), NodeIndex>,
        sources: &[Option<(usize, NodeIndex)>],
    ) {
        let mut queue: VecDeque<(usize, NodeIndex)> = sources.iter().flatten().copied().collect();
        while let Some((ri, r_node)) = queue.pop_front() {
            let reactant = self.reactants[ri];
            for nb in reactant.sorted_neighbors(r_node) {
                if self.state.matched[ri].contains(&nb) || placed.contains_key(&(ri, nb)) {
                    continue;
                }
                let p = product.add_atom(reactant.atom(nb).clone());
                placed.insert((ri, nb), p);
                queue.push_back((ri, nb));
            }
        }
    }

    fn add_template_bonds(
        &self,
        product: &mut Mol<Atom, SmilesBond>,
        placed: &HashMap<(usize, NodeIndex), NodeIndex>,
        sources: &[Option<(usize, NodeIndex)>],
    ) {
        for edge in self.tmpl.bonds() {
            let Some((a, b)) = self.tmpl.bond_endpoints(edge) else {
                continue;
            };
            let expr = self.tmpl.bond(edge);
            let copy = || {
                reactant_bond(self.reactants, sources[a.index()], sources[b.index()]).map(
                    |(bond, swapped)| {
                        let mut copied = kekule_bond(bond, |n| {
                            sources[a.index()].and_then(|(ri, _)| placed.get(&(ri, n)).copied())
                        });
                        if swapped {
                            copied.stereo = match copied.stereo.refs() {
                                Some((x, y, trans)) => BondStereo::from_refs(y, x, trans),
                                None => BondStereo::None,
                            };
                        }
                        copied
                    },
                )
            };
            // flags still come from the reactant or the template at this point
            let aromatic_pair = product.atom(a).is_aromatic && product.atom(b).is_aromatic;
            // an unspecified bond is single, or aromatic between aromatic atoms;
            // only `~` and compound queries keep the reactant's order
            let bond = match (expr.plain_order(), expr) {
                (Some(order), _) => SmilesBond::new(smiles_order(order)),
                (None, BondExpr::Aromatic) => {
                    copy().unwrap_or_else(|| SmilesBond::new(SmilesBondOrder::Aromatic))
                }
                (None, BondExpr::SingleOrAromatic) if aromatic_pair => {
                    copy().unwrap_or_else(|| SmilesBond::new(SmilesBondOrder::Aromatic))
                }
                (None, BondExpr::SingleOrAromatic) => SmilesBond::new(SmilesBondOrder::Single),
                (None, _) => copy().unwrap_or_else(|| SmilesBond::new(SmilesBondOrder::Single)),
            };
            product.add_bond(a, b, bond);
        }
    }

    /// Copies reactant bonds between placed atoms, except bonds the reaction
    /// breaks.
    fn add_reactant_bonds(
        &self,
        product: &mut Mol<Atom, SmilesBond>,
        placed: &HashMap<(usize, NodeIndex), NodeIndex>,
    ) {
        for (ri, reactant) in self.reactants.iter().enumerate() {
            for edge in reactant.bonds() {
                let Some((a, b)) = reactant.bond_endpoints(edge) else {
                    continue;
                };
                let (Some(&pa), Some(&pb)) = (placed.get(&(ri, a)), placed.get(&(ri, b))) else {
                    continue;
                };
                if product.bond_between(pa, pb).is_some() {
                    continue;
                }
                let maps = (self.state.map_of[ri].get(&a), self.state.map_of[ri].get(&b));
                if let (Some(&ma), Some(&mb)) = maps {
                    if self.bond_pairs.contains(&(ma.min(mb), ma.max(mb))) {
                        continue;
                    }
                }
                let bond = kekule_bond(reactant.bond(edge), |n| placed.get(&(ri, n)).copied());
                product.add_bond(pa, pb, bond);
            }
        }
    }

    /// Tetrahedral tag of the product atom made from template atom `tp`.
    fn product_chirality(
        &self,
        product: &Mol<Atom, SmilesBond>,
        placed: &HashMap<(usize, NodeIndex), NodeIndex>,
        tp: NodeIndex,
        source: Option<(usize, NodeIndex)>,
    ) -> Chirality {
        let product_tag = self.tmpl.atom(tp).chirality();
        let Some((ri, r)) = source else {
            return self.chirality_from_template(product, tp, product_tag);
        };
        let reactant_tmpl = &self.reaction.reactant_templates[ri];
        let Some(&tr) = self.state.template_of[ri].get(&r) else {
            return Chirality::None;
        };
        let reactant_tag = reactant_tmpl.atom(tr).chirality();
        let carried = || transfer_chirality(self.reactants[ri], ri, r, product, tp, placed);

        match (reactant_tag, product_tag) {
            (Chirality::None, Chirality::None) => carried(),
            (Chirality::None, tag) => self.chirality_from_template(product, tp, tag),
            (_, Chirality::None) => Chirality::None,
            (r_tag, p_tag) => {
                let opposite = match comparable_parity(reactant_tmpl, tr, self.tmpl, tp) {
                    Some(even) => p_tag.permuted(even) != r_tag,
                    None => p_tag != r_tag,
                };
                if opposite {
                    carried().inverted()
                } else {
                    carried()
                }
            }
        }
    }

    fn chirality_from_template(
        &self,
        product: &Mol<Atom, SmilesBond>,
        tp: NodeIndex,
        tag: Chirality,
    ) -> Chirality {
        if tag == Chirality::None {
            return Chirality::None;
        }
        // template atoms occupy the first product indices
        let mut from: Vec<AtomId> = template_reference(self.tmpl, tp)
            .into_iter()
            .map(|id| match id {
                AtomId::ImplicitH(_) => AtomId::ImplicitH(tp),
                other => other,
            })
            .collect();
        let target = product.stereo_neighbors(tp);
        let missing: Vec<AtomId> = target.iter().filter(|id| !from.contains(id)).copied().collect();
        if missing.len() > 1 || from.len() + missing.len() != target.len() {
            return Chirality::None;
        }
        from.extend(missing);
        if target.len() < 3 || from.iter().any(|id| !target.contains(id)) {
            return Chirality::None;
        }
        tag.permuted(permutation_parity(&from, &target))
    }
}

/// Re-expresses a reactant atom's tag over its product neighbourhood. One
/// replaced neighbour takes the place of the one it replaced; any other
/// change to the neighbourhood drops the tag.
fn transfer_chirality(
    reactant: &Mol<Atom, Bond>,
    ri: usize,
    r: NodeIndex,
    product: &Mol<Atom, SmilesBond>,
    p: NodeIndex,
    placed: &HashMap<(usize, NodeIndex), NodeIndex>,
) -> Chirality {
    let tag = reactant.atom(r).chirality;
    if tag == Chirality::None {
        return tag;
    }
    let target = product.stereo_neighbors(p);
    let old: Vec<Option<AtomId>> = reactant
        .stereo_neighbors(r)
        .into_iter()
        .map(|id| match id {
            AtomId::ImplicitH(_) => (product.atom(p).hydrogen_count > 0).then_some(AtomId::ImplicitH(p)),
            AtomId::Node(n) => placed
                .get(&(ri, n))
                .copied()
                .filter(|&q| product.bond_between(p, q).is_some())
                .map(AtomId::Node),
        })
        .collect();
    let fresh: Vec<AtomId> = target
        .iter()
        .filter(|id| !old.contains(&Some(**id)))
        .copied()
        .collect();
    let lost = old.iter().filter(|o| o.is_none()).count();
    if old.len() != target.len() || lost > 1 || fresh.len() != lost {
        return Chirality::None;
    }
    let mut fresh = fresh.into_iter();
    let from: Option<Vec<AtomId>> = old
        .into_iter()
        .map(|slot| slot.or_else(|| fresh.next()))
        .collect();
    let Some(from) = from else {
        return Chirality::None;
    };
    tag.permuted(permutation_parity(&from, &target))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    H,
    Map(u16),
}

/// Parity between the reference orders of a reactant template atom and its
/// product counterpart, when both neighbourhoods are the same mapped atoms.
fn comparable_parity(
    reactant_tmpl: &Mol<AtomExpr, BondExpr>,
    tr: NodeIndex,
    product_tmpl: &Mol<AtomExpr, BondExpr>,
    tp: NodeIndex,
) -> Option<bool> {
    let slots = |tmpl: &Mol<AtomExpr, BondExpr>, idx: NodeIndex| -> Option<Vec<Slot>> {
        template_reference(tmpl, idx)
            .into_iter()
            .map(|id| match id {
                AtomId::ImplicitH(_) => Some(Slot::H),
                AtomId::Node(n) => tmpl.atom(n).map_class().map(Slot::Map),
            })
            .collect()
    };
    let from = slots(product_tmpl, tp)?;
    let to = slots(reactant_tmpl, tr)?;
    let same_set = from.len() == to.len() && from.iter().all(|s| to.contains(s));
    same_set.then(|| permutation_parity(&from, &to))
}

fn apply_template_atom(atom: &mut Atom, expr: &AtomExpr) {
    match expr {
        AtomExpr::Element {
            atomic_num,
            aromatic,
        } => {
            atom.atomic_num = *atomic_num;
            if let Some(arom) = aromatic {
                atom.is_aromatic = *arom;
            }
        }
        AtomExpr::Charge(c) => atom.formal_charge = *c,
        AtomExpr::Isotope(i) => atom.isotope = *i,
        AtomExpr::And(parts) => {
            for p in parts {
                apply_template_atom(atom, p);
            }
        }
        _ => {}
    }
}

/// Reactant bond joining two mapped atoms of the same reactant, with a flag
/// set when its endpoints run opposite to `(a, b)`.
fn reactant_bond<'r>(
    reactants: &[&'r Mol<Atom, Bond>],
    a: Option<(usize, NodeIndex)>,
    b: Option<(usize, NodeIndex)>,
) -> Option<(&'r Bond, bool)> {
    let ((ra, ta), (rb, tb)) = (a?, b?);
    if ra != rb {
        return None;
    }
    let reactant = reactants[ra];
    let edge = reactant.bond_between(ta, tb)?;
    let (first, _) = reactant.bond_endpoints(edge)?;
    Some((reactant.bond(edge), first != ta))
}

fn smiles_order(order: BondOrder) -> SmilesBondOrder {
    match order {
        BondOrder::Single => SmilesBondOrder::Single,
        BondOrder::Double => SmilesBondOrder::Double,
        BondOrder::Triple => SmilesBondOrder::Triple,
    }
}

/// Copies a bond in its Kekulé form. Aromaticity is perceived again once
/// the product is canonicalized.
fn kekule_bond(bond: &Bond, remap: impl Fn(NodeIndex) -> Option<NodeIndex>) -> SmilesBond {
    SmilesBond {
        order: smiles_order(bond.order),
        stereo: remap_stereo(bond.stereo, remap),
    }
}

fn drop_dangling_bond_stereo(product: &mut Mol<Atom, SmilesBond>) {
    let edges: Vec<_> = product.bonds().collect();
    for edge in edges {
        let Some((x, y, _)) = product.bond(edge).stereo.refs() else {
            continue;
        };
        let Some((a, b)) = product.bond_endpoints(edge) else {
            continue;
        };
        let valid = product.bond(edge).order == SmilesBondOrder::Double
            && x != b
            && y != a
            && product.bond_between(a, x).is_some()
            && product.bond_between(b, y).is_some();
        if !valid {
            product.bond_mut(edge).stereo = BondStereo::None;
        }
    }
}

/// Hydrogens that fill the atom up to its lowest allowed valence, or `None`
/// for elements without a valence model.
fn implied_hydrogens(product: &Mol<Atom, SmilesBond>, node: NodeIndex) -> Option<u8> {
    let atom = product.atom(node);
    let element = Element::from_atomic_num(atom.atomic_num)?;
    let allowed = element.allowed_valences(atom.formal_charge);
    if allowed.is_empty() {
        return None;
    }
    let used = crate::smiles::bond_order_sum(product, node);
    let h = allowed
        .iter()
        .copied()
        .find(|&v| v >= used)
        .map_or(0, |v| v - used);
    Some(if atom.is_aromatic { h.saturating_sub(1) } else { h })
}

fn mapped_bond_pairs(templates: &[Mol<AtomExpr, BondExpr>]) -> HashSet<(u16, u16)> {
    let mut pairs = HashSet::new();
    for tmpl in templates {
        for edge in tmpl.bonds() {
            let Some((a, b)) = tmpl.bond_endpoints(edge) else {
                continue;
            };
            if let (Some(ma), Some(mb)) = (tmpl.atom(a).map_class(), tmpl.atom(b).map_class()) {
                pairs.insert((ma.min(mb), ma.max(mb)));
            }
        }
    }
    pairs
}

fn cartesian_product<'a, T>(sets: &'a [Vec<T>], max: usize, truncated: &mut bool) -> Vec<Vec<&'a T>> {
    let mut result: Vec<Vec<&'a T>> = vec![vec![]];
    for set in sets {
        let mut next = Vec::new();
        'outer: for combo in &result {
            for item in set {
                if next.len() == max {
                    *truncated = true;
                    break 'outer;
                }
                let mut extended = combo.clone();
                extended.push(item);
                next.push(extended);
            }
        }
        result = next;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::from_reaction_smarts;
    use crate::structure::{prepare, Canonicalizer};

    fn mol(smiles: &str) -> Mol<Atom, Bond> {
        prepare(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn run(rxn: &str, reactants: &[&str]) -> ReactionOutput {
        let rxn = from_reaction_smarts(rxn).unwrap();
        let mols: Vec<_> = reactants.iter().map(|s| mol(s)).collect();
        let refs: Vec<&Mol<Atom, Bond>> = mols.iter().collect();
        rxn.run(&refs, 1000).unwrap()
    }

    fn element_count(product: &Mol<Atom, SmilesBond>, atomic_num: u8) -> usize {
        product
            .atoms()
            .filter(|&i| product.atom(i).atomic_num == atomic_num)
            .count()
    }

    #[test]
    fn wrong_reactant_count_error() {
        let rxn = from_reaction_smarts("[C:1][Br:2].[OH-:3]>>[C:1][O:3]").unwrap();
        let r1 = mol("CBr");
        assert_eq!(
            rxn.run(&[&r1], 10).unwrap_err(),
            ReactionError::WrongReactantCount {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn no_match_returns_empty() {
        let out = run("[C:1][Br:2]>>[C:1][OH]", &["CC"]);
        assert!(out.product_sets.is_empty());
        assert!(!out.truncated);
    }

    #[test]
    fn substitution_carries_substituents() {
        let out = run("[C:1][Br:2]>>[C:1][OH]", &["CCCBr"]);
        assert_eq!(out.product_sets.len(), 1);
        let product = &out.product_sets[0][0];
        assert_eq!(product.atom_count(), 4);
        assert_eq!(element_count(product, 35), 0);
        let o = product.atoms().find(|&i| product.atom(i).atomic_num == 8).unwrap();
        assert_eq!(product.atom(o).hydrogen_count, 1);
    }

    #[test]
    fn two_sites_give_two_product_sets() {
        let out = run("[C:1][Br:2]>>[C:1][OH]", &["BrCCBr"]);
        assert_eq!(out.product_sets.len(), 2);
        for set in &out.product_sets {
            assert_eq!(element_count(&set[0], 35), 1);
            assert_eq!(element_count(&set[0], 8), 1);
        }
    }

    #[test]
    fn bimolecular_substitution() {
        let out = run("[C:1][Br:2].[OH-:3]>>[C:1][O:3].[Br-:2]", &["CCBr", "[OH-]"]);
        assert_eq!(out.product_sets.len(), 1);
        let set = &out.product_sets[0];
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].atom_count(), 3);
        assert_eq!(set[1].atom_count(), 1);
        assert_eq!(set[1].atom(NodeIndex::new(0)).formal_charge, -1);
    }

    #[test]
    fn bond_order_changes() {
        let out = run("[C:1][C:2]>>[C:1]=[C:2]", &["CC"]);
        let product = &out.product_sets[0][0];
        assert_eq!(product.bond_count(), 1);
        let edge = product.bonds().next().unwrap();
        assert_eq!(product.bond(edge).order, SmilesBondOrder::Double);
        assert_eq!(product.atom(NodeIndex::new(0)).hydrogen_count, 2);
    }

    #[test]
    fn charge_change_deprotonation() {
        let out = run("[OH:1]>>[O-:1]", &["CO"]);
        let product = &out.product_sets[0][0];
        let o = product.atoms().find(|&i| product.atom(i).atomic_num == 8).unwrap();
        assert_eq!(product.atom(o).formal_charge, -1);
        assert_eq!(product.atom(o).hydrogen_count, 0);
    }

    #[test]
    fn unmapped_product_atom_created() {
        let out = run("[N:1]>>[N:1]C", &["N"]);
        let product = &out.product_sets[0][0];
        assert_eq!(product.atom_count(), 2);
        assert_eq!(product.atom(NodeIndex::new(1)).atomic_num, 6);
        assert_eq!(product.atom(NodeIndex::new(1)).hydrogen_count, 3);
        assert_eq!(product.atom(NodeIndex::new(0)).hydrogen_count, 2);
    }

    #[test]
    fn matched_unmapped_atoms_are_deleted() {
        // acetate ester hydrolysis keeps the alcohol side only
        let out = run("[C:1][O:2]C(=O)C>>[C:1][O:2]", &["CCOC(C)=O"]);
        let product = &out.product_sets[0][0];
        assert_eq!(product.atom_count(), 3);
        assert_eq!(element_count(product, 8), 1);
    }

    #[test]
    fn unmentioned_bonds_between_matched_atoms_are_kept() {
        // the ring bond between the two mapped carbons is not in the template
        let out = run("([C:1].[C:2])>>([C:1].[C:2])", &["CC"]);
        assert_eq!(out.product_sets.len(), 2);
        let product = &out.product_sets[0][0];
        assert_eq!(product.bond_count(), 1);
    }

    #[test]
    fn aromatic_ring_is_copied_in_kekule_form() {
        let out = run("[c:1][Br:2]>>[c:1][OH]", &["Brc1ccccc1"]);
        let product = &out.product_sets[0][0];
        assert_eq!(product.atom_count(), 7);
        let doubles = product
            .bonds()
            .filter(|&e| product.bond(e).order == SmilesBondOrder::Double)
            .count();
        assert_eq!(doubles, 3);
    }

    #[test]
    fn product_cap_truncates() {
        let rxn = from_reaction_smarts("[c:1][cH:2]>>[c:1][c:2]O").unwrap();
        let benzene = mol("c1ccccc1");
        let out = rxn.run(&[&benzene], 5).unwrap();
        assert_eq!(out.product_sets.len(), 5);
        assert!(out.truncated);
    }

    #[test]
    fn stereo_is_preserved_when_templates_are_silent() {
        let out = run("[O:1][H]>>[O:1]C", &["C[C@H](N)O"]);
        assert!(out.product_sets.is_empty(), "hydrogens are implicit");
        let out = run("[OH1:1]>>[O:1]C", &["C[C@H](N)O"]);
        let product = &out.product_sets[0][0];
        let centre = product
            .atoms()
            .find(|&i| product.atom(i).chirality != Chirality::None);
        assert!(centre.is_some());
    }

    #[test]
    fn stereo_inverts_when_templates_disagree() {
        let forward = run("[C@:1]>>[C@@:1]", &["C[C@H](N)O"]);
        let kept = run("[C@:1]>>[C@:1]", &["C[C@H](N)O"]);
        assert_eq!(forward.product_sets.len(), 2);
        let centre_tag = |out: &ReactionOutput| {
            out.product_sets
                .iter()
                .map(|set| set[0].atom(NodeIndex::new(0)).chirality)
                .find(|&c| c != Chirality::None)
                .unwrap()
        };
        assert_eq!(centre_tag(&forward), centre_tag(&kept).inverted());
    }

    #[test]
    fn stereo_is_removed_when_only_the_reactant_template_has_it() {
        let out = run("[C@:1]([N:2])>>[C:1][N:2]", &["C[C@H](N)O"]);
        for set in &out.product_sets {
            assert!(set[0].atoms().all(|i| set[0].atom(i).chirality == Chirality::None));
        }
    }

    fn canonical(product: &Mol<Atom, SmilesBond>) -> String {
        Canonicalizer::default()
            .canonicalize_mol(product.clone())
            .unwrap()
            .smiles
    }

    fn expected(smiles: &str) -> String {
        Canonicalizer::default().canonicalize(smiles).unwrap().smiles
    }

    #[test]
    fn implicit_product_bond_is_single() {
        // both orientations of the template match
        let out = run("[C:1]=[C:2]>>[C:1][C:2]", &["C=CC"]);
        assert_eq!(out.product_sets.len(), 2);
        for set in &out.product_sets {
            assert_eq!(canonical(&set[0]), expected("CCC"));
        }

        let out = run("[#6:3][C:1](=[O:2])[#6:4]>>[#6:3][C:1]([OH:2])[#6:4]", &["CC(=O)C"]);
        assert!(!out.product_sets.is_empty());
        for set in &out.product_sets {
            assert_eq!(canonical(&set[0]), expected("CC(O)C"));
        }
    }

    #[test]
    fn any_bond_keeps_the_reactant_order() {
        let out = run("[C:1]~[C:2]>>[C:1]~[C:2]", &["C=C"]);
        let product = &out.product_sets[0][0];
        let edge = product.bonds().next().unwrap();
        assert_eq!(product.bond(edge).order, SmilesBondOrder::Double);
    }

    #[test]
    fn implicit_bond_between_aromatic_atoms_stays_aromatic() {
        let out = run("[c:1][cH:2]>>[c:1][c:2]O", &["c1ccccc1"]);
        assert_eq!(out.product_sets.len(), 12);
        for set in &out.product_sets {
            assert_eq!(canonical(&set[0]), expected("Oc1ccccc1"));
        }
    }

    #[test]
    fn carried_atoms_regain_hydrogens() {
        // dropping CH(OH) opens cyclohexanol to pentane
        let out = run("[C:1][CH1]([OH1])>>[C:1]", &["OC1CCCCC1"]);
        assert!(!out.product_sets.is_empty());
        for set in &out.product_sets {
            assert_eq!(canonical(&set[0]), expected("CCCCC"));
        }
    }

    #[test]
    fn substitution_keeps_configuration_at_the_centre() {
        let out = run("[C:1][Br:2]>>[C:1]O", &["C[C@H](Br)CC"]);
        assert_eq!(out.product_sets.len(), 1);
        assert_eq!(canonical(&out.product_sets[0][0]), expected("C[C@H](O)CC"));
    }

    #[test]
    fn carried_stereocentre_keeps_configuration() {
        let out = run("[CH3:1][C:2]=[O:3]>>[CH3:1][C:2][OH:3]", &["CC(=O)O[C@@H](C)CC"]);
        assert_eq!(out.product_sets.len(), 1);
        assert_eq!(
            canonical(&out.product_sets[0][0]),
            expected("CC(O)O[C@@H](C)CC")
        );
    }

    #[test]
    fn cartesian_product_respects_cap() {
        let sets = vec![vec![1, 2, 3], vec![4, 5]];
        let mut truncated = false;
        assert_eq!(cartesian_product(&sets, 10, &mut truncated).len(), 6);
        assert!(!truncated);
        assert_eq!(cartesian_product(&sets, 4, &mut truncated).len(), 4);
        assert!(truncated);
    }
}
