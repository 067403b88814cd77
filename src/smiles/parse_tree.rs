use crate::element::Element;
use crate::smiles::error::SmilesError;
use crate::smiles::tokenizer::{AtomToken, BondToken, ChiralityToken, Token};

#[derive(Debug, Clone)]
pub struct ParseAtom {
    pub element: Element,
    pub is_aromatic: bool,
    pub isotope: u16,
    pub chirality: ChiralityToken,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub is_bracket: bool,
    /// Whether the first entry of `neighbors` is the atom written before
    /// this one (as opposed to the start of a new chain).
    pub has_preceding: bool,
    /// Neighbours in the order they appear in the string. A ring-opening
    /// digit holds its slot even though the partner is only seen later.
    pub neighbors: Vec<Neighbor>,
}

#[derive(Debug, Clone)]
pub struct Neighbor {
    /// Bond symbol as read from this atom towards `atom_idx`.
    pub bond: Option<BondToken>,
    pub atom_idx: usize,
}

#[derive(Debug, Clone)]
pub struct ParseTree {
    pub atoms: Vec<ParseAtom>,
}

struct RingOpen {
    atom: usize,
    bond: Option<BondToken>,
    slot: usize,
}

pub fn build_parse_tree(tokens: &[Token]) -> Result<ParseTree, SmilesError> {
    let mut atoms: Vec<ParseAtom> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut current: Option<usize> = None;
    let mut pending_bond: Option<BondToken> = None;
    let mut ring_opens: Vec<Option<RingOpen>> = (0..100).map(|_| None).collect();

    for token in tokens {
        match token {
            Token::Atom(atom_tok) => {
                let idx = atoms.len();
                atoms.push(parse_atom_from_token(atom_tok));

                if let Some(cur) = current {
                    let bond = pending_bond.take();
                    atoms[cur].neighbors.push(Neighbor {
                        bond,
                        atom_idx: idx,
                    });
                    atoms[idx].neighbors.push(Neighbor {
                        bond: bond.map(BondToken::reversed),
                        atom_idx: cur,
                    });
                    atoms[idx].has_preceding = true;
                } else {
                    pending_bond = None;
                }

                current = Some(idx);
            }
            Token::Bond(b) => {
                pending_bond = Some(*b);
            }
            Token::RingClosure { bond, digit, pos } => {
                let d = *digit as usize;
                let cur = current.ok_or(SmilesError::InvalidRingBond {
                    digit: *digit,
                    pos: *pos,
                })?;
                let here = bond.or(pending_bond.take());

                if let Some(open) = ring_opens[d].take() {
                    if open.atom == cur {
                        return Err(SmilesError::InvalidRingBond {
                            digit: *digit,
                            pos: *pos,
                        });
                    }
                    // both ends as read from the opening atom
                    let from_open = match (open.bond, here.map(BondToken::reversed)) {
                        (None, None) => None,
                        (Some(b), None) | (None, Some(b)) => Some(b),
                        (Some(b1), Some(b2)) if b1 == b2 => Some(b1),
                        _ => return Err(SmilesError::RingBondConflict { digit: *digit }),
                    };
                    atoms[open.atom].neighbors[open.slot] = Neighbor {
                        bond: from_open,
                        atom_idx: cur,
                    };
                    atoms[cur].neighbors.push(Neighbor {
                        bond: from_open.map(BondToken::reversed),
                        atom_idx: open.atom,
                    });
                } else {
                    let slot = atoms[cur].neighbors.len();
                    atoms[cur].neighbors.push(Neighbor {
                        bond: here,
                        atom_idx: usize::MAX,
                    });
                    ring_opens[d] = Some(RingOpen {
                        atom: cur,
                        bond: here,
                        slot,
                    });
                }
            }
            Token::OpenParen(pos) => {
                let cur = current.ok_or(SmilesError::UnmatchedParen { pos: *pos })?;
                stack.push(cur);
            }
            Token::CloseParen(pos) => {
                current = Some(stack.pop().ok_or(SmilesError::UnmatchedParen { pos: *pos })?);
                pending_bond = None;
            }
            Token::Dot(_) => {
                current = None;
                pending_bond = None;
            }
        }
    }

    if !stack.is_empty() {
        return Err(SmilesError::UnmatchedParen { pos: 0 });
    }

    if let Some(digit) = ring_opens.iter().position(Option::is_some) {
        return Err(SmilesError::UnclosedRing {
            digit: digit as u16,
        });
    }

    Ok(ParseTree { atoms })
}

fn parse_atom_from_token(tok: &AtomToken) -> ParseAtom {
    ParseAtom {
        element: tok.element,
        is_aromatic: tok.is_aromatic,
        isotope: tok.isotope,
        chirality: tok.chirality,
        hcount: tok.hcount,
        charge: tok.charge,
        is_bracket: tok.is_bracket,
        has_preceding: false,
        neighbors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::tokenizer::tokenize;

    fn tree(s: &str) -> ParseTree {
        build_parse_tree(&tokenize(s).unwrap()).unwrap()
    }

    #[test]
    fn ethane_tree() {
        let tree = tree("CC");
        assert_eq!(tree.atoms.len(), 2);
        assert_eq!(tree.atoms[0].neighbors.len(), 1);
        assert_eq!(tree.atoms[0].neighbors[0].atom_idx, 1);
        assert!(tree.atoms[1].has_preceding);
        assert!(!tree.atoms[0].has_preceding);
    }

    #[test]
    fn cyclohexane_tree() {
        let tree = tree("C1CCCCC1");
        assert_eq!(tree.atoms.len(), 6);
        for atom in &tree.atoms {
            assert_eq!(atom.neighbors.len(), 2);
        }
    }

    #[test]
    fn ring_opening_keeps_its_textual_slot() {
        // the ring partner of atom 0 is written before its branch
        let tree = tree("C1(O)CC1");
        let order: Vec<usize> = tree.atoms[0].neighbors.iter().map(|n| n.atom_idx).collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn directional_bond_is_stored_outward() {
        let tree = tree("F/C=C/F");
        assert_eq!(tree.atoms[0].neighbors[0].bond, Some(BondToken::Up));
        assert_eq!(tree.atoms[1].neighbors[0].bond, Some(BondToken::Down));
        assert_eq!(tree.atoms[2].neighbors[1].bond, Some(BondToken::Up));
    }

    #[test]
    fn ring_closure_bond_from_either_end() {
        let a = tree("C=1CCC1");
        let b = tree("C1CCC=1");
        assert_eq!(a.atoms[0].neighbors[0].bond, Some(BondToken::Double));
        assert_eq!(b.atoms[0].neighbors[0].bond, Some(BondToken::Double));
    }

    #[test]
    fn conflicting_ring_bonds() {
        let result = build_parse_tree(&tokenize("C=1CCC#1").unwrap());
        assert!(matches!(result, Err(SmilesError::RingBondConflict { digit: 1 })));
    }

    #[test]
    fn branch_tree() {
        let tree = tree("CC(C)C");
        assert_eq!(tree.atoms.len(), 4);
        assert_eq!(tree.atoms[1].neighbors.len(), 3);
    }

    #[test]
    fn unclosed_ring_error() {
        assert!(build_parse_tree(&tokenize("C1CC").unwrap()).is_err());
    }

    #[test]
    fn unmatched_paren_error() {
        assert!(build_parse_tree(&tokenize("C(C").unwrap()).is_err());
    }

    #[test]
    fn disconnected() {
        let tree = tree("[Na+].[Cl-]");
        assert_eq!(tree.atoms.len(), 2);
        assert!(tree.atoms.iter().all(|a| a.neighbors.is_empty()));
    }
}
