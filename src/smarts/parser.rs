use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::atom::Chirality;
use crate::element::Element;
use crate::mol::{permutation_parity, AtomId, Mol};

use super::error::SmartsError;
use super::query::{AtomExpr, BondExpr};
use super::template_reference;

/// Neighbours of one atom in the order they are written. A ring-opening
/// digit holds `None` until its partner closes the ring.
#[derive(Default)]
struct WrittenOrder {
    has_preceding: bool,
    slots: Vec<Option<NodeIndex>>,
}

struct RingOpen {
    atom: NodeIndex,
    slot: usize,
    bond: Option<BondExpr>,
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            input,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos > start {
            let s: String = self.chars[start..self.pos].iter().collect();
            s.parse().ok()
        } else {
            None
        }
    }

    fn parse_count(&mut self, default: u32) -> Result<u8, SmartsError> {
        let pos = self.pos;
        let n = self.parse_number().unwrap_or(default);
        u8::try_from(n).map_err(|_| SmartsError::InvalidSmarts {
            pos,
            msg: format!("count {n} out of range"),
        })
    }

    fn parse_smarts(&mut self) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
        let mut mol = Mol::new();
        let mut written: Vec<WrittenOrder> = Vec::new();
        let mut stack: Vec<(NodeIndex, Option<BondExpr>)> = Vec::new();
        let mut current: Option<NodeIndex> = None;
        let mut pending_bond: Option<BondExpr> = None;
        let mut ring_map: HashMap<u16, RingOpen> = HashMap::new();

        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let Some(cur) = current else {
                        return Err(SmartsError::UnmatchedParen { pos: self.pos });
                    };
                    self.pos += 1;
                    stack.push((cur, pending_bond.take()));
                }
                ')' => {
                    let Some((prev, saved_bond)) = stack.pop() else {
                        return Err(SmartsError::UnmatchedParen { pos: self.pos });
                    };
                    self.pos += 1;
                    current = Some(prev);
                    pending_bond = saved_bond;
                }
                '.' => {
                    self.pos += 1;
                    current = None;
                    pending_bond = None;
                }
                '-' | '=' | '#' | '~' | ':' | '/' | '\\' | '@' | '!' => {
                    if pending_bond.is_some() {
                        return Err(SmartsError::InvalidSmarts {
                            pos: self.pos,
                            msg: "consecutive bond expressions".into(),
                        });
                    }
                    pending_bond = Some(self.parse_bond_expr()?);
                }
                '0'..='9' | '%' => {
                    let digit_pos = self.pos;
                    let digit = self.parse_ring_closure()?;
                    let Some(cur) = current else {
                        return Err(SmartsError::InvalidSmarts {
                            pos: digit_pos,
                            msg: "ring closure without preceding atom".into(),
                        });
                    };
                    match ring_map.remove(&digit) {
                        Some(open) => {
                            let bond = pending_bond
                                .take()
                                .or(open.bond)
                                .unwrap_or(BondExpr::SingleOrAromatic);
                            mol.add_bond(open.atom, cur, bond);
                            written[open.atom.index()].slots[open.slot] = Some(cur);
                            written[cur.index()].slots.push(Some(open.atom));
                        }
                        None => {
                            let slot = written[cur.index()].slots.len();
                            written[cur.index()].slots.push(None);
                            ring_map.insert(
                                digit,
                                RingOpen {
                                    atom: cur,
                                    slot,
                                    bond: pending_bond.take(),
                                },
                            );
                        }
                    }
                }
                _ => {
                    let atom_expr = if ch == '[' {
                        self.parse_bracket_atom()?
                    } else {
                        self.parse_bare_atom()?
                    };
                    let idx = mol.add_atom(atom_expr);
                    written.push(WrittenOrder::default());
                    if let Some(prev) = current {
                        let bond = pending_bond.take().unwrap_or(BondExpr::SingleOrAromatic);
                        mol.add_bond(prev, idx, bond);
                        written[prev.index()].slots.push(Some(idx));
                        written[idx.index()].has_preceding = true;
                        written[idx.index()].slots.push(Some(prev));
                    } else if pending_bond.is_some() {
                        return Err(SmartsError::InvalidSmarts {
                            pos: self.pos,
                            msg: "bond without preceding atom".into(),
                        });
                    }
                    current = Some(idx);
                }
            }
        }

        if !stack.is_empty() {
            return Err(SmartsError::UnmatchedParen { pos: self.pos });
        }
        if let Some(&digit) = ring_map.keys().min() {
            return Err(SmartsError::UnclosedRing { digit });
        }
        if pending_bond.is_some() {
            return Err(SmartsError::InvalidSmarts {
                pos: self.pos,
                msg: "dangling bond".into(),
            });
        }

        normalize_chirality(&mut mol, &written);
        Ok(mol)
    }

    fn parse_ring_closure(&mut self) -> Result<u16, SmartsError> {
        let start = self.pos;
        if self.peek() == Some('%') {
            self.pos += 1;
            match (self.peek_at(0), self.peek_at(1)) {
                (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit() => {
                    self.pos += 2;
                    let d1 = a as u16 - '0' as u16;
                    let d2 = b as u16 - '0' as u16;
                    Ok(d1 * 10 + d2)
                }
                _ => Err(SmartsError::InvalidSmarts {
                    pos: start,
                    msg: "expected two digits after %".into(),
                }),
            }
        } else {
            let d = self.chars[self.pos] as u16 - '0' as u16;
            self.pos += 1;
            Ok(d)
        }
    }

    fn parse_bond_expr(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_bond_or()?);
        }
        Ok(join_bonds(parts, BondExpr::And))
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_and()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_bond_and()?);
        }
        Ok(join_bonds(parts, BondExpr::Or))
    }

    fn parse_bond_and(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_not()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.pos += 1;
                    parts.push(self.parse_bond_not()?);
                }
                Some(c) if is_bond_start(c) => parts.push(self.parse_bond_not()?),
                _ => break,
            }
        }
        Ok(join_bonds(parts, BondExpr::And))
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            return Ok(BondExpr::Not(Box::new(self.parse_bond_not()?)));
        }
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Err(SmartsError::InvalidSmarts {
                pos,
                msg: "expected bond primitive".into(),
            });
        };
        self.pos += 1;
        match ch {
            '-' => Ok(BondExpr::Single),
            '=' => Ok(BondExpr::Double),
            '#' => Ok(BondExpr::Triple),
            '~' => Ok(BondExpr::True),
            ':' => Ok(BondExpr::Aromatic),
            '/' => Ok(BondExpr::Up),
            '\\' => Ok(BondExpr::Down),
            '@' => Ok(BondExpr::Ring),
            _ => Err(SmartsError::UnexpectedChar { pos, ch }),
        }
    }

    fn parse_bare_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let ch = self.chars[self.pos];
        match ch {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::True)
            }
            'A' if !self.peek_at(1).is_some_and(|c| c.is_ascii_lowercase()) => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'a' => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            'c' | 'n' | 'o' | 's' | 'p' | 'b' => {
                self.pos += 1;
                let element = Element::from_symbol(&ch.to_ascii_uppercase().to_string())
                    .ok_or(SmartsError::UnexpectedChar { pos: start, ch })?;
                Ok(AtomExpr::Element {
                    atomic_num: element.atomic_num(),
                    aromatic: Some(true),
                })
            }
            _ if ch.is_ascii_uppercase() => {
                let two = self.peek_at(1).map(|next| format!("{ch}{next}"));
                let symbol = match two.as_deref() {
                    Some(s @ ("Cl" | "Br")) => s.to_string(),
                    _ => ch.to_string(),
                };
                let element = Element::from_symbol(&symbol)
                    .filter(|e| e.is_organic_subset())
                    .ok_or(SmartsError::UnexpectedChar { pos: start, ch })?;
                self.pos += symbol.len();
                Ok(AtomExpr::Element {
                    atomic_num: element.atomic_num(),
                    aromatic: Some(false),
                })
            }
            _ => Err(SmartsError::UnexpectedChar { pos: start, ch }),
        }
    }

    /// Uppercase symbol with an optional lowercase second letter, preferring
    /// the two-letter element when one exists.
    fn parse_element_symbol(&mut self) -> Result<Element, SmartsError> {
        let start = self.pos;
        let ch = self.chars[start];
        if let Some(next) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
            if let Some(element) = Element::from_symbol(&format!("{ch}{next}")) {
                self.pos += 2;
                return Ok(element);
            }
        }
        match Element::from_symbol(&ch.to_string()) {
            Some(element) => {
                self.pos += 1;
                Ok(element)
            }
            None => Err(SmartsError::UnexpectedChar { pos: start, ch }),
        }
    }

    fn parse_bracket_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let bracket_start = self.pos;
        self.pos += 1;

        let mut expr = self.parse_semicolon_expr()?;

        if self.peek() == Some(':') {
            self.pos += 1;
            let pos = self.pos;
            let class = self
                .parse_number()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or(SmartsError::InvalidSmarts {
                    pos,
                    msg: "expected atom map number after ':'".into(),
                })?;
            expr = flatten_and(vec![expr, AtomExpr::AtomMapClass(class)]);
        }

        if self.peek() != Some(']') {
            return Err(SmartsError::UnclosedBracket { pos: bracket_start });
        }
        self.pos += 1;
        Ok(expr)
    }

    fn parse_semicolon_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_comma_expr()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_comma_expr()?);
        }
        Ok(flatten_and(parts))
    }

    fn parse_comma_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_high_and_expr()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_high_and_expr()?);
        }
        Ok(flatten_or(parts))
    }

    fn parse_high_and_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = Vec::new();
        while let Some(ch) = self.peek() {
            match ch {
                ']' | ',' | ';' | ':' => break,
                '&' => self.pos += 1,
                _ => parts.push(self.parse_not_expr()?),
            }
        }
        if parts.is_empty() {
            Ok(AtomExpr::True)
        } else {
            Ok(flatten_and(parts))
        }
    }

    fn parse_not_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            Ok(AtomExpr::Not(Box::new(self.parse_not_expr()?)))
        } else {
            self.parse_primitive()
        }
    }

    fn parse_primitive(&mut self) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Err(SmartsError::InvalidSmarts {
                pos,
                msg: "expected atom primitive".into(),
            });
        };

        match ch {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::True)
            }
            'A' if !self.peek_at(1).is_some_and(|c| c.is_ascii_lowercase()) => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'a' if self.peek_at(1) != Some('s') => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            '#' => {
                self.pos += 1;
                let num = self
                    .parse_number()
                    .filter(|n| (1..=118).contains(n))
                    .ok_or(SmartsError::InvalidAtomicNum { pos: self.pos })?;
                Ok(AtomExpr::Element {
                    atomic_num: num as u8,
                    aromatic: None,
                })
            }
            'D' => {
                self.pos += 1;
                Ok(AtomExpr::Degree(self.parse_count(1)?))
            }
            'v' => {
                self.pos += 1;
                Ok(AtomExpr::Valence(self.parse_count(1)?))
            }
            'X' => {
                self.pos += 1;
                Ok(AtomExpr::Connectivity(self.parse_count(1)?))
            }
            'H' if self.is_hydrogen_element() => {
                self.pos += 1;
                Ok(AtomExpr::Element {
                    atomic_num: 1,
                    aromatic: Some(false),
                })
            }
            'H' => {
                self.pos += 1;
                Ok(AtomExpr::TotalHCount(self.parse_count(1)?))
            }
            'h' => {
                self.pos += 1;
                Ok(AtomExpr::ImplicitHCount(self.parse_count(1)?))
            }
            'R' => {
                self.pos += 1;
                match self.parse_number() {
                    Some(n) => Ok(AtomExpr::RingMembership(n.min(255) as u8)),
                    None => Ok(AtomExpr::InRing),
                }
            }
            'r' => {
                self.pos += 1;
                match self.parse_number() {
                    Some(0) => Ok(AtomExpr::RingMembership(0)),
                    Some(n) => Ok(AtomExpr::SmallestRingSize(n.min(255) as u8)),
                    None => Ok(AtomExpr::InRing),
                }
            }
            'x' => {
                self.pos += 1;
                Ok(AtomExpr::RingBondCount(self.parse_count(1)?))
            }
            '@' => {
                self.pos += 1;
                if self.peek() == Some('@') {
                    self.pos += 1;
                    Ok(AtomExpr::Chirality(Chirality::Cw))
                } else {
                    Ok(AtomExpr::Chirality(Chirality::Ccw))
                }
            }
            '+' | '-' => self.parse_charge(ch),
            '$' => {
                self.pos += 1;
                if self.peek() != Some('(') {
                    return Err(SmartsError::UnclosedRecursive { pos: self.pos });
                }
                self.pos += 1;
                let inner = self.extract_balanced_parens()?;
                Ok(AtomExpr::Recursive(Box::new(parse(inner)?)))
            }
            _ if ch.is_ascii_digit() => {
                let n = self.parse_number().unwrap_or(0);
                let isotope = u16::try_from(n).map_err(|_| SmartsError::InvalidSmarts {
                    pos,
                    msg: format!("isotope {n} out of range"),
                })?;
                Ok(AtomExpr::Isotope(isotope))
            }
            _ if ch.is_ascii_lowercase() => self.parse_aromatic_symbol(),
            _ if ch.is_ascii_uppercase() => {
                let element = self.parse_element_symbol()?;
                Ok(AtomExpr::Element {
                    atomic_num: element.atomic_num(),
                    aromatic: Some(false),
                })
            }
            _ => Err(SmartsError::UnexpectedChar { pos, ch }),
        }
    }

    /// `+`, `++`, `+2`, and the negative forms.
    fn parse_charge(&mut self, sign: char) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos;
        self.pos += 1;
        let mut magnitude = 1i32;
        if let Some(n) = self.parse_number() {
            magnitude = n as i32;
        } else {
            while self.peek() == Some(sign) {
                self.pos += 1;
                magnitude += 1;
            }
        }
        let value = if sign == '-' { -magnitude } else { magnitude };
        i8::try_from(value)
            .map(AtomExpr::Charge)
            .map_err(|_| SmartsError::InvalidSmarts {
                pos,
                msg: format!("charge {value} out of range"),
            })
    }

    /// `[H]`, `[H+]`, `[2H]` and `[H:1]` name the element; anywhere else `H`
    /// is a hydrogen count.
    fn is_hydrogen_element(&self) -> bool {
        let mut before = self.pos;
        while before > 0 && self.chars[before - 1].is_ascii_digit() {
            before -= 1;
        }
        let at_start = before > 0 && self.chars[before - 1] == '[';
        at_start && matches!(self.peek_at(1), Some(']' | ':' | '+' | '-'))
    }

    fn parse_aromatic_symbol(&mut self) -> Result<AtomExpr, SmartsError> {
        const AROMATIC: [(&str, u8); 9] = [
            ("se", 34),
            ("as", 33),
            ("te", 52),
            ("b", 5),
            ("c", 6),
            ("n", 7),
            ("o", 8),
            ("p", 15),
            ("s", 16),
        ];
        let start = self.pos;
        for (symbol, atomic_num) in AROMATIC {
            let len = symbol.len();
            let matches = self.chars.len() >= start + len
                && symbol.chars().zip(&self.chars[start..]).all(|(a, &b)| a == b);
            if matches {
                self.pos += len;
                return Ok(AtomExpr::Element {
                    atomic_num,
                    aromatic: Some(true),
                });
            }
        }
        Err(SmartsError::UnexpectedChar {
            pos: start,
            ch: self.chars[start],
        })
    }

    fn extract_balanced_parens(&mut self) -> Result<&'a str, SmartsError> {
        let start_pos = self.pos;
        let begin_byte: usize = self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum();
        let mut depth = 1;

        while let Some(ch) = self.peek() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let len: usize = self.chars[start_pos..self.pos]
                            .iter()
                            .map(|c| c.len_utf8())
                            .sum();
                        self.pos += 1;
                        return Ok(&self.input[begin_byte..begin_byte + len]);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        Err(SmartsError::UnclosedRecursive { pos: start_pos })
    }
}

fn is_bond_start(c: char) -> bool {
    matches!(c, '-' | '=' | '#' | '~' | ':' | '/' | '\\' | '@' | '!')
}

fn join_bonds(mut parts: Vec<BondExpr>, join: fn(Vec<BondExpr>) -> BondExpr) -> BondExpr {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        join(parts)
    }
}

fn flatten_and(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flattened = Vec::new();
    for p in parts {
        match p {
            AtomExpr::And(inner) => flattened.extend(inner),
            other => flattened.push(other),
        }
    }
    if flattened.len() == 1 {
        flattened.remove(0)
    } else {
        AtomExpr::And(flattened)
    }
}

fn flatten_or(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flattened = Vec::new();
    for p in parts {
        match p {
            AtomExpr::Or(inner) => flattened.extend(inner),
            other => flattened.push(other),
        }
    }
    if flattened.len() == 1 {
        flattened.remove(0)
    } else {
        AtomExpr::Or(flattened)
    }
}

/// Re-expresses each `@`/`@@` from written order into the reference order
/// of [`template_reference`].
fn normalize_chirality(mol: &mut Mol<AtomExpr, BondExpr>, written: &[WrittenOrder]) {
    let atoms: Vec<NodeIndex> = mol.atoms().collect();
    for idx in atoms {
        let expr = mol.atom(idx);
        if expr.chirality() == Chirality::None {
            continue;
        }
        let order = &written[idx.index()];
        let mut from: Vec<AtomId> = order.slots.iter().flatten().map(|&n| AtomId::Node(n)).collect();
        if expr.explicit_h().unwrap_or(0) > 0 {
            from.insert(usize::from(order.has_preceding).min(from.len()), AtomId::ImplicitH(idx));
        }
        let even = permutation_parity(&from, &template_reference(mol, idx));
        mol.atom_mut(idx).map_chirality(&|c| c.permuted(even));
    }
}

pub fn parse(input: &str) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SmartsError::EmptyInput);
    }
    Parser::new(trimmed).parse_smarts()
}
