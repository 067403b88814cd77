use crate::element::Element;
use crate::smiles::error::SmilesError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(AtomToken),
    Bond(BondToken),
    RingClosure {
        bond: Option<BondToken>,
        digit: u16,
        pos: usize,
    },
    OpenParen(usize),
    CloseParen(usize),
    Dot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomToken {
    pub element: Element,
    pub is_aromatic: bool,
    pub isotope: u16,
    pub chirality: ChiralityToken,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub atom_class: u16,
    pub is_bracket: bool,
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChiralityToken {
    None,
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondToken {
    Single,
    Double,
    Triple,
    Aromatic,
    Up,
    Down,
}

impl BondToken {
    /// The same bond read from the other end. Only `/` and `\` change.
    pub fn reversed(self) -> BondToken {
        match self {
            BondToken::Up => BondToken::Down,
            BondToken::Down => BondToken::Up,
            other => other,
        }
    }

    pub fn is_directional(self) -> bool {
        matches!(self, BondToken::Up | BondToken::Down)
    }
}

// organic-subset atoms that may appear outside brackets, two-letter symbols first
const ORGANIC: &[(&str, Element, bool)] = &[
    ("Cl", Element::Cl, false),
    ("Br", Element::Br, false),
    ("B", Element::B, false),
    ("C", Element::C, false),
    ("N", Element::N, false),
    ("O", Element::O, false),
    ("P", Element::P, false),
    ("S", Element::S, false),
    ("F", Element::F, false),
    ("I", Element::I, false),
    ("b", Element::B, true),
    ("c", Element::C, true),
    ("n", Element::N, true),
    ("o", Element::O, true),
    ("p", Element::P, true),
    ("s", Element::S, true),
];

pub fn tokenize(input: &str) -> Result<Vec<Token>, SmilesError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if let Some((len, element, aromatic)) = match_organic(&chars, i) {
            tokens.push(Token::Atom(bare_atom(element, aromatic, i)));
            i += len;
            continue;
        }
        match chars[i] {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '[' => {
                let (tok, next) = parse_bracket_atom(&chars, i)?;
                tokens.push(Token::Atom(tok));
                i = next;
            }
            '-' | '=' | '#' | ':' | '/' | '\\' => {
                if !follows_bondable(&tokens) {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: chars[i] });
                }
                let bond = match chars[i] {
                    '-' => BondToken::Single,
                    '=' => BondToken::Double,
                    '#' => BondToken::Triple,
                    ':' => BondToken::Aromatic,
                    '/' => BondToken::Up,
                    _ => BondToken::Down,
                };
                tokens.push(Token::Bond(bond));
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen(i));
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen(i));
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot(i));
                i += 1;
            }
            '%' => {
                let (digit, next) = parse_percent_ring(&chars, i)?;
                let bond = take_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure { bond, digit, pos: i });
                i = next;
            }
            d @ '0'..='9' => {
                let bond = take_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond,
                    digit: (d as u16) - b'0' as u16,
                    pos: i,
                });
                i += 1;
            }
            ch => return Err(SmilesError::UnexpectedChar { pos: i, ch }),
        }
    }

    if let Some(Token::Bond(_)) = tokens.last() {
        return Err(SmilesError::UnexpectedEnd);
    }

    Ok(tokens)
}

fn match_organic(chars: &[char], i: usize) -> Option<(usize, Element, bool)> {
    ORGANIC.iter().find_map(|&(sym, element, aromatic)| {
        let len = sym.len();
        let matches = i + len <= chars.len()
            && sym.chars().zip(&chars[i..i + len]).all(|(a, b)| a == *b);
        matches.then_some((len, element, aromatic))
    })
}

fn bare_atom(element: Element, aromatic: bool, pos: usize) -> AtomToken {
    AtomToken {
        element,
        is_aromatic: aromatic,
        isotope: 0,
        chirality: ChiralityToken::None,
        hcount: None,
        charge: 0,
        atom_class: 0,
        is_bracket: false,
        pos,
    }
}

fn follows_bondable(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        Some(Token::Atom(_))
            | Some(Token::RingClosure { .. })
            | Some(Token::OpenParen(_))
            | Some(Token::CloseParen(_))
    )
}

fn take_pending_bond(tokens: &mut Vec<Token>) -> Option<BondToken> {
    if let Some(Token::Bond(b)) = tokens.last().cloned() {
        tokens.pop();
        return Some(b);
    }
    None
}

fn parse_percent_ring(chars: &[char], start: usize) -> Result<(u16, usize), SmilesError> {
    let i = start + 1;
    if i + 1 >= chars.len() || !chars[i].is_ascii_digit() || !chars[i + 1].is_ascii_digit() {
        return Err(SmilesError::UnexpectedChar {
            pos: start,
            ch: '%',
        });
    }
    let d1 = (chars[i] as u16) - b'0' as u16;
    let d2 = (chars[i + 1] as u16) - b'0' as u16;
    Ok((d1 * 10 + d2, i + 2))
}

fn parse_bracket_atom(chars: &[char], start: usize) -> Result<(AtomToken, usize), SmilesError> {
    let mut i = start + 1; // skip '['

    let isotope = parse_isotope(chars, &mut i).ok_or(SmilesError::InvalidIsotope { pos: start })?;

    let (element, is_aromatic) = parse_bracket_element(chars, &mut i, start)?;

    let chirality = parse_chirality(chars, &mut i);

    let hcount = parse_hcount(chars, &mut i);

    let charge = parse_charge(chars, &mut i, start)?;

    let atom_class =
        parse_atom_class(chars, &mut i).ok_or(SmilesError::InvalidAtomClass { pos: start })?;

    if i >= chars.len() || chars[i] != ']' {
        return Err(SmilesError::UnclosedBracket { pos: start });
    }
    i += 1; // skip ']'

    Ok((
        AtomToken {
            element,
            is_aromatic,
            isotope,
            chirality,
            hcount: Some(hcount.unwrap_or(0)),
            charge,
            atom_class,
            is_bracket: true,
            pos: start,
        },
        i,
    ))
}

fn parse_isotope(chars: &[char], i: &mut usize) -> Option<u16> {
    let mut val: u16 = 0;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        val = val
            .checked_mul(10)?
            .checked_add(chars[*i] as u16 - b'0' as u16)?;
        *i += 1;
    }
    Some(val)
}

fn parse_bracket_element(
    chars: &[char],
    i: &mut usize,
    bracket_start: usize,
) -> Result<(Element, bool), SmilesError> {
    if *i >= chars.len() {
        return Err(SmilesError::UnclosedBracket {
            pos: bracket_start,
        });
    }

    let aromatic_map: &[(&str, Element)] = &[
        ("se", Element::Se),
        ("te", Element::Te),
        ("b", Element::B),
        ("c", Element::C),
        ("n", Element::N),
        ("o", Element::O),
        ("p", Element::P),
        ("s", Element::S),
    ];

    for &(pat, elem) in aromatic_map {
        if *i + pat.len() <= chars.len() {
            let slice: String = chars[*i..*i + pat.len()].iter().collect();
            if slice == pat {
                let after = *i + pat.len();
                let next_is_lower = after < chars.len() && chars[after].is_ascii_lowercase();
                if !next_is_lower || pat.len() == 2 {
                    *i += pat.len();
                    return Ok((elem, true));
                }
            }
        }
    }

    // Try two-char uppercase element first, then one-char
    if *i + 1 < chars.len() && chars[*i].is_ascii_uppercase() && chars[*i + 1].is_ascii_lowercase()
    {
        let sym: String = chars[*i..=*i + 1].iter().collect();
        if let Some(e) = Element::from_symbol(&sym) {
            *i += 2;
            return Ok((e, false));
        }
    }

    if chars[*i].is_ascii_uppercase() {
        let sym: String = chars[*i..=*i].iter().collect();
        if let Some(e) = Element::from_symbol(&sym) {
            *i += 1;
            return Ok((e, false));
        }
    }

    Err(SmilesError::InvalidElement {
        pos: *i,
        text: chars.get(*i).map(|c| c.to_string()).unwrap_or_default(),
    })
}

fn parse_chirality(chars: &[char], i: &mut usize) -> ChiralityToken {
    if *i < chars.len() && chars[*i] == '@' {
        *i += 1;
        if *i < chars.len() && chars[*i] == '@' {
            *i += 1;
            ChiralityToken::Clockwise
        } else {
            ChiralityToken::CounterClockwise
        }
    } else {
        ChiralityToken::None
    }
}

fn parse_hcount(chars: &[char], i: &mut usize) -> Option<u8> {
    if *i < chars.len() && chars[*i] == 'H' {
        *i += 1;
        let mut count: u8 = 1;
        if *i < chars.len() && chars[*i].is_ascii_digit() {
            count = chars[*i] as u8 - b'0';
            *i += 1;
        }
        Some(count)
    } else {
        None
    }
}

fn parse_charge(chars: &[char], i: &mut usize, bracket_start: usize) -> Result<i8, SmilesError> {
    if *i >= chars.len() {
        return Ok(0);
    }

    match chars[*i] {
        '+' => {
            *i += 1;
            if *i < chars.len() && chars[*i] == '+' {
                let mut count: i8 = 1;
                while *i < chars.len() && chars[*i] == '+' {
                    count = count
                        .checked_add(1)
                        .ok_or(SmilesError::InvalidCharge { pos: bracket_start })?;
                    *i += 1;
                }
                Ok(count)
            } else if *i < chars.len() && chars[*i].is_ascii_digit() {
                let mut val: i8 = 0;
                while *i < chars.len() && chars[*i].is_ascii_digit() {
                    val = val
                        .checked_mul(10)
                        .and_then(|v| v.checked_add((chars[*i] as i8) - b'0' as i8))
                        .ok_or(SmilesError::InvalidCharge { pos: bracket_start })?;
                    *i += 1;
                }
                Ok(val)
            } else {
                Ok(1)
            }
        }
        '-' => {
            *i += 1;
            if *i < chars.len() && chars[*i] == '-' {
                let mut count: i8 = -1;
                while *i < chars.len() && chars[*i] == '-' {
                    count = count
                        .checked_sub(1)
                        .ok_or(SmilesError::InvalidCharge { pos: bracket_start })?;
                    *i += 1;
                }
                Ok(count)
            } else if *i < chars.len() && chars[*i].is_ascii_digit() {
                let mut val: i8 = 0;
                while *i < chars.len() && chars[*i].is_ascii_digit() {
                    val = val
                        .checked_mul(10)
                        .and_then(|v| v.checked_add((chars[*i] as i8) - b'0' as i8))
                        .ok_or(SmilesError::InvalidCharge { pos: bracket_start })?;
                    *i += 1;
                }
                Ok(-val)
            } else {
                Ok(-1)
            }
        }
        _ => Ok(0),
    }
}

fn parse_atom_class(chars: &[char], i: &mut usize) -> Option<u16> {
    if *i >= chars.len() || chars[*i] != ':' {
        return Some(0);
    }
    *i += 1;
    let mut val: u16 = 0;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        val = val
            .checked_mul(10)?
            .checked_add(chars[*i] as u16 - b'0' as u16)?;
        *i += 1;
    }
    Some(val)
}
