//! Structure normalization and identity keys.
//!
//! A raw SMILES string goes through the same pipeline every time: parse,
//! fold explicit hydrogens, kekulize, check valences, perceive aromaticity,
//! drop stereo descriptors that describe nothing, then write canonical
//! SMILES. The identity key is a hash of that output shaped like an
//! InChIKey, so truncating it to the first block ignores stereo and
//! isotopes.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::aromaticity::perceive_aromaticity;
use crate::atom::Atom;
use crate::bond::{Bond, SmilesBond};
use crate::canonical::clear_nonstereo;
use crate::element::Element;
use crate::hydrogen::remove_hs;
use crate::kekulize::{kekulize, KekulizeError};
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::smiles::{parse_smiles, to_canonical_smiles, SmilesError};
use crate::strip::skeleton;

/// Length of the connectivity block of the identity key.
pub const DEFAULT_KEY_LENGTH: usize = 14;
/// Length of the whole identity key, separators included.
pub const FULL_KEY_LENGTH: usize = 27;

const STEREO_BLOCK_LENGTH: usize = 8;

/// Why a structure could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("empty structure")]
    Empty,
    #[error("invalid SMILES: {0}")]
    Syntax(SmilesError),
    #[error(transparent)]
    Kekulize(#[from] KekulizeError),
    #[error("atom {atom} ({symbol}) has valence {valence}, at most {max} is allowed")]
    Valence {
        atom: usize,
        symbol: &'static str,
        valence: u8,
        max: u8,
    },
    #[error("atom {atom} has no element (atomic number {atomic_num})")]
    UnknownElement { atom: usize, atomic_num: u8 },
}

impl From<SmilesError> for ParseFailure {
    fn from(err: SmilesError) -> Self {
        match err {
            SmilesError::EmptyInput => ParseFailure::Empty,
            SmilesError::Kekulize(e) => ParseFailure::Kekulize(e),
            other => ParseFailure::Syntax(other),
        }
    }
}

/// A normalized structure and its identity keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalStructure {
    pub smiles: String,
    /// Prefix of `full_key` used for matching.
    pub identity_key: String,
    pub full_key: String,
}

/// Parses and normalizes `smiles` into the form every comparison in this
/// crate works on: Kekulé bond orders with aromatic flags perceived, no
/// explicit hydrogens and no meaningless stereo descriptors.
pub fn prepare(smiles: &str) -> Result<Mol<Atom, Bond>, ParseFailure> {
    let trimmed = smiles.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }
    prepare_mol(parse_smiles(trimmed)?)
}

/// [`prepare`] for an already built graph, such as a reaction product.
pub fn prepare_mol(mol: Mol<Atom, SmilesBond>) -> Result<Mol<Atom, Bond>, ParseFailure> {
    if mol.atom_count() == 0 {
        return Err(ParseFailure::Empty);
    }
    let mut mol = kekulize(remove_hs(&mol))?;
    check_valences(&mol)?;
    let rings = RingInfo::symmetrized_sssr(&mol);
    perceive_aromaticity(&mut mol, &rings);
    clear_nonstereo(&mut mol, &rings);
    Ok(mol)
}

fn check_valences(mol: &Mol<Atom, Bond>) -> Result<(), ParseFailure> {
    for idx in mol.atoms() {
        let atom = mol.atom(idx);
        let element =
            Element::from_atomic_num(atom.atomic_num).ok_or(ParseFailure::UnknownElement {
                atom: idx.index(),
                atomic_num: atom.atomic_num,
            })?;
        let Some(&max) = element.allowed_valences(atom.formal_charge).iter().max() else {
            continue;
        };
        let valence = mol
            .bonds_of(idx)
            .map(|e| mol.bond(e).order.valence())
            .fold(atom.hydrogen_count, u8::saturating_add);
        if valence > max {
            return Err(ParseFailure::Valence {
                atom: idx.index(),
                symbol: element.symbol(),
                valence,
                max,
            });
        }
    }
    Ok(())
}

/// Turns structures into canonical SMILES plus an identity key truncated to
/// `key_length` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canonicalizer {
    key_length: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl Canonicalizer {
    /// `key_length` is clamped to `1..=27`.
    pub fn new(key_length: usize) -> Self {
        Self {
            key_length: key_length.clamp(1, FULL_KEY_LENGTH),
        }
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn canonicalize(&self, raw: &str) -> Result<CanonicalStructure, ParseFailure> {
        let mol = prepare(raw)?;
        Ok(self.describe(&mol))
    }

    pub fn canonicalize_mol(
        &self,
        mol: Mol<Atom, SmilesBond>,
    ) -> Result<CanonicalStructure, ParseFailure> {
        let mol = prepare_mol(mol)?;
        Ok(self.describe(&mol))
    }

    /// Canonical form of a molecule that has already been through
    /// [`prepare`].
    pub fn describe(&self, mol: &Mol<Atom, Bond>) -> CanonicalStructure {
        let smiles = to_canonical_smiles(mol);
        let connectivity = to_canonical_smiles(&skeleton(mol));
        let full_key = format!(
            "{}-{}SA-N",
            hash_letters(&connectivity, DEFAULT_KEY_LENGTH),
            hash_letters(&smiles, STEREO_BLOCK_LENGTH)
        );
        CanonicalStructure {
            identity_key: full_key[..self.key_length].to_string(),
            full_key,
            smiles,
        }
    }
}

/// Upper-case letters drawn from the SHA-256 digest of `text`.
fn hash_letters(text: &str, len: usize) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .take(len)
        .map(|b| char::from(b'A' + b % 26))
        .collect()
}
