//! Single-hop transformation linkage over a compendium of molecular
//! structures.
//!
//! Structures are canonicalized, every rule of a biological (and optionally
//! a chemical) reaction library is applied to every compound, and a product
//! whose truncated identity key matches another compound links the two.

pub mod aromaticity;
pub mod atom;
pub mod bond;
pub mod canonical;
pub mod compendium;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod graph_ops;
pub mod hydrogen;
pub mod kekulize;
pub mod linkage;
pub mod matcher;
pub mod mol;
pub mod products;
pub mod reaction;
pub mod rings;
pub mod rules;
pub mod smarts;
pub mod smiles;
pub mod strip;
pub mod structure;
pub mod substruct;
pub mod traits;

pub use atom::{Atom, Chirality};
pub use bond::{Bond, BondOrder, BondStereo, SmilesBond, SmilesBondOrder};
pub use compendium::{Compendium, Molecule};
pub use config::Config;
pub use element::Element;
pub use engine::TransformationEngine;
pub use error::{Error, Result};
pub use kekulize::{kekulize, KekulizeError};
pub use linkage::{
    BuildOutput, BuildReport, Edge, Execution, LinkageBuilder, LinkageGraph, OutputNames,
};
pub use matcher::{find_matches, IdentityIndex};
pub use mol::Mol;
pub use products::{flatten_and_dedup, PredictedProduct, ProductNode, ProductSet};
pub use reaction::{from_reaction_smarts, Reaction, ReactionOutput};
pub use rings::RingInfo;
pub use rules::{RuleCategory, RuleCompileFailure, RuleLibrary, RuleLibraryError, TransformationRule};
pub use smiles::{from_smiles, parse_smiles, to_canonical_smiles, SmilesError};
pub use structure::{prepare, CanonicalStructure, Canonicalizer, ParseFailure};
pub use traits::HasBondStereo;
