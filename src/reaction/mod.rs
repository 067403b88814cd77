pub mod error;
mod parser;
mod runner;

pub use error::{ReactionError, ReactionSmartsError};
pub use parser::parse_reaction_smarts;
pub use runner::ReactionOutput;

use crate::mol::Mol;
use crate::smarts::{AtomExpr, BondExpr};

/// A compiled reaction SMARTS.
///
/// Reactant and product templates are matched up through atom map classes.
/// Agent templates are kept for completeness and never take part in
/// [`Reaction::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub(crate) reactant_templates: Vec<Mol<AtomExpr, BondExpr>>,
    pub(crate) product_templates: Vec<Mol<AtomExpr, BondExpr>>,
    pub(crate) agent_templates: Vec<Mol<AtomExpr, BondExpr>>,
}

impl Reaction {
    pub fn reactant_templates(&self) -> &[Mol<AtomExpr, BondExpr>] {
        &self.reactant_templates
    }

    pub fn product_templates(&self) -> &[Mol<AtomExpr, BondExpr>] {
        &self.product_templates
    }

    pub fn agent_templates(&self) -> &[Mol<AtomExpr, BondExpr>] {
        &self.agent_templates
    }

    pub fn reactant_count(&self) -> usize {
        self.reactant_templates.len()
    }
}

pub fn from_reaction_smarts(s: &str) -> Result<Reaction, ReactionSmartsError> {
    parse_reaction_smarts(s)
}
