use std::fmt;

use crate::smarts::SmartsError;

/// Error returned when parsing a reaction SMARTS string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionSmartsError {
    /// No `>>` or `>agents>` separator found.
    MissingSeparator,
    TooManySeparators,
    EmptyReactants,
    EmptyProducts,
    /// A SMARTS component failed to parse.
    InvalidComponent {
        section: &'static str,
        detail: SmartsError,
    },
    /// An atom map number appears on more than one reactant atom.
    DuplicateAtomMap { map_num: u16 },
}

impl fmt::Display for ReactionSmartsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "no '>>' separator found in reaction SMARTS"),
            Self::TooManySeparators => write!(f, "too many '>' separators in reaction SMARTS"),
            Self::EmptyReactants => write!(f, "reaction has no reactant templates"),
            Self::EmptyProducts => write!(f, "reaction has no product templates"),
            Self::InvalidComponent { section, detail } => {
                write!(f, "invalid {section} component: {detail}")
            }
            Self::DuplicateAtomMap { map_num } => {
                write!(f, "atom map number {map_num} is used twice among the reactants")
            }
        }
    }
}

impl std::error::Error for ReactionSmartsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidComponent { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Error returned when applying a reaction to reactant molecules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionError {
    /// The number of reactant molecules does not match the number of templates.
    WrongReactantCount { expected: usize, got: usize },
}

impl fmt::Display for ReactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongReactantCount { expected, got } => {
                write!(f, "expected {expected} reactants, got {got}")
            }
        }
    }
}

impl std::error::Error for ReactionError {}
