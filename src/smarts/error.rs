use std::fmt;

/// Why a SMARTS pattern was rejected. Positions are character offsets into
/// the trimmed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartsError {
    EmptyInput,
    UnexpectedChar { pos: usize, ch: char },
    /// `[` without a closing `]`.
    UnclosedBracket { pos: usize },
    /// A ring-opening digit that never closes. The lowest such digit is
    /// reported.
    UnclosedRing { digit: u16 },
    UnmatchedParen { pos: usize },
    /// `#n` with a missing or out-of-range atomic number.
    InvalidAtomicNum { pos: usize },
    /// `$(` without a closing `)`.
    UnclosedRecursive { pos: usize },
    InvalidSmarts { pos: usize, msg: String },
}

impl SmartsError {
    /// Offset of the offending character, when the error has one.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::EmptyInput | Self::UnclosedRing { .. } => None,
            Self::UnexpectedChar { pos, .. }
            | Self::UnclosedBracket { pos }
            | Self::UnmatchedParen { pos }
            | Self::InvalidAtomicNum { pos }
            | Self::UnclosedRecursive { pos }
            | Self::InvalidSmarts { pos, .. } => Some(*pos),
        }
    }
}

impl fmt::Display for SmartsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty SMARTS pattern"),
            Self::UnexpectedChar { pos, ch } => {
                write!(f, "unexpected character '{ch}' at position {pos}")
            }
            Self::UnclosedBracket { pos } => write!(f, "bracket atom at {pos} is never closed"),
            Self::UnclosedRing { digit } => write!(f, "ring bond {digit} is never closed"),
            Self::UnmatchedParen { pos } => write!(f, "unmatched parenthesis at position {pos}"),
            Self::InvalidAtomicNum { pos } => write!(f, "invalid atomic number at position {pos}"),
            Self::UnclosedRecursive { pos } => {
                write!(f, "recursive SMARTS at {pos} is never closed")
            }
            Self::InvalidSmarts { pos, msg } => write!(f, "{msg} at position {pos}"),
        }
    }
}

impl std::error::Error for SmartsError {}
