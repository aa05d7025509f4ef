use thiserror::Error;

use crate::parser::ParseError;
use crate::translator::CodegenError;

/// Broad class of a translation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The line could not be parsed.
    Syntax,
    /// Well-formed input naming something that cannot be addressed.
    Semantic,
    /// The translator itself misbehaved.
    Internal,
}

/// Why a unit name cannot be used.
///
/// Unit names become the prefix of static and label symbols, so they must
/// be symbols themselves, contain no `:` scope separator and be unique
/// within a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitNameError {
    #[error("unit name is empty")]
    Empty,

    #[error("unit name cannot start with a digit")]
    LeadingDigit,

    #[error("unit name cannot contain `{0}`")]
    InvalidChar(char),

    #[error("unit name is reserved")]
    Reserved,

    #[error("a unit with this name was already added")]
    Duplicate,
}

/// A failure that aborted one compilation unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{unit}: {source}")]
    Parse { unit: String, source: ParseError },

    #[error("{unit}: line {line}: cannot translate `{command}`: {source}")]
    Codegen {
        unit: String,
        line: usize,
        command: String,
        source: CodegenError,
    },

    #[error("unit `{unit}`: {source}")]
    UnitName { unit: String, source: UnitNameError },

    #[error("bootstrap: {0}")]
    Bootstrap(#[source] CodegenError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { source, .. } if source.kind.is_semantic() => ErrorKind::Semantic,
            Error::Parse { .. } => ErrorKind::Syntax,
            Error::Codegen { source, .. } | Error::Bootstrap(source) if source.is_internal() => {
                ErrorKind::Internal
            }
            Error::Codegen { .. } | Error::Bootstrap(_) | Error::UnitName { .. } => {
                ErrorKind::Semantic
            }
        }
    }

    /// The unit that failed, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Error::Parse { unit, .. }
            | Error::Codegen { unit, .. }
            | Error::UnitName { unit, .. } => Some(unit),
            Error::Bootstrap(_) => None,
        }
    }
}
