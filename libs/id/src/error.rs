//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur when accepting a provider-assigned identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identifier string is empty.
    #[error("{kind} id cannot be empty")]
    Empty { kind: &'static str },

    /// The identifier contains whitespace or control characters.
    #[error("{kind} id contains invalid character {found:?}: '{actual}'")]
    InvalidCharacter {
        kind: &'static str,
        found: char,
        actual: String,
    },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }

    /// The resource kind the rejected identifier was meant for.
    pub fn kind(&self) -> &'static str {
        match self {
            IdError::Empty { kind } | IdError::InvalidCharacter { kind, .. } => kind,
        }
    }
}
