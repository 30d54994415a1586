//! # volsnap-id
//!
//! Typed wrappers for the opaque identifiers a block-storage provider
//! assigns to instances, volumes and snapshots.
//!
//! ## Design Principles
//!
//! - Identifiers are provider-generated and treated as opaque
//! - Each resource kind gets its own type so they cannot be mixed
//! - Identifiers travel as ordered sequences of values, never as
//!   delimiter-joined text that has to be split again
//! - Serialization is the raw provider string

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Checks that `s` is acceptable as an identifier of the given kind.
#[doc(hidden)]
pub fn validate(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty { kind });
    }

    if let Some(found) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdError::InvalidCharacter {
            kind,
            found,
            actual: s.to_string(),
        });
    }

    Ok(())
}
