//! Entity identifier resolution.
//!
//! # Responsibility
//! - Generate fresh identifiers for new rows.
//! - Parse caller-supplied identifier text into canonical UUIDs.
//!
//! # Invariants
//! - Empty supplied text always yields a newly generated identifier.
//! - Non-empty text that fails to parse is an error; it is never replaced
//!   by a generated value.
//! - The provider holds no mutable state and is safe to share across threads.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Supplied identifier text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    Malformed { value: String, reason: String },
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { value, reason } => {
                write!(f, "invalid identifier `{value}`: {reason}")
            }
        }
    }
}

impl Error for IdentityError {}

/// Stateless identifier source injected into repositories.
///
/// Generated identifiers are random (v4) UUIDs drawn from the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProvider;

impl IdentityProvider {
    pub fn new() -> Self {
        Self
    }

    /// Returns a freshly generated identifier.
    pub fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Generates when `supplied` is empty, otherwise parses it.
    ///
    /// # Errors
    /// - `IdentityError::Malformed` when non-empty text is not a UUID.
    pub fn resolve(&self, supplied: &str) -> Result<Uuid, IdentityError> {
        if supplied.is_empty() {
            return Ok(self.generate());
        }
        self.parse(supplied)
    }

    /// Parses identifier text. Empty text is malformed here.
    pub fn parse(&self, text: &str) -> Result<Uuid, IdentityError> {
        if text.is_empty() {
            return Err(IdentityError::Malformed {
                value: String::new(),
                reason: "identifier is empty".to_string(),
            });
        }
        Uuid::parse_str(text).map_err(|err| IdentityError::Malformed {
            value: text.to_string(),
            reason: err.to_string(),
        })
    }

    /// Parses a list of identifiers, collapsing duplicates while keeping the
    /// first occurrence order.
    pub fn parse_unique(&self, texts: &[String]) -> Result<Vec<Uuid>, IdentityError> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(texts.len());
        for text in texts {
            let id = self.parse(text)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
