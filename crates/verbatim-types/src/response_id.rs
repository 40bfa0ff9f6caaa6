//! Response correlation identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest identifier accepted from clients.
const MAX_LEN: usize = 128;

/// Correlation key for one streamed answer, used for cache replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResponseId(String);

impl ResponseId {
    /// Validates and wraps an identifier.
    ///
    /// Identifiers are 1 to 128 ASCII alphanumerics, `-`, or `_`, which keeps
    /// them safe to embed in cache keys and URL paths.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseIdError`] when the identifier is empty, too long, or
    /// contains other characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ResponseIdError> {
        let text: String = raw.into();
        if text.is_empty() {
            return Err(ResponseIdError::Empty);
        }
        if text.len() > MAX_LEN {
            return Err(ResponseIdError::TooLong { len: text.len() });
        }
        if let Some(invalid) = text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ResponseIdError::InvalidCharacter { invalid });
        }
        Ok(Self(text))
    }

    /// Borrows the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for ResponseId {
    type Err = ResponseIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for ResponseId {
    type Error = ResponseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResponseId> for String {
    fn from(value: ResponseId) -> Self {
        value.0
    }
}

/// Errors raised while validating a [`ResponseId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseIdError {
    /// The identifier was empty.
    #[error("response id must not be empty")]
    Empty,
    /// The identifier exceeded the length limit.
    #[error("response id is {len} bytes; the limit is 128")]
    TooLong {
        /// Length of the rejected identifier.
        len: usize,
    },
    /// The identifier contained a disallowed character.
    #[error("response id contains invalid character {invalid:?}")]
    InvalidCharacter {
        /// First offending character.
        invalid: char,
    },
}
