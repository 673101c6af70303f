//! Identifier newtypes for permissions and accounts.
//!
//! Identifiers are opaque strings on the wire. Their syntax is only checked
//! by the validator so that externally decoded constraints can be reported
//! with a precise error instead of failing deserialization.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on identifier length.
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 128;

/// Reason an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier is {len} characters long, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("invalid character {ch:?} at offset {offset}")]
    InvalidChar { ch: char, offset: usize },
}

/// Checks an identifier against the DSL grammar `[A-Za-z0-9_.-]{1,max_len}`.
///
/// # Example
///
/// ```
/// use permgate_core::ids::{check_identifier, IdentifierError};
///
/// assert!(check_identifier("acct_1", 128).is_ok());
/// assert_eq!(check_identifier("", 128), Err(IdentifierError::Empty));
/// assert!(check_identifier("bad id", 128).is_err());
/// ```
pub fn check_identifier(value: &str, max_len: usize) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if value.len() > max_len {
        return Err(IdentifierError::TooLong {
            len: value.len(),
            max: max_len,
        });
    }
    match value
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')))
    {
        Some((offset, ch)) => Err(IdentifierError::InvalidChar { ch, offset }),
        None => Ok(()),
    }
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Checks the identifier syntax.
            pub fn check(&self, max_len: usize) -> Result<(), IdentifierError> {
                check_identifier(&self.0, max_len)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

identifier!(
    /// On-chain permission identifier a constraint is attached to.
    PermId
);

identifier!(
    /// Account identifier referenced by stake and weight expressions.
    AccountId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_grammar() {
        assert!(check_identifier("p1", 8).is_ok());
        assert!(check_identifier("a.b-c_d", 8).is_ok());
        assert_eq!(
            check_identifier("abcdefghi", 8),
            Err(IdentifierError::TooLong { len: 9, max: 8 })
        );
        assert_eq!(
            check_identifier("p:1", 8),
            Err(IdentifierError::InvalidChar { ch: ':', offset: 1 })
        );
    }

    #[test]
    fn test_identifier_serializes_transparently() {
        let perm = PermId::new("p1");
        assert_eq!(serde_json::to_string(&perm).unwrap(), "\"p1\"");
        let account: AccountId = serde_json::from_str("\"acct1\"").unwrap();
        assert_eq!(account.as_str(), "acct1");
    }
}
