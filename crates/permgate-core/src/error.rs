//! Error types for constraint validation

use thiserror::Error;

use crate::ids::IdentifierError;

/// First violation found in a candidate constraint.
///
/// Every variant tied to a node carries a dotted path from the constraint
/// root, e.g. `body.left.right`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The input could not be decoded (bad JSON, unknown `"$"` tag, missing field).
    #[error("malformed constraint: {0}")]
    Malformed(String),

    #[error("invalid identifier at {path}: {reason}")]
    InvalidIdentifier {
        path: String,
        reason: IdentifierError,
    },

    #[error("expression at {path} exceeds the depth limit of {limit}")]
    DepthLimit { path: String, limit: usize },

    #[error("expression at {path} exceeds the node limit of {limit}")]
    NodeLimit { path: String, limit: usize },

    #[error("literal {value} at {path} exceeds the evaluation range")]
    LiteralOutOfRange { path: String, value: u128 },

    #[error("rate-limit period at {path} must be a constant expression")]
    NonConstantPeriod { path: String },
}

impl ValidationError {
    /// Path of the offending node, if the error is tied to one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::Malformed(_) => None,
            ValidationError::InvalidIdentifier { path, .. }
            | ValidationError::DepthLimit { path, .. }
            | ValidationError::NodeLimit { path, .. }
            | ValidationError::LiteralOutOfRange { path, .. }
            | ValidationError::NonConstantPeriod { path } => Some(path),
        }
    }
}

/// Result type alias for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
