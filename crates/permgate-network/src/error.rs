//! Error types for the activation service

use permgate_core::{FactKey, PermId, ValidationError};
use serde::Serialize;
use thiserror::Error;

use crate::registry::ConstraintId;

/// Failure to obtain a fact from a provider.
///
/// None of these are fatal: the affected leaf becomes indeterminate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("fact {0} could not be resolved")]
    Unresolved(FactKey),

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("fetching fact {0} timed out")]
    Timeout(FactKey),
}

/// Main error type for service operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The constraint was rejected before registration.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The permission already has a different constraint and the policy is reject.
    #[error("permission {perm_id} already has constraint {existing}")]
    DuplicateConstraint {
        perm_id: PermId,
        existing: ConstraintId,
    },

    #[error("constraint {0} not found")]
    NotFound(ConstraintId),

    /// A validated constraint failed to compile (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::DuplicateConstraint { .. } => "duplicate_constraint",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Structured form for transports.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            path: match self {
                ServiceError::Validation(e) => e.path().map(str::to_string),
                _ => None,
            },
        }
    }
}

/// Serializable error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
