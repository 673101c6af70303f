//! permgate - incremental evaluation of delegated-permission constraints
//!
//! Register constraints once; activation states stay current as facts change.
//!
//! # Example
//!
//! ```rust
//! use permgate::prelude::*;
//!
//! let constraint = Constraint::new(
//!     "p1",
//!     BoolExpr::comp(CompOp::Gte, NumExpr::stake_of("acct1"), NumExpr::literal(1000)),
//! );
//! assert!(validate(&constraint).is_ok());
//! assert_eq!(constraint.body.to_string(), "(stake-of(acct1) >= 1000)");
//! ```

// Constraint language
pub use permgate_core::{
    analysis, validate, AccountId, BaseConstraint, BoolExpr, CompOp, Constraint, Fact, FactKey,
    FactValue, NumExpr, PermId, ValidationError, ValidationLimits, Validator,
};

// Configuration
pub use permgate_config::{ConfigError, DuplicatePolicy, EngineConfig};

// Engine and query surface
pub use permgate_network::{
    ActivationRecord, ActivationState, ActivationStatus, ConstraintId, ConstraintService, ErrorBody,
    FactProvider, FactSink, FactUpdate, Health, InMemoryFactProvider, NetworkState, ProviderError,
    Registration, ServiceError,
};

#[cfg(feature = "console")]
pub mod console;

mod service;
pub use service::{start, CONFIG_FILE};

pub mod prelude {
    pub use super::{
        validate, BaseConstraint, BoolExpr, CompOp, Constraint, FactKey, FactValue, NumExpr,
    };
    pub use super::{
        ActivationState, ConstraintId, ConstraintService, EngineConfig, FactProvider,
        InMemoryFactProvider, ServiceError,
    };
}
