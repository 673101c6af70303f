//! permgate Core - constraint language for delegated permissions
//!
//! This crate provides the pure, synchronous half of permgate:
//! - Expression trees and builders for the constraint DSL
//! - Identifier and fact key types
//! - The validator that admits constraints into the engine
//! - Structural analysis helpers

pub mod analysis;
pub mod ast;
pub mod error;
pub mod fact;
pub mod ids;
pub mod validate;

pub use ast::{BaseConstraint, BoolExpr, CompOp, Constraint, NumExpr};
pub use error::ValidationError;
pub use fact::{Fact, FactKey, FactKeyParseError, FactKind, FactValue};
pub use ids::{AccountId, IdentifierError, PermId};
pub use validate::{validate, ValidationLimits, Validator};
