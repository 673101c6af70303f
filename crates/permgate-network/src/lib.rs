//! permgate Network - incremental evaluation of permission constraints
//!
//! This crate provides:
//! - The activation network (interned, reference-counted expression DAG)
//! - Productions with edge-triggered activation history
//! - The constraint registry
//! - The fact provider abstraction with push and pull modes
//! - `ConstraintService`, the async query and registration surface

pub mod engine;
pub mod error;
pub mod facts;
pub mod network;
pub mod production;
pub mod registry;
pub mod service;
pub mod state;


pub use engine::{Engine, PullOutcome, PullPlan, Registered, RegistrationKind, Removed, Snapshot};
pub use error::{ErrorBody, ProviderError, Result, ServiceError};
pub use facts::{FactProvider, FactSink, FactUpdate, InMemoryFactProvider};
pub use network::{Network, NodeId, NodeKind, Value};
pub use production::{ActivationRecord, ActivationState, ActivationStatus};
pub use registry::{ConstraintId, RegisteredConstraint};
pub use service::{ConstraintService, Health, Registration};
pub use state::{NetworkState, NodeView, ProductionView};
