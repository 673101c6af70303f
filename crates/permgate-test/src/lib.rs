//! Shared test fixtures for permgate crates.
//!
//! - [`constraints`] - scenario constraints and their fact sets
//! - [`strategies`] - proptest strategies over small identifier pools
//! - [`providers`] - a scripted fact provider with call counting and faults
//! - [`reference`] - a direct evaluator used as an oracle for the network
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! permgate-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use permgate_test::constraints::{scenario_b, scenario_b_initial_facts};
//! use permgate_test::providers::ScriptedProvider;
//! ```

pub mod constraints;
pub mod providers;
pub mod reference;
pub mod strategies;

pub use providers::ScriptedProvider;
