//! Productions: live compiled constraints with their activation history.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use permgate_core::{Constraint, FactKey};
use serde::{Deserialize, Serialize};

use crate::network::{NodeId, Value};
use crate::registry::ConstraintId;

/// Truth state of a production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Not evaluated since registration.
    #[default]
    Unknown,
    Active,
    Inactive,
    /// The body cannot currently be computed from the known facts.
    Indeterminate,
}

impl ActivationState {
    /// State derived from a root node value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Bool(true) => ActivationState::Active,
            Value::Bool(false) => ActivationState::Inactive,
            _ => ActivationState::Indeterminate,
        }
    }

    pub fn is_active(self) -> bool {
        self == ActivationState::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationState::Unknown => "unknown",
            ActivationState::Active => "active",
            ActivationState::Inactive => "inactive",
            ActivationState::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded transition of a production's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub constraint_id: ConstraintId,
    pub from_state: ActivationState,
    pub to_state: ActivationState,
    pub at: DateTime<Utc>,
    /// Engine-wide sequence number, strictly increasing across all records.
    pub sequence: u64,
}

/// Current state of a production as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStatus {
    pub constraint_id: ConstraintId,
    pub state: ActivationState,
    pub active: bool,
    pub evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Production {
    pub id: ConstraintId,
    pub constraint: Arc<Constraint>,
    pub root: NodeId,
    /// Every fact the body reads, in canonical order.
    pub facts: Vec<FactKey>,
    /// Distinguishes this registration from earlier ones with the same id.
    pub generation: u64,
    pub state: ActivationState,
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Shared with published snapshots; copied only when appended to.
    pub history: Arc<Vec<ActivationRecord>>,
}

impl Production {
    /// Re-derives the state from the root value.
    ///
    /// Appends and returns a record only when the state changes.
    pub fn settle(&mut self, value: Value, at: DateTime<Utc>, sequence: &mut u64) -> Option<ActivationRecord> {
        self.evaluated_at = Some(at);
        let next = ActivationState::from_value(value);
        if next == self.state {
            return None;
        }
        *sequence += 1;
        let record = ActivationRecord {
            constraint_id: self.id.clone(),
            from_state: self.state,
            to_state: next,
            at,
            sequence: *sequence,
        };
        self.state = next;
        Arc::make_mut(&mut self.history).push(record.clone());
        Some(record)
    }

    pub fn status(&self) -> ActivationStatus {
        ActivationStatus {
            constraint_id: self.id.clone(),
            state: self.state,
            active: self.state.is_active(),
            evaluated_at: self.evaluated_at,
        }
    }
}
