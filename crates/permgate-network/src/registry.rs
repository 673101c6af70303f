//! Constraint registry: ids, lookups and the duplicate permission policy.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use permgate_config::DuplicatePolicy;
use permgate_core::{Constraint, PermId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ServiceError;

const PERM_PREFIX_LEN: usize = 32;
const HASH_BYTES: usize = 8;

/// Identifier of a registered constraint.
///
/// Ids are derived from content: the permission id prefix followed by a
/// SHA-256 prefix of the canonical JSON encoding. Registering an identical
/// constraint again yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(String);

impl ConstraintId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derives the content id of a constraint.
    ///
    /// ```
    /// use permgate_core::{BaseConstraint, BoolExpr, Constraint};
    /// use permgate_network::ConstraintId;
    ///
    /// let c = Constraint::new("p1", BoolExpr::base(BaseConstraint::permission_exists("p2")));
    /// let id = ConstraintId::derive(&c);
    /// assert!(id.as_str().starts_with("constraint_p1_"));
    /// assert_eq!(id, ConstraintId::derive(&c.clone()));
    /// ```
    pub fn derive(constraint: &Constraint) -> Self {
        let canonical = serde_json::to_vec(constraint)
            .unwrap_or_else(|_| constraint.to_string().into_bytes());
        let digest = Sha256::digest(&canonical);
        let prefix: String = constraint
            .perm_id
            .as_str()
            .chars()
            .take(PERM_PREFIX_LEN)
            .collect();
        Self(format!(
            "constraint_{prefix}_{}",
            hex::encode(&digest[..HASH_BYTES])
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConstraintId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How an incoming constraint relates to the current registrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No constraint is registered for the permission.
    New,
    /// The identical constraint is already registered.
    Existing,
    /// The permission has a different constraint which will be replaced.
    Replaces(ConstraintId),
}

/// A registered constraint as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredConstraint {
    pub constraint_id: ConstraintId,
    pub constraint: Arc<Constraint>,
}

#[derive(Debug, Default)]
pub struct Registry {
    constraints: BTreeMap<ConstraintId, Arc<Constraint>>,
    by_perm: HashMap<PermId, ConstraintId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `id` may be registered under the given policy.
    pub fn admit(
        &self,
        id: &ConstraintId,
        perm_id: &PermId,
        policy: DuplicatePolicy,
    ) -> Result<Admission, ServiceError> {
        match self.by_perm.get(perm_id) {
            None => Ok(Admission::New),
            Some(existing) if existing == id => Ok(Admission::Existing),
            Some(existing) => match policy {
                DuplicatePolicy::Reject => Err(ServiceError::DuplicateConstraint {
                    perm_id: perm_id.clone(),
                    existing: existing.clone(),
                }),
                DuplicatePolicy::Replace => Ok(Admission::Replaces(existing.clone())),
            },
        }
    }

    pub fn insert(&mut self, id: ConstraintId, constraint: Arc<Constraint>) {
        self.by_perm.insert(constraint.perm_id.clone(), id.clone());
        self.constraints.insert(id, constraint);
    }

    pub fn remove(&mut self, id: &ConstraintId) -> Option<Arc<Constraint>> {
        let constraint = self.constraints.remove(id)?;
        if self.by_perm.get(&constraint.perm_id) == Some(id) {
            self.by_perm.remove(&constraint.perm_id);
        }
        Some(constraint)
    }

    pub fn get(&self, id: &ConstraintId) -> Option<&Arc<Constraint>> {
        self.constraints.get(id)
    }

    pub fn contains(&self, id: &ConstraintId) -> bool {
        self.constraints.contains_key(id)
    }

    /// Registered constraints in id order.
    pub fn list(&self) -> Vec<RegisteredConstraint> {
        self.constraints
            .iter()
            .map(|(id, c)| RegisteredConstraint {
                constraint_id: id.clone(),
                constraint: Arc::clone(c),
            })
            .collect()
    }

    pub fn by_permission(&self, perm_id: &PermId) -> Option<&ConstraintId> {
        self.by_perm.get(perm_id)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use permgate_core::{BaseConstraint, BoolExpr};

    use super::*;

    fn exists(perm: &str, target: &str) -> Constraint {
        Constraint::new(perm, BoolExpr::base(BaseConstraint::permission_exists(target)))
    }

    #[test]
    fn test_ids_are_content_derived() {
        let a = ConstraintId::derive(&exists("p1", "x"));
        let b = ConstraintId::derive(&exists("p1", "y"));
        assert_ne!(a, b);
        assert_eq!(a, ConstraintId::derive(&exists("p1", "x")));
        assert_eq!(a.as_str().len(), "constraint_p1_".len() + 16);
    }

    #[test]
    fn test_long_perm_ids_are_truncated() {
        let perm = "p".repeat(100);
        let id = ConstraintId::derive(&exists(&perm, "x"));
        assert_eq!(id.as_str().len(), "constraint__".len() + PERM_PREFIX_LEN + 16);
    }

    #[test]
    fn test_admission_policies() {
        let mut registry = Registry::new();
        let first = exists("p1", "x");
        let first_id = ConstraintId::derive(&first);
        assert_eq!(
            registry.admit(&first_id, &first.perm_id, DuplicatePolicy::Reject).unwrap(),
            Admission::New
        );
        registry.insert(first_id.clone(), Arc::new(first.clone()));

        assert_eq!(
            registry.admit(&first_id, &first.perm_id, DuplicatePolicy::Reject).unwrap(),
            Admission::Existing
        );

        let second = exists("p1", "y");
        let second_id = ConstraintId::derive(&second);
        let err = registry
            .admit(&second_id, &second.perm_id, DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateConstraint { .. }));
        assert_eq!(
            registry.admit(&second_id, &second.perm_id, DuplicatePolicy::Replace).unwrap(),
            Admission::Replaces(first_id)
        );
    }

    #[test]
    fn test_remove_clears_permission_index() {
        let mut registry = Registry::new();
        let constraint = exists("p1", "x");
        let id = ConstraintId::derive(&constraint);
        registry.insert(id.clone(), Arc::new(constraint));
        assert_eq!(registry.by_permission(&PermId::new("p1")), Some(&id));

        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert_eq!(registry.by_permission(&PermId::new("p1")), None);
        assert!(registry.is_empty());
    }
}
