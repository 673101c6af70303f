//! Single-writer engine state: registry, network and productions.
//!
//! Every mutation runs to completion here, synchronously, so a caller that
//! holds the engine exclusively never observes a half-applied update. The
//! async [`ConstraintService`](crate::ConstraintService) wraps this type in a
//! mutex and publishes a fresh [`Snapshot`] after each mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use permgate_config::RegistryConfig;
use permgate_core::analysis::referenced_facts;
use permgate_core::{Constraint, Fact, FactKey, PermId};
use tracing::{debug, error, info};

use crate::error::{Result, ServiceError};
use crate::facts::FactUpdate;
use crate::network::{Network, NodeId};
use crate::production::{ActivationRecord, ActivationState, ActivationStatus, Production};
use crate::registry::{Admission, ConstraintId, RegisteredConstraint, Registry};
use crate::state::NetworkState;

/// How an add changed the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationKind {
    Added,
    /// The identical constraint was already registered.
    Unchanged,
    Replaced(ConstraintId),
}

/// Result of [`Engine::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub constraint_id: ConstraintId,
    pub kind: RegistrationKind,
    /// Facts that gained their first subscriber.
    pub new_facts: Vec<FactKey>,
    /// Facts that lost their last subscriber through a replacement.
    pub dropped_facts: Vec<FactKey>,
}

/// Result of [`Engine::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub constraint: Arc<Constraint>,
    pub dropped_facts: Vec<FactKey>,
}

/// What a pull needs to fetch for one production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullPlan {
    pub constraint_id: ConstraintId,
    pub generation: u64,
    /// Network input epoch when the plan was taken. Facts supplied after it
    /// are newer than anything the pull fetched.
    pub epoch: u64,
    pub keys: Vec<FactKey>,
}

/// Result of [`Engine::apply_pull`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Applied {
        status: ActivationStatus,
        records: Vec<ActivationRecord>,
    },
    /// The production was replaced or registered again while the facts were
    /// fetched. Nothing was applied.
    Superseded,
}

/// Immutable read view published after each mutation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub constraints: BTreeMap<ConstraintId, Arc<Constraint>>,
    pub by_permission: HashMap<PermId, ConstraintId>,
    pub statuses: HashMap<ConstraintId, ActivationStatus>,
    pub histories: HashMap<ConstraintId, Arc<Vec<ActivationRecord>>>,
    pub nodes: usize,
}

#[derive(Debug)]
pub struct Engine {
    config: RegistryConfig,
    registry: Registry,
    network: Network,
    productions: HashMap<ConstraintId, Production>,
    /// Histories of removed productions.
    retired: HashMap<ConstraintId, Arc<Vec<ActivationRecord>>>,
    next_generation: u64,
    sequence: u64,
}

impl Engine {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            network: Network::new(),
            productions: HashMap::new(),
            retired: HashMap::new(),
            next_generation: 0,
            sequence: 0,
        }
    }

    /// Registers an already validated constraint.
    ///
    /// The production starts `unknown`. On failure nothing changes; a
    /// replacement only removes the old production after the new one
    /// compiled.
    pub fn add(&mut self, constraint: Constraint) -> Result<Registered> {
        let id = ConstraintId::derive(&constraint);
        let admission = self
            .registry
            .admit(&id, &constraint.perm_id, self.config.duplicate_policy)?;
        if admission == Admission::Existing {
            debug!(event = "constraint_unchanged", constraint_id = %id);
            return Ok(Registered {
                constraint_id: id,
                kind: RegistrationKind::Unchanged,
                new_facts: Vec::new(),
                dropped_facts: Vec::new(),
            });
        }

        let compiled = self.network.compile(&constraint).map_err(|e| {
            error!(
                event = "compile_failed",
                constraint_id = %id,
                perm_id = %constraint.perm_id,
                error = %e,
            );
            ServiceError::Internal(format!("failed to compile {id}: {e}"))
        })?;

        let (kind, dropped_facts) = match admission {
            Admission::Replaces(old) => {
                let dropped = self
                    .remove_production(&old)
                    .map(|removed| removed.dropped_facts)
                    .unwrap_or_default();
                info!(event = "constraint_replaced", constraint_id = %id, replaced = %old);
                (RegistrationKind::Replaced(old), dropped)
            }
            _ => (RegistrationKind::Added, Vec::new()),
        };

        self.next_generation += 1;
        let constraint = Arc::new(constraint);
        let production = Production {
            id: id.clone(),
            constraint: Arc::clone(&constraint),
            root: compiled.root,
            facts: referenced_facts(&constraint).into_iter().collect(),
            generation: self.next_generation,
            state: ActivationState::Unknown,
            evaluated_at: None,
            history: self.retired.remove(&id).unwrap_or_default(),
        };
        info!(
            event = "constraint_added",
            constraint_id = %id,
            perm_id = %constraint.perm_id,
            root = %compiled.root,
            nodes = self.network.len() as u64,
            new_facts = compiled.new_facts.len() as u64,
        );
        self.registry.insert(id.clone(), constraint);
        self.productions.insert(id.clone(), production);

        Ok(Registered {
            constraint_id: id,
            kind,
            new_facts: compiled.new_facts,
            dropped_facts,
        })
    }

    /// Unregisters a constraint and tears down nodes nobody else uses.
    pub fn remove(&mut self, id: &ConstraintId) -> Result<Removed> {
        let removed = self
            .remove_production(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        info!(
            event = "constraint_removed",
            constraint_id = %id,
            nodes = self.network.len() as u64,
            dropped_facts = removed.dropped_facts.len() as u64,
        );
        Ok(removed)
    }

    fn remove_production(&mut self, id: &ConstraintId) -> Option<Removed> {
        let production = self.productions.remove(id)?;
        let constraint = self
            .registry
            .remove(id)
            .unwrap_or_else(|| Arc::clone(&production.constraint));
        let dropped_facts = self.network.release(production.root);
        if self.config.retain_history_on_remove {
            self.retired.insert(id.clone(), production.history);
        }
        Some(Removed {
            constraint,
            dropped_facts,
        })
    }

    /// Applies pushed fact updates as one batch.
    ///
    /// Returns the transitions it caused, in sequence order.
    pub fn apply_facts(
        &mut self,
        updates: impl IntoIterator<Item = FactUpdate>,
    ) -> Vec<ActivationRecord> {
        self.apply(updates, None, Utc::now())
    }

    /// Facts a pull of `id` must fetch.
    pub fn pull_plan(&self, id: &ConstraintId) -> Result<PullPlan> {
        let production = self
            .productions
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        Ok(PullPlan {
            constraint_id: id.clone(),
            generation: production.generation,
            epoch: self.network.epoch(),
            keys: production.facts.clone(),
        })
    }

    /// Applies the facts fetched for `plan` and evaluates the production.
    ///
    /// A fetched fact is dropped if its leaf received an input after the plan
    /// was taken. Fails with `NotFound` only if the production is gone.
    pub fn apply_pull(&mut self, plan: &PullPlan, updates: Vec<FactUpdate>) -> Result<PullOutcome> {
        let current = self
            .productions
            .get(&plan.constraint_id)
            .map(|p| p.generation)
            .ok_or_else(|| ServiceError::NotFound(plan.constraint_id.clone()))?;
        if current != plan.generation {
            debug!(
                event = "pull_superseded",
                constraint_id = %plan.constraint_id,
                generation = plan.generation,
                current = current,
            );
            return Ok(PullOutcome::Superseded);
        }

        let fresh: Vec<FactUpdate> = updates
            .into_iter()
            .filter(|update| match self.network.input_epoch(&update.key) {
                Some(epoch) if epoch > plan.epoch => {
                    debug!(
                        event = "stale_fact_skipped",
                        constraint_id = %plan.constraint_id,
                        fact = %update.key,
                    );
                    false
                }
                _ => true,
            })
            .collect();
        let records = self.apply(fresh, Some(&plan.constraint_id), Utc::now());
        let status = self.status(&plan.constraint_id)?;
        Ok(PullOutcome::Applied { status, records })
    }

    fn apply(
        &mut self,
        updates: impl IntoIterator<Item = FactUpdate>,
        force: Option<&ConstraintId>,
        at: DateTime<Utc>,
    ) -> Vec<ActivationRecord> {
        let mut touched = HashSet::new();
        let mut received = 0u64;
        for update in updates {
            received += 1;
            if self.network.set_fact(&update.key, update.value) {
                touched.insert(update.key);
            }
        }
        let propagation = self.network.propagate();
        debug!(
            event = "propagate",
            received = received,
            changed_facts = touched.len() as u64,
            recomputed = propagation.recomputed as u64,
            changed_nodes = propagation.changed.len() as u64,
        );

        let mut records = Vec::new();
        for production in self.productions.values_mut() {
            let due = force == Some(&production.id)
                || propagation.changed.contains(&production.root)
                || production.facts.iter().any(|k| touched.contains(k));
            if !due {
                continue;
            }
            let value = self.network.value(production.root);
            if let Some(record) = production.settle(value, at, &mut self.sequence) {
                info!(
                    event = "activation",
                    constraint_id = %record.constraint_id,
                    from = %record.from_state,
                    to = %record.to_state,
                    sequence = record.sequence,
                );
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.sequence);
        records
    }

    pub fn status(&self, id: &ConstraintId) -> Result<ActivationStatus> {
        self.productions
            .get(id)
            .map(Production::status)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// Transition history of a live or retained production.
    pub fn history(&self, id: &ConstraintId) -> Result<Vec<ActivationRecord>> {
        if let Some(production) = self.productions.get(id) {
            return Ok(production.history.to_vec());
        }
        self.retired
            .get(id)
            .map(|history| history.to_vec())
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub fn get(&self, id: &ConstraintId) -> Result<Arc<Constraint>> {
        self.registry
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub fn list(&self) -> Vec<RegisteredConstraint> {
        self.registry.list()
    }

    pub fn by_permission(&self, perm_id: &PermId) -> Option<ConstraintId> {
        self.registry.by_permission(perm_id).cloned()
    }

    /// Root node of a production.
    pub fn root(&self, id: &ConstraintId) -> Option<NodeId> {
        self.productions.get(id).map(|p| p.root)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_state(&self) -> NetworkState {
        NetworkState::capture(&self.network, self.productions.values())
    }

    /// Facts currently held by subscribed leaves.
    pub fn known_facts(&self) -> Vec<Fact> {
        self.network
            .subscriptions()
            .into_iter()
            .filter_map(|key| {
                let value = self.network.fact_input(&key)?;
                Some(Fact { key, value })
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut histories = self.retired.clone();
        let mut statuses = HashMap::with_capacity(self.productions.len());
        for (id, production) in &self.productions {
            statuses.insert(id.clone(), production.status());
            histories.insert(id.clone(), Arc::clone(&production.history));
        }
        Snapshot {
            constraints: self
                .registry
                .list()
                .into_iter()
                .map(|r| (r.constraint_id, r.constraint))
                .collect(),
            by_permission: self
                .productions
                .values()
                .map(|p| (p.constraint.perm_id.clone(), p.id.clone()))
                .collect(),
            statuses,
            histories,
            nodes: self.network.len(),
        }
    }
}
