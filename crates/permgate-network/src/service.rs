//! Async query and registration surface over the engine.
//!
//! Writers serialize on a synchronous mutex that is never held across an
//! `.await`. Readers get the latest published [`Snapshot`] and never wait for
//! a propagation in progress. Provider calls happen with no engine lock held.
//! A pull whose production was replaced meanwhile starts over, and fetched
//! facts never overwrite inputs pushed after the pull began.
//!
//! Provider subscription changes go through one async gate and are derived
//! from the network's subscriptions at the time they run, so an unsubscribe
//! can never cancel a subscription taken by a later registration.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use permgate_config::EngineConfig;
use permgate_core::{Constraint, Fact, FactKey, FactValue, PermId, Validator};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{Engine, PullOutcome, RegistrationKind, Snapshot};
use crate::error::{ProviderError, Result, ServiceError};
use crate::facts::{FactProvider, FactSink, FactUpdate};
use crate::production::{ActivationRecord, ActivationStatus};
use crate::registry::{ConstraintId, RegisteredConstraint};
use crate::state::NetworkState;

const TRANSITION_CHANNEL_CAPACITY: usize = 1024;

/// Pulls attempted before settling for the cached state of a production
/// that keeps being replaced.
const MAX_PULL_ATTEMPTS: usize = 3;

/// Reply to a successful add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub constraint_id: ConstraintId,
    /// Constraint displaced under the replace policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ConstraintId>,
}

/// Liveness report. Never touches the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub constraints: usize,
    pub nodes: usize,
}

/// Registry, activation network and query layer behind one handle.
///
/// ```
/// use std::sync::Arc;
/// use permgate_config::EngineConfig;
/// use permgate_core::{BaseConstraint, BoolExpr, Constraint, FactKey};
/// use permgate_network::{ActivationState, ConstraintService, InMemoryFactProvider};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # rt.block_on(async {
/// let provider = Arc::new(InMemoryFactProvider::new());
/// provider.set(FactKey::permission_exists("p1"), true);
/// let service = ConstraintService::new(EngineConfig::default(), provider);
///
/// let constraint = Constraint::new(
///     "p2",
///     BoolExpr::base(BaseConstraint::permission_exists("p1")),
/// );
/// let registration = service.add(constraint).await.unwrap();
/// let status = service.check_activation(&registration.constraint_id).await.unwrap();
/// assert_eq!(status.state, ActivationState::Active);
/// # });
/// ```
pub struct ConstraintService {
    config: EngineConfig,
    validator: Validator,
    engine: Mutex<Engine>,
    snapshot: RwLock<Arc<Snapshot>>,
    provider: Arc<dyn FactProvider>,
    sink: FactSink,
    pushed: Mutex<Option<mpsc::UnboundedReceiver<FactUpdate>>>,
    transitions: broadcast::Sender<ActivationRecord>,
    fetch_permits: Semaphore,
    /// Keys the provider currently has subscribed for this service.
    subscriptions: AsyncMutex<HashSet<FactKey>>,
}

impl ConstraintService {
    /// Builds a service. An invalid config is logged and used as far as
    /// possible; a zero fetch limit is raised to one.
    pub fn new(config: EngineConfig, provider: Arc<dyn FactProvider>) -> Self {
        if let Err(e) = config.validate() {
            warn!(event = "config_invalid", error = %e);
        }
        let (sink, pushed) = FactSink::channel();
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            validator: Validator::new(config.limits.into()),
            engine: Mutex::new(Engine::new(config.registry.clone())),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            fetch_permits: Semaphore::new(config.provider.max_concurrent_fetches.max(1)),
            config,
            provider,
            sink,
            pushed: Mutex::new(Some(pushed)),
            transitions,
            subscriptions: AsyncMutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn FactProvider> {
        &self.provider
    }

    /// Validates and registers a constraint.
    ///
    /// Newly needed facts are subscribed with the provider; with
    /// `evaluate_on_register` the new production is pulled once before this
    /// returns.
    pub async fn add(&self, constraint: Constraint) -> Result<Registration> {
        self.validator.validate(&constraint)?;
        self.register(constraint).await
    }

    /// Decodes, validates and registers a constraint from its JSON form.
    pub async fn add_json(&self, json: &str) -> Result<Registration> {
        let constraint = self.validator.validate_json(json)?;
        self.register(constraint).await
    }

    async fn register(&self, constraint: Constraint) -> Result<Registration> {
        let registered = {
            let mut engine = self.engine.lock();
            let registered = engine.add(constraint)?;
            self.publish(&engine);
            registered
        };

        let mut changed = registered.new_facts.clone();
        changed.extend(registered.dropped_facts.iter().cloned());
        self.sync_subscriptions(changed).await;

        let replaced = match registered.kind {
            RegistrationKind::Unchanged => {
                return Ok(Registration {
                    constraint_id: registered.constraint_id,
                    replaced: None,
                })
            }
            RegistrationKind::Added => None,
            RegistrationKind::Replaced(old) => Some(old),
        };

        if self.config.registry.evaluate_on_register {
            match self.check_activation(&registered.constraint_id).await {
                Ok(_) | Err(ServiceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Registration {
            constraint_id: registered.constraint_id,
            replaced,
        })
    }

    /// Unregisters a constraint and returns it.
    pub async fn remove(&self, id: &ConstraintId) -> Result<Arc<Constraint>> {
        let removed = {
            let mut engine = self.engine.lock();
            let removed = engine.remove(id)?;
            self.publish(&engine);
            removed
        };
        self.sync_subscriptions(removed.dropped_facts).await;
        Ok(removed.constraint)
    }

    /// Brings the provider's subscriptions for `keys` in line with the
    /// network as it is once the gate is acquired.
    async fn sync_subscriptions(&self, keys: Vec<FactKey>) {
        if keys.is_empty() {
            return;
        }
        let mut subscribed = self.subscriptions.lock().await;
        let (wanted, unwanted): (Vec<FactKey>, Vec<FactKey>) = {
            let engine = self.engine.lock();
            keys.into_iter()
                .partition(|key| engine.network().is_subscribed(key))
        };

        let unsubscribe: Vec<FactKey> = unwanted
            .into_iter()
            .filter(|key| subscribed.contains(key))
            .collect();
        if !unsubscribe.is_empty() {
            match self.provider.unsubscribe(&unsubscribe, &self.sink).await {
                Ok(()) => {
                    for key in &unsubscribe {
                        subscribed.remove(key);
                    }
                }
                Err(e) => {
                    warn!(event = "unsubscribe_failed", facts = unsubscribe.len() as u64, error = %e)
                }
            }
        }

        let subscribe: Vec<FactKey> = wanted
            .into_iter()
            .filter(|key| !subscribed.contains(key))
            .collect();
        if !subscribe.is_empty() {
            match self.provider.subscribe(&subscribe, &self.sink).await {
                Ok(()) => subscribed.extend(subscribe),
                Err(e) => {
                    warn!(event = "subscribe_failed", facts = subscribe.len() as u64, error = %e)
                }
            }
        }
    }

    pub fn get(&self, id: &ConstraintId) -> Result<Arc<Constraint>> {
        self.snapshot()
            .constraints
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub fn list(&self) -> Vec<RegisteredConstraint> {
        self.snapshot()
            .constraints
            .iter()
            .map(|(id, constraint)| RegisteredConstraint {
                constraint_id: id.clone(),
                constraint: Arc::clone(constraint),
            })
            .collect()
    }

    pub fn by_permission(&self, perm_id: &PermId) -> Option<ConstraintId> {
        self.snapshot().by_permission.get(perm_id).cloned()
    }

    /// Pulls every fact the production needs, then returns its state.
    ///
    /// Provider failures never fail the call; the affected facts become
    /// unresolved and the state may be `indeterminate`. If the production is
    /// replaced mid-pull the pull starts over for the new registration. Fails
    /// with `NotFound` only when `id` is no longer registered.
    pub async fn check_activation(&self, id: &ConstraintId) -> Result<ActivationStatus> {
        for _ in 0..MAX_PULL_ATTEMPTS {
            let plan = self.engine.lock().pull_plan(id)?;
            let updates = self.fetch(&plan.keys).await;
            let outcome = {
                let mut engine = self.engine.lock();
                let outcome = engine.apply_pull(&plan, updates)?;
                if matches!(outcome, PullOutcome::Applied { .. }) {
                    self.publish(&engine);
                }
                outcome
            };
            if let PullOutcome::Applied { status, records } = outcome {
                self.announce(records);
                return Ok(status);
            }
        }
        warn!(event = "pull_abandoned", constraint_id = %id, attempts = MAX_PULL_ATTEMPTS as u64);
        self.engine.lock().status(id)
    }

    async fn fetch(&self, keys: &[FactKey]) -> Vec<FactUpdate> {
        let timeout = self.config.provider.fetch_timeout();
        let fetches = keys.iter().map(|key| async move {
            let _permit = self.fetch_permits.acquire().await.ok();
            let fetched = tokio::time::timeout(timeout, self.provider.get_fact(key))
                .await
                .unwrap_or_else(|_| Err(ProviderError::Timeout(key.clone())));
            let value = match fetched {
                Ok(Some(value)) => Some(value),
                Ok(None) | Err(ProviderError::Unresolved(_)) => {
                    debug!(event = "fact_unresolved", fact = %key);
                    None
                }
                Err(e) => {
                    warn!(event = "fact_fetch_failed", fact = %key, error = %e);
                    None
                }
            };
            FactUpdate {
                key: key.clone(),
                value,
            }
        });
        join_all(fetches).await
    }

    /// Cached state from the last evaluation. No provider calls.
    pub fn activation_status(&self, id: &ConstraintId) -> Result<ActivationStatus> {
        self.snapshot()
            .statuses
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// Ordered transition history, also for removed constraints whose
    /// history is retained.
    pub fn get_activations(&self, id: &ConstraintId) -> Result<Vec<ActivationRecord>> {
        self.snapshot()
            .histories
            .get(id)
            .map(|history| history.to_vec())
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub fn get_network_state(&self) -> NetworkState {
        self.engine.lock().network_state()
    }

    pub fn known_facts(&self) -> Vec<Fact> {
        self.engine.lock().known_facts()
    }

    pub fn health_check(&self) -> Health {
        let snapshot = self.snapshot();
        Health {
            status: "ok",
            constraints: snapshot.constraints.len(),
            nodes: snapshot.nodes,
        }
    }

    /// Pushes one fact change.
    pub fn update_fact(&self, key: FactKey, value: Option<FactValue>) -> Vec<ActivationRecord> {
        self.update_facts([FactUpdate { key, value }])
    }

    /// Pushes a batch of fact changes, propagated together.
    pub fn update_facts(
        &self,
        updates: impl IntoIterator<Item = FactUpdate>,
    ) -> Vec<ActivationRecord> {
        let records = {
            let mut engine = self.engine.lock();
            let records = engine.apply_facts(updates);
            self.publish(&engine);
            records
        };
        self.announce(records.clone());
        records
    }

    /// Receives every activation record appended from now on.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<ActivationRecord> {
        self.transitions.subscribe()
    }

    /// Starts the task that applies facts pushed by the provider.
    ///
    /// Returns `None` if a listener was already started. The task stops once
    /// the service is dropped.
    pub fn spawn_fact_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut pushed = self.pushed.lock().take()?;
        let service: Weak<Self> = Arc::downgrade(self);
        info!(event = "fact_listener_started");
        Some(tokio::spawn(async move {
            while let Some(first) = pushed.recv().await {
                let mut batch = vec![first];
                while let Ok(update) = pushed.try_recv() {
                    batch.push(update);
                }
                let Some(service) = service.upgrade() else {
                    break;
                };
                debug!(event = "facts_pushed", updates = batch.len() as u64);
                service.update_facts(batch);
            }
            info!(event = "fact_listener_stopped");
        }))
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    fn publish(&self, engine: &Engine) {
        *self.snapshot.write() = Arc::new(engine.snapshot());
    }

    fn announce(&self, records: Vec<ActivationRecord>) {
        for record in records {
            // no receivers is fine
            let _ = self.transitions.send(record);
        }
    }
}

impl std::fmt::Debug for ConstraintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ConstraintService")
            .field("constraints", &snapshot.constraints.len())
            .field("nodes", &snapshot.nodes)
            .finish()
    }
}
