//! In-memory fact provider for demos, tests and embedding.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use permgate_core::{Fact, FactKey, FactValue};
use tracing::trace;

use super::{FactProvider, FactSink};
use crate::error::ProviderError;

/// Fact store that serves pulls and pushes changes to subscribed sinks.
#[derive(Debug, Default)]
pub struct InMemoryFactProvider {
    facts: RwLock<HashMap<FactKey, FactValue>>,
    subscribers: Mutex<Vec<(FactSink, HashSet<FactKey>)>>,
}

impl InMemoryFactProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let provider = Self::new();
        {
            let mut store = provider.facts.write();
            for fact in facts {
                store.insert(fact.key, fact.value);
            }
        }
        provider
    }

    /// Stores a fact and pushes it to subscribers watching its key.
    pub fn set(&self, key: FactKey, value: impl Into<FactValue>) {
        let value = value.into();
        self.facts.write().insert(key.clone(), value);
        self.notify(&key, Some(value));
    }

    /// Forgets a fact; subscribers see it become unresolved.
    pub fn unset(&self, key: &FactKey) {
        if self.facts.write().remove(key).is_some() {
            self.notify(key, None);
        }
    }

    pub fn get(&self, key: &FactKey) -> Option<FactValue> {
        self.facts.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.facts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.read().is_empty()
    }

    /// Keys currently watched by any subscriber.
    pub fn watched(&self) -> HashSet<FactKey> {
        self.subscribers
            .lock()
            .iter()
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    fn notify(&self, key: &FactKey, value: Option<FactValue>) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(sink, _)| !sink.is_closed());
        for (sink, keys) in subscribers.iter() {
            if keys.contains(key) {
                trace!(event = "fact_pushed", fact = %key);
                sink.publish(key.clone(), value);
            }
        }
    }
}

#[async_trait]
impl FactProvider for InMemoryFactProvider {
    async fn get_fact(&self, key: &FactKey) -> Result<Option<FactValue>, ProviderError> {
        Ok(self.get(key))
    }

    async fn subscribe(&self, keys: &[FactKey], sink: &FactSink) -> Result<(), ProviderError> {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter_mut().find(|(s, _)| s.same_channel(sink)) {
            Some((_, watched)) => watched.extend(keys.iter().cloned()),
            None => subscribers.push((sink.clone(), keys.iter().cloned().collect())),
        }
        Ok(())
    }

    async fn unsubscribe(&self, keys: &[FactKey], sink: &FactSink) -> Result<(), ProviderError> {
        let mut subscribers = self.subscribers.lock();
        if let Some((_, watched)) = subscribers.iter_mut().find(|(s, _)| s.same_channel(sink)) {
            for key in keys {
                watched.remove(key);
            }
        }
        Ok(())
    }
}
