//! A fact provider whose answers, faults and latency are scripted by the test.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use permgate_core::{Fact, FactKey, FactValue};
use permgate_network::{FactProvider, FactSink, ProviderError};

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    facts: RwLock<HashMap<FactKey, FactValue>>,
    failures: RwLock<HashMap<FactKey, ProviderError>>,
    delay: RwLock<Option<Duration>>,
    unsubscribe_delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    calls_by_key: Mutex<HashMap<FactKey, usize>>,
    sinks: Mutex<Vec<FactSink>>,
    subscribed: Mutex<BTreeSet<FactKey>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let provider = Self::new();
        for fact in facts {
            provider.set(fact.key, fact.value);
        }
        provider
    }

    /// Answer for future pulls. Nothing is pushed.
    pub fn set(&self, key: FactKey, value: impl Into<FactValue>) {
        self.facts.write().insert(key, value.into());
    }

    pub fn clear(&self, key: &FactKey) {
        self.facts.write().remove(key);
    }

    /// Makes every pull of `key` fail with `error`.
    pub fn fail(&self, key: FactKey, error: ProviderError) {
        self.failures.write().insert(key, error);
    }

    /// Delays every pull by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    /// Delays every unsubscribe by `delay`, after it has been counted.
    pub fn set_unsubscribe_delay(&self, delay: Duration) {
        *self.unsubscribe_delay.write() = Some(delay);
    }

    /// Sends an update to every sink handed over in `subscribe`.
    pub fn push(&self, key: FactKey, value: Option<FactValue>) {
        match value {
            Some(v) => self.set(key.clone(), v),
            None => self.clear(&key),
        }
        for sink in self.sinks.lock().iter() {
            sink.publish(key.clone(), value);
        }
    }

    /// Total number of pulls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls started so far.
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, key: &FactKey) -> usize {
        self.calls_by_key.lock().get(key).copied().unwrap_or(0)
    }

    /// Keys currently subscribed, in canonical order.
    pub fn subscribed(&self) -> Vec<FactKey> {
        self.subscribed.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl FactProvider for ScriptedProvider {
    async fn get_fact(&self, key: &FactKey) -> Result<Option<FactValue>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_key.lock().entry(key.clone()).or_default() += 1;
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.read().get(key) {
            return Err(error.clone());
        }
        Ok(self.facts.read().get(key).copied())
    }

    async fn subscribe(&self, keys: &[FactKey], sink: &FactSink) -> Result<(), ProviderError> {
        let mut sinks = self.sinks.lock();
        if !sinks.iter().any(|s| s.same_channel(sink)) {
            sinks.push(sink.clone());
        }
        self.subscribed.lock().extend(keys.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&self, keys: &[FactKey], _sink: &FactSink) -> Result<(), ProviderError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.unsubscribe_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut subscribed = self.subscribed.lock();
        for key in keys {
            subscribed.remove(key);
        }
        Ok(())
    }
}
