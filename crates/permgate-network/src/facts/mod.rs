//! Fact Provider abstraction
//!
//! The engine never talks to a chain client directly. It pulls facts through
//! [`FactProvider::get_fact`] and, when the provider supports it, receives
//! pushed updates through a [`FactSink`] handed over in
//! [`FactProvider::subscribe`].

mod memory;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use permgate_core::{Fact, FactKey, FactValue};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;

pub use memory::InMemoryFactProvider;

/// A pushed change to one fact. `None` marks the fact as unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactUpdate {
    pub key: FactKey,
    pub value: Option<FactValue>,
}

impl From<Fact> for FactUpdate {
    fn from(fact: Fact) -> Self {
        Self {
            key: fact.key,
            value: Some(fact.value),
        }
    }
}

/// Sending half of a push channel into the engine.
#[derive(Debug, Clone)]
pub struct FactSink {
    tx: mpsc::UnboundedSender<FactUpdate>,
}

impl FactSink {
    /// Creates a sink and the receiver the engine drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FactUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes an update. Returns false if the engine side is gone.
    pub fn publish(&self, key: FactKey, value: Option<FactValue>) -> bool {
        self.tx.send(FactUpdate { key, value }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns true if both sinks feed the same receiver.
    pub fn same_channel(&self, other: &FactSink) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Source of external facts.
#[async_trait]
pub trait FactProvider: Send + Sync {
    /// Fetches the current value of a fact.
    ///
    /// `Ok(None)` means the fact is currently unresolved.
    async fn get_fact(&self, key: &FactKey) -> Result<Option<FactValue>, ProviderError>;

    /// Starts pushing changes of `keys` into `sink` (optional)
    async fn subscribe(&self, _keys: &[FactKey], _sink: &FactSink) -> Result<(), ProviderError> {
        Ok(()) // Default: pull only
    }

    /// Stops pushing changes of `keys` into `sink`.
    async fn unsubscribe(&self, _keys: &[FactKey], _sink: &FactSink) -> Result<(), ProviderError> {
        Ok(())
    }
}
