//! Tests for the in-memory fact provider.

use permgate_core::{Fact, FactKey, FactValue};

use super::*;

#[tokio::test]
async fn test_get_fact() {
    let provider = InMemoryFactProvider::with_facts([Fact::new(FactKey::stake_of("a"), 10u128)]);
    assert_eq!(
        provider.get_fact(&FactKey::stake_of("a")).await.unwrap(),
        Some(FactValue::Uint(10))
    );
    assert_eq!(provider.get_fact(&FactKey::stake_of("b")).await.unwrap(), None);
}

#[tokio::test]
async fn test_pushes_only_watched_keys() {
    let provider = InMemoryFactProvider::new();
    let (sink, mut rx) = FactSink::channel();
    provider
        .subscribe(&[FactKey::stake_of("a")], &sink)
        .await
        .unwrap();

    provider.set(FactKey::stake_of("b"), 1u128);
    provider.set(FactKey::stake_of("a"), 2u128);
    provider.unset(&FactKey::stake_of("a"));

    assert_eq!(
        rx.recv().await.unwrap(),
        FactUpdate {
            key: FactKey::stake_of("a"),
            value: Some(FactValue::Uint(2)),
        }
    );
    assert_eq!(rx.recv().await.unwrap().value, None);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_subscribe_merges_same_sink() {
    let provider = InMemoryFactProvider::new();
    let (sink, _rx) = FactSink::channel();
    provider.subscribe(&[FactKey::BlockNumber], &sink).await.unwrap();
    provider
        .subscribe(&[FactKey::stake_of("a")], &sink.clone())
        .await
        .unwrap();
    assert_eq!(provider.watched().len(), 2);

    provider
        .unsubscribe(&[FactKey::BlockNumber], &sink)
        .await
        .unwrap();
    assert_eq!(provider.watched().len(), 1);
}

#[tokio::test]
async fn test_closed_sinks_are_pruned() {
    let provider = InMemoryFactProvider::new();
    let (sink, rx) = FactSink::channel();
    provider.subscribe(&[FactKey::BlockNumber], &sink).await.unwrap();
    drop(rx);
    provider.set(FactKey::BlockNumber, 5u128);
    assert!(provider.watched().is_empty());
}
