//! Incremental propagation agrees with direct evaluation.

use std::collections::{BTreeSet, HashMap};

use permgate_config::RegistryConfig;
use permgate_core::analysis::referenced_facts;
use permgate_core::{Constraint, Fact, FactKey, FactValue, PermId};
use permgate_network::{ActivationState, Engine, FactUpdate, PullOutcome};
use permgate_test::reference::evaluate;
use permgate_test::strategies::{assignment, bool_expr};
use proptest::collection::vec;
use proptest::prelude::*;

fn expected(value: Option<bool>) -> ActivationState {
    match value {
        Some(true) => ActivationState::Active,
        Some(false) => ActivationState::Inactive,
        None => ActivationState::Indeterminate,
    }
}

fn constraints_with_facts() -> impl Strategy<Value = (Vec<Constraint>, Vec<Fact>, Vec<Fact>)> {
    vec(bool_expr(), 1..4)
        .prop_map(|bodies| {
            bodies
                .into_iter()
                .enumerate()
                .map(|(i, body)| Constraint::new(PermId::new(format!("p{i}")), body))
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|constraints| {
            let keys: BTreeSet<FactKey> = constraints.iter().flat_map(referenced_facts).collect();
            let keys: Vec<FactKey> = keys.into_iter().collect();
            (Just(constraints), assignment(keys.clone()), assignment(keys))
        })
}

fn as_map(facts: &[Fact]) -> HashMap<FactKey, FactValue> {
    facts.iter().map(|f| (f.key.clone(), f.value)).collect()
}

/// Every referenced key, with `None` for the ones missing from `facts`.
fn full_updates(keys: &BTreeSet<FactKey>, facts: &[Fact]) -> Vec<FactUpdate> {
    let map = as_map(facts);
    keys.iter()
        .map(|key| FactUpdate {
            key: key.clone(),
            value: map.get(key).copied(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn push_matches_direct_evaluation((constraints, noise, facts) in constraints_with_facts()) {
        let mut engine = Engine::new(RegistryConfig::default());
        let ids: Vec<_> = constraints
            .iter()
            .map(|c| engine.add(c.clone()).unwrap().constraint_id)
            .collect();
        let keys: BTreeSet<FactKey> = constraints.iter().flat_map(referenced_facts).collect();

        // an earlier assignment must leave no trace once every fact is overwritten
        engine.apply_facts(full_updates(&keys, &noise));
        engine.apply_facts(full_updates(&keys, &facts));

        let map = as_map(&facts);
        for (constraint, id) in constraints.iter().zip(&ids) {
            let want = expected(evaluate(constraint, &map));
            let root = engine.root(id).unwrap();
            prop_assert_eq!(ActivationState::from_value(engine.network().value(root)), want);
            let state = engine.status(id).unwrap().state;
            prop_assert!(state == want || state == ActivationState::Unknown);
        }
    }

    #[test]
    fn pull_matches_push((constraints, _noise, facts) in constraints_with_facts()) {
        let mut pushed = Engine::new(RegistryConfig::default());
        let mut pulled = Engine::new(RegistryConfig::default());
        let map = as_map(&facts);
        for constraint in &constraints {
            let id = pushed.add(constraint.clone()).unwrap().constraint_id;
            pulled.add(constraint.clone()).unwrap();

            let keys: BTreeSet<FactKey> = referenced_facts(constraint);
            let plan = pulled.pull_plan(&id).unwrap();
            prop_assert_eq!(&plan.keys, &keys.iter().cloned().collect::<Vec<_>>());
            let outcome = pulled.apply_pull(&plan, full_updates(&keys, &facts)).unwrap();
            let PullOutcome::Applied { status, .. } = outcome else {
                return Err(TestCaseError::fail("pull was superseded"));
            };
            prop_assert_eq!(status.state, expected(evaluate(constraint, &map)));
        }

        pushed.apply_facts(facts.iter().cloned().map(FactUpdate::from));
        for constraint in &constraints {
            let id = pushed.by_permission(&constraint.perm_id).unwrap();
            let root = pushed.root(&id).unwrap();
            let pulled_status = pulled.status(&id).unwrap();
            prop_assert_eq!(
                ActivationState::from_value(pushed.network().value(root)),
                pulled_status.state
            );
        }
    }

    #[test]
    fn teardown_releases_every_node((constraints, _noise, facts) in constraints_with_facts()) {
        let mut engine = Engine::new(RegistryConfig::default());
        let ids: Vec<_> = constraints
            .iter()
            .map(|c| engine.add(c.clone()).unwrap().constraint_id)
            .collect();
        engine.apply_facts(facts.into_iter().map(FactUpdate::from));

        for (i, id) in ids.iter().enumerate() {
            engine.remove(id).unwrap();
            // survivors keep exactly the facts they read
            let still_needed: BTreeSet<FactKey> = constraints[i + 1..]
                .iter()
                .flat_map(referenced_facts)
                .collect();
            let subscribed: BTreeSet<FactKey> =
                engine.network().subscriptions().into_iter().collect();
            prop_assert_eq!(subscribed, still_needed);
        }
        prop_assert!(engine.network().is_empty());
    }
}
