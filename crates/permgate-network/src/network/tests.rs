//! Tests for the activation network.

use permgate_core::{BaseConstraint, BoolExpr, CompOp, Constraint, FactKey, FactValue, NumExpr};

use super::*;

fn stake_at_least(account: &str, amount: u128) -> BoolExpr {
    BoolExpr::comp(CompOp::Gte, NumExpr::stake_of(account), NumExpr::literal(amount))
}

fn set(network: &mut Network, key: FactKey, value: impl Into<FactValue>) -> Propagation {
    network.set_fact(&key, Some(value.into()));
    network.propagate()
}

#[test]
fn test_identical_subexpressions_share_nodes() {
    let mut network = Network::new();
    let first = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::and(stake_at_least("a", 1000), BoolExpr::base(BaseConstraint::permission_enabled("42"))),
        ))
        .unwrap();
    let second = network
        .compile(&Constraint::new(
            "p2",
            BoolExpr::or(stake_at_least("a", 1000), BoolExpr::base(BaseConstraint::permission_exists("7"))),
        ))
        .unwrap();

    assert_eq!(first.new_facts.len(), 2);
    assert_eq!(second.new_facts, vec![FactKey::permission_exists("7")]);

    let stake = network.find(&NodeKind::Fact(FactKey::stake_of("a")), &[]).unwrap();
    let literal = network.find(&NodeKind::Literal(1000), &[]).unwrap();
    let shared = network
        .find(&NodeKind::Compare(CompOp::Gte), &[stake, literal])
        .unwrap();
    assert_eq!(network.refcount(shared), 2);
    // fact, literal, comp, enabled, and, exists, or
    assert_eq!(network.len(), 7);

    let before = network.node(shared).unwrap().evaluations;
    set(&mut network, FactKey::stake_of("a"), 1500u128);
    assert_eq!(network.node(shared).unwrap().evaluations, before + 1);
    assert_eq!(network.value(shared), Value::Bool(true));
    assert_eq!(network.value(second.root), Value::Bool(true));
    assert_eq!(network.value(first.root), Value::Indeterminate);
}

#[test]
fn test_compiling_same_constraint_twice_reuses_root() {
    let mut network = Network::new();
    let constraint = Constraint::new("p1", stake_at_least("a", 5));
    let first = network.compile(&constraint).unwrap();
    let second = network.compile(&constraint).unwrap();
    assert_eq!(first.root, second.root);
    assert!(second.new_facts.is_empty());
    assert_eq!(network.refcount(first.root), 2);
    assert_eq!(network.len(), 3);
}

#[test]
fn test_diamond_recomputes_each_node_once() {
    let mut network = Network::new();
    let compiled = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::and(
                stake_at_least("a", 1),
                BoolExpr::comp(CompOp::Lte, NumExpr::stake_of("a"), NumExpr::literal(10)),
            ),
        ))
        .unwrap();

    let batch = set(&mut network, FactKey::stake_of("a"), 5u128);
    // fact leaf, two comparisons, and
    assert_eq!(batch.recomputed, 4);
    assert_eq!(network.value(compiled.root), Value::Bool(true));

    let batch = set(&mut network, FactKey::stake_of("a"), 6u128);
    // the comparisons keep their value, so the root is not revisited
    assert_eq!(batch.recomputed, 3);
    assert!(!batch.changed.contains(&compiled.root));
}

#[test]
fn test_kleene_short_circuit() {
    let mut network = Network::new();
    let and = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::and(
                BoolExpr::base(BaseConstraint::permission_enabled("x")),
                BoolExpr::base(BaseConstraint::permission_enabled("unknown")),
            ),
        ))
        .unwrap();
    let or = network
        .compile(&Constraint::new(
            "p2",
            BoolExpr::or(
                BoolExpr::base(BaseConstraint::permission_enabled("unknown")),
                BoolExpr::base(BaseConstraint::permission_exists("y")),
            ),
        ))
        .unwrap();
    let not = network
        .compile(&Constraint::new(
            "p3",
            BoolExpr::not(BoolExpr::base(BaseConstraint::permission_enabled("unknown"))),
        ))
        .unwrap();

    assert_eq!(network.value(and.root), Value::Indeterminate);
    set(&mut network, FactKey::permission_enabled("x"), false);
    assert_eq!(network.value(and.root), Value::Bool(false));

    set(&mut network, FactKey::permission_exists("y"), true);
    assert_eq!(network.value(or.root), Value::Bool(true));
    set(&mut network, FactKey::permission_exists("y"), false);
    assert_eq!(network.value(or.root), Value::Indeterminate);

    assert_eq!(network.value(not.root), Value::Indeterminate);
}

#[test]
fn test_unresolved_fact_reverts_to_indeterminate() {
    let mut network = Network::new();
    let compiled = network
        .compile(&Constraint::new("p1", stake_at_least("a", 1)))
        .unwrap();
    set(&mut network, FactKey::stake_of("a"), 2u128);
    assert_eq!(network.value(compiled.root), Value::Bool(true));

    network.set_fact(&FactKey::stake_of("a"), None);
    network.propagate();
    assert_eq!(network.value(compiled.root), Value::Indeterminate);
}

#[test]
fn test_overflow_and_kind_mismatch_are_indeterminate() {
    let mut network = Network::new();
    let compiled = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::comp(
                CompOp::Gt,
                NumExpr::add(NumExpr::stake_of("a"), NumExpr::literal(1)),
                NumExpr::literal(0),
            ),
        ))
        .unwrap();

    set(&mut network, FactKey::stake_of("a"), i128::MAX as u128);
    assert_eq!(network.value(compiled.root), Value::Indeterminate);

    set(&mut network, FactKey::stake_of("a"), 1u128);
    assert_eq!(network.value(compiled.root), Value::Bool(true));

    set(&mut network, FactKey::stake_of("a"), true);
    assert_eq!(network.value(compiled.root), Value::Indeterminate);

    set(&mut network, FactKey::stake_of("a"), u128::MAX);
    assert_eq!(network.value(compiled.root), Value::Indeterminate);
}

#[test]
fn test_signed_subtraction() {
    let mut network = Network::new();
    let compiled = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::comp(
                CompOp::Lt,
                NumExpr::sub(NumExpr::block_number(), NumExpr::literal(100)),
                NumExpr::literal(0),
            ),
        ))
        .unwrap();
    set(&mut network, FactKey::BlockNumber, 10u128);
    assert_eq!(network.value(compiled.root), Value::Bool(true));
}

#[test]
fn test_release_frees_only_unshared_nodes() {
    let mut network = Network::new();
    let first = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::and(stake_at_least("a", 1000), BoolExpr::base(BaseConstraint::permission_enabled("42"))),
        ))
        .unwrap();
    let second = network
        .compile(&Constraint::new("p2", stake_at_least("a", 1000)))
        .unwrap();

    let dropped = network.release(first.root);
    assert_eq!(dropped, vec![FactKey::permission_enabled("42")]);
    assert_eq!(network.len(), 3);
    assert!(network.is_subscribed(&FactKey::stake_of("a")));
    assert!(!network.is_subscribed(&FactKey::permission_enabled("42")));
    assert_eq!(network.refcount(second.root), 1);

    let dropped = network.release(second.root);
    assert_eq!(dropped, vec![FactKey::stake_of("a")]);
    assert!(network.is_empty());
    assert!(network.subscriptions().is_empty());
}

#[test]
fn test_freed_slots_are_reused() {
    let mut network = Network::new();
    let first = network
        .compile(&Constraint::new("p1", stake_at_least("a", 1)))
        .unwrap();
    network.release(first.root);
    let second = network
        .compile(&Constraint::new("p1", stake_at_least("b", 2)))
        .unwrap();
    assert!(second.root.index() < 3);
    assert_eq!(network.len(), 3);
    assert!(!network.is_subscribed(&FactKey::stake_of("a")));
}

#[test]
fn test_auxiliary_predicates_compare_supplied_counters() {
    let mut network = Network::new();
    let compiled = network
        .compile(&Constraint::new(
            "p9",
            BoolExpr::and(
                BoolExpr::base(BaseConstraint::max_delegation_depth(NumExpr::literal(3))),
                BoolExpr::and(
                    BoolExpr::base(BaseConstraint::rate_limit(NumExpr::literal(5), NumExpr::literal(100))),
                    BoolExpr::base(BaseConstraint::inactive_unless_redelegated()),
                ),
            ),
        ))
        .unwrap();
    assert_eq!(
        network.subscriptions(),
        vec![
            FactKey::delegation_depth("p9"),
            FactKey::operation_count("p9", 100),
            FactKey::redelegated("p9"),
        ]
    );

    network.set_fact(&FactKey::delegation_depth("p9"), Some(3u128.into()));
    network.set_fact(&FactKey::operation_count("p9", 100), Some(5u128.into()));
    network.set_fact(&FactKey::redelegated("p9"), Some(true.into()));
    network.propagate();
    assert_eq!(network.value(compiled.root), Value::Bool(true));

    set(&mut network, FactKey::operation_count("p9", 100), 6u128);
    assert_eq!(network.value(compiled.root), Value::Bool(false));
}

#[test]
fn test_unsubscribed_fact_is_ignored() {
    let mut network = Network::new();
    assert!(!network.set_fact(&FactKey::stake_of("nobody"), Some(1u128.into())));
    assert_eq!(network.propagate(), Propagation::default());
}

#[test]
fn test_compile_rejects_unchecked_trees() {
    let mut network = Network::new();
    let err = network
        .compile(&Constraint::new(
            "p1",
            BoolExpr::base(BaseConstraint::rate_limit(NumExpr::literal(1), NumExpr::block_number())),
        ))
        .unwrap_err();
    assert!(matches!(err, CompileError::NonConstantPeriod(_)));
    assert!(network.is_empty());
}
