//! proptest strategies for constraints and fact assignments.
//!
//! Identifiers come from small pools so that generated constraints share
//! facts and subexpressions often.

use permgate_core::{
    AccountId, BaseConstraint, BoolExpr, CompOp, Constraint, Fact, FactKey, FactKind, FactValue,
    NumExpr, PermId,
};
use proptest::prelude::*;

pub const ACCOUNTS: &[&str] = &["acct1", "acct2", "g"];
pub const PERMISSIONS: &[&str] = &["p1", "p2", "p3"];

pub fn account() -> impl Strategy<Value = AccountId> {
    proptest::sample::select(ACCOUNTS).prop_map(AccountId::from)
}

pub fn perm_id() -> impl Strategy<Value = PermId> {
    proptest::sample::select(PERMISSIONS).prop_map(PermId::from)
}

pub fn comp_op() -> impl Strategy<Value = CompOp> {
    prop_oneof![
        Just(CompOp::Gt),
        Just(CompOp::Lt),
        Just(CompOp::Gte),
        Just(CompOp::Lte),
        Just(CompOp::Eq),
    ]
}

fn small_literal() -> impl Strategy<Value = NumExpr> {
    (0u128..2_000).prop_map(NumExpr::literal)
}

pub fn num_expr() -> impl Strategy<Value = NumExpr> {
    let leaf = prop_oneof![
        3 => small_literal(),
        1 => Just(NumExpr::block_number()),
        2 => account().prop_map(NumExpr::stake_of),
        1 => (account(), account()).prop_map(|(f, t)| NumExpr::weight_set(f, t)),
        1 => (account(), account()).prop_map(|(f, t)| NumExpr::weight_power_from(f, t)),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| NumExpr::add(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| NumExpr::sub(l, r)),
        ]
    })
}

pub fn base_constraint() -> impl Strategy<Value = BaseConstraint> {
    prop_oneof![
        small_literal().prop_map(BaseConstraint::max_delegation_depth),
        perm_id().prop_map(BaseConstraint::permission_exists),
        perm_id().prop_map(BaseConstraint::permission_enabled),
        (small_literal(), (1u128..100).prop_map(NumExpr::literal))
            .prop_map(|(max, period)| BaseConstraint::rate_limit(max, period)),
        Just(BaseConstraint::inactive_unless_redelegated()),
    ]
}

pub fn bool_expr() -> impl Strategy<Value = BoolExpr> {
    let leaf = prop_oneof![
        2 => (comp_op(), num_expr(), num_expr()).prop_map(|(op, l, r)| BoolExpr::comp(op, l, r)),
        1 => base_constraint().prop_map(BoolExpr::base),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(BoolExpr::not),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExpr::and(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| BoolExpr::or(l, r)),
        ]
    })
}

pub fn constraint() -> impl Strategy<Value = Constraint> {
    (perm_id(), bool_expr()).prop_map(|(perm, body)| Constraint::new(perm, body))
}

/// A value of the right type for `kind`.
pub fn fact_value(kind: FactKind) -> BoxedStrategy<FactValue> {
    match kind {
        FactKind::Uint => (0u128..2_500).prop_map(FactValue::Uint).boxed(),
        FactKind::Bool => any::<bool>().prop_map(FactValue::Bool).boxed(),
    }
}

/// Values for `keys`, each one possibly missing (unresolved).
pub fn assignment(keys: Vec<FactKey>) -> impl Strategy<Value = Vec<Fact>> {
    let per_key: Vec<_> = keys
        .into_iter()
        .map(|key| {
            proptest::option::weighted(0.85, fact_value(key.kind()))
                .prop_map(move |value| value.map(|value| Fact { key: key.clone(), value }))
        })
        .collect();
    per_key.prop_map(|facts| facts.into_iter().flatten().collect())
}
