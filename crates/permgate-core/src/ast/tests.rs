//! Tests for expression trees and their tagged encoding.

use serde_json::json;

use super::*;

fn scenario_b_body() -> BoolExpr {
    BoolExpr::and(
        BoolExpr::comp(CompOp::Gte, NumExpr::stake_of("acct1"), NumExpr::literal(1000)),
        BoolExpr::or(
            BoolExpr::comp(CompOp::Gte, NumExpr::weight_set("g", "acct1"), NumExpr::literal(30)),
            BoolExpr::and(
                BoolExpr::base(BaseConstraint::permission_enabled("42")),
                BoolExpr::comp(CompOp::Gt, NumExpr::block_number(), NumExpr::literal(2_000_000)),
            ),
        ),
    )
}

#[test]
fn test_tagged_json_shape() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::comp(CompOp::Gt, NumExpr::stake_of("alice"), NumExpr::literal(1000)),
    );

    let value = constraint.to_json_value().unwrap();
    assert_eq!(
        value,
        json!({
            "permId": "p1",
            "body": {
                "$": "CompExpr",
                "op": "Gt",
                "left": { "$": "StakeOf", "account": "alice" },
                "right": { "$": "UIntLiteral", "value": "1000" }
            }
        })
    );
}

#[test]
fn test_rate_limit_field_names() {
    let base = BaseConstraint::rate_limit(NumExpr::literal(5), NumExpr::literal(100));
    let value = serde_json::to_value(&base).unwrap();
    assert_eq!(value["$"], "RateLimit");
    assert_eq!(value["maxOperations"]["value"], "5");
    assert_eq!(value["period"]["value"], "100");

    let unit = serde_json::to_value(BaseConstraint::inactive_unless_redelegated()).unwrap();
    assert_eq!(unit, json!({ "$": "InactiveUnlessRedelegated" }));
}

#[test]
fn test_literal_accepts_number_and_string() {
    let from_number: NumExpr =
        serde_json::from_value(json!({ "$": "UIntLiteral", "value": 5 })).unwrap();
    let from_string: NumExpr =
        serde_json::from_value(json!({ "$": "UIntLiteral", "value": "5" })).unwrap();
    assert_eq!(from_number, NumExpr::literal(5));
    assert_eq!(from_string, NumExpr::literal(5));

    let big: NumExpr = serde_json::from_value(
        json!({ "$": "UIntLiteral", "value": "1000000000000000000000000" }),
    )
    .unwrap();
    assert_eq!(big, NumExpr::literal(1_000_000_000_000_000_000_000_000));
}

#[test]
fn test_literal_rejects_negative_and_garbage() {
    let negative = serde_json::from_value::<NumExpr>(json!({ "$": "UIntLiteral", "value": -1 }));
    assert!(negative.is_err());
    let garbage = serde_json::from_value::<NumExpr>(json!({ "$": "UIntLiteral", "value": "12a" }));
    assert!(garbage.is_err());
}

#[test]
fn test_unknown_tag_is_rejected() {
    let json = r#"{
        "permId": "p1",
        "body": { "$": "UnknownType", "left": { "$": "BlockNumber" } }
    }"#;
    let err = Constraint::from_json(json).unwrap_err();
    assert!(err.to_string().contains("UnknownType"));
}

#[test]
fn test_unknown_comp_op_is_rejected() {
    let json = r#"{
        "permId": "p1",
        "body": {
            "$": "CompExpr",
            "op": "InvalidOp",
            "left": { "$": "StakeOf", "account": "a" },
            "right": { "$": "UIntLiteral", "value": "1" }
        }
    }"#;
    assert!(Constraint::from_json(json).is_err());
}

#[test]
fn test_round_trip_scenario_b() {
    let constraint = Constraint::new("p1", scenario_b_body());
    let json = constraint.to_json().unwrap();
    assert_eq!(Constraint::from_json(&json).unwrap(), constraint);
}

#[test]
fn test_node_count_and_depth() {
    let body = scenario_b_body();
    // and, comp, stake, lit, or, comp, weight, lit, and, base, enabled, comp, block, lit
    assert_eq!(body.node_count(), 14);
    assert_eq!(body.depth(), 5);
    assert_eq!(NumExpr::literal(1).depth(), 1);
}

#[test]
fn test_constant_folding() {
    let expr = NumExpr::sub(NumExpr::add(NumExpr::literal(10), NumExpr::literal(5)), NumExpr::literal(20));
    assert!(expr.is_constant());
    assert_eq!(expr.constant_value(), Some(-5));

    let dynamic = NumExpr::add(NumExpr::literal(1), NumExpr::block_number());
    assert!(!dynamic.is_constant());
    assert_eq!(dynamic.constant_value(), None);

    assert_eq!(NumExpr::literal(u128::MAX).constant_value(), None);
}

#[test]
fn test_comp_op_apply() {
    assert!(CompOp::Gte.apply(30, 30));
    assert!(!CompOp::Gt.apply(30, 30));
    assert!(CompOp::Lt.apply(-1, 0));
    assert!(CompOp::Lte.apply(0, 0));
    assert!(CompOp::Eq.apply(7, 7));
    assert!(!CompOp::Eq.apply(7, 8));
}

#[test]
fn test_display() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::or(
            BoolExpr::not(BoolExpr::base(BaseConstraint::permission_exists("p2"))),
            BoolExpr::comp(
                CompOp::Lte,
                NumExpr::sub(NumExpr::block_number(), NumExpr::literal(10)),
                NumExpr::weight_power_from("a", "b"),
            ),
        ),
    );
    assert_eq!(
        constraint.to_string(),
        "p1: (not(permission-exists(p2)) or ((block-number - 10) <= weight-power-from(a->b)))"
    );
}
