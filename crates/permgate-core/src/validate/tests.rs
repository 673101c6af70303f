//! Tests for the constraint validator.

use super::*;
use crate::ast::CompOp;
use crate::ids::IdentifierError;

fn scenario_b() -> Constraint {
    Constraint::new(
        "p1",
        BoolExpr::and(
            BoolExpr::comp(CompOp::Gte, NumExpr::stake_of("acct1"), NumExpr::literal(1000)),
            BoolExpr::or(
                BoolExpr::comp(CompOp::Gte, NumExpr::weight_set("g", "acct1"), NumExpr::literal(30)),
                BoolExpr::and(
                    BoolExpr::base(BaseConstraint::permission_enabled("42")),
                    BoolExpr::comp(CompOp::Gt, NumExpr::block_number(), NumExpr::literal(2_000_000)),
                ),
            ),
        ),
    )
}

fn limits(max_depth: usize, max_nodes: usize) -> ValidationLimits {
    ValidationLimits {
        max_depth,
        max_nodes,
        ..ValidationLimits::default()
    }
}

#[test]
fn test_valid_constraint_passes() {
    assert_eq!(validate(&scenario_b()), Ok(()));
}

#[test]
fn test_invalid_perm_id() {
    let constraint = Constraint::new("p 1", BoolExpr::base(BaseConstraint::inactive_unless_redelegated()));
    let err = validate(&constraint).unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidIdentifier {
            path: "permId".to_string(),
            reason: IdentifierError::InvalidChar { ch: ' ', offset: 1 },
        }
    );
}

#[test]
fn test_invalid_account_reports_path() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::comp(CompOp::Gt, NumExpr::stake_of(""), NumExpr::literal(1)),
    );
    let err = validate(&constraint).unwrap_err();
    assert_eq!(err.path(), Some("body.left.account"));
    assert!(matches!(
        err,
        ValidationError::InvalidIdentifier {
            reason: IdentifierError::Empty,
            ..
        }
    ));
}

#[test]
fn test_invalid_weight_target() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::not(BoolExpr::comp(
            CompOp::Eq,
            NumExpr::literal(0),
            NumExpr::weight_power_from("a", "b/c"),
        )),
    );
    let err = validate(&constraint).unwrap_err();
    assert_eq!(err.path(), Some("body.body.right.to"));
}

#[test]
fn test_depth_limit() {
    let constraint = scenario_b();
    assert!(Validator::new(limits(5, 256)).validate(&constraint).is_ok());

    let err = Validator::new(limits(4, 256)).validate(&constraint).unwrap_err();
    assert_eq!(
        err,
        ValidationError::DepthLimit {
            path: "body.right.right.left.body".to_string(),
            limit: 4,
        }
    );
}

#[test]
fn test_node_limit() {
    let constraint = scenario_b();
    assert!(Validator::new(limits(32, 14)).validate(&constraint).is_ok());

    let err = Validator::new(limits(32, 3)).validate(&constraint).unwrap_err();
    assert_eq!(
        err,
        ValidationError::NodeLimit {
            path: "body.left.right".to_string(),
            limit: 3,
        }
    );
}

#[test]
fn test_literal_out_of_range() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::comp(CompOp::Lt, NumExpr::block_number(), NumExpr::literal(u128::MAX)),
    );
    let err = validate(&constraint).unwrap_err();
    assert_eq!(
        err,
        ValidationError::LiteralOutOfRange {
            path: "body.right".to_string(),
            value: u128::MAX,
        }
    );

    let max = Constraint::new(
        "p1",
        BoolExpr::comp(CompOp::Lt, NumExpr::block_number(), NumExpr::literal(i128::MAX as u128)),
    );
    assert!(validate(&max).is_ok());
}

#[test]
fn test_rate_limit_period_must_be_constant() {
    let constant = Constraint::new(
        "p1",
        BoolExpr::base(BaseConstraint::rate_limit(
            NumExpr::literal(5),
            NumExpr::add(NumExpr::literal(50), NumExpr::literal(50)),
        )),
    );
    assert!(validate(&constant).is_ok());

    let dynamic = Constraint::new(
        "p1",
        BoolExpr::base(BaseConstraint::rate_limit(NumExpr::literal(5), NumExpr::block_number())),
    );
    assert_eq!(
        validate(&dynamic).unwrap_err(),
        ValidationError::NonConstantPeriod {
            path: "body.body.period".to_string(),
        }
    );

    let negative = Constraint::new(
        "p1",
        BoolExpr::base(BaseConstraint::rate_limit(
            NumExpr::literal(5),
            NumExpr::sub(NumExpr::literal(1), NumExpr::literal(2)),
        )),
    );
    assert!(matches!(
        validate(&negative),
        Err(ValidationError::NonConstantPeriod { .. })
    ));
}

#[test]
fn test_first_violation_in_pre_order() {
    let constraint = Constraint::new(
        "p1",
        BoolExpr::or(
            BoolExpr::base(BaseConstraint::permission_exists("bad pid")),
            BoolExpr::comp(CompOp::Gt, NumExpr::stake_of(""), NumExpr::literal(u128::MAX)),
        ),
    );
    let err = validate(&constraint).unwrap_err();
    assert_eq!(err.path(), Some("body.left.body.pid"));
}

#[test]
fn test_validate_json_maps_decode_errors() {
    let validator = Validator::default();
    let err = validator
        .validate_json(r#"{"permId":"p1","body":{"$":"Xor"}}"#)
        .unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
    assert_eq!(err.path(), None);

    let json = scenario_b().to_json().unwrap();
    assert_eq!(validator.validate_json(&json).unwrap(), scenario_b());
}

#[test]
fn test_identifier_length_limit() {
    let validator = Validator::new(ValidationLimits {
        max_identifier_len: 4,
        ..ValidationLimits::default()
    });
    let constraint = Constraint::new("p1", BoolExpr::base(BaseConstraint::permission_enabled("12345")));
    assert!(matches!(
        validator.validate(&constraint),
        Err(ValidationError::InvalidIdentifier {
            reason: IdentifierError::TooLong { len: 5, max: 4 },
            ..
        })
    ));
}
