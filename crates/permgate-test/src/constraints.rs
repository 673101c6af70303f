//! Scenario constraints.

use permgate_core::{BaseConstraint, BoolExpr, CompOp, Constraint, Fact, FactKey, NumExpr};

/// `stake-of(account) >= amount`
pub fn stake_at_least(account: &str, amount: u128) -> BoolExpr {
    BoolExpr::comp(CompOp::Gte, NumExpr::stake_of(account), NumExpr::literal(amount))
}

/// A permission that is active while `target` exists.
pub fn permission_exists(perm_id: &str, target: &str) -> Constraint {
    Constraint::new(perm_id, BoolExpr::base(BaseConstraint::permission_exists(target)))
}

/// `permission-exists("p1")` owned by `p2`.
pub fn scenario_a() -> Constraint {
    permission_exists("p2", "p1")
}

/// Enough stake and either enough set weight, or an enabled
/// permission after block 2,000,000.
pub fn scenario_b() -> Constraint {
    Constraint::new(
        "p1",
        BoolExpr::and(
            stake_at_least("acct1", 1000),
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

/// Facts under which [`scenario_b`] is inactive.
pub fn scenario_b_initial_facts() -> Vec<Fact> {
    vec![
        Fact::new(FactKey::stake_of("acct1"), 500u128),
        Fact::new(FactKey::weight_set("g", "acct1"), 10u128),
        Fact::new(FactKey::permission_enabled("42"), false),
    ]
}

/// `not(not(...(base)))` nested `depth` levels deep.
pub fn negation_chain(perm_id: &str, depth: usize) -> Constraint {
    let mut body = BoolExpr::base(BaseConstraint::permission_exists("p0"));
    for _ in 0..depth {
        body = BoolExpr::not(body);
    }
    Constraint::new(perm_id, body)
}

/// Serialized constraint whose permission id contains a space.
pub fn malformed_perm_id_json() -> &'static str {
    r#"{"permId":"bad id","body":{"$":"Base","body":{"$":"PermissionExists","pid":"p1"}}}"#
}
