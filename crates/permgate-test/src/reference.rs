//! Direct tree-walking evaluator used as an oracle for the network.
//!
//! `None` stands for indeterminate.

use std::collections::HashMap;

use permgate_core::{BaseConstraint, BoolExpr, Constraint, FactKey, FactValue, NumExpr, PermId};

pub fn evaluate(constraint: &Constraint, facts: &HashMap<FactKey, FactValue>) -> Option<bool> {
    bool_expr(&constraint.body, &constraint.perm_id, facts)
}

fn bool_expr(expr: &BoolExpr, owner: &PermId, facts: &HashMap<FactKey, FactValue>) -> Option<bool> {
    match expr {
        BoolExpr::Not { body } => bool_expr(body, owner, facts).map(|b| !b),
        BoolExpr::And { left, right } => {
            match (bool_expr(left, owner, facts), bool_expr(right, owner, facts)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }
        BoolExpr::Or { left, right } => {
            match (bool_expr(left, owner, facts), bool_expr(right, owner, facts)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }
        BoolExpr::CompExpr { op, left, right } => {
            Some(op.apply(num_expr(left, facts)?, num_expr(right, facts)?))
        }
        BoolExpr::Base { body } => base(body, owner, facts),
    }
}

fn base(body: &BaseConstraint, owner: &PermId, facts: &HashMap<FactKey, FactValue>) -> Option<bool> {
    let key = FactKey::for_base(body, owner)?;
    match body {
        BaseConstraint::MaxDelegationDepth { depth } => {
            Some(uint(facts, &key)? <= num_expr(depth, facts)?)
        }
        BaseConstraint::RateLimit { max_operations, .. } => {
            Some(uint(facts, &key)? <= num_expr(max_operations, facts)?)
        }
        _ => facts.get(&key)?.as_bool(),
    }
}

fn num_expr(expr: &NumExpr, facts: &HashMap<FactKey, FactValue>) -> Option<i128> {
    match expr {
        NumExpr::UIntLiteral { value } => i128::try_from(*value).ok(),
        NumExpr::Add { left, right } => num_expr(left, facts)?.checked_add(num_expr(right, facts)?),
        NumExpr::Sub { left, right } => num_expr(left, facts)?.checked_sub(num_expr(right, facts)?),
        leaf => uint(facts, &FactKey::for_num_leaf(leaf)?),
    }
}

fn uint(facts: &HashMap<FactKey, FactValue>, key: &FactKey) -> Option<i128> {
    i128::try_from(facts.get(key)?.as_uint()?).ok()
}
