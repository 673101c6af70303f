//! Lowering of constraint trees into interned network nodes.
//!
//! Base predicates become fact leaves or comparisons against externally
//! supplied counters:
//!
//! | predicate | lowered form |
//! |---|---|
//! | `PermissionExists{p}` | `fact(permission-exists:p)` |
//! | `PermissionEnabled{p}` | `fact(permission-enabled:p)` |
//! | `MaxDelegationDepth{d}` | `fact(delegation-depth:P) <= d` |
//! | `RateLimit{m, period}` | `fact(operation-count:P@period) <= m` |
//! | `InactiveUnlessRedelegated` | `fact(redelegated:P)` |
//!
//! where `P` is the owning constraint's permission id.

use permgate_core::{BaseConstraint, BoolExpr, CompOp, Constraint, FactKey, NumExpr, PermId};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use super::node::{NodeId, NodeKind};
use super::Network;

/// A tree that passed validation but cannot be lowered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("literal {0} does not fit the evaluation domain")]
    LiteralOutOfRange(u128),

    #[error("rate-limit period of {0} is not a constant")]
    NonConstantPeriod(PermId),
}

/// Result of compiling one constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    /// Root node; the caller owns one reference to it.
    pub root: NodeId,
    /// Fact keys that gained their first subscriber.
    pub new_facts: Vec<FactKey>,
}

/// Rejects trees that lowering cannot handle, before any node is created.
pub(crate) fn check(constraint: &Constraint) -> Result<(), CompileError> {
    check_bool(&constraint.body, &constraint.perm_id)
}

fn check_bool(expr: &BoolExpr, owner: &PermId) -> Result<(), CompileError> {
    match expr {
        BoolExpr::Not { body } => check_bool(body, owner),
        BoolExpr::And { left, right } | BoolExpr::Or { left, right } => {
            check_bool(left, owner)?;
            check_bool(right, owner)
        }
        BoolExpr::CompExpr { left, right, .. } => {
            check_num(left)?;
            check_num(right)
        }
        BoolExpr::Base { body } => match body {
            BaseConstraint::MaxDelegationDepth { depth } => check_num(depth),
            BaseConstraint::RateLimit { max_operations, .. } => {
                FactKey::for_base(body, owner)
                    .ok_or_else(|| CompileError::NonConstantPeriod(owner.clone()))?;
                check_num(max_operations)
            }
            _ => Ok(()),
        },
    }
}

fn check_num(expr: &NumExpr) -> Result<(), CompileError> {
    match expr {
        NumExpr::UIntLiteral { value } => i128::try_from(*value)
            .map(|_| ())
            .map_err(|_| CompileError::LiteralOutOfRange(*value)),
        NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
            check_num(left)?;
            check_num(right)
        }
        _ => Ok(()),
    }
}

pub(crate) struct Lowering<'a> {
    pub network: &'a mut Network,
    pub owner: &'a PermId,
    pub new_facts: Vec<FactKey>,
}

impl Lowering<'_> {
    pub fn bool_expr(&mut self, expr: &BoolExpr) -> NodeId {
        match expr {
            BoolExpr::Not { body } => {
                let body = self.bool_expr(body);
                self.intern(NodeKind::Not, smallvec![body])
            }
            BoolExpr::And { left, right } => {
                let left = self.bool_expr(left);
                let right = self.bool_expr(right);
                self.intern(NodeKind::And, smallvec![left, right])
            }
            BoolExpr::Or { left, right } => {
                let left = self.bool_expr(left);
                let right = self.bool_expr(right);
                self.intern(NodeKind::Or, smallvec![left, right])
            }
            BoolExpr::CompExpr { op, left, right } => {
                let left = self.num_expr(left);
                let right = self.num_expr(right);
                self.intern(NodeKind::Compare(*op), smallvec![left, right])
            }
            BoolExpr::Base { body } => self.base(body),
        }
    }

    fn base(&mut self, base: &BaseConstraint) -> NodeId {
        // `check` guarantees a key for every base predicate.
        let Some(key) = FactKey::for_base(base, self.owner) else {
            return self.intern(NodeKind::Literal(0), SmallVec::new());
        };
        let fact = self.fact(key);
        match base {
            BaseConstraint::MaxDelegationDepth { depth: limit } => {
                let limit = self.num_expr(limit);
                self.intern(NodeKind::Compare(CompOp::Lte), smallvec![fact, limit])
            }
            BaseConstraint::RateLimit { max_operations, .. } => {
                let max = self.num_expr(max_operations);
                self.intern(NodeKind::Compare(CompOp::Lte), smallvec![fact, max])
            }
            _ => fact,
        }
    }

    fn num_expr(&mut self, expr: &NumExpr) -> NodeId {
        match expr {
            NumExpr::UIntLiteral { value } => {
                let value = i128::try_from(*value).unwrap_or(i128::MAX);
                self.intern(NodeKind::Literal(value), SmallVec::new())
            }
            NumExpr::Add { left, right } => {
                let left = self.num_expr(left);
                let right = self.num_expr(right);
                self.intern(NodeKind::Add, smallvec![left, right])
            }
            NumExpr::Sub { left, right } => {
                let left = self.num_expr(left);
                let right = self.num_expr(right);
                self.intern(NodeKind::Sub, smallvec![left, right])
            }
            leaf => match FactKey::for_num_leaf(leaf) {
                Some(key) => self.fact(key),
                None => self.intern(NodeKind::Literal(0), SmallVec::new()),
            },
        }
    }

    fn fact(&mut self, key: FactKey) -> NodeId {
        let (id, created) = self
            .network
            .intern(NodeKind::Fact(key.clone()), SmallVec::new());
        if created {
            self.new_facts.push(key);
        }
        id
    }

    fn intern(&mut self, kind: NodeKind, children: SmallVec<[NodeId; 2]>) -> NodeId {
        self.network.intern(kind, children).0
    }
}
