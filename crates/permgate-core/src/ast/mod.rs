//! Constraint expression trees.
//!
//! The DSL is a closed set of immutable sum types. Every node serializes as a
//! JSON object whose `"$"` field names the variant, so a tree decoded from an
//! external source round-trips exactly.
//!
//! # Example
//!
//! ```
//! use permgate_core::ast::{BaseConstraint, BoolExpr, CompOp, Constraint, NumExpr};
//!
//! let constraint = Constraint::new(
//!     "p1",
//!     BoolExpr::and(
//!         BoolExpr::comp(CompOp::Gte, NumExpr::stake_of("acct1"), NumExpr::literal(1000)),
//!         BoolExpr::base(BaseConstraint::permission_enabled("42")),
//!     ),
//! );
//!
//! let json = constraint.to_json().unwrap();
//! assert_eq!(Constraint::from_json(&json).unwrap(), constraint);
//! assert_eq!(constraint.body.node_count(), 6);
//! ```

pub(crate) mod uint;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, PermId};

/// Numeric expression producing an exact integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "$")]
pub enum NumExpr {
    UIntLiteral {
        #[serde(with = "uint")]
        value: u128,
    },
    BlockNumber,
    StakeOf {
        account: AccountId,
    },
    Add {
        left: Box<NumExpr>,
        right: Box<NumExpr>,
    },
    Sub {
        left: Box<NumExpr>,
        right: Box<NumExpr>,
    },
    WeightSet {
        from: AccountId,
        to: AccountId,
    },
    WeightPowerFrom {
        from: AccountId,
        to: AccountId,
    },
}

/// Comparison operator between two numeric expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

/// Atomic predicate about permissions and delegation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "$")]
pub enum BaseConstraint {
    MaxDelegationDepth {
        depth: NumExpr,
    },
    PermissionExists {
        pid: PermId,
    },
    PermissionEnabled {
        pid: PermId,
    },
    RateLimit {
        #[serde(rename = "maxOperations")]
        max_operations: NumExpr,
        period: NumExpr,
    },
    InactiveUnlessRedelegated,
}

/// Boolean expression over comparisons and base predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "$")]
pub enum BoolExpr {
    Not {
        body: Box<BoolExpr>,
    },
    And {
        left: Box<BoolExpr>,
        right: Box<BoolExpr>,
    },
    Or {
        left: Box<BoolExpr>,
        right: Box<BoolExpr>,
    },
    CompExpr {
        op: CompOp,
        left: NumExpr,
        right: NumExpr,
    },
    Base {
        body: BaseConstraint,
    },
}

/// Top-level constraint attached to an on-chain permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub perm_id: PermId,
    pub body: BoolExpr,
}

impl NumExpr {
    pub fn literal(value: u128) -> Self {
        NumExpr::UIntLiteral { value }
    }

    pub fn block_number() -> Self {
        NumExpr::BlockNumber
    }

    pub fn stake_of(account: impl Into<AccountId>) -> Self {
        NumExpr::StakeOf {
            account: account.into(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(left: NumExpr, right: NumExpr) -> Self {
        NumExpr::Add {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(left: NumExpr, right: NumExpr) -> Self {
        NumExpr::Sub {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn weight_set(from: impl Into<AccountId>, to: impl Into<AccountId>) -> Self {
        NumExpr::WeightSet {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn weight_power_from(from: impl Into<AccountId>, to: impl Into<AccountId>) -> Self {
        NumExpr::WeightPowerFrom {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Number of nodes in this tree.
    pub fn node_count(&self) -> usize {
        match self {
            NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
                1 + left.node_count() + right.node_count()
            }
            _ => 1,
        }
    }

    /// Height of this tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
                1 + left.depth().max(right.depth())
            }
            _ => 1,
        }
    }

    /// Returns true if the expression references no external facts.
    pub fn is_constant(&self) -> bool {
        match self {
            NumExpr::UIntLiteral { .. } => true,
            NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
                left.is_constant() && right.is_constant()
            }
            _ => false,
        }
    }

    /// Folds a constant expression in the signed evaluation domain.
    ///
    /// Returns `None` for expressions that reference facts or overflow.
    pub fn constant_value(&self) -> Option<i128> {
        match self {
            NumExpr::UIntLiteral { value } => i128::try_from(*value).ok(),
            NumExpr::Add { left, right } => left.constant_value()?.checked_add(right.constant_value()?),
            NumExpr::Sub { left, right } => left.constant_value()?.checked_sub(right.constant_value()?),
            _ => None,
        }
    }
}

impl CompOp {
    /// Applies the operator to two exact integers.
    pub fn apply(self, left: i128, right: i128) -> bool {
        match self {
            CompOp::Gt => left > right,
            CompOp::Lt => left < right,
            CompOp::Gte => left >= right,
            CompOp::Lte => left <= right,
            CompOp::Eq => left == right,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
            CompOp::Eq => "==",
        }
    }
}

impl BaseConstraint {
    pub fn max_delegation_depth(depth: NumExpr) -> Self {
        BaseConstraint::MaxDelegationDepth { depth }
    }

    pub fn permission_exists(pid: impl Into<PermId>) -> Self {
        BaseConstraint::PermissionExists { pid: pid.into() }
    }

    pub fn permission_enabled(pid: impl Into<PermId>) -> Self {
        BaseConstraint::PermissionEnabled { pid: pid.into() }
    }

    pub fn rate_limit(max_operations: NumExpr, period: NumExpr) -> Self {
        BaseConstraint::RateLimit {
            max_operations,
            period,
        }
    }

    pub fn inactive_unless_redelegated() -> Self {
        BaseConstraint::InactiveUnlessRedelegated
    }

    /// Variant name as it appears in the `"$"` discriminant.
    pub fn tag(&self) -> &'static str {
        match self {
            BaseConstraint::MaxDelegationDepth { .. } => "MaxDelegationDepth",
            BaseConstraint::PermissionExists { .. } => "PermissionExists",
            BaseConstraint::PermissionEnabled { .. } => "PermissionEnabled",
            BaseConstraint::RateLimit { .. } => "RateLimit",
            BaseConstraint::InactiveUnlessRedelegated => "InactiveUnlessRedelegated",
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            BaseConstraint::MaxDelegationDepth { depth } => 1 + depth.node_count(),
            BaseConstraint::RateLimit {
                max_operations,
                period,
            } => 1 + max_operations.node_count() + period.node_count(),
            _ => 1,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            BaseConstraint::MaxDelegationDepth { depth } => 1 + depth.depth(),
            BaseConstraint::RateLimit {
                max_operations,
                period,
            } => 1 + max_operations.depth().max(period.depth()),
            _ => 1,
        }
    }
}

impl BoolExpr {
    #[allow(clippy::should_implement_trait)]
    pub fn not(body: BoolExpr) -> Self {
        BoolExpr::Not {
            body: Box::new(body),
        }
    }

    pub fn and(left: BoolExpr, right: BoolExpr) -> Self {
        BoolExpr::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: BoolExpr, right: BoolExpr) -> Self {
        BoolExpr::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comp(op: CompOp, left: NumExpr, right: NumExpr) -> Self {
        BoolExpr::CompExpr { op, left, right }
    }

    pub fn base(body: BaseConstraint) -> Self {
        BoolExpr::Base { body }
    }

    /// Number of nodes in this tree, numeric and base nodes included.
    pub fn node_count(&self) -> usize {
        match self {
            BoolExpr::Not { body } => 1 + body.node_count(),
            BoolExpr::And { left, right } | BoolExpr::Or { left, right } => {
                1 + left.node_count() + right.node_count()
            }
            BoolExpr::CompExpr { left, right, .. } => 1 + left.node_count() + right.node_count(),
            BoolExpr::Base { body } => 1 + body.node_count(),
        }
    }

    /// Height of this tree; a single comparison of two leaves has depth 2.
    pub fn depth(&self) -> usize {
        match self {
            BoolExpr::Not { body } => 1 + body.depth(),
            BoolExpr::And { left, right } | BoolExpr::Or { left, right } => {
                1 + left.depth().max(right.depth())
            }
            BoolExpr::CompExpr { left, right, .. } => 1 + left.depth().max(right.depth()),
            BoolExpr::Base { body } => 1 + body.depth(),
        }
    }
}

impl Constraint {
    pub fn new(perm_id: impl Into<PermId>, body: BoolExpr) -> Self {
        Self {
            perm_id: perm_id.into(),
            body,
        }
    }

    /// Serializes to the tagged JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Decodes the tagged JSON form. Unknown `"$"` tags are rejected.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumExpr::UIntLiteral { value } => write!(f, "{value}"),
            NumExpr::BlockNumber => f.write_str("block-number"),
            NumExpr::StakeOf { account } => write!(f, "stake-of({account})"),
            NumExpr::Add { left, right } => write!(f, "({left} + {right})"),
            NumExpr::Sub { left, right } => write!(f, "({left} - {right})"),
            NumExpr::WeightSet { from, to } => write!(f, "weight-set({from}->{to})"),
            NumExpr::WeightPowerFrom { from, to } => write!(f, "weight-power-from({from}->{to})"),
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BaseConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseConstraint::MaxDelegationDepth { depth } => write!(f, "max-delegation-depth({depth})"),
            BaseConstraint::PermissionExists { pid } => write!(f, "permission-exists({pid})"),
            BaseConstraint::PermissionEnabled { pid } => write!(f, "permission-enabled({pid})"),
            BaseConstraint::RateLimit {
                max_operations,
                period,
            } => write!(f, "rate-limit({max_operations} per {period})"),
            BaseConstraint::InactiveUnlessRedelegated => f.write_str("inactive-unless-redelegated"),
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::Not { body } => write!(f, "not({body})"),
            BoolExpr::And { left, right } => write!(f, "({left} and {right})"),
            BoolExpr::Or { left, right } => write!(f, "({left} or {right})"),
            BoolExpr::CompExpr { op, left, right } => write!(f, "({left} {op} {right})"),
            BoolExpr::Base { body } => write!(f, "{body}"),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.perm_id, self.body)
    }
}
