//! Fact keys and values supplied by the outside world.
//!
//! A fact is a point-in-time value for one quantity referenced by an
//! expression. Keys have a canonical text form used in logs and in the
//! network-state view:
//!
//! ```
//! use permgate_core::fact::FactKey;
//!
//! let key: FactKey = "weight-set:g->acct1".parse().unwrap();
//! assert_eq!(key, FactKey::weight_set("g", "acct1"));
//! assert_eq!(key.to_string(), "weight-set:g->acct1");
//! ```
//!
//! Numeric facts are exact integers in the chain's base unit; no scaling is
//! applied between literals and facts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::ast::{BaseConstraint, NumExpr};
use crate::ids::{AccountId, PermId};

/// Identity of one externally supplied quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactKey {
    BlockNumber,
    StakeOf(AccountId),
    WeightSet { from: AccountId, to: AccountId },
    WeightPowerFrom { from: AccountId, to: AccountId },
    PermissionExists(PermId),
    PermissionEnabled(PermId),
    /// Current delegation depth of a permission.
    DelegationDepth(PermId),
    /// Operations observed on a permission within the trailing `period` blocks.
    OperationCount { perm_id: PermId, period: u128 },
    /// Whether a permission has been re-delegated.
    Redelegated(PermId),
}

/// Value type a fact key expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Uint,
    Bool,
}

/// A supplied fact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactValue {
    Uint(#[serde(with = "crate::ast::uint")] u128),
    Bool(bool),
}

/// A key paired with its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub key: FactKey,
    pub value: FactValue,
}

/// Error parsing the canonical text form of a fact key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid fact key {0:?}")]
pub struct FactKeyParseError(pub String);

impl FactKey {
    pub fn stake_of(account: impl Into<AccountId>) -> Self {
        FactKey::StakeOf(account.into())
    }

    pub fn weight_set(from: impl Into<AccountId>, to: impl Into<AccountId>) -> Self {
        FactKey::WeightSet {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn weight_power_from(from: impl Into<AccountId>, to: impl Into<AccountId>) -> Self {
        FactKey::WeightPowerFrom {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn permission_exists(perm_id: impl Into<PermId>) -> Self {
        FactKey::PermissionExists(perm_id.into())
    }

    pub fn permission_enabled(perm_id: impl Into<PermId>) -> Self {
        FactKey::PermissionEnabled(perm_id.into())
    }

    pub fn delegation_depth(perm_id: impl Into<PermId>) -> Self {
        FactKey::DelegationDepth(perm_id.into())
    }

    pub fn operation_count(perm_id: impl Into<PermId>, period: u128) -> Self {
        FactKey::OperationCount {
            perm_id: perm_id.into(),
            period,
        }
    }

    pub fn redelegated(perm_id: impl Into<PermId>) -> Self {
        FactKey::Redelegated(perm_id.into())
    }

    /// The value type this key carries.
    pub fn kind(&self) -> FactKind {
        match self {
            FactKey::PermissionExists(_) | FactKey::PermissionEnabled(_) | FactKey::Redelegated(_) => {
                FactKind::Bool
            }
            _ => FactKind::Uint,
        }
    }

    /// Fact read by a numeric leaf, if the expression is a fact leaf.
    pub fn for_num_leaf(expr: &NumExpr) -> Option<FactKey> {
        match expr {
            NumExpr::BlockNumber => Some(FactKey::BlockNumber),
            NumExpr::StakeOf { account } => Some(FactKey::StakeOf(account.clone())),
            NumExpr::WeightSet { from, to } => Some(FactKey::WeightSet {
                from: from.clone(),
                to: to.clone(),
            }),
            NumExpr::WeightPowerFrom { from, to } => Some(FactKey::WeightPowerFrom {
                from: from.clone(),
                to: to.clone(),
            }),
            _ => None,
        }
    }

    /// Fact read directly by a base predicate owned by `owner`.
    ///
    /// Returns `None` for a rate limit whose period is not constant.
    pub fn for_base(base: &BaseConstraint, owner: &PermId) -> Option<FactKey> {
        match base {
            BaseConstraint::MaxDelegationDepth { .. } => Some(FactKey::DelegationDepth(owner.clone())),
            BaseConstraint::PermissionExists { pid } => Some(FactKey::PermissionExists(pid.clone())),
            BaseConstraint::PermissionEnabled { pid } => Some(FactKey::PermissionEnabled(pid.clone())),
            BaseConstraint::RateLimit { period, .. } => {
                let period = u128::try_from(period.constant_value()?).ok()?;
                Some(FactKey::OperationCount {
                    perm_id: owner.clone(),
                    period,
                })
            }
            BaseConstraint::InactiveUnlessRedelegated => Some(FactKey::Redelegated(owner.clone())),
        }
    }
}

impl FactValue {
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Uint(_) => FactKind::Uint,
            FactValue::Bool(_) => FactKind::Bool,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            FactValue::Uint(v) => Some(*v),
            FactValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(v) => Some(*v),
            FactValue::Uint(_) => None,
        }
    }
}

impl From<u128> for FactValue {
    fn from(value: u128) -> Self {
        FactValue::Uint(value)
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl Fact {
    pub fn new(key: FactKey, value: impl Into<FactValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactKey::BlockNumber => f.write_str("block-number"),
            FactKey::StakeOf(account) => write!(f, "stake-of:{account}"),
            FactKey::WeightSet { from, to } => write!(f, "weight-set:{from}->{to}"),
            FactKey::WeightPowerFrom { from, to } => write!(f, "weight-power-from:{from}->{to}"),
            FactKey::PermissionExists(p) => write!(f, "permission-exists:{p}"),
            FactKey::PermissionEnabled(p) => write!(f, "permission-enabled:{p}"),
            FactKey::DelegationDepth(p) => write!(f, "delegation-depth:{p}"),
            FactKey::OperationCount { perm_id, period } => {
                write!(f, "operation-count:{perm_id}@{period}")
            }
            FactKey::Redelegated(p) => write!(f, "redelegated:{p}"),
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Uint(v) => write!(f, "{v}"),
            FactValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for FactKey {
    type Err = FactKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FactKeyParseError(s.to_string());
        if s == "block-number" {
            return Ok(FactKey::BlockNumber);
        }
        let (kind, rest) = s.split_once(':').ok_or_else(err)?;
        if rest.is_empty() {
            return Err(err());
        }
        let pair = || -> Result<(AccountId, AccountId), FactKeyParseError> {
            let (from, to) = rest.split_once("->").ok_or_else(err)?;
            if from.is_empty() || to.is_empty() {
                return Err(err());
            }
            Ok((AccountId::new(from), AccountId::new(to)))
        };
        let key = match kind {
            "stake-of" => FactKey::StakeOf(AccountId::new(rest)),
            "weight-set" => {
                let (from, to) = pair()?;
                FactKey::WeightSet { from, to }
            }
            "weight-power-from" => {
                let (from, to) = pair()?;
                FactKey::WeightPowerFrom { from, to }
            }
            "permission-exists" => FactKey::PermissionExists(PermId::new(rest)),
            "permission-enabled" => FactKey::PermissionEnabled(PermId::new(rest)),
            "delegation-depth" => FactKey::DelegationDepth(PermId::new(rest)),
            "operation-count" => {
                let (perm, period) = rest.rsplit_once('@').ok_or_else(err)?;
                let period = period.parse::<u128>().map_err(|_| err())?;
                if perm.is_empty() {
                    return Err(err());
                }
                FactKey::OperationCount {
                    perm_id: PermId::new(perm),
                    period,
                }
            }
            "redelegated" => FactKey::Redelegated(PermId::new(rest)),
            _ => return Err(err()),
        };
        Ok(key)
    }
}

impl Serialize for FactKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FactKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_key_text_round_trip() {
        let keys = [
            FactKey::BlockNumber,
            FactKey::stake_of("acct1"),
            FactKey::weight_set("g", "acct1"),
            FactKey::weight_power_from("g", "acct1"),
            FactKey::permission_exists("p1"),
            FactKey::permission_enabled("42"),
            FactKey::delegation_depth("p1"),
            FactKey::operation_count("p1", 100),
            FactKey::redelegated("p1"),
        ];
        for key in keys {
            let text = key.to_string();
            assert_eq!(text.parse::<FactKey>().unwrap(), key, "{text}");
        }
    }

    #[test]
    fn test_fact_key_parse_errors() {
        assert!("stake-of".parse::<FactKey>().is_err());
        assert!("stake-of:".parse::<FactKey>().is_err());
        assert!("weight-set:g".parse::<FactKey>().is_err());
        assert!("operation-count:p1@x".parse::<FactKey>().is_err());
        assert!("unknown:x".parse::<FactKey>().is_err());
    }

    #[test]
    fn test_fact_kinds() {
        assert_eq!(FactKey::permission_enabled("1").kind(), FactKind::Bool);
        assert_eq!(FactKey::redelegated("1").kind(), FactKind::Bool);
        assert_eq!(FactKey::stake_of("a").kind(), FactKind::Uint);
        assert_eq!(FactKey::BlockNumber.kind(), FactKind::Uint);
        assert_eq!(FactValue::from(true).kind(), FactKind::Bool);
    }

    #[test]
    fn test_fact_serializes_with_text_key() {
        let fact = Fact::new(FactKey::stake_of("acct1"), 1500u128);
        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["key"], "stake-of:acct1");
        assert_eq!(value["value"]["uint"], "1500");
        let back: Fact = serde_json::from_value(value).unwrap();
        assert_eq!(back, fact);
    }

    #[test]
    fn test_base_fact_keys_use_owner() {
        let owner = PermId::new("p9");
        let rate = BaseConstraint::rate_limit(
            NumExpr::literal(5),
            NumExpr::add(NumExpr::literal(50), NumExpr::literal(50)),
        );
        assert_eq!(
            FactKey::for_base(&rate, &owner),
            Some(FactKey::operation_count("p9", 100))
        );
        let dynamic = BaseConstraint::rate_limit(NumExpr::literal(5), NumExpr::block_number());
        assert_eq!(FactKey::for_base(&dynamic, &owner), None);
        assert_eq!(
            FactKey::for_base(&BaseConstraint::inactive_unless_redelegated(), &owner),
            Some(FactKey::redelegated("p9"))
        );
    }
}
