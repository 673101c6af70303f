//! Well-formedness checks applied before a constraint is admitted.
//!
//! The validator walks the tree once in pre-order (node, then left, then
//! right) and reports the first violation together with the path of the
//! offending node. It never mutates its input.

#[cfg(test)]
mod tests;

use crate::ast::{BaseConstraint, BoolExpr, Constraint, NumExpr};
use crate::error::ValidationError;
use crate::ids::DEFAULT_MAX_IDENTIFIER_LEN;

/// Bounds guarding against adversarially large constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Maximum tree height, counting numeric and base nodes.
    pub max_depth: usize,
    /// Maximum number of nodes in one constraint body.
    pub max_nodes: usize,
    /// Maximum identifier length.
    pub max_identifier_len: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_nodes: 256,
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
        }
    }
}

/// Stateless constraint validator.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Checks a constraint, returning the first violation in pre-order.
    pub fn validate(&self, constraint: &Constraint) -> Result<(), ValidationError> {
        let mut walk = Walk {
            limits: &self.limits,
            path: Vec::new(),
            nodes: 0,
        };
        walk.identifier("permId", constraint.perm_id.as_str())?;
        walk.path.push("body");
        walk.bool_expr(&constraint.body, 1)
    }

    /// Decodes the tagged JSON form and validates the result.
    ///
    /// Decoding is the normalization step: literal strings and numbers both
    /// become canonical integers.
    pub fn validate_json(&self, json: &str) -> Result<Constraint, ValidationError> {
        let constraint =
            Constraint::from_json(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        self.validate(&constraint)?;
        Ok(constraint)
    }
}

/// Validates with the default limits.
pub fn validate(constraint: &Constraint) -> Result<(), ValidationError> {
    Validator::default().validate(constraint)
}

struct Walk<'a> {
    limits: &'a ValidationLimits,
    path: Vec<&'static str>,
    nodes: usize,
}

impl Walk<'_> {
    fn path_with(&self, leaf: &'static str) -> String {
        let mut parts = self.path.clone();
        parts.push(leaf);
        parts.join(".")
    }

    fn here(&self) -> String {
        self.path.join(".")
    }

    fn identifier(&self, field: &'static str, value: &str) -> Result<(), ValidationError> {
        crate::ids::check_identifier(value, self.limits.max_identifier_len).map_err(|reason| {
            ValidationError::InvalidIdentifier {
                path: self.path_with(field),
                reason,
            }
        })
    }

    fn enter(&mut self, depth: usize) -> Result<(), ValidationError> {
        if depth > self.limits.max_depth {
            return Err(ValidationError::DepthLimit {
                path: self.here(),
                limit: self.limits.max_depth,
            });
        }
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(ValidationError::NodeLimit {
                path: self.here(),
                limit: self.limits.max_nodes,
            });
        }
        Ok(())
    }

    fn child<T>(
        &mut self,
        field: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        self.path.push(field);
        let result = f(self);
        self.path.pop();
        result
    }

    fn bool_expr(&mut self, expr: &BoolExpr, depth: usize) -> Result<(), ValidationError> {
        self.enter(depth)?;
        match expr {
            BoolExpr::Not { body } => self.child("body", |w| w.bool_expr(body, depth + 1)),
            BoolExpr::And { left, right } | BoolExpr::Or { left, right } => {
                self.child("left", |w| w.bool_expr(left, depth + 1))?;
                self.child("right", |w| w.bool_expr(right, depth + 1))
            }
            BoolExpr::CompExpr { left, right, .. } => {
                self.child("left", |w| w.num_expr(left, depth + 1))?;
                self.child("right", |w| w.num_expr(right, depth + 1))
            }
            BoolExpr::Base { body } => self.child("body", |w| w.base(body, depth + 1)),
        }
    }

    fn base(&mut self, base: &BaseConstraint, depth: usize) -> Result<(), ValidationError> {
        self.enter(depth)?;
        match base {
            BaseConstraint::MaxDelegationDepth { depth: limit } => {
                self.child("depth", |w| w.num_expr(limit, depth + 1))
            }
            BaseConstraint::PermissionExists { pid } | BaseConstraint::PermissionEnabled { pid } => {
                self.identifier("pid", pid.as_str())
            }
            BaseConstraint::RateLimit {
                max_operations,
                period,
            } => {
                self.child("maxOperations", |w| w.num_expr(max_operations, depth + 1))?;
                self.child("period", |w| {
                    w.num_expr(period, depth + 1)?;
                    match period.constant_value() {
                        Some(v) if v >= 0 => Ok(()),
                        _ => Err(ValidationError::NonConstantPeriod { path: w.here() }),
                    }
                })
            }
            BaseConstraint::InactiveUnlessRedelegated => Ok(()),
        }
    }

    fn num_expr(&mut self, expr: &NumExpr, depth: usize) -> Result<(), ValidationError> {
        self.enter(depth)?;
        match expr {
            NumExpr::UIntLiteral { value } => {
                if i128::try_from(*value).is_err() {
                    return Err(ValidationError::LiteralOutOfRange {
                        path: self.here(),
                        value: *value,
                    });
                }
                Ok(())
            }
            NumExpr::BlockNumber => Ok(()),
            NumExpr::StakeOf { account } => self.identifier("account", account.as_str()),
            NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
                self.child("left", |w| w.num_expr(left, depth + 1))?;
                self.child("right", |w| w.num_expr(right, depth + 1))
            }
            NumExpr::WeightSet { from, to } | NumExpr::WeightPowerFrom { from, to } => {
                self.identifier("from", from.as_str())?;
                self.identifier("to", to.as_str())
            }
        }
    }
}
