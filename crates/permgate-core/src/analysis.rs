//! Structural analysis of constraint bodies.
//!
//! A body is split into its atoms (comparisons and base predicates) and a
//! logical skeleton that refers to atoms by index. The skeleton can be put
//! back together with [`reconstruct`], split into top-level conjuncts with
//! [`conjuncts`], or rendered as an indented tree.

use std::collections::BTreeSet;
use std::fmt::Write;

use serde::Serialize;

use crate::ast::{BaseConstraint, BoolExpr, CompOp, Constraint, NumExpr};
use crate::fact::FactKey;
use crate::ids::PermId;

/// An indivisible predicate inside a boolean expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Atom {
    Base {
        constraint: BaseConstraint,
    },
    Comparison {
        op: CompOp,
        left: NumExpr,
        right: NumExpr,
    },
}

/// Logical skeleton of a boolean expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Structure {
    Atom { index: usize },
    Not { body: Box<Structure> },
    And { left: Box<Structure>, right: Box<Structure> },
    Or { left: Box<Structure>, right: Box<Structure> },
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintAnalysis {
    pub perm_id: PermId,
    pub atoms: Vec<Atom>,
    pub structure: Structure,
    /// Number of skeleton nodes; atoms count once regardless of size.
    pub complexity: usize,
}

/// Decomposes a constraint into atoms and skeleton.
pub fn analyze(constraint: &Constraint) -> ConstraintAnalysis {
    let mut atoms = Vec::new();
    let structure = decompose(&constraint.body, &mut atoms);
    let complexity = structure.complexity();
    ConstraintAnalysis {
        perm_id: constraint.perm_id.clone(),
        atoms,
        structure,
        complexity,
    }
}

fn decompose(expr: &BoolExpr, atoms: &mut Vec<Atom>) -> Structure {
    match expr {
        BoolExpr::Base { body } => {
            atoms.push(Atom::Base {
                constraint: body.clone(),
            });
            Structure::Atom {
                index: atoms.len() - 1,
            }
        }
        BoolExpr::CompExpr { op, left, right } => {
            atoms.push(Atom::Comparison {
                op: *op,
                left: left.clone(),
                right: right.clone(),
            });
            Structure::Atom {
                index: atoms.len() - 1,
            }
        }
        BoolExpr::Not { body } => Structure::Not {
            body: Box::new(decompose(body, atoms)),
        },
        BoolExpr::And { left, right } => Structure::And {
            left: Box::new(decompose(left, atoms)),
            right: Box::new(decompose(right, atoms)),
        },
        BoolExpr::Or { left, right } => Structure::Or {
            left: Box::new(decompose(left, atoms)),
            right: Box::new(decompose(right, atoms)),
        },
    }
}

impl Structure {
    pub fn complexity(&self) -> usize {
        match self {
            Structure::Atom { .. } => 1,
            Structure::Not { body } => 1 + body.complexity(),
            Structure::And { left, right } | Structure::Or { left, right } => {
                1 + left.complexity() + right.complexity()
            }
        }
    }

    fn without_double_negation(&self) -> Structure {
        match self {
            Structure::Atom { index } => Structure::Atom { index: *index },
            Structure::Not { body } => match body.as_ref() {
                Structure::Not { body: inner } => inner.without_double_negation(),
                other => Structure::Not {
                    body: Box::new(other.without_double_negation()),
                },
            },
            Structure::And { left, right } => Structure::And {
                left: Box::new(left.without_double_negation()),
                right: Box::new(right.without_double_negation()),
            },
            Structure::Or { left, right } => Structure::Or {
                left: Box::new(left.without_double_negation()),
                right: Box::new(right.without_double_negation()),
            },
        }
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Structure>) {
        match self {
            Structure::And { left, right } => {
                left.collect_conjuncts(out);
                right.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }
}

/// Rebuilds a boolean expression from a skeleton and its atoms.
///
/// Returns `None` if the skeleton refers to a missing atom.
pub fn reconstruct(structure: &Structure, atoms: &[Atom]) -> Option<BoolExpr> {
    let expr = match structure {
        Structure::Atom { index } => match atoms.get(*index)? {
            Atom::Base { constraint } => BoolExpr::base(constraint.clone()),
            Atom::Comparison { op, left, right } => BoolExpr::comp(*op, left.clone(), right.clone()),
        },
        Structure::Not { body } => BoolExpr::not(reconstruct(body, atoms)?),
        Structure::And { left, right } => {
            BoolExpr::and(reconstruct(left, atoms)?, reconstruct(right, atoms)?)
        }
        Structure::Or { left, right } => {
            BoolExpr::or(reconstruct(left, atoms)?, reconstruct(right, atoms)?)
        }
    };
    Some(expr)
}

/// Splits an expression into the clauses of its top-level conjunction.
///
/// Double negations are removed; no other rewriting happens, so the
/// conjunction of the result is equivalent to the input.
pub fn conjuncts(expr: &BoolExpr) -> Vec<BoolExpr> {
    let mut atoms = Vec::new();
    let structure = decompose(expr, &mut atoms).without_double_negation();
    let mut clauses = Vec::new();
    structure.collect_conjuncts(&mut clauses);
    clauses
        .into_iter()
        .filter_map(|clause| reconstruct(clause, &atoms))
        .collect()
}

/// One line per atom, in index order.
pub fn describe_atoms(atoms: &[Atom]) -> Vec<String> {
    atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| match atom {
            Atom::Base { constraint } => format!("atom #{i}: base {}", constraint.tag()),
            Atom::Comparison { op, left, right } => format!("atom #{i}: {left} {op} {right}"),
        })
        .collect()
}

/// Renders the skeleton as an indented tree.
///
/// ```
/// use permgate_core::analysis::{analyze, render};
/// use permgate_core::ast::{BaseConstraint, BoolExpr, Constraint};
///
/// let constraint = Constraint::new(
///     "p1",
///     BoolExpr::not(BoolExpr::base(BaseConstraint::permission_exists("p2"))),
/// );
/// let analysis = analyze(&constraint);
/// assert_eq!(render(&analysis.structure, &analysis.atoms), "NOT\n  #0 Base(PermissionExists)");
/// ```
pub fn render(structure: &Structure, atoms: &[Atom]) -> String {
    let mut out = String::new();
    render_into(&mut out, structure, atoms, 0);
    out
}

fn render_into(out: &mut String, structure: &Structure, atoms: &[Atom], indent: usize) {
    if !out.is_empty() {
        out.push('\n');
    }
    let pad = "  ".repeat(indent);
    match structure {
        Structure::Atom { index } => {
            let _ = match atoms.get(*index) {
                Some(Atom::Base { constraint }) => {
                    write!(out, "{pad}#{index} Base({})", constraint.tag())
                }
                Some(Atom::Comparison { op, .. }) => write!(out, "{pad}#{index} Compare({op:?})"),
                None => write!(out, "{pad}#{index} <missing>"),
            };
        }
        Structure::Not { body } => {
            let _ = write!(out, "{pad}NOT");
            render_into(out, body, atoms, indent + 1);
        }
        Structure::And { left, right } => {
            let _ = write!(out, "{pad}AND");
            render_into(out, left, atoms, indent + 1);
            render_into(out, right, atoms, indent + 1);
        }
        Structure::Or { left, right } => {
            let _ = write!(out, "{pad}OR");
            render_into(out, left, atoms, indent + 1);
            render_into(out, right, atoms, indent + 1);
        }
    }
}

/// Every fact a constraint reads, in canonical key order.
pub fn referenced_facts(constraint: &Constraint) -> BTreeSet<FactKey> {
    let mut keys = BTreeSet::new();
    collect_bool(&constraint.body, &constraint.perm_id, &mut keys);
    keys
}

fn collect_bool(expr: &BoolExpr, owner: &PermId, keys: &mut BTreeSet<FactKey>) {
    match expr {
        BoolExpr::Not { body } => collect_bool(body, owner, keys),
        BoolExpr::And { left, right } | BoolExpr::Or { left, right } => {
            collect_bool(left, owner, keys);
            collect_bool(right, owner, keys);
        }
        BoolExpr::CompExpr { left, right, .. } => {
            collect_num(left, keys);
            collect_num(right, keys);
        }
        BoolExpr::Base { body } => {
            if let Some(key) = FactKey::for_base(body, owner) {
                keys.insert(key);
            }
            match body {
                BaseConstraint::MaxDelegationDepth { depth } => collect_num(depth, keys),
                BaseConstraint::RateLimit { max_operations, .. } => collect_num(max_operations, keys),
                _ => {}
            }
        }
    }
}

fn collect_num(expr: &NumExpr, keys: &mut BTreeSet<FactKey>) {
    match expr {
        NumExpr::Add { left, right } | NumExpr::Sub { left, right } => {
            collect_num(left, keys);
            collect_num(right, keys);
        }
        leaf => {
            if let Some(key) = FactKey::for_num_leaf(leaf) {
                keys.insert(key);
            }
        }
    }
}
