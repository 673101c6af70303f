//! Node representation for the activation network.

use std::fmt;

use permgate_core::{CompOp, FactKey, FactKind, FactValue};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;

/// Handle to a node slot in the network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Operation a node performs over its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Literal(i128),
    /// Leaf subscribed to one fact.
    Fact(FactKey),
    Add,
    Sub,
    Compare(CompOp),
    Not,
    And,
    Or,
}

impl NodeKind {
    /// Short human-readable label used by the network-state view.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Literal(v) => format!("literal({v})"),
            NodeKind::Fact(key) => format!("fact({key})"),
            NodeKind::Add => "add".to_string(),
            NodeKind::Sub => "sub".to_string(),
            NodeKind::Compare(op) => format!("compare({op})"),
            NodeKind::Not => "not".to_string(),
            NodeKind::And => "and".to_string(),
            NodeKind::Or => "or".to_string(),
        }
    }
}

/// Current value of a node.
///
/// Numeric nodes carry `Num`, boolean nodes carry `Bool`. A node whose
/// inputs cannot be resolved is `Indeterminate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Value {
    Num(i128),
    Bool(bool),
    #[default]
    Indeterminate,
}

impl Value {
    pub fn is_indeterminate(self) -> bool {
        matches!(self, Value::Indeterminate)
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_num(self) -> Option<i128> {
        match self {
            Value::Num(n) => Some(n),
            _ => None,
        }
    }

    /// Value of a fact leaf given its supplied input.
    pub(crate) fn of_fact(key: &FactKey, input: Option<FactValue>) -> Value {
        match (key.kind(), input) {
            (FactKind::Uint, Some(FactValue::Uint(v))) => {
                i128::try_from(v).map(Value::Num).unwrap_or(Value::Indeterminate)
            }
            (FactKind::Bool, Some(FactValue::Bool(b))) => Value::Bool(b),
            _ => Value::Indeterminate,
        }
    }

    /// Applies a non-leaf operator using Kleene three-valued logic.
    pub(crate) fn combine(kind: &NodeKind, operands: &[Value]) -> Value {
        match (kind, operands) {
            (NodeKind::Literal(v), _) => Value::Num(*v),
            (NodeKind::Add, [Value::Num(a), Value::Num(b)]) => {
                a.checked_add(*b).map(Value::Num).unwrap_or(Value::Indeterminate)
            }
            (NodeKind::Sub, [Value::Num(a), Value::Num(b)]) => {
                a.checked_sub(*b).map(Value::Num).unwrap_or(Value::Indeterminate)
            }
            (NodeKind::Compare(op), [Value::Num(a), Value::Num(b)]) => Value::Bool(op.apply(*a, *b)),
            (NodeKind::Not, [Value::Bool(b)]) => Value::Bool(!b),
            (NodeKind::And, [a, b]) => match (a, b) {
                (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
                (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                _ => Value::Indeterminate,
            },
            (NodeKind::Or, [a, b]) => match (a, b) {
                (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
                (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                _ => Value::Indeterminate,
            },
            _ => Value::Indeterminate,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Indeterminate => f.write_str("indeterminate"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structural identity used by the interning table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    pub kind: NodeKind,
    pub children: SmallVec<[NodeId; 2]>,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.label())?;
        if !self.children.is_empty() {
            f.write_str("[")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: NodeKey,
    pub parents: SmallVec<[NodeId; 4]>,
    /// Leaves have height 0; every parent is strictly higher than its children.
    pub height: u32,
    /// References held by parent slots and production roots.
    pub refcount: u32,
    pub value: Value,
    /// Last supplied input, fact leaves only.
    pub input: Option<FactValue>,
    /// Network epoch of the last input supplied to this leaf.
    pub input_epoch: u64,
    pub evaluations: u64,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.key.kind
    }

    pub fn children(&self) -> &[NodeId] {
        &self.key.children
    }
}
