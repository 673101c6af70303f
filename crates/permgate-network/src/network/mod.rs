//! The activation network: a hash-consed DAG over constraint expressions.
//!
//! Every expression node is interned by structural identity (operator plus
//! interned child ids), so identical subexpressions of different constraints
//! share one node. Fact leaves are the only inputs. When facts change, dirty
//! nodes are recomputed in height order, which guarantees each affected node
//! is evaluated exactly once per batch no matter how many paths reach it.
//!
//! Nodes are reference counted. A node is freed when the last parent or
//! production root releases it; freeing a fact leaf drops its subscription.

mod compile;
mod node;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap, HashSet};

use permgate_core::{Constraint, FactKey, FactValue};
use smallvec::SmallVec;
use tracing::{error, trace, warn};

pub use compile::{CompileError, Compiled};
pub use node::{NodeId, NodeKind, Value};
pub(crate) use node::Node;
use node::NodeKey;

/// Outcome of one propagation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Nodes recomputed in this batch.
    pub recomputed: usize,
    /// Nodes whose value changed.
    pub changed: HashSet<NodeId>,
}

/// Arena of interned nodes plus the fact subscription table.
#[derive(Debug, Default)]
pub struct Network {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
    interned: HashMap<NodeKey, NodeId>,
    leaves: HashMap<FactKey, NodeId>,
    dirty: BTreeSet<(u32, NodeId)>,
    /// Bumped on every fact input, changed or not.
    epoch: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a constraint, reusing any structurally identical nodes.
    ///
    /// New nodes are evaluated immediately from the current fact inputs, so
    /// the root value is valid as soon as this returns.
    pub fn compile(&mut self, constraint: &Constraint) -> Result<Compiled, CompileError> {
        compile::check(constraint)?;
        let mut lowering = compile::Lowering {
            network: self,
            owner: &constraint.perm_id,
            new_facts: Vec::new(),
        };
        let root = lowering.bool_expr(&constraint.body);
        let new_facts = lowering.new_facts;
        Ok(Compiled { root, new_facts })
    }

    /// Takes an extra reference on a node.
    pub fn retain(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.refcount += 1;
        }
    }

    /// Drops one reference to `id`, freeing every node no longer referenced.
    ///
    /// Returns the fact keys whose last subscriber was freed.
    pub fn release(&mut self, id: NodeId) -> Vec<FactKey> {
        let mut dropped = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                error!(event = "release_missing_node", node = %id);
                continue;
            };
            node.refcount = node.refcount.saturating_sub(1);
            if node.refcount > 0 {
                continue;
            }
            let Some(node) = self.slots.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            self.free.push(id.0);
            self.interned.remove(&node.key);
            self.dirty.remove(&(node.height, id));
            if let NodeKind::Fact(key) = &node.key.kind {
                self.leaves.remove(key);
                dropped.push(key.clone());
            }
            for child in node.children() {
                if let Some(child_node) = self.node_mut(*child) {
                    child_node.parents.retain(|p| *p != id);
                }
                stack.push(*child);
            }
            trace!(event = "node_freed", node = %id, key = %node.key);
        }
        dropped
    }

    /// Records a new input for a subscribed fact and marks it dirty.
    ///
    /// `None` means the fact is currently unresolved. Returns false if no
    /// leaf subscribes to the key or the input is unchanged. The leaf's input
    /// epoch advances either way.
    pub fn set_fact(&mut self, key: &FactKey, input: Option<FactValue>) -> bool {
        let Some(&id) = self.leaves.get(key) else {
            return false;
        };
        self.epoch += 1;
        let epoch = self.epoch;
        if let Some(value) = input {
            if value.kind() != key.kind() {
                warn!(
                    event = "fact_kind_mismatch",
                    fact = %key,
                    expected = ?key.kind(),
                    supplied = ?value.kind(),
                );
            }
        }
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.input_epoch = epoch;
        if node.input == input {
            return false;
        }
        node.input = input;
        let height = node.height;
        self.dirty.insert((height, id));
        true
    }

    /// Recomputes all dirty nodes bottom-up.
    pub fn propagate(&mut self) -> Propagation {
        let mut result = Propagation::default();
        while let Some((_, id)) = self.dirty.pop_first() {
            let Some(next) = self.compute(id) else {
                continue;
            };
            result.recomputed += 1;
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            node.evaluations += 1;
            if node.value == next {
                continue;
            }
            node.value = next;
            let parents = node.parents.clone();
            result.changed.insert(id);
            for parent in parents {
                if let Some(height) = self.node(parent).map(|p| p.height) {
                    self.dirty.insert((height, parent));
                }
            }
        }
        result
    }

    pub fn value(&self, id: NodeId) -> Value {
        self.node(id).map(|n| n.value).unwrap_or_default()
    }

    /// Last input supplied for a subscribed fact.
    pub fn fact_input(&self, key: &FactKey) -> Option<FactValue> {
        self.leaves
            .get(key)
            .and_then(|id| self.node(*id))
            .and_then(|n| n.input)
    }

    /// Current input epoch. Every later input to any leaf is stamped higher.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Epoch of the last input supplied for `key`, if a leaf subscribes to it.
    pub fn input_epoch(&self, key: &FactKey) -> Option<u64> {
        self.leaves
            .get(key)
            .and_then(|id| self.node(*id))
            .map(|n| n.input_epoch)
    }

    pub fn is_subscribed(&self, key: &FactKey) -> bool {
        self.leaves.contains_key(key)
    }

    /// Subscribed fact keys in canonical order.
    pub fn subscriptions(&self) -> Vec<FactKey> {
        let mut keys: Vec<FactKey> = self.leaves.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.interned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interned.is_empty()
    }

    pub fn refcount(&self, id: NodeId) -> u32 {
        self.node(id).map(|n| n.refcount).unwrap_or(0)
    }

    /// Looks up an interned node by structure.
    pub fn find(&self, kind: &NodeKind, children: &[NodeId]) -> Option<NodeId> {
        let key = NodeKey {
            kind: kind.clone(),
            children: SmallVec::from_slice(children),
        };
        self.interned.get(&key).copied()
    }

    /// Live nodes in id order.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn compute(&self, id: NodeId) -> Option<Value> {
        let node = self.node(id)?;
        let value = match node.kind() {
            NodeKind::Fact(key) => Value::of_fact(key, node.input),
            kind => {
                let operands: SmallVec<[Value; 2]> =
                    node.children().iter().map(|c| self.value(*c)).collect();
                Value::combine(kind, &operands)
            }
        };
        Some(value)
    }

    /// Returns the node for `kind`/`children`, creating it if needed.
    ///
    /// The caller passes ownership of one reference per child and receives
    /// one reference to the result. The flag is true if the node is new.
    pub(crate) fn intern(
        &mut self,
        kind: NodeKind,
        children: SmallVec<[NodeId; 2]>,
    ) -> (NodeId, bool) {
        let key = NodeKey { kind, children };
        if let Some(&id) = self.interned.get(&key) {
            // the existing node already holds its children
            for child in &key.children {
                if let Some(node) = self.node_mut(*child) {
                    node.refcount = node.refcount.saturating_sub(1);
                }
            }
            self.retain(id);
            return (id, false);
        }

        let height = key
            .children
            .iter()
            .filter_map(|c| self.node(*c))
            .map(|n| n.height + 1)
            .max()
            .unwrap_or(0);
        let id = match self.free.pop() {
            Some(slot) => NodeId(slot),
            None => {
                self.slots.push(None);
                NodeId((self.slots.len() - 1) as u32)
            }
        };
        for child in &key.children {
            if let Some(node) = self.node_mut(*child) {
                if !node.parents.contains(&id) {
                    node.parents.push(id);
                }
            }
        }
        if let NodeKind::Fact(fact) = &key.kind {
            self.leaves.insert(fact.clone(), id);
        }
        self.slots[id.index()] = Some(Node {
            key: key.clone(),
            parents: SmallVec::new(),
            height,
            refcount: 1,
            value: Value::Indeterminate,
            input: None,
            input_epoch: self.epoch,
            evaluations: 0,
        });
        let value = self.compute(id).unwrap_or_default();
        if let Some(node) = self.node_mut(id) {
            node.value = value;
            node.evaluations = 1;
        }
        trace!(event = "node_created", node = %id, key = %key);
        self.interned.insert(key, id);
        (id, true)
    }
}
