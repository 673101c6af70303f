//! Read-only view of the network for operator debugging.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use permgate_core::{FactKey, FactValue, PermId};
use serde::Serialize;

use crate::network::{Network, NodeId, Value};
use crate::production::{ActivationState, Production};
use crate::registry::ConstraintId;

/// One live node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub kind: String,
    /// Interned structural key.
    pub key: String,
    pub height: u32,
    pub value: Value,
    pub refcount: u32,
    pub children: Vec<NodeId>,
    pub parents: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact: Option<FactKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<FactValue>,
    pub evaluations: u64,
}

/// One registered production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionView {
    pub constraint_id: ConstraintId,
    pub perm_id: PermId,
    pub root: NodeId,
    pub state: ActivationState,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub transitions: usize,
    /// Human-readable constraint body.
    pub expression: String,
}

/// Snapshot of all productions and their node graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub productions: Vec<ProductionView>,
    pub nodes: Vec<NodeView>,
    pub subscriptions: Vec<FactKey>,
    /// Nodes referenced more than once.
    pub shared_nodes: usize,
}

impl NetworkState {
    pub(crate) fn capture<'a>(
        network: &Network,
        productions: impl IntoIterator<Item = &'a Production>,
    ) -> Self {
        let mut productions: Vec<ProductionView> = productions
            .into_iter()
            .map(|p| ProductionView {
                constraint_id: p.id.clone(),
                perm_id: p.constraint.perm_id.clone(),
                root: p.root,
                state: p.state,
                evaluated_at: p.evaluated_at,
                transitions: p.history.len(),
                expression: p.constraint.body.to_string(),
            })
            .collect();
        productions.sort_by(|a, b| a.constraint_id.cmp(&b.constraint_id));

        let nodes: Vec<NodeView> = network
            .nodes()
            .map(|(id, node)| NodeView {
                id,
                kind: node.kind().label(),
                key: node.key.to_string(),
                height: node.height,
                value: node.value,
                refcount: node.refcount,
                children: node.children().to_vec(),
                parents: node.parents.to_vec(),
                fact: match node.kind() {
                    crate::network::NodeKind::Fact(key) => Some(key.clone()),
                    _ => None,
                },
                input: node.input,
                evaluations: node.evaluations,
            })
            .collect();
        let shared_nodes = nodes.iter().filter(|n| n.refcount > 1).count();

        Self {
            productions,
            nodes,
            subscriptions: network.subscriptions(),
            shared_nodes,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Renders every production as an indented node tree.
    ///
    /// Shared nodes are marked with `*`; a node reached twice under the same
    /// root is printed in full each time.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "activation network: {} productions, {} nodes ({} shared), {} facts",
            self.productions.len(),
            self.nodes.len(),
            self.shared_nodes,
            self.subscriptions.len()
        );
        for production in &self.productions {
            let _ = writeln!(
                out,
                "{} [{}] {}",
                production.constraint_id, production.state, production.expression
            );
            self.render_node(&mut out, production.root, 1);
        }
        out
    }

    fn render_node(&self, out: &mut String, id: NodeId, depth: usize) {
        let Some(node) = self.node(id) else {
            let _ = writeln!(out, "{}{id} <missing>", "  ".repeat(depth));
            return;
        };
        let shared = if node.refcount > 1 { "*" } else { "" };
        let _ = writeln!(
            out,
            "{}{}{shared} {} = {}",
            "  ".repeat(depth),
            node.id,
            node.kind,
            node.value
        );
        for child in &node.children {
            self.render_node(out, *child, depth + 1);
        }
    }
}
