//! Per-node lifecycle tracking

use ledgernet_core::{NodeSpec, NodeState};

/// A planned node and where it is in its lifecycle
#[derive(Clone, Debug)]
pub struct NodeProgress {
    pub node: NodeSpec,
    pub state: NodeState,
}

/// Lifecycle of every node in a run
#[derive(Clone, Debug, Default)]
pub struct NetworkProgress {
    nodes: Vec<NodeProgress>,
}

impl NetworkProgress {
    /// Every node of the plan starts out `Planned`
    pub fn new(plan: &[NodeSpec]) -> Self {
        Self {
            nodes: plan
                .iter()
                .cloned()
                .map(|node| NodeProgress {
                    node,
                    state: NodeState::Planned,
                })
                .collect(),
        }
    }

    pub fn nodes(&self) -> &[NodeProgress] {
        &self.nodes
    }

    pub fn state(&self, id: &str) -> Option<NodeState> {
        self.nodes
            .iter()
            .find(|p| p.node.id() == id)
            .map(|p| p.state)
    }

    /// Move a node to `next`; out-of-order transitions are refused
    pub fn advance(&mut self, id: &str, next: NodeState) -> bool {
        let Some(entry) = self.nodes.iter_mut().find(|p| p.node.id() == id) else {
            tracing::warn!(node = id, "unknown node");
            return false;
        };

        if !entry.state.can_advance_to(next) {
            tracing::warn!(node = id, from = %entry.state, to = %next, "refused state transition");
            return false;
        }

        tracing::debug!(node = id, from = %entry.state, to = %next, "node state");
        entry.state = next;
        true
    }

    pub fn all_ready(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(|p| p.state == NodeState::Ready)
    }
}
