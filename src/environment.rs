//! The node registry.
//!
//! The environment owns every node, the links between them and the list of
//! reactions hosted by each node. Everything else refers to nodes through
//! `NodeId` handles, so there are no ownership cycles between nodes and the
//! reactions they host.

use indexmap::{IndexMap, IndexSet};

use crate::error::{ExecutionError, KernelError, KernelResult};
use crate::node::{Node, NodeId};
use crate::reaction::ReactionId;

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    neighbors: IndexSet<NodeId>,
    reactions: Vec<ReactionId>,
}

/// Registry of nodes, links and hosted reactions.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    slots: IndexMap<NodeId, Slot>,
    next_node: u64,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty node and returns its handle.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::from_raw(self.next_node);
        self.next_node += 1;
        self.slots.insert(
            id,
            Slot {
                node: Node::new(id),
                neighbors: IndexSet::new(),
                reactions: Vec::new(),
            },
        );
        id
    }

    /// Returns the node, if it is still part of the environment.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(&id).map(|slot| &slot.node)
    }

    /// Returns the node mutably, if it is still part of the environment.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(&id).map(|slot| &mut slot.node)
    }

    /// Returns the node or a `NodeNotFound` error.
    pub fn require_node(&self, id: NodeId) -> KernelResult<&Node> {
        self.node(id).ok_or_else(|| node_not_found(id))
    }

    /// Returns the node mutably or a `NodeNotFound` error.
    pub fn require_node_mut(&mut self, id: NodeId) -> KernelResult<&mut Node> {
        self.node_mut(id).ok_or_else(|| node_not_found(id))
    }

    /// Returns true if the node is part of the environment.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterates node handles in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.keys().copied()
    }

    /// Links two distinct nodes as neighbours. Linking is symmetric.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either node is missing.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> KernelResult<()> {
        self.require_node(a)?;
        self.require_node(b)?;
        if a == b {
            return Ok(());
        }
        if let Some(slot) = self.slots.get_mut(&a) {
            slot.neighbors.insert(b);
        }
        if let Some(slot) = self.slots.get_mut(&b) {
            slot.neighbors.insert(a);
        }
        Ok(())
    }

    /// Removes the link between two nodes, if any.
    ///
    /// Once the environment belongs to an `Engine`, use `Engine::unlink`,
    /// which also reschedules the reactions on both nodes.
    pub fn unlink(&mut self, a: NodeId, b: NodeId) {
        if let Some(slot) = self.slots.get_mut(&a) {
            slot.neighbors.shift_remove(&b);
        }
        if let Some(slot) = self.slots.get_mut(&b) {
            slot.neighbors.shift_remove(&a);
        }
    }

    /// Iterates the neighbours of a node. Unknown nodes have none.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .get(&id)
            .into_iter()
            .flat_map(|slot| slot.neighbors.iter().copied())
    }

    /// Returns true if the two nodes are linked.
    #[must_use]
    pub fn are_neighbors(&self, a: NodeId, b: NodeId) -> bool {
        self.slots
            .get(&a)
            .is_some_and(|slot| slot.neighbors.contains(&b))
    }

    /// Returns true if the two nodes have at least one neighbour in common.
    #[must_use]
    pub fn share_neighbor(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(sa), Some(sb)) = (self.slots.get(&a), self.slots.get(&b)) else {
            return false;
        };
        sa.neighbors.iter().any(|n| sb.neighbors.contains(n))
    }

    /// Number of reactions currently hosted by a node.
    #[must_use]
    pub fn reaction_count(&self, id: NodeId) -> usize {
        self.slots.get(&id).map_or(0, |slot| slot.reactions.len())
    }

    /// Reactions hosted by a node, in registration order.
    #[must_use]
    pub fn reactions_of(&self, id: NodeId) -> &[ReactionId] {
        match self.slots.get(&id) {
            Some(slot) => &slot.reactions,
            None => &[],
        }
    }

    pub(crate) fn register_reaction(&mut self, node: NodeId, reaction: ReactionId) -> KernelResult<()> {
        let slot = self.slots.get_mut(&node).ok_or_else(|| node_not_found(node))?;
        slot.reactions.push(reaction);
        Ok(())
    }

    pub(crate) fn unregister_reaction(&mut self, node: NodeId, reaction: ReactionId) {
        if let Some(slot) = self.slots.get_mut(&node) {
            slot.reactions.retain(|r| *r != reaction);
        }
    }

    /// Removes a node and its links, returning the reactions it hosted.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> KernelResult<Vec<ReactionId>> {
        let slot = self.slots.shift_remove(&id).ok_or_else(|| node_not_found(id))?;
        for neighbor in &slot.neighbors {
            if let Some(other) = self.slots.get_mut(neighbor) {
                other.neighbors.shift_remove(&id);
            }
        }
        Ok(slot.reactions)
    }
}

fn node_not_found(id: NodeId) -> KernelError {
    KernelError::Execution(ExecutionError::NodeNotFound { id })
}
