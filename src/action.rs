//! Effect actions.
//!
//! An action is owned by exactly one reaction. It applies an effect to the
//! environment, declares which dependencies it writes and the scope of the
//! write, and can clone itself onto another (node, reaction) pair.

use std::fmt;

use crate::context::Context;
use crate::dependency::{Dependency, DependencySet};
use crate::environment::Environment;
use crate::error::{KernelError, KernelResult};
use crate::molecule::Molecule;
use crate::node::NodeId;
use crate::reaction::ReactionId;

/// Effect unit of a reaction.
pub trait Action: fmt::Debug {
    /// Applies the effect.
    ///
    /// An error stops the reaction's action list; effects applied by earlier
    /// actions stay applied.
    fn execute(&mut self, env: &mut Environment) -> KernelResult<()>;

    /// Dependencies written by this action, or `Everything`.
    fn outbound_dependencies(&self) -> &DependencySet;

    /// Scope of the write.
    fn context(&self) -> Context;

    /// Node this action is bound to.
    fn node(&self) -> NodeId;

    /// Builds an independent copy bound to `node` and `reaction`.
    fn clone_onto(&self, node: NodeId, reaction: ReactionId) -> KernelResult<Box<dyn Action>>;
}

/// Adds `delta` (possibly negative) to a molecule on the own node.
#[derive(Debug, Clone)]
pub struct ChangeConcentration {
    node: NodeId,
    molecule: Molecule,
    delta: f64,
    writes: DependencySet,
}

impl ChangeConcentration {
    /// Creates the action for `node`.
    #[must_use]
    pub fn new(node: NodeId, molecule: Molecule, delta: f64) -> Self {
        let writes = DependencySet::single(Dependency::Molecule(molecule.clone()));
        Self {
            node,
            molecule,
            delta,
            writes,
        }
    }
}

impl Action for ChangeConcentration {
    fn execute(&mut self, env: &mut Environment) -> KernelResult<()> {
        let node = env.require_node_mut(self.node)?;
        let next = node.concentration(&self.molecule) + self.delta;
        if next < 0.0 {
            return Err(KernelError::action_failed(format!(
                "{} on {} would drop to {next}",
                self.molecule, self.node
            )));
        }
        node.set_concentration(self.molecule.clone(), next)?;
        Ok(())
    }

    fn outbound_dependencies(&self) -> &DependencySet {
        &self.writes
    }

    fn context(&self) -> Context {
        Context::Local
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Action>> {
        Ok(Box::new(Self::new(node, self.molecule.clone(), self.delta)))
    }
}

/// Adds `amount` of a molecule to every neighbour of the own node.
#[derive(Debug, Clone)]
pub struct SpreadToNeighbors {
    node: NodeId,
    molecule: Molecule,
    amount: f64,
    writes: DependencySet,
}

impl SpreadToNeighbors {
    /// Creates the action for `node`.
    #[must_use]
    pub fn new(node: NodeId, molecule: Molecule, amount: f64) -> Self {
        let writes = DependencySet::single(Dependency::Molecule(molecule.clone()));
        Self {
            node,
            molecule,
            amount,
            writes,
        }
    }
}

impl Action for SpreadToNeighbors {
    fn execute(&mut self, env: &mut Environment) -> KernelResult<()> {
        env.require_node(self.node)?;
        let neighbors: Vec<NodeId> = env.neighbors(self.node).collect();
        for id in neighbors {
            let node = env.require_node_mut(id)?;
            let next = node.concentration(&self.molecule) + self.amount;
            node.set_concentration(self.molecule.clone(), next.max(0.0))?;
        }
        Ok(())
    }

    fn outbound_dependencies(&self) -> &DependencySet {
        &self.writes
    }

    fn context(&self) -> Context {
        Context::Neighborhood
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Action>> {
        Ok(Box::new(Self::new(node, self.molecule.clone(), self.amount)))
    }
}

/// Removes every species from the own node.
///
/// The set of species touched is only known at run time, so the action
/// declares the wildcard.
#[derive(Debug, Clone)]
pub struct ClearNode {
    node: NodeId,
    writes: DependencySet,
}

impl ClearNode {
    /// Creates the action for `node`.
    #[must_use]
    pub const fn new(node: NodeId) -> Self {
        Self {
            node,
            writes: DependencySet::Everything,
        }
    }
}

impl Action for ClearNode {
    fn execute(&mut self, env: &mut Environment) -> KernelResult<()> {
        env.require_node_mut(self.node)?.clear();
        Ok(())
    }

    fn outbound_dependencies(&self) -> &DependencySet {
        &self.writes
    }

    fn context(&self) -> Context {
        Context::Local
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Action>> {
        Ok(Box::new(Self::new(node)))
    }
}
