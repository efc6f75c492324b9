//! Guard conditions.
//!
//! A condition is owned by exactly one reaction. It reports whether the
//! reaction may fire, declares which dependencies it reads and the scope of
//! that read, and can clone itself onto another (node, reaction) pair.

use std::fmt;

use crate::context::Context;
use crate::dependency::{Dependency, DependencySet};
use crate::environment::Environment;
use crate::error::KernelResult;
use crate::molecule::Molecule;
use crate::node::NodeId;
use crate::reaction::ReactionId;

/// Guard unit of a reaction.
pub trait Condition: fmt::Debug {
    /// Evaluates the condition against the current state.
    ///
    /// Errors are propagated by the kernel to its caller untouched.
    fn is_valid(&self, env: &Environment) -> KernelResult<bool>;

    /// Dependencies read by this condition, or `Everything`.
    fn inbound_dependencies(&self) -> &DependencySet;

    /// Scope of the read.
    fn context(&self) -> Context;

    /// Node this condition is bound to.
    fn node(&self) -> NodeId;

    /// Contribution of this condition to the rate of a `ChemicalReaction`.
    ///
    /// Defaults to `1` when valid and `0` otherwise.
    fn propensity_contribution(&self, env: &Environment) -> KernelResult<f64> {
        Ok(if self.is_valid(env)? { 1.0 } else { 0.0 })
    }

    /// Builds an independent copy bound to `node` and `reaction`.
    fn clone_onto(&self, node: NodeId, reaction: ReactionId) -> KernelResult<Box<dyn Condition>>;
}

/// Valid when the own node holds at least `threshold` of a molecule.
#[derive(Debug, Clone)]
pub struct ConcentrationAtLeast {
    node: NodeId,
    molecule: Molecule,
    threshold: f64,
    reads: DependencySet,
}

impl ConcentrationAtLeast {
    /// Creates the condition for `node`.
    #[must_use]
    pub fn new(node: NodeId, molecule: Molecule, threshold: f64) -> Self {
        let reads = DependencySet::single(Dependency::Molecule(molecule.clone()));
        Self {
            node,
            molecule,
            threshold,
            reads,
        }
    }
}

impl Condition for ConcentrationAtLeast {
    fn is_valid(&self, env: &Environment) -> KernelResult<bool> {
        let node = env.require_node(self.node)?;
        Ok(node.concentration(&self.molecule) >= self.threshold)
    }

    fn inbound_dependencies(&self) -> &DependencySet {
        &self.reads
    }

    fn context(&self) -> Context {
        Context::Local
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Condition>> {
        Ok(Box::new(Self::new(node, self.molecule.clone(), self.threshold)))
    }
}

/// Valid when any neighbour of the own node holds at least `threshold` of a
/// molecule.
#[derive(Debug, Clone)]
pub struct NeighborConcentrationAtLeast {
    node: NodeId,
    molecule: Molecule,
    threshold: f64,
    reads: DependencySet,
}

impl NeighborConcentrationAtLeast {
    /// Creates the condition for `node`.
    #[must_use]
    pub fn new(node: NodeId, molecule: Molecule, threshold: f64) -> Self {
        let reads = DependencySet::single(Dependency::Molecule(molecule.clone()));
        Self {
            node,
            molecule,
            threshold,
            reads,
        }
    }
}

impl Condition for NeighborConcentrationAtLeast {
    fn is_valid(&self, env: &Environment) -> KernelResult<bool> {
        env.require_node(self.node)?;
        for neighbor in env.neighbors(self.node) {
            if env.require_node(neighbor)?.concentration(&self.molecule) >= self.threshold {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn inbound_dependencies(&self) -> &DependencySet {
        &self.reads
    }

    fn context(&self) -> Context {
        Context::Neighborhood
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Condition>> {
        Ok(Box::new(Self::new(node, self.molecule.clone(), self.threshold)))
    }
}
