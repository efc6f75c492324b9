//! Reaction-specific behaviour.
//!
//! `Reaction` implements the generic protocol; a `ReactionBehavior` supplies
//! the parts that vary between kinds of reactions: refreshing derived state
//! before each reschedule and exposing the resulting rate.

use std::fmt;

use crate::condition::Condition;
use crate::dependency::{Dependency, DependencySet};
use crate::distribution::TimeDistribution;
use crate::environment::Environment;
use crate::error::KernelResult;
use crate::molecule::Molecule;
use crate::node::NodeId;
use crate::time::Time;

/// The per-kind hook of a reaction.
pub trait ReactionBehavior: fmt::Debug {
    /// Called once by the engine when the reaction is scheduled, before its
    /// first update.
    fn initialization_complete(&mut self, _now: Time, _env: &Environment) -> KernelResult<()> {
        Ok(())
    }

    /// Refreshes internal state. Called by `Reaction::update` before the
    /// time distribution is asked for a new occurrence.
    fn update_internal_status(
        &mut self,
        now: Time,
        executed: bool,
        node: NodeId,
        env: &Environment,
        conditions: &[Box<dyn Condition>],
    ) -> KernelResult<()>;

    /// Rate handed to the time distribution.
    fn rate(&self, distribution: &dyn TimeDistribution) -> f64;

    /// Dependencies read by the behaviour itself, on top of those declared
    /// by the conditions. Local to the owning node.
    fn influencing_dependencies(&self) -> DependencySet {
        DependencySet::empty()
    }

    /// Dependencies written by the behaviour itself, on top of those
    /// declared by the actions. Local to the owning node.
    fn influenced_dependencies(&self) -> DependencySet {
        DependencySet::empty()
    }

    /// Display name.
    fn name(&self) -> &str;

    /// Builds a fresh behaviour of the same kind for a cloned reaction.
    fn clone_behavior(&self) -> Box<dyn ReactionBehavior>;
}

/// A reaction whose rate is the one of its time distribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Event;

impl ReactionBehavior for Event {
    fn update_internal_status(
        &mut self,
        _now: Time,
        _executed: bool,
        _node: NodeId,
        _env: &Environment,
        _conditions: &[Box<dyn Condition>],
    ) -> KernelResult<()> {
        Ok(())
    }

    fn rate(&self, distribution: &dyn TimeDistribution) -> f64 {
        distribution.rate()
    }

    fn name(&self) -> &str {
        "Event"
    }

    fn clone_behavior(&self) -> Box<dyn ReactionBehavior> {
        Box::new(*self)
    }
}

/// A reaction whose rate is the distribution rate scaled by the product of
/// its conditions' propensity contributions.
///
/// A catalysed reaction further scales the rate by the catalyst's
/// concentration on the own node. The catalyst is read by no condition, so
/// the behaviour declares it as an influencing dependency.
#[derive(Debug, Clone, Default)]
pub struct ChemicalReaction {
    propensity: f64,
    catalyst: Option<Molecule>,
}

impl ChemicalReaction {
    /// Creates the behaviour. The propensity is zero until the first update.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            propensity: 0.0,
            catalyst: None,
        }
    }

    /// Creates a behaviour whose rate is proportional to `catalyst`.
    #[must_use]
    pub const fn catalyzed_by(catalyst: Molecule) -> Self {
        Self {
            propensity: 0.0,
            catalyst: Some(catalyst),
        }
    }

    /// Product of the condition contributions at the last update.
    #[must_use]
    pub const fn propensity(&self) -> f64 {
        self.propensity
    }

    /// The catalyst, if any.
    #[must_use]
    pub const fn catalyst(&self) -> Option<&Molecule> {
        self.catalyst.as_ref()
    }
}

impl ReactionBehavior for ChemicalReaction {
    fn update_internal_status(
        &mut self,
        _now: Time,
        _executed: bool,
        node: NodeId,
        env: &Environment,
        conditions: &[Box<dyn Condition>],
    ) -> KernelResult<()> {
        let mut propensity = 1.0;
        for condition in conditions {
            propensity *= condition.propensity_contribution(env)?;
            if propensity == 0.0 {
                break;
            }
        }
        if let Some(catalyst) = &self.catalyst {
            propensity *= env.require_node(node)?.concentration(catalyst);
        }
        self.propensity = propensity;
        Ok(())
    }

    fn rate(&self, distribution: &dyn TimeDistribution) -> f64 {
        distribution.rate() * self.propensity
    }

    fn influencing_dependencies(&self) -> DependencySet {
        match &self.catalyst {
            Some(catalyst) => DependencySet::single(Dependency::Molecule(catalyst.clone())),
            None => DependencySet::empty(),
        }
    }

    fn name(&self) -> &str {
        "ChemicalReaction"
    }

    fn clone_behavior(&self) -> Box<dyn ReactionBehavior> {
        Box::new(Self {
            propensity: 0.0,
            catalyst: self.catalyst.clone(),
        })
    }
}
