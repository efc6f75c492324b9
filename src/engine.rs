//! Sequential discrete-event engine.
//!
//! The engine owns an environment and the reactions living on it. Every
//! scheduled reaction sits in a queue keyed by `(next occurrence, id)`, so
//! the reaction fired by a step is the one with the smallest occurrence and
//! ties are broken by construction order.
//!
//! A step pops the head of the queue, advances the clock, fires the reaction
//! if its conditions hold and reschedules every reaction the dependency graph
//! reports as affected. The fired reaction is always rescheduled last with
//! `executed = true`.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dependency_graph::DependencyGraph;
use crate::environment::Environment;
use crate::error::{ExecutionError, KernelError, KernelResult, ValidationError};
use crate::node::NodeId;
use crate::reaction::{Reaction, ReactionId};
use crate::time::Time;

/// Stop bounds of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Occurrences strictly after this instant are not fired.
    pub end_time: Option<Time>,
    /// Maximum number of steps over the engine's lifetime.
    pub max_steps: Option<u64>,
}

impl EngineConfig {
    /// Validate bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if `max_steps` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_steps == Some(0) {
            return Err(ValidationError::InvalidConfig {
                reason: "max_steps must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` on malformed JSON or invalid
    /// bounds. Invalid times surface as malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|err| ValidationError::InvalidConfig {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the file cannot be read or
    /// does not hold a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| ValidationError::InvalidConfig {
            reason: format!("{}: {err}", path.display()),
        })?;
        Self::from_json(&json)
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The reaction's conditions held and its actions ran.
    Executed(ReactionId),
    /// The reaction was due but its conditions did not hold.
    Skipped(ReactionId),
    /// No reaction will ever occur again.
    Exhausted,
    /// The next occurrence lies beyond `end_time`.
    Finished,
}

/// Why `Engine::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No reaction will ever occur again.
    Exhausted,
    /// The next occurrence lies beyond `end_time`.
    EndTime,
    /// `max_steps` was reached.
    MaxSteps,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run.
    pub finished_at: DateTime<Utc>,
    /// Steps taken over the engine's lifetime.
    pub steps: u64,
    /// Simulation time when the run stopped.
    pub final_time: Time,
    /// Why the run returned.
    pub stop_reason: StopReason,
}

/// Single-threaded simulation engine.
#[derive(Debug)]
pub struct Engine {
    env: Environment,
    config: EngineConfig,
    reactions: HashMap<ReactionId, Reaction>,
    queue: BTreeSet<(Time, ReactionId)>,
    graph: DependencyGraph,
    now: Time,
    steps: u64,
}

impl Engine {
    /// Creates an engine over `env` with no reactions.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn new(env: Environment, config: EngineConfig) -> KernelResult<Self> {
        config.validate()?;
        Ok(Self {
            env,
            config,
            reactions: HashMap::new(),
            queue: BTreeSet::new(),
            graph: DependencyGraph::new(),
            now: Time::ZERO,
            steps: 0,
        })
    }

    /// Schedules a reaction.
    ///
    /// The behaviour is told initialisation is complete, then the reaction
    /// is updated with `update(now, false)`. Both happen before it is
    /// registered, so a failing initialisation leaves the engine untouched.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateReaction` if the reaction is already scheduled,
    /// `NodeNotFound` if its node is not part of the environment,
    /// `TimeWentBackwards` if its first occurrence lies before the current
    /// time, or the error raised while initialising it.
    pub fn add_reaction(&mut self, mut reaction: Reaction) -> KernelResult<ReactionId> {
        let id = reaction.id();
        if self.reactions.contains_key(&id) {
            return Err(KernelError::Execution(ExecutionError::DuplicateReaction { id }));
        }
        self.env.require_node(reaction.node())?;
        reaction.initialization_complete(self.now, &self.env)?;
        reaction.update(self.now, false, &self.env)?;
        if reaction.tau() < self.now {
            return Err(KernelError::Execution(ExecutionError::TimeWentBackwards {
                id,
                now: self.now.as_f64(),
                tau: reaction.tau().as_f64(),
            }));
        }

        self.env.register_reaction(reaction.node(), id)?;
        self.graph.insert(&reaction)?;
        self.queue.insert((reaction.tau(), id));
        debug!(reaction = %id, node = %reaction.node(), tau = %reaction.tau(), "reaction scheduled");
        self.reactions.insert(id, reaction);
        Ok(id)
    }

    /// Unschedules a reaction and hands it back.
    ///
    /// # Errors
    ///
    /// Returns `ReactionNotFound` if the reaction is not scheduled.
    pub fn remove_reaction(&mut self, id: ReactionId) -> KernelResult<Reaction> {
        let reaction = self.reactions.remove(&id).ok_or_else(|| reaction_not_found(id))?;
        self.queue.remove(&(reaction.tau(), id));
        self.graph.remove(id);
        self.env.unregister_reaction(reaction.node(), id);
        Ok(reaction)
    }

    /// Stamps a copy of a scheduled reaction onto `node` and schedules it.
    ///
    /// # Errors
    ///
    /// Returns `ReactionNotFound` if `id` is not scheduled, `NodeNotFound` if
    /// `node` is missing, or the error raised while cloning or scheduling.
    pub fn clone_reaction_onto(&mut self, id: ReactionId, node: NodeId) -> KernelResult<ReactionId> {
        let template = self.reactions.get_mut(&id).ok_or_else(|| reaction_not_found(id))?;
        let clone = template.clone_onto(&self.env, node)?;
        self.add_reaction(clone)
    }

    /// Adds an empty node to the environment.
    pub fn add_node(&mut self) -> NodeId {
        self.env.add_node()
    }

    /// Links two nodes and reschedules the reactions living on them.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either node is missing, or the first error
    /// raised by a reschedule.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> KernelResult<()> {
        self.env.link(a, b)?;
        self.reschedule_hosted(&[a, b])
    }

    /// Unlinks two nodes and reschedules the reactions living on them.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if either node is missing, or the first error
    /// raised by a reschedule.
    pub fn unlink(&mut self, a: NodeId, b: NodeId) -> KernelResult<()> {
        self.env.require_node(a)?;
        self.env.require_node(b)?;
        self.env.unlink(a, b);
        self.reschedule_hosted(&[a, b])
    }

    /// Removes a node together with the reactions it hosts.
    ///
    /// Reactions on the former neighbours are rescheduled, since their
    /// neighbourhood changed.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the node is missing, or the first error
    /// raised by a reschedule.
    pub fn remove_node(&mut self, node: NodeId) -> KernelResult<Vec<Reaction>> {
        let neighbors: Vec<NodeId> = self.env.neighbors(node).collect();
        let hosted = self.env.remove_node(node)?;

        let mut removed = Vec::with_capacity(hosted.len());
        for id in hosted {
            if let Some(reaction) = self.reactions.remove(&id) {
                self.queue.remove(&(reaction.tau(), id));
                self.graph.remove(id);
                removed.push(reaction);
            }
        }
        debug!(%node, reactions = removed.len(), "node removed");
        self.reschedule_hosted(&neighbors)?;
        Ok(removed)
    }

    /// Fires the next reaction.
    ///
    /// # Errors
    ///
    /// Returns `TimeWentBackwards` if the head of the queue lies before the
    /// current time, or the first error raised by a condition, an action or
    /// a reschedule. Effects applied before the error stay applied.
    pub fn step(&mut self) -> KernelResult<StepOutcome> {
        let Some(&(tau, id)) = self.queue.first() else {
            return Ok(StepOutcome::Exhausted);
        };
        if tau.is_infinite() {
            return Ok(StepOutcome::Exhausted);
        }
        if self.config.end_time.is_some_and(|end| tau > end) {
            return Ok(StepOutcome::Finished);
        }
        if tau < self.now {
            return Err(KernelError::Execution(ExecutionError::TimeWentBackwards {
                id,
                now: self.now.as_f64(),
                tau: tau.as_f64(),
            }));
        }
        self.now = tau;

        let reaction = self.reactions.get_mut(&id).ok_or_else(|| reaction_not_found(id))?;
        let fired = reaction.can_execute(&self.env)?;
        if fired {
            reaction.execute(&mut self.env)?;
            let affected = self.graph.reactions_to_update(id, &self.env)?;
            for dependant in affected.into_iter().filter(|other| *other != id) {
                self.reschedule(dependant, false)?;
            }
        }
        self.reschedule(id, true)?;
        self.steps += 1;

        debug!(reaction = %id, time = %tau, fired, step = self.steps, "step");
        Ok(if fired {
            StepOutcome::Executed(id)
        } else {
            StepOutcome::Skipped(id)
        })
    }

    /// Steps until the queue is exhausted or a configured bound is reached.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `step`.
    pub fn run(&mut self) -> KernelResult<RunReport> {
        let started_at = Utc::now();
        let stop_reason = loop {
            if self.config.max_steps.is_some_and(|max| self.steps >= max) {
                break StopReason::MaxSteps;
            }
            match self.step()? {
                StepOutcome::Executed(_) | StepOutcome::Skipped(_) => {}
                StepOutcome::Exhausted => break StopReason::Exhausted,
                StepOutcome::Finished => break StopReason::EndTime,
            }
        };
        debug!(?stop_reason, steps = self.steps, time = %self.now, "run finished");
        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            steps: self.steps,
            final_time: self.now,
            stop_reason,
        })
    }

    /// Current simulation time.
    #[must_use]
    pub const fn now(&self) -> Time {
        self.now
    }

    /// Steps taken so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Stop bounds.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The simulated world.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.env
    }

    /// Looks up a scheduled reaction.
    #[must_use]
    pub fn reaction(&self, id: ReactionId) -> Option<&Reaction> {
        self.reactions.get(&id)
    }

    /// Number of scheduled reactions.
    #[must_use]
    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    /// The reaction at the head of the queue, if any.
    #[must_use]
    pub fn next_reaction(&self) -> Option<&Reaction> {
        self.queue.first().and_then(|(_, id)| self.reactions.get(id))
    }

    fn reschedule(&mut self, id: ReactionId, executed: bool) -> KernelResult<()> {
        let reaction = self.reactions.get_mut(&id).ok_or_else(|| reaction_not_found(id))?;
        self.queue.remove(&(reaction.tau(), id));
        let result = reaction.update(self.now, executed, &self.env);
        self.queue.insert((reaction.tau(), id));
        result
    }

    fn reschedule_hosted(&mut self, nodes: &[NodeId]) -> KernelResult<()> {
        let ids: Vec<ReactionId> = nodes
            .iter()
            .flat_map(|node| self.env.reactions_of(*node).iter().copied())
            .collect();
        for id in ids {
            self.reschedule(id, false)?;
        }
        Ok(())
    }
}

fn reaction_not_found(id: ReactionId) -> KernelError {
    KernelError::Execution(ExecutionError::ReactionNotFound { id })
}
