//! # alembic - a dependency-tracked reaction scheduling kernel
//!
//! alembic is the core of a discrete-event simulator for chemistry-inspired
//! models. A simulated world is an [`Environment`] of nodes, each holding
//! molecule concentrations, linked into a neighbourhood graph. Reactions live
//! on nodes and fire at instants drawn from their time distribution whenever
//! their guard conditions hold.
//!
//! ## Core Concepts
//!
//! - **Reaction**: conditions + actions + a time distribution, bound to a node
//! - **Dependency**: an observable quantity a condition reads or an action
//!   writes; [`DependencySet::Everything`] stands for "all of them"
//! - **Context**: how far from its node a condition reads or an action writes
//! - **Invalidation**: after a reaction fires, only the reactions reading what
//!   it wrote (within reach) are rescheduled
//!
//! ## Usage
//!
//! ```rust
//! use alembic::{
//!     Action, ChangeConcentration, Engine, EngineConfig, Environment, ExponentialTime, Molecule,
//!     Reaction, StopReason,
//! };
//!
//! # fn main() -> alembic::KernelResult<()> {
//! let mut env = Environment::new();
//! let node = env.add_node();
//! let a = Molecule::new("A")?;
//! env.require_node_mut(node)?.set_concentration(a.clone(), 3.0)?;
//!
//! let decay = Reaction::event(&env, node, ExponentialTime::new(1.0, 7)?)?
//!     .with_actions(vec![Box::new(ChangeConcentration::new(node, a, -1.0)) as Box<dyn Action>]);
//!
//! let mut engine = Engine::new(env, EngineConfig { end_time: None, max_steps: Some(3) })?;
//! engine.add_reaction(decay)?;
//! let report = engine.run()?;
//! assert_eq!(report.stop_reason, StopReason::MaxSteps);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod context;
pub mod dependency;
pub mod error;
pub mod molecule;
pub mod node;
pub mod time;

// World and reactions
pub mod action;
pub mod behavior;
pub mod condition;
pub mod distribution;
pub mod environment;
pub mod reaction;

// Scheduling
pub mod batch;
pub mod dependency_graph;
pub mod engine;

// Re-export primary types at crate root for convenience
pub use action::{Action, ChangeConcentration, ClearNode, SpreadToNeighbors};
pub use batch::{BatchConfig, BatchOutcome, BatchRunner, SimulationFactory, SimulationHandle, SimulationId};
pub use behavior::{ChemicalReaction, Event, ReactionBehavior};
pub use condition::{ConcentrationAtLeast, Condition, NeighborConcentrationAtLeast};
pub use context::Context;
pub use dependency::{Dependency, DependencySet};
pub use dependency_graph::DependencyGraph;
pub use distribution::{DiracComb, ExponentialTime, TimeDistribution, Trigger};
pub use engine::{Engine, EngineConfig, RunReport, StepOutcome, StopReason};
pub use environment::Environment;
pub use error::{ExecutionError, KernelError, KernelResult, ValidationError};
pub use molecule::Molecule;
pub use node::{Node, NodeId};
pub use reaction::{Reaction, ReactionId};
pub use time::Time;
