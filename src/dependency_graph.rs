//! Invalidation index for the scheduler.
//!
//! After a reaction fires, only the reactions that read something it wrote
//! need a new next-occurrence time. The graph keeps, for every scheduled
//! reaction, a footprint of its dependency sets and contexts, plus a reverse
//! index from each dependency to the reactions reading it:
//!
//! 1. Given a reaction, what does it read and write, and where?
//! 2. Given a dependency, which reactions read it?
//!
//! The second lookup keeps the invalidation pass proportional to the number
//! of readers instead of the number of reactions. Wildcards bypass the index:
//! a wildcard writer invalidates every reaction, a wildcard reader is
//! invalidated by every firing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::context::Context;
use crate::dependency::{Dependency, DependencySet};
use crate::environment::Environment;
use crate::error::{ExecutionError, KernelError, KernelResult};
use crate::node::NodeId;
use crate::reaction::{Reaction, ReactionId};

#[derive(Debug, Clone)]
struct Footprint {
    node: NodeId,
    inbound: DependencySet,
    outbound: DependencySet,
    input_context: Context,
    output_context: Context,
}

impl Footprint {
    fn of(reaction: &Reaction) -> Self {
        Self {
            node: reaction.node(),
            inbound: reaction.inbound_dependencies().clone(),
            outbound: reaction.outbound_dependencies().clone(),
            input_context: reaction.input_context(),
            output_context: reaction.output_context(),
        }
    }
}

/// Returns true if what `source` writes can be seen by what `target` reads,
/// given where both reactions live.
fn in_reach(source: &Footprint, target: &Footprint, env: &Environment) -> bool {
    let (a, b) = (source.node, target.node);
    match (source.output_context, target.input_context) {
        (Context::Global, _) | (_, Context::Global) => true,
        (Context::Local, Context::Local) => a == b,
        (Context::Neighborhood, Context::Neighborhood) => {
            a == b || env.are_neighbors(a, b) || env.share_neighbor(a, b)
        }
        _ => a == b || env.are_neighbors(a, b),
    }
}

/// Dependency index over the scheduled reactions.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    footprints: BTreeMap<ReactionId, Footprint>,
    readers: HashMap<Dependency, BTreeSet<ReactionId>>,
    wildcard_readers: BTreeSet<ReactionId>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a reaction.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::DuplicateReaction` if it is already indexed.
    pub fn insert(&mut self, reaction: &Reaction) -> KernelResult<()> {
        let id = reaction.id();
        if self.footprints.contains_key(&id) {
            return Err(KernelError::Execution(ExecutionError::DuplicateReaction { id }));
        }
        let footprint = Footprint::of(reaction);
        match &footprint.inbound {
            DependencySet::Everything => {
                self.wildcard_readers.insert(id);
            }
            DependencySet::Bounded(reads) => {
                for dependency in reads {
                    self.readers.entry(dependency.clone()).or_default().insert(id);
                }
            }
        }
        self.footprints.insert(id, footprint);
        Ok(())
    }

    /// Drops a reaction from the index. Returns false if it was not indexed.
    pub fn remove(&mut self, id: ReactionId) -> bool {
        let Some(footprint) = self.footprints.remove(&id) else {
            return false;
        };
        match footprint.inbound {
            DependencySet::Everything => {
                self.wildcard_readers.remove(&id);
            }
            DependencySet::Bounded(reads) => {
                for dependency in &reads {
                    if let Some(ids) = self.readers.get_mut(dependency) {
                        ids.remove(&id);
                        if ids.is_empty() {
                            self.readers.remove(dependency);
                        }
                    }
                }
            }
        }
        true
    }

    /// Returns true if the reaction is indexed.
    #[must_use]
    pub fn contains(&self, id: ReactionId) -> bool {
        self.footprints.contains_key(&id)
    }

    /// Number of indexed reactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    /// Returns true if no reaction is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Reactions to update after `executed` fired.
    ///
    /// The executed reaction comes first, followed by its dependants in
    /// ascending id order.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::ReactionNotFound` if `executed` is not indexed.
    pub fn reactions_to_update(&self, executed: ReactionId, env: &Environment) -> KernelResult<Vec<ReactionId>> {
        let source = self
            .footprints
            .get(&executed)
            .ok_or(KernelError::Execution(ExecutionError::ReactionNotFound { id: executed }))?;

        let mut out = vec![executed];
        if source.outbound.is_everything() {
            out.extend(self.footprints.keys().copied().filter(|id| *id != executed));
            trace!(reaction = %executed, dependants = out.len() - 1, "wildcard invalidation");
            return Ok(out);
        }

        let mut selected: BTreeSet<ReactionId> = self
            .wildcard_readers
            .iter()
            .copied()
            .filter(|id| *id != executed)
            .collect();

        for dependency in source.outbound.iter() {
            let Some(ids) = self.readers.get(dependency) else {
                continue;
            };
            for id in ids {
                if *id == executed || selected.contains(id) {
                    continue;
                }
                if let Some(target) = self.footprints.get(id) {
                    if in_reach(source, target, env) {
                        selected.insert(*id);
                    }
                }
            }
        }

        out.extend(selected);
        trace!(reaction = %executed, dependants = out.len() - 1, "selective invalidation");
        Ok(out)
    }
}
