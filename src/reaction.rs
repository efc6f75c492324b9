//! The reaction aggregate.
//!
//! A reaction bundles guard conditions, effect actions, a time distribution
//! and a behaviour, and lives on one node. From its conditions it derives the
//! set of dependencies it reads and the widest scope of those reads; from its
//! actions, the set it writes and the widest scope of those writes. The
//! scheduler uses these four derived values to decide which reactions to
//! reschedule after a firing.
//!
//! # Identity
//!
//! Equality is identity: every reaction gets a fresh `ReactionId` at
//! construction and two reactions are equal only if they are the same
//! instance. The hash is a snapshot taken once, at construction, of the
//! owning node's id, its species and the number of reactions it already
//! hosts. It is never recomputed, so it stays stable in hash-based
//! collections while the node evolves.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::behavior::{Event, ReactionBehavior};
use crate::condition::Condition;
use crate::context::Context;
use crate::dependency::DependencySet;
use crate::distribution::TimeDistribution;
use crate::environment::Environment;
use crate::error::KernelResult;
use crate::node::{Node, NodeId};
use crate::time::Time;

static NEXT_REACTION_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque identity of a reaction.
///
/// Ids are handed out by a process-wide counter, so within one simulation
/// they grow in construction order. Their absolute values depend on every
/// reaction built earlier in the process, including those of other
/// simulations running concurrently (for instance in a `BatchRunner`), so
/// only their relative order within one simulation is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionId(u64);

impl ReactionId {
    fn next() -> Self {
        Self(NEXT_REACTION_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Wraps a raw id value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reaction#{}", self.0)
    }
}

fn snapshot_hash(node: &Node, reaction_count: usize) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&node.id().as_raw().to_le_bytes());
    for (molecule, concentration) in node.species() {
        hasher.update(molecule.name().as_bytes());
        hasher.update(&[0]);
        hasher.update(&concentration.to_bits().to_le_bytes());
    }
    hasher.update(&(reaction_count as u64).to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// A schedulable event bound to a node.
#[derive(Debug)]
pub struct Reaction {
    id: ReactionId,
    hash: u64,
    node: NodeId,
    distribution: Box<dyn TimeDistribution>,
    behavior: Box<dyn ReactionBehavior>,
    conditions: Vec<Box<dyn Condition>>,
    actions: Vec<Box<dyn Action>>,
    inbound: DependencySet,
    outbound: DependencySet,
    input_context: Context,
    output_context: Context,
}

impl Reaction {
    /// Builds a reaction on `node` with no conditions and no actions.
    ///
    /// The derived dependency sets start from what the behaviour declares
    /// on its own.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` if `node` is not part of `env`.
    pub fn new(
        env: &Environment,
        node: NodeId,
        distribution: Box<dyn TimeDistribution>,
        behavior: Box<dyn ReactionBehavior>,
    ) -> KernelResult<Self> {
        let host = env.require_node(node)?;
        let hash = snapshot_hash(host, env.reaction_count(node));
        let inbound = behavior.influencing_dependencies();
        let outbound = behavior.influenced_dependencies();
        Ok(Self {
            id: ReactionId::next(),
            hash,
            node,
            distribution,
            behavior,
            conditions: Vec::new(),
            actions: Vec::new(),
            inbound,
            outbound,
            input_context: Context::Local,
            output_context: Context::Local,
        })
    }

    /// Builds an `Event` reaction.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` if `node` is not part of `env`.
    pub fn event(
        env: &Environment,
        node: NodeId,
        distribution: impl TimeDistribution + 'static,
    ) -> KernelResult<Self> {
        Self::new(env, node, Box::new(distribution), Box::new(Event))
    }

    /// Replaces the conditions and recomputes the inbound set and the input
    /// context. The inbound set also covers the behaviour's influencing
    /// dependencies.
    pub fn set_conditions(&mut self, conditions: Vec<Box<dyn Condition>>) {
        let extra = self.behavior.influencing_dependencies();
        let inbound = DependencySet::aggregate(
            conditions
                .iter()
                .map(|c| c.inbound_dependencies())
                .chain(iter::once(&extra)),
        );
        let input_context = Context::widest(conditions.iter().map(|c| c.context()));
        self.conditions = conditions;
        self.inbound = inbound;
        self.input_context = input_context;
    }

    /// Replaces the actions and recomputes the outbound set and the output
    /// context. The outbound set also covers the behaviour's influenced
    /// dependencies.
    pub fn set_actions(&mut self, actions: Vec<Box<dyn Action>>) {
        let extra = self.behavior.influenced_dependencies();
        let outbound = DependencySet::aggregate(
            actions
                .iter()
                .map(|a| a.outbound_dependencies())
                .chain(iter::once(&extra)),
        );
        let output_context = Context::widest(actions.iter().map(|a| a.context()));
        self.actions = actions;
        self.outbound = outbound;
        self.output_context = output_context;
    }

    /// Builder-style `set_conditions`.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<Box<dyn Condition>>) -> Self {
        self.set_conditions(conditions);
        self
    }

    /// Builder-style `set_actions`.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Box<dyn Action>>) -> Self {
        self.set_actions(actions);
        self
    }

    /// Returns true if every condition holds.
    ///
    /// Conditions are evaluated in list order and evaluation stops at the
    /// first one that does not hold, so callers should put the cheapest and
    /// most selective conditions first.
    pub fn can_execute(&self, env: &Environment) -> KernelResult<bool> {
        for condition in &self.conditions {
            if !condition.is_valid(env)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Applies every action in list order.
    ///
    /// Not transactional: if an action fails, the error is returned and the
    /// effects of the actions before it remain applied.
    pub fn execute(&mut self, env: &mut Environment) -> KernelResult<()> {
        for action in &mut self.actions {
            action.execute(env)?;
        }
        Ok(())
    }

    /// Notifies the behaviour that the reaction has been scheduled.
    pub fn initialization_complete(&mut self, now: Time, env: &Environment) -> KernelResult<()> {
        self.behavior.initialization_complete(now, env)
    }

    /// Refreshes the behaviour, then the time distribution with the fresh
    /// rate.
    pub fn update(&mut self, now: Time, executed: bool, env: &Environment) -> KernelResult<()> {
        self.behavior
            .update_internal_status(now, executed, self.node, env, &self.conditions)?;
        let rate = self.behavior.rate(self.distribution.as_ref());
        self.distribution.update(now, executed, rate, env)
    }

    /// Builds a copy of this reaction through `factory`.
    ///
    /// Every condition and action is cloned onto the node and the identity of
    /// the reaction returned by the factory, and installed through
    /// `set_actions`/`set_conditions` so the derived fields are recomputed
    /// for the new reaction.
    pub fn make_clone<F>(&self, factory: F) -> KernelResult<Self>
    where
        F: FnOnce() -> KernelResult<Self>,
    {
        let mut clone = factory()?;
        let (node, id) = (clone.node, clone.id);
        let conditions = self
            .conditions
            .iter()
            .map(|c| c.clone_onto(node, id))
            .collect::<KernelResult<Vec<_>>>()?;
        let actions = self
            .actions
            .iter()
            .map(|a| a.clone_onto(node, id))
            .collect::<KernelResult<Vec<_>>>()?;
        clone.set_actions(actions);
        clone.set_conditions(conditions);
        Ok(clone)
    }

    /// Stamps this reaction onto `node`.
    ///
    /// The time distribution and the behaviour are cloned too. Random
    /// distributions derive a new stream from this reaction's one, which is
    /// why `self` is borrowed mutably.
    pub fn clone_onto(&mut self, env: &Environment, node: NodeId) -> KernelResult<Self> {
        let distribution = self.distribution.clone_distribution();
        let behavior = self.behavior.clone_behavior();
        self.make_clone(|| Self::new(env, node, distribution, behavior))
    }

    /// Orders two reactions by next occurrence, earliest first.
    ///
    /// Ties are left to the caller.
    #[must_use]
    pub fn cmp_by_tau(&self, other: &Self) -> Ordering {
        self.tau().cmp(&other.tau())
    }

    /// Identity of this reaction.
    #[must_use]
    pub const fn id(&self) -> ReactionId {
        self.id
    }

    /// Node hosting this reaction.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Hash snapshot taken at construction.
    #[must_use]
    pub const fn identity_hash(&self) -> u64 {
        self.hash
    }

    /// Next occurrence.
    #[must_use]
    pub fn tau(&self) -> Time {
        self.distribution.next_occurrence()
    }

    /// Current rate, as the behaviour computes it.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.behavior.rate(self.distribution.as_ref())
    }

    /// Display name of the behaviour.
    #[must_use]
    pub fn name(&self) -> &str {
        self.behavior.name()
    }

    /// Conditions, in evaluation order.
    #[must_use]
    pub fn conditions(&self) -> &[Box<dyn Condition>] {
        &self.conditions
    }

    /// Actions, in execution order.
    #[must_use]
    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    /// Dependencies read by the conditions.
    #[must_use]
    pub const fn inbound_dependencies(&self) -> &DependencySet {
        &self.inbound
    }

    /// Dependencies written by the actions.
    #[must_use]
    pub const fn outbound_dependencies(&self) -> &DependencySet {
        &self.outbound
    }

    /// Widest scope among the conditions.
    #[must_use]
    pub const fn input_context(&self) -> Context {
        self.input_context
    }

    /// Widest scope among the actions.
    #[must_use]
    pub const fn output_context(&self) -> Context {
        self.output_context
    }

    /// The time distribution.
    #[must_use]
    pub fn time_distribution(&self) -> &dyn TimeDistribution {
        self.distribution.as_ref()
    }
}

impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Reaction {}

impl Hash for Reaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[", self.name(), self.tau())?;
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c:?}")?;
        }
        write!(f, "]-{}->[", self.rate())?;
        for (i, a) in self.actions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a:?}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;
    use crate::action::ChangeConcentration;
    use crate::condition::ConcentrationAtLeast;
    use crate::dependency::Dependency;
    use crate::distribution::{DiracComb, ExponentialTime};
    use crate::error::{ExecutionError, KernelError};
    use crate::molecule::Molecule;

    type CallLog = Rc<RefCell<Vec<usize>>>;

    fn mol(name: &str) -> Molecule {
        Molecule::new(name).unwrap()
    }

    fn reads(names: &[&str]) -> DependencySet {
        names.iter().map(|n| Dependency::Molecule(mol(n))).collect()
    }

    #[derive(Debug, Clone, Copy)]
    enum Verdict {
        Valid,
        Invalid,
        Fail,
    }

    #[derive(Debug, Clone)]
    struct TracedCondition {
        index: usize,
        verdict: Verdict,
        log: CallLog,
        reads: DependencySet,
        context: Context,
        node: NodeId,
    }

    impl TracedCondition {
        fn boxed(index: usize, verdict: Verdict, log: &CallLog) -> Box<dyn Condition> {
            Box::new(Self {
                index,
                verdict,
                log: Rc::clone(log),
                reads: DependencySet::empty(),
                context: Context::Local,
                node: NodeId::from_raw(0),
            })
        }

        fn declaring(reads: DependencySet, context: Context) -> Box<dyn Condition> {
            Box::new(Self {
                index: 0,
                verdict: Verdict::Valid,
                log: CallLog::default(),
                reads,
                context,
                node: NodeId::from_raw(0),
            })
        }
    }

    impl Condition for TracedCondition {
        fn is_valid(&self, _env: &Environment) -> KernelResult<bool> {
            self.log.borrow_mut().push(self.index);
            match self.verdict {
                Verdict::Valid => Ok(true),
                Verdict::Invalid => Ok(false),
                Verdict::Fail => Err(KernelError::condition_failed("traced")),
            }
        }

        fn inbound_dependencies(&self) -> &DependencySet {
            &self.reads
        }

        fn context(&self) -> Context {
            self.context
        }

        fn node(&self) -> NodeId {
            self.node
        }

        fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Condition>> {
            let mut copy = self.clone();
            copy.node = node;
            Ok(Box::new(copy))
        }
    }

    #[derive(Debug, Clone)]
    struct TracedAction {
        index: usize,
        fail: bool,
        log: CallLog,
        writes: DependencySet,
        context: Context,
        node: NodeId,
    }

    impl TracedAction {
        fn boxed(index: usize, fail: bool, log: &CallLog) -> Box<dyn Action> {
            Box::new(Self {
                index,
                fail,
                log: Rc::clone(log),
                writes: DependencySet::empty(),
                context: Context::Local,
                node: NodeId::from_raw(0),
            })
        }

        fn declaring(writes: DependencySet, context: Context) -> Box<dyn Action> {
            Box::new(Self {
                index: 0,
                fail: false,
                log: CallLog::default(),
                writes,
                context,
                node: NodeId::from_raw(0),
            })
        }
    }

    impl Action for TracedAction {
        fn execute(&mut self, _env: &mut Environment) -> KernelResult<()> {
            if self.fail {
                return Err(KernelError::action_failed("traced"));
            }
            self.log.borrow_mut().push(self.index);
            Ok(())
        }

        fn outbound_dependencies(&self) -> &DependencySet {
            &self.writes
        }

        fn context(&self) -> Context {
            self.context
        }

        fn node(&self) -> NodeId {
            self.node
        }

        fn clone_onto(&self, node: NodeId, _reaction: ReactionId) -> KernelResult<Box<dyn Action>> {
            let mut copy = self.clone();
            copy.node = node;
            Ok(Box::new(copy))
        }
    }

    /// Records the order of hook/distribution calls and the rate handed over.
    #[derive(Debug, Clone)]
    struct StepLog {
        calls: Rc<RefCell<Vec<&'static str>>>,
        rate_seen: Rc<Cell<f64>>,
    }

    #[derive(Debug)]
    struct RefreshingBehavior {
        log: StepLog,
        rate: f64,
    }

    impl ReactionBehavior for RefreshingBehavior {
        fn update_internal_status(
            &mut self,
            _now: Time,
            _executed: bool,
            _node: NodeId,
            _env: &Environment,
            _conditions: &[Box<dyn Condition>],
        ) -> KernelResult<()> {
            self.log.calls.borrow_mut().push("hook");
            self.rate += 1.0;
            Ok(())
        }

        fn rate(&self, _distribution: &dyn TimeDistribution) -> f64 {
            self.rate
        }

        fn name(&self) -> &str {
            "Refreshing"
        }

        fn clone_behavior(&self) -> Box<dyn ReactionBehavior> {
            Box::new(Self {
                log: self.log.clone(),
                rate: 0.0,
            })
        }
    }

    #[derive(Debug)]
    struct RecordingDistribution {
        log: StepLog,
    }

    impl TimeDistribution for RecordingDistribution {
        fn next_occurrence(&self) -> Time {
            Time::INFINITY
        }

        fn update(&mut self, _now: Time, _executed: bool, rate: f64, _env: &Environment) -> KernelResult<()> {
            self.log.calls.borrow_mut().push("distribution");
            self.log.rate_seen.set(rate);
            Ok(())
        }

        fn rate(&self) -> f64 {
            0.0
        }

        fn clone_distribution(&mut self) -> Box<dyn TimeDistribution> {
            Box::new(Self {
                log: self.log.clone(),
            })
        }
    }

    fn setup() -> (Environment, NodeId) {
        let mut env = Environment::new();
        let node = env.add_node();
        (env, node)
    }

    fn plain(env: &Environment, node: NodeId) -> Reaction {
        Reaction::event(env, node, DiracComb::new(1.0, Time::ZERO).unwrap()).unwrap()
    }

    #[test]
    fn empty_condition_list_can_execute() {
        let (env, node) = setup();
        assert!(plain(&env, node).can_execute(&env).unwrap());
    }

    #[test]
    fn can_execute_stops_at_first_invalid_condition() {
        let (env, node) = setup();
        let log = CallLog::default();
        let r = plain(&env, node).with_conditions(vec![
            TracedCondition::boxed(0, Verdict::Valid, &log),
            TracedCondition::boxed(1, Verdict::Invalid, &log),
            TracedCondition::boxed(2, Verdict::Valid, &log),
        ]);
        assert!(!r.can_execute(&env).unwrap());
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn can_execute_evaluates_all_when_valid() {
        let (env, node) = setup();
        let log = CallLog::default();
        let r = plain(&env, node).with_conditions(vec![
            TracedCondition::boxed(0, Verdict::Valid, &log),
            TracedCondition::boxed(1, Verdict::Valid, &log),
        ]);
        assert!(r.can_execute(&env).unwrap());
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn condition_failure_propagates() {
        let (env, node) = setup();
        let log = CallLog::default();
        let r = plain(&env, node).with_conditions(vec![
            TracedCondition::boxed(0, Verdict::Fail, &log),
            TracedCondition::boxed(1, Verdict::Valid, &log),
        ]);
        let err = r.can_execute(&env).unwrap_err();
        assert!(matches!(
            err,
            KernelError::Execution(ExecutionError::ConditionFailed { .. })
        ));
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn execute_runs_actions_in_order() {
        let (mut env, node) = setup();
        let log = CallLog::default();
        let mut r = plain(&env, node).with_actions(vec![
            TracedAction::boxed(0, false, &log),
            TracedAction::boxed(1, false, &log),
            TracedAction::boxed(2, false, &log),
        ]);
        r.execute(&mut env).unwrap();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn execute_does_not_roll_back_on_failure() {
        let (mut env, node) = setup();
        let log = CallLog::default();
        let a = mol("A");
        let mut r = plain(&env, node).with_actions(vec![
            Box::new(ChangeConcentration::new(node, a.clone(), 1.0)) as Box<dyn Action>,
            TracedAction::boxed(1, true, &log),
            TracedAction::boxed(2, false, &log),
        ]);
        assert!(r.execute(&mut env).is_err());
        assert!(log.borrow().is_empty());
        assert!((env.node(node).unwrap().concentration(&a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inbound_is_union_of_condition_reads() {
        let (env, node) = setup();
        let r = plain(&env, node).with_conditions(vec![
            TracedCondition::declaring(reads(&["a", "b"]), Context::Local),
            TracedCondition::declaring(reads(&["b", "c"]), Context::Local),
        ]);
        assert_eq!(r.inbound_dependencies(), &reads(&["a", "b", "c"]));
        assert!(r.outbound_dependencies().is_empty());
    }

    #[test]
    fn wildcard_condition_makes_inbound_wildcard() {
        let (env, node) = setup();
        let r = plain(&env, node).with_conditions(vec![
            TracedCondition::declaring(reads(&["a"]), Context::Local),
            TracedCondition::declaring(DependencySet::Everything, Context::Local),
            TracedCondition::declaring(reads(&["b"]), Context::Local),
        ]);
        assert!(r.inbound_dependencies().is_everything());
    }

    #[test]
    fn wildcard_action_makes_outbound_wildcard() {
        let (env, node) = setup();
        let r = plain(&env, node).with_actions(vec![
            TracedAction::declaring(DependencySet::Everything, Context::Local),
            TracedAction::declaring(reads(&["x"]), Context::Local),
        ]);
        assert!(r.outbound_dependencies().is_everything());
    }

    #[test]
    fn contexts_default_to_local_and_widen() {
        let (env, node) = setup();
        let r = plain(&env, node);
        assert_eq!(r.input_context(), Context::Local);
        assert_eq!(r.output_context(), Context::Local);

        let r = r
            .with_conditions(vec![
                TracedCondition::declaring(reads(&[]), Context::Local),
                TracedCondition::declaring(reads(&[]), Context::Neighborhood),
            ])
            .with_actions(vec![
                TracedAction::declaring(reads(&[]), Context::Global),
                TracedAction::declaring(reads(&[]), Context::Local),
            ]);
        assert_eq!(r.input_context(), Context::Neighborhood);
        assert_eq!(r.output_context(), Context::Global);
    }

    /// Reads and writes a hidden molecule on top of its conditions and actions.
    #[derive(Debug, Clone)]
    struct Declaring {
        reads: DependencySet,
        writes: DependencySet,
    }

    impl ReactionBehavior for Declaring {
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

        fn influencing_dependencies(&self) -> DependencySet {
            self.reads.clone()
        }

        fn influenced_dependencies(&self) -> DependencySet {
            self.writes.clone()
        }

        fn name(&self) -> &str {
            "Declaring"
        }

        fn clone_behavior(&self) -> Box<dyn ReactionBehavior> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn behavior_dependencies_join_the_derived_sets() {
        let (mut env, node) = setup();
        let other = env.add_node();
        let mut r = Reaction::new(
            &env,
            node,
            Box::new(DiracComb::new(1.0, Time::ZERO).unwrap()),
            Box::new(Declaring {
                reads: reads(&["hidden_in"]),
                writes: reads(&["hidden_out"]),
            }),
        )
        .unwrap();
        assert_eq!(r.inbound_dependencies(), &reads(&["hidden_in"]));
        assert_eq!(r.outbound_dependencies(), &reads(&["hidden_out"]));

        r.set_conditions(vec![TracedCondition::declaring(reads(&["x"]), Context::Neighborhood)]);
        r.set_actions(vec![TracedAction::declaring(reads(&["y"]), Context::Local)]);
        assert_eq!(r.inbound_dependencies(), &reads(&["x", "hidden_in"]));
        assert_eq!(r.outbound_dependencies(), &reads(&["y", "hidden_out"]));
        assert_eq!(r.input_context(), Context::Neighborhood);

        // Dropping every condition keeps what the behaviour declares.
        r.set_conditions(Vec::new());
        assert_eq!(r.inbound_dependencies(), &reads(&["hidden_in"]));
        assert_eq!(r.input_context(), Context::Local);

        let copy = r.clone_onto(&env, other).unwrap();
        assert_eq!(copy.inbound_dependencies(), &reads(&["hidden_in"]));
        assert_eq!(copy.outbound_dependencies(), &reads(&["y", "hidden_out"]));
    }

    #[test]
    fn everything_from_behavior_dominates() {
        let (env, node) = setup();
        let mut r = Reaction::new(
            &env,
            node,
            Box::new(DiracComb::new(1.0, Time::ZERO).unwrap()),
            Box::new(Declaring {
                reads: DependencySet::everything(),
                writes: DependencySet::empty(),
            }),
        )
        .unwrap();
        r.set_conditions(vec![TracedCondition::declaring(reads(&["x"]), Context::Local)]);
        assert!(r.inbound_dependencies().is_everything());
        assert!(r.outbound_dependencies().is_empty());
    }

    #[test]
    fn replacing_lists_recomputes_derived_fields() {
        let (env, node) = setup();
        let mut r = plain(&env, node);
        r.set_actions(vec![TracedAction::declaring(
            DependencySet::Everything,
            Context::Global,
        )]);
        assert!(r.outbound_dependencies().is_everything());

        r.set_actions(vec![TracedAction::declaring(reads(&["x"]), Context::Local)]);
        assert_eq!(r.outbound_dependencies(), &reads(&["x"]));
        assert_eq!(r.output_context(), Context::Local);

        r.set_actions(Vec::new());
        assert!(r.outbound_dependencies().is_empty());
    }

    #[test]
    fn update_refreshes_status_before_distribution() {
        let (env, node) = setup();
        let log = StepLog {
            calls: Rc::default(),
            rate_seen: Rc::new(Cell::new(-1.0)),
        };
        let mut r = Reaction::new(
            &env,
            node,
            Box::new(RecordingDistribution { log: log.clone() }),
            Box::new(RefreshingBehavior {
                log: log.clone(),
                rate: 0.0,
            }),
        )
        .unwrap();

        r.update(Time::ZERO, false, &env).unwrap();
        r.update(Time::ZERO, true, &env).unwrap();
        assert_eq!(
            *log.calls.borrow(),
            vec!["hook", "distribution", "hook", "distribution"]
        );
        // The distribution saw the rate refreshed by the second hook call.
        assert!((log.rate_seen.get() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn new_fails_fast_on_unknown_node() {
        let env = Environment::new();
        let err = Reaction::event(&env, NodeId::from_raw(5), DiracComb::new(1.0, Time::ZERO).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Execution(ExecutionError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn clone_onto_rebinds_and_recomputes() {
        let (mut env, node) = setup();
        let other = env.add_node();
        let a = mol("A");
        let mut template = Reaction::event(&env, node, ExponentialTime::new(1.0, 1).unwrap())
            .unwrap()
            .with_conditions(vec![
                Box::new(ConcentrationAtLeast::new(node, a.clone(), 1.0)) as Box<dyn Condition>,
                TracedCondition::declaring(reads(&["b"]), Context::Neighborhood),
            ])
            .with_actions(vec![
                Box::new(ChangeConcentration::new(node, a.clone(), -1.0)) as Box<dyn Action>,
            ]);

        let clone = template.clone_onto(&env, other).unwrap();
        assert_eq!(clone.node(), other);
        assert_eq!(clone.conditions().len(), 2);
        assert_eq!(clone.actions().len(), 1);
        assert!(clone.conditions().iter().all(|c| c.node() == other));
        assert!(clone.actions().iter().all(|a| a.node() == other));
        assert_eq!(clone.inbound_dependencies(), template.inbound_dependencies());
        assert_eq!(clone.outbound_dependencies(), template.outbound_dependencies());
        assert_eq!(clone.input_context(), Context::Neighborhood);
        assert_eq!(clone.output_context(), Context::Local);
        assert_ne!(clone, template);
        assert_ne!(clone.id(), template.id());
        assert_ne!(clone.identity_hash(), template.identity_hash());
    }

    #[test]
    fn make_clone_uses_the_factory_identity() {
        let (env, node) = setup();
        let log = CallLog::default();
        let template = plain(&env, node)
            .with_conditions(vec![TracedCondition::boxed(0, Verdict::Valid, &log)])
            .with_actions(vec![TracedAction::boxed(0, false, &log)]);

        let mut factory_id = None;
        let clone = template
            .make_clone(|| {
                let fresh = plain(&env, node);
                factory_id = Some(fresh.id());
                Ok(fresh)
            })
            .unwrap();
        assert_eq!(Some(clone.id()), factory_id);
        assert_eq!(clone.conditions().len(), 1);
        assert_eq!(clone.actions().len(), 1);
    }

    #[test]
    fn make_clone_propagates_factory_errors() {
        let (env, node) = setup();
        let template = plain(&env, node);
        let result = template.make_clone(|| Err(KernelError::internal("no")));
        assert!(result.unwrap_err().is_internal());
    }

    #[test]
    fn ids_are_unique_across_environments() {
        let (env, node) = setup();
        let (other_env, other_node) = setup();
        let first = plain(&env, node);
        let foreign = plain(&other_env, other_node);
        let second = plain(&env, node);
        assert_ne!(first.id(), foreign.id());
        // Only the order within one environment is meaningful.
        assert!(first.id() < second.id());
    }

    #[test]
    fn equality_is_identity() {
        let (env, node) = setup();
        let a = plain(&env, node);
        let b = plain(&env, node);
        // Same node snapshot, same hash, still different reactions.
        assert_eq!(a.identity_hash(), b.identity_hash());
        assert_ne!(a, b);
        assert_eq!(a, a);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn hash_is_snapshot_of_construction_state() {
        let (mut env, node) = setup();
        let r = plain(&env, node);
        let hash = r.identity_hash();

        env.node_mut(node)
            .unwrap()
            .set_concentration(mol("A"), 3.0)
            .unwrap();
        env.register_reaction(node, r.id()).unwrap();
        assert_eq!(r.identity_hash(), hash);

        // A reaction built now sees a different node state.
        let later = plain(&env, node);
        assert_ne!(later.identity_hash(), hash);
    }

    #[test]
    fn ordering_follows_tau() {
        let (env, node) = setup();
        let early = Reaction::event(&env, node, DiracComb::new(1.0, Time::new(1.0).unwrap()).unwrap()).unwrap();
        let late = Reaction::event(&env, node, DiracComb::new(1.0, Time::new(2.0).unwrap()).unwrap()).unwrap();
        assert_eq!(early.cmp_by_tau(&late), Ordering::Less);
        assert_eq!(late.cmp_by_tau(&early), Ordering::Greater);
        assert_eq!(early.cmp_by_tau(&early), Ordering::Equal);
    }

    #[test]
    fn display_names_the_behavior() {
        let (env, node) = setup();
        let r = plain(&env, node);
        let shown = r.to_string();
        assert!(shown.starts_with("Event@0"));
        assert!(shown.contains("->"));
    }
}
