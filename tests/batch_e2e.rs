use std::collections::HashSet;

use alembic::{
    Action, BatchConfig, BatchRunner, ChangeConcentration, ChemicalReaction, ConcentrationAtLeast, Condition,
    Engine, EngineConfig, Environment, ExponentialTime, KernelError, KernelResult, Molecule, Reaction, SimulationFactory,
    StopReason, ValidationError,
};

fn replica(seed: u64, amount: f64) -> SimulationFactory {
    Box::new(move || -> KernelResult<Engine> {
        let a = Molecule::new("A")?;
        let mut env = Environment::new();
        let node = env.add_node();
        env.require_node_mut(node)?.set_concentration(a.clone(), amount)?;

        let decay = Reaction::new(
            &env,
            node,
            Box::new(ExponentialTime::new(2.0, seed)?),
            Box::new(ChemicalReaction::new()),
        )?
        .with_conditions(vec![
            Box::new(ConcentrationAtLeast::new(node, a.clone(), 1.0)) as Box<dyn Condition>
        ])
        .with_actions(vec![
            Box::new(ChangeConcentration::new(node, a, -1.0)) as Box<dyn Action>
        ]);

        let mut engine = Engine::new(env, EngineConfig::default())?;
        engine.add_reaction(decay)?;
        Ok(engine)
    })
}

#[test]
fn one_outcome_per_replica() {
    let runner = BatchRunner::new(BatchConfig {
        workers: 3,
        queue_capacity: 4,
    })
    .unwrap();

    let jobs: Vec<SimulationFactory> = (0..12).map(|seed| replica(seed, 5.0)).collect();
    let outcomes = runner.run_all(jobs).unwrap();
    assert_eq!(outcomes.len(), 12);

    let ids: HashSet<_> = outcomes.iter().map(|o| o.id).collect();
    assert_eq!(ids.len(), 12);

    for outcome in &outcomes {
        let report = outcome.result.as_ref().unwrap();
        assert_eq!(report.steps, 5);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
    }
}

#[test]
fn replicas_with_equal_seeds_agree() {
    let runner = BatchRunner::new(BatchConfig::default()).unwrap();
    let outcomes = runner
        .run_all(vec![replica(7, 8.0), replica(7, 8.0), replica(8, 8.0)])
        .unwrap();
    let times: Vec<_> = outcomes
        .iter()
        .map(|o| o.result.as_ref().unwrap().final_time)
        .collect();
    assert_eq!(times[0], times[1]);
    assert_ne!(times[0], times[2]);
}

#[test]
fn invalid_replica_reports_its_error() {
    let runner = BatchRunner::new(BatchConfig::default()).unwrap();
    let outcomes = runner.run_all(vec![replica(1, -3.0), replica(1, 1.0)]).unwrap();
    assert!(matches!(
        outcomes[0].result,
        Err(KernelError::Validation(ValidationError::InvalidConcentration { .. }))
    ));
    assert_eq!(outcomes[1].result.as_ref().unwrap().steps, 1);
}
