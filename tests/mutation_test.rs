//! Integration tests for the excision/regrowth mutation operator.

mod common;

use common::{branching_service, linear_template, prepare, service, taxonomy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use weaver::{
    CompositionBuilder, GoalSpec, MutationOperator, NodeId, Qos, SearchSpace, TemplateSpec,
};

fn redundant_space() -> SearchSpace {
    // Several interchangeable providers at each layer so mutation has
    // genuine alternatives to swap in.
    let tax = taxonomy(&["In", "Mid", "Out"], &[]);
    let services = [
        service("m1", &["In"], &["Mid"]),
        service("m2", &["In"], &["Mid"]),
        service("m3", &["In"], &["Mid"]),
        service("o1", &["Mid"], &["Out"]),
        service("o2", &["Mid"], &["Out"]),
    ];
    prepare(tax, &services, &linear_template(&["In"], &["Out"]))
}

#[test]
fn test_mutation_keeps_graphs_valid_across_many_steps() {
    let space = redundant_space();
    let builder = CompositionBuilder::new(&space);
    let operator = MutationOperator::new(&space);

    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut graph = builder.build(&mut rng).unwrap();
        for step in 0..30 {
            graph = operator.mutate(graph, &mut rng).unwrap();
            graph
                .validate(space.catalog(), space.template())
                .unwrap_or_else(|e| panic!("seed {seed} step {step}: {e}"));
            assert!(graph.fitness().is_none());
            for goal in space.template().output_goals() {
                assert!(graph.has_path(NodeId::Start, NodeId::Goal(goal)));
            }
        }
    }
}

#[test]
fn test_mutation_explores_alternative_providers() {
    let space = redundant_space();
    let builder = CompositionBuilder::new(&space);
    let operator = MutationOperator::new(&space);

    let mut rng = StdRng::seed_from_u64(4);
    let mut graph = builder.build(&mut rng).unwrap();

    let mut distinct = std::collections::HashSet::new();
    for _ in 0..60 {
        graph = operator.mutate(graph, &mut rng).unwrap();
        let mut services: Vec<_> = graph
            .nodes()
            .filter_map(|n| match n.id {
                NodeId::Service { service, .. } => Some(service),
                _ => None,
            })
            .collect();
        services.sort_unstable();
        distinct.insert(services);
    }
    assert!(
        distinct.len() > 1,
        "mutation never produced a structurally different individual"
    );
}

#[test]
fn test_mutation_of_conditional_workflows() {
    let tax = taxonomy(
        &["In", "Check", "Ok", "Bad", "OutOk", "OutBad"],
        &[("Check", "Ok"), ("Check", "Bad")],
    );
    let space = prepare(
        tax,
        &[
            branching_service(
                "check",
                &["In"],
                (0.5, &["Bad"]),
                (0.5, &["Ok"]),
                Qos::default(),
            ),
            service("good1", &["Ok"], &["OutOk"]),
            service("good2", &["Ok"], &["OutOk"]),
            service("bad1", &["Bad"], &["OutBad"]),
            service("bad2", &["Bad"], &["OutBad"]),
        ],
        &TemplateSpec {
            provided_inputs: vec!["In".to_string()],
            goal: GoalSpec::Condition {
                general: "Bad".to_string(),
                specific: "Ok".to_string(),
                specific_branch: Box::new(GoalSpec::Outputs(vec!["OutOk".to_string()])),
                general_branch: Box::new(GoalSpec::Outputs(vec!["OutBad".to_string()])),
            },
        },
    );
    let builder = CompositionBuilder::new(&space);
    let operator = MutationOperator::new(&space);

    let mut rng = StdRng::seed_from_u64(8);
    let mut graph = builder.build(&mut rng).unwrap();
    let cond = space.template().first_goal();
    for step in 0..40 {
        graph = operator.mutate(graph, &mut rng).unwrap();
        graph
            .validate(space.catalog(), space.template())
            .unwrap_or_else(|e| panic!("step {step}: {e}"));

        // The condition marker survives or is regrown every time.
        assert!(graph.contains(NodeId::Goal(cond)), "step {step}: marker lost");
        for out in space.template().output_goals() {
            assert!(
                graph.has_path(NodeId::Start, NodeId::Goal(out)),
                "step {step}: end marker unreachable"
            );
        }
    }
}
