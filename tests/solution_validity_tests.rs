// Copyright 2025 Cowboy AI, LLC.

//! Every composition the search reports must be executable, and every
//! strategy must agree on the shortest length

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;

use cim_compose::{
    verify_composition, Catalog, ConceptList, GoalRegressionSearch, SearchConfig, SearchStatus,
    SolutionAggregator, StrategyKind, Taxonomy,
};
use proptest::prelude::*;

const CONCEPTS: usize = 8;
const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone)]
struct World {
    parents: Vec<Option<usize>>,
    services: Vec<(BTreeSet<usize>, BTreeSet<usize>)>,
    known: BTreeSet<usize>,
    goals: BTreeSet<usize>,
}

fn concept_set(min: usize, max: usize) -> impl Strategy<Value = BTreeSet<usize>> {
    proptest::collection::btree_set(0..CONCEPTS, min..max)
}

fn world() -> impl Strategy<Value = World> {
    (
        proptest::collection::vec(proptest::option::of(0usize..CONCEPTS), CONCEPTS),
        proptest::collection::vec((concept_set(0, 3), concept_set(1, 3)), 1..7),
        concept_set(1, 3),
        concept_set(1, 3),
    )
        .prop_map(|(raw_parents, services, known, goals)| World {
            parents: raw_parents
                .into_iter()
                .enumerate()
                .map(|(i, p)| p.filter(|_| i > 0).map(|p| p % i.max(1)))
                .collect(),
            services,
            known,
            goals,
        })
}

fn name(i: usize) -> String {
    format!("C{i}")
}

fn build(world: &World) -> Catalog {
    let mut taxonomy = Taxonomy::builder();
    for (i, parent) in world.parents.iter().enumerate() {
        taxonomy.add_concept(name(i), parent.iter().map(|&p| name(p)));
    }
    let mut builder = Catalog::builder(taxonomy.build().unwrap());
    for (s, (inputs, outputs)) in world.services.iter().enumerate() {
        let inputs: Vec<String> = inputs.iter().map(|&c| name(c)).collect();
        let outputs: Vec<String> = outputs.iter().map(|&c| name(c)).collect();
        let inputs: Vec<&str> = inputs.iter().map(String::as_str).collect();
        let outputs: Vec<&str> = outputs.iter().map(String::as_str).collect();
        builder
            .add_simple_service(&format!("S{s}"), &inputs, &outputs)
            .unwrap();
    }
    builder.build()
}

fn list(catalog: &Catalog, concepts: &BTreeSet<usize>) -> ConceptList {
    concepts
        .iter()
        .map(|&c| catalog.taxonomy().find(&name(c)).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reported_compositions_are_valid_and_shortest(world in world()) {
        let catalog = build(&world);
        let known = list(&catalog, &world.known);
        let goals = list(&catalog, &world.goals);
        let config = SearchConfig::default().with_max_depth(MAX_DEPTH);

        let mut statuses = Vec::new();
        for kind in StrategyKind::all() {
            let strategy = kind.instantiate();
            let mut aggregator = SolutionAggregator::new();
            let outcome = GoalRegressionSearch::run(
                strategy.as_ref(),
                &catalog,
                &known,
                &goals,
                &config,
                &AtomicBool::new(false),
                &mut aggregator,
            );

            match outcome.status {
                SearchStatus::Solved { depth } => {
                    let solution = aggregator.best().unwrap();
                    let path = solution.first_path();
                    prop_assert_eq!(path.len(), depth);
                    prop_assert!(depth <= MAX_DEPTH);
                    prop_assert_eq!(verify_composition(&catalog, &known, &goals, &path), Ok(()));
                }
                SearchStatus::Exhausted { max_depth } => {
                    prop_assert_eq!(max_depth, MAX_DEPTH);
                    prop_assert!(!aggregator.has_solution());
                }
                other => prop_assert!(false, "unexpected status {:?}", other),
            }
            statuses.push(outcome.status);
        }

        prop_assert!(statuses.windows(2).all(|w| w[0] == w[1]), "strategies disagree: {:?}", statuses);
    }

    #[test]
    fn first_solution_mode_is_also_valid(world in world()) {
        let catalog = build(&world);
        let known = list(&catalog, &world.known);
        let goals = list(&catalog, &world.goals);
        let config = SearchConfig::default()
            .with_max_depth(MAX_DEPTH)
            .with_mode(cim_compose::SearchMode::FirstSolution)
            .with_level_pruning(false);

        let mut aggregator = SolutionAggregator::new();
        let outcome = GoalRegressionSearch::run(
            StrategyKind::Baseline.instantiate().as_ref(),
            &catalog,
            &known,
            &goals,
            &config,
            &AtomicBool::new(false),
            &mut aggregator,
        );
        if outcome.status.is_solved() {
            let path = aggregator.best().unwrap().first_path();
            prop_assert_eq!(verify_composition(&catalog, &known, &goals, &path), Ok(()));
        }
    }
}
