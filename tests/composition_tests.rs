// Copyright 2025 Cowboy AI, LLC.

//! End-to-end composition over the public API

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cim_compose::{
    verify_composition, Catalog, Challenge, ChallengeQueue, ComposeError, Composer,
    ComposerConfig, ConceptList, CompositionStrategy, GoalRegressionSearch, JsonLinesSink,
    MemorySink, SearchConfig, SearchStatus, SolutionAggregator, StrategyKind, Taxonomy,
    WorkflowDocument,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn demo(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(file)
}

fn market() -> Arc<Catalog> {
    Arc::new(Catalog::from_json_file(demo("market_catalog.json")).unwrap())
}

fn concepts(catalog: &Catalog, names: &[&str]) -> ConceptList {
    names
        .iter()
        .map(|n| catalog.taxonomy().find(n).unwrap())
        .collect()
}

#[test]
fn specialized_output_satisfies_general_goal() {
    let taxonomy = Taxonomy::builder()
        .root("Coin")
        .root("Fruit")
        .concept("Apple", ["Fruit"])
        .build()
        .unwrap();
    let catalog = Catalog::builder(taxonomy)
        .service("S1", &["Coin"], &["Apple"])
        .unwrap()
        .build();
    let composer = Composer::new(catalog, ComposerConfig::default()).unwrap();

    let solution = composer.compose(&["Coin"], &["Fruit"]).unwrap();
    assert_eq!(composer.catalog().service_names(&solution.first_path()), vec!["S1"]);
}

#[test]
fn unproducible_goal_is_exhausted_at_the_ceiling() {
    let taxonomy = Taxonomy::builder()
        .root("Coin")
        .root("Cheese")
        .root("Fruit")
        .concept("Apple", ["Fruit"])
        .build()
        .unwrap();
    let catalog = Catalog::builder(taxonomy)
        .service("S1", &["Coin"], &["Apple"])
        .unwrap()
        .build();
    let mut config = ComposerConfig::default().with_max_depth(5);
    config.search.reachability_precheck = false;
    let composer = Composer::new(catalog, config).unwrap();

    let err = composer.compose(&["Coin"], &["Cheese"]).unwrap_err();
    assert!(matches!(err, ComposeError::SearchExhausted { max_depth: 5, .. }));
    assert!(err.is_unsolved());
}

#[test]
fn demo_catalog_loads_with_indices() {
    let catalog = market();
    assert_eq!(catalog.len(), 6);
    let fruit = catalog.taxonomy().find("Fruit").unwrap();
    assert_eq!(
        catalog.service_names(&catalog.producers_of(fruit).iter().copied().collect::<Vec<_>>()),
        vec!["BuyApple", "BuyPear"]
    );
    let press = catalog.find_service("Press").unwrap();
    let cold = catalog.find_service("ColdPress").unwrap();
    assert!(catalog.service(press).equivalents().contains(&cold));
}

#[test]
fn equivalent_services_are_merged_into_one_step() {
    let catalog = market();
    let composer = Composer::new(Arc::clone(&catalog), ComposerConfig::default()).unwrap();
    let solution = composer.compose(&["Coin"], &["Juice"]).unwrap();

    assert_eq!(solution.len(), 2);
    let last: Vec<_> = solution.steps()[1].iter().copied().collect();
    assert_eq!(catalog.service_names(&last), vec!["Press", "ColdPress"]);
    assert_eq!(solution.combinations(), 2);
}

#[test_case(StrategyKind::Baseline ; "baseline")]
#[test_case(StrategyKind::CostGuided ; "cost guided")]
#[test_case(StrategyKind::CoverageGuided ; "coverage guided")]
fn every_strategy_finds_the_four_step_jam(kind: StrategyKind) {
    let catalog = market();
    let known = concepts(&catalog, &["Coin", "Card"]);
    let goals = concepts(&catalog, &["Jam"]);
    let mut aggregator = SolutionAggregator::new();
    let strategy = kind.instantiate();

    let outcome = GoalRegressionSearch::run(
        strategy.as_ref(),
        &catalog,
        &known,
        &goals,
        &SearchConfig::default(),
        &AtomicBool::new(false),
        &mut aggregator,
    );

    assert_eq!(outcome.status, SearchStatus::Solved { depth: 4 });
    let path = aggregator.best().unwrap().first_path();
    assert_eq!(verify_composition(&catalog, &known, &goals, &path), Ok(()));
    assert_eq!(catalog.service_names(&path).last().map(String::as_str), Some("Boil"));
}

#[test]
fn baseline_is_deterministic() {
    let catalog = market();
    let composer = Composer::new(
        Arc::clone(&catalog),
        ComposerConfig::default().with_strategies(vec![StrategyKind::Baseline]),
    )
    .unwrap();
    let first = composer.compose(&["Coin", "Card"], &["Jam"]).unwrap();
    for _ in 0..5 {
        assert_eq!(composer.compose(&["Coin", "Card"], &["Jam"]).unwrap(), first);
    }
}

#[test]
fn known_goals_need_no_services() {
    let catalog = market();
    let challenge = Challenge::from_names(&catalog, "fed", ["Apple"], ["Food"]).unwrap();
    let strategy = StrategyKind::Baseline.instantiate();
    let outcome = challenge.solve(strategy.as_ref(), &catalog, &SearchConfig::default());
    assert_eq!(outcome.status, SearchStatus::Solved { depth: 0 });
    assert!(challenge.result().unwrap().is_empty());
}

#[test_case(1 ; "one worker")]
#[test_case(2 ; "two workers")]
#[test_case(4 ; "four workers")]
#[test_case(8 ; "more workers than challenges")]
fn pool_processes_every_demo_challenge_once(workers: usize) {
    let catalog = market();
    let composer = Composer::new(
        Arc::clone(&catalog),
        ComposerConfig::default().with_pool_size(workers),
    )
    .unwrap();
    let queue = Arc::new(composer.load_challenges(demo("market_challenges.json")).unwrap());
    assert_eq!(queue.len(), 6);

    let sink = Arc::new(MemorySink::new());
    let summary = composer
        .compose_all(queue.clone(), sink.clone())
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(summary.workers.len(), workers);
    assert_eq!(summary.processed(), 6);
    assert_eq!(summary.solved(), 4);
    assert!(queue.is_empty());

    let mut names: Vec<_> = sink.reports().into_iter().map(|r| r.name).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "already-fed",
            "cheese",
            "fruit-with-coin",
            "jam-with-both",
            "jam-with-coin",
            "juice-with-coin"
        ]
    );
}

#[test]
fn json_lines_output_names_services_in_execution_order() {
    let catalog = market();
    let composer = Composer::new(
        Arc::clone(&catalog),
        ComposerConfig::default().with_pool_size(2),
    )
    .unwrap();
    let queue: ChallengeQueue = [composer.challenge("juice", &["Coin"], &["Juice"]).unwrap()]
        .into_iter()
        .collect();
    let sink = Arc::new(JsonLinesSink::new(Arc::clone(&catalog), Vec::new()));
    composer
        .compose_all(Arc::new(queue), sink.clone())
        .unwrap()
        .join()
        .unwrap();

    let out = Arc::try_unwrap(sink).ok().unwrap().into_inner();
    let doc: WorkflowDocument = serde_json::from_slice(&out).unwrap();
    assert_eq!(doc.result, SearchStatus::Solved { depth: 2 });
    assert_eq!(doc.steps.len(), 2);
    assert_eq!(doc.steps[0].alternatives, vec!["BuyApple"]);
    assert_eq!(doc.steps[1].alternatives, vec!["Press", "ColdPress"]);
}

#[test]
fn strategies_are_object_safe() {
    let strategies: Vec<Arc<dyn CompositionStrategy>> =
        StrategyKind::all().into_iter().map(StrategyKind::instantiate).collect();
    let names: Vec<_> = strategies.iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["baseline", "cost-guided", "coverage-guided"]);
}
