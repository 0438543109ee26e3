// Copyright 2025 Cowboy AI, LLC.

//! Iterative-deepening goal-regression driver

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, trace};

use super::{
    CompositionStrategy, SearchConfig, SearchEnv, SearchMode, SearchOutcome, SearchPhase,
    SearchStats, SearchStatus,
};
use crate::aggregator::SolutionAggregator;
use crate::catalog::Catalog;
use crate::planning_graph::PlanningGraph;
use crate::taxonomy::ConceptId;
use crate::working_set::{ConceptList, ServiceList};

/// What a subtree reports to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// No composition below this node
    Dead,
    /// At least one composition recorded below this node
    Found,
    /// First-solution mode: unwind everything
    Done,
    /// Cancelled or past the deadline
    Interrupted,
}

/// Mutable per-run state threaded through the recursion
struct Run<'a> {
    aggregator: &'a mut SolutionAggregator,
    cancel: &'a AtomicBool,
    deadline: Option<Instant>,
    deadline_hit: bool,
    /// Current depth bound
    bound: usize,
    /// Shallowest depth at which a composition was recorded
    max_level: Option<usize>,
    stats: SearchStats,
}

impl Run<'_> {
    fn interrupted(&mut self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.deadline_hit = true;
            return true;
        }
        false
    }

    fn record(&mut self, composition: &ServiceList, depth: usize) {
        // The stack holds regression order; the first service to run was pushed last.
        let steps: Vec<_> = composition.iter().rev().collect();
        self.aggregator.on_solution(&steps);
        self.stats.solutions += 1;
        self.max_level = Some(self.max_level.map_or(depth, |lvl| lvl.min(depth)));
        trace!(depth, len = steps.len(), "composition recorded");
    }
}

/// Goal-regression search shared by every strategy
#[derive(Debug, Default, Clone, Copy)]
pub struct GoalRegressionSearch;

impl GoalRegressionSearch {
    /// Search for compositions turning `known` into `goals`.
    ///
    /// Compositions are recorded in execution order on `aggregator`.
    /// `cancel` is polled at every node; raising it ends the run with
    /// [`SearchStatus::Cancelled`], or with [`SearchStatus::Solved`] when a
    /// composition was already recorded. The deadline behaves the same way.
    pub fn run(
        strategy: &dyn CompositionStrategy,
        catalog: &Catalog,
        known: &ConceptList,
        goals: &ConceptList,
        config: &SearchConfig,
        cancel: &AtomicBool,
        aggregator: &mut SolutionAggregator,
    ) -> SearchOutcome {
        let started = Instant::now();
        let taxonomy = catalog.taxonomy();

        // Goals the known concepts already cover need no service.
        let wanted: ConceptList = goals
            .iter()
            .filter(|&g| !known.contains_specialization_of(taxonomy, g))
            .collect();
        if wanted.is_empty() {
            aggregator.on_solution(&[]);
            return SearchOutcome {
                status: SearchStatus::Solved { depth: 0 },
                stats: SearchStats {
                    solutions: 1,
                    elapsed: started.elapsed(),
                    ..SearchStats::default()
                },
            };
        }

        let graph = (config.reachability_precheck || strategy.needs_planning_graph())
            .then(|| PlanningGraph::expand(catalog, known, &wanted, usize::MAX));
        if config.reachability_precheck && graph.as_ref().is_some_and(|g| !g.goals_reachable()) {
            debug!(strategy = strategy.name(), "goals unreachable from known concepts");
            return SearchOutcome {
                status: SearchStatus::Exhausted {
                    max_depth: config.max_depth,
                },
                stats: SearchStats {
                    elapsed: started.elapsed(),
                    ..SearchStats::default()
                },
            };
        }

        let env = SearchEnv::new(catalog, known, graph.as_ref(), config);
        let mut run = Run {
            aggregator,
            cancel,
            deadline: config.deadline().map(|d| started + d),
            deadline_hit: false,
            bound: 1,
            max_level: None,
            stats: SearchStats::default(),
        };
        let mut composition = ServiceList::new();
        let mut phase = SearchPhase::Searching { depth: 1 };

        let status = loop {
            run.stats.deepest_bound = run.bound;
            composition.clear();
            debug!(strategy = strategy.name(), bound = run.bound, "searching");

            let signal = search(strategy, &env, &mut run, &wanted, &mut composition, 1);
            match signal {
                Signal::Found | Signal::Done => {
                    transition(&mut phase, SearchPhase::SolutionFound);
                    break SearchStatus::Solved {
                        depth: run.max_level.unwrap_or(run.bound),
                    };
                }
                // Compositions recorded before the stop are still the shortest.
                Signal::Interrupted if run.max_level.is_some() => {
                    transition(&mut phase, SearchPhase::SolutionFound);
                    break SearchStatus::Solved {
                        depth: run.max_level.unwrap_or(run.bound),
                    };
                }
                Signal::Interrupted => {
                    transition(&mut phase, SearchPhase::Cancelled);
                    break if run.deadline_hit {
                        SearchStatus::DeadlineExceeded
                    } else {
                        SearchStatus::Cancelled
                    };
                }
                Signal::Dead => {
                    transition(&mut phase, SearchPhase::ExhaustedAtDepth { depth: run.bound });
                    if run.bound >= config.max_depth {
                        transition(&mut phase, SearchPhase::Exhausted);
                        break SearchStatus::Exhausted {
                            max_depth: config.max_depth,
                        };
                    }
                    if run.interrupted() {
                        transition(&mut phase, SearchPhase::Cancelled);
                        break if run.deadline_hit {
                            SearchStatus::DeadlineExceeded
                        } else {
                            SearchStatus::Cancelled
                        };
                    }
                    run.bound += 1;
                    transition(&mut phase, SearchPhase::BoundIncreased { depth: run.bound });
                    transition(&mut phase, SearchPhase::Searching { depth: run.bound });
                }
            }
        };

        if config.collapse_equivalents {
            run.aggregator.expand_equivalents(catalog);
        }
        run.stats.elapsed = started.elapsed();
        debug!(
            strategy = strategy.name(),
            ?status,
            nodes = run.stats.nodes,
            solutions = run.stats.solutions,
            "search finished"
        );
        SearchOutcome {
            status,
            stats: run.stats,
        }
    }
}

fn transition(phase: &mut SearchPhase, next: SearchPhase) {
    debug_assert!(
        phase.can_transition_to(&next),
        "invalid search transition {phase} -> {next}"
    );
    trace!(from = %phase, to = %next, "search phase");
    *phase = next;
}

fn search(
    strategy: &dyn CompositionStrategy,
    env: &SearchEnv<'_>,
    run: &mut Run<'_>,
    wanted: &ConceptList,
    composition: &mut ServiceList,
    depth: usize,
) -> Signal {
    let catalog = env.catalog();
    let taxonomy = catalog.taxonomy();
    let config = env.config();
    let mut wt = ConceptList::new();

    // Most recently added goal first.
    for gi in (0..wanted.len()).rev() {
        let Some(goal) = wanted.get(gi) else {
            continue;
        };
        let mut success = false;
        let mut tried = HashSet::new();

        for service in strategy.promising(env, goal, wanted) {
            if composition.contains(service) {
                continue;
            }
            if config.collapse_equivalents
                && catalog
                    .service(service)
                    .equivalents()
                    .iter()
                    .any(|e| tried.contains(e))
            {
                continue;
            }
            tried.insert(service);
            if run.interrupted() {
                return Signal::Interrupted;
            }
            run.stats.nodes += 1;
            composition.push(service);

            wt.assign(wanted);
            wt.remove_at(gi);
            let svc = catalog.service(service);
            for &output in svc.output_concepts() {
                wt.remove_subsumed_by(taxonomy, output);
            }
            for &input in svc.input_concepts() {
                if !env.is_known(input) {
                    wt.push(input);
                }
            }

            let signal = if wt.is_empty() {
                run.record(composition, depth);
                match config.mode {
                    SearchMode::FirstSolution => Signal::Done,
                    SearchMode::Exhaustive => Signal::Found,
                }
            } else if depth < run.bound {
                search(strategy, env, run, &wt, composition, depth + 1)
            } else {
                Signal::Dead
            };

            composition.pop();

            match signal {
                Signal::Done | Signal::Interrupted => return signal,
                Signal::Found => {
                    success = true;
                    if config.level_pruning && prune_siblings(run.max_level, depth) {
                        break;
                    }
                }
                Signal::Dead => {}
            }
        }

        if success {
            return Signal::Found;
        }
        trace!(depth, goal = %goal_name(env, goal), "goal dead at this node");
    }
    Signal::Dead
}

fn prune_siblings(max_level: Option<usize>, depth: usize) -> bool {
    max_level.is_some_and(|lvl| depth >= lvl)
}

fn goal_name<'a>(env: &SearchEnv<'a>, goal: ConceptId) -> &'a str {
    env.catalog().taxonomy().name(goal)
}
