// Copyright 2025 Cowboy AI, LLC.

//! Producer ordering policies

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CompositionStrategy, SearchEnv};
use crate::errors::ComposeError;
use crate::service::ServiceId;
use crate::taxonomy::ConceptId;
use crate::working_set::ConceptList;

/// Plain iterative deepening: producers straight from the taxonomy index,
/// in catalog order
#[derive(Debug, Default, Clone, Copy)]
pub struct Baseline;

impl CompositionStrategy for Baseline {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn promising(&self, env: &SearchEnv<'_>, goal: ConceptId, _wanted: &ConceptList) -> Vec<ServiceId> {
        env.catalog().producers_of(goal).iter().copied().collect()
    }
}

/// Producers whose inputs are reachable, cheapest estimated inputs first
///
/// The estimate is the sum of the planning-graph levels at which each input
/// first becomes available.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostGuided;

impl CompositionStrategy for CostGuided {
    fn name(&self) -> &'static str {
        "cost-guided"
    }

    fn needs_planning_graph(&self) -> bool {
        true
    }

    fn promising(&self, env: &SearchEnv<'_>, goal: ConceptId, wanted: &ConceptList) -> Vec<ServiceId> {
        let Some(graph) = env.planning_graph() else {
            return Baseline.promising(env, goal, wanted);
        };
        let catalog = env.catalog();
        let mut scored: Vec<(usize, ServiceId)> = catalog
            .producers_of(goal)
            .iter()
            .filter_map(|&s| graph.estimated_cost(catalog, s).map(|cost| (cost, s)))
            .collect();
        scored.sort_by_key(|&(cost, _)| cost);
        scored.into_iter().map(|(_, s)| s).collect()
    }
}

/// Producers whose inputs are reachable, covering the most wanted concepts
/// first; ties go to the service with fewer inputs still to be produced
#[derive(Debug, Default, Clone, Copy)]
pub struct CoverageGuided;

impl CompositionStrategy for CoverageGuided {
    fn name(&self) -> &'static str {
        "coverage-guided"
    }

    fn needs_planning_graph(&self) -> bool {
        true
    }

    fn promising(&self, env: &SearchEnv<'_>, goal: ConceptId, wanted: &ConceptList) -> Vec<ServiceId> {
        let catalog = env.catalog();
        let taxonomy = catalog.taxonomy();
        let graph = env.planning_graph();

        let mut scored: Vec<(Reverse<usize>, usize, ServiceId)> = catalog
            .producers_of(goal)
            .iter()
            .copied()
            .filter(|&s| graph.map_or(true, |g| g.is_applicable(catalog, s)))
            .map(|s| {
                let service = catalog.service(s);
                let coverage = wanted
                    .iter()
                    .filter(|&w| {
                        service
                            .output_concepts()
                            .iter()
                            .any(|&o| taxonomy.is_specialization_of(o, w))
                    })
                    .count();
                let unmet = service
                    .input_concepts()
                    .iter()
                    .filter(|&&i| !env.is_known(i))
                    .count();
                (Reverse(coverage), unmet, s)
            })
            .collect();
        scored.sort_by_key(|&(coverage, unmet, _)| (coverage, unmet));
        scored.into_iter().map(|(_, _, s)| s).collect()
    }
}

/// Named strategies a pool slot can be bound to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`Baseline`]
    #[default]
    Baseline,
    /// [`CostGuided`]
    CostGuided,
    /// [`CoverageGuided`]
    CoverageGuided,
}

impl StrategyKind {
    /// Every strategy, in round-robin binding order
    pub fn all() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Baseline,
            StrategyKind::CostGuided,
            StrategyKind::CoverageGuided,
        ]
    }

    /// Shared strategy instance
    pub fn instantiate(self) -> Arc<dyn CompositionStrategy> {
        match self {
            StrategyKind::Baseline => Arc::new(Baseline),
            StrategyKind::CostGuided => Arc::new(CostGuided),
            StrategyKind::CoverageGuided => Arc::new(CoverageGuided),
        }
    }

    /// Kebab-case name
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Baseline => "baseline",
            StrategyKind::CostGuided => "cost-guided",
            StrategyKind::CoverageGuided => "coverage-guided",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::all()
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ComposeError::Configuration(format!("unknown strategy: {s}")))
    }
}
