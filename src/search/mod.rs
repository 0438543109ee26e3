// Copyright 2025 Cowboy AI, LLC.

//! Composition search
//!
//! Goal-regression search with iterative deepening: starting from the goal
//! concepts, pick a wanted concept, try each service that produces it,
//! replace the concept by the service's unmet preconditions, and recurse
//! until nothing is wanted. The depth bound grows by one per round up to a
//! hard ceiling ([`SearchConfig::max_depth`]).
//!
//! Strategies ([`CompositionStrategy`]) only decide *which* producers are
//! promising for a goal and in which order; the regression driver
//! ([`GoalRegressionSearch`]) is shared. All per-run state lives in the
//! driver's call frame so one strategy instance can serve many concurrent
//! challenges.

mod regression;
mod strategies;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::errors::{ComposeError, ComposeResult};
use crate::planning_graph::PlanningGraph;
use crate::service::ServiceId;
use crate::taxonomy::ConceptId;
use crate::working_set::ConceptList;

pub use regression::GoalRegressionSearch;
pub use strategies::{Baseline, CostGuided, CoverageGuided, StrategyKind};

/// When the search may stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Return on the first composition found
    FirstSolution,
    /// Collect every composition of the shallowest solvable depth
    Exhaustive,
}

/// Knobs for one search run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Depth ceiling; reaching it without a solution is `Exhausted`
    pub max_depth: usize,
    /// Wall-clock budget in milliseconds
    pub deadline_ms: Option<u64>,
    /// Stop condition
    pub mode: SearchMode,
    /// Once a solution exists, skip sibling producers at or below its depth
    pub level_pruning: bool,
    /// Skip a producer when an equivalent one was already tried for the
    /// same goal; equivalents are merged back into the result
    pub collapse_equivalents: bool,
    /// Give up immediately when forward expansion cannot reach every goal
    pub reachability_precheck: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            deadline_ms: None,
            mode: SearchMode::Exhaustive,
            level_pruning: true,
            collapse_equivalents: true,
            reachability_precheck: true,
        }
    }
}

impl SearchConfig {
    /// Wall-clock budget
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Set the depth ceiling
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the stop condition
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the wall-clock budget
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    /// Toggle level pruning
    pub fn with_level_pruning(mut self, enabled: bool) -> Self {
        self.level_pruning = enabled;
        self
    }

    /// Toggle equivalent-service collapsing
    pub fn with_collapse_equivalents(mut self, enabled: bool) -> Self {
        self.collapse_equivalents = enabled;
        self
    }

    /// Toggle the forward reachability precheck
    pub fn with_reachability_precheck(mut self, enabled: bool) -> Self {
        self.reachability_precheck = enabled;
        self
    }

    /// Reject values the driver cannot run with
    pub fn validate(&self) -> ComposeResult<()> {
        if self.max_depth == 0 {
            return Err(ComposeError::Configuration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.deadline_ms == Some(0) {
            return Err(ComposeError::Configuration(
                "deadline_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Phases of an iterative-deepening run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    /// Depth-bounded search in progress
    Searching {
        /// Current bound
        depth: usize,
    },
    /// A composition was recorded
    SolutionFound,
    /// The bounded search finished without a composition
    ExhaustedAtDepth {
        /// Bound that was exhausted
        depth: usize,
    },
    /// The bound was raised and the next round is about to start
    BoundIncreased {
        /// New bound
        depth: usize,
    },
    /// The ceiling was exhausted
    Exhausted,
    /// Cancelled or out of time
    Cancelled,
}

impl SearchPhase {
    /// Name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SearchPhase::Searching { .. } => "Searching",
            SearchPhase::SolutionFound => "SolutionFound",
            SearchPhase::ExhaustedAtDepth { .. } => "ExhaustedAtDepth",
            SearchPhase::BoundIncreased { .. } => "BoundIncreased",
            SearchPhase::Exhausted => "Exhausted",
            SearchPhase::Cancelled => "Cancelled",
        }
    }

    /// No transitions leave a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchPhase::SolutionFound | SearchPhase::Exhausted | SearchPhase::Cancelled
        )
    }

    /// Check if a transition to `target` is valid
    pub fn can_transition_to(&self, target: &SearchPhase) -> bool {
        match (self, target) {
            (SearchPhase::Searching { .. }, SearchPhase::SolutionFound) => true,
            (SearchPhase::Searching { depth }, SearchPhase::ExhaustedAtDepth { depth: d }) => {
                d == depth
            }
            (SearchPhase::Searching { .. }, SearchPhase::Cancelled) => true,
            (SearchPhase::ExhaustedAtDepth { depth }, SearchPhase::BoundIncreased { depth: d }) => {
                *d == depth + 1
            }
            (SearchPhase::ExhaustedAtDepth { .. }, SearchPhase::Exhausted) => true,
            (SearchPhase::ExhaustedAtDepth { .. }, SearchPhase::Cancelled) => true,
            (SearchPhase::BoundIncreased { depth }, SearchPhase::Searching { depth: d }) => {
                d == depth
            }
            (SearchPhase::BoundIncreased { .. }, SearchPhase::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPhase::Searching { depth }
            | SearchPhase::ExhaustedAtDepth { depth }
            | SearchPhase::BoundIncreased { depth } => write!(f, "{}({depth})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// How a search run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SearchStatus {
    /// At least one composition was recorded
    Solved {
        /// Length of the shortest composition
        depth: usize,
    },
    /// No composition within the ceiling
    Exhausted {
        /// Ceiling that was searched
        max_depth: usize,
    },
    /// The cancellation flag was raised
    Cancelled,
    /// The wall-clock budget ran out
    DeadlineExceeded,
}

impl SearchStatus {
    /// True for `Solved`
    pub fn is_solved(&self) -> bool {
        matches!(self, SearchStatus::Solved { .. })
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Candidate services pushed onto the composition
    pub nodes: u64,
    /// Solutions handed to the aggregator
    pub solutions: u64,
    /// Deepest bound that was searched
    pub deepest_bound: usize,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Result of [`GoalRegressionSearch::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// How the run ended
    pub status: SearchStatus,
    /// Run counters
    pub stats: SearchStats,
}

/// Read-only view of a run handed to strategies
#[derive(Debug, Clone, Copy)]
pub struct SearchEnv<'a> {
    catalog: &'a Catalog,
    known: &'a ConceptList,
    planning_graph: Option<&'a PlanningGraph>,
    config: &'a SearchConfig,
}

impl<'a> SearchEnv<'a> {
    /// Bundle the read-only inputs of a run
    pub fn new(
        catalog: &'a Catalog,
        known: &'a ConceptList,
        planning_graph: Option<&'a PlanningGraph>,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            catalog,
            known,
            planning_graph,
            config,
        }
    }

    /// Service catalog
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Concepts given to the run
    pub fn known(&self) -> &'a ConceptList {
        self.known
    }

    /// Forward expansion from `known`, when one was built
    pub fn planning_graph(&self) -> Option<&'a PlanningGraph> {
        self.planning_graph
    }

    /// Run configuration
    pub fn config(&self) -> &'a SearchConfig {
        self.config
    }

    /// `required` is already satisfied by the known concepts
    pub fn is_known(&self, required: ConceptId) -> bool {
        self.known
            .contains_specialization_of(self.catalog.taxonomy(), required)
    }
}

/// Producer selection and ordering policy
pub trait CompositionStrategy: Send + Sync + fmt::Debug {
    /// Name for logging and reports
    fn name(&self) -> &'static str;

    /// Whether the driver must build a [`PlanningGraph`] for this strategy
    fn needs_planning_graph(&self) -> bool {
        false
    }

    /// Services worth trying for `goal`, in the order to try them
    fn promising(&self, env: &SearchEnv<'_>, goal: ConceptId, wanted: &ConceptList) -> Vec<ServiceId>;
}
