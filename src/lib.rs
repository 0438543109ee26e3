// Copyright 2025 Cowboy AI, LLC.

//! # CIM Compose
//!
//! Semantic web service composition for the Composable Information Machine.
//!
//! Given a concept taxonomy, a catalog of services whose inputs and outputs
//! are typed by those concepts, a set of known concepts and a set of goal
//! concepts, the engine finds the shortest sequences of services that turn
//! the known concepts into the goals:
//! - **Taxonomy**: concepts with multiple inheritance and a precomputed
//!   subsumption closure
//! - **Catalog**: services indexed by the concepts they produce and consume,
//!   with equivalent services grouped
//! - **Search**: goal-regression iterative deepening driven by pluggable
//!   producer-ordering strategies
//! - **Aggregation**: equal-length compositions merged into per-step
//!   alternatives
//! - **Pool**: independent challenges processed in parallel by worker threads
//!   bound to strategies
//!
//! ## Design Principles
//!
//! 1. **Typed references**: concepts and services are arena indices resolved
//!    at load time
//! 2. **Shared read-only catalog**: workers share it without locks
//! 3. **Per-run state**: strategies are stateless, every search owns its state
//! 4. **Explicit completion**: a pool run is a handle the caller waits on

#![warn(missing_docs)]

mod aggregator;
mod catalog;
mod challenge;
mod composer;
mod config;
mod errors;
mod planning_graph;
mod pool;
mod service;
mod sink;
mod taxonomy;
mod verify;
mod working_set;
pub mod search;

pub use aggregator::SolutionAggregator;
pub use catalog::{
    Catalog, CatalogBuilder, CatalogDocument, ConceptDocument, ParamDocument, ServiceDocument,
    ThingDocument,
};
pub use challenge::{
    Challenge, ChallengeDocument, ChallengeId, ChallengeQueue, ChallengeSource, ChallengeState,
    ChallengeStatus,
};
pub use composer::Composer;
pub use config::{ComposerConfig, ENV_DEADLINE_MS, ENV_MAX_DEPTH, ENV_MODE, ENV_POOL_SIZE};
pub use errors::{ComposeError, ComposeResult};
pub use planning_graph::PlanningGraph;
pub use pool::{default_pool_size, PoolRun, PoolSummary, WorkerPool, WorkerReport};
pub use search::{
    Baseline, CompositionStrategy, CostGuided, CoverageGuided, GoalRegressionSearch, SearchConfig,
    SearchEnv, SearchMode, SearchOutcome, SearchPhase, SearchStats, SearchStatus, StrategyKind,
};
pub use service::{Param, Service, ServiceId, Thing};
pub use sink::{
    ChallengeReport, JsonLinesSink, MemorySink, NullSink, ResultSink, WorkflowDocument,
    WorkflowStep,
};
pub use taxonomy::{Concept, ConceptId, Taxonomy, TaxonomyBuilder};
pub use verify::{verify_alternatives, verify_composition, CompositionDefect};
pub use working_set::{ConceptList, ServiceAlternatives, ServiceList};
