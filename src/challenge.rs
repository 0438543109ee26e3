// Copyright 2025 Cowboy AI, LLC.

//! Challenges and the queue that hands them to workers
//!
//! A challenge is one independent composition problem: known concepts in,
//! goal concepts out. Its search state is written only by the worker that
//! pulled it; other threads may read a snapshot or raise its cancellation
//! flag.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::aggregator::SolutionAggregator;
use crate::catalog::Catalog;
use crate::errors::{ComposeError, ComposeResult};
use crate::search::{
    CompositionStrategy, GoalRegressionSearch, SearchConfig, SearchOutcome, SearchStats,
    SearchStatus,
};
use crate::working_set::{ConceptList, ServiceAlternatives};

/// Challenge identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(Uuid);

impl ChallengeId {
    /// Create a new random challenge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ChallengeStatus {
    /// Waiting in the queue
    Pending,
    /// Pulled by a worker
    Running,
    /// Search finished
    Completed {
        /// How the search ended
        outcome: SearchStatus,
    },
}

/// Search state of a challenge
#[derive(Debug, Clone)]
pub struct ChallengeState {
    /// Lifecycle
    pub status: ChallengeStatus,
    /// Strategy that processed the challenge
    pub strategy: Option<&'static str>,
    /// Merged compositions
    pub solution: Option<ServiceAlternatives>,
    /// Counters of the finished run
    pub stats: SearchStats,
    /// Wall-clock budget the run was given
    pub deadline_ms: Option<u64>,
}

impl Default for ChallengeState {
    fn default() -> Self {
        Self {
            status: ChallengeStatus::Pending,
            strategy: None,
            solution: None,
            stats: SearchStats::default(),
            deadline_ms: None,
        }
    }
}

/// One composition problem
#[derive(Debug)]
pub struct Challenge {
    id: ChallengeId,
    name: String,
    known: ConceptList,
    goals: ConceptList,
    cancelled: AtomicBool,
    state: Mutex<ChallengeState>,
}

impl Challenge {
    /// Create a challenge; at least one goal is required
    pub fn new(name: impl Into<String>, known: ConceptList, goals: ConceptList) -> ComposeResult<Self> {
        let name = name.into();
        if goals.is_empty() {
            return Err(ComposeError::InvalidChallenge {
                challenge: name,
                reason: "no goal concepts".to_string(),
            });
        }
        Ok(Self {
            id: ChallengeId::new(),
            name,
            known,
            goals,
            cancelled: AtomicBool::new(false),
            state: Mutex::new(ChallengeState::default()),
        })
    }

    /// Create a challenge from concept names
    pub fn from_names<K, G, S>(catalog: &Catalog, name: &str, known: K, goals: G) -> ComposeResult<Self>
    where
        K: IntoIterator<Item = S>,
        G: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let referenced_by = format!("challenge {name}");
        let known = catalog.resolve_concepts(known, &referenced_by)?;
        let goals = catalog.resolve_concepts(goals, &referenced_by)?;
        Self::new(name, known.into_iter().collect(), goals.into_iter().collect())
    }

    /// Create a challenge from its document form
    pub fn from_document(catalog: &Catalog, doc: &ChallengeDocument) -> ComposeResult<Self> {
        Self::from_names(catalog, &doc.name, &doc.known, &doc.goals)
    }

    /// Identifier
    pub fn id(&self) -> ChallengeId {
        self.id
    }

    /// Name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concepts available up front
    pub fn known(&self) -> &ConceptList {
        &self.known
    }

    /// Concepts to produce
    pub fn goals(&self) -> &ConceptList {
        &self.goals
    }

    /// Mark the challenge as externally settled; a running search stops at
    /// its next node
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Current lifecycle state
    pub fn status(&self) -> ChallengeStatus {
        self.lock().status
    }

    /// Merged compositions, once solved
    pub fn solution(&self) -> Option<ServiceAlternatives> {
        self.lock().solution.clone()
    }

    /// Copy of the full search state
    pub fn snapshot(&self) -> ChallengeState {
        self.lock().clone()
    }

    /// Run `strategy` on this challenge and store the result
    pub fn solve(
        &self,
        strategy: &dyn CompositionStrategy,
        catalog: &Catalog,
        config: &SearchConfig,
    ) -> SearchOutcome {
        {
            let mut state = self.lock();
            state.status = ChallengeStatus::Running;
            state.strategy = Some(strategy.name());
            state.deadline_ms = config.deadline_ms;
        }

        let mut aggregator = SolutionAggregator::new();
        let outcome = GoalRegressionSearch::run(
            strategy,
            catalog,
            &self.known,
            &self.goals,
            config,
            &self.cancelled,
            &mut aggregator,
        );

        let mut state = self.lock();
        state.status = ChallengeStatus::Completed {
            outcome: outcome.status,
        };
        state.solution = aggregator.into_solution();
        state.stats = outcome.stats.clone();
        info!(
            challenge = %self.name,
            strategy = strategy.name(),
            status = ?outcome.status,
            elapsed_ms = outcome.stats.elapsed.as_millis() as u64,
            "challenge completed"
        );
        outcome
    }

    /// The settled result: the merged compositions or why there are none
    ///
    /// Running out of depth or out of time is [`ComposeError::SearchExhausted`];
    /// only a raised cancellation flag is [`ComposeError::Cancelled`].
    pub fn result(&self) -> ComposeResult<ServiceAlternatives> {
        let state = self.lock();
        let ChallengeStatus::Completed { outcome } = state.status else {
            return Err(ComposeError::InvalidChallenge {
                challenge: self.name.clone(),
                reason: "not completed".to_string(),
            });
        };
        match outcome {
            SearchStatus::Solved { .. } => {
                state
                    .solution
                    .clone()
                    .ok_or_else(|| ComposeError::InvalidChallenge {
                        challenge: self.name.clone(),
                        reason: "solved without a stored composition".to_string(),
                    })
            }
            SearchStatus::Exhausted { max_depth } => Err(ComposeError::SearchExhausted {
                challenge: self.name.clone(),
                max_depth,
                deadline_ms: None,
            }),
            SearchStatus::DeadlineExceeded => Err(ComposeError::SearchExhausted {
                challenge: self.name.clone(),
                max_depth: state.stats.deepest_bound,
                deadline_ms: state.deadline_ms,
            }),
            SearchStatus::Cancelled => Err(ComposeError::Cancelled(self.name.clone())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChallengeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// JSON form of a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChallengeDocument {
    /// Challenge name
    pub name: String,
    /// Known concept names
    #[serde(default)]
    pub known: Vec<String>,
    /// Goal concept names
    pub goals: Vec<String>,
}

impl ChallengeDocument {
    /// Read a JSON array of challenges
    pub fn load_all(path: impl AsRef<Path>) -> ComposeResult<Vec<ChallengeDocument>> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| ComposeError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Thread-safe source of challenges; each challenge is handed out at most once
pub trait ChallengeSource: Send + Sync {
    /// Next pending challenge, or `None` once drained
    fn next_challenge(&self) -> Option<Arc<Challenge>>;
}

/// FIFO challenge queue
#[derive(Debug, Default)]
pub struct ChallengeQueue {
    pending: Mutex<VecDeque<Arc<Challenge>>>,
    delivered: AtomicUsize,
}

impl ChallengeQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a challenge
    pub fn push(&self, challenge: Arc<Challenge>) {
        self.lock().push_back(challenge);
    }

    /// Challenges not yet handed out
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True once drained
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Challenges handed out so far
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Challenge>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FromIterator<Arc<Challenge>> for ChallengeQueue {
    fn from_iter<T: IntoIterator<Item = Arc<Challenge>>>(iter: T) -> Self {
        Self {
            pending: Mutex::new(iter.into_iter().collect()),
            delivered: AtomicUsize::new(0),
        }
    }
}

impl ChallengeSource for ChallengeQueue {
    fn next_challenge(&self) -> Option<Arc<Challenge>> {
        let next = self.lock().pop_front();
        if next.is_some() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        next
    }
}
