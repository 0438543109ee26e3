// Copyright 2025 Cowboy AI, LLC.

//! Fixed-size worker pool
//!
//! Each slot is bound, round-robin, to one strategy for the life of the
//! pool. [`WorkerPool::start`] spawns one OS thread per slot and returns a
//! [`PoolRun`] right away; the run is the completion signal (blocking
//! [`PoolRun::join`], polling [`PoolRun::wait_timeout`], or async
//! [`PoolRun::wait`]). Workers share only the challenge source, the
//! read-only catalog and the sink.

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::challenge::{ChallengeId, ChallengeSource};
use crate::errors::{ComposeError, ComposeResult};
use crate::search::{CompositionStrategy, SearchConfig, StrategyKind};
use crate::sink::{ChallengeReport, ResultSink};

/// `max(hardware parallelism, 2)`
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .max(2)
}

/// Worker slots bound to strategies
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Vec<Arc<dyn CompositionStrategy>>,
}

impl WorkerPool {
    /// `size` slots bound round-robin to `strategies`
    pub fn new(size: usize, strategies: &[StrategyKind]) -> ComposeResult<Self> {
        Self::with_strategies(size, strategies.iter().map(|k| k.instantiate()).collect())
    }

    /// `size` slots bound round-robin to already built strategies
    pub fn with_strategies(
        size: usize,
        strategies: Vec<Arc<dyn CompositionStrategy>>,
    ) -> ComposeResult<Self> {
        if size == 0 {
            return Err(ComposeError::Configuration(
                "pool size must be at least 1".to_string(),
            ));
        }
        if strategies.is_empty() {
            return Err(ComposeError::Configuration(
                "at least one strategy is required".to_string(),
            ));
        }
        Ok(Self::bind(size, &strategies))
    }

    /// [`default_pool_size`] slots over every strategy
    pub fn with_default_size() -> Self {
        let strategies: Vec<_> = StrategyKind::all()
            .into_iter()
            .map(StrategyKind::instantiate)
            .collect();
        Self::bind(default_pool_size(), &strategies)
    }

    fn bind(size: usize, strategies: &[Arc<dyn CompositionStrategy>]) -> Self {
        Self {
            slots: strategies.iter().cycle().take(size).cloned().collect(),
        }
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Strategy name bound to `slot`
    pub fn binding(&self, slot: usize) -> Option<&'static str> {
        self.slots.get(slot).map(|s| s.name())
    }

    /// Spawn the workers and return without waiting for them
    pub fn start(
        &self,
        source: Arc<dyn ChallengeSource>,
        catalog: Arc<Catalog>,
        config: SearchConfig,
        sink: Arc<dyn ResultSink>,
    ) -> ComposeResult<PoolRun> {
        config.validate()?;
        let latch = Arc::new(CompletionLatch::new(self.slots.len()));
        let config = Arc::new(config);
        let mut handles = Vec::with_capacity(self.slots.len());

        for (worker, strategy) in self.slots.iter().enumerate() {
            let worker_ctx = Worker {
                index: worker,
                strategy: Arc::clone(strategy),
                source: Arc::clone(&source),
                catalog: Arc::clone(&catalog),
                config: Arc::clone(&config),
                sink: Arc::clone(&sink),
            };
            let guard = LatchGuard(Arc::clone(&latch));
            let handle = thread::Builder::new()
                .name(format!("compose-worker-{worker}"))
                .spawn(move || {
                    let _guard = guard;
                    worker_ctx.run()
                })
                .map_err(|e| ComposeError::Io(format!("spawn worker {worker}: {e}")))?;
            handles.push(handle);
        }

        info!(workers = handles.len(), "worker pool started");
        Ok(PoolRun { handles, latch })
    }
}

struct Worker {
    index: usize,
    strategy: Arc<dyn CompositionStrategy>,
    source: Arc<dyn ChallengeSource>,
    catalog: Arc<Catalog>,
    config: Arc<SearchConfig>,
    sink: Arc<dyn ResultSink>,
}

impl Worker {
    fn run(self) -> WorkerReport {
        let mut report = WorkerReport {
            worker: self.index,
            strategy: self.strategy.name(),
            processed: Vec::new(),
            solved: 0,
            sink_failures: 0,
        };
        debug!(worker = self.index, strategy = report.strategy, "worker started");

        while let Some(challenge) = self.source.next_challenge() {
            let outcome = challenge.solve(self.strategy.as_ref(), &self.catalog, &self.config);
            let delivered = ChallengeReport::new(&challenge, report.strategy, &outcome);
            if delivered.is_solved() {
                report.solved += 1;
            }
            if let Err(e) = self.sink.deliver(&delivered) {
                warn!(worker = self.index, challenge = %challenge.name(), error = %e, "result sink failed");
                report.sink_failures += 1;
            }
            report.processed.push(challenge.id());
        }

        debug!(
            worker = self.index,
            processed = report.processed.len(),
            "worker drained queue"
        );
        report
    }
}

/// What one worker did during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Slot index
    pub worker: usize,
    /// Bound strategy
    pub strategy: &'static str,
    /// Challenges processed, in order
    pub processed: Vec<ChallengeId>,
    /// How many of them were solved
    pub solved: usize,
    /// Reports the sink rejected
    pub sink_failures: usize,
}

/// All worker reports of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// One report per slot
    pub workers: Vec<WorkerReport>,
}

impl PoolSummary {
    /// Challenges processed across workers
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed.len()).sum()
    }

    /// Challenges solved across workers
    pub fn solved(&self) -> usize {
        self.workers.iter().map(|w| w.solved).sum()
    }

    /// Sink failures across workers
    pub fn sink_failures(&self) -> usize {
        self.workers.iter().map(|w| w.sink_failures).sum()
    }
}

/// Handle on a started pool run
#[derive(Debug)]
pub struct PoolRun {
    handles: Vec<JoinHandle<WorkerReport>>,
    latch: Arc<CompletionLatch>,
}

impl PoolRun {
    /// True once every worker has exited
    pub fn is_finished(&self) -> bool {
        self.latch.is_done()
    }

    /// Block up to `timeout`; returns whether every worker has exited
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }

    /// Block until every worker has exited and collect their reports
    pub fn join(self) -> ComposeResult<PoolSummary> {
        let mut workers = Vec::with_capacity(self.handles.len());
        let mut panicked = None;
        for (worker, handle) in self.handles.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => workers.push(report),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(worker, %message, "worker panicked");
                    panicked.get_or_insert(ComposeError::WorkerPanicked { worker, message });
                }
            }
        }
        match panicked {
            Some(err) => Err(err),
            None => Ok(PoolSummary { workers }),
        }
    }

    /// Await completion without blocking the async runtime
    pub async fn wait(self) -> ComposeResult<PoolSummary> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .map_err(|e| ComposeError::Cancelled(format!("pool wait task: {e}")))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Countdown released as each worker exits
#[derive(Debug)]
struct CompletionLatch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl CompletionLatch {
    fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    fn is_done(&self) -> bool {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner) == 0
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        let (remaining, _) = self
            .done
            .wait_timeout_while(remaining, timeout, |r| *r > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *remaining == 0
    }
}

// Counts down on drop so a panicking worker still releases waiters.
struct LatchGuard(Arc<CompletionLatch>);

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{Challenge, ChallengeQueue};
    use crate::search::testing::{orchard, stall_after_first_solution};
    use crate::search::SearchStatus;
    use crate::sink::{MemorySink, MockResultSink};
    use crate::taxonomy::Taxonomy;
    use std::collections::HashSet;

    fn catalog() -> Arc<Catalog> {
        let taxonomy = Taxonomy::builder()
            .root("Coin")
            .root("Fruit")
            .concept("Apple", ["Fruit"])
            .root("Cheese")
            .build()
            .unwrap();
        Arc::new(
            Catalog::builder(taxonomy)
                .service("S1", &["Coin"], &["Apple"])
                .unwrap()
                .build(),
        )
    }

    fn queue(catalog: &Catalog, n: usize) -> Arc<ChallengeQueue> {
        Arc::new(
            (0..n)
                .map(|i| {
                    let goal = if i % 3 == 0 { "Cheese" } else { "Fruit" };
                    Arc::new(Challenge::from_names(catalog, &format!("c{i}"), ["Coin"], [goal]).unwrap())
                })
                .collect(),
        )
    }

    #[test]
    fn slots_are_bound_round_robin() {
        let pool = WorkerPool::new(5, &StrategyKind::all()).unwrap();
        let bindings: Vec<_> = (0..5).filter_map(|i| pool.binding(i)).collect();
        assert_eq!(
            bindings,
            vec!["baseline", "cost-guided", "coverage-guided", "baseline", "cost-guided"]
        );
        assert!(WorkerPool::with_default_size().size() >= 2);
    }

    #[test]
    fn invalid_pool_settings_are_rejected() {
        assert!(WorkerPool::new(0, &StrategyKind::all()).is_err());
        assert!(WorkerPool::new(2, &[]).is_err());
        assert!(WorkerPool::with_strategies(2, Vec::new()).is_err());
    }

    #[test]
    fn compositions_found_before_the_deadline_count_as_solved() {
        let cat = Arc::new(orchard());
        let (strategy, config) = stall_after_first_solution(&cat);
        let q: Arc<ChallengeQueue> = Arc::new(
            ["juice-1", "juice-2"]
                .into_iter()
                .map(|name| Arc::new(Challenge::from_names(&cat, name, ["Coin"], ["Juice"]).unwrap()))
                .collect(),
        );
        let sink = Arc::new(MemorySink::new());
        let strategies: Vec<Arc<dyn CompositionStrategy>> = vec![Arc::new(strategy)];
        let pool = WorkerPool::with_strategies(2, strategies).unwrap();
        assert_eq!(pool.binding(1), Some("stalling"));

        let summary = pool
            .start(q, Arc::clone(&cat), config, sink.clone())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(summary.processed(), 2);
        assert_eq!(summary.solved(), 2);
        for report in sink.reports() {
            assert_eq!(report.status, SearchStatus::Solved { depth: 2 });
            assert!(report.is_solved());
        }
    }

    #[test]
    fn every_challenge_is_processed_exactly_once() {
        let cat = catalog();
        let q = queue(&cat, 20);
        let sink = Arc::new(MemorySink::new());
        let pool = WorkerPool::new(4, &StrategyKind::all()).unwrap();

        let run = pool
            .start(q.clone(), cat, SearchConfig::default().with_max_depth(3), sink.clone())
            .unwrap();
        let summary = run.join().unwrap();

        assert_eq!(summary.processed(), 20);
        let ids: HashSet<_> = summary.workers.iter().flat_map(|w| w.processed.iter()).collect();
        assert_eq!(ids.len(), 20);
        assert_eq!(sink.len(), 20);
        assert_eq!(summary.solved(), 13);
        assert_eq!(q.delivered(), 20);
    }

    #[test]
    fn sink_failures_are_counted_not_fatal() {
        let cat = catalog();
        let q = queue(&cat, 3);
        let mut sink = MockResultSink::new();
        sink.expect_deliver()
            .times(3)
            .returning(|_| Err(ComposeError::Sink("disk full".into())));
        let pool = WorkerPool::new(2, &[StrategyKind::Baseline]).unwrap();
        let summary = pool
            .start(q, cat, SearchConfig::default(), Arc::new(sink))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.sink_failures(), 3);
    }

    #[test]
    fn latch_releases_waiters() {
        let cat = catalog();
        let run = WorkerPool::new(2, &[StrategyKind::Baseline])
            .unwrap()
            .start(queue(&cat, 4), cat, SearchConfig::default(), Arc::new(MemorySink::new()))
            .unwrap();
        assert!(run.wait_timeout(Duration::from_secs(10)));
        assert!(run.is_finished());
        assert_eq!(run.join().unwrap().processed(), 4);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
