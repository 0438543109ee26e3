// Copyright 2025 Cowboy AI, LLC.

//! Entry point tying a catalog, a worker pool and a sink together

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::catalog::Catalog;
use crate::challenge::{Challenge, ChallengeDocument, ChallengeQueue, ChallengeSource};
use crate::config::ComposerConfig;
use crate::errors::ComposeResult;
use crate::pool::{PoolRun, WorkerPool};
use crate::sink::ResultSink;
use crate::working_set::ServiceAlternatives;

/// Composition engine over one catalog
#[derive(Debug, Clone)]
pub struct Composer {
    catalog: Arc<Catalog>,
    config: ComposerConfig,
    pool: WorkerPool,
}

impl Composer {
    /// Validate `config` and build the worker pool
    pub fn new(catalog: impl Into<Arc<Catalog>>, config: ComposerConfig) -> ComposeResult<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.effective_pool_size(), &config.strategies)?;
        let catalog = catalog.into();
        info!(
            services = catalog.len(),
            concepts = catalog.taxonomy().len(),
            workers = pool.size(),
            "composer ready"
        );
        Ok(Self {
            catalog,
            config,
            pool,
        })
    }

    /// Shared catalog
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Active configuration
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Worker pool
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Build a challenge from concept names
    pub fn challenge<S: AsRef<str>>(&self, name: &str, known: &[S], goals: &[S]) -> ComposeResult<Arc<Challenge>> {
        Challenge::from_names(&self.catalog, name, known, goals).map(Arc::new)
    }

    /// Solve one challenge on the calling thread with the first configured
    /// strategy
    pub fn compose<S: AsRef<str>>(&self, known: &[S], goals: &[S]) -> ComposeResult<ServiceAlternatives> {
        let challenge = Challenge::from_names(&self.catalog, "inline", known, goals)?;
        let strategy = self
            .config
            .strategies
            .first()
            .copied()
            .unwrap_or_default()
            .instantiate();
        challenge.solve(strategy.as_ref(), &self.catalog, &self.config.search);
        challenge.result()
    }

    /// Read a JSON array of challenges into a queue
    pub fn load_challenges(&self, path: impl AsRef<Path>) -> ComposeResult<ChallengeQueue> {
        ChallengeDocument::load_all(path)?
            .iter()
            .map(|doc| Challenge::from_document(&self.catalog, doc).map(Arc::new))
            .collect()
    }

    /// Start the pool on `source`; returns without waiting
    pub fn compose_all(
        &self,
        source: Arc<dyn ChallengeSource>,
        sink: Arc<dyn ResultSink>,
    ) -> ComposeResult<PoolRun> {
        self.pool.start(
            source,
            Arc::clone(&self.catalog),
            self.config.search.clone(),
            sink,
        )
    }
}
