// Copyright 2025 Cowboy AI, LLC.

//! Solution aggregation
//!
//! All compositions found for one challenge are merged position-wise into a
//! single [`ServiceAlternatives`] sized to the shortest composition seen.
//! Longer compositions are discarded; a strictly shorter one replaces the
//! merged structure.

use tracing::trace;

use crate::catalog::Catalog;
use crate::service::ServiceId;
use crate::working_set::ServiceAlternatives;

/// Merges compositions into per-step alternative sets
#[derive(Debug, Clone, Default)]
pub struct SolutionAggregator {
    best: Option<ServiceAlternatives>,
    accepted: u64,
    discarded: u64,
}

impl SolutionAggregator {
    /// Empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a composition given in execution order; returns whether it
    /// was merged
    pub fn on_solution(&mut self, steps: &[ServiceId]) -> bool {
        let best = match &mut self.best {
            Some(best) if steps.len() > best.len() => {
                self.discarded += 1;
                trace!(len = steps.len(), best = best.len(), "longer composition discarded");
                return false;
            }
            Some(best) if steps.len() == best.len() => best,
            slot => slot.insert(ServiceAlternatives::with_len(steps.len())),
        };
        for (i, &service) in steps.iter().enumerate() {
            best.add_at(i, service);
        }
        self.accepted += 1;
        true
    }

    /// Add every service's equivalents to its step, skipping any service
    /// already used at another step
    pub fn expand_equivalents(&mut self, catalog: &Catalog) {
        let Some(best) = &mut self.best else {
            return;
        };
        for i in 0..best.len() {
            let extra: Vec<ServiceId> = best
                .step(i)
                .into_iter()
                .flatten()
                .flat_map(|&s| catalog.service(s).equivalents().iter().copied())
                .collect();
            for service in extra {
                let elsewhere = best
                    .steps()
                    .iter()
                    .enumerate()
                    .any(|(j, step)| j != i && step.contains(&service));
                if elsewhere {
                    trace!(step = i, "equivalent already used at another step");
                    continue;
                }
                best.add_at(i, service);
            }
        }
    }

    /// True once a composition has been merged
    pub fn has_solution(&self) -> bool {
        self.best.is_some()
    }

    /// Length of the merged compositions
    pub fn best_len(&self) -> Option<usize> {
        self.best.as_ref().map(ServiceAlternatives::len)
    }

    /// The merged structure
    pub fn best(&self) -> Option<&ServiceAlternatives> {
        self.best.as_ref()
    }

    /// Compositions merged so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Compositions rejected for being longer than the best
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Consume into the merged structure
    pub fn into_solution(self) -> Option<ServiceAlternatives> {
        self.best
    }
}
