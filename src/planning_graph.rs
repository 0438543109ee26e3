// Copyright 2025 Cowboy AI, LLC.

//! Forward planning graph
//!
//! Alternating concept and service levels grown forward from the known
//! concepts: level 0 holds the known concepts, and each further level holds
//! the services newly enabled by everything available so far together with
//! the concepts they newly make available. A level that adds no concepts is
//! rolled back and expansion stops (fixpoint).
//!
//! The graph keeps per-concept working indices that heuristic strategies
//! read:
//! - `first_level`: earliest level at which the concept (or a specialization)
//!   becomes available;
//! - origin producers: the services that made it available at that level;
//! - cumulative producers: every service producing it up to the last level.
//!
//! These indices are rebuilt on [`PlanningGraph::pop_level`] and cleared by
//! [`PlanningGraph::reset`]; the catalog's own producer/consumer indices are
//! never touched.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::trace;

use crate::catalog::Catalog;
use crate::service::ServiceId;
use crate::taxonomy::ConceptId;
use crate::working_set::ConceptList;

/// Concept/service levels plus goal set
#[derive(Debug, Clone, Default)]
pub struct PlanningGraph {
    goals: ConceptList,
    concept_levels: Vec<Vec<ConceptId>>,
    /// `service_levels[i]` feeds `concept_levels[i + 1]`
    service_levels: Vec<Vec<ServiceId>>,
    first_level: HashMap<ConceptId, usize>,
    origin: HashMap<ConceptId, IndexSet<ServiceId>>,
    cumulative: HashMap<ConceptId, IndexSet<ServiceId>>,
}

impl PlanningGraph {
    /// Empty graph for `goals`
    pub fn new(goals: ConceptList) -> Self {
        Self {
            goals,
            ..Self::default()
        }
    }

    /// Grow a graph from `known` until fixpoint or `max_levels` service levels
    pub fn expand(
        catalog: &Catalog,
        known: &ConceptList,
        goals: &ConceptList,
        max_levels: usize,
    ) -> Self {
        let mut graph = Self::new(goals.clone());
        graph.grow(catalog, known, max_levels);
        graph
    }

    /// Reset and grow from `known`
    pub fn grow(&mut self, catalog: &Catalog, known: &ConceptList, max_levels: usize) {
        self.reset();
        self.push_level(catalog, Vec::new(), known.iter().collect());

        let mut enabled: HashSet<ServiceId> = HashSet::new();
        while self.service_levels.len() < max_levels {
            let services: Vec<ServiceId> = catalog
                .services()
                .filter(|s| !enabled.contains(&s.id()))
                .filter(|s| s.input_concepts().iter().all(|c| self.first_level.contains_key(c)))
                .map(|s| s.id())
                .collect();
            let mut concepts: IndexSet<ConceptId> = IndexSet::new();
            for &id in &services {
                concepts.extend(
                    catalog
                        .service(id)
                        .output_concepts()
                        .iter()
                        .filter(|c| !self.first_level.contains_key(c))
                        .copied(),
                );
            }
            enabled.extend(services.iter().copied());

            self.push_level(catalog, services, concepts.into_iter().collect());
            if self.concept_levels.last().map_or(true, Vec::is_empty) {
                self.pop_level(catalog);
                break;
            }
        }
        trace!(levels = self.level_count(), "planning graph expanded");
    }

    /// Append a service level and the concept level it produces.
    ///
    /// The first call seeds level 0 and its `services` are ignored.
    pub fn push_level(&mut self, catalog: &Catalog, services: Vec<ServiceId>, concepts: Vec<ConceptId>) {
        let level = self.concept_levels.len();
        if level > 0 {
            self.service_levels.push(services);
        }
        self.concept_levels.push(concepts);
        self.index_level(catalog, level);
    }

    /// Undo the most recent level; returns false when only the seed remains
    pub fn pop_level(&mut self, catalog: &Catalog) -> bool {
        if self.concept_levels.len() <= 1 {
            return false;
        }
        self.concept_levels.pop();
        self.service_levels.pop();
        self.clear_indices();
        for level in 0..self.concept_levels.len() {
            self.index_level(catalog, level);
        }
        true
    }

    /// Drop all levels and working indices, keeping the goals
    pub fn reset(&mut self) {
        self.concept_levels.clear();
        self.service_levels.clear();
        self.clear_indices();
    }

    fn clear_indices(&mut self) {
        self.first_level.clear();
        self.origin.clear();
        self.cumulative.clear();
    }

    fn index_level(&mut self, catalog: &Catalog, level: usize) {
        let taxonomy = catalog.taxonomy();
        for &concept in &self.concept_levels[level] {
            for general in taxonomy.generalizations(concept) {
                self.first_level.entry(general).or_insert(level);
            }
        }
        if level == 0 {
            return;
        }
        for &service in &self.service_levels[level - 1] {
            for &output in catalog.service(service).output_concepts() {
                for general in taxonomy.generalizations(output) {
                    self.cumulative.entry(general).or_default().insert(service);
                    if self.first_level.get(&general) == Some(&level) {
                        self.origin.entry(general).or_default().insert(service);
                    }
                }
            }
        }
    }

    /// Goal concepts
    pub fn goals(&self) -> &ConceptList {
        &self.goals
    }

    /// Number of concept levels (including the seed)
    pub fn level_count(&self) -> usize {
        self.concept_levels.len()
    }

    /// Concepts that became available at `level`
    pub fn concept_level(&self, level: usize) -> Option<&[ConceptId]> {
        self.concept_levels.get(level).map(Vec::as_slice)
    }

    /// Services enabled just before concept level `level`
    pub fn service_level(&self, level: usize) -> Option<&[ServiceId]> {
        level
            .checked_sub(1)
            .and_then(|i| self.service_levels.get(i))
            .map(Vec::as_slice)
    }

    /// Earliest level at which `concept` is satisfiable
    pub fn first_level(&self, concept: ConceptId) -> Option<usize> {
        self.first_level.get(&concept).copied()
    }

    /// Services that first made `concept` satisfiable
    pub fn origin_producers(&self, concept: ConceptId) -> Option<&IndexSet<ServiceId>> {
        self.origin.get(&concept)
    }

    /// Every service producing `concept` across all levels
    pub fn cumulative_producers(&self, concept: ConceptId) -> Option<&IndexSet<ServiceId>> {
        self.cumulative.get(&concept)
    }

    /// Every goal is satisfiable from the known concepts
    pub fn goals_reachable(&self) -> bool {
        self.goals.iter().all(|g| self.first_level.contains_key(&g))
    }

    /// Every input of `service` is satisfiable
    pub fn is_applicable(&self, catalog: &Catalog, service: ServiceId) -> bool {
        catalog
            .service(service)
            .input_concepts()
            .iter()
            .all(|c| self.first_level.contains_key(c))
    }

    /// Sum of input levels; `None` when an input is unreachable
    pub fn estimated_cost(&self, catalog: &Catalog, service: ServiceId) -> Option<usize> {
        catalog
            .service(service)
            .input_concepts()
            .iter()
            .map(|c| self.first_level(*c))
            .sum()
    }
}
