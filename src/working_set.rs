// Copyright 2025 Cowboy AI, LLC.

//! Per-search working sets
//!
//! - [`ConceptList`]: the search frontier of wanted concepts (and the fixed
//!   known set), ordered by insertion so the most recently added goal is
//!   visited first.
//! - [`ServiceList`]: the partial composition, a duplicate-free stack.
//! - [`ServiceAlternatives`]: a merged solution holding, per plan position,
//!   the set of services that are acceptable at that step.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::service::ServiceId;
use crate::taxonomy::{ConceptId, Taxonomy};

/// Ordered, duplicate-free list of concepts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptList {
    items: IndexSet<ConceptId>,
}

impl ConceptList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of concepts
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is wanted
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Concept at position `index`
    pub fn get(&self, index: usize) -> Option<ConceptId> {
        self.items.get_index(index).copied()
    }

    /// Exact membership
    pub fn contains(&self, concept: ConceptId) -> bool {
        self.items.contains(&concept)
    }

    /// Append unless already present; returns whether it was added
    pub fn push(&mut self, concept: ConceptId) -> bool {
        self.items.insert(concept)
    }

    /// Remove the concept at `index`, preserving the order of the rest
    pub fn remove_at(&mut self, index: usize) -> Option<ConceptId> {
        self.items.shift_remove_index(index)
    }

    /// Replace contents with a copy of `other`
    pub fn assign(&mut self, other: &ConceptList) {
        self.items.clone_from(&other.items);
    }

    /// Drop every concept that `produced` satisfies; returns how many went
    pub fn remove_subsumed_by(&mut self, taxonomy: &Taxonomy, produced: ConceptId) -> usize {
        let before = self.items.len();
        self.items
            .retain(|&wanted| !taxonomy.is_specialization_of(produced, wanted));
        before - self.items.len()
    }

    /// Some member satisfies `required`
    pub fn contains_specialization_of(&self, taxonomy: &Taxonomy, required: ConceptId) -> bool {
        self.items
            .iter()
            .any(|&have| taxonomy.is_specialization_of(have, required))
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ConceptId> + ExactSizeIterator + '_ {
        self.items.iter().copied()
    }
}

impl FromIterator<ConceptId> for ConceptList {
    fn from_iter<T: IntoIterator<Item = ConceptId>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<ConceptId> for ConceptList {
    fn extend<T: IntoIterator<Item = ConceptId>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

/// Partial composition: a stack of distinct services
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceList {
    items: IndexSet<ServiceId>,
}

impl ServiceList {
    /// Empty composition
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Membership
    pub fn contains(&self, service: ServiceId) -> bool {
        self.items.contains(&service)
    }

    /// Push onto the stack; a service already present is refused
    pub fn push(&mut self, service: ServiceId) -> bool {
        self.items.insert(service)
    }

    /// Pop the most recently pushed service
    pub fn pop(&mut self) -> Option<ServiceId> {
        self.items.pop()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Services in push order
    pub fn to_vec(&self) -> Vec<ServiceId> {
        self.items.iter().copied().collect()
    }

    /// Iterate in push order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = ServiceId> + '_ {
        self.items.iter().copied()
    }
}

/// Per-step alternative service sets of a merged solution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAlternatives {
    steps: Vec<IndexSet<ServiceId>>,
}

impl ServiceAlternatives {
    /// `len` empty steps
    pub fn with_len(len: usize) -> Self {
        Self {
            steps: vec![IndexSet::new(); len],
        }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when there are no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Add `service` as an alternative for step `index`; idempotent.
    /// Returns false when it was already present or `index` is out of range.
    pub fn add_at(&mut self, index: usize, service: ServiceId) -> bool {
        self.steps
            .get_mut(index)
            .map(|step| step.insert(service))
            .unwrap_or(false)
    }

    /// Alternatives at step `index`
    pub fn step(&self, index: usize) -> Option<&IndexSet<ServiceId>> {
        self.steps.get(index)
    }

    /// All steps in execution order
    pub fn steps(&self) -> &[IndexSet<ServiceId>] {
        &self.steps
    }

    /// How many distinct paths the merged structure spells out
    pub fn combinations(&self) -> usize {
        if self.steps.is_empty() {
            return 0;
        }
        self.steps
            .iter()
            .fold(1usize, |acc, step| acc.saturating_mul(step.len()))
    }

    /// First alternative of every step
    pub fn first_path(&self) -> Vec<ServiceId> {
        self.steps
            .iter()
            .filter_map(|step| step.first().copied())
            .collect()
    }
}
