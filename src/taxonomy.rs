// Copyright 2025 Cowboy AI, LLC.

//! Concept taxonomy
//!
//! Concepts are the semantic categories that service parameters are typed
//! with. They form a DAG through is-a links (multiple parents allowed): a
//! concept is a *specialization* of every concept reachable through its
//! parent links, and a specialization satisfies any requirement stated in
//! terms of one of its ancestors.
//!
//! Besides the parent/child structure every concept carries reverse indices
//! of the services that produce it (or a specialization of it) and the
//! services that consume it. These indices are maintained by the catalog
//! loader; the search engine only reads them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::errors::{ComposeError, ComposeResult};
use crate::service::ServiceId;

/// Index of a concept inside its [`Taxonomy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(u32);

impl ConceptId {
    /// Create from a raw index
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Raw index into the taxonomy arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "concept#{}", self.0)
    }
}

/// A node in the concept taxonomy
///
/// Identity is the concept name; two concepts with the same name are equal
/// regardless of their index state.
#[derive(Debug, Clone)]
pub struct Concept {
    id: ConceptId,
    name: String,
    parents: IndexSet<ConceptId>,
    children: IndexSet<ConceptId>,
    /// Transitive closure of `parents`, excluding the concept itself
    ancestors: BTreeSet<ConceptId>,
    producers: IndexSet<ServiceId>,
    consumers: IndexSet<ServiceId>,
}

impl Concept {
    fn new(id: ConceptId, name: String) -> Self {
        Self {
            id,
            name,
            parents: IndexSet::new(),
            children: IndexSet::new(),
            ancestors: BTreeSet::new(),
            producers: IndexSet::new(),
            consumers: IndexSet::new(),
        }
    }

    /// Index of this concept
    pub fn id(&self) -> ConceptId {
        self.id
    }

    /// Unique concept name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A root concept has no parents
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Direct parents (generalizations)
    pub fn parents(&self) -> &IndexSet<ConceptId> {
        &self.parents
    }

    /// Direct children (specializations)
    pub fn children(&self) -> &IndexSet<ConceptId> {
        &self.children
    }

    /// All transitive generalizations
    pub fn ancestors(&self) -> &BTreeSet<ConceptId> {
        &self.ancestors
    }

    /// Services whose outputs satisfy this concept
    pub fn producers(&self) -> &IndexSet<ServiceId> {
        &self.producers
    }

    /// Services that accept this concept as an input
    pub fn consumers(&self) -> &IndexSet<ServiceId> {
        &self.consumers
    }

    pub(crate) fn add_producer(&mut self, service: ServiceId) -> bool {
        self.producers.insert(service)
    }

    pub(crate) fn add_consumer(&mut self, service: ServiceId) -> bool {
        self.consumers.insert(service)
    }
}

impl PartialEq for Concept {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Concept {}

impl Hash for Concept {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Arena of concepts with name lookup and subsumption queries
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    concepts: Vec<Concept>,
    by_name: HashMap<String, ConceptId>,
}

impl Taxonomy {
    /// Start building a taxonomy
    pub fn builder() -> TaxonomyBuilder {
        TaxonomyBuilder::default()
    }

    /// Number of concepts
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// True if the taxonomy has no concepts
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Get a concept by index
    pub fn concept(&self, id: ConceptId) -> &Concept {
        &self.concepts[id.index()]
    }

    /// Look up a concept by name
    pub fn find(&self, name: &str) -> Option<ConceptId> {
        self.by_name.get(name).copied()
    }

    /// Look up a concept by name, failing with the referencing context
    pub fn resolve(&self, name: &str, referenced_by: &str) -> ComposeResult<ConceptId> {
        self.find(name).ok_or_else(|| ComposeError::UnknownConcept {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Name of a concept
    pub fn name(&self, id: ConceptId) -> &str {
        &self.concepts[id.index()].name
    }

    /// Iterate all concepts in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter()
    }

    /// Root concepts
    pub fn roots(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter().filter(|c| c.is_root())
    }

    /// `specific` satisfies a requirement stated as `general`: it is the
    /// same concept or reachable from it through child links.
    pub fn is_specialization_of(&self, specific: ConceptId, general: ConceptId) -> bool {
        specific == general || self.concepts[specific.index()].ancestors.contains(&general)
    }

    /// Every concept that is a specialization of `id`, including itself
    pub fn descendants(&self, id: ConceptId) -> BTreeSet<ConceptId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if seen.insert(cur) {
                stack.extend(self.concepts[cur.index()].children.iter().copied());
            }
        }
        seen
    }

    /// `id` and all of its ancestors
    pub fn generalizations(&self, id: ConceptId) -> impl Iterator<Item = ConceptId> + '_ {
        std::iter::once(id).chain(self.concepts[id.index()].ancestors.iter().copied())
    }

    /// Add an is-a link, keeping parent and child indices symmetric
    pub fn link(&mut self, child: ConceptId, parent: ConceptId) -> ComposeResult<()> {
        if self.is_specialization_of(parent, child) {
            return Err(ComposeError::TaxonomyCycle(self.name(child).to_string()));
        }
        self.concepts[child.index()].parents.insert(parent);
        self.concepts[parent.index()].children.insert(child);
        self.recompute_ancestors();
        Ok(())
    }

    /// Remove an is-a link from both sides; returns whether it existed
    pub fn unlink(&mut self, child: ConceptId, parent: ConceptId) -> bool {
        let removed = self.concepts[child.index()].parents.shift_remove(&parent);
        self.concepts[parent.index()].children.shift_remove(&child);
        if removed {
            self.recompute_ancestors();
        }
        removed
    }

    pub(crate) fn concept_mut(&mut self, id: ConceptId) -> &mut Concept {
        &mut self.concepts[id.index()]
    }

    fn recompute_ancestors(&mut self) {
        let mut closure: Vec<Option<BTreeSet<ConceptId>>> = vec![None; self.concepts.len()];
        for i in 0..self.concepts.len() {
            Self::ancestors_of(&self.concepts, ConceptId::new(i), &mut closure);
        }
        for (concept, ancestors) in self.concepts.iter_mut().zip(closure) {
            concept.ancestors = ancestors.unwrap_or_default();
        }
    }

    // Links are acyclic by construction, so plain memoized recursion terminates.
    fn ancestors_of(
        concepts: &[Concept],
        id: ConceptId,
        memo: &mut [Option<BTreeSet<ConceptId>>],
    ) -> BTreeSet<ConceptId> {
        if let Some(done) = &memo[id.index()] {
            return done.clone();
        }
        let mut acc = BTreeSet::new();
        for &parent in concepts[id.index()].parents.iter() {
            acc.insert(parent);
            acc.extend(Self::ancestors_of(concepts, parent, memo));
        }
        memo[id.index()] = Some(acc.clone());
        acc
    }
}

/// Collects concept declarations; parents may be referenced before they are declared
#[derive(Debug, Default, Clone)]
pub struct TaxonomyBuilder {
    declared: IndexMap<String, Vec<String>>,
    duplicates: Vec<String>,
}

impl TaxonomyBuilder {
    /// Declare a concept with its direct parents
    pub fn concept<I, S>(mut self, name: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_concept(name, parents);
        self
    }

    /// Declare a concept without parents
    pub fn root(self, name: impl Into<String>) -> Self {
        self.concept(name, std::iter::empty::<String>())
    }

    /// Declare a concept with its direct parents (by reference)
    pub fn add_concept<I, S>(&mut self, name: impl Into<String>, parents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let parents = parents.into_iter().map(Into::into).collect();
        if self.declared.insert(name.clone(), parents).is_some() {
            self.duplicates.push(name);
        }
    }

    /// Resolve names, wire parent/child links and compute ancestor closures
    pub fn build(self) -> ComposeResult<Taxonomy> {
        if let Some(dup) = self.duplicates.into_iter().next() {
            return Err(ComposeError::DuplicateConcept(dup));
        }

        let mut taxonomy = Taxonomy::default();
        for (i, name) in self.declared.keys().enumerate() {
            let id = ConceptId::new(i);
            taxonomy.by_name.insert(name.clone(), id);
            taxonomy.concepts.push(Concept::new(id, name.clone()));
        }

        for (i, (name, parents)) in self.declared.iter().enumerate() {
            let child = ConceptId::new(i);
            for parent in parents {
                let parent = taxonomy.resolve(parent, &format!("concept {name}"))?;
                taxonomy.concepts[child.index()].parents.insert(parent);
                taxonomy.concepts[parent.index()].children.insert(child);
            }
        }

        if let Some(cyclic) = find_cycle(&taxonomy.concepts) {
            return Err(ComposeError::TaxonomyCycle(
                taxonomy.name(cyclic).to_string(),
            ));
        }
        taxonomy.recompute_ancestors();
        Ok(taxonomy)
    }
}

fn find_cycle(concepts: &[Concept]) -> Option<ConceptId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; concepts.len()];
    for start in 0..concepts.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (node, next parent position) frames
        let mut stack = vec![(start, 0usize)];
        marks[start] = Mark::Active;
        while let Some((node, pos)) = stack.last_mut() {
            let parents = &concepts[*node].parents;
            if *pos < parents.len() {
                let next = parents[*pos].index();
                *pos += 1;
                match marks[next] {
                    Mark::Active => return Some(ConceptId::new(next)),
                    Mark::Unvisited => {
                        marks[next] = Mark::Active;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[*node] = Mark::Done;
                stack.pop();
            }
        }
    }
    None
}
