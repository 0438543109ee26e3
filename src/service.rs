// Copyright 2025 Cowboy AI, LLC.

//! Service catalog entries
//!
//! A service consumes a set of input concepts (its preconditions) and
//! produces a set of output concepts (its effects). Literal message parts are
//! bound to concepts through [`Param`] → [`Thing`] → concept.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::taxonomy::ConceptId;

/// Index of a service inside its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(u32);

impl ServiceId {
    /// Create from a raw index
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Raw index into the catalog
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service#{}", self.0)
    }
}

/// A taxonomy individual: a typed marker whose type string names a concept
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Thing {
    /// Individual name
    pub name: String,
    /// Type string as declared (the concept name)
    pub type_name: String,
    /// Resolved concept
    pub concept: ConceptId,
}

/// A named message part bound to a [`Thing`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    /// Message part name
    pub name: String,
    /// Individual the part carries
    pub thing: Thing,
}

impl Param {
    /// Concept this parameter is typed with
    pub fn concept(&self) -> ConceptId {
        self.thing.concept
    }
}

/// A catalog entry
#[derive(Debug, Clone)]
pub struct Service {
    id: ServiceId,
    name: String,
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    input_concepts: IndexSet<ConceptId>,
    output_concepts: IndexSet<ConceptId>,
    equivalents: IndexSet<ServiceId>,
}

impl Service {
    pub(crate) fn new(id: ServiceId, name: String, inputs: Vec<Param>, outputs: Vec<Param>) -> Self {
        let input_concepts = inputs.iter().map(Param::concept).collect();
        let output_concepts = outputs.iter().map(Param::concept).collect();
        Self {
            id,
            name,
            inputs,
            outputs,
            input_concepts,
            output_concepts,
            equivalents: IndexSet::new(),
        }
    }

    /// Catalog index
    pub fn id(&self) -> ServiceId {
        self.id
    }

    /// Unique service name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input parameters
    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    /// Output parameters
    pub fn outputs(&self) -> &[Param] {
        &self.outputs
    }

    /// Preconditions
    pub fn input_concepts(&self) -> &IndexSet<ConceptId> {
        &self.input_concepts
    }

    /// Effects
    pub fn output_concepts(&self) -> &IndexSet<ConceptId> {
        &self.output_concepts
    }

    /// Other services with identical input and output concept sets
    pub fn equivalents(&self) -> &IndexSet<ServiceId> {
        &self.equivalents
    }

    /// Same preconditions and effects, regardless of declaration order
    pub fn is_equivalent_to(&self, other: &Service) -> bool {
        self.input_concepts.len() == other.input_concepts.len()
            && self.output_concepts.len() == other.output_concepts.len()
            && self.input_concepts.iter().all(|c| other.input_concepts.contains(c))
            && self.output_concepts.iter().all(|c| other.output_concepts.contains(c))
    }

    pub(crate) fn add_equivalent(&mut self, other: ServiceId) {
        if other != self.id {
            self.equivalents.insert(other);
        }
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Service {}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
