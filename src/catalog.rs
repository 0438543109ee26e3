// Copyright 2025 Cowboy AI, LLC.

//! Service catalog
//!
//! The catalog owns the concept taxonomy and every service entry. It is
//! assembled once by [`CatalogBuilder`] (or from a JSON [`CatalogDocument`]),
//! rejecting dangling references at load time, and is read-only afterwards so
//! it can be shared between search workers behind an `Arc` without locking.
//!
//! Building the catalog wires the reverse indices the search relies on:
//! - a service is a **producer** of each output concept and of all of that
//!   concept's ancestors (a `GreenApple` producer satisfies a `Fruit` goal);
//! - a service is a **consumer** of each input concept and all of its
//!   descendants (it accepts any specialization of what it asks for);
//! - services with identical input and output concept sets are linked as
//!   equivalents.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{ComposeError, ComposeResult};
use crate::service::{Param, Service, ServiceId, Thing};
use crate::taxonomy::{ConceptId, Taxonomy};

/// Immutable taxonomy + service catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    taxonomy: Taxonomy,
    things: IndexMap<String, Thing>,
    services: Vec<Service>,
    by_name: HashMap<String, ServiceId>,
}

impl Catalog {
    /// Start a catalog over a finished taxonomy
    pub fn builder(taxonomy: Taxonomy) -> CatalogBuilder {
        CatalogBuilder::new(taxonomy)
    }

    /// Load from a parsed catalog document
    pub fn from_document(doc: CatalogDocument) -> ComposeResult<Self> {
        let mut taxonomy = Taxonomy::builder();
        for concept in doc.concepts {
            taxonomy.add_concept(concept.name, concept.parents);
        }
        let mut builder = CatalogBuilder::new(taxonomy.build()?);
        for thing in doc.things {
            builder.add_thing(&thing.name, &thing.type_name)?;
        }
        for service in doc.services {
            let params = |params: Vec<ParamDocument>| {
                params
                    .into_iter()
                    .map(|p| (p.name, p.thing))
                    .collect::<Vec<_>>()
            };
            builder.add_service(&service.name, params(service.inputs), params(service.outputs))?;
        }
        Ok(builder.build())
    }

    /// Load from a JSON string
    pub fn from_json_str(json: &str) -> ComposeResult<Self> {
        Self::from_document(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ComposeResult<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            ComposeError::Io(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// The concept taxonomy
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True if no services are registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Get a service by index
    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.index()]
    }

    /// Look up a service by name
    pub fn find_service(&self, name: &str) -> Option<ServiceId> {
        self.by_name.get(name).copied()
    }

    /// Look up a service by name or fail
    pub fn resolve_service(&self, name: &str) -> ComposeResult<ServiceId> {
        self.find_service(name)
            .ok_or_else(|| ComposeError::UnknownService(name.to_string()))
    }

    /// Iterate services in catalog order
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    /// Look up a declared thing
    pub fn thing(&self, name: &str) -> Option<&Thing> {
        self.things.get(name)
    }

    /// Services whose outputs satisfy `concept`
    pub fn producers_of(&self, concept: ConceptId) -> &IndexSet<ServiceId> {
        self.taxonomy.concept(concept).producers()
    }

    /// Services that accept `concept` as an input
    pub fn consumers_of(&self, concept: ConceptId) -> &IndexSet<ServiceId> {
        self.taxonomy.concept(concept).consumers()
    }

    /// Resolve concept names, reporting `referenced_by` on failure
    pub fn resolve_concepts<I, S>(&self, names: I, referenced_by: &str) -> ComposeResult<Vec<ConceptId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| self.taxonomy.resolve(n.as_ref(), referenced_by))
            .collect()
    }

    /// Service names for a list of ids
    pub fn service_names(&self, ids: &[ServiceId]) -> Vec<String> {
        ids.iter().map(|&id| self.service(id).name().to_string()).collect()
    }
}

/// Incrementally assembles a [`Catalog`], validating every reference on entry
#[derive(Debug)]
pub struct CatalogBuilder {
    taxonomy: Taxonomy,
    things: IndexMap<String, Thing>,
    services: Vec<Service>,
    by_name: HashMap<String, ServiceId>,
}

impl CatalogBuilder {
    fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            things: IndexMap::new(),
            services: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declare a taxonomy individual typed by `concept`
    pub fn add_thing(&mut self, name: &str, concept: &str) -> ComposeResult<()> {
        if self.things.contains_key(name) {
            return Err(ComposeError::DuplicateThing(name.to_string()));
        }
        let id = self.taxonomy.resolve(concept, &format!("thing {name}"))?;
        self.things.insert(
            name.to_string(),
            Thing {
                name: name.to_string(),
                type_name: concept.to_string(),
                concept: id,
            },
        );
        Ok(())
    }

    /// Register a service whose params are `(param name, thing name)` pairs
    pub fn add_service(
        &mut self,
        name: &str,
        inputs: Vec<(String, String)>,
        outputs: Vec<(String, String)>,
    ) -> ComposeResult<ServiceId> {
        if self.by_name.contains_key(name) {
            return Err(ComposeError::DuplicateService(name.to_string()));
        }
        let inputs = self.bind_params(name, inputs)?;
        let outputs = self.bind_params(name, outputs)?;
        let id = ServiceId::new(self.services.len());
        self.services
            .push(Service::new(id, name.to_string(), inputs, outputs));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a service directly by concept names; each concept gets an
    /// implicit individual of the same name.
    pub fn add_simple_service(
        &mut self,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
    ) -> ComposeResult<ServiceId> {
        let mut params = |concepts: &[&str]| -> ComposeResult<Vec<(String, String)>> {
            concepts
                .iter()
                .map(|&concept| {
                    if !self.things.contains_key(concept) {
                        self.add_thing(concept, concept)?;
                    }
                    Ok((concept.to_lowercase(), concept.to_string()))
                })
                .collect()
        };
        let inputs = params(inputs)?;
        let outputs = params(outputs)?;
        self.add_service(name, inputs, outputs)
    }

    /// Builder-style [`add_simple_service`](Self::add_simple_service)
    pub fn service(mut self, name: &str, inputs: &[&str], outputs: &[&str]) -> ComposeResult<Self> {
        self.add_simple_service(name, inputs, outputs)?;
        Ok(self)
    }

    fn bind_params(&self, service: &str, params: Vec<(String, String)>) -> ComposeResult<Vec<Param>> {
        params
            .into_iter()
            .map(|(param, thing)| {
                let bound = self
                    .things
                    .get(&thing)
                    .cloned()
                    .ok_or_else(|| ComposeError::UnknownThing {
                        name: thing.clone(),
                        referenced_by: format!("{service}.{param}"),
                    })?;
                Ok(Param {
                    name: param,
                    thing: bound,
                })
            })
            .collect()
    }

    /// Wire producer/consumer indices and equivalence sets
    pub fn build(mut self) -> Catalog {
        for service in &self.services {
            for &output in service.output_concepts() {
                let targets: Vec<_> = self.taxonomy.generalizations(output).collect();
                for concept in targets {
                    self.taxonomy.concept_mut(concept).add_producer(service.id());
                }
            }
            for &input in service.input_concepts() {
                for concept in self.taxonomy.descendants(input) {
                    self.taxonomy.concept_mut(concept).add_consumer(service.id());
                }
            }
        }

        let mut classes: IndexMap<(Vec<ConceptId>, Vec<ConceptId>), Vec<ServiceId>> =
            IndexMap::new();
        for service in &self.services {
            let mut inputs: Vec<_> = service.input_concepts().iter().copied().collect();
            let mut outputs: Vec<_> = service.output_concepts().iter().copied().collect();
            inputs.sort();
            outputs.sort();
            classes.entry((inputs, outputs)).or_default().push(service.id());
        }
        let mut redundant = 0;
        for members in classes.values().filter(|m| m.len() > 1) {
            redundant += members.len() - 1;
            for &a in members {
                for &b in members {
                    self.services[a.index()].add_equivalent(b);
                }
            }
        }

        debug!(classes = classes.len(), redundant, "service equivalence classes built");
        info!(
            concepts = self.taxonomy.len(),
            things = self.things.len(),
            services = self.services.len(),
            "catalog loaded"
        );

        Catalog {
            taxonomy: self.taxonomy,
            things: self.things,
            services: self.services,
            by_name: self.by_name,
        }
    }
}

/// JSON catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    /// Taxonomy nodes
    #[serde(default)]
    pub concepts: Vec<ConceptDocument>,
    /// Taxonomy individuals
    #[serde(default)]
    pub things: Vec<ThingDocument>,
    /// Service descriptions
    #[serde(default)]
    pub services: Vec<ServiceDocument>,
}

/// A concept declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConceptDocument {
    /// Concept name
    pub name: String,
    /// Direct parent names
    #[serde(default)]
    pub parents: Vec<String>,
}

/// An individual declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThingDocument {
    /// Individual name
    pub name: String,
    /// Concept name the individual is typed with
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A message part declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDocument {
    /// Part name
    pub name: String,
    /// Individual name
    pub thing: String,
}

/// A service declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDocument {
    /// Service name
    pub name: String,
    /// Input message parts
    #[serde(default)]
    pub inputs: Vec<ParamDocument>,
    /// Output message parts
    #[serde(default)]
    pub outputs: Vec<ParamDocument>,
}
