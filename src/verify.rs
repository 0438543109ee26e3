// Copyright 2025 Cowboy AI, LLC.

//! Planning-time validity check for a composition
//!
//! A composition in execution order is valid when no service repeats, every
//! input of every step is satisfied by a known concept or an earlier output,
//! and every goal is satisfied by a known concept or some output. No service
//! is invoked.

use std::collections::HashSet;

use thiserror::Error;

use crate::catalog::Catalog;
use crate::service::ServiceId;
use crate::taxonomy::ConceptId;
use crate::working_set::{ConceptList, ServiceAlternatives};

/// Why a composition is not valid
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionDefect {
    /// A service appears twice
    #[error("service {service} appears more than once")]
    DuplicateService {
        /// Service name
        service: String,
    },

    /// A step consumes a concept nothing before it produces
    #[error("step {step} ({service}) needs {input}, which is neither known nor produced earlier")]
    UnsatisfiedInput {
        /// Zero-based position in execution order
        step: usize,
        /// Service name
        service: String,
        /// Concept name
        input: String,
    },

    /// A step of a merged structure has no service
    #[error("step {step} has no service")]
    EmptyStep {
        /// Zero-based position in execution order
        step: usize,
    },

    /// A goal is not produced by any step
    #[error("goal {goal} is neither known nor produced")]
    UncoveredGoal {
        /// Concept name
        goal: String,
    },
}

/// Check `steps`, given in execution order, against `known` and `goals`
pub fn verify_composition(
    catalog: &Catalog,
    known: &ConceptList,
    goals: &ConceptList,
    steps: &[ServiceId],
) -> Result<(), CompositionDefect> {
    let taxonomy = catalog.taxonomy();
    let mut seen = HashSet::with_capacity(steps.len());
    let mut available: Vec<ConceptId> = known.iter().collect();

    let satisfied = |available: &[ConceptId], required: ConceptId| {
        available
            .iter()
            .any(|&have| taxonomy.is_specialization_of(have, required))
    };

    for (step, &id) in steps.iter().enumerate() {
        let service = catalog.service(id);
        if !seen.insert(id) {
            return Err(CompositionDefect::DuplicateService {
                service: service.name().to_string(),
            });
        }
        if let Some(&missing) = service
            .input_concepts()
            .iter()
            .find(|&&input| !satisfied(&available, input))
        {
            return Err(CompositionDefect::UnsatisfiedInput {
                step,
                service: service.name().to_string(),
                input: taxonomy.name(missing).to_string(),
            });
        }
        available.extend(service.output_concepts().iter().copied());
    }

    match goals.iter().find(|&goal| !satisfied(&available, goal)) {
        Some(goal) => Err(CompositionDefect::UncoveredGoal {
            goal: taxonomy.name(goal).to_string(),
        }),
        None => Ok(()),
    }
}

/// Check every alternative at every step by substituting it into the first
/// path
pub fn verify_alternatives(
    catalog: &Catalog,
    known: &ConceptList,
    goals: &ConceptList,
    solution: &ServiceAlternatives,
) -> Result<(), CompositionDefect> {
    if let Some(step) = solution.steps().iter().position(|s| s.is_empty()) {
        return Err(CompositionDefect::EmptyStep { step });
    }
    let base = solution.first_path();
    verify_composition(catalog, known, goals, &base)?;
    for (index, alternatives) in solution.steps().iter().enumerate() {
        for &alternative in alternatives.iter().skip(1) {
            let mut path = base.clone();
            path[index] = alternative;
            verify_composition(catalog, known, goals, &path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::Taxonomy;
    use pretty_assertions::assert_eq;

    fn kitchen() -> Catalog {
        let taxonomy = Taxonomy::builder()
            .root("Coin")
            .root("Fruit")
            .concept("Apple", ["Fruit"])
            .root("Juice")
            .build()
            .unwrap();
        Catalog::builder(taxonomy)
            .service("BuyApple", &["Coin"], &["Apple"])
            .unwrap()
            .service("Press", &["Fruit"], &["Juice"])
            .unwrap()
            .service("PressToo", &["Fruit"], &["Juice"])
            .unwrap()
            .build()
    }

    fn concepts(cat: &Catalog, names: &[&str]) -> ConceptList {
        names.iter().map(|n| cat.taxonomy().find(n).unwrap()).collect()
    }

    fn ids(cat: &Catalog, names: &[&str]) -> Vec<ServiceId> {
        names.iter().map(|n| cat.find_service(n).unwrap()).collect()
    }

    #[test]
    fn valid_composition_passes() {
        let cat = kitchen();
        let known = concepts(&cat, &["Coin"]);
        let goals = concepts(&cat, &["Juice"]);
        assert_eq!(
            verify_composition(&cat, &known, &goals, &ids(&cat, &["BuyApple", "Press"])),
            Ok(())
        );
    }

    #[test]
    fn out_of_order_step_is_unsatisfied() {
        let cat = kitchen();
        let known = concepts(&cat, &["Coin"]);
        let goals = concepts(&cat, &["Juice"]);
        assert_eq!(
            verify_composition(&cat, &known, &goals, &ids(&cat, &["Press", "BuyApple"])),
            Err(CompositionDefect::UnsatisfiedInput {
                step: 0,
                service: "Press".to_string(),
                input: "Fruit".to_string(),
            })
        );
    }

    #[test]
    fn duplicates_and_missing_goals_are_reported() {
        let cat = kitchen();
        let known = concepts(&cat, &["Coin"]);
        let goals = concepts(&cat, &["Juice"]);
        assert!(matches!(
            verify_composition(&cat, &known, &goals, &ids(&cat, &["BuyApple", "BuyApple"])),
            Err(CompositionDefect::DuplicateService { .. })
        ));
        assert_eq!(
            verify_composition(&cat, &known, &goals, &ids(&cat, &["BuyApple"])),
            Err(CompositionDefect::UncoveredGoal {
                goal: "Juice".to_string()
            })
        );
    }

    #[test]
    fn every_alternative_is_checked() {
        let cat = kitchen();
        let known = concepts(&cat, &["Coin"]);
        let goals = concepts(&cat, &["Juice"]);
        let mut solution = ServiceAlternatives::with_len(2);
        for (i, id) in ids(&cat, &["BuyApple", "Press"]).into_iter().enumerate() {
            solution.add_at(i, id);
        }
        solution.add_at(1, cat.find_service("PressToo").unwrap());
        assert_eq!(verify_alternatives(&cat, &known, &goals, &solution), Ok(()));

        solution.add_at(0, cat.find_service("PressToo").unwrap());
        assert!(verify_alternatives(&cat, &known, &goals, &solution).is_err());
    }

    #[test]
    fn empty_step_is_a_defect_not_a_panic() {
        let cat = kitchen();
        let known = concepts(&cat, &["Coin"]);
        let goals = concepts(&cat, &["Juice"]);
        let mut solution = ServiceAlternatives::with_len(3);
        solution.add_at(0, cat.find_service("BuyApple").unwrap());
        solution.add_at(2, cat.find_service("Press").unwrap());
        solution.add_at(2, cat.find_service("PressToo").unwrap());
        assert_eq!(
            verify_alternatives(&cat, &known, &goals, &solution),
            Err(CompositionDefect::EmptyStep { step: 1 })
        );
    }
}
