// Copyright 2025 Cowboy AI, LLC.

//! Error types for catalog loading, search and dispatch

use thiserror::Error;

/// Errors that can occur while loading a catalog or composing services
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// A concept name could not be resolved against the taxonomy
    #[error("Unknown concept: {name} (referenced by {referenced_by})")]
    UnknownConcept {
        /// Name that failed to resolve
        name: String,
        /// What referenced it (concept, thing, challenge)
        referenced_by: String,
    },

    /// A service name or index could not be resolved against the catalog
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// A thing (taxonomy individual) could not be resolved
    #[error("Unknown thing: {name} (referenced by {referenced_by})")]
    UnknownThing {
        /// Name that failed to resolve
        name: String,
        /// Service parameter that referenced it
        referenced_by: String,
    },

    /// Concept declared twice
    #[error("Duplicate concept: {0}")]
    DuplicateConcept(String),

    /// Service declared twice
    #[error("Duplicate service: {0}")]
    DuplicateService(String),

    /// Thing declared twice
    #[error("Duplicate thing: {0}")]
    DuplicateThing(String),

    /// Concept is its own ancestor
    #[error("Taxonomy cycle through concept: {0}")]
    TaxonomyCycle(String),

    /// Challenge cannot be searched (no goals, unknown concepts)
    #[error("Invalid challenge {challenge}: {reason}")]
    InvalidChallenge {
        /// Challenge name
        challenge: String,
        /// Why it was rejected
        reason: String,
    },

    /// No composition exists within the depth ceiling or the deadline
    #[error(
        "Search exhausted for challenge {challenge} {}",
        exhaustion_limit(.max_depth, .deadline_ms)
    )]
    SearchExhausted {
        /// Challenge name
        challenge: String,
        /// Ceiling that was reached, or the deepest bound searched before
        /// the deadline
        max_depth: usize,
        /// Set when the wall-clock budget ended the search
        deadline_ms: Option<u64>,
    },

    /// Search was cancelled externally
    #[error("Search cancelled: {0}")]
    Cancelled(String),

    /// A pool worker thread panicked
    #[error("Worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Worker slot index
        worker: usize,
        /// Panic payload, when it was a string
        message: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File or stream I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Result sink rejected a report
    #[error("Result sink error: {0}")]
    Sink(String),
}

fn exhaustion_limit(max_depth: &usize, deadline_ms: &Option<u64>) -> String {
    match deadline_ms {
        Some(ms) => format!("after {ms}ms deadline at depth {max_depth}"),
        None => format!("at max depth {max_depth}"),
    }
}

/// Result type for composition operations
pub type ComposeResult<T> = Result<T, ComposeError>;

impl From<serde_json::Error> for ComposeError {
    fn from(err: serde_json::Error) -> Self {
        ComposeError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ComposeError {
    fn from(err: std::io::Error) -> Self {
        ComposeError::Io(err.to_string())
    }
}

impl ComposeError {
    /// Check if this error was raised while loading a catalog
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            ComposeError::UnknownConcept { .. }
                | ComposeError::UnknownThing { .. }
                | ComposeError::DuplicateConcept(_)
                | ComposeError::DuplicateService(_)
                | ComposeError::DuplicateThing(_)
                | ComposeError::TaxonomyCycle(_)
        )
    }

    /// Check if this is a name resolution failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ComposeError::UnknownConcept { .. }
                | ComposeError::UnknownService(_)
                | ComposeError::UnknownThing { .. }
        )
    }

    /// Check if the search ended without a composition
    pub fn is_unsolved(&self) -> bool {
        matches!(
            self,
            ComposeError::SearchExhausted { .. } | ComposeError::Cancelled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ComposeError::UnknownConcept {
            name: "Cheese".to_string(),
            referenced_by: "challenge c1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown concept: Cheese (referenced by challenge c1)"
        );

        let err = ComposeError::SearchExhausted {
            challenge: "c1".to_string(),
            max_depth: 5,
            deadline_ms: None,
        };
        assert_eq!(
            err.to_string(),
            "Search exhausted for challenge c1 at max depth 5"
        );

        let err = ComposeError::SearchExhausted {
            challenge: "c1".to_string(),
            max_depth: 3,
            deadline_ms: Some(250),
        };
        assert_eq!(
            err.to_string(),
            "Search exhausted for challenge c1 after 250ms deadline at depth 3"
        );

        let err = ComposeError::WorkerPanicked {
            worker: 3,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Worker 3 panicked: boom");
    }

    #[test]
    fn test_error_classification() {
        assert!(ComposeError::TaxonomyCycle("A".into()).is_catalog_error());
        assert!(!ComposeError::Cancelled("stopped".into()).is_catalog_error());

        assert!(ComposeError::UnknownService("S9".into()).is_not_found());
        assert!(!ComposeError::DuplicateService("S1".into()).is_not_found());

        assert!(ComposeError::Cancelled("stopped".into()).is_unsolved());
        assert!(!ComposeError::Io("closed".into()).is_unsolved());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: ComposeError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, ComposeError::Serialization(_)));
    }
}
