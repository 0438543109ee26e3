// Copyright 2025 Cowboy AI, LLC.

//! Result sinks
//!
//! Workers hand every finished challenge to a [`ResultSink`]. The sink owns
//! the outward format: [`JsonLinesSink`] writes one [`WorkflowDocument`] per
//! line, [`MemorySink`] keeps the reports for callers that inspect them in
//! process.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::challenge::{Challenge, ChallengeId};
use crate::errors::{ComposeError, ComposeResult};
use crate::search::{SearchOutcome, SearchStatus};
use crate::working_set::ServiceAlternatives;

/// A finished challenge as delivered to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeReport {
    /// Challenge identifier
    pub challenge: ChallengeId,
    /// Challenge name
    pub name: String,
    /// Strategy that processed it
    pub strategy: &'static str,
    /// How the search ended
    pub status: SearchStatus,
    /// Merged compositions, when solved
    pub solution: Option<ServiceAlternatives>,
    /// Candidate services explored
    pub nodes: u64,
    /// Search wall-clock time in milliseconds
    pub elapsed_ms: u64,
    /// When the worker finished it
    pub completed_at: DateTime<Utc>,
}

impl ChallengeReport {
    /// Build from a challenge its worker just solved
    pub fn new(challenge: &Challenge, strategy: &'static str, outcome: &SearchOutcome) -> Self {
        Self {
            challenge: challenge.id(),
            name: challenge.name().to_string(),
            strategy,
            status: outcome.status,
            solution: challenge.solution(),
            nodes: outcome.stats.nodes,
            elapsed_ms: outcome.stats.elapsed.as_millis() as u64,
            completed_at: Utc::now(),
        }
    }

    /// True when a composition was found
    pub fn is_solved(&self) -> bool {
        self.status.is_solved() && self.solution.is_some()
    }
}

/// Consumer of finished challenges
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink: Send + Sync {
    /// Accept one report
    fn deliver(&self, report: &ChallengeReport) -> ComposeResult<()>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn deliver(&self, _report: &ChallengeReport) -> ComposeResult<()> {
        Ok(())
    }
}

/// Sink that keeps every report in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<ChallengeReport>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the reports received so far
    pub fn reports(&self) -> Vec<ChallengeReport> {
        self.lock().clone()
    }

    /// Number of reports received
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChallengeReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for MemorySink {
    fn deliver(&self, report: &ChallengeReport) -> ComposeResult<()> {
        self.lock().push(report.clone());
        Ok(())
    }
}

/// One step of a workflow: the interchangeable services for that position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Execution position, starting at 0
    pub index: usize,
    /// Service names acceptable at this step
    pub alternatives: Vec<String>,
}

/// Serialized form of a finished challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Challenge identifier
    pub id: ChallengeId,
    /// Challenge name
    pub challenge: String,
    /// Strategy that processed it
    pub strategy: String,
    /// Search result
    pub result: SearchStatus,
    /// Steps in execution order; empty when unsolved
    pub steps: Vec<WorkflowStep>,
    /// Number of distinct compositions the steps encode
    pub combinations: usize,
    /// Candidate services explored
    pub nodes: u64,
    /// Search wall-clock time in milliseconds
    pub elapsed_ms: u64,
    /// Completion time
    pub completed_at: DateTime<Utc>,
}

impl WorkflowDocument {
    /// Resolve service names against `catalog`
    pub fn from_report(report: &ChallengeReport, catalog: &Catalog) -> Self {
        let steps = report
            .solution
            .iter()
            .flat_map(|s| s.steps().iter().enumerate())
            .map(|(index, alternatives)| WorkflowStep {
                index,
                alternatives: alternatives
                    .iter()
                    .map(|&id| catalog.service(id).name().to_string())
                    .collect(),
            })
            .collect();
        Self {
            id: report.challenge,
            challenge: report.name.clone(),
            strategy: report.strategy.to_string(),
            result: report.status,
            steps,
            combinations: report
                .solution
                .as_ref()
                .map_or(0, ServiceAlternatives::combinations),
            nodes: report.nodes,
            elapsed_ms: report.elapsed_ms,
            completed_at: report.completed_at,
        }
    }
}

/// Writes one JSON [`WorkflowDocument`] per line
pub struct JsonLinesSink<W> {
    catalog: Arc<Catalog>,
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(catalog: Arc<Catalog>, writer: W) -> Self {
        Self {
            catalog,
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ResultSink for JsonLinesSink<W> {
    fn deliver(&self, report: &ChallengeReport) -> ComposeResult<()> {
        let doc = WorkflowDocument::from_report(report, &self.catalog);
        let line = serde_json::to_string(&doc)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| ComposeError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Baseline, SearchConfig};
    use crate::taxonomy::Taxonomy;
    use pretty_assertions::assert_eq;

    fn solved_report() -> (Arc<Catalog>, ChallengeReport) {
        let taxonomy = Taxonomy::builder()
            .root("Coin")
            .root("Fruit")
            .concept("Apple", ["Fruit"])
            .build()
            .unwrap();
        let catalog = Arc::new(
            Catalog::builder(taxonomy)
                .service("S1", &["Coin"], &["Apple"])
                .unwrap()
                .build(),
        );
        let challenge = Challenge::from_names(&catalog, "fruit", ["Coin"], ["Fruit"]).unwrap();
        let outcome = challenge.solve(&Baseline, &catalog, &SearchConfig::default());
        (catalog, ChallengeReport::new(&challenge, "baseline", &outcome))
    }

    #[test]
    fn memory_sink_keeps_reports() {
        let (_, report) = solved_report();
        let sink = MemorySink::new();
        sink.deliver(&report).unwrap();
        assert_eq!(sink.len(), 1);
        assert!(sink.reports()[0].is_solved());
    }

    #[test]
    fn json_lines_sink_writes_workflow_documents() {
        let (catalog, report) = solved_report();
        let sink = JsonLinesSink::new(catalog, Vec::new());
        sink.deliver(&report).unwrap();
        sink.deliver(&report).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let doc: WorkflowDocument = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(doc.challenge, "fruit");
        assert_eq!(doc.result, SearchStatus::Solved { depth: 1 });
        assert_eq!(
            doc.steps,
            vec![WorkflowStep {
                index: 0,
                alternatives: vec!["S1".to_string()]
            }]
        );
        assert_eq!(doc.combinations, 1);
    }

    #[test]
    fn mocked_sink_sees_each_report() {
        let (_, report) = solved_report();
        let mut sink = MockResultSink::new();
        sink.expect_deliver()
            .withf(|r| r.name == "fruit" && r.strategy == "baseline")
            .times(1)
            .returning(|_| Ok(()));
        sink.deliver(&report).unwrap();
    }
}
