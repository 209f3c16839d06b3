//! Result ledger: the durable record of one upload run.
//!
//! Every roadmap node is recorded exactly once — either as a
//! [`CreationRecord`] or as a [`FailureRecord`] — regardless of outcome.
//! Records are append-only for the duration of the run; the ledger is the
//! single source of truth handed back to the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::HierarchyLevel;

/// One successfully created issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationRecord {
    /// Logical summary from the roadmap.
    pub summary: String,
    /// Remote issue key (e.g. "RS-42").
    pub key: String,
    /// Remote issue id.
    pub id: String,
    pub level: HierarchyLevel,
    /// Key of the parent issue for subtasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
}

/// One node that could not be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub summary: String,
    pub level: HierarchyLevel,
    pub reason: String,
}

/// Created keys partitioned by hierarchy level, summary → key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatedSummary {
    pub epics: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, String>,
    pub subtasks: BTreeMap<String, String>,
}

/// The run report returned to the caller and optionally saved to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// True when no node failed.
    pub success: bool,
    pub project: String,
    pub created: CreatedSummary,
    pub failures: Vec<FailureRecord>,
}

/// Accumulates creation outcomes over one run.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<CreationRecord>,
    failures: Vec<FailureRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a created-issue record.
    pub fn record_created(
        &mut self,
        summary: impl Into<String>,
        key: impl Into<String>,
        id: impl Into<String>,
        level: HierarchyLevel,
        parent_key: Option<String>,
    ) {
        self.records.push(CreationRecord {
            summary: summary.into(),
            key: key.into(),
            id: id.into(),
            level,
            parent_key,
        });
    }

    /// Append a failure record.
    pub fn record_failure(
        &mut self,
        summary: impl Into<String>,
        level: HierarchyLevel,
        reason: impl Into<String>,
    ) {
        self.failures.push(FailureRecord {
            summary: summary.into(),
            level,
            reason: reason.into(),
        });
    }

    /// All creation records, in creation order.
    pub fn created(&self) -> &[CreationRecord] {
        &self.records
    }

    /// All failures, in traversal order.
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Total number of nodes recorded, created or failed.
    pub fn len(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.failures.is_empty()
    }

    /// Created keys partitioned by hierarchy level.
    pub fn summary(&self) -> CreatedSummary {
        let mut summary = CreatedSummary::default();
        for record in &self.records {
            let bucket = match record.level {
                HierarchyLevel::Epic => &mut summary.epics,
                HierarchyLevel::Task => &mut summary.tasks,
                HierarchyLevel::Subtask => &mut summary.subtasks,
            };
            bucket.insert(record.summary.clone(), record.key.clone());
        }
        summary
    }

    /// Produce the final run report.
    pub fn report(&self, project: impl Into<String>) -> RunReport {
        RunReport {
            success: self.failures.is_empty(),
            project: project.into(),
            created: self.summary(),
            failures: self.failures.clone(),
        }
    }
}
