//! The hierarchical issue-creation pipeline.
//!
//! One pipeline instance owns one run: a single logical thread of control
//! walking the roadmap depth-first (epics before their tasks, tasks before
//! their subtasks, siblings in declaration order, standalone tasks after
//! all epic subtrees), with at most one node in flight at a time. Child
//! creation depends on the parent's freshly-minted key, so traversal is
//! strictly sequential.
//!
//! Per-node recovery policy: a rejection that names specific fields is
//! retried exactly once with those fields stripped (two strikes total); a
//! rejection without field detail, or one naming an unstrippable field,
//! fails the node immediately. A failed node fails its whole subtree with
//! reason "parent unavailable" without submitting any child.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::bootstrap::ensure_prerequisites;
use crate::domain::{HierarchyLevel, Roadmap, RoadmapNode};
use crate::error::SyncError;
use crate::fields::{
    build_fields, clean_fields, rejects_protected_field, FieldContext, FieldSet, ResolvedFields,
    CATEGORY_FALLBACK, COMPONENTS_FALLBACK, START_DATE_FALLBACK, STORY_POINTS_FALLBACK,
};
use crate::ledger::{Ledger, RunReport};
use crate::resolver::MetadataResolver;
use crate::transport::{Rejection, Tracker, TransportError};

/// Failure reason recorded for every node whose parent was not created.
pub const PARENT_UNAVAILABLE: &str = "parent unavailable";

/// Outcome of one creation attempt against the remote service.
#[derive(Debug, Error)]
enum SubmitError {
    #[error("request rejected: {0}")]
    Rejected(Rejection),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Drives one upload run against a single project.
pub struct UploadPipeline<'a, T: Tracker> {
    api: &'a T,
    project_key: String,
    resolver: MetadataResolver,
    ledger: Ledger,
}

impl<'a, T: Tracker> UploadPipeline<'a, T> {
    pub fn new(api: &'a T, project_key: impl Into<String>) -> Self {
        let project_key = project_key.into();
        Self {
            api,
            resolver: MetadataResolver::new(project_key.clone()),
            project_key,
            ledger: Ledger::new(),
        }
    }

    /// Run the full pipeline and return the run report.
    ///
    /// Fatal errors (connection, validation, missing issue types) abort
    /// before any issue is created. Once creation starts, per-node
    /// failures are isolated: the run always completes and the report
    /// accounts for every node.
    pub async fn run(&mut self, roadmap: &Roadmap) -> Result<RunReport, SyncError> {
        self.probe_connection().await?;

        let mut roadmap = roadmap.clone();
        for warning in roadmap.normalize() {
            warn!("{}", warning);
        }

        ensure_prerequisites(self.api, &mut self.resolver, &self.project_key, &roadmap).await?;
        let resolved = self.resolve_optional_fields().await?;

        for epic in &roadmap.epics {
            self.create_epic_subtree(epic, &resolved).await;
        }
        for task in &roadmap.tasks {
            self.create_task_subtree(task, None, &resolved).await;
        }

        Ok(self.ledger.report(&self.project_key))
    }

    /// Verify credentials and reachability before mutating anything.
    async fn probe_connection(&self) -> Result<(), SyncError> {
        let response = self.api.get("myself").await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(SyncError::Configuration(format!(
                "connection check failed: {}",
                response.rejection("myself")
            )))
        }
    }

    /// Resolve the optional field ids once for the whole run.
    async fn resolve_optional_fields(&mut self) -> Result<ResolvedFields, SyncError> {
        let epic_link = self.resolver.epic_link_field(self.api).await?;
        let story_points = self
            .field_or_fallback("Story Points", STORY_POINTS_FALLBACK)
            .await?;
        let start_date = self
            .field_or_fallback("Start date", START_DATE_FALLBACK)
            .await?;
        let category = self.field_or_fallback("Category", CATEGORY_FALLBACK).await?;

        let components = if self.resolver.has_field(self.api, "components").await? {
            Some("components".to_string())
        } else if self.resolver.has_field(self.api, COMPONENTS_FALLBACK).await? {
            Some(COMPONENTS_FALLBACK.to_string())
        } else {
            None
        };

        Ok(ResolvedFields {
            epic_link,
            story_points,
            start_date,
            category,
            components,
            has_priority: self.resolver.has_field(self.api, "priority").await?,
            has_due_date: self.resolver.has_field(self.api, "duedate").await?,
        })
    }

    /// Resolve a field by display name, falling back to a conventional id
    /// when the project has that id in its catalog.
    async fn field_or_fallback(
        &mut self,
        name: &str,
        fallback: &str,
    ) -> Result<Option<String>, SyncError> {
        if let Some(id) = self.resolver.field_id(self.api, name).await? {
            return Ok(Some(id));
        }
        if self.resolver.has_field(self.api, fallback).await? {
            return Ok(Some(fallback.to_string()));
        }
        Ok(None)
    }

    async fn create_epic_subtree(&mut self, epic: &RoadmapNode, resolved: &ResolvedFields) {
        match self
            .create_node(epic, HierarchyLevel::Epic, None, None, resolved)
            .await
        {
            Some(epic_key) => {
                for task in &epic.tasks {
                    self.create_task_subtree(task, Some(&epic_key), resolved).await;
                }
            }
            None => {
                for task in &epic.tasks {
                    self.fail_subtree(task);
                }
            }
        }
    }

    async fn create_task_subtree(
        &mut self,
        task: &RoadmapNode,
        epic_key: Option<&str>,
        resolved: &ResolvedFields,
    ) {
        match self
            .create_node(task, HierarchyLevel::Task, None, epic_key, resolved)
            .await
        {
            Some(task_key) => {
                for subtask in &task.subtasks {
                    self.create_node(
                        subtask,
                        HierarchyLevel::Subtask,
                        Some(&task_key),
                        epic_key,
                        resolved,
                    )
                    .await;
                }
            }
            None => {
                for subtask in &task.subtasks {
                    self.ledger.record_failure(
                        &subtask.summary,
                        HierarchyLevel::Subtask,
                        PARENT_UNAVAILABLE,
                    );
                }
            }
        }
    }

    /// Record a task and all of its subtasks as failed without submitting
    /// anything — their parent does not exist remotely.
    fn fail_subtree(&mut self, task: &RoadmapNode) {
        self.ledger
            .record_failure(&task.summary, HierarchyLevel::Task, PARENT_UNAVAILABLE);
        for subtask in &task.subtasks {
            self.ledger
                .record_failure(&subtask.summary, HierarchyLevel::Subtask, PARENT_UNAVAILABLE);
        }
    }

    /// Create one node, retrying once with cleaned fields when the
    /// rejection names strippable fields. Returns the new issue key, or
    /// `None` after recording the failure.
    async fn create_node(
        &mut self,
        node: &RoadmapNode,
        level: HierarchyLevel,
        parent_key: Option<&str>,
        epic_key: Option<&str>,
        resolved: &ResolvedFields,
    ) -> Option<String> {
        let issue_type_id = match self.resolver.issue_type_for_level(self.api, level).await {
            Ok(id) => id,
            Err(e) => {
                self.ledger.record_failure(&node.summary, level, e.to_string());
                return None;
            }
        };

        let fields = {
            let ctx = FieldContext {
                project_key: &self.project_key,
                issue_type_id: &issue_type_id,
                parent_key,
                epic_key,
                resolved,
            };
            build_fields(node, level, &ctx)
        };

        match self.submit(&fields).await {
            Ok((id, key)) => {
                info!(key = %key, level = level.label(), summary = %node.summary, "issue created");
                self.ledger.record_created(
                    &node.summary,
                    &key,
                    &id,
                    level,
                    parent_key.map(str::to_string),
                );
                Some(key)
            }
            Err(SubmitError::Rejected(rejection))
                if rejection.names_fields() && !rejects_protected_field(&rejection) =>
            {
                warn!(
                    summary = %node.summary,
                    %rejection,
                    "creation rejected; retrying once with cleaned fields"
                );
                let cleaned = clean_fields(&fields, &rejection);
                match self.submit(&cleaned).await {
                    Ok((id, key)) => {
                        info!(key = %key, summary = %node.summary, "issue created with cleaned fields");
                        self.ledger.record_created(
                            &node.summary,
                            &key,
                            &id,
                            level,
                            parent_key.map(str::to_string),
                        );
                        Some(key)
                    }
                    Err(e) => {
                        self.ledger.record_failure(&node.summary, level, e.to_string());
                        None
                    }
                }
            }
            Err(e) => {
                self.ledger.record_failure(&node.summary, level, e.to_string());
                None
            }
        }
    }

    async fn submit(&self, fields: &FieldSet) -> Result<(String, String), SubmitError> {
        let response = self.api.post("issue", json!({ "fields": fields })).await?;
        if response.is_success() {
            let id = response
                .body
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let key = response
                .body
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok((id, key))
        } else {
            Err(SubmitError::Rejected(response.rejection("issue")))
        }
    }
}
