//! Prerequisite validation and bootstrapping.
//!
//! Runs before any issue is created: structural problems across the whole
//! roadmap are collected and reported in one batch (no partial trees from a
//! malformed document), then every referenced component and version is
//! resolved and created remotely when missing. Issue types cannot be
//! created through the API, so a missing one is fatal.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::info;

use crate::domain::{HierarchyLevel, Roadmap, RoadmapNode};
use crate::error::SyncError;
use crate::resolver::MetadataResolver;
use crate::transport::Tracker;

/// Names and levels referenced anywhere in the roadmap tree.
#[derive(Debug, Default, PartialEq)]
pub struct References {
    pub components: BTreeSet<String>,
    pub versions: BTreeSet<String>,
    pub levels: BTreeSet<i8>,
}

impl References {
    /// Hierarchy levels referenced, highest first.
    pub fn hierarchy_levels(&self) -> Vec<HierarchyLevel> {
        let mut levels = Vec::new();
        for level in [
            HierarchyLevel::Epic,
            HierarchyLevel::Task,
            HierarchyLevel::Subtask,
        ] {
            if self.levels.contains(&level.rank()) {
                levels.push(level);
            }
        }
        levels
    }
}

/// Validate the whole tree, returning every problem found.
///
/// Checks are structural only and make no remote calls: non-empty
/// summaries everywhere, no `tasks` nested below epic level, no children
/// under subtasks.
pub fn validate_roadmap(roadmap: &Roadmap) -> Vec<String> {
    let mut problems = Vec::new();

    for (i, epic) in roadmap.epics.iter().enumerate() {
        let path = format!("epics[{}]", i);
        check_summary(epic, &path, &mut problems);
        for (j, task) in epic.tasks.iter().enumerate() {
            validate_task(task, &format!("{}.tasks[{}]", path, j), &mut problems);
        }
    }
    for (i, task) in roadmap.tasks.iter().enumerate() {
        validate_task(task, &format!("tasks[{}]", i), &mut problems);
    }

    problems
}

fn validate_task(task: &RoadmapNode, path: &str, problems: &mut Vec<String>) {
    check_summary(task, path, problems);
    if !task.tasks.is_empty() {
        problems.push(format!(
            "{}: nested 'tasks' are only supported under epics; use 'subtasks'",
            path
        ));
    }
    for (k, subtask) in task.subtasks.iter().enumerate() {
        let sub_path = format!("{}.subtasks[{}]", path, k);
        check_summary(subtask, &sub_path, problems);
        if !subtask.tasks.is_empty() || !subtask.subtasks.is_empty() {
            problems.push(format!("{}: subtasks cannot have children", sub_path));
        }
    }
}

fn check_summary(node: &RoadmapNode, path: &str, problems: &mut Vec<String>) {
    if node.summary.trim().is_empty() {
        problems.push(format!("{}: summary must not be empty", path));
    }
}

/// Collect the union of referenced components, versions, and levels.
pub fn collect_references(roadmap: &Roadmap) -> References {
    let mut refs = References::default();

    fn walk(node: &RoadmapNode, level: HierarchyLevel, refs: &mut References) {
        refs.levels.insert(level.rank());
        refs.components.extend(node.components.iter().cloned());
        refs.versions.extend(node.fix_versions.iter().cloned());
        for task in &node.tasks {
            walk(task, HierarchyLevel::Task, refs);
        }
        for subtask in &node.subtasks {
            walk(subtask, HierarchyLevel::Subtask, refs);
        }
    }

    for epic in &roadmap.epics {
        walk(epic, HierarchyLevel::Epic, &mut refs);
    }
    for task in &roadmap.tasks {
        walk(task, HierarchyLevel::Task, &mut refs);
    }

    refs
}

/// Validate the roadmap and create missing remote prerequisites.
///
/// Fails before any remote mutation when the document itself is malformed.
/// Components and versions referenced but absent are created and their new
/// ids inserted into the resolver cache, so sibling nodes referencing the
/// same name never race a second create.
pub async fn ensure_prerequisites<T: Tracker>(
    api: &T,
    resolver: &mut MetadataResolver,
    project_key: &str,
    roadmap: &Roadmap,
) -> Result<(), SyncError> {
    SyncError::validation(validate_roadmap(roadmap))?;

    let refs = collect_references(roadmap);

    // Issue types first: they cannot be auto-created, so discovering one
    // missing must abort before components/versions mutate the project.
    for level in refs.hierarchy_levels() {
        resolver
            .issue_type_for_level(api, level)
            .await
            .map_err(|e| match e {
                SyncError::UnknownIssueType { name, known } => {
                    SyncError::MissingIssueType { name, known }
                }
                other => other,
            })?;
    }

    for name in &refs.components {
        if resolver.component_id(api, name).await?.is_none() {
            info!(component = %name, "creating missing component");
            let id = create_named(api, "component", name, project_key).await?;
            resolver.insert_component(name.clone(), id);
        }
    }

    for name in &refs.versions {
        if resolver.version_id(api, name).await?.is_none() {
            info!(version = %name, "creating missing version");
            let id = create_named(api, "version", name, project_key).await?;
            resolver.insert_version(name.clone(), id);
        }
    }

    Ok(())
}

async fn create_named<T: Tracker>(
    api: &T,
    endpoint: &str,
    name: &str,
    project_key: &str,
) -> Result<String, SyncError> {
    let response = api
        .post(endpoint, json!({ "name": name, "project": project_key }))
        .await?;
    if !response.is_success() {
        return Err(SyncError::Rejected(response.rejection(endpoint)));
    }
    Ok(response
        .body
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}
