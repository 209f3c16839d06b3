//! Core domain types: the roadmap document and its node tree.
//!
//! A roadmap is parsed once per run and treated as read-only afterwards,
//! except for a single normalization pass that demotes orphaned
//! subtask-level nodes to standalone tasks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The three hierarchy levels supported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    /// Top-level grouping (remote hierarchy level 1).
    Epic,
    /// Mid-level work item (remote hierarchy level 0).
    Task,
    /// Child of a task (remote hierarchy level -1).
    Subtask,
}

impl HierarchyLevel {
    /// The remote service's numeric hierarchy level.
    pub fn rank(self) -> i8 {
        match self {
            HierarchyLevel::Epic => 1,
            HierarchyLevel::Task => 0,
            HierarchyLevel::Subtask => -1,
        }
    }

    /// The conventional issue-type name at this level.
    pub fn type_name(self) -> &'static str {
        match self {
            HierarchyLevel::Epic => "Epic",
            HierarchyLevel::Task => "Task",
            HierarchyLevel::Subtask => "Sub-task",
        }
    }

    /// Lowercase label used in reports and log lines.
    pub fn label(self) -> &'static str {
        match self {
            HierarchyLevel::Epic => "epic",
            HierarchyLevel::Task => "task",
            HierarchyLevel::Subtask => "subtask",
        }
    }
}

/// One node of the roadmap tree.
///
/// The hierarchy level is positional, not stored: nodes under `epics` are
/// epics, their `tasks` are tasks, and `subtasks` under a task are subtasks.
/// Unrecognized keys (including `customfield_*` identifiers) are captured
/// via the flattened map; the field mapper decides which of them survive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadmapNode {
    /// Short summary (required, non-empty).
    pub summary: String,
    /// Detailed description (defaults to empty).
    #[serde(default)]
    pub description: String,
    /// Priority name as the remote service knows it (e.g. "High").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Labels applied to the created issue.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Project component names referenced by this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// Fix-version names referenced by this node.
    #[serde(
        default,
        rename = "fixVersions",
        alias = "fix_versions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fix_versions: Vec<String>,
    /// Assignee: an email address (mapped to account id) or a user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Story point estimate.
    #[serde(
        default,
        rename = "storyPoints",
        alias = "story_points",
        skip_serializing_if = "Option::is_none"
    )]
    pub story_points: Option<f64>,
    /// Planned start date.
    #[serde(
        default,
        rename = "startDate",
        alias = "start_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    /// Due date.
    #[serde(
        default,
        rename = "dueDate",
        alias = "due_date",
        alias = "duedate",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
    /// Work category; only values from the accepted vocabulary are mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Child tasks (meaningful on epic-level nodes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<RoadmapNode>,
    /// Child subtasks (meaningful on task-level nodes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<RoadmapNode>,
    /// Everything else, including raw `customfield_*` assignments.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RoadmapNode {
    /// Create a node with just a summary and description.
    pub fn new(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            ..Self::default()
        }
    }
}

/// The parsed roadmap document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roadmap {
    /// Project key override; falls back to the configured key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Epic subtrees, processed first, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub epics: Vec<RoadmapNode>,
    /// Standalone tasks, processed after all epic subtrees.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<RoadmapNode>,
    /// Subtask-level nodes declared without a parent task. Tolerated on
    /// input, demoted to standalone tasks by [`Roadmap::normalize`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<RoadmapNode>,
}

impl Roadmap {
    /// Demote orphaned subtask-level nodes to standalone tasks.
    ///
    /// A subtask must have a parent task; one declared at the document root
    /// or directly under an epic is re-homed as a task instead of being
    /// created as an orphaned subtask reference. Returns one warning line
    /// per demoted node for the caller to log.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        for node in self.subtasks.drain(..) {
            warnings.push(format!(
                "subtask '{}' has no parent task; demoting to a standalone task",
                node.summary
            ));
            self.tasks.push(node);
        }

        for epic in &mut self.epics {
            for node in epic.subtasks.drain(..) {
                warnings.push(format!(
                    "subtask '{}' declared directly under epic '{}'; demoting to a task",
                    node.summary, epic.summary
                ));
                epic.tasks.push(node);
            }
        }

        warnings
    }

    /// Total number of nodes across all levels.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[RoadmapNode]) -> usize {
            nodes
                .iter()
                .map(|n| 1 + count(&n.tasks) + count(&n.subtasks))
                .sum()
        }
        count(&self.epics) + count(&self.tasks) + count(&self.subtasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_level_ranks() {
        assert_eq!(HierarchyLevel::Epic.rank(), 1);
        assert_eq!(HierarchyLevel::Task.rank(), 0);
        assert_eq!(HierarchyLevel::Subtask.rank(), -1);
    }

    #[test]
    fn test_hierarchy_level_serializes_snake_case() {
        let json = serde_json::to_string(&HierarchyLevel::Subtask).unwrap();
        assert_eq!(json, "\"subtask\"");
    }

    #[test]
    fn test_node_deserializes_with_defaults() {
        let node: RoadmapNode =
            serde_json::from_value(serde_json::json!({ "summary": "Build ingest" })).unwrap();

        assert_eq!(node.summary, "Build ingest");
        assert_eq!(node.description, "");
        assert!(node.priority.is_none());
        assert!(node.labels.is_empty());
        assert!(node.extra.is_empty());
    }

    #[test]
    fn test_node_captures_custom_fields_in_extra() {
        let node: RoadmapNode = serde_json::from_value(serde_json::json!({
            "summary": "Build ingest",
            "customfield_10050": "squad-a",
            "stage": "Phase 1"
        }))
        .unwrap();

        assert_eq!(node.extra.len(), 2);
        assert_eq!(
            node.extra.get("customfield_10050"),
            Some(&serde_json::json!("squad-a"))
        );
    }

    #[test]
    fn test_node_accepts_alias_keys() {
        let node: RoadmapNode = serde_json::from_value(serde_json::json!({
            "summary": "Build ingest",
            "fix_versions": ["1.0"],
            "story_points": 5,
            "duedate": "2026-03-01"
        }))
        .unwrap();

        assert_eq!(node.fix_versions, vec!["1.0"]);
        assert_eq!(node.story_points, Some(5.0));
        assert_eq!(
            node.due_date,
            Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        );
    }

    #[test]
    fn test_normalize_demotes_root_subtasks() {
        let mut roadmap = Roadmap {
            subtasks: vec![RoadmapNode::new("Orphan", "")],
            ..Roadmap::default()
        };

        let warnings = roadmap.normalize();

        assert!(roadmap.subtasks.is_empty());
        assert_eq!(roadmap.tasks.len(), 1);
        assert_eq!(roadmap.tasks[0].summary, "Orphan");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Orphan"));
    }

    #[test]
    fn test_normalize_demotes_epic_level_subtasks() {
        let mut epic = RoadmapNode::new("Platform", "");
        epic.subtasks.push(RoadmapNode::new("Stray", ""));

        let mut roadmap = Roadmap {
            epics: vec![epic],
            ..Roadmap::default()
        };

        let warnings = roadmap.normalize();

        assert_eq!(roadmap.epics[0].tasks.len(), 1);
        assert!(roadmap.epics[0].subtasks.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Platform"));
    }

    #[test]
    fn test_normalize_is_noop_on_well_formed_tree() {
        let mut task = RoadmapNode::new("Task", "");
        task.subtasks.push(RoadmapNode::new("Sub", ""));
        let mut epic = RoadmapNode::new("Epic", "");
        epic.tasks.push(task);

        let mut roadmap = Roadmap {
            epics: vec![epic],
            ..Roadmap::default()
        };

        assert!(roadmap.normalize().is_empty());
        assert_eq!(roadmap.node_count(), 3);
    }

    #[test]
    fn test_node_count_walks_all_levels() {
        let mut task = RoadmapNode::new("Task", "");
        task.subtasks.push(RoadmapNode::new("Sub 1", ""));
        task.subtasks.push(RoadmapNode::new("Sub 2", ""));
        let mut epic = RoadmapNode::new("Epic", "");
        epic.tasks.push(task);

        let roadmap = Roadmap {
            epics: vec![epic],
            tasks: vec![RoadmapNode::new("Standalone", "")],
            ..Roadmap::default()
        };

        assert_eq!(roadmap.node_count(), 5);
    }
}
