//! Field mapping between roadmap nodes and remote issue payloads.
//!
//! [`build_fields`] is a pure function: every remote identifier it needs
//! (issue type id, custom-field ids, parent/epic keys) arrives pre-resolved
//! in the [`FieldContext`], so the mapper itself never talks to the remote
//! service. [`clean_fields`] implements the recovery half: given a
//! structured rejection it strips the rejected fields, except the four the
//! payload cannot live without.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::{HierarchyLevel, RoadmapNode};
use crate::transport::Rejection;

/// The working set of remote field name → value pairs for one creation call.
pub type FieldSet = BTreeMap<String, Value>;

/// Fields that are never stripped by [`clean_fields`]. A rejection naming
/// one of these is terminal for the node.
pub const PROTECTED_FIELDS: [&str; 4] = ["summary", "description", "project", "issuetype"];

/// Common default id of the epic-link field, used when name lookup fails.
pub const DEFAULT_EPIC_LINK_FIELD: &str = "customfield_10014";
/// Common default id of the story-points field.
pub const STORY_POINTS_FALLBACK: &str = "customfield_10016";
/// Common default id of the start-date field.
pub const START_DATE_FALLBACK: &str = "customfield_10015";
/// Common default id of the category field.
pub const CATEGORY_FALLBACK: &str = "customfield_10031";
/// Custom field some projects use for components when the system field is
/// not on the create screen.
pub const COMPONENTS_FALLBACK: &str = "customfield_10040";

/// Accepted values for the category field. Values outside this closed list
/// are dropped rather than sent.
pub const VALID_CATEGORIES: [&str; 23] = [
    "Infrastructure",
    "Core Services",
    "Security",
    "Frontend",
    "Integration",
    "Automation",
    "AI",
    "Database",
    "Knowledge",
    "Dashboard",
    "Monitoring",
    "ERP",
    "Search",
    "Performance",
    "UX",
    "Localization",
    "Testing",
    "Stability",
    "Analytics",
    "Architecture",
    "Data",
    "Reliability",
    "Network",
];

/// Optional field ids resolved once per run by the pipeline.
///
/// `None` means the project has neither the named field nor its documented
/// fallback id, and the corresponding attribute is omitted from payloads.
#[derive(Debug, Clone)]
pub struct ResolvedFields {
    pub epic_link: String,
    pub story_points: Option<String>,
    pub start_date: Option<String>,
    pub category: Option<String>,
    pub components: Option<String>,
    pub has_priority: bool,
    pub has_due_date: bool,
}

impl Default for ResolvedFields {
    /// Everything present, using the documented fallback ids. Matches a
    /// typically-configured project; used by tests.
    fn default() -> Self {
        Self {
            epic_link: DEFAULT_EPIC_LINK_FIELD.to_string(),
            story_points: Some(STORY_POINTS_FALLBACK.to_string()),
            start_date: Some(START_DATE_FALLBACK.to_string()),
            category: Some(CATEGORY_FALLBACK.to_string()),
            components: Some("components".to_string()),
            has_priority: true,
            has_due_date: true,
        }
    }
}

/// Pre-resolved inputs for building one node's field set.
#[derive(Debug, Clone)]
pub struct FieldContext<'a> {
    pub project_key: &'a str,
    pub issue_type_id: &'a str,
    /// Parent issue key; set for subtasks only.
    pub parent_key: Option<&'a str>,
    /// Owning epic's key; set for tasks and subtasks under an epic.
    pub epic_key: Option<&'a str>,
    pub resolved: &'a ResolvedFields,
}

/// Wrap plain text in the remote service's structured document format.
pub fn document(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [
            { "type": "paragraph", "content": [ { "type": "text", "text": text } ] }
        ]
    })
}

/// True for keys shaped like a remote custom-field identifier.
fn is_custom_field_key(key: &str) -> bool {
    key.strip_prefix("customfield_")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Build the remote field set for one roadmap node.
///
/// Deterministic and side-effect free. Attributes whose field the project
/// lacks are omitted; unknown roadmap keys are passed through only when
/// they already look like a custom-field identifier, otherwise dropped.
pub fn build_fields(node: &RoadmapNode, level: HierarchyLevel, ctx: &FieldContext) -> FieldSet {
    let mut fields = FieldSet::new();

    fields.insert("project".to_string(), json!({ "key": ctx.project_key }));
    fields.insert("summary".to_string(), json!(node.summary));
    fields.insert("description".to_string(), document(&node.description));
    fields.insert("issuetype".to_string(), json!({ "id": ctx.issue_type_id }));

    // Subtasks attach to their parent task; tasks under an epic use the
    // epic-link field instead of a parent reference.
    if level == HierarchyLevel::Subtask {
        if let Some(parent) = ctx.parent_key {
            fields.insert("parent".to_string(), json!({ "key": parent }));
        }
    }
    if level != HierarchyLevel::Epic {
        if let Some(epic) = ctx.epic_key {
            fields.insert(ctx.resolved.epic_link.clone(), json!(epic));
        }
    }

    if ctx.resolved.has_priority {
        if let Some(priority) = &node.priority {
            fields.insert("priority".to_string(), json!({ "name": priority }));
        }
    }

    if !node.labels.is_empty() {
        fields.insert("labels".to_string(), json!(node.labels));
    }

    if !node.components.is_empty() {
        if let Some(field) = &ctx.resolved.components {
            let value = if field == "components" {
                Value::Array(
                    node.components
                        .iter()
                        .map(|name| json!({ "name": name }))
                        .collect(),
                )
            } else {
                json!(node.components)
            };
            fields.insert(field.clone(), value);
        }
    }

    if !node.fix_versions.is_empty() {
        fields.insert(
            "fixVersions".to_string(),
            Value::Array(
                node.fix_versions
                    .iter()
                    .map(|name| json!({ "name": name }))
                    .collect(),
            ),
        );
    }

    if let Some(assignee) = &node.assignee {
        let value = if assignee.contains('@') {
            json!({ "accountId": assignee })
        } else {
            json!({ "name": assignee })
        };
        fields.insert("assignee".to_string(), value);
    }

    if ctx.resolved.has_due_date {
        if let Some(due) = node.due_date {
            fields.insert("duedate".to_string(), json!(due.format("%Y-%m-%d").to_string()));
        }
    }
    if let (Some(field), Some(start)) = (&ctx.resolved.start_date, node.start_date) {
        fields.insert(field.clone(), json!(start.format("%Y-%m-%d").to_string()));
    }

    if let (Some(field), Some(points)) = (&ctx.resolved.story_points, node.story_points) {
        fields.insert(field.clone(), json!(points));
    }

    if let (Some(field), Some(category)) = (&ctx.resolved.category, &node.category) {
        if VALID_CATEGORIES.contains(&category.as_str()) {
            fields.insert(field.clone(), json!({ "value": category }));
        }
    }

    for (key, value) in &node.extra {
        if is_custom_field_key(key) {
            fields.insert(key.clone(), value.clone());
        }
    }

    fields
}

/// Strip every field the rejection names, keeping the protected four.
pub fn clean_fields(fields: &FieldSet, rejection: &Rejection) -> FieldSet {
    let mut cleaned = fields.clone();
    for field in rejection.field_errors.keys() {
        if !PROTECTED_FIELDS.contains(&field.as_str()) {
            cleaned.remove(field);
        }
    }
    cleaned
}

/// True when the rejection names a field that cannot be stripped, which
/// makes the node unrecoverable.
pub fn rejects_protected_field(rejection: &Rejection) -> bool {
    rejection
        .field_errors
        .keys()
        .any(|field| PROTECTED_FIELDS.contains(&field.as_str()))
}
