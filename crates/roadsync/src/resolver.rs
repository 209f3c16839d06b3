//! Remote metadata resolution with per-run caching.
//!
//! The resolver discovers remote-side identifiers (issue types, fields,
//! components, versions) and caches each catalog after its first fetch, so
//! the number of remote calls is bounded by the number of catalogs, not by
//! roadmap size. The cache lives inside the resolver value — one resolver
//! per run, no global state — and entries are never invalidated mid-run.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::error::SyncError;
use crate::fields::DEFAULT_EPIC_LINK_FIELD;
use crate::transport::Tracker;

/// Cached facts about one remote issue type.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueTypeInfo {
    pub id: String,
    /// Display name as reported by the remote service.
    pub name: String,
    pub hierarchy_level: i8,
    pub subtask: bool,
}

/// Cached facts about one remote field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub id: String,
    pub schema_type: Option<String>,
    pub custom: bool,
}

#[derive(Debug, Default)]
struct FieldCatalog {
    /// Lowercased display name → field info.
    by_name: HashMap<String, FieldInfo>,
    /// All known field ids, for presence checks by id.
    ids: HashSet<String>,
}

/// Per-run cache of resolved identifiers.
///
/// Each catalog is `None` until first fetched, then immutable for the rest
/// of the run — with the one exception that components and versions created
/// by the bootstrapper are inserted as they are minted.
#[derive(Debug, Default)]
pub struct MetadataCache {
    issue_types: Option<HashMap<String, IssueTypeInfo>>,
    fields: Option<FieldCatalog>,
    components: Option<HashMap<String, String>>,
    versions: Option<HashMap<String, String>>,
}

/// Resolves remote identifiers against one project, caching per run.
#[derive(Debug)]
pub struct MetadataResolver {
    project_key: String,
    cache: MetadataCache,
}

#[derive(Deserialize)]
struct RemoteIssueType {
    id: String,
    name: String,
    #[serde(default, rename = "hierarchyLevel")]
    hierarchy_level: Option<i8>,
    #[serde(default)]
    subtask: bool,
}

#[derive(Deserialize)]
struct RemoteField {
    id: String,
    name: String,
    #[serde(default)]
    custom: bool,
    #[serde(default)]
    schema: Option<RemoteFieldSchema>,
}

#[derive(Deserialize)]
struct RemoteFieldSchema {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct RemoteNamedEntity {
    id: String,
    name: String,
}

impl MetadataResolver {
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            cache: MetadataCache::default(),
        }
    }

    /// Resolve an issue-type id by display name (case-insensitive).
    ///
    /// Fetches the issue-type catalog on first use; a name absent after
    /// that is an [`SyncError::UnknownIssueType`] carrying the names the
    /// project does know.
    pub async fn issue_type_id<T: Tracker>(
        &mut self,
        api: &T,
        name: &str,
    ) -> Result<String, SyncError> {
        let types = self.issue_types(api).await?;
        match types.get(&name.to_lowercase()) {
            Some(info) => Ok(info.id.clone()),
            None => Err(SyncError::UnknownIssueType {
                name: name.to_string(),
                known: Self::known_names(types),
            }),
        }
    }

    /// Resolve the issue-type id to use for a hierarchy level.
    ///
    /// Prefers a type whose remote hierarchy level matches; falls back to
    /// the conventional name for that level ("Epic", "Task", "Sub-task").
    pub async fn issue_type_for_level<T: Tracker>(
        &mut self,
        api: &T,
        level: crate::domain::HierarchyLevel,
    ) -> Result<String, SyncError> {
        let rank = level.rank();
        let types = self.issue_types(api).await?;

        if let Some(info) = types.values().find(|t| t.hierarchy_level == rank) {
            return Ok(info.id.clone());
        }
        match types.get(&level.type_name().to_lowercase()) {
            Some(info) => Ok(info.id.clone()),
            None => Err(SyncError::UnknownIssueType {
                name: level.type_name().to_string(),
                known: Self::known_names(types),
            }),
        }
    }

    /// Look up a field id by display name (case-insensitive).
    ///
    /// Returns `Ok(None)` when the field does not exist: absent optional
    /// fields are expected and must not abort the pipeline.
    pub async fn field_id<T: Tracker>(
        &mut self,
        api: &T,
        name: &str,
    ) -> Result<Option<String>, SyncError> {
        let catalog = self.fields(api).await?;
        Ok(catalog
            .by_name
            .get(&name.to_lowercase())
            .map(|f| f.id.clone()))
    }

    /// Whether the field catalog contains the given field id.
    pub async fn has_field<T: Tracker>(&mut self, api: &T, id: &str) -> Result<bool, SyncError> {
        let catalog = self.fields(api).await?;
        Ok(catalog.ids.contains(id))
    }

    /// Resolve the epic-link field id.
    ///
    /// Looks up the "Epic Link" field by name; when the catalog has no such
    /// entry the documented default id is used as a last-resort guess and
    /// logged as such.
    pub async fn epic_link_field<T: Tracker>(&mut self, api: &T) -> Result<String, SyncError> {
        match self.field_id(api, "Epic Link").await? {
            Some(id) => Ok(id),
            None => {
                warn!(
                    fallback = DEFAULT_EPIC_LINK_FIELD,
                    "no 'Epic Link' field in the catalog; guessing the default id"
                );
                Ok(DEFAULT_EPIC_LINK_FIELD.to_string())
            }
        }
    }

    /// Look up a project component id by name, `None` when absent.
    pub async fn component_id<T: Tracker>(
        &mut self,
        api: &T,
        name: &str,
    ) -> Result<Option<String>, SyncError> {
        let endpoint = format!("project/{}/components", self.project_key);
        if self.cache.components.is_none() {
            self.cache.components = Some(Self::fetch_named(api, &endpoint).await?);
        }
        Ok(self
            .cache
            .components
            .as_ref()
            .unwrap()
            .get(name)
            .cloned())
    }

    /// Look up a project version id by name, `None` when absent.
    pub async fn version_id<T: Tracker>(
        &mut self,
        api: &T,
        name: &str,
    ) -> Result<Option<String>, SyncError> {
        let endpoint = format!("project/{}/versions", self.project_key);
        if self.cache.versions.is_none() {
            self.cache.versions = Some(Self::fetch_named(api, &endpoint).await?);
        }
        Ok(self.cache.versions.as_ref().unwrap().get(name).cloned())
    }

    /// Record a component the bootstrapper just created.
    pub fn insert_component(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.cache
            .components
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), id.into());
    }

    /// Record a version the bootstrapper just created.
    pub fn insert_version(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.cache
            .versions
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), id.into());
    }

    async fn issue_types<T: Tracker>(
        &mut self,
        api: &T,
    ) -> Result<&HashMap<String, IssueTypeInfo>, SyncError> {
        if self.cache.issue_types.is_none() {
            let response = api.get("issuetype").await?;
            if !response.is_success() {
                return Err(SyncError::Rejected(response.rejection("issuetype")));
            }
            let remote: Vec<RemoteIssueType> = serde_json::from_value(response.body)
                .map_err(crate::transport::TransportError::from)?;

            let mut types = HashMap::new();
            for t in remote {
                let hierarchy_level =
                    t.hierarchy_level.unwrap_or(if t.subtask { -1 } else { 0 });
                types.insert(
                    t.name.to_lowercase(),
                    IssueTypeInfo {
                        id: t.id,
                        name: t.name,
                        hierarchy_level,
                        subtask: t.subtask,
                    },
                );
            }
            self.cache.issue_types = Some(types);
        }
        Ok(self.cache.issue_types.as_ref().unwrap())
    }

    async fn fields<T: Tracker>(&mut self, api: &T) -> Result<&FieldCatalog, SyncError> {
        if self.cache.fields.is_none() {
            let response = api.get("field").await?;
            if !response.is_success() {
                return Err(SyncError::Rejected(response.rejection("field")));
            }
            let remote: Vec<RemoteField> = serde_json::from_value(response.body)
                .map_err(crate::transport::TransportError::from)?;

            let mut catalog = FieldCatalog::default();
            for f in remote {
                catalog.ids.insert(f.id.clone());
                catalog.by_name.insert(
                    f.name.to_lowercase(),
                    FieldInfo {
                        id: f.id,
                        schema_type: f.schema.and_then(|s| s.kind),
                        custom: f.custom,
                    },
                );
            }
            self.cache.fields = Some(catalog);
        }
        Ok(self.cache.fields.as_ref().unwrap())
    }

    async fn fetch_named<T: Tracker>(
        api: &T,
        endpoint: &str,
    ) -> Result<HashMap<String, String>, SyncError> {
        let response = api.get(endpoint).await?;
        if !response.is_success() {
            return Err(SyncError::Rejected(response.rejection(endpoint)));
        }
        let remote: Vec<RemoteNamedEntity> =
            serde_json::from_value(response.body).map_err(crate::transport::TransportError::from)?;
        Ok(remote.into_iter().map(|e| (e.name, e.id)).collect())
    }

    fn known_names(types: &HashMap<String, IssueTypeInfo>) -> Vec<String> {
        let mut names: Vec<String> = types.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HierarchyLevel;
    use crate::transport::ScriptedTracker;
    use reqwest::Method;
    use serde_json::json;

    fn standard_types() -> serde_json::Value {
        json!([
            { "id": "10010", "name": "Epic", "hierarchyLevel": 1, "subtask": false },
            { "id": "10001", "name": "Task", "hierarchyLevel": 0, "subtask": false },
            { "id": "10002", "name": "Sub-task", "hierarchyLevel": -1, "subtask": true }
        ])
    }

    fn standard_fields() -> serde_json::Value {
        json!([
            { "id": "summary", "name": "Summary", "custom": false, "schema": { "type": "string" } },
            { "id": "priority", "name": "Priority", "custom": false },
            { "id": "customfield_10014", "name": "Epic Link", "custom": true },
            { "id": "customfield_10016", "name": "Story Points", "custom": true,
              "schema": { "type": "number" } }
        ])
    }

    #[tokio::test]
    async fn test_issue_type_lookup_by_name() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "issuetype", 200, standard_types());
        let mut resolver = MetadataResolver::new("RS");

        let id = resolver.issue_type_id(&api, "epic").await.unwrap();
        assert_eq!(id, "10010");
    }

    #[tokio::test]
    async fn test_issue_type_lookup_by_level() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "issuetype", 200, standard_types());
        let mut resolver = MetadataResolver::new("RS");

        let id = resolver
            .issue_type_for_level(&api, HierarchyLevel::Subtask)
            .await
            .unwrap();
        assert_eq!(id, "10002");
    }

    #[tokio::test]
    async fn test_issue_type_level_falls_back_to_name() {
        // No hierarchyLevel in the payload: name matching must still work.
        let api = ScriptedTracker::new();
        api.respond(
            Method::GET,
            "issuetype",
            200,
            json!([
                { "id": "10001", "name": "Task", "subtask": false },
                { "id": "10010", "name": "Epic", "subtask": false }
            ]),
        );
        let mut resolver = MetadataResolver::new("RS");

        let id = resolver
            .issue_type_for_level(&api, HierarchyLevel::Epic)
            .await
            .unwrap();
        assert_eq!(id, "10010");
    }

    #[tokio::test]
    async fn test_unknown_issue_type_lists_known() {
        let api = ScriptedTracker::new();
        api.respond(
            Method::GET,
            "issuetype",
            200,
            json!([{ "id": "10001", "name": "Task", "hierarchyLevel": 0 }]),
        );
        let mut resolver = MetadataResolver::new("RS");

        let err = resolver.issue_type_id(&api, "Epic").await.unwrap_err();
        match err {
            SyncError::UnknownIssueType { name, known } => {
                assert_eq!(name, "Epic");
                assert_eq!(known, vec!["Task"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "issuetype", 200, standard_types());
        let mut resolver = MetadataResolver::new("RS");

        resolver.issue_type_id(&api, "Task").await.unwrap();
        resolver.issue_type_id(&api, "Epic").await.unwrap();
        resolver
            .issue_type_for_level(&api, HierarchyLevel::Task)
            .await
            .unwrap();

        assert_eq!(api.call_count(Method::GET, "issuetype"), 1);
    }

    #[tokio::test]
    async fn test_missing_field_is_none_not_error() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "field", 200, standard_fields());
        let mut resolver = MetadataResolver::new("RS");

        assert_eq!(
            resolver.field_id(&api, "Story Points").await.unwrap(),
            Some("customfield_10016".to_string())
        );
        assert_eq!(resolver.field_id(&api, "Start date").await.unwrap(), None);
        assert_eq!(api.call_count(Method::GET, "field"), 1);
    }

    #[tokio::test]
    async fn test_has_field_checks_ids() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "field", 200, standard_fields());
        let mut resolver = MetadataResolver::new("RS");

        assert!(resolver.has_field(&api, "priority").await.unwrap());
        assert!(!resolver.has_field(&api, "duedate").await.unwrap());
    }

    #[tokio::test]
    async fn test_epic_link_resolved_by_name() {
        let api = ScriptedTracker::new();
        api.respond(
            Method::GET,
            "field",
            200,
            json!([{ "id": "customfield_20099", "name": "Epic Link", "custom": true }]),
        );
        let mut resolver = MetadataResolver::new("RS");

        let id = resolver.epic_link_field(&api).await.unwrap();
        assert_eq!(id, "customfield_20099");
    }

    #[tokio::test]
    async fn test_epic_link_falls_back_to_default() {
        let api = ScriptedTracker::new();
        api.respond(Method::GET, "field", 200, json!([]));
        let mut resolver = MetadataResolver::new("RS");

        let id = resolver.epic_link_field(&api).await.unwrap();
        assert_eq!(id, DEFAULT_EPIC_LINK_FIELD);
    }

    #[tokio::test]
    async fn test_component_lookup_and_insert() {
        let api = ScriptedTracker::new();
        api.respond(
            Method::GET,
            "project/RS/components",
            200,
            json!([{ "id": "30001", "name": "Backend" }]),
        );
        let mut resolver = MetadataResolver::new("RS");

        assert_eq!(
            resolver.component_id(&api, "Backend").await.unwrap(),
            Some("30001".to_string())
        );
        assert_eq!(resolver.component_id(&api, "Frontend").await.unwrap(), None);

        resolver.insert_component("Frontend", "30002");
        assert_eq!(
            resolver.component_id(&api, "Frontend").await.unwrap(),
            Some("30002".to_string())
        );
        assert_eq!(api.call_count(Method::GET, "project/RS/components"), 1);
    }

    #[tokio::test]
    async fn test_catalog_rejection_is_fatal() {
        let api = ScriptedTracker::new();
        api.respond(
            Method::GET,
            "issuetype",
            403,
            json!({ "errorMessages": ["forbidden"] }),
        );
        let mut resolver = MetadataResolver::new("RS");

        let err = resolver.issue_type_id(&api, "Task").await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected(_)));
    }
}
