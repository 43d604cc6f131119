//! Read-only data sources
//!
//! Data sources only ever read: they fill a store from Galaxy (or from a
//! workflow document) and bind it to an identity, but never change anything
//! remotely.

use crate::controller::{remote_error, required_str, set_attr};
use declarative::{
    AttrKind, AttributeStore, Diagnostic, Diagnostics, Model, OmitSet, Schema, Value, project,
    record_to_value, schema_for,
};
use galaxykit::backend::{Accessor, ListQuery};
use galaxykit::{Repository, RepositoryRef, Tool};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Tool ids of shed-installed tools: `<shed>/repos/<owner>/<name>/<tool>/<version>`
static SHED_TOOL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<shed>[^/]+)/repos/(?P<owner>[^/]+)/(?P<name>[^/]+)/[^/]+/[^/]+$")
        .expect("shed tool id pattern compiles")
});

/// A read-only view of Galaxy
pub trait DataSource: Send + Sync {
    fn kind(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    fn read(&self, store: &mut dyn AttributeStore) -> Diagnostics;
}

// =============================================================================
// Tool
// =============================================================================

static TOOL_SCHEMA: LazyLock<Arc<Schema>> =
    LazyLock::new(|| Arc::new(schema_for::<Tool>(&OmitSet::new())));

/// A single tool, looked up by the store's identity
pub struct ToolSource<A> {
    tools: A,
}

impl<A: Accessor<Tool>> ToolSource<A> {
    pub fn new(tools: A) -> Self {
        Self { tools }
    }
}

impl<A: Accessor<Tool>> DataSource for ToolSource<A> {
    fn kind(&self) -> &'static str {
        Tool::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&TOOL_SCHEMA)
    }

    fn read(&self, store: &mut dyn AttributeStore) -> Diagnostics {
        if store.id().is_empty() {
            return Diagnostic::error("tool id is required").at("id").into();
        }
        match self.tools.get(store.id()) {
            Ok(tool) => project(&tool, store, &OmitSet::new()),
            Err(e) => remote_error(&e).into(),
        }
    }
}

// =============================================================================
// Installed repositories
// =============================================================================

static REPOSITORIES_SCHEMA: LazyLock<Arc<Schema>> =
    LazyLock::new(|| Arc::new(Schema::new().attr("repos", AttrKind::List)));

/// Every repository installed into Galaxy
pub struct ToolRepositoriesSource<A> {
    repositories: A,
}

impl<A: Accessor<Repository>> ToolRepositoriesSource<A> {
    pub fn new(repositories: A) -> Self {
        Self { repositories }
    }
}

impl<A: Accessor<Repository>> DataSource for ToolRepositoriesSource<A> {
    fn kind(&self) -> &'static str {
        "tool_repositories"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&REPOSITORIES_SCHEMA)
    }

    fn read(&self, store: &mut dyn AttributeStore) -> Diagnostics {
        let installed = match self.repositories.list(&ListQuery::new()) {
            Ok(installed) => installed,
            Err(e) => return remote_error(&e).into(),
        };
        let refs: Vec<RepositoryRef> = installed.iter().map(Repository::coordinates).collect();
        let diags = set_attr(
            store,
            "repos",
            Value::List(refs.iter().map(record_to_value).collect()),
        );
        store.set_id(&content_id(&refs));
        diags
    }
}

// =============================================================================
// Repositories referenced by a workflow
// =============================================================================

static WORKFLOW_REPOSITORIES_SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(
        Schema::new()
            .attr("json", AttrKind::String)
            .attr("repositories", AttrKind::Set),
    )
});

/// Tool shed repositories a workflow document needs. No remote calls.
#[derive(Debug, Default)]
pub struct WorkflowRepositoriesSource;

impl DataSource for WorkflowRepositoriesSource {
    fn kind(&self) -> &'static str {
        "workflow_repositories"
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&WORKFLOW_REPOSITORIES_SCHEMA)
    }

    fn read(&self, store: &mut dyn AttributeStore) -> Diagnostics {
        let json = match required_str(store, "json") {
            Ok(json) => json,
            Err(e) => return e.into(),
        };
        let repositories = match workflow_repositories(&json) {
            Ok(repositories) => repositories,
            Err(diag) => return diag.into(),
        };
        let diags = set_attr(
            store,
            "repositories",
            Value::set(repositories.iter().map(record_to_value)),
        );
        store.set_id(&blake3::hash(json.as_bytes()).to_hex().to_string());
        diags
    }
}

/// Distinct repositories referenced by the steps of `json`, subworkflows
/// included, in first-seen order
pub fn workflow_repositories(json: &str) -> Result<Vec<RepositoryRef>, Diagnostic> {
    let document: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        Diagnostic::error("workflow JSON is not valid")
            .with_detail(e.to_string())
            .at("json")
    })?;

    let mut found = Vec::new();
    collect_step_repositories(&document, &mut found);
    Ok(found)
}

fn collect_step_repositories(workflow: &serde_json::Value, found: &mut Vec<RepositoryRef>) {
    let Some(steps) = workflow.get("steps").and_then(serde_json::Value::as_object) else {
        return;
    };
    for step in steps.values() {
        if let Some(subworkflow) = step.get("subworkflow") {
            collect_step_repositories(subworkflow, found);
        }
        let repository = step
            .get("tool_shed_repository")
            .and_then(shed_repository_block)
            .or_else(|| {
                step.get("tool_id")
                    .and_then(serde_json::Value::as_str)
                    .and_then(parse_shed_tool_id)
            });
        if let Some(repository) = repository
            && !found.contains(&repository)
        {
            found.push(repository);
        }
    }
}

fn shed_repository_block(block: &serde_json::Value) -> Option<RepositoryRef> {
    let field = |name: &str| {
        block
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };
    Some(RepositoryRef {
        name: field("name")?,
        tool_shed: field("tool_shed")?,
        owner: field("owner")?,
        changeset_revision: field("changeset_revision").unwrap_or_default(),
    })
}

fn parse_shed_tool_id(tool_id: &str) -> Option<RepositoryRef> {
    let captures = SHED_TOOL_ID.captures(tool_id)?;
    Some(RepositoryRef {
        name: captures["name"].to_string(),
        tool_shed: captures["shed"].to_string(),
        owner: captures["owner"].to_string(),
        changeset_revision: String::new(),
    })
}

/// Stable identity for a list of repositories
fn content_id(refs: &[RepositoryRef]) -> String {
    let mut hasher = blake3::Hasher::new();
    for r in refs {
        hasher.update(r.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::MemoryStore;
    use galaxykit::backend::MockAccessor;

    const WORKFLOW: &str = r#"{
        "a_galaxy_workflow": "true",
        "steps": {
            "0": {"id": 0, "type": "data_input", "tool_id": null},
            "1": {
                "id": 1,
                "tool_id": "toolshed.g2.bx.psu.edu/repos/devteam/fastqc/fastqc/0.73",
                "tool_shed_repository": {
                    "name": "fastqc",
                    "owner": "devteam",
                    "tool_shed": "toolshed.g2.bx.psu.edu",
                    "changeset_revision": "e7b2202befea"
                }
            },
            "2": {"id": 2, "tool_id": "toolshed.g2.bx.psu.edu/repos/iuc/multiqc/multiqc/1.11"},
            "3": {"id": 3, "tool_id": "cat1"},
            "4": {
                "id": 4,
                "type": "subworkflow",
                "subworkflow": {
                    "steps": {
                        "0": {"tool_id": "toolshed.g2.bx.psu.edu/repos/iuc/multiqc/multiqc/1.11"},
                        "1": {"tool_id": "toolshed.g2.bx.psu.edu/repos/devteam/bwa/bwa_mem/0.7.17.1"}
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_workflow_repositories_are_distinct_and_ordered() {
        let repos = workflow_repositories(WORKFLOW).unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["fastqc", "multiqc", "bwa"]);
        assert_eq!(repos[0].changeset_revision, "e7b2202befea");
        assert_eq!(repos[1].owner, "iuc");
        assert_eq!(repos[1].changeset_revision, "");
    }

    #[test]
    fn test_parse_shed_tool_id() {
        let bwa = parse_shed_tool_id("toolshed.g2.bx.psu.edu/repos/devteam/bwa/bwa_mem/0.7.17.1")
            .unwrap();
        assert_eq!(bwa.tool_shed, "toolshed.g2.bx.psu.edu");
        assert_eq!(bwa.owner, "devteam");
        assert_eq!(bwa.name, "bwa");
        assert!(parse_shed_tool_id("cat1").is_none());
        assert!(parse_shed_tool_id("toolshed.g2.bx.psu.edu/repos/devteam/bwa").is_none());
    }

    #[test]
    fn test_workflow_repositories_rejects_bad_json() {
        let err = workflow_repositories("{not json").unwrap_err();
        assert_eq!(err.path.as_deref(), Some("json"));
    }

    #[test]
    fn test_workflow_source_id_is_stable_content_hash() {
        let source = WorkflowRepositoriesSource;
        let read = |json: &str| {
            let mut store = MemoryStore::with_schema(source.schema());
            store.set("json", Value::from(json)).unwrap();
            assert!(source.read(&mut store).is_empty());
            store
        };
        let first = read(WORKFLOW);
        let again = read(WORKFLOW);
        let other = read(r#"{"steps": {}}"#);

        assert_eq!(first.id(), again.id());
        assert_ne!(first.id(), other.id());
        assert_eq!(first.id().len(), 64);
        assert!(first.id().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first.get_items("repositories").unwrap().len(), 3);
        assert_eq!(other.get_items("repositories"), Some(&[][..]));
    }

    #[test]
    fn test_tool_source_projects_tool() {
        let tools: MockAccessor<Tool, ()> = MockAccessor::new();
        tools.insert(Tool {
            id: "cat1".into(),
            name: "Concatenate datasets".into(),
            version: "1.0.0".into(),
            ..Tool::default()
        });
        let source = ToolSource::new(tools);
        let mut store = MemoryStore::with_schema(source.schema());
        store.set_id("cat1");

        let diags = source.read(&mut store);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(store.get_str("name"), Some("Concatenate datasets"));
        assert_eq!(store.get("guid"), None);
    }

    #[test]
    fn test_tool_source_requires_id() {
        let tools: MockAccessor<Tool, ()> = MockAccessor::new();
        let source = ToolSource::new(tools.clone());
        let mut store = MemoryStore::new();
        assert!(source.read(&mut store).has_error());
        assert!(tools.calls().is_empty());
    }

    #[test]
    fn test_tool_repositories_lists_coordinates() {
        let repositories: MockAccessor<Repository, ()> = MockAccessor::new();
        for (id, name) in [("r1", "bwa"), ("r2", "fastqc")] {
            repositories.insert(Repository {
                id: id.into(),
                name: name.into(),
                owner: "devteam".into(),
                tool_shed: "toolshed.g2.bx.psu.edu".into(),
                changeset_revision: "abc".into(),
                status: "Installed".into(),
                ..Repository::default()
            });
        }
        let source = ToolRepositoriesSource::new(repositories);
        let mut store = MemoryStore::with_schema(source.schema());

        let diags = source.read(&mut store);
        assert!(diags.is_empty(), "{diags:?}");
        let repos = store.get_items("repos").unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[1].field("name"), Some(&Value::from("fastqc")));
        assert!(repos[1].field("status").is_none());
        assert_eq!(store.id().len(), 64);
    }
}
