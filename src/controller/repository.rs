//! Installed repository lifecycle
//!
//! Installing one repository may install its dependencies too, and Galaxy
//! returns all of them in one flat list. The requested repository is bound to
//! the resource; the others are recorded under `dependents` and uninstalled
//! along with it.

use super::tree::{Classified, classify, generic_records};
use super::{
    Context, InputError, Lifecycle, delete_with_dependents, fetch, optional_str, record_ids,
    remote_error, required_str, set_attr,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostic, Diagnostics, Model, OmitSet, Schema, Value, project,
    schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions, RepositoryTools};
use galaxykit::{InstallParams, Repository, RepositoryRef, Tool};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

const STATUS_FIELDS: [&str; 4] = [
    "latest_installable_revision",
    "revision_update",
    "revision_upgrade",
    "repository_deprecated",
];

static OMIT: LazyLock<OmitSet> = LazyLock::new(|| OmitSet::both(&["tool_shed_status"]));

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let schema = STATUS_FIELDS
        .into_iter()
        .fold(schema_for::<Repository>(&OMIT), |schema, name| {
            schema.attr(name, AttrKind::String)
        });
    Arc::new(
        schema
            .attr_default("install_tool_dependencies", AttrKind::Bool, false)
            .attr_default("install_repository_dependencies", AttrKind::Bool, false)
            .attr_default("install_resolver_dependencies", AttrKind::Bool, false)
            .attr("tool_panel_section_id", AttrKind::String)
            .attr("new_tool_panel_section_label", AttrKind::String)
            .attr_default("remove_from_disk", AttrKind::Bool, true)
            .attr("tools", AttrKind::Set)
            .attr("dependents", AttrKind::List),
    )
});

pub struct RepositoryLifecycle<A> {
    repositories: A,
}

impl<A> RepositoryLifecycle<A>
where
    A: Accessor<Repository, Params = InstallParams> + RepositoryTools,
{
    pub fn new(repositories: A) -> Self {
        Self { repositories }
    }

    /// Project `repository` with its flattened shed status and tool list
    fn attach(&self, repository: &Repository, store: &mut dyn AttributeStore) -> Diagnostics {
        let mut diags = project(repository, store, &OMIT);

        let status = repository.tool_shed_status.clone().unwrap_or_default();
        let values = [
            status.latest_installable_revision,
            status.revision_update,
            status.revision_upgrade,
            status.repository_deprecated,
        ];
        for (name, value) in STATUS_FIELDS.into_iter().zip(values) {
            diags.append(set_attr(store, name, Value::from(value)));
        }

        match self.repositories.repository_tools(repository) {
            Ok(tools) => {
                let tools = Value::set(tools.iter().map(tool_record));
                diags.append(set_attr(store, "tools", tools));
            }
            Err(e) => diags.push(
                Diagnostic::error("cannot list repository tools")
                    .with_detail(e.to_string())
                    .at("tools"),
            ),
        }
        diags
    }
}

fn install_params(store: &dyn AttributeStore) -> Result<InstallParams, InputError> {
    let tool_panel_section_id = optional_str(store, "tool_panel_section_id");
    let new_tool_panel_section_label = optional_str(store, "new_tool_panel_section_label");
    if tool_panel_section_id.is_some() && new_tool_panel_section_label.is_some() {
        return Err(InputError::Conflicting(
            "tool_panel_section_id",
            "new_tool_panel_section_label",
        ));
    }
    let flag = |name: &str| store.get_bool(name).unwrap_or(false);

    Ok(InstallParams {
        tool_shed_url: required_str(store, "tool_shed")?,
        owner: required_str(store, "owner")?,
        name: required_str(store, "name")?,
        changeset_revision: required_str(store, "changeset_revision")?,
        install_tool_dependencies: flag("install_tool_dependencies"),
        install_repository_dependencies: flag("install_repository_dependencies"),
        install_resolver_dependencies: flag("install_resolver_dependencies"),
        tool_panel_section_id,
        new_tool_panel_section_label,
    })
}

/// Host part of a tool shed URL; Galaxy reports sheds without scheme
fn shed_host(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

fn is_requested(repository: &Repository, wanted: &RepositoryRef) -> bool {
    shed_host(&repository.tool_shed) == shed_host(&wanted.tool_shed)
        && repository.owner == wanted.owner
        && repository.name == wanted.name
}

fn tool_record(tool: &Tool) -> Value {
    let fields = [
        ("tool_id", tool.id.clone()),
        ("tool_guid", tool.guid.clone().unwrap_or_default()),
        ("name", tool.name.clone()),
        ("version", tool.version.clone()),
        ("description", tool.description.clone()),
        ("config_file", tool.config_file.clone().unwrap_or_default()),
    ];
    Value::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect::<BTreeMap<_, _>>(),
    )
}

impl<A> Lifecycle for RepositoryLifecycle<A>
where
    A: Accessor<Repository, Params = InstallParams> + RepositoryTools,
{
    fn kind(&self) -> &'static str {
        Repository::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    fn create(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let params = match install_params(store) {
            Ok(params) => params,
            Err(e) => return e.into(),
        };
        let wanted = params.coordinates();
        let installed = match self.repositories.create(&params) {
            Ok(installed) => installed,
            Err(e) => return remote_error(&e).into(),
        };
        if installed.is_empty() {
            return Diagnostics::error(format!("repository {wanted} already installed"));
        }
        log::info!("Installed {wanted} with {} repositories", installed.len());

        let ids: Vec<String> = installed.iter().map(|r| r.id.clone()).collect();
        let Classified {
            primary,
            dependents,
        } = match classify(installed, |r| is_requested(r, &wanted)) {
            Ok(classified) => classified,
            Err(matches) => {
                return Diagnostic::error(format!(
                    "expected one installed repository matching {wanted}, found {matches}"
                ))
                .with_detail(format!("repository ids: {}", ids.join(", ")))
                .into();
            }
        };

        let mut diags = self.attach(&primary, store);
        let (records, record_diags) = generic_records(&dependents, &["tool_shed_status"]);
        diags.append(record_diags);
        diags.append(set_attr(store, "dependents", Value::List(records)));
        diags
    }

    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        match fetch::<Repository, A>(&self.repositories, store) {
            Ok(repository) => self.attach(&repository, store),
            Err(diags) => diags,
        }
    }

    /// Every managed attribute forces a reinstall
    fn update(&self, _ctx: &Context, _store: &mut dyn AttributeStore) -> Diagnostics {
        Diagnostics::new()
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let options = DeleteOptions::default()
            .remove_from_disk(store.get_bool("remove_from_disk").unwrap_or(true));
        let dependents = record_ids(store, "dependents");
        delete_with_dependents::<Repository, _>(
            &self.repositories,
            store.id(),
            &dependents,
            &options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::MemoryStore;
    use galaxykit::backend::{Call, MockAccessor, Op};
    use galaxykit::{Error, ToolShedStatus};

    type Repositories = MockAccessor<Repository, InstallParams>;

    const SHED: &str = "toolshed.g2.bx.psu.edu";

    fn repo(id: &str, owner: &str, name: &str) -> Repository {
        Repository {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
            tool_shed: SHED.into(),
            changeset_revision: "3fe632431b68".into(),
            status: "Installed".into(),
            ..Repository::default()
        }
    }

    fn desired() -> MemoryStore {
        let mut store = MemoryStore::with_schema(Arc::clone(&SCHEMA));
        store.set("tool_shed", Value::from("https://toolshed.g2.bx.psu.edu/")).unwrap();
        store.set("owner", Value::from("devteam")).unwrap();
        store.set("name", Value::from("bwa")).unwrap();
        store.set("changeset_revision", Value::from("3fe632431b68")).unwrap();
        store
    }

    fn five_installed() -> Vec<Repository> {
        let mut primary = repo("p", "devteam", "bwa");
        primary.tool_shed_status = Some(ToolShedStatus {
            latest_installable_revision: "True".into(),
            revision_update: "False".into(),
            revision_upgrade: "False".into(),
            repository_deprecated: "False".into(),
        });
        vec![
            repo("d1", "devteam", "samtools"),
            repo("d2", "iuc", "package_zlib"),
            primary,
            repo("d3", "iuc", "package_bzip2"),
            repo("d4", "devteam", "picard"),
        ]
    }

    #[test]
    fn test_create_binds_requested_repository_and_records_dependents() {
        let repositories = Repositories::new();
        repositories.push_create(Ok(five_installed()));
        repositories.set_tools(
            "p",
            vec![Tool {
                id: "bwa_mem".into(),
                guid: Some(format!("{SHED}/repos/devteam/bwa/bwa_mem/0.7.17.1")),
                name: "Map with BWA-MEM".into(),
                version: "0.7.17.1".into(),
                ..Tool::default()
            }],
        );
        let lifecycle = RepositoryLifecycle::new(repositories.clone());
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert!(diags.is_empty(), "{diags:?}");

        assert_eq!(store.id(), "p");
        assert_eq!(record_ids(&store, "dependents"), vec!["d1", "d2", "d3", "d4"]);
        assert_eq!(store.get_str("latest_installable_revision"), Some("True"));
        assert_eq!(store.get_str("repository_deprecated"), Some("False"));
        assert_eq!(store.get_str("status"), Some("Installed"));

        let tools = store.get_items("tools").unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].field("tool_id"), Some(&Value::from("bwa_mem")));
        assert_eq!(tools[0].field("config_file"), Some(&Value::from("")));

        let sent = &repositories.created_with()[0];
        assert_eq!(sent.tool_shed_url, "https://toolshed.g2.bx.psu.edu/");
        assert!(!sent.install_tool_dependencies);
    }

    #[test]
    fn test_already_installed_is_an_error() {
        let repositories = Repositories::new();
        repositories.push_create(Ok(Vec::new()));
        let lifecycle = RepositoryLifecycle::new(repositories);
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        let error = diags.errors().next().unwrap();
        assert!(error.summary.contains("already installed"));
        assert!(error.summary.contains("devteam/bwa/3fe632431b68"));
        assert_eq!(store.id(), "");
    }

    #[test]
    fn test_ambiguous_result_names_match_count() {
        let repositories = Repositories::new();
        repositories.push_create(Ok(vec![
            repo("a", "devteam", "bwa"),
            repo("b", "iuc", "samtools"),
            repo("c", "devteam", "bwa"),
        ]));
        let lifecycle = RepositoryLifecycle::new(repositories);
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        let error = diags.errors().next().unwrap();
        assert!(error.summary.ends_with("found 2"), "{}", error.summary);
        assert_eq!(error.detail.as_deref(), Some("repository ids: a, b, c"));
        assert_eq!(store.id(), "");
    }

    #[test]
    fn test_no_matching_repository_names_zero() {
        let repositories = Repositories::new();
        repositories.push_create(Ok(vec![repo("a", "iuc", "samtools")]));
        let lifecycle = RepositoryLifecycle::new(repositories);
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert!(diags.errors().next().unwrap().summary.ends_with("found 0"));
    }

    #[test]
    fn test_section_id_and_label_conflict() {
        let repositories = Repositories::new();
        let lifecycle = RepositoryLifecycle::new(repositories.clone());
        let mut store = desired();
        store.set("tool_panel_section_id", Value::from("mapping")).unwrap();
        store
            .set("new_tool_panel_section_label", Value::from("Mapping"))
            .unwrap();

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert_eq!(
            diags.errors().next().unwrap().path.as_deref(),
            Some("tool_panel_section_id")
        );
        assert!(repositories.calls().is_empty());
    }

    #[test]
    fn test_read_flattens_missing_status_to_empty() {
        let repositories = Repositories::new();
        repositories.insert(repo("p", "devteam", "bwa"));
        let lifecycle = RepositoryLifecycle::new(repositories);
        let mut store = desired();
        store.set_id("p");

        let diags = lifecycle.read(&Context::default(), &mut store);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(store.get_str("revision_update"), Some(""));
        assert_eq!(store.get_items("tools"), Some(&[][..]));
    }

    #[test]
    fn test_update_makes_no_remote_calls() {
        let repositories = Repositories::new();
        let lifecycle = RepositoryLifecycle::new(repositories.clone());
        let mut store = desired();
        store.set_id("p");

        assert!(lifecycle.update(&Context::default(), &mut store).is_empty());
        assert!(repositories.calls().is_empty());
    }

    #[test]
    fn test_delete_uninstalls_dependents_and_aggregates_failures() {
        let repositories = Repositories::new();
        repositories.push_create(Ok(five_installed()));
        repositories.fail(Op::Delete, "d2", Error::Other("in use".into()));
        let lifecycle = RepositoryLifecycle::new(repositories.clone());
        let mut store = desired();
        assert!(!lifecycle.create(&Context::default(), &mut store).has_error());

        let diags = lifecycle.delete(&Context::default(), &mut store);
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.errors().next().unwrap().resource.as_deref(),
            Some("repository d2")
        );
        let uninstalled: Vec<_> = repositories
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id, options) => {
                    assert!(options.remove_from_disk);
                    Some(id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(uninstalled, vec!["p", "d1", "d2", "d3", "d4"]);
    }
}
