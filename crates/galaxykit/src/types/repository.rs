//! Installed tool shed repositories.

use declarative::{FieldTable, Model, Record, field_table, nested_record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Update status of an installed repository as reported by its tool shed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolShedStatus {
    pub latest_installable_revision: String,
    pub revision_update: String,
    pub revision_upgrade: String,
    pub repository_deprecated: String,
}

impl Record for ToolShedStatus {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<ToolShedStatus>> = LazyLock::new(|| {
            field_table!(ToolShedStatus {
                "latest_installable_revision" => latest_installable_revision: String,
                "revision_update" => revision_update: String,
                "revision_upgrade" => revision_upgrade: String,
                "repository_deprecated" => repository_deprecated: String,
            })
        });
        &TABLE
    }
}

nested_record!(ToolShedStatus);

/// A tool shed repository installed into Galaxy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub tool_shed: String,
    pub changeset_revision: String,
    pub installed_changeset_revision: String,
    pub ctx_rev: String,
    pub status: String,
    pub error_message: String,
    pub deleted: bool,
    pub uninstalled: bool,
    pub dist_to_shed: bool,
    pub include_datatypes: bool,
    pub url: String,
    pub tool_shed_status: Option<ToolShedStatus>,
}

impl Record for Repository {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<Repository>> = LazyLock::new(|| {
            field_table!(Repository {
                "id" => id: String,
                "name" => name: String,
                "owner" => owner: String,
                "tool_shed" => tool_shed: String,
                "changeset_revision" => changeset_revision: String,
                "installed_changeset_revision" => installed_changeset_revision: String,
                "ctx_rev" => ctx_rev: String,
                "status" => status: String,
                "error_message" => error_message: String,
                "deleted" => deleted: bool,
                "uninstalled" => uninstalled: bool,
                "dist_to_shed" => dist_to_shed: bool,
                "include_datatypes" => include_datatypes: bool,
                "url" => url: String,
                "tool_shed_status" => tool_shed_status: Option<ToolShedStatus>,
            })
        });
        &TABLE
    }
}

impl Model for Repository {
    const KIND: &'static str = "repository";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

impl Repository {
    /// Coordinates of this repository
    pub fn coordinates(&self) -> RepositoryRef {
        RepositoryRef {
            name: self.name.clone(),
            tool_shed: self.tool_shed.clone(),
            owner: self.owner.clone(),
            changeset_revision: self.changeset_revision.clone(),
        }
    }

    /// Same tool shed, owner and name as `other`; revisions are not compared
    pub fn is_same_as(&self, other: &RepositoryRef) -> bool {
        self.tool_shed == other.tool_shed && self.owner == other.owner && self.name == other.name
    }
}

/// Coordinates of a tool shed repository
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryRef {
    pub name: String,
    pub tool_shed: String,
    pub owner: String,
    pub changeset_revision: String,
}

impl Record for RepositoryRef {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<RepositoryRef>> = LazyLock::new(|| {
            field_table!(RepositoryRef {
                "name" => name: String,
                "tool_shed" => tool_shed: String,
                "owner" => owner: String,
                "changeset_revision" => changeset_revision: String,
            })
        });
        &TABLE
    }
}

nested_record!(RepositoryRef);

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tool_shed, self.owner, self.name, self.changeset_revision
        )
    }
}

/// Payload of `POST /api/tool_shed_repositories/new/install_repository_revision`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallParams {
    pub tool_shed_url: String,
    pub owner: String,
    pub name: String,
    pub changeset_revision: String,
    pub install_tool_dependencies: bool,
    pub install_repository_dependencies: bool,
    pub install_resolver_dependencies: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_panel_section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tool_panel_section_label: Option<String>,
}

impl InstallParams {
    /// Coordinates of the requested repository
    pub fn coordinates(&self) -> RepositoryRef {
        RepositoryRef {
            name: self.name.clone(),
            tool_shed: self.tool_shed_url.clone(),
            owner: self.owner.clone(),
            changeset_revision: self.changeset_revision.clone(),
        }
    }
}
