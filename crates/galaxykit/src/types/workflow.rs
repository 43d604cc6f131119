//! Stored workflows.

use declarative::{FieldTable, Model, Record, field_table};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A workflow stored in a user's workflow list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredWorkflow {
    pub id: String,
    pub name: String,
    pub annotation: Option<String>,
    pub tags: Vec<String>,
    pub owner: String,
    pub url: String,
    pub deleted: bool,
    pub published: bool,
    pub importable: bool,
    pub show_in_tool_panel: bool,
    pub latest_workflow_uuid: String,
    pub number_of_steps: i64,
    pub version: i64,
    pub model_class: String,
    pub inputs: serde_json::Value,
    pub steps: serde_json::Value,
    /// Workflow document (`.ga` JSON). Write-only.
    #[serde(skip)]
    pub json: String,
}

impl Record for StoredWorkflow {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<StoredWorkflow>> = LazyLock::new(|| {
            field_table!(StoredWorkflow {
                "id" => id: String,
                "name" => name: String,
                "annotation" => annotation: Option<String>,
                "tags" => tags: Vec<String>,
                "owner" => owner: String,
                "url" => url: String,
                "deleted" => deleted: bool,
                "published" => published: bool,
                "importable" => importable: bool,
                "show_in_tool_panel" => show_in_tool_panel: bool,
                "latest_workflow_uuid" => latest_workflow_uuid: String,
                "number_of_steps" => number_of_steps: i64,
                "version" => version: i64,
                "model_class" => model_class: String,
                "inputs" => inputs: serde_json::Value,
                "steps" => steps: serde_json::Value,
                "json" => json: String,
            })
        });
        &TABLE
    }
}

impl Model for StoredWorkflow {
    const KIND: &'static str = "stored_workflow";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Parameters for importing a workflow document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowParams {
    pub json: String,
    pub import_tools: bool,
    pub publish: bool,
    pub importable: bool,
}
