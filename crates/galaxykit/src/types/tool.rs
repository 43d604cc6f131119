//! Galaxy tools.

use declarative::{FieldTable, Model, Record, field_table};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A tool available in Galaxy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tool {
    pub id: String,
    /// Tool shed guid, `<shed>/repos/<owner>/<repo>/<tool>/<version>`
    pub guid: Option<String>,
    pub name: String,
    pub version: String,
    pub description: String,
    pub config_file: Option<String>,
    pub min_width: Option<i64>,
    pub target: Option<String>,
    pub link: Option<String>,
    pub panel_section_id: Option<String>,
    pub panel_section_name: Option<String>,
    pub form_style: Option<String>,
    pub edam_topics: Vec<String>,
    pub edam_operations: Vec<String>,
    pub labels: Vec<String>,
    pub xrefs: serde_json::Value,
}

impl Record for Tool {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<Tool>> = LazyLock::new(|| {
            field_table!(Tool {
                "id" => id: String,
                "guid" => guid: Option<String>,
                "name" => name: String,
                "version" => version: String,
                "description" => description: String,
                "config_file" => config_file: Option<String>,
                "min_width" => min_width: Option<i64>,
                "target" => target: Option<String>,
                "link" => link: Option<String>,
                "panel_section_id" => panel_section_id: Option<String>,
                "panel_section_name" => panel_section_name: Option<String>,
                "form_style" => form_style: Option<String>,
                "edam_topics" => edam_topics: Vec<String>,
                "edam_operations" => edam_operations: Vec<String>,
                "labels" => labels: Vec<String>,
                "xrefs" => xrefs: serde_json::Value,
            })
        });
        &TABLE
    }
}

impl Model for Tool {
    const KIND: &'static str = "tool";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

impl Tool {
    /// Whether this tool was installed from the given repository
    pub fn belongs_to(&self, tool_shed: &str, owner: &str, name: &str) -> bool {
        let Some(guid) = &self.guid else {
            return false;
        };
        let shed = tool_shed
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        guid.starts_with(&format!("{shed}/repos/{owner}/{name}/"))
    }
}
