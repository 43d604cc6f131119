//! Galaxy histories.

use declarative::{FieldTable, Model, Record, field_table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A history: a named container of datasets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct History {
    pub id: String,
    pub name: String,
    pub annotation: Option<String>,
    pub tags: Vec<String>,
    pub genome_build: Option<String>,
    pub slug: Option<String>,
    pub published: bool,
    pub importable: bool,
    pub create_time: String,
    pub update_time: String,
    pub contents_url: String,
    pub size: i64,
    pub user_id: String,
    pub username_and_slug: Option<String>,
    pub state: String,
    pub state_details: BTreeMap<String, i64>,
    pub state_ids: BTreeMap<String, Vec<String>>,
    pub empty: bool,
    pub deleted: bool,
    pub purged: bool,
    pub url: String,
    pub model_class: String,
}

impl Record for History {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<History>> = LazyLock::new(|| {
            field_table!(History {
                "id" => id: String,
                "name" => name: String,
                "annotation" => annotation: Option<String>,
                "tags" => tags: Vec<String>,
                "genome_build" => genome_build: Option<String>,
                "slug" => slug: Option<String>,
                "published" => published: bool,
                "importable" => importable: bool,
                "create_time" => create_time: String,
                "update_time" => update_time: String,
                "contents_url" => contents_url: String,
                "size" => size: i64,
                "user_id" => user_id: String,
                "username_and_slug" => username_and_slug: Option<String>,
                "state" => state: String,
                "state_details" => state_details: BTreeMap<String, i64>,
                "state_ids" => state_ids: BTreeMap<String, Vec<String>>,
                "empty" => empty: bool,
                "deleted" => deleted: bool,
                "purged" => purged: bool,
                "url" => url: String,
                "model_class" => model_class: String,
            })
        });
        &TABLE
    }
}

impl Model for History {
    const KIND: &'static str = "history";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Parameters for creating a history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryParams {
    pub name: String,
}

/// Attributes Galaxy accepts on `PUT /api/histories/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryUpdate<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<&'a str>,
    pub tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genome_build: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<&'a str>,
    pub published: bool,
    pub importable: bool,
}

impl<'a> From<&'a History> for HistoryUpdate<'a> {
    fn from(history: &'a History) -> Self {
        Self {
            name: &history.name,
            annotation: history.annotation.as_deref(),
            tags: &history.tags,
            genome_build: history.genome_build.as_deref(),
            slug: history.slug.as_deref(),
            published: history.published,
            importable: history.importable,
        }
    }
}
