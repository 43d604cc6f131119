//! Galaxy users and groups.

use declarative::{FieldTable, Model, Record, field_table, nested_record};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A registered Galaxy user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Only ever sent, Galaxy never returns it
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub quota_percent: Option<i64>,
    pub total_disk_usage: f64,
    pub nice_total_disk_usage: String,
    pub quota: String,
    pub is_admin: bool,
    pub deleted: bool,
    pub purged: bool,
    pub tags_used: Vec<String>,
}

impl Record for User {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<User>> = LazyLock::new(|| {
            field_table!(User {
                "id" => id: String,
                "username" => username: String,
                "email" => email: String,
                "password" => password: String,
                "quota_percent" => quota_percent: Option<i64>,
                "total_disk_usage" => total_disk_usage: f64,
                "nice_total_disk_usage" => nice_total_disk_usage: String,
                "quota" => quota: String,
                "is_admin" => is_admin: bool,
                "deleted" => deleted: bool,
                "purged" => purged: bool,
                "tags_used" => tags_used: Vec<String>,
            })
        });
        &TABLE
    }
}

impl Model for User {
    const KIND: &'static str = "user";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Parameters for creating a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// A Galaxy group, as referenced by quotas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Record for Group {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<Group>> = LazyLock::new(|| {
            field_table!(Group {
                "id" => id: String,
                "name" => name: String,
                "url" => url: String,
            })
        });
        &TABLE
    }
}

impl Model for Group {
    const KIND: &'static str = "group";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

nested_record!(User, Group);

impl User {
    /// A user known only by identity
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl Group {
    /// A group known only by identity
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
