//! Galaxy quotas.

use super::user::{Group, User};
use declarative::{FieldTable, Model, Record, field_table};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// How a quota amount combines with others applying to the same user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaOperation {
    #[default]
    #[serde(rename = "=")]
    SetTo,
    #[serde(rename = "+")]
    IncreaseBy,
    #[serde(rename = "-")]
    DecreaseBy,
}

impl QuotaOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetTo => "=",
            Self::IncreaseBy => "+",
            Self::DecreaseBy => "-",
        }
    }
}

impl FromStr for QuotaOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Self::SetTo),
            "+" => Ok(Self::IncreaseBy),
            "-" => Ok(Self::DecreaseBy),
            other => Err(format!("invalid operation {other}")),
        }
    }
}

impl fmt::Display for QuotaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class of users a quota applies to by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultFor {
    #[default]
    No,
    Registered,
    Unregistered,
}

impl DefaultFor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
        }
    }
}

impl FromStr for DefaultFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "registered" => Ok(Self::Registered),
            "unregistered" => Ok(Self::Unregistered),
            other => Err(format!("invalid default users value {other}")),
        }
    }
}

impl fmt::Display for DefaultFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A disk quota
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quota {
    pub id: String,
    pub name: String,
    pub description: String,
    pub operation: String,
    /// Requested amount, e.g. `"10 GB"` or `"unlimited"`. Write-only.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub amount: String,
    pub display_amount: String,
    pub bytes: i64,
    #[serde(deserialize_with = "default_for_from_wire")]
    pub default: String,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
}

impl Record for Quota {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<Quota>> = LazyLock::new(|| {
            field_table!(Quota {
                "id" => id: String,
                "name" => name: String,
                "description" => description: String,
                "operation" => operation: String,
                "amount" => amount: String,
                "display_amount" => display_amount: String,
                "bytes" => bytes: i64,
                "default" => default: String,
                "users" => users: Vec<User>,
                "groups" => groups: Vec<Group>,
            })
        });
        &TABLE
    }
}

impl Model for Quota {
    const KIND: &'static str = "quota";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Galaxy reports defaults as `[{"type": "registered", ..}]`; an empty list
/// means the quota is not a default.
fn default_for_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let wire = serde_json::Value::deserialize(deserializer)?;
    let kind = match &wire {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("type"))
            .and_then(serde_json::Value::as_str),
        _ => None,
    };
    Ok(kind.unwrap_or(DefaultFor::No.as_str()).to_string())
}

/// Parameters for creating a quota
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotaParams {
    pub name: String,
    pub description: String,
    pub amount: String,
    pub operation: QuotaOperation,
    pub default: DefaultFor,
    pub in_users: Vec<String>,
    pub in_groups: Vec<String>,
}

impl QuotaParams {
    /// Apply these parameters to an existing quota
    pub fn apply_to(&self, quota: &mut Quota) {
        quota.name = self.name.clone();
        quota.description = self.description.clone();
        quota.amount = self.amount.clone();
        quota.operation = self.operation.to_string();
        quota.default = self.default.to_string();
        quota.users = self.in_users.iter().map(User::with_id).collect();
        quota.groups = self.in_groups.iter().map(Group::with_id).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_round_trip() {
        for op in ["=", "+", "-"] {
            assert_eq!(op.parse::<QuotaOperation>().unwrap().as_str(), op);
        }
        assert!("*".parse::<QuotaOperation>().is_err());
    }

    #[test]
    fn test_default_for_parse() {
        assert_eq!("registered".parse::<DefaultFor>(), Ok(DefaultFor::Registered));
        assert_eq!(
            "everyone".parse::<DefaultFor>(),
            Err("invalid default users value everyone".to_string())
        );
    }

    #[test]
    fn test_default_from_wire_list() {
        let quota: Quota = serde_json::from_value(serde_json::json!({
            "id": "q1",
            "name": "big",
            "default": [{"type": "unregistered", "model_class": "DefaultQuotaAssociation"}],
        }))
        .unwrap();
        assert_eq!(quota.default, "unregistered");

        let quota: Quota =
            serde_json::from_value(serde_json::json!({"id": "q2", "default": []})).unwrap();
        assert_eq!(quota.default, "no");
    }

    #[test]
    fn test_params_apply_to_replaces_associations() {
        let mut quota = Quota {
            name: "stale".into(),
            users: vec![User::with_id("old")],
            ..Quota::default()
        };
        let params = QuotaParams {
            name: "fresh".into(),
            description: "d".into(),
            amount: "1 GB".into(),
            operation: QuotaOperation::IncreaseBy,
            default: DefaultFor::Registered,
            in_users: vec!["u1".into(), "u2".into()],
            in_groups: vec!["g1".into()],
        };
        params.apply_to(&mut quota);
        assert_eq!(quota.name, "fresh");
        assert_eq!(quota.operation, "+");
        assert_eq!(quota.default, "registered");
        let users: Vec<_> = quota.users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(quota.groups[0].id, "g1");
    }
}
