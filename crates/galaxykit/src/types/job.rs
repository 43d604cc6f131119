//! Galaxy jobs and their lifecycle states.

use declarative::{FieldTable, Model, Record, field_table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    New,
    Upload,
    Waiting,
    Queued,
    Running,
    Ok,
    Error,
    Paused,
    Deleted,
    DeletedNew,
}

impl JobState {
    pub const ALL: [Self; 10] = [
        Self::New,
        Self::Upload,
        Self::Waiting,
        Self::Queued,
        Self::Running,
        Self::Ok,
        Self::Error,
        Self::Paused,
        Self::Deleted,
        Self::DeletedNew,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Upload => "upload",
            Self::Waiting => "waiting",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Paused => "paused",
            Self::Deleted => "deleted",
            Self::DeletedNew => "deleted_new",
        }
    }

    /// The job will not change state again
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::New | Self::Upload | Self::Waiting | Self::Queued | Self::Running
        )
    }

    /// Terminal without producing its outputs
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != Self::Ok
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown job state {s}"))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: String,
    pub tool_id: String,
    pub history_id: String,
    pub state: String,
    pub exit_code: Option<i64>,
    pub create_time: String,
    pub update_time: String,
    pub model_class: String,
    pub inputs: serde_json::Value,
    pub outputs: serde_json::Value,
    pub params: serde_json::Value,
}

impl Job {
    /// Parsed state, `None` when Galaxy reports a state this crate does not know
    pub fn job_state(&self) -> Option<JobState> {
        self.state.parse().ok()
    }
}

impl Record for Job {
    fn fields() -> &'static FieldTable<Self> {
        static TABLE: LazyLock<FieldTable<Job>> = LazyLock::new(|| {
            field_table!(Job {
                "id" => id: String,
                "tool_id" => tool_id: String,
                "history_id" => history_id: String,
                "state" => state: String,
                "exit_code" => exit_code: Option<i64>,
                "create_time" => create_time: String,
                "update_time" => update_time: String,
                "model_class" => model_class: String,
                "inputs" => inputs: serde_json::Value,
                "outputs" => outputs: serde_json::Value,
                "params" => params: serde_json::Value,
            })
        });
        &TABLE
    }
}

impl Model for Job {
    const KIND: &'static str = "job";

    fn identity(&self) -> &str {
        &self.id
    }

    fn set_identity(&mut self, id: &str) {
        self.id = id.to_string();
    }
}

/// Payload of `POST /api/tools`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_uuid: Option<String>,
    pub history_id: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
}
