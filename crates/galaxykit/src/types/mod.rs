//! Typed Galaxy entities.
//!
//! Each entity registers a field table so it can be mapped to and from a
//! declarative attribute store.

mod history;
mod job;
mod quota;
mod repository;
mod tool;
mod user;
mod workflow;

pub use history::{History, HistoryParams, HistoryUpdate};
pub use job::{Job, JobParams, JobState};
pub use quota::{DefaultFor, Quota, QuotaOperation, QuotaParams};
pub use repository::{InstallParams, Repository, RepositoryRef, ToolShedStatus};
pub use tool::Tool;
pub use user::{Group, NewUser, User};
pub use workflow::{StoredWorkflow, WorkflowParams};
