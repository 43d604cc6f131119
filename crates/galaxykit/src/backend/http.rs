//! Galaxy REST API backend.
//!
//! This module provides [`GalaxyBackend`], a blocking client that implements
//! [`Accessor`] for every entity kind. Requests authenticate with an API key
//! sent in the `x-api-key` header.

use super::{Accessor, DeleteOptions, ListQuery, RepositoryTools};
use crate::error::{Error, Result};
use crate::types::{
    History, HistoryParams, HistoryUpdate, InstallParams, Job, JobParams, NewUser, Quota,
    QuotaParams, Repository, StoredWorkflow, Tool, User, WorkflowParams,
};
use declarative::Model;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

/// Repository installs can take a while; Galaxy answers only when done.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Timeout for every other request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Galaxy REST API backend.
///
/// # Example
///
/// ```no_run
/// use galaxykit::backend::Accessor;
/// use galaxykit::backend::http::GalaxyBackend;
/// use galaxykit::History;
///
/// let galaxy = GalaxyBackend::new("https://usegalaxy.example.org", "0123456789abcdef");
/// let history: History = galaxy.get("f2db41e1fa331b3e").unwrap();
/// println!("{}", history.name);
/// ```
#[derive(Clone)]
pub struct GalaxyBackend {
    agent: Agent,
    install_agent: Agent,
    host: String,
    api_key: String,
}

fn agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl GalaxyBackend {
    /// Create a backend for `host` (e.g. `https://usegalaxy.org`).
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent: agent(REQUEST_TIMEOUT),
            install_agent: agent(INSTALL_TIMEOUT),
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Galaxy host URL without trailing slash.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build the URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path.trim_start_matches('/'))
    }

    /// Browser-facing URL of a job, for diagnostics.
    pub fn job_url(&self, id: &str) -> String {
        self.url(&format!("jobs/{id}"))
    }

    /// Query the Galaxy version.
    pub fn version(&self) -> Result<serde_json::Value> {
        let response = self
            .agent
            .get(self.url("version"))
            .header("x-api-key", &self.api_key)
            .call()?;
        read_json(response, "version", "")
    }

    /// Probe the host root. Returns the HTTP status code.
    pub fn probe(&self) -> Result<u16> {
        let response = self.agent.get(&self.host).call()?;
        Ok(response.status().as_u16())
    }

    fn get_json<T: DeserializeOwned>(&self, kind: &str, path: &str, id: &str) -> Result<T> {
        log::debug!("GET {path}");
        let response = self
            .agent
            .get(self.url(path))
            .header("x-api-key", &self.api_key)
            .call()?;
        read_json(response, kind, id)
    }

    fn get_query<T: DeserializeOwned>(
        &self,
        kind: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        log::debug!("GET {path} {query:?}");
        let response = self
            .agent
            .get(self.url(path))
            .header("x-api-key", &self.api_key)
            .query_pairs(query.iter().copied())
            .call()?;
        read_json(response, kind, "")
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        kind: &str,
        path: &str,
        id: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        log::debug!("{method:?} {path}");
        let url = self.url(path);
        let response = match method {
            Method::Post => self.agent.post(url),
            Method::Put => self.agent.put(url),
        }
        .header("x-api-key", &self.api_key)
        .send_json(body)?;
        read_json(response, kind, id)
    }

    fn delete_path(&self, kind: &str, path: &str, id: &str, body: &impl Serialize) -> Result<()> {
        log::debug!("DELETE {path}");
        let response = self
            .agent
            .delete(self.url(path))
            .header("x-api-key", &self.api_key)
            .force_send_body()
            .send_json(body)?;
        check(response, kind, id)
    }

    fn list_filtered<E: Model + DeserializeOwned>(
        &self,
        path: &str,
        deleted_path: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<E>> {
        let mut entities: Vec<E> = if query.wants_live() {
            self.get_json(E::KIND, path, "")?
        } else {
            Vec::new()
        };
        if query.wants_deleted() {
            let deleted: Vec<E> = match deleted_path {
                Some(deleted_path) => self.get_json(E::KIND, deleted_path, "")?,
                None => self.get_query(E::KIND, path, &[("deleted", "true")])?,
            };
            entities.extend(deleted);
        }
        entities.retain(|e| query.matches(e));
        Ok(entities)
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Post,
    Put,
}

fn read_body(mut response: Response<Body>, kind: &str, id: &str) -> Result<String> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    if status >= 400 {
        return Err(Error::from_response(kind, id, status, &body));
    }
    Ok(body)
}

fn read_json<T: DeserializeOwned>(response: Response<Body>, kind: &str, id: &str) -> Result<T> {
    let body = read_body(response, kind, id)?;
    Ok(serde_json::from_str(&body)?)
}

fn check(response: Response<Body>, kind: &str, id: &str) -> Result<()> {
    read_body(response, kind, id).map(|_| ())
}

fn unsupported<T>(kind: &'static str, operation: &'static str) -> Result<T> {
    Err(Error::Unsupported { kind, operation })
}

// =============================================================================
// Users
// =============================================================================

impl Accessor<User> for GalaxyBackend {
    type Params = NewUser;

    fn get(&self, id: &str) -> Result<User> {
        self.get_json(User::KIND, &format!("users/{id}"), id)
    }

    fn create(&self, params: &NewUser) -> Result<Vec<User>> {
        let user: User = self.send_json(Method::Post, User::KIND, "users", "", params)?;
        Ok(vec![user])
    }

    fn update(&self, user: &User) -> Result<User> {
        let path = format!("users/{}", user.id);
        self.send_json(Method::Put, User::KIND, &path, &user.id, user)
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        let body = serde_json::json!({ "purge": options.purge });
        self.delete_path(User::KIND, &format!("users/{id}"), id, &body)
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<User>> {
        self.list_filtered("users", Some("users/deleted"), query)
    }

    fn undelete(&self, user: &User) -> Result<()> {
        let path = format!("users/deleted/{}/undelete", user.id);
        let _: serde_json::Value =
            self.send_json(Method::Post, User::KIND, &path, &user.id, &serde_json::json!({}))?;
        Ok(())
    }
}

// =============================================================================
// Quotas
// =============================================================================

#[derive(Serialize)]
struct QuotaUpdate<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    amount: &'a str,
    operation: &'a str,
    default: &'a str,
    in_users: Vec<&'a str>,
    in_groups: Vec<&'a str>,
}

impl Accessor<Quota> for GalaxyBackend {
    type Params = QuotaParams;

    fn get(&self, id: &str) -> Result<Quota> {
        self.get_json(Quota::KIND, &format!("quotas/{id}"), id)
    }

    fn create(&self, params: &QuotaParams) -> Result<Vec<Quota>> {
        // Galaxy answers with a summary; fetch the full quota.
        let created: serde_json::Value =
            self.send_json(Method::Post, Quota::KIND, "quotas", "", params)?;
        let id = created
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("quota create returned no id".into()))?;
        Ok(vec![Accessor::<Quota>::get(self, id)?])
    }

    fn update(&self, quota: &Quota) -> Result<Quota> {
        let path = format!("quotas/{}", quota.id);
        let body = QuotaUpdate {
            name: &quota.name,
            description: &quota.description,
            amount: &quota.amount,
            operation: &quota.operation,
            default: &quota.default,
            in_users: quota.users.iter().map(|u| u.id.as_str()).collect(),
            in_groups: quota.groups.iter().map(|g| g.id.as_str()).collect(),
        };
        let _: serde_json::Value =
            self.send_json(Method::Put, Quota::KIND, &path, &quota.id, &body)?;
        let mut updated = Accessor::<Quota>::get(self, &quota.id)?;
        updated.amount.clone_from(&quota.amount);
        Ok(updated)
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        let path = format!("quotas/{id}");
        self.delete_path(Quota::KIND, &path, id, &serde_json::json!({}))?;
        if options.purge {
            let path = format!("quotas/deleted/{id}/purge");
            let _: serde_json::Value =
                self.send_json(Method::Post, Quota::KIND, &path, id, &serde_json::json!({}))?;
        }
        Ok(())
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Quota>> {
        self.list_filtered("quotas", Some("quotas/deleted"), query)
    }

    fn undelete(&self, quota: &Quota) -> Result<()> {
        let path = format!("quotas/deleted/{}/undelete", quota.id);
        let _: serde_json::Value = self.send_json(
            Method::Post,
            Quota::KIND,
            &path,
            &quota.id,
            &serde_json::json!({}),
        )?;
        Ok(())
    }
}

// =============================================================================
// Histories
// =============================================================================

impl Accessor<History> for GalaxyBackend {
    type Params = HistoryParams;

    fn get(&self, id: &str) -> Result<History> {
        self.get_json(History::KIND, &format!("histories/{id}"), id)
    }

    fn create(&self, params: &HistoryParams) -> Result<Vec<History>> {
        let history: History =
            self.send_json(Method::Post, History::KIND, "histories", "", params)?;
        Ok(vec![history])
    }

    fn update(&self, history: &History) -> Result<History> {
        let path = format!("histories/{}", history.id);
        let _: serde_json::Value = self.send_json(
            Method::Put,
            History::KIND,
            &path,
            &history.id,
            &HistoryUpdate::from(history),
        )?;
        Accessor::<History>::get(self, &history.id)
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        let body = serde_json::json!({ "purge": options.purge });
        self.delete_path(History::KIND, &format!("histories/{id}"), id, &body)
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<History>> {
        self.list_filtered("histories", Some("histories/deleted"), query)
    }

    fn undelete(&self, history: &History) -> Result<()> {
        let path = format!("histories/deleted/{}/undelete", history.id);
        let _: serde_json::Value = self.send_json(
            Method::Post,
            History::KIND,
            &path,
            &history.id,
            &serde_json::json!({}),
        )?;
        Ok(())
    }
}

// =============================================================================
// Jobs
// =============================================================================

#[derive(serde::Deserialize)]
struct ToolRun {
    #[serde(default)]
    jobs: Vec<Job>,
}

impl Accessor<Job> for GalaxyBackend {
    type Params = JobParams;

    fn get(&self, id: &str) -> Result<Job> {
        self.get_json(Job::KIND, &format!("jobs/{id}?full=true"), id)
    }

    fn create(&self, params: &JobParams) -> Result<Vec<Job>> {
        let run: ToolRun = self.send_json(Method::Post, Job::KIND, "tools", "", params)?;
        Ok(run.jobs)
    }

    fn update(&self, _job: &Job) -> Result<Job> {
        unsupported(Job::KIND, "update")
    }

    fn delete(&self, id: &str, _options: &DeleteOptions) -> Result<()> {
        self.delete_path(Job::KIND, &format!("jobs/{id}"), id, &serde_json::json!({}))
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Job>> {
        self.list_filtered("jobs", None, query)
    }

    fn undelete(&self, _job: &Job) -> Result<()> {
        unsupported(Job::KIND, "undelete")
    }
}

// =============================================================================
// Repositories
// =============================================================================

impl Accessor<Repository> for GalaxyBackend {
    type Params = InstallParams;

    fn get(&self, id: &str) -> Result<Repository> {
        self.get_json(
            Repository::KIND,
            &format!("tool_shed_repositories/{id}"),
            id,
        )
    }

    fn create(&self, params: &InstallParams) -> Result<Vec<Repository>> {
        let path = "tool_shed_repositories/new/install_repository_revision";
        log::debug!("POST {path}");
        let response = self
            .install_agent
            .post(self.url(path))
            .header("x-api-key", &self.api_key)
            .send_json(params)?;
        let body = read_body(response, Repository::KIND, "")?;
        // Already installed repositories yield an empty body or a status document.
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        match parsed {
            serde_json::Value::Array(_) => Ok(serde_json::from_value(parsed)?),
            _ => Ok(Vec::new()),
        }
    }

    fn update(&self, _repository: &Repository) -> Result<Repository> {
        unsupported(Repository::KIND, "update")
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        let path = format!(
            "tool_shed_repositories/{id}?remove_from_disk={}",
            options.remove_from_disk
        );
        self.delete_path(Repository::KIND, &path, id, &serde_json::json!({}))
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Repository>> {
        let mut repos: Vec<Repository> = self.get_query(
            Repository::KIND,
            "tool_shed_repositories",
            &[("deleted", if query.wants_deleted() { "true" } else { "false" })],
        )?;
        repos.retain(|r| query.matches(r) && (r.deleted || query.wants_live()));
        Ok(repos)
    }

    fn undelete(&self, _repository: &Repository) -> Result<()> {
        unsupported(Repository::KIND, "undelete")
    }
}

impl RepositoryTools for GalaxyBackend {
    fn repository_tools(&self, repository: &Repository) -> Result<Vec<Tool>> {
        let tools: Vec<Tool> =
            self.get_query(Tool::KIND, "tools", &[("in_panel", "false")])?;
        Ok(tools
            .into_iter()
            .filter(|t| t.belongs_to(&repository.tool_shed, &repository.owner, &repository.name))
            .collect())
    }
}

// =============================================================================
// Tools (read-only)
// =============================================================================

impl Accessor<Tool> for GalaxyBackend {
    type Params = ();

    fn get(&self, id: &str) -> Result<Tool> {
        self.get_json(Tool::KIND, &format!("tools/{id}"), id)
    }

    fn create(&self, _params: &()) -> Result<Vec<Tool>> {
        unsupported(Tool::KIND, "create")
    }

    fn update(&self, _tool: &Tool) -> Result<Tool> {
        unsupported(Tool::KIND, "update")
    }

    fn delete(&self, _id: &str, _options: &DeleteOptions) -> Result<()> {
        unsupported(Tool::KIND, "delete")
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Tool>> {
        let mut tools: Vec<Tool> = self.get_query(Tool::KIND, "tools", &[("in_panel", "false")])?;
        tools.retain(|t| query.matches(t));
        Ok(tools)
    }

    fn undelete(&self, _tool: &Tool) -> Result<()> {
        unsupported(Tool::KIND, "undelete")
    }
}

// =============================================================================
// Stored workflows
// =============================================================================

fn workflow_document(json: &str) -> Result<serde_json::Value> {
    serde_json::from_str(json)
        .map_err(|e| Error::Other(format!("workflow JSON is not valid: {e}")))
}

impl Accessor<StoredWorkflow> for GalaxyBackend {
    type Params = WorkflowParams;

    fn get(&self, id: &str) -> Result<StoredWorkflow> {
        self.get_json(StoredWorkflow::KIND, &format!("workflows/{id}"), id)
    }

    fn create(&self, params: &WorkflowParams) -> Result<Vec<StoredWorkflow>> {
        let body = serde_json::json!({
            "workflow": workflow_document(&params.json)?,
            "import_tools": params.import_tools,
            "publish": params.publish,
            "importable": params.importable,
        });
        let created: StoredWorkflow =
            self.send_json(Method::Post, StoredWorkflow::KIND, "workflows", "", &body)?;
        // The create response is a summary; fetch the full record.
        Ok(vec![Accessor::<StoredWorkflow>::get(self, &created.id)?])
    }

    fn update(&self, workflow: &StoredWorkflow) -> Result<StoredWorkflow> {
        let path = format!("workflows/{}", workflow.id);
        let mut body = serde_json::json!({
            "name": workflow.name,
            "annotation": workflow.annotation,
            "menu_entry": workflow.show_in_tool_panel,
        });
        if !workflow.json.is_empty() {
            body["workflow"] = workflow_document(&workflow.json)?;
        }
        let _: serde_json::Value = self.send_json(
            Method::Put,
            StoredWorkflow::KIND,
            &path,
            &workflow.id,
            &body,
        )?;
        Accessor::<StoredWorkflow>::get(self, &workflow.id)
    }

    fn delete(&self, id: &str, _options: &DeleteOptions) -> Result<()> {
        self.delete_path(
            StoredWorkflow::KIND,
            &format!("workflows/{id}"),
            id,
            &serde_json::json!({}),
        )
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<StoredWorkflow>> {
        let show_deleted = if query.wants_deleted() { "true" } else { "false" };
        let mut workflows: Vec<StoredWorkflow> = self.get_query(
            StoredWorkflow::KIND,
            "workflows",
            &[("show_deleted", show_deleted)],
        )?;
        workflows.retain(|w| query.matches(w) && (w.deleted || query.wants_live()));
        Ok(workflows)
    }

    fn undelete(&self, workflow: &StoredWorkflow) -> Result<()> {
        let path = format!("workflows/{}/undelete", workflow.id);
        let _: serde_json::Value = self.send_json(
            Method::Post,
            StoredWorkflow::KIND,
            &path,
            &workflow.id,
            &serde_json::json!({}),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_trims_slashes() {
        let backend = GalaxyBackend::new("https://galaxy.example.org/", "key");
        assert_eq!(backend.host(), "https://galaxy.example.org");
        assert_eq!(
            backend.url("/histories/abc"),
            "https://galaxy.example.org/api/histories/abc"
        );
        assert_eq!(
            backend.job_url("j1"),
            "https://galaxy.example.org/api/jobs/j1"
        );
    }

    #[test]
    fn test_workflow_document_rejects_invalid_json() {
        assert!(workflow_document("{\"a_galaxy_workflow\": \"true\"}").is_ok());
        let err = workflow_document("not json").unwrap_err();
        assert!(err.to_string().contains("workflow JSON is not valid"));
    }

    #[test]
    fn test_unsupported_operation() {
        let err = unsupported::<()>(Job::KIND, "update").unwrap_err();
        assert_eq!(err.to_string(), "job does not support update");
    }

    #[test]
    fn test_tool_run_tolerates_missing_jobs() {
        let run: ToolRun = serde_json::from_str(r#"{"outputs": []}"#).unwrap();
        assert!(run.jobs.is_empty());
    }
}
