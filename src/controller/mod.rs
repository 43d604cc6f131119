//! Lifecycle controllers
//!
//! Each entity kind gets a [`Lifecycle`] implementation that drives
//! create/read/update/delete against a [`galaxykit::backend::Accessor`] and
//! moves data in and out of the resource's attribute store through the
//! mapper. Every operation returns [`Diagnostics`] rather than failing fast.
//!
//! The kind-independent parts of the protocol live in submodules:
//!
//! - [`poll`]: waiting for asynchronous jobs to reach a terminal state
//! - [`resurrect`]: turning a duplicate-name conflict into an undelete
//! - [`tree`]: splitting a multi-entity create result into primary and dependents

pub mod history;
pub mod job;
pub mod poll;
pub mod quota;
pub mod repository;
pub mod resurrect;
pub mod tree;
pub mod user;
pub mod workflow;

pub use history::HistoryLifecycle;
pub use job::JobLifecycle;
pub use quota::QuotaLifecycle;
pub use repository::RepositoryLifecycle;
pub use user::UserLifecycle;
pub use workflow::WorkflowLifecycle;

use crate::cancel::CancelToken;
use crate::config::DEFAULT_POLL_INTERVAL;
use declarative::{
    AttributeStore, Diagnostic, Diagnostics, Model, OmitSet, Schema, Value, extract, project,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Inputs shared by every lifecycle call
#[derive(Debug, Clone)]
pub struct Context {
    /// Aborts job polling and host waits
    pub cancel: CancelToken,
    /// Delay between job state polls
    pub poll_interval: Duration,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
        }
    }
}

impl Context {
    pub fn new(cancel: CancelToken, poll_interval: Duration) -> Self {
        Self {
            cancel,
            poll_interval,
        }
    }
}

/// A lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Create/read/update/delete protocol for one entity kind
pub trait Lifecycle: Send + Sync {
    /// Entity kind, e.g. `quota`
    fn kind(&self) -> &'static str;

    /// Attributes a store for this kind may hold
    fn schema(&self) -> Arc<Schema>;

    fn create(&self, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics;

    /// Refresh the store from the remote entity. A missing entity is an error
    /// and leaves the store untouched.
    fn read(&self, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics;

    fn update(&self, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics;

    fn delete(&self, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics;

    /// Run `op` and tag untagged diagnostics with this resource
    fn apply(&self, op: Operation, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        log::debug!("{} {}", op, self.kind());
        let mut diags = match op {
            Operation::Create => self.create(ctx, store),
            Operation::Read => self.read(ctx, store),
            Operation::Update => self.update(ctx, store),
            Operation::Delete => self.delete(ctx, store),
        };
        diags.tag_resource(&resource_label(self.kind(), store.id()));
        diags
    }
}

/// `kind id`, or just `kind` before the entity exists
pub fn resource_label(kind: &str, id: &str) -> String {
    if id.is_empty() {
        kind.to_string()
    } else {
        format!("{kind} {id}")
    }
}

/// Invalid or incomplete store contents, detected before any remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("attribute {0} is required")]
    Missing(&'static str),

    #[error("exactly one of {0} or {1} must be set")]
    ExactlyOne(&'static str, &'static str),

    #[error("{0} conflicts with {1}")]
    Conflicting(&'static str, &'static str),

    #[error("{message}")]
    Invalid {
        attribute: &'static str,
        message: String,
    },
}

impl InputError {
    pub fn invalid(attribute: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            attribute,
            message: message.into(),
        }
    }

    /// Attribute the error points at
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Missing(name) | Self::ExactlyOne(name, _) | Self::Conflicting(name, _) => name,
            Self::Invalid { attribute, .. } => attribute,
        }
    }
}

impl From<InputError> for Diagnostic {
    fn from(err: InputError) -> Self {
        Diagnostic::error(err.to_string()).at(err.attribute())
    }
}

impl From<InputError> for Diagnostics {
    fn from(err: InputError) -> Self {
        let mut diags = Diagnostics::new();
        diags.push(err.into());
        diags
    }
}

/// Diagnostic for a failed remote call
pub fn remote_error(err: &galaxykit::Error) -> Diagnostic {
    Diagnostic::error(err.to_string()).with_detail(err.category().advice())
}

/// Non-empty string attribute
pub(crate) fn optional_str(store: &dyn AttributeStore, name: &str) -> Option<String> {
    store
        .get_str(name)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn required_str(
    store: &dyn AttributeStore,
    name: &'static str,
) -> Result<String, InputError> {
    optional_str(store, name).ok_or(InputError::Missing(name))
}

/// String elements of a list- or set-valued attribute
pub(crate) fn string_items(store: &dyn AttributeStore, name: &str) -> Vec<String> {
    store
        .get_items(name)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// `id` of every record in a list attribute such as `dependents`
pub(crate) fn record_ids(store: &dyn AttributeStore, name: &str) -> Vec<String> {
    store
        .get_items(name)
        .unwrap_or_default()
        .iter()
        .filter_map(|record| record.field("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Write a computed attribute, reporting failure as a diagnostic
pub(crate) fn set_attr(store: &mut dyn AttributeStore, name: &str, value: Value) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if let Err(e) = store.set(name, value) {
        diags.push(
            Diagnostic::error(format!("cannot set attribute {name}"))
                .with_detail(e.to_string())
                .at(name),
        );
    }
    diags
}

/// Fetch the entity bound to `store`
pub(crate) fn fetch<E, A>(accessor: &A, store: &dyn AttributeStore) -> Result<E, Diagnostics>
where
    E: Model,
    A: Accessor<E> + ?Sized,
{
    let id = store.id();
    if id.is_empty() {
        return Err(Diagnostics::error(format!("{} has no identity", E::KIND)));
    }
    accessor.get(id).map_err(|e| {
        if e.is_not_found() {
            log::info!("{} {id} no longer exists", E::KIND);
        }
        let mut diags = Diagnostics::new();
        diags.push(remote_error(&e));
        diags
    })
}

/// Read: fetch and project
pub(crate) fn read_into<E, A>(accessor: &A, store: &mut dyn AttributeStore, omit: &OmitSet) -> Diagnostics
where
    E: Model,
    A: Accessor<E> + ?Sized,
{
    match fetch::<E, A>(accessor, store) {
        Ok(entity) => project(&entity, store, omit),
        Err(diags) => diags,
    }
}

/// Update: extract into a fresh entity, push it, project the server's view
pub(crate) fn update_from_store<E, A>(
    accessor: &A,
    store: &mut dyn AttributeStore,
    omit: &OmitSet,
) -> Diagnostics
where
    E: Model,
    A: Accessor<E> + ?Sized,
{
    let mut entity = E::default();
    let mut diags = extract(&mut entity, &*store, omit);
    if diags.has_error() {
        return diags;
    }
    match accessor.update(&entity) {
        Ok(updated) => diags.append(project(&updated, store, omit)),
        Err(e) => diags.push(remote_error(&e)),
    }
    diags
}

/// Delete the entity bound to `store`
pub(crate) fn delete_bound<E, A>(
    accessor: &A,
    store: &dyn AttributeStore,
    options: &DeleteOptions,
) -> Diagnostics
where
    E: Model,
    A: Accessor<E> + ?Sized,
{
    let mut diags = Diagnostics::new();
    let id = store.id();
    if id.is_empty() {
        diags.push(Diagnostic::error(format!("{} has no identity", E::KIND)));
        return diags;
    }
    if let Err(e) = accessor.delete(id, options) {
        diags.push(remote_error(&e));
    }
    diags
}

/// Delete `primary` and every dependent, continuing past failures
pub(crate) fn delete_with_dependents<E, A>(
    accessor: &A,
    primary: &str,
    dependents: &[String],
    options: &DeleteOptions,
) -> Diagnostics
where
    E: Model,
    A: Accessor<E> + ?Sized,
{
    let mut diags = Diagnostics::new();
    if primary.is_empty() {
        diags.push(Diagnostic::error(format!("{} has no identity", E::KIND)));
        return diags;
    }
    for id in std::iter::once(primary).chain(dependents.iter().map(String::as_str)) {
        if let Err(e) = accessor.delete(id, options) {
            diags.push(remote_error(&e).for_resource(resource_label(E::KIND, id)));
        }
    }
    if !dependents.is_empty() {
        log::info!(
            "Removed {} {} with {} dependents ({} failures)",
            E::KIND,
            primary,
            dependents.len(),
            diags.len()
        );
    }
    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AttrKind, MemoryStore, Severity};
    use galaxykit::backend::MockAccessor;
    use galaxykit::{Error, History, HistoryParams};

    #[test]
    fn test_resource_label() {
        assert_eq!(resource_label("job", ""), "job");
        assert_eq!(resource_label("job", "1cd8e2f6b131e891"), "job 1cd8e2f6b131e891");
    }

    #[test]
    fn test_input_error_points_at_attribute() {
        let diag: Diagnostic = InputError::ExactlyOne("tool_id", "tool_guid").into();
        assert_eq!(diag.path.as_deref(), Some("tool_id"));
        assert_eq!(diag.summary, "exactly one of tool_id or tool_guid must be set");
        assert_eq!(diag.severity, Severity::Error);
    }

    #[test]
    fn test_required_str_rejects_empty() {
        let mut store = MemoryStore::new();
        store.set("name", Value::from("")).unwrap();
        assert_eq!(
            required_str(&store, "name"),
            Err(InputError::Missing("name"))
        );
    }

    #[test]
    fn test_read_not_found_leaves_store_untouched() {
        let histories: MockAccessor<History, HistoryParams> = MockAccessor::new();
        let mut store = MemoryStore::new();
        store.set("name", Value::from("kept")).unwrap();
        store.set_id("gone");

        let diags = read_into::<History, _>(&histories, &mut store, &OmitSet::new());
        assert!(diags.has_error());
        assert_eq!(diags.len(), 1);
        assert_eq!(store.get_str("name"), Some("kept"));
        assert_eq!(store.id(), "gone");
    }

    #[test]
    fn test_delete_with_dependents_aggregates() {
        let histories: MockAccessor<History, HistoryParams> = MockAccessor::new();
        for id in ["a", "b", "c"] {
            histories.insert(History {
                id: id.into(),
                ..History::default()
            });
        }
        histories.fail(
            galaxykit::backend::Op::Delete,
            "b",
            Error::Other("locked".into()),
        );

        let dependents = vec!["b".to_string(), "c".to_string(), "missing".to_string()];
        let diags = delete_with_dependents::<History, _>(
            &histories,
            "a",
            &dependents,
            &DeleteOptions::default(),
        );
        assert_eq!(diags.len(), 2);
        let resources: Vec<_> = diags.iter().map(|d| d.resource.clone().unwrap()).collect();
        assert_eq!(resources, vec!["history b", "history missing"]);
        assert!(histories.is_deleted("a"));
        assert!(histories.is_deleted("c"));
    }

    #[test]
    fn test_set_attr_reports_schema_violation() {
        let schema = Arc::new(Schema::new().attr("tools", AttrKind::Set));
        let mut store = MemoryStore::with_schema(schema);
        let diags = set_attr(&mut store, "tools", Value::from("not a set"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().path.as_deref(), Some("tools"));
    }
}
