//! Accessor traits and implementations for Galaxy entities.
//!
//! [`Accessor`] is the typed CRUD contract the lifecycle layer is written
//! against. [`http::GalaxyBackend`] implements it over the Galaxy REST API;
//! [`MockAccessor`] keeps entities in memory for tests.
//!
//! # Testing
//!
//! ```
//! use galaxykit::backend::{Accessor, DeleteOptions, MockAccessor};
//! use galaxykit::{History, HistoryParams};
//!
//! let mock: MockAccessor<History, HistoryParams> = MockAccessor::new();
//! mock.insert(History { id: "f2db41e1fa331b3e".into(), ..History::default() });
//!
//! let history = mock.get("f2db41e1fa331b3e").unwrap();
//! mock.delete(&history.id, &DeleteOptions::default()).unwrap();
//! assert!(mock.is_deleted("f2db41e1fa331b3e"));
//! ```

pub mod http;
mod mock;

pub use mock::{Call, MockAccessor, Op};

use crate::error::Result;
use crate::types::{Repository, Tool};
use declarative::{Model, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options for deleting an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOptions {
    /// Permanently remove instead of soft-deleting
    pub purge: bool,
    /// Remove installed files (repositories)
    pub remove_from_disk: bool,
}

impl DeleteOptions {
    pub fn purge(mut self, purge: bool) -> Self {
        self.purge = purge;
        self
    }

    pub fn remove_from_disk(mut self, remove: bool) -> Self {
        self.remove_from_disk = remove;
        self
    }
}

/// Filter for listing entities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Include soft-deleted entities
    pub include_deleted: bool,
    /// Only soft-deleted entities
    pub deleted_only: bool,
    /// Field name / expected string value pairs, all of which must match
    pub filters: Vec<(String, String)>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// Restrict the listing to soft-deleted entities
    pub fn deleted_only(mut self) -> Self {
        self.deleted_only = true;
        self
    }

    /// Whether live entities belong in the result
    pub fn wants_live(&self) -> bool {
        !self.deleted_only
    }

    /// Whether soft-deleted entities belong in the result
    pub fn wants_deleted(&self) -> bool {
        self.include_deleted || self.deleted_only
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Whether `entity` satisfies every filter
    ///
    /// Filters are evaluated through the entity's field table, so a filter on
    /// a field the entity does not declare never matches.
    pub fn matches<E: Model>(&self, entity: &E) -> bool {
        self.filters.iter().all(|(name, expected)| {
            E::fields()
                .get(name)
                .is_some_and(|f| (f.get)(entity) == Value::String(expected.clone()))
        })
    }
}

/// Typed access to one kind of Galaxy entity.
///
/// Not every kind supports every operation; unsupported ones return
/// [`crate::Error::Unsupported`].
pub trait Accessor<E: Model>: Send + Sync {
    /// Creation parameters for this kind
    type Params;

    /// Fetch an entity by identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the identity does not exist.
    fn get(&self, id: &str) -> Result<E>;

    /// Create entities. Some kinds return more than one (a job submission may
    /// spawn several jobs, a repository install may pull in dependencies).
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if the name is already taken.
    fn create(&self, params: &Self::Params) -> Result<Vec<E>>;

    /// Persist `entity`, returning the server's view of it
    fn update(&self, entity: &E) -> Result<E>;

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()>;

    fn list(&self, query: &ListQuery) -> Result<Vec<E>>;

    /// Restore a soft-deleted entity
    fn undelete(&self, entity: &E) -> Result<()>;
}

/// Listing the tools a repository installed
pub trait RepositoryTools: Send + Sync {
    fn repository_tools(&self, repository: &Repository) -> Result<Vec<Tool>>;
}

impl<E: Model, T: Accessor<E> + ?Sized> Accessor<E> for Arc<T> {
    type Params = T::Params;

    fn get(&self, id: &str) -> Result<E> {
        (**self).get(id)
    }

    fn create(&self, params: &Self::Params) -> Result<Vec<E>> {
        (**self).create(params)
    }

    fn update(&self, entity: &E) -> Result<E> {
        (**self).update(entity)
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        (**self).delete(id, options)
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<E>> {
        (**self).list(query)
    }

    fn undelete(&self, entity: &E) -> Result<()> {
        (**self).undelete(entity)
    }
}

impl<T: RepositoryTools + ?Sized> RepositoryTools for Arc<T> {
    fn repository_tools(&self, repository: &Repository) -> Result<Vec<Tool>> {
        (**self).repository_tools(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;

    #[test]
    fn test_list_query_matches_fields() {
        let user = User {
            id: "1".into(),
            username: "alice".into(),
            ..User::default()
        };
        assert!(ListQuery::new().matches(&user));
        assert!(ListQuery::new().filter("username", "alice").matches(&user));
        assert!(!ListQuery::new().filter("username", "bob").matches(&user));
        assert!(!ListQuery::new().filter("no_such_field", "alice").matches(&user));
    }

    #[test]
    fn test_delete_options_builder() {
        let opts = DeleteOptions::default().purge(true).remove_from_disk(true);
        assert!(opts.purge);
        assert!(opts.remove_from_disk);
    }
}
