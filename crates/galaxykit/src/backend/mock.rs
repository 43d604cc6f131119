//! In-memory accessor for testing without a Galaxy server.

use super::{Accessor, DeleteOptions, ListQuery, RepositoryTools};
use crate::error::{Error, Result};
use crate::types::{Repository, Tool};
use declarative::Model;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Accessor operations that can have failures injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Get,
    Update,
    Delete,
    Undelete,
}

/// A recorded accessor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Create,
    Update(String),
    Delete(String, DeleteOptions),
    List(ListQuery),
    Undelete(String),
}

#[derive(Debug)]
struct State<E, P> {
    live: BTreeMap<String, E>,
    deleted: BTreeMap<String, E>,
    scripted: BTreeMap<String, VecDeque<Result<E>>>,
    create_results: VecDeque<Result<Vec<E>>>,
    failures: BTreeMap<(Op, String), Error>,
    tools: BTreeMap<String, Vec<Tool>>,
    calls: Vec<Call>,
    created_with: Vec<P>,
    updated: Vec<E>,
}

impl<E, P> Default for State<E, P> {
    fn default() -> Self {
        Self {
            live: BTreeMap::new(),
            deleted: BTreeMap::new(),
            scripted: BTreeMap::new(),
            create_results: VecDeque::new(),
            failures: BTreeMap::new(),
            tools: BTreeMap::new(),
            calls: Vec::new(),
            created_with: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// Mock accessor for testing without network access.
///
/// Entities live in memory, split into live and soft-deleted sets. Responses
/// can be scripted per identity, failures injected per operation, and every
/// call is recorded. Clones share state.
#[derive(Debug)]
pub struct MockAccessor<E, P> {
    state: Arc<Mutex<State<E, P>>>,
}

impl<E, P> Clone for MockAccessor<E, P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E, P> Default for MockAccessor<E, P> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }
}

impl<E: Model + Clone, P: Clone> MockAccessor<E, P> {
    /// Create a new empty mock accessor.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State<E, P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a live entity.
    pub fn insert(&self, entity: E) {
        self.state()
            .live
            .insert(entity.identity().to_string(), entity);
    }

    /// Add a soft-deleted entity.
    pub fn insert_deleted(&self, entity: E) {
        self.state()
            .deleted
            .insert(entity.identity().to_string(), entity);
    }

    /// Script successive `get` responses for `id`.
    ///
    /// Responses are consumed in order; the last one keeps being returned.
    pub fn script_get(&self, id: &str, responses: Vec<Result<E>>) {
        self.state()
            .scripted
            .insert(id.to_string(), responses.into());
    }

    /// Queue the result of the next `create` call.
    pub fn push_create(&self, result: Result<Vec<E>>) {
        self.state().create_results.push_back(result);
    }

    /// Make `op` on `id` fail with `err` until cleared.
    pub fn fail(&self, op: Op, id: &str, err: Error) {
        self.state().failures.insert((op, id.to_string()), err);
    }

    /// Tools reported for the repository with identity `repository_id`.
    pub fn set_tools(&self, repository_id: &str, tools: Vec<Tool>) {
        self.state()
            .tools
            .insert(repository_id.to_string(), tools);
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of `get` calls made for `id`.
    pub fn get_count(&self, id: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Get(g) if g == id))
            .count()
    }

    /// Parameters passed to `create`, in order.
    pub fn created_with(&self) -> Vec<P> {
        self.state().created_with.clone()
    }

    /// Entities passed to `update`, in order.
    pub fn updated(&self) -> Vec<E> {
        self.state().updated.clone()
    }

    /// Current live copy of an entity.
    pub fn live(&self, id: &str) -> Option<E> {
        self.state().live.get(id).cloned()
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        let state = self.state();
        state.deleted.contains_key(id) && !state.live.contains_key(id)
    }

    /// Whether the identity is gone entirely (purged or never existed).
    pub fn is_absent(&self, id: &str) -> bool {
        let state = self.state();
        !state.deleted.contains_key(id) && !state.live.contains_key(id)
    }
}

impl<E, P> State<E, P> {
    fn injected(&self, op: Op, id: &str) -> Result<()> {
        match self.failures.get(&(op, id.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl<E, P> Accessor<E> for MockAccessor<E, P>
where
    E: Model + Clone + Send,
    P: Clone + Send,
{
    type Params = P;

    fn get(&self, id: &str) -> Result<E> {
        let mut state = self.state();
        state.calls.push(Call::Get(id.to_string()));
        state.injected(Op::Get, id)?;

        if let Some(queue) = state.scripted.get_mut(id) {
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(response) = next {
                return response;
            }
        }

        state
            .live
            .get(id)
            .or_else(|| state.deleted.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found(E::KIND, id))
    }

    fn create(&self, params: &P) -> Result<Vec<E>> {
        let mut state = self.state();
        state.calls.push(Call::Create);
        state.created_with.push(params.clone());

        let result = state
            .create_results
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other(format!("no {} create scripted", E::KIND))))?;
        for entity in &result {
            state
                .live
                .insert(entity.identity().to_string(), entity.clone());
        }
        Ok(result)
    }

    fn update(&self, entity: &E) -> Result<E> {
        let mut state = self.state();
        let id = entity.identity().to_string();
        state.calls.push(Call::Update(id.clone()));
        state.injected(Op::Update, &id)?;

        if !state.live.contains_key(&id) && !state.deleted.contains_key(&id) {
            return Err(Error::not_found(E::KIND, id));
        }
        state.updated.push(entity.clone());
        if let Some(slot) = state.live.get_mut(&id) {
            *slot = entity.clone();
        } else {
            state.deleted.insert(id, entity.clone());
        }
        Ok(entity.clone())
    }

    fn delete(&self, id: &str, options: &DeleteOptions) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete(id.to_string(), *options));
        state.injected(Op::Delete, id)?;

        let entity = state
            .live
            .remove(id)
            .ok_or_else(|| Error::not_found(E::KIND, id))?;
        if !options.purge {
            state.deleted.insert(id.to_string(), entity);
        }
        Ok(())
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<E>> {
        let mut state = self.state();
        state.calls.push(Call::List(query.clone()));

        let live = state.live.values().filter(|_| query.wants_live());
        let deleted = state.deleted.values().filter(|_| query.wants_deleted());
        Ok(live
            .chain(deleted)
            .filter(|e| query.matches(*e))
            .cloned()
            .collect())
    }

    fn undelete(&self, entity: &E) -> Result<()> {
        let mut state = self.state();
        let id = entity.identity().to_string();
        state.calls.push(Call::Undelete(id.clone()));
        state.injected(Op::Undelete, &id)?;

        let restored = state
            .deleted
            .remove(&id)
            .ok_or_else(|| Error::not_found(E::KIND, id.clone()))?;
        state.live.insert(id, restored);
        Ok(())
    }
}

impl<P: Send> RepositoryTools for MockAccessor<Repository, P> {
    fn repository_tools(&self, repository: &Repository) -> Result<Vec<Tool>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .tools
            .get(&repository.id)
            .cloned()
            .unwrap_or_default())
    }
}
