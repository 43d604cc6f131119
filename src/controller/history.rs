//! History lifecycle

use super::{
    Context, Lifecycle, delete_bound, read_into, remote_error, required_str, update_from_store,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostic, Diagnostics, Model, OmitSet, Schema, extract, project,
    schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use galaxykit::{History, HistoryParams};
use std::sync::{Arc, LazyLock};

static OMIT: LazyLock<OmitSet> = LazyLock::new(OmitSet::new);

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(schema_for::<History>(&OMIT).attr_default("purge", AttrKind::Bool, true))
});

pub struct HistoryLifecycle<A> {
    histories: A,
}

impl<A> HistoryLifecycle<A>
where
    A: Accessor<History, Params = HistoryParams>,
{
    pub fn new(histories: A) -> Self {
        Self { histories }
    }
}

impl<A> Lifecycle for HistoryLifecycle<A>
where
    A: Accessor<History, Params = HistoryParams>,
{
    fn kind(&self) -> &'static str {
        History::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    /// Galaxy only takes a name on create; everything else is applied with a
    /// follow-up update.
    fn create(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let name = match required_str(store, "name") {
            Ok(name) => name,
            Err(e) => return e.into(),
        };
        let created = match self.histories.create(&HistoryParams { name }) {
            Ok(created) => created.into_iter().next(),
            Err(e) => return remote_error(&e).into(),
        };
        let Some(mut history) = created else {
            return Diagnostics::error("history create returned no entity");
        };

        let id = history.id.clone();
        let mut diags = extract(&mut history, &*store, &OMIT);
        history.set_identity(&id);
        if !diags.has_error() {
            match self.histories.update(&history) {
                Ok(updated) => history = updated,
                Err(e) => diags.push(
                    Diagnostic::error("cannot apply attributes to new history")
                        .with_detail(e.to_string()),
                ),
            }
        }
        diags.append(project(&history, store, &OMIT));
        diags
    }

    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        read_into::<History, _>(&self.histories, store, &OMIT)
    }

    fn update(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        update_from_store::<History, _>(&self.histories, store, &OMIT)
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let options = DeleteOptions::default().purge(store.get_bool("purge").unwrap_or(true));
        delete_bound::<History, _>(&self.histories, store, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{MemoryStore, Value};
    use galaxykit::Error;
    use galaxykit::backend::{Call, MockAccessor, Op};

    type Histories = MockAccessor<History, HistoryParams>;

    fn desired() -> MemoryStore {
        let mut store = MemoryStore::with_schema(Arc::clone(&SCHEMA));
        store.set("name", Value::from("RNA-seq run 4")).unwrap();
        store.set("annotation", Value::from("paired end")).unwrap();
        store.set("tags", Value::strings(["rna", "run4"])).unwrap();
        store.set("published", Value::from(true)).unwrap();
        store
    }

    fn fresh(id: &str) -> History {
        History {
            id: id.into(),
            name: "RNA-seq run 4".into(),
            state: "new".into(),
            model_class: "History".into(),
            ..History::default()
        }
    }

    #[test]
    fn test_create_applies_managed_attributes() {
        let histories = Histories::new();
        histories.push_create(Ok(vec![fresh("h1")]));
        let lifecycle = HistoryLifecycle::new(histories.clone());
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(histories.created_with()[0].name, "RNA-seq run 4");

        let live = histories.live("h1").unwrap();
        assert_eq!(live.annotation.as_deref(), Some("paired end"));
        assert_eq!(live.tags, vec!["rna", "run4"]);
        assert!(live.published);

        assert_eq!(store.id(), "h1");
        assert_eq!(store.get_str("state"), Some("new"));
        assert_eq!(store.get_str("model_class"), Some("History"));
    }

    #[test]
    fn test_failed_follow_up_update_still_binds_store() {
        let histories = Histories::new();
        histories.push_create(Ok(vec![fresh("h1")]));
        histories.fail(Op::Update, "h1", Error::Other("slug taken".into()));
        let lifecycle = HistoryLifecycle::new(histories);
        let mut store = desired();

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(store.id(), "h1");
    }

    #[test]
    fn test_create_requires_name() {
        let histories = Histories::new();
        let lifecycle = HistoryLifecycle::new(histories.clone());
        let mut store = MemoryStore::with_schema(Arc::clone(&SCHEMA));

        let diags = lifecycle.create(&Context::default(), &mut store);
        assert_eq!(diags.errors().next().unwrap().path.as_deref(), Some("name"));
        assert!(histories.calls().is_empty());
    }

    #[test]
    fn test_read_clears_unset_optional_attributes() {
        let histories = Histories::new();
        histories.insert(fresh("h1"));
        let lifecycle = HistoryLifecycle::new(histories);
        let mut store = desired();
        store.set_id("h1");

        let diags = lifecycle.read(&Context::default(), &mut store);
        assert!(diags.is_empty());
        assert_eq!(store.get("annotation"), None);
        assert_eq!(store.get_bool("published"), Some(false));
    }

    #[test]
    fn test_delete_purges_unless_disabled() {
        let histories = Histories::new();
        histories.insert(fresh("h1"));
        let lifecycle = HistoryLifecycle::new(histories.clone());
        let mut store = desired();
        store.set_id("h1");
        store.set("purge", Value::from(false)).unwrap();

        let diags = lifecycle.delete(&Context::default(), &mut store);
        assert!(diags.is_empty());
        assert!(histories.is_deleted("h1"));
        assert!(matches!(&histories.calls()[0], Call::Delete(_, options) if !options.purge));
    }
}
