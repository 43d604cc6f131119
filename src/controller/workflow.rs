//! Stored workflow lifecycle

use super::{
    Context, Lifecycle, delete_bound, read_into, remote_error, required_str, update_from_store,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostics, Model, OmitSet, Schema, project, schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use galaxykit::{StoredWorkflow, WorkflowParams};
use std::sync::{Arc, LazyLock};

/// Step and input details are derived from `json`; the document itself is
/// never returned by Galaxy.
static OMIT: LazyLock<OmitSet> = LazyLock::new(|| {
    OmitSet::both(&["inputs", "steps", "model_class"]).omit_project(&["json"])
});

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(
        schema_for::<StoredWorkflow>(&OMIT)
            .attr_default("import_tools", AttrKind::Bool, false)
            .attr_default("publish", AttrKind::Bool, false)
            .attr_default("importable", AttrKind::Bool, false),
    )
});

pub struct WorkflowLifecycle<A> {
    workflows: A,
}

impl<A> WorkflowLifecycle<A>
where
    A: Accessor<StoredWorkflow, Params = WorkflowParams>,
{
    pub fn new(workflows: A) -> Self {
        Self { workflows }
    }
}

impl<A> Lifecycle for WorkflowLifecycle<A>
where
    A: Accessor<StoredWorkflow, Params = WorkflowParams>,
{
    fn kind(&self) -> &'static str {
        StoredWorkflow::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    fn create(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let json = match required_str(store, "json") {
            Ok(json) => json,
            Err(e) => return e.into(),
        };
        let params = WorkflowParams {
            json,
            import_tools: store.get_bool("import_tools").unwrap_or(false),
            publish: store.get_bool("publish").unwrap_or(false),
            importable: store.get_bool("importable").unwrap_or(false),
        };
        match self.workflows.create(&params) {
            Ok(created) => match created.first() {
                Some(workflow) => project(workflow, store, &OMIT),
                None => Diagnostics::error("workflow import returned no workflow"),
            },
            Err(e) => remote_error(&e).into(),
        }
    }

    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        read_into::<StoredWorkflow, _>(&self.workflows, store, &OMIT)
    }

    fn update(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        update_from_store::<StoredWorkflow, _>(&self.workflows, store, &OMIT)
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        delete_bound::<StoredWorkflow, _>(&self.workflows, store, &DeleteOptions::default())
    }
}
