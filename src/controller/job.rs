//! Job lifecycle
//!
//! A tool run may start several jobs. The first one is the resource itself;
//! the rest are kept as generic records under `additional_jobs` so that read
//! and delete can reach them later.

use super::poll::wait_for_jobs;
use super::tree::generic_records;
use super::{
    Context, InputError, Lifecycle, delete_with_dependents, fetch, optional_str, record_ids,
    remote_error, required_str, resource_label, set_attr,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostics, Model, OmitSet, Schema, Value, project, schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use galaxykit::{Job, JobParams};
use serde_json::{Map, json};
use std::sync::{Arc, LazyLock};

const OMITTED: &[&str] = &["inputs", "outputs", "params", "model_class"];

/// Dataset input blocks, named after the `src` Galaxy expects
const DATASET_INPUTS: [&str; 2] = ["hda", "hdca"];

static OMIT: LazyLock<OmitSet> = LazyLock::new(|| OmitSet::both(OMITTED));

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(
        schema_for::<Job>(&OMIT)
            .attr("tool_guid", AttrKind::String)
            .attr("params", AttrKind::Map)
            .attr("hda", AttrKind::List)
            .attr("hdca", AttrKind::List)
            .attr("additional_jobs", AttrKind::List)
            .attr_default("wait_for_completion", AttrKind::Bool, true),
    )
});

pub struct JobLifecycle<A> {
    jobs: A,
}

impl<A> JobLifecycle<A>
where
    A: Accessor<Job, Params = JobParams>,
{
    pub fn new(jobs: A) -> Self {
        Self { jobs }
    }
}

/// Build the tool run payload.
///
/// Plain parameters go into `inputs` as-is. Every `hda`/`hdca` block names an
/// input and a dataset id; blocks sharing an input are merged into one
/// `{"values": [..]}` entry.
fn job_params(store: &dyn AttributeStore) -> Result<JobParams, InputError> {
    let tool_id = optional_str(store, "tool_id");
    let tool_uuid = optional_str(store, "tool_guid");
    if tool_id.is_some() == tool_uuid.is_some() {
        return Err(InputError::ExactlyOne("tool_id", "tool_guid"));
    }
    let history_id = required_str(store, "history_id")?;

    let mut inputs = Map::new();
    if let Some(params) = store.get("params").and_then(Value::as_map) {
        for (name, value) in params {
            inputs.insert(name.clone(), value.to_json());
        }
    }

    let mut merged: Map<String, serde_json::Value> = Map::new();
    for src in DATASET_INPUTS {
        for block in store.get_items(src).unwrap_or_default() {
            let input = block.field("input").and_then(Value::as_str);
            let id = block.field("id").and_then(Value::as_str);
            let (Some(input), Some(id)) = (input, id) else {
                return Err(InputError::invalid(
                    src,
                    format!("every {src} block needs an input and an id"),
                ));
            };
            if inputs.contains_key(input) {
                return Err(InputError::invalid(
                    src,
                    format!("input {input} is also set in params"),
                ));
            }
            let entry = merged
                .entry(input.to_string())
                .or_insert_with(|| json!({ "values": [] }));
            if let Some(values) = entry.get_mut("values").and_then(serde_json::Value::as_array_mut) {
                values.push(json!({ "id": id, "src": src }));
            }
        }
    }
    inputs.extend(merged);

    Ok(JobParams {
        tool_id,
        tool_uuid,
        history_id,
        inputs,
    })
}

/// Project the primary job and record the others
fn attach(jobs: &[Job], store: &mut dyn AttributeStore) -> Diagnostics {
    let Some((primary, rest)) = jobs.split_first() else {
        return Diagnostics::error("no job to record");
    };
    let mut diags = project(primary, store, &OMIT);
    let (records, record_diags) = generic_records(rest, OMITTED);
    diags.append(record_diags);
    diags.append(set_attr(store, "additional_jobs", Value::List(records)));
    diags
}

impl<A> Lifecycle for JobLifecycle<A>
where
    A: Accessor<Job, Params = JobParams>,
{
    fn kind(&self) -> &'static str {
        Job::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    fn create(&self, ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let params = match job_params(store) {
            Ok(params) => params,
            Err(e) => return e.into(),
        };
        let mut jobs = match self.jobs.create(&params) {
            Ok(jobs) if jobs.is_empty() => return Diagnostics::error("tool run started no jobs"),
            Ok(jobs) => jobs,
            Err(e) => return remote_error(&e).into(),
        };
        log::info!("Tool run started {} jobs", jobs.len());

        let mut diags = Diagnostics::new();
        if store.get_bool("wait_for_completion").unwrap_or(true) {
            let outcome = wait_for_jobs(&self.jobs, jobs, ctx);
            jobs = outcome.jobs;
            diags.append(outcome.diagnostics);
        }
        diags.append(attach(&jobs, store));
        diags
    }

    /// Every job must be fetched before the store is touched
    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let mut jobs = Vec::new();
        match fetch::<Job, A>(&self.jobs, store) {
            Ok(job) => jobs.push(job),
            Err(e) => diags.append(e),
        }
        for id in record_ids(store, "additional_jobs") {
            match self.jobs.get(&id) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    diags.push(remote_error(&e).for_resource(resource_label(Job::KIND, &id)));
                }
            }
        }
        if diags.has_error() {
            return diags;
        }
        attach(&jobs, store)
    }

    fn update(&self, _ctx: &Context, _store: &mut dyn AttributeStore) -> Diagnostics {
        Diagnostics::new()
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let additional = record_ids(store, "additional_jobs");
        let options = DeleteOptions::default();
        delete_with_dependents::<Job, _>(&self.jobs, store.id(), &additional, &options)
    }
}
