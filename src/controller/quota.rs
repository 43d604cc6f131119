//! Quota lifecycle
//!
//! `default`, `users` and `groups` bypass the generic mapper. Galaxy reports
//! the default classification as a list of association objects and the member
//! lists as nested users and groups; the store holds a plain string and two id
//! lists instead.

use super::resurrect::{Origin, create_or_resurrect};
use super::{
    Context, InputError, Lifecycle, delete_bound, fetch, remote_error, required_str, set_attr,
    string_items,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostics, Model, OmitSet, Schema, Value, extract, project,
    schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use galaxykit::{DefaultFor, Quota, QuotaOperation, QuotaParams};
use std::sync::{Arc, LazyLock};

static OMIT: LazyLock<OmitSet> = LazyLock::new(|| {
    OmitSet::both(&["default", "users", "groups"]).omit_project(&["amount"])
});

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(
        schema_for::<Quota>(&OMIT)
            .attr_default("operation", AttrKind::String, QuotaOperation::SetTo.as_str())
            .attr_default("default", AttrKind::String, DefaultFor::No.as_str())
            .attr("users", AttrKind::List)
            .attr("groups", AttrKind::List)
            .attr_default("purge", AttrKind::Bool, true),
    )
});

pub struct QuotaLifecycle<A> {
    quotas: A,
}

impl<A> QuotaLifecycle<A>
where
    A: Accessor<Quota, Params = QuotaParams>,
{
    pub fn new(quotas: A) -> Self {
        Self { quotas }
    }
}

/// Validate the store and build creation parameters from it
fn quota_params(store: &dyn AttributeStore) -> Result<QuotaParams, InputError> {
    let operation = store
        .get_str("operation")
        .unwrap_or(QuotaOperation::SetTo.as_str())
        .parse::<QuotaOperation>()
        .map_err(|msg| InputError::invalid("operation", msg))?;
    let default = store
        .get_str("default")
        .unwrap_or(DefaultFor::No.as_str())
        .parse::<DefaultFor>()
        .map_err(|msg| InputError::invalid("default", msg))?;

    Ok(QuotaParams {
        name: required_str(store, "name")?,
        description: required_str(store, "description")?,
        amount: required_str(store, "amount")?,
        operation,
        default,
        in_users: string_items(store, "users"),
        in_groups: string_items(store, "groups"),
    })
}

/// Generic projection plus the hand-mapped attributes
fn project_quota(quota: &Quota, store: &mut dyn AttributeStore) -> Diagnostics {
    let mut diags = project(quota, store, &OMIT);
    diags.append(set_attr(store, "default", Value::from(quota.default.as_str())));
    diags.append(set_attr(
        store,
        "users",
        Value::strings(quota.users.iter().map(|u| u.id.as_str())),
    ));
    diags.append(set_attr(
        store,
        "groups",
        Value::strings(quota.groups.iter().map(|g| g.id.as_str())),
    ));
    diags
}

impl<A> Lifecycle for QuotaLifecycle<A>
where
    A: Accessor<Quota, Params = QuotaParams>,
{
    fn kind(&self) -> &'static str {
        Quota::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    fn create(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let params = match quota_params(store) {
            Ok(params) => params,
            Err(e) => return e.into(),
        };
        let reapply = |quota: &mut Quota| params.apply_to(quota);
        match create_or_resurrect(&self.quotas, &params, "name", &params.name, reapply) {
            Ok(outcome) => {
                if outcome.origin == Origin::Resurrected {
                    log::info!("Resurrected quota {}", params.name);
                }
                let mut diags = outcome.diagnostics;
                diags.append(project_quota(&outcome.entity, store));
                diags
            }
            Err(e) => remote_error(&e).into(),
        }
    }

    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        match fetch::<Quota, A>(&self.quotas, store) {
            Ok(quota) => project_quota(&quota, store),
            Err(diags) => diags,
        }
    }

    fn update(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let params = match quota_params(store) {
            Ok(params) => params,
            Err(e) => return e.into(),
        };
        let mut quota = Quota::default();
        let mut diags = extract(&mut quota, &*store, &OMIT);
        if diags.has_error() {
            return diags;
        }
        params.apply_to(&mut quota);

        match self.quotas.update(&quota) {
            Ok(updated) => diags.append(project_quota(&updated, store)),
            Err(e) => diags.push(remote_error(&e)),
        }
        diags
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let options = DeleteOptions::default().purge(store.get_bool("purge").unwrap_or(true));
        delete_bound::<Quota, _>(&self.quotas, store, &options)
    }
}
