//! User lifecycle

use super::resurrect::{Origin, create_or_resurrect};
use super::{
    Context, InputError, Lifecycle, delete_bound, read_into, remote_error, required_str,
    update_from_store,
};
use declarative::{
    AttrKind, AttributeStore, Diagnostics, Model, OmitSet, Schema, project, schema_for,
};
use galaxykit::backend::{Accessor, DeleteOptions};
use galaxykit::{NewUser, User};
use std::sync::{Arc, LazyLock};

/// The password is write-only: Galaxy never returns it
static OMIT: LazyLock<OmitSet> = LazyLock::new(|| OmitSet::new().omit_project(&["password"]));

static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(schema_for::<User>(&OMIT).attr_default("purge", AttrKind::Bool, false))
});

/// Users, resurrected by username when a deleted account still holds the name
pub struct UserLifecycle<A> {
    users: A,
}

impl<A> UserLifecycle<A>
where
    A: Accessor<User, Params = NewUser>,
{
    pub fn new(users: A) -> Self {
        Self { users }
    }
}

fn new_user(store: &dyn AttributeStore) -> Result<NewUser, InputError> {
    Ok(NewUser {
        username: required_str(store, "username")?,
        password: required_str(store, "password")?,
        email: required_str(store, "email")?,
    })
}

impl<A> Lifecycle for UserLifecycle<A>
where
    A: Accessor<User, Params = NewUser>,
{
    fn kind(&self) -> &'static str {
        User::KIND
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&SCHEMA)
    }

    fn create(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let params = match new_user(store) {
            Ok(params) => params,
            Err(e) => return e.into(),
        };
        let reapply = |user: &mut User| {
            user.username = params.username.clone();
            user.email = params.email.clone();
            user.password = params.password.clone();
        };
        match create_or_resurrect(&self.users, &params, "username", &params.username, reapply) {
            Ok(outcome) => {
                if outcome.origin == Origin::Resurrected {
                    log::info!("Resurrected user {}", params.username);
                }
                let mut diags = outcome.diagnostics;
                diags.append(project(&outcome.entity, store, &OMIT));
                diags
            }
            Err(e) => remote_error(&e).into(),
        }
    }

    fn read(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        read_into::<User, _>(&self.users, store, &OMIT)
    }

    fn update(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        update_from_store::<User, _>(&self.users, store, &OMIT)
    }

    fn delete(&self, _ctx: &Context, store: &mut dyn AttributeStore) -> Diagnostics {
        let options = DeleteOptions::default().purge(store.get_bool("purge").unwrap_or(false));
        delete_bound::<User, _>(&self.users, store, &options)
    }
}
