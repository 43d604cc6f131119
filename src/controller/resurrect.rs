//! Recovering from duplicate-name conflicts
//!
//! Galaxy keeps soft-deleted users and quotas around, and their names stay
//! taken. Creating one again fails with a conflict; instead of giving up, the
//! deleted entity is brought back and overwritten with the requested
//! attributes.

use declarative::{Diagnostic, Diagnostics, Model};
use galaxykit::backend::{Accessor, ListQuery};
use galaxykit::Error;

/// How an entity came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Created,
    Resurrected,
}

/// Outcome of [`create_or_resurrect`]
#[derive(Debug)]
pub struct Resurrection<E> {
    pub entity: E,
    pub origin: Origin,
    /// Problems re-applying the requested attributes after an undelete
    pub diagnostics: Diagnostics,
}

/// Create an entity, resurrecting a soft-deleted namesake on conflict.
///
/// On a conflict, soft-deleted entities are listed by `name_field == name`;
/// a live namesake is never a candidate. Exactly one match is undeleted, passed to `reapply`
/// and persisted with an update; a failed update is reported in the
/// diagnostics and the locally re-applied entity is returned. With zero or
/// several matches the original conflict is returned unchanged.
pub fn create_or_resurrect<E, A, F>(
    accessor: &A,
    params: &A::Params,
    name_field: &str,
    name: &str,
    reapply: F,
) -> Result<Resurrection<E>, Error>
where
    E: Model,
    A: Accessor<E> + ?Sized,
    F: FnOnce(&mut E),
{
    let conflict = match accessor.create(params) {
        Ok(created) => {
            let entity = created.into_iter().next().ok_or_else(|| {
                Error::InvalidResponse(format!("{} create returned no entity", E::KIND))
            })?;
            return Ok(Resurrection {
                entity,
                origin: Origin::Created,
                diagnostics: Diagnostics::new(),
            });
        }
        Err(e) if e.is_conflict() => e,
        Err(e) => return Err(e),
    };

    log::info!("{} {name:?} already exists, looking for a deleted copy", E::KIND);
    let query = ListQuery::new().deleted_only().filter(name_field, name);
    let mut candidates = accessor.list(&query)?;
    if candidates.len() != 1 {
        log::warn!(
            "cannot resurrect {} {name:?}: {} candidates",
            E::KIND,
            candidates.len()
        );
        return Err(conflict);
    }
    let mut entity = candidates.remove(0);

    accessor.undelete(&entity)?;
    log::info!("Undeleted {} {} ({name})", E::KIND, entity.identity());

    reapply(&mut entity);
    let mut diagnostics = Diagnostics::new();
    match accessor.update(&entity) {
        Ok(updated) => entity = updated,
        Err(e) => diagnostics.push(
            Diagnostic::error(format!(
                "cannot re-apply attributes to resurrected {}",
                E::KIND
            ))
            .with_detail(e.to_string()),
        ),
    }

    Ok(Resurrection {
        entity,
        origin: Origin::Resurrected,
        diagnostics,
    })
}
