//! Splitting multi-entity create results
//!
//! Some creates return more than the one entity asked for: a repository
//! install pulls in its dependencies, a tool run can spawn several jobs. The
//! result carries no parent pointers, so the primary entity is recognised by
//! matching it against the request and everything else becomes a dependent.

use declarative::{Diagnostic, Diagnostics, Value};
use serde::Serialize;

/// A create result split into its primary entity and the rest
#[derive(Debug, Clone, PartialEq)]
pub struct Classified<E> {
    pub primary: E,
    /// Every other entity, in the order the remote returned them
    pub dependents: Vec<E>,
}

/// Split `entities` on `is_primary`.
///
/// Exactly one entity must match. Otherwise the number of matches is returned
/// and nothing is chosen.
pub fn classify<E, F>(entities: Vec<E>, is_primary: F) -> Result<Classified<E>, usize>
where
    F: Fn(&E) -> bool,
{
    let matches = entities.iter().filter(|e| is_primary(e)).count();
    if matches != 1 {
        return Err(matches);
    }

    let mut primary = None;
    let mut dependents = Vec::with_capacity(entities.len().saturating_sub(1));
    for entity in entities {
        if primary.is_none() && is_primary(&entity) {
            primary = Some(entity);
        } else {
            dependents.push(entity);
        }
    }
    primary
        .map(|primary| Classified {
            primary,
            dependents,
        })
        .ok_or(0)
}

/// Serialize entities as generic records, dropping the `omit` keys.
///
/// Entities that fail to serialize are reported and skipped.
pub fn generic_records<E: Serialize>(entities: &[E], omit: &[&str]) -> (Vec<Value>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut records = Vec::with_capacity(entities.len());
    for (index, entity) in entities.iter().enumerate() {
        match serde_json::to_value(entity) {
            Ok(json) => {
                let mut record = Value::from_json(json);
                if let Value::Map(map) = &mut record {
                    for key in omit {
                        map.remove(*key);
                    }
                }
                records.push(record);
            }
            Err(e) => diags.push(
                Diagnostic::error("cannot record dependent entity")
                    .with_detail(e.to_string())
                    .at(index.to_string()),
            ),
        }
    }
    (records, diags)
}
