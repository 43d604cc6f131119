//! Attribute mapper
//!
//! Moves data between a typed [`Model`] and an [`AttributeStore`] using only
//! the model's field table. Both directions are best-effort: a field that
//! cannot be mapped yields a diagnostic and the walk continues.

use crate::diag::{Diagnostic, Diagnostics};
use crate::field::{FieldType, Model};
use crate::store::{AttrKind, AttributeStore, Schema};
use crate::value::{Value, ValueKind, integral};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Name of the identity field. It is bound through `set_id` / `set_identity`
/// rather than mapped as an attribute.
pub const ID_FIELD: &str = "id";

/// Errors converting an attribute value into a field value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("cannot convert {from} into {to}")]
    Mismatch { from: ValueKind, to: FieldType },

    #[error("{field}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Wrap this error with the name of the field it occurred in
    pub fn in_field(self, field: &str) -> Self {
        Self::InField {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// Fields excluded from mapping, configured per direction
///
/// A field omitted from projection is never written to the store (e.g. a
/// password the server does not echo back). A field omitted from extraction is
/// never read from the store (e.g. a value the server recomputes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmitSet {
    project: BTreeSet<&'static str>,
    extract: BTreeSet<&'static str>,
}

impl OmitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit `names` in both directions
    pub fn both(names: &[&'static str]) -> Self {
        Self::new().omit_project(names).omit_extract(names)
    }

    pub fn omit_project(mut self, names: &[&'static str]) -> Self {
        self.project.extend(names.iter().copied());
        self
    }

    pub fn omit_extract(mut self, names: &[&'static str]) -> Self {
        self.extract.extend(names.iter().copied());
        self
    }

    pub fn skips_project(&self, name: &str) -> bool {
        self.project.contains(name)
    }

    pub fn skips_extract(&self, name: &str) -> bool {
        self.extract.contains(name)
    }

    /// Omitted in both directions, so never present in the store
    pub fn skips_both(&self, name: &str) -> bool {
        self.skips_project(name) && self.skips_extract(name)
    }
}

/// Normalize `value` into the shape `ty` declares
///
/// Direct conversions are applied first (integral floats to ints, ints to
/// floats). Maps and lists (including sets) are then rebuilt element-wise.
/// Anything else is a [`MappingError::Mismatch`].
pub fn convert(value: Value, ty: &FieldType) -> Result<Value, MappingError> {
    match (ty, value) {
        (FieldType::Any, v) => Ok(v),
        (FieldType::String, v @ Value::String(_)) => Ok(v),
        (FieldType::Bool, v @ Value::Bool(_)) => Ok(v),
        (FieldType::Int, v @ Value::Int(_)) => Ok(v),
        (FieldType::Int, Value::Float(f)) => integral(f)
            .map(Value::Int)
            .ok_or(MappingError::Mismatch {
                from: ValueKind::Float,
                to: FieldType::Int,
            }),
        (FieldType::Float, v @ Value::Float(_)) => Ok(v),
        (FieldType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (FieldType::Record, v @ Value::Map(_)) => Ok(v),
        (FieldType::Map(elem), Value::Map(map)) => map
            .into_iter()
            .map(|(k, v)| Ok((k, convert(v, elem)?)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Value::Map),
        (FieldType::List(elem), Value::List(items) | Value::Set(items)) => items
            .into_iter()
            .map(|v| convert(v, elem))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (ty, v) => Err(MappingError::Mismatch {
            from: v.kind(),
            to: ty.clone(),
        }),
    }
}

fn mapped(name: &str) -> bool {
    !name.is_empty() && name != ID_FIELD
}

/// Project every mapped field of `entity` into `store`, then bind the store
/// to the entity's identity.
pub fn project<E, S>(entity: &E, store: &mut S, omit: &OmitSet) -> Diagnostics
where
    E: Model,
    S: AttributeStore + ?Sized,
{
    let mut diags = Diagnostics::new();
    for field in E::fields().iter() {
        if !mapped(field.name) || omit.skips_project(field.name) {
            continue;
        }
        let value = (field.get)(entity);
        if let Err(e) = store.set(field.name, value) {
            diags.push(
                Diagnostic::error(format!("cannot set attribute {}", field.name))
                    .with_detail(e.to_string())
                    .at(field.name),
            );
        }
    }
    store.set_id(entity.identity());
    diags
}

/// Extract every mapped, set attribute of `store` into `entity`, then bind
/// the entity to the store's identity.
pub fn extract<E, S>(entity: &mut E, store: &S, omit: &OmitSet) -> Diagnostics
where
    E: Model,
    S: AttributeStore + ?Sized,
{
    let mut diags = Diagnostics::new();
    for field in E::fields().iter() {
        if !mapped(field.name) || omit.skips_extract(field.name) {
            continue;
        }
        if field.ty == FieldType::Any {
            continue;
        }
        let Some(value) = store.get(field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let result = convert(value.clone(), &field.ty).and_then(|v| (field.set)(entity, v));
        if let Err(e) = result {
            log::debug!("{}: cannot extract {}: {e}", E::KIND, field.name);
            diags.push(
                Diagnostic::error(format!("cannot map attribute {}", field.name))
                    .with_detail(e.to_string())
                    .at(field.name),
            );
        }
    }
    entity.set_identity(store.id());
    diags
}

fn attr_kind(ty: &FieldType) -> AttrKind {
    match ty {
        FieldType::String => AttrKind::String,
        FieldType::Int => AttrKind::Int,
        FieldType::Float => AttrKind::Float,
        FieldType::Bool => AttrKind::Bool,
        FieldType::List(_) => AttrKind::List,
        FieldType::Map(_) | FieldType::Record => AttrKind::Map,
        FieldType::Any => AttrKind::Any,
    }
}

/// Schema declaring every mapped field of `E` that `omit` does not exclude in
/// both directions. Kind-specific attributes are added on top.
pub fn schema_for<E: Model>(omit: &OmitSet) -> Schema {
    E::fields()
        .iter()
        .filter(|f| mapped(f.name) && !omit.skips_both(f.name))
        .fold(Schema::new(), |schema, f| {
            schema.attr(f.name, attr_kind(&f.ty))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldTable, Record};
    use crate::store::MemoryStore;
    use crate::{field_table, nested_record};
    use std::sync::{Arc, LazyLock};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Member {
        id: String,
        email: String,
    }

    impl Record for Member {
        fn fields() -> &'static FieldTable<Self> {
            static TABLE: LazyLock<FieldTable<Member>> = LazyLock::new(|| {
                field_table!(Member {
                    "id" => id: String,
                    "email" => email: String,
                })
            });
            &TABLE
        }
    }

    nested_record!(Member);

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Quota {
        id: String,
        name: String,
        bytes: i64,
        ratio: f64,
        enabled: bool,
        tags: Vec<String>,
        labels: BTreeMap<String, String>,
        members: Vec<Member>,
        note: Option<String>,
        extra: serde_json::Value,
        secret: String,
    }

    impl Record for Quota {
        fn fields() -> &'static FieldTable<Self> {
            static TABLE: LazyLock<FieldTable<Quota>> = LazyLock::new(|| {
                field_table!(Quota {
                    "id" => id: String,
                    "name" => name: String,
                    "bytes" => bytes: i64,
                    "ratio" => ratio: f64,
                    "enabled" => enabled: bool,
                    "tags" => tags: Vec<String>,
                    "labels" => labels: BTreeMap<String, String>,
                    "members" => members: Vec<Member>,
                    "note" => note: Option<String>,
                    "extra" => extra: serde_json::Value,
                    "secret" => secret: String,
                })
            });
            &TABLE
        }
    }

    impl Model for Quota {
        const KIND: &'static str = "quota";

        fn identity(&self) -> &str {
            &self.id
        }

        fn set_identity(&mut self, id: &str) {
            self.id = id.to_string();
        }
    }

    fn sample() -> Quota {
        Quota {
            id: "f2db41e1fa331b3e".into(),
            name: "big".into(),
            bytes: 1 << 30,
            ratio: 0.5,
            enabled: true,
            tags: vec!["a".into(), "b".into()],
            labels: BTreeMap::from([("team".to_string(), "core".to_string())]),
            members: vec![Member {
                id: "1".into(),
                email: "a@example.org".into(),
            }],
            note: Some("hello".into()),
            extra: serde_json::json!({"k": 1}),
            secret: "hunter2".into(),
        }
    }

    fn omit() -> OmitSet {
        OmitSet::new().omit_project(&["secret"])
    }

    #[test]
    fn test_round_trip_modulo_omitted() {
        let omit = omit();
        let schema = Arc::new(schema_for::<Quota>(&omit));
        let mut store = MemoryStore::with_schema(schema);
        let original = sample();

        assert!(project(&original, &mut store, &omit).is_empty());
        assert_eq!(store.id(), "f2db41e1fa331b3e");
        assert!(store.get("secret").is_none());
        assert!(store.get(ID_FIELD).is_none());

        let mut rebuilt = Quota::default();
        assert!(extract(&mut rebuilt, &store, &omit).is_empty());

        // Free-form fields are never extracted; the omitted secret never left.
        let expected = Quota {
            extra: serde_json::Value::Null,
            secret: String::new(),
            ..original
        };
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn test_projection_never_aborts() {
        // A schema that lacks "ratio" makes exactly that Set fail.
        let omit = omit();
        let mut schema = Schema::new();
        for name in Quota::fields().names() {
            if mapped(name) && name != "ratio" && !omit.skips_project(name) {
                let field = Quota::fields().get(name).unwrap();
                schema = schema.attr(name, attr_kind(&field.ty));
            }
        }
        let mut store = MemoryStore::with_schema(Arc::new(schema));

        let diags = project(&sample(), &mut store, &omit);

        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.path.as_deref(), Some("ratio"));
        for name in ["name", "bytes", "enabled", "tags", "labels", "members", "note", "extra"] {
            assert!(store.get(name).is_some(), "{name} missing");
        }
        assert_eq!(store.id(), "f2db41e1fa331b3e");
    }

    #[test]
    fn test_extract_reports_mismatch_and_continues() {
        let mut store = MemoryStore::new();
        store.set("name", Value::from("renamed")).unwrap();
        store
            .set("tags", Value::Map(BTreeMap::from([("x".into(), Value::from("y"))])))
            .unwrap();
        store.set("bytes", Value::Float(2048.0)).unwrap();
        store.set_id("abc");

        let mut quota = Quota::default();
        let diags = extract(&mut quota, &store, &OmitSet::new());

        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.path.as_deref(), Some("tags"));
        assert_eq!(
            diag.detail.as_deref(),
            Some("cannot convert map into list<string>")
        );
        assert_eq!(quota.name, "renamed");
        assert_eq!(quota.bytes, 2048);
        assert_eq!(quota.id, "abc");
    }

    #[test]
    fn test_extract_materializes_set() {
        let mut store = MemoryStore::new();
        store
            .set("tags", Value::set(vec!["x".into(), "x".into(), "y".into()]))
            .unwrap();
        let mut quota = Quota::default();
        assert!(extract(&mut quota, &store, &OmitSet::new()).is_empty());
        assert_eq!(quota.tags, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_extract_skips_omitted_and_absent() {
        let mut store = MemoryStore::new();
        store.set("name", Value::from("keep")).unwrap();
        store.set("secret", Value::from("ignored")).unwrap();
        let mut quota = sample();
        let omit = OmitSet::new().omit_extract(&["secret"]);
        assert!(extract(&mut quota, &store, &omit).is_empty());
        assert_eq!(quota.name, "keep");
        assert_eq!(quota.secret, "hunter2");
        assert_eq!(quota.bytes, 1 << 30);
    }

    #[test]
    fn test_schema_excludes_fields_omitted_both_ways() {
        let omit = OmitSet::both(&["members"]).omit_project(&["secret"]);
        let schema = schema_for::<Quota>(&omit);
        assert!(!schema.contains("members"));
        assert!(!schema.contains(ID_FIELD));
        assert!(schema.contains("secret"));
        assert_eq!(schema.get("labels").unwrap().kind, AttrKind::Map);
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let mut store = MemoryStore::with_schema(Arc::new(Schema::new()));
        let diags = project(&sample(), &mut store, &OmitSet::new());
        assert_eq!(diags.len(), Quota::fields().len() - 1);
        assert!(diags.iter().all(|d| d.path.as_deref() != Some(ID_FIELD)));
        assert_eq!(store.id(), "f2db41e1fa331b3e");
    }

    #[test]
    fn test_convert_rejects_float_beyond_int_range() {
        for f in [1e300, -1e300, 9_223_372_036_854_775_808.0] {
            let err = convert(Value::Float(f), &FieldType::Int).unwrap_err();
            assert!(matches!(err, MappingError::Mismatch { .. }), "{f}");
        }
        assert_eq!(
            convert(Value::Float(-4096.0), &FieldType::Int),
            Ok(Value::Int(-4096))
        );
    }

    #[test]
    fn test_convert_rejects_fractional_int() {
        let err = convert(Value::Float(1.5), &FieldType::Int).unwrap_err();
        assert_eq!(
            err,
            MappingError::Mismatch {
                from: ValueKind::Float,
                to: FieldType::Int,
            }
        );
    }
}
