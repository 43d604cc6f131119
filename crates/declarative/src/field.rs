//! Field-descriptor tables
//!
//! Every remote entity type registers a [`FieldTable`]: one [`Field`] per
//! serialized attribute, carrying its declared [`FieldType`] and a pair of
//! accessors. Tables are built once, on first use, and are read-only
//! afterwards, so the mapper can walk any entity without knowing its type.

use crate::mapper::{self, MappingError};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared semantic type of an entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    /// Ordered list with the given element type
    List(Box<FieldType>),
    /// String-keyed map with the given value type
    Map(Box<FieldType>),
    /// Nested record with its own field table
    Record,
    /// No concrete shape (free-form JSON)
    Any,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Map(elem) => write!(f, "map<{elem}>"),
            Self::Record => f.write_str("record"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Rust types with a known [`FieldType`]
pub trait Typed {
    fn field_type() -> FieldType;
}

/// Conversion of a field value into an attribute [`Value`]
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of an already-normalized [`Value`] back into a field value
///
/// Callers run [`mapper::convert`] first, so implementations only decode the
/// exact shape their [`FieldType`] describes.
pub trait FromValue: Typed + Sized {
    fn from_value(value: Value) -> Result<Self, MappingError>;
}

fn mismatch<T: Typed>(value: &Value) -> MappingError {
    MappingError::Mismatch {
        from: value.kind(),
        to: T::field_type(),
    }
}

macro_rules! scalar {
    ($ty:ty, $field_type:ident, $variant:ident) => {
        impl Typed for $ty {
            fn field_type() -> FieldType {
                FieldType::$field_type
            }
        }

        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, MappingError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<Self>(&other)),
                }
            }
        }
    };
}

scalar!(String, String, String);
scalar!(i64, Int, Int);
scalar!(f64, Float, Float);
scalar!(bool, Bool, Bool);

impl<T: Typed> Typed for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::List(items) | Value::Set(items) => {
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: Typed> Typed for BTreeMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, T::from_value(v)?)))
                .collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

// Optional fields take the type of their payload; None projects as null.
impl<T: Typed> Typed for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

impl Typed for serde_json::Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::from_json(self.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, MappingError> {
        Ok(value.to_json())
    }
}

/// Descriptor of one serialized field of `E`
pub struct Field<E> {
    /// Serialization name; empty names are never mapped
    pub name: &'static str,
    pub ty: FieldType,
    pub get: fn(&E) -> Value,
    pub set: fn(&mut E, Value) -> Result<(), MappingError>,
}

/// All serialized fields of `E`, in declaration order
pub struct FieldTable<E> {
    fields: Vec<Field<E>>,
}

impl<E> FieldTable<E> {
    pub fn new(fields: Vec<Field<E>>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field<E>> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Field<E>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<E> fmt::Debug for FieldTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|field| (field.name, &field.ty)))
            .finish()
    }
}

/// A type described by a field table
pub trait Record: Default + 'static {
    fn fields() -> &'static FieldTable<Self>;
}

/// A remote entity: a record with a server-assigned identity
pub trait Model: Record {
    /// Entity kind, used in diagnostics and state addresses
    const KIND: &'static str;

    /// Server-assigned identity, empty when not yet created
    fn identity(&self) -> &str;

    fn set_identity(&mut self, id: &str);
}

/// Project a record into a map value, dropping null fields
pub fn record_to_value<R: Record>(record: &R) -> Value {
    let map = R::fields()
        .iter()
        .filter(|f| !f.name.is_empty())
        .map(|f| (f.name.to_string(), (f.get)(record)))
        .filter(|(_, v)| !v.is_null())
        .collect();
    Value::Map(map)
}

/// Decode a map value into a record, field by field
///
/// Keys without a matching field are ignored. The first field that cannot be
/// converted aborts decoding with an error naming it.
pub fn record_from_value<R: Record>(value: Value) -> Result<R, MappingError> {
    let Value::Map(mut map) = value else {
        return Err(MappingError::Mismatch {
            from: value.kind(),
            to: FieldType::Record,
        });
    };

    let mut record = R::default();
    for field in R::fields().iter() {
        let Some(raw) = map.remove(field.name) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        mapper::convert(raw, &field.ty)
            .and_then(|v| (field.set)(&mut record, v))
            .map_err(|e| e.in_field(field.name))?;
    }
    Ok(record)
}

/// Implement [`Typed`], [`ToValue`] and [`FromValue`] for a [`Record`] type
/// so it can be nested inside other entities.
#[macro_export]
macro_rules! nested_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Typed for $ty {
                fn field_type() -> $crate::FieldType {
                    $crate::FieldType::Record
                }
            }

            impl $crate::ToValue for $ty {
                fn to_value(&self) -> $crate::Value {
                    $crate::record_to_value(self)
                }
            }

            impl $crate::FromValue for $ty {
                fn from_value(
                    value: $crate::Value,
                ) -> ::std::result::Result<Self, $crate::MappingError> {
                    $crate::record_from_value(value)
                }
            }
        )+
    };
}

/// Build a [`FieldTable`] from `"name" => field: Type` entries
///
/// ```ignore
/// field_table!(User {
///     "id" => id: String,
///     "username" => username: String,
///     "quota_bytes" => quota_bytes: Option<i64>,
/// })
/// ```
#[macro_export]
macro_rules! field_table {
    ($entity:ty { $($name:literal => $field:ident : $fty:ty),* $(,)? }) => {
        $crate::FieldTable::<$entity>::new(vec![
            $(
                $crate::Field {
                    name: $name,
                    ty: <$fty as $crate::Typed>::field_type(),
                    get: |entity: &$entity| -> $crate::Value {
                        $crate::ToValue::to_value(&entity.$field)
                    },
                    set: |entity: &mut $entity,
                          value: $crate::Value|
                     -> ::std::result::Result<(), $crate::MappingError> {
                        entity.$field = <$fty as $crate::FromValue>::from_value(value)?;
                        Ok(())
                    },
                },
            )*
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    #[derive(Debug, Default, PartialEq)]
    struct Status {
        latest: String,
        deprecated: bool,
    }

    impl Record for Status {
        fn fields() -> &'static FieldTable<Self> {
            static TABLE: LazyLock<FieldTable<Status>> = LazyLock::new(|| {
                field_table!(Status {
                    "latest_installable_revision" => latest: String,
                    "repository_deprecated" => deprecated: bool,
                })
            });
            &TABLE
        }
    }

    nested_record!(Status);

    #[test]
    fn test_field_types() {
        assert_eq!(
            <Vec<Option<i64>>>::field_type(),
            FieldType::List(Box::new(FieldType::Int))
        );
        assert_eq!(
            <BTreeMap<String, Status>>::field_type().to_string(),
            "map<record>"
        );
        assert_eq!(serde_json::Value::field_type(), FieldType::Any);
    }

    #[test]
    fn test_record_value_drops_nulls() {
        let status = Status {
            latest: "7".into(),
            deprecated: false,
        };
        let value = record_to_value(&status);
        assert_eq!(
            value.field("latest_installable_revision"),
            Some(&Value::from("7"))
        );
        assert_eq!(record_from_value::<Status>(value).unwrap(), status);
    }

    #[test]
    fn test_record_from_value_names_bad_field() {
        let mut map = BTreeMap::new();
        map.insert("repository_deprecated".to_string(), Value::from("yes"));
        let err = record_from_value::<Status>(Value::Map(map)).unwrap_err();
        assert!(err.to_string().contains("repository_deprecated"));
    }

    #[test]
    fn test_table_lookup() {
        let table = Status::fields();
        assert_eq!(table.len(), 2);
        assert!(table.get("repository_deprecated").is_some());
        assert!(table.get("latest").is_none());
    }
}
