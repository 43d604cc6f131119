//! Declarative attribute stores
//!
//! An [`AttributeStore`] is the string-keyed side of a reconciliation: the
//! desired/observed attributes of one managed resource plus the identity that
//! binds it to a remote object. [`MemoryStore`] is the in-process
//! implementation, optionally validated against a [`Schema`].

use crate::value::{Value, ValueKind, integral};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised when writing to a store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The schema does not declare this attribute
    #[error("attribute {0} is not declared in the schema")]
    UnknownAttribute(String),

    /// The value does not fit the declared kind
    #[error("attribute {name} expects {expected}, got {found}")]
    KindMismatch {
        name: String,
        expected: AttrKind,
        found: ValueKind,
    },
}

/// Declared kind of a schema attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    String,
    Int,
    Float,
    Bool,
    List,
    Set,
    Map,
    /// Accepts any value unchanged
    Any,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

impl AttrKind {
    /// Normalize `value` into this kind, or `None` if it cannot hold it
    fn admit(self, value: Value) -> Option<Value> {
        match (self, value) {
            (Self::String, v @ Value::String(_)) => Some(v),
            (Self::Bool, v @ Value::Bool(_)) => Some(v),
            (Self::Int, v @ Value::Int(_)) => Some(v),
            (Self::Int, Value::Float(f)) => integral(f).map(Value::Int),
            (Self::Float, v @ Value::Float(_)) => Some(v),
            (Self::Float, Value::Int(i)) => Some(Value::Float(i as f64)),
            (Self::List, Value::List(items) | Value::Set(items)) => Some(Value::List(items)),
            (Self::Set, Value::List(items) | Value::Set(items)) => Some(Value::set(items)),
            (Self::Map, v @ Value::Map(_)) => Some(v),
            (Self::Any, v) => Some(v),
            _ => None,
        }
    }
}

/// Declaration of a single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub kind: AttrKind,
    pub default: Option<Value>,
}

/// Attribute declarations for one resource kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    attrs: BTreeMap<&'static str, AttrSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute
    pub fn attr(mut self, name: &'static str, kind: AttrKind) -> Self {
        self.attrs.insert(
            name,
            AttrSpec {
                kind,
                default: None,
            },
        );
        self
    }

    /// Declare an attribute whose value reads as `default` until it is set
    pub fn attr_default(
        mut self,
        name: &'static str,
        kind: AttrKind,
        default: impl Into<Value>,
    ) -> Self {
        self.attrs.insert(
            name,
            AttrSpec {
                kind,
                default: Some(default.into()),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrSpec> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attrs.keys().copied()
    }

    /// Validate and normalize a value destined for attribute `name`
    pub fn admit(&self, name: &str, value: Value) -> Result<Value, StoreError> {
        let spec = self
            .get(name)
            .ok_or_else(|| StoreError::UnknownAttribute(name.to_string()))?;
        let found = value.kind();
        spec.kind.admit(value).ok_or(StoreError::KindMismatch {
            name: name.to_string(),
            expected: spec.kind,
            found,
        })
    }
}

/// String-keyed attribute storage bound to a remote identity
pub trait AttributeStore {
    /// Current value of an attribute, `None` when unset
    fn get(&self, name: &str) -> Option<&Value>;

    /// Write an attribute. Writing [`Value::Null`] clears it.
    fn set(&mut self, name: &str, value: Value) -> Result<(), StoreError>;

    /// Identity of the bound remote object, empty when not yet created
    fn id(&self) -> &str;

    fn set_id(&mut self, id: &str);

    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Elements of a list- or set-valued attribute
    fn get_items(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_items)
    }
}

/// In-memory attribute store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schema: Option<Arc<Schema>>,
    id: String,
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    /// Store that accepts any attribute
    pub fn new() -> Self {
        Self::default()
    }

    /// Store validated against `schema`
    pub fn with_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Rehydrate a store from a persisted identity and attribute map.
    ///
    /// With a schema, every value is normalized as [`AttributeStore::set`]
    /// would; values the schema rejects are dropped with a warning.
    pub fn from_parts(
        schema: Option<Arc<Schema>>,
        id: impl Into<String>,
        values: BTreeMap<String, Value>,
    ) -> Self {
        let values = match &schema {
            Some(schema) => values
                .into_iter()
                .filter_map(|(name, value)| match schema.admit(&name, value) {
                    Ok(value) => Some((name, value)),
                    Err(e) => {
                        log::warn!("Dropping persisted attribute: {e}");
                        None
                    }
                })
                .collect(),
            None => values,
        };
        Self {
            schema,
            id: id.into(),
            values,
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Explicitly set values (schema defaults excluded)
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Whether the store is bound to a remote object
    pub fn is_bound(&self) -> bool {
        !self.id.is_empty()
    }
}

impl AttributeStore for MemoryStore {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| {
            self.schema
                .as_ref()
                .and_then(|s| s.get(name))
                .and_then(|spec| spec.default.as_ref())
        })
    }

    fn set(&mut self, name: &str, value: Value) -> Result<(), StoreError> {
        if value.is_null() {
            if let Some(schema) = &self.schema
                && !schema.contains(name)
            {
                return Err(StoreError::UnknownAttribute(name.to_string()));
            }
            self.values.remove(name);
            return Ok(());
        }

        let value = match &self.schema {
            Some(schema) => schema.admit(name, value)?,
            None => value,
        };
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }
}
