//! # Declarative
//!
//! Declarative attribute stores and a table-driven mapper between typed
//! remote entities and string-keyed state.
//!
//! ## Core Concepts
//!
//! - **Value**: a loosely-typed attribute value (scalar, list, set, map)
//! - **AttributeStore**: named attributes plus an identity binding
//! - **FieldTable**: per-type field descriptors, built once per process
//! - **project / extract**: move data between an entity and a store
//! - **Diagnostics**: accumulated errors and warnings instead of fail-fast
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{field_table, project, FieldTable, MemoryStore, Model, OmitSet, Record};
//! use std::sync::LazyLock;
//!
//! #[derive(Default)]
//! struct History { id: String, name: String }
//!
//! impl Record for History {
//!     fn fields() -> &'static FieldTable<Self> {
//!         static TABLE: LazyLock<FieldTable<History>> = LazyLock::new(|| {
//!             field_table!(History { "id" => id: String, "name" => name: String })
//!         });
//!         &TABLE
//!     }
//! }
//!
//! impl Model for History {
//!     const KIND: &'static str = "history";
//!     fn identity(&self) -> &str { &self.id }
//!     fn set_identity(&mut self, id: &str) { self.id = id.to_string(); }
//! }
//!
//! let mut store = MemoryStore::new();
//! let diags = project(&history, &mut store, &OmitSet::new());
//! assert!(!diags.has_error());
//! ```

pub mod diag;
pub mod field;
pub mod mapper;
pub mod store;
pub mod value;

pub use diag::{Diagnostic, Diagnostics, Severity};
pub use field::{
    Field, FieldTable, FieldType, FromValue, Model, Record, ToValue, Typed, record_from_value,
    record_to_value,
};
pub use mapper::{ID_FIELD, MappingError, OmitSet, convert, extract, project, schema_for};
pub use store::{AttrKind, AttrSpec, AttributeStore, MemoryStore, Schema, StoreError};
pub use value::{Value, ValueKind};
