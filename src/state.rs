//! Persisted local view of provisioned resources
//!
//! After each lifecycle operation the driver snapshots the resource's
//! attribute store here, keyed by its address (`<kind>.<name>`), so the next
//! run can rehydrate the store with its identity binding.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{AttributeStore, MemoryStore, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Snapshot of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: String,
    /// Remote identity the store was bound to
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    pub updated_at: DateTime<Utc>,
}

/// All tracked resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl StateFile {
    /// Load state from `path`, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StateFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded {} resources from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    /// Snapshot `store` under `address`
    pub fn record(&mut self, address: &str, kind: &str, store: &MemoryStore) {
        let now = Utc::now();
        self.resources.insert(
            address.to_string(),
            ResourceRecord {
                kind: kind.to_string(),
                id: store.id().to_string(),
                attributes: store.values().clone(),
                updated_at: now,
            },
        );
        self.last_updated = now;
    }

    /// Rehydrate the store recorded under `address`
    pub fn store_for(&self, address: &str, schema: Option<Arc<Schema>>) -> Option<MemoryStore> {
        self.resources.get(address).map(|record| {
            MemoryStore::from_parts(schema, record.id.clone(), record.attributes.clone())
        })
    }

    /// Drop the record for `address`
    pub fn forget(&mut self, address: &str) -> Option<ResourceRecord> {
        let removed = self.resources.remove(address);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    pub fn get(&self, address: &str) -> Option<&ResourceRecord> {
        self.resources.get(address)
    }

    /// Addresses of every tracked resource of `kind`
    pub fn addresses_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.kind == kind)
            .map(|(address, _)| address.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AttrKind, ValueKind};
    use tempfile::TempDir;

    fn repository_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set("name", Value::from("bwa")).unwrap();
        store.set("deleted", Value::from(false)).unwrap();
        store.set("size", Value::from(42_i64)).unwrap();
        store.set("total_disk_usage", Value::from(1.5)).unwrap();
        store
            .set("tags", Value::set(["b".into(), "a".into(), "b".into()]))
            .unwrap();
        let mut dependent = BTreeMap::new();
        dependent.insert("name".to_string(), Value::from("samtools"));
        dependent.insert("id".to_string(), Value::from("d1"));
        store
            .set("dependents", Value::List(vec![Value::Map(dependent)]))
            .unwrap();
        store.set_id("f2db41e1fa331b3e");
        store
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let state = StateFile::load(&dir.path().join("state.toml")).unwrap();
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = StateFile::default();
        state.record("repository.bwa", "repository", &repository_store());
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        let record = loaded.get("repository.bwa").unwrap();
        assert_eq!(record.kind, "repository");
        assert_eq!(record.id, "f2db41e1fa331b3e");
        assert_eq!(record.attributes.get("size"), Some(&Value::Int(42)));
        assert_eq!(
            record.attributes.get("total_disk_usage"),
            Some(&Value::Float(1.5))
        );
        // Sets come back as lists
        assert_eq!(
            record.attributes.get("tags"),
            Some(&Value::List(vec!["b".into(), "a".into()]))
        );
        let dependents = record.attributes.get("dependents").unwrap();
        assert_eq!(
            dependents.as_items().unwrap()[0].field("name"),
            Some(&Value::from("samtools"))
        );
    }

    #[test]
    fn test_store_for_rebinds_identity() {
        let mut state = StateFile::default();
        state.record("repository.bwa", "repository", &repository_store());

        let schema = Arc::new(Schema::new().attr("name", AttrKind::String));
        let store = state.store_for("repository.bwa", Some(schema)).unwrap();
        assert_eq!(store.id(), "f2db41e1fa331b3e");
        assert_eq!(store.get_str("name"), Some("bwa"));
        assert!(state.store_for("repository.other", None).is_none());
    }

    #[test]
    fn test_reloaded_store_matches_schema_kinds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        let mut state = StateFile::default();
        state.record("repository.bwa", "repository", &repository_store());
        state.save(&path).unwrap();

        let schema = Arc::new(
            Schema::new()
                .attr("tags", AttrKind::Set)
                .attr("size", AttrKind::Int)
                .attr("dependents", AttrKind::List),
        );
        let store = StateFile::load(&path)
            .unwrap()
            .store_for("repository.bwa", Some(schema))
            .unwrap();
        assert_eq!(store.get("tags").unwrap().kind(), ValueKind::Set);
        assert_eq!(store.get_items("tags").unwrap().len(), 2);
        assert_eq!(store.get("size"), Some(&Value::Int(42)));
        assert_eq!(store.get_items("dependents").unwrap().len(), 1);
    }

    #[test]
    fn test_forget() {
        let mut state = StateFile::default();
        state.record("user.alice", "user", &MemoryStore::new());
        state.record("quota.big", "quota", &MemoryStore::new());
        assert_eq!(state.addresses_of("user").collect::<Vec<_>>(), vec!["user.alice"]);
        assert!(state.forget("user.alice").is_some());
        assert!(state.forget("user.alice").is_none());
        assert_eq!(state.resources.len(), 1);
    }

    #[test]
    fn test_parse_error_has_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "resources = 3").unwrap();
        let err = StateFile::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse state file"));
    }
}
