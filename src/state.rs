use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reconcile::ConfigObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::declared::address;

// ============================================================================
// State Structures
// ============================================================================

/// Every instance cfgsync manages, keyed by `resource.id`
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ManagedState {
    /// Last time the state was saved
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub instances: BTreeMap<String, ManagedInstance>,
}

/// A managed instance and the last object the remote returned for it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ManagedInstance {
    pub resource: String,

    /// Taken over rather than created; released without a remote delete
    #[serde(default)]
    pub adopted: bool,

    /// When the instance was first created or adopted
    pub managed_since: DateTime<Utc>,

    /// Last known remote object
    pub snapshot: ConfigObject,
}

// ============================================================================
// ManagedState Implementation
// ============================================================================

impl ManagedState {
    /// Load state from `path`, or return default if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Stamp and save state to `path`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Some(Utc::now());
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, resource: &str, id: &str) -> Option<&ManagedInstance> {
        self.instances.get(&address(resource, id))
    }

    /// Last known object of a managed instance
    pub fn snapshot(&self, resource: &str, id: &str) -> Option<&ConfigObject> {
        self.get(resource, id).map(|instance| &instance.snapshot)
    }

    /// Record the object returned by a create, adopt or update
    ///
    /// Keeps `managed_since` and `adopted` of an existing entry.
    pub fn record(&mut self, resource: &str, snapshot: ConfigObject, adopted: bool) {
        let key = address(resource, &snapshot.id);
        match self.instances.get_mut(&key) {
            Some(instance) => instance.snapshot = snapshot,
            None => {
                self.instances.insert(
                    key,
                    ManagedInstance {
                        resource: resource.to_string(),
                        adopted,
                        managed_since: Utc::now(),
                        snapshot,
                    },
                );
            }
        }
    }

    /// Stop tracking an instance
    pub fn remove(&mut self, resource: &str, id: &str) -> Option<ManagedInstance> {
        self.instances.remove(&address(resource, id))
    }

    /// Managed instances for which `keep(resource, id)` is false
    pub fn orphans<'a, F>(&'a self, mut keep: F) -> Vec<&'a ManagedInstance>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.instances
            .values()
            .filter(|instance| !keep(&instance.resource, &instance.snapshot.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::AttributeValue;
    use tempfile::TempDir;

    fn vault() -> ConfigObject {
        ConfigObject::new("vault", "vault-pin")
            .with("enabled", true)
            .with("vault_secret_path", "secret/ds")
            .with("extension_argument", AttributeValue::set(["a=1", "b=2"]))
    }

    #[test]
    fn test_default_state() {
        let state = ManagedState::default();
        assert!(state.is_empty());
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("state.toml");

        let mut state = ManagedState::default();
        state.record("passphrase_provider", vault(), false);
        state.record(
            "global_configuration",
            ConfigObject::new("global", "config").with("writability_mode", "enabled"),
            true,
        );
        state.save(&path).unwrap();

        let loaded = ManagedState::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.last_updated.is_some());
        assert_eq!(
            loaded.snapshot("passphrase_provider", "vault-pin"),
            Some(&vault())
        );
        assert!(loaded.get("global_configuration", "config").unwrap().adopted);
    }

    #[test]
    fn test_record_keeps_managed_since() {
        let mut state = ManagedState::default();
        state.record("passphrase_provider", vault(), false);
        let since = state.get("passphrase_provider", "vault-pin").unwrap().managed_since;

        let updated = vault().with("enabled", false);
        state.record("passphrase_provider", updated.clone(), true);

        let instance = state.get("passphrase_provider", "vault-pin").unwrap();
        assert_eq!(instance.managed_since, since);
        assert!(!instance.adopted);
        assert_eq!(instance.snapshot, updated);
    }

    #[test]
    fn test_remove_and_orphans() {
        let mut state = ManagedState::default();
        state.record("passphrase_provider", vault(), false);
        state.record(
            "passphrase_provider",
            ConfigObject::new("file-based", "file-pin"),
            false,
        );

        let orphans = state.orphans(|_, id| id == "vault-pin");
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].snapshot.id, "file-pin");

        assert!(state.remove("passphrase_provider", "file-pin").is_some());
        assert!(state.remove("passphrase_provider", "file-pin").is_none());
        assert_eq!(state.len(), 1);
    }
}
