pub mod apply;
pub mod destroy;
pub mod diff;
pub mod kinds;
pub mod plan;
pub mod validate;

use anyhow::Result;
use reconcile::{Catalog, SchemaCatalog, Version};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::state::ManagedState;
use crate::store::RemoteStore;

/// Everything a command needs to reconcile against the remote store
pub struct Session {
    pub catalog: Catalog,
    pub store: RemoteStore,
    pub state: ManagedState,
    pub state_path: PathBuf,
    pub version: Version,
}

impl Session {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let catalog = config.catalog()?;
        let store = RemoteStore::open(&config.remote_path()?, catalog.resources())?;
        let state_path = config.state_path()?;
        let state = ManagedState::load(&state_path)?;

        Ok(Self {
            catalog,
            store,
            state,
            state_path,
            version: config.product_version,
        })
    }

    /// Persist managed state and the remote store
    pub fn save(&mut self) -> Result<()> {
        self.store.save()?;
        self.state.save(&self.state_path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Config pointing every file into `dir`
    pub fn config_in(dir: &TempDir) -> AppConfig {
        AppConfig {
            remote: Some(dir.path().join("remote.json").to_string_lossy().into_owned()),
            state: Some(dir.path().join("state.toml").to_string_lossy().into_owned()),
            ..AppConfig::default()
        }
    }
}
