//! File-backed stand-in for the remote configuration server
//!
//! Objects live in a JSON file grouped by resource type. Each resource type
//! gets its own [`InMemoryClient`], because kind names repeat across
//! resource types (`third-party` exists in several of them).

use anyhow::{Context, Result, anyhow};
use reconcile::{ConfigObject, InMemoryClient};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type StoreFile = BTreeMap<String, Vec<ConfigObject>>;

/// Calls each client keeps in its log; older ones are only counted
const CALL_LOG_LIMIT: usize = 64;

pub struct RemoteStore {
    path: PathBuf,
    clients: BTreeMap<String, InMemoryClient>,
}

impl RemoteStore {
    /// Open the store at `path`, with an empty client for every resource in
    /// `resources` that has no objects yet
    pub fn open<'a, I>(path: &Path, resources: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let file: StoreFile = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read remote store: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse remote store: {}", path.display()))?
        } else {
            log::debug!("Remote store {} does not exist, starting empty", path.display());
            StoreFile::new()
        };

        let mut clients: BTreeMap<String, InMemoryClient> = file
            .into_iter()
            .map(|(resource, objects)| {
                let client = InMemoryClient::with_objects(objects).with_call_limit(CALL_LOG_LIMIT);
                (resource, client)
            })
            .collect();
        for resource in resources {
            clients
                .entry(resource.to_string())
                .or_insert_with(|| InMemoryClient::new().with_call_limit(CALL_LOG_LIMIT));
        }

        Ok(Self {
            path: path.to_path_buf(),
            clients,
        })
    }

    /// Client serving one resource type
    pub fn client(&self, resource: &str) -> Result<&InMemoryClient> {
        self.clients
            .get(resource)
            .ok_or_else(|| anyhow!("Remote store has no resource type '{resource}'"))
    }

    /// Number of remote calls made through every client
    pub fn call_count(&self) -> usize {
        self.clients.values().map(InMemoryClient::call_count).sum()
    }

    /// Write every object back to the store file
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let file: StoreFile = self
            .clients
            .iter()
            .map(|(resource, client)| (resource.clone(), client.objects()))
            .filter(|(_, objects)| !objects.is_empty())
            .collect();
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize remote store")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write remote store: {}", self.path.display()))?;

        log::debug!("Saved remote store to {}", self.path.display());
        Ok(())
    }
}
