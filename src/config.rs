use anyhow::{Context, Result};
use reconcile::{Catalog, PolymorphicSchema, Version};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

const DEFAULT_PRODUCT_VERSION: Version = Version::new(9, 2, 0, 0);
const DEFAULT_JOBS: usize = 4;

/// Get the config directory path (~/.config/cfgsync)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("cfgsync"))
}

/// Get the state directory path (~/.local/state/cfgsync)
pub fn state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("cfgsync"))
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

// ============================================================================
// App Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Product version attributes are gated against
    pub product_version: Version,

    /// JSON file standing in for the remote configuration server
    pub remote: Option<String>,

    /// Managed-state file
    pub state: Option<String>,

    /// Extra schema files loaded on top of the built-in catalog
    pub catalogs: Vec<String>,

    /// Parallel jobs for apply
    pub jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            product_version: DEFAULT_PRODUCT_VERSION,
            remote: None,
            state: None,
            catalogs: Vec::new(),
            jobs: DEFAULT_JOBS,
        }
    }
}

impl AppConfig {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load config from `path`, or return defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve config from the command line: file first, then flag overrides
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };
        let mut config = Self::load(&path)?;

        if let Some(version) = &cli.product_version {
            config.product_version = version
                .parse()
                .with_context(|| format!("Invalid --product-version '{version}'"))?;
        }
        if let Some(remote) = &cli.remote {
            config.remote = Some(remote.to_string_lossy().into_owned());
        }
        if let Some(state) = &cli.state {
            config.state = Some(state.to_string_lossy().into_owned());
        }

        Ok(config)
    }

    /// Path of the remote store file
    pub fn remote_path(&self) -> Result<PathBuf> {
        match &self.remote {
            Some(path) => Ok(expand_path(path)),
            None => Ok(state_dir()?.join("remote.json")),
        }
    }

    /// Path of the managed-state file
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state {
            Some(path) => Ok(expand_path(path)),
            None => Ok(state_dir()?.join("state.toml")),
        }
    }

    /// Built-in schemas plus every configured catalog file
    pub fn catalog(&self) -> Result<Catalog> {
        let mut catalog =
            reconcile::catalog::builtin().context("Built-in schema catalog is invalid")?;

        for file in &self.catalogs {
            let path = expand_path(file);
            for schema in load_catalog_file(&path)? {
                let resource = schema.resource.clone();
                catalog.insert(schema).with_context(|| {
                    format!("Invalid schema '{resource}' in {}", path.display())
                })?;
                log::debug!("Loaded schema '{}' from {}", resource, path.display());
            }
        }

        Ok(catalog)
    }
}

// ============================================================================
// Catalog Files
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    resource: Vec<PolymorphicSchema>,
}

/// Parse a schema catalog file: one `[[resource]]` table per resource type
fn load_catalog_file(path: &Path) -> Result<Vec<PolymorphicSchema>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read catalog {}", path.display()))?;
    let file: CatalogFile = toml::from_str(&content)
        .with_context(|| format!("Invalid catalog file: {}", path.display()))?;
    Ok(file.resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::SchemaCatalog;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.product_version, Version::new(9, 2, 0, 0));
        assert_eq!(config.jobs, 4);
        assert!(config.catalogs.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "product_version = \"9.0\"\nremote = \"/tmp/remote.json\"\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.product_version, Version::new(9, 0, 0, 0));
        assert_eq!(config.jobs, 4);
        assert_eq!(
            config.remote_path().unwrap(),
            PathBuf::from("/tmp/remote.json")
        );
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "product_version = \"nine\"\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_catalog_file_extends_builtin() {
        let dir = TempDir::new().unwrap();
        let catalog_path = dir.path().join("extra.toml");
        fs::write(
            &catalog_path,
            r#"
[[resource]]
resource = "log_publisher"

[[resource.kind]]
name = "file-based-access"

[[resource.kind]]
name = "syslog-json-audit"
min_version = "9.2"

[[resource.attribute]]
name = "enabled"
type = "bool"
required = true

[[resource.attribute]]
name = "log_file"
type = "string"
kinds = ["file-based-access"]
"#,
        )
        .unwrap();

        let config = AppConfig {
            catalogs: vec![catalog_path.to_string_lossy().into_owned()],
            ..AppConfig::default()
        };
        let catalog = config.catalog().unwrap();

        let schema = catalog.require("log_publisher").unwrap();
        assert_eq!(schema.kinds.len(), 2);
        assert!(catalog.schema("passphrase_provider").is_some());
    }

    #[test]
    fn test_invalid_catalog_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let catalog_path = dir.path().join("broken.toml");
        fs::write(
            &catalog_path,
            "[[resource]]\nresource = \"empty\"\n",
        )
        .unwrap();

        let config = AppConfig {
            catalogs: vec![catalog_path.to_string_lossy().into_owned()],
            ..AppConfig::default()
        };
        assert!(config.catalog().is_err());
    }
}
