//! Desired-configuration files
//!
//! A file lists the objects the user wants to exist, each tagged with its
//! resource type:
//!
//! ```toml
//! [[object]]
//! resource = "passphrase_provider"
//! type = "vault"
//! id = "vault-pin"
//!
//! [object.attributes]
//! enabled = true
//! vault_secret_path = "secret/ds"
//! ```
//!
//! JSON files with the same shape (`{"object": [...]}`) are accepted too.

use anyhow::{Context, Result, bail};
use reconcile::ConfigObject;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One declared object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Resource type, selects the schema table
    pub resource: String,
    #[serde(flatten)]
    pub object: ConfigObject,
}

impl Declaration {
    /// Display address, e.g. `passphrase_provider.vault-pin`
    pub fn address(&self) -> String {
        address(&self.resource, &self.object.id)
    }
}

/// Address of an instance: `resource.id`
pub fn address(resource: &str, id: &str) -> String {
    format!("{resource}.{id}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredConfig {
    #[serde(default, rename = "object")]
    pub objects: Vec<Declaration>,
}

impl DeclaredConfig {
    /// Load a desired-configuration file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        };
        for declaration in &mut config.objects {
            declaration
                .object
                .attributes
                .retain(|_, value| !value.is_absent());
        }

        config
            .check_unique()
            .with_context(|| format!("Invalid desired configuration: {}", path.display()))?;
        log::debug!(
            "Loaded {} object(s) from {}",
            config.objects.len(),
            path.display()
        );
        Ok(config)
    }

    /// Each `resource.id` may be declared only once
    fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for declaration in &self.objects {
            if declaration.object.id.is_empty() {
                bail!(
                    "{} object of kind '{}' has an empty id",
                    declaration.resource,
                    declaration.object.kind
                );
            }
            if !seen.insert(declaration.address()) {
                bail!("'{}' is declared more than once", declaration.address());
            }
        }
        Ok(())
    }

    pub fn find(&self, resource: &str, id: &str) -> Option<&Declaration> {
        self.objects
            .iter()
            .find(|d| d.resource == resource && d.object.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::AttributeValue;
    use tempfile::TempDir;

    const DESIRED: &str = r#"
[[object]]
resource = "passphrase_provider"
type = "vault"
id = "vault-pin"

[object.attributes]
enabled = true
vault_secret_path = "secret/ds"
description = ""

[[object]]
resource = "data_security_auditor"
type = "filter"
id = "admins"

[object.attributes]
enabled = true
report_file = "logs/admins"
filter = ["(ds-privilege-name=*)"]
"#;

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desired.toml");
        fs::write(&path, DESIRED).unwrap();

        let config = DeclaredConfig::load(&path).unwrap();
        assert_eq!(config.objects.len(), 2);

        let vault = config.find("passphrase_provider", "vault-pin").unwrap();
        assert_eq!(vault.object.kind, "vault");
        assert_eq!(vault.object.get("enabled"), &AttributeValue::Bool(true));
        assert_eq!(vault.address(), "passphrase_provider.vault-pin");

        let filter = config.find("data_security_auditor", "admins").unwrap();
        assert_eq!(
            filter.object.get("filter"),
            &AttributeValue::set(["(ds-privilege-name=*)"])
        );
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desired.json");
        fs::write(
            &path,
            r#"{"object": [{"resource": "global_configuration", "type": "global", "id": "config",
                "attributes": {"writability_mode": "internal-only", "location": null}}]}"#,
        )
        .unwrap();

        let config = DeclaredConfig::load(&path).unwrap();
        let global = config.find("global_configuration", "config").unwrap();
        assert_eq!(
            global.object.get("writability_mode").as_text(),
            Some("internal-only")
        );
        assert!(global.object.get("location").is_absent());
    }

    #[test]
    fn test_duplicate_address_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desired.toml");
        fs::write(
            &path,
            r#"
[[object]]
resource = "passphrase_provider"
type = "vault"
id = "pin"

[[object]]
resource = "passphrase_provider"
type = "file-based"
id = "pin"
"#,
        )
        .unwrap();

        let err = DeclaredConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("declared more than once"));
    }

    #[test]
    fn test_same_id_in_different_resources_is_allowed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desired.toml");
        fs::write(
            &path,
            r#"
[[object]]
resource = "passphrase_provider"
type = "third-party"
id = "custom"

[[object]]
resource = "data_security_auditor"
type = "third-party"
id = "custom"
"#,
        )
        .unwrap();

        assert_eq!(DeclaredConfig::load(&path).unwrap().objects.len(), 2);
    }
}
