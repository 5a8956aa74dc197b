//! Built-in schema tables
//!
//! Tables for the resource types this crate ships with. Hosts can add
//! their own through [`Catalog::insert`].

use crate::error::Result;
use crate::schema::{AttributeSchema, Catalog, KindSpec, PolymorphicSchema};
use crate::version::Version;

const V9_0: Version = Version::new(9, 0, 0, 0);
const V9_2: Version = Version::new(9, 2, 0, 0);

const SEVERITIES: [&str; 5] = ["verbose", "info", "minor", "warning", "error"];

/// Catalog of every built-in resource type
pub fn builtin() -> Result<Catalog> {
    let mut catalog = Catalog::new();
    catalog.insert(passphrase_provider())?;
    catalog.insert(data_security_auditor())?;
    catalog.insert(global_configuration())?;
    Ok(catalog)
}

/// Sources of secret passphrases (PINs for key and trust stores)
pub fn passphrase_provider() -> PolymorphicSchema {
    const CACHING: [&str; 5] = [
        "vault",
        "file-based",
        "amazon-secrets-manager",
        "azure-key-vault",
        "conjur",
    ];

    PolymorphicSchema::new("passphrase_provider")
        .kind(KindSpec::new("environment-variable"))
        .kind(KindSpec::new("vault"))
        .kind(KindSpec::new("file-based"))
        .kind(KindSpec::new("amazon-secrets-manager"))
        .kind(KindSpec::new("azure-key-vault"))
        .kind(KindSpec::new("conjur").since(V9_0))
        .kind(KindSpec::new("obscured-value"))
        .kind(KindSpec::new("third-party"))
        .attribute(AttributeSchema::string("description"))
        .attribute(AttributeSchema::bool("enabled").required())
        .attribute(
            AttributeSchema::string("environment_variable")
                .required()
                .kinds(["environment-variable"]),
        )
        .attribute(
            AttributeSchema::string("vault_external_server")
                .required()
                .kinds(["vault"]),
        )
        .attribute(
            AttributeSchema::string("vault_secret_path")
                .required()
                .kinds(["vault"]),
        )
        .attribute(
            AttributeSchema::string("vault_secret_field_name")
                .required()
                .kinds(["vault"]),
        )
        .attribute(
            AttributeSchema::string("password_file")
                .required()
                .kinds(["file-based"]),
        )
        .attribute(
            AttributeSchema::string("aws_external_service")
                .required()
                .kinds(["amazon-secrets-manager"]),
        )
        .attribute(
            AttributeSchema::string("secret_id")
                .required()
                .kinds(["amazon-secrets-manager"]),
        )
        .attribute(
            AttributeSchema::string("secret_field_name")
                .required()
                .kinds(["amazon-secrets-manager"]),
        )
        .attribute(AttributeSchema::string("secret_version_id").kinds(["amazon-secrets-manager"]))
        .attribute(
            AttributeSchema::string("secret_version_stage").kinds(["amazon-secrets-manager"]),
        )
        .attribute(
            AttributeSchema::string("key_vault_uri")
                .required()
                .kinds(["azure-key-vault"]),
        )
        .attribute(
            AttributeSchema::string("azure_authentication_method")
                .required()
                .kinds(["azure-key-vault"]),
        )
        .attribute(
            AttributeSchema::string("secret_name")
                .required()
                .kinds(["azure-key-vault"]),
        )
        .attribute(
            AttributeSchema::string("conjur_external_server")
                .required()
                .kinds(["conjur"]),
        )
        .attribute(
            AttributeSchema::string("conjur_secret_relative_path")
                .required()
                .kinds(["conjur"]),
        )
        .attribute(
            AttributeSchema::string("http_proxy_external_server")
                .kinds(["amazon-secrets-manager", "azure-key-vault", "vault", "conjur"])
                .since(V9_2),
        )
        .attribute(
            AttributeSchema::string("obscured_value")
                .required()
                .kinds(["obscured-value"]),
        )
        .attribute(AttributeSchema::string("max_cache_duration").kinds(CACHING))
        .attribute(
            AttributeSchema::string("extension_class")
                .required()
                .kinds(["third-party"]),
        )
        .attribute(AttributeSchema::string_set("extension_argument").kinds(["third-party"]))
}

/// Periodic audits of entries for security problems
pub fn data_security_auditor() -> PolymorphicSchema {
    PolymorphicSchema::new("data_security_auditor")
        .kind(KindSpec::new("expired-password"))
        .kind(KindSpec::new("idle-account"))
        .kind(KindSpec::new("disabled-account"))
        .kind(KindSpec::new("weakly-encoded-password"))
        .kind(KindSpec::new("privilege"))
        .kind(KindSpec::new("account-usability-issues"))
        .kind(KindSpec::new("locked-account"))
        .kind(KindSpec::new("filter"))
        .kind(KindSpec::new("account-validity-window"))
        .kind(KindSpec::new("multiple-password"))
        .kind(KindSpec::new("deprecated-password-storage-scheme"))
        .kind(KindSpec::new("nonexistent-password-policy"))
        .kind(KindSpec::new("access-control"))
        .kind(KindSpec::new("third-party"))
        .attribute(AttributeSchema::string("description"))
        .attribute(AttributeSchema::bool("enabled").required())
        .attribute(AttributeSchema::string("report_file").required())
        .attribute(AttributeSchema::string_set("include_attribute"))
        .attribute(AttributeSchema::string_set("audit_backend"))
        .attribute(AttributeSchema::enumeration("audit_severity", SEVERITIES))
        .attribute(
            AttributeSchema::string("password_expiration_warning_interval")
                .kinds(["expired-password"]),
        )
        .attribute(
            AttributeSchema::string("idle_account_warning_interval")
                .required()
                .kinds(["idle-account"]),
        )
        .attribute(AttributeSchema::string("idle_account_error_interval").kinds(["idle-account"]))
        .attribute(
            AttributeSchema::string("never_logged_in_account_warning_interval")
                .kinds(["idle-account"]),
        )
        .attribute(
            AttributeSchema::string("never_logged_in_account_error_interval")
                .kinds(["idle-account"]),
        )
        .attribute(
            AttributeSchema::string_set("weak_password_storage_scheme")
                .kinds(["weakly-encoded-password"]),
        )
        .attribute(
            AttributeSchema::string_set("weak_crypt_encoding").kinds(["weakly-encoded-password"]),
        )
        .attribute(
            AttributeSchema::string("account_expiration_warning_interval")
                .kinds(["account-validity-window"]),
        )
        .attribute(
            AttributeSchema::string_set("filter")
                .required()
                .kinds(["filter"]),
        )
        .attribute(
            AttributeSchema::string_set("ignored_privilege")
                .kinds(["privilege"])
                .since(V9_2),
        )
        .attribute(
            AttributeSchema::string("extension_class")
                .required()
                .kinds(["third-party"]),
        )
        .attribute(AttributeSchema::string_set("extension_argument").kinds(["third-party"]))
}

/// Server-wide settings; the single object always exists
pub fn global_configuration() -> PolymorphicSchema {
    PolymorphicSchema::new("global_configuration")
        .kind(KindSpec::new("global").adopt_only())
        .attribute(AttributeSchema::string("location"))
        .attribute(AttributeSchema::enumeration(
            "writability_mode",
            ["enabled", "disabled", "internal-only"],
        ))
        .attribute(AttributeSchema::bool("bind_with_dn_requires_password"))
        .attribute(AttributeSchema::string_set("disabled_privilege"))
        .attribute(AttributeSchema::string("size_limit"))
        .attribute(AttributeSchema::enumeration(
            "unrecoverable_database_error_mode",
            [
                "enter-lockdown-mode",
                "raise-unavailable-alarm",
                "initiate-server-shutdown",
            ],
        ))
        .attribute(AttributeSchema::string_set("tracked_application").since(V9_2))
}
