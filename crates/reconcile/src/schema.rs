//! Polymorphic schema tables and validation
//!
//! A resource type (for example `passphrase_provider`) has several kinds
//! selected by the `type` discriminator. Each attribute declares which kinds
//! it applies to and, optionally, the minimum product version that supports
//! it. One [`PolymorphicSchema`] table per resource type replaces per-kind
//! code: validation, coercion and diffing are all driven by the table.

use crate::error::{Error, Result};
use crate::object::ConfigObject;
use crate::value::{AttributeType, AttributeValue, EnumValue};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Attribute name used to report discriminator problems
pub const DISCRIMINATOR: &str = "type";

/// One kind (polymorphic variant) of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSpec {
    pub name: String,
    /// The object always exists remotely; it is adopted and forgotten,
    /// never created or deleted
    #[serde(default)]
    pub adopt_only: bool,
    /// First product version that supports this kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,
}

impl KindSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            adopt_only: false,
            min_version: None,
        }
    }

    pub fn adopt_only(mut self) -> Self {
        self.adopt_only = true;
        self
    }

    pub fn since(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }
}

/// Declaration of a single attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Required for every kind the attribute applies to
    #[serde(default)]
    pub required: bool,
    /// Kinds carrying this attribute; empty means every kind
    #[serde(default, rename = "kinds", skip_serializing_if = "BTreeSet::is_empty")]
    pub applicable_kinds: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,
    /// Allowed values of an enum attribute
    #[serde(default, rename = "allowed", skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl AttributeSchema {
    pub fn new(name: &str, attr_type: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            required: false,
            applicable_kinds: BTreeSet::new(),
            min_version: None,
            allowed_values: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn string_set(name: &str) -> Self {
        Self::new(name, AttributeType::StringSet)
    }

    pub fn enumeration<I, S>(name: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::new(name, AttributeType::Enum);
        schema.allowed_values = allowed.into_iter().map(Into::into).collect();
        schema
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict the attribute to the given kinds
    pub fn kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn since(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Whether the attribute belongs to `kind`
    pub fn applies_to(&self, kind: &str) -> bool {
        self.applicable_kinds.is_empty() || self.applicable_kinds.contains(kind)
    }

    /// Whether a runtime value is acceptable for this attribute
    ///
    /// Plain strings are accepted for enums: that is how the remote side
    /// reports them.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        value.conforms_to(self.attr_type)
            || (self.attr_type == AttributeType::Enum && matches!(value, AttributeValue::String(_)))
    }

    /// Convert a value to this attribute's declared type
    pub fn coerce(&self, value: AttributeValue) -> Result<AttributeValue> {
        match (self.attr_type, value) {
            (AttributeType::Enum, AttributeValue::String(s)) => {
                AttributeValue::enumeration(&self.name, &s, &self.allowed_values)
            }
            (AttributeType::Enum, AttributeValue::Enum(e)) => {
                EnumValue::new(&self.name, e.as_str(), &self.allowed_values).map(Into::into)
            }
            (ty, value) if value.conforms_to(ty) => Ok(value.normalize()),
            (ty, value) => Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: ty,
                found: value.type_name(),
            }),
        }
    }

    pub(crate) fn check_type(&self, value: &AttributeValue) -> Result<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.attr_type,
                found: value.type_name(),
            })
        }
    }
}

/// Why an object failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ViolationReason {
    /// The attribute is set but the object's kind does not carry it
    NotApplicable {
        kind: String,
        applicable_kinds: BTreeSet<String>,
    },
    /// The attribute or kind needs a newer product version
    UnsupportedVersion {
        min_version: Version,
        current_version: Version,
    },
    /// A required attribute is not set
    Required,
    /// The discriminator names no known kind
    UnknownKind { kind: String, known: Vec<String> },
    /// The attribute is not declared by the resource type at all
    UnknownAttribute,
}

/// A single failed constraint, reported against one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    #[serde(flatten)]
    pub reason: ViolationReason,
}

impl Violation {
    pub fn new(field: &str, reason: ViolationReason) -> Self {
        Self {
            field: field.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ViolationReason::NotApplicable {
                kind,
                applicable_kinds,
            } => {
                let kinds: Vec<&str> = applicable_kinds.iter().map(String::as_str).collect();
                write!(
                    f,
                    "'{}' is not applicable to kind '{}' (applies to: {})",
                    self.field,
                    kind,
                    kinds.join(", ")
                )
            }
            ViolationReason::UnsupportedVersion {
                min_version,
                current_version,
            } => write!(
                f,
                "'{}' requires product version {} or later (current: {})",
                self.field, min_version, current_version
            ),
            ViolationReason::Required => write!(f, "'{}' is required", self.field),
            ViolationReason::UnknownKind { kind, known } => write!(
                f,
                "'{}' has unknown value '{}' (expected one of: {})",
                self.field,
                kind,
                known.join(", ")
            ),
            ViolationReason::UnknownAttribute => {
                write!(f, "'{}' is not a known attribute", self.field)
            }
        }
    }
}

/// Schema table of one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolymorphicSchema {
    /// Resource type name, e.g. `passphrase_provider`
    pub resource: String,
    #[serde(default, rename = "kind")]
    pub kinds: Vec<KindSpec>,
    /// Attributes in declaration order; diffs follow this order
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeSchema>,
}

impl PolymorphicSchema {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            kinds: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: KindSpec) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Look up a kind by name
    pub fn find_kind(&self, name: &str) -> Option<&KindSpec> {
        self.kinds.iter().find(|k| k.name == name)
    }

    /// Look up an attribute by name
    pub fn find_attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether objects of `kind` are adopted instead of created
    pub fn is_adopt_only(&self, kind: &str) -> bool {
        self.find_kind(kind).is_some_and(|k| k.adopt_only)
    }

    /// Attributes that apply to `kind`, in declaration order
    pub fn fields_for<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a AttributeSchema> {
        self.attributes.iter().filter(move |a| a.applies_to(kind))
    }

    /// Validate an object against this table at `current_version`
    ///
    /// Every problem is collected. Discriminator problems come first, then
    /// attributes in declaration order, then undeclared attributes by name.
    /// An unknown kind still gets the checks of attributes shared by every
    /// kind and the undeclared-attribute pass; kind-specific attributes are
    /// skipped, since their applicability cannot be judged.
    pub fn validate(&self, obj: &ConfigObject, current_version: &Version) -> Vec<Violation> {
        let mut violations = Vec::new();

        let known_kind = match self.find_kind(&obj.kind) {
            None => {
                violations.push(Violation::new(
                    DISCRIMINATOR,
                    ViolationReason::UnknownKind {
                        kind: obj.kind.clone(),
                        known: self.kinds.iter().map(|k| k.name.clone()).collect(),
                    },
                ));
                false
            }
            Some(kind) => {
                if let Some(min) = &kind.min_version
                    && !current_version.satisfies(Some(min))
                {
                    violations.push(Violation::new(
                        DISCRIMINATOR,
                        ViolationReason::UnsupportedVersion {
                            min_version: *min,
                            current_version: *current_version,
                        },
                    ));
                }
                true
            }
        };

        for attr in &self.attributes {
            if !known_kind && !attr.applicable_kinds.is_empty() {
                continue;
            }
            let applies = attr.applies_to(&obj.kind);
            let supported = current_version.satisfies(attr.min_version.as_ref());

            if obj.is_set(&attr.name) {
                if !applies {
                    violations.push(Violation::new(
                        &attr.name,
                        ViolationReason::NotApplicable {
                            kind: obj.kind.clone(),
                            applicable_kinds: attr.applicable_kinds.clone(),
                        },
                    ));
                }
                if let Some(min) = &attr.min_version
                    && !supported
                {
                    violations.push(Violation::new(
                        &attr.name,
                        ViolationReason::UnsupportedVersion {
                            min_version: *min,
                            current_version: *current_version,
                        },
                    ));
                }
            } else if applies && attr.required && supported {
                violations.push(Violation::new(&attr.name, ViolationReason::Required));
            }
        }

        for (field, value) in &obj.attributes {
            if !value.is_absent() && self.find_attribute(field).is_none() {
                violations.push(Violation::new(field, ViolationReason::UnknownAttribute));
            }
        }

        violations
    }

    /// Validate, turning any violation into [`Error::Validation`]
    pub fn ensure_valid(&self, obj: &ConfigObject, current_version: &Version) -> Result<()> {
        let violations = self.validate(obj, current_version);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations))
        }
    }

    /// Convert every declared attribute of `obj` to its declared type
    ///
    /// Strings become validated enums; undeclared attributes pass through
    /// untouched for [`PolymorphicSchema::validate`] to report.
    pub fn coerce(&self, obj: ConfigObject) -> Result<ConfigObject> {
        let mut coerced = obj.empty_like();
        for (field, value) in obj.attributes {
            let value = match self.find_attribute(&field) {
                Some(attr) => attr.coerce(value)?,
                None => value,
            };
            coerced.set(&field, value);
        }
        Ok(coerced)
    }

    /// Check the table itself for inconsistencies
    pub fn check(&self) -> Result<()> {
        let invalid = |message: String| Error::InvalidSchema {
            resource: self.resource.clone(),
            message,
        };

        if self.kinds.is_empty() {
            return Err(invalid("no kinds declared".into()));
        }

        let mut kinds = HashSet::new();
        for kind in &self.kinds {
            if !kinds.insert(kind.name.as_str()) {
                return Err(invalid(format!("duplicate kind '{}'", kind.name)));
            }
        }

        let mut names = HashSet::new();
        for attr in &self.attributes {
            if attr.name == DISCRIMINATOR {
                return Err(invalid(format!(
                    "attribute name '{DISCRIMINATOR}' is reserved for the discriminator"
                )));
            }
            if !names.insert(attr.name.as_str()) {
                return Err(invalid(format!("duplicate attribute '{}'", attr.name)));
            }
            if let Some(kind) = attr
                .applicable_kinds
                .iter()
                .find(|k| !kinds.contains(k.as_str()))
            {
                return Err(invalid(format!(
                    "attribute '{}' references unknown kind '{}'",
                    attr.name, kind
                )));
            }
            match (attr.attr_type, attr.allowed_values.is_empty()) {
                (AttributeType::Enum, true) => {
                    return Err(invalid(format!(
                        "enum attribute '{}' has no allowed values",
                        attr.name
                    )));
                }
                (ty, false) if ty != AttributeType::Enum => {
                    return Err(invalid(format!(
                        "attribute '{}' lists allowed values but is {}",
                        attr.name, ty
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Validate `obj` against `schema`; see [`PolymorphicSchema::validate`]
pub fn validate(
    obj: &ConfigObject,
    current_version: &Version,
    schema: &PolymorphicSchema,
) -> Vec<Violation> {
    schema.validate(obj, current_version)
}

/// Source of schema tables, keyed by resource type
pub trait SchemaCatalog: Send + Sync {
    /// Schema of a resource type
    fn schema(&self, resource: &str) -> Option<&PolymorphicSchema>;

    /// Names of every resource type, sorted
    fn resources(&self) -> Vec<&str>;

    /// Schema of a resource type, or [`Error::UnknownResource`]
    fn require(&self, resource: &str) -> Result<&PolymorphicSchema> {
        self.schema(resource)
            .ok_or_else(|| Error::UnknownResource(resource.to_string()))
    }
}

/// In-memory [`SchemaCatalog`]
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: BTreeMap<String, PolymorphicSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a schema after checking it
    pub fn insert(&mut self, schema: PolymorphicSchema) -> Result<()> {
        schema.check()?;
        self.schemas.insert(schema.resource.clone(), schema);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaCatalog for Catalog {
    fn schema(&self, resource: &str) -> Option<&PolymorphicSchema> {
        self.schemas.get(resource)
    }

    fn resources(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V9_0: Version = Version::new(9, 0, 0, 0);
    const V9_2: Version = Version::new(9, 2, 0, 0);

    fn providers() -> PolymorphicSchema {
        PolymorphicSchema::new("passphrase_provider")
            .kind(KindSpec::new("environment-variable"))
            .kind(KindSpec::new("vault"))
            .kind(KindSpec::new("conjur").since(V9_2))
            .attribute(AttributeSchema::string("description"))
            .attribute(
                AttributeSchema::string("environment_variable")
                    .required()
                    .kinds(["environment-variable"]),
            )
            .attribute(
                AttributeSchema::string("vault_secret_path")
                    .required()
                    .kinds(["vault"]),
            )
            .attribute(
                AttributeSchema::string("http_proxy_external_server")
                    .kinds(["vault", "conjur"])
                    .since(V9_2),
            )
            .attribute(AttributeSchema::bool("enabled").required())
    }

    fn vault() -> ConfigObject {
        ConfigObject::new("vault", "v1")
            .with("enabled", true)
            .with("vault_secret_path", "secret/ds")
    }

    #[test]
    fn test_valid_object() {
        assert!(providers().validate(&vault(), &V9_0).is_empty());
    }

    #[test]
    fn test_not_applicable_reports_applicable_kinds() {
        let obj = vault().with("environment_variable", "DS_PIN");
        let violations = providers().validate(&obj, &V9_2);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "environment_variable");
        assert_eq!(
            violations[0].reason,
            ViolationReason::NotApplicable {
                kind: "vault".into(),
                applicable_kinds: BTreeSet::from(["environment-variable".to_string()]),
            }
        );
    }

    #[test]
    fn test_version_gate_on_attribute() {
        let obj = vault().with("http_proxy_external_server", "proxy");

        let violations = providers().validate(&obj, &V9_0);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "http_proxy_external_server");
        assert!(matches!(
            violations[0].reason,
            ViolationReason::UnsupportedVersion { min_version, .. } if min_version == V9_2
        ));

        assert!(providers().validate(&obj, &V9_2).is_empty());
    }

    #[test]
    fn test_version_gate_on_kind() {
        let obj = ConfigObject::new("conjur", "c1").with("enabled", true);
        let violations = providers().validate(&obj, &V9_0);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, DISCRIMINATOR);
        assert!(providers().validate(&obj, &V9_2).is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let obj = ConfigObject::new("vault", "v1")
            .with("environment_variable", "X")
            .with("http_proxy_external_server", "proxy")
            .with("colour", "blue");
        let violations = providers().validate(&obj, &V9_0);

        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "environment_variable",
                "vault_secret_path",
                "http_proxy_external_server",
                "enabled",
                "colour",
            ]
        );
        assert_eq!(violations[1].reason, ViolationReason::Required);
        assert_eq!(violations[4].reason, ViolationReason::UnknownAttribute);
    }

    #[test]
    fn test_empty_string_counts_as_missing_for_required() {
        let mut obj = vault();
        obj.attributes
            .insert("vault_secret_path".into(), AttributeValue::from(""));
        let violations = providers().validate(&obj, &V9_0);
        assert_eq!(
            violations,
            vec![Violation::new("vault_secret_path", ViolationReason::Required)]
        );
    }

    #[test]
    fn test_unknown_kind_keeps_shared_attribute_checks() {
        let obj = ConfigObject::new("hsm", "h1")
            .with("environment_variable", "X")
            .with("colour", "blue");
        let violations = providers().validate(&obj, &V9_2);

        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec![DISCRIMINATOR, "enabled", "colour"]);
        assert!(matches!(
            &violations[0].reason,
            ViolationReason::UnknownKind { kind, known } if kind == "hsm" && known.len() == 3
        ));
        assert_eq!(violations[1].reason, ViolationReason::Required);
        assert_eq!(violations[2].reason, ViolationReason::UnknownAttribute);
    }

    #[test]
    fn test_ensure_valid() {
        let schema = providers();
        assert!(schema.ensure_valid(&vault(), &V9_0).is_ok());
        let err = schema
            .ensure_valid(&ConfigObject::new("vault", "v1"), &V9_0)
            .unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_coerce_enum_and_type_mismatch() {
        let schema = PolymorphicSchema::new("auditor")
            .kind(KindSpec::new("filter"))
            .attribute(AttributeSchema::enumeration(
                "audit_severity",
                ["info", "warning"],
            ))
            .attribute(AttributeSchema::bool("enabled"));

        let obj = ConfigObject::new("filter", "f1").with("audit_severity", "warning");
        let coerced = schema.coerce(obj).unwrap();
        assert!(matches!(
            coerced.get("audit_severity"),
            AttributeValue::Enum(e) if e.as_str() == "warning"
        ));

        let bad = ConfigObject::new("filter", "f1").with("audit_severity", "loud");
        assert!(matches!(
            schema.coerce(bad).unwrap_err(),
            Error::InvalidEnumValue { .. }
        ));

        let mismatch = ConfigObject::new("filter", "f1").with("enabled", "yes");
        assert!(matches!(
            schema.coerce(mismatch).unwrap_err(),
            Error::TypeMismatch { found: "string", .. }
        ));
    }

    #[test]
    fn test_check_rejects_inconsistent_tables() {
        assert!(providers().check().is_ok());

        let dangling = providers().attribute(AttributeSchema::string("x").kinds(["hsm"]));
        assert!(matches!(
            dangling.check().unwrap_err(),
            Error::InvalidSchema { .. }
        ));

        let duplicate = providers().attribute(AttributeSchema::bool("enabled"));
        assert!(duplicate.check().is_err());

        let enum_without_values =
            providers().attribute(AttributeSchema::new("mode", AttributeType::Enum));
        assert!(enum_without_values.check().is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = Catalog::new();
        catalog.insert(providers()).unwrap();
        assert_eq!(catalog.resources(), vec!["passphrase_provider"]);
        assert!(catalog.require("passphrase_provider").is_ok());
        assert!(matches!(
            catalog.require("auditor").unwrap_err(),
            Error::UnknownResource(_)
        ));
    }

    #[test]
    fn test_schema_from_toml() {
        let schema: PolymorphicSchema = toml::from_str(
            r#"
            resource = "key_manager_provider"

            [[kind]]
            name = "file-based"

            [[kind]]
            name = "pkcs11"
            min_version = "9.1"

            [[attribute]]
            name = "key_store_file"
            type = "string"
            required = true
            kinds = ["file-based"]

            [[attribute]]
            name = "key_store_type"
            type = "enum"
            allowed = ["JKS", "PKCS12"]
            "#,
        )
        .unwrap();

        assert!(schema.check().is_ok());
        assert_eq!(
            schema.find_kind("pkcs11").unwrap().min_version,
            Some(Version::new(9, 1, 0, 0))
        );
        let names: Vec<&str> = schema.fields_for("pkcs11").map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["key_store_type"]);
    }
}
