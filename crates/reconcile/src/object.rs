//! Configuration objects - a kind discriminator plus typed attributes

use crate::diff::{Operation, OperationKind};
use crate::error::{Error, Result};
use crate::value::{AttributeType, AttributeValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

static NULL: AttributeValue = AttributeValue::Null;

/// A remote configuration object
///
/// Attributes never hold absent values: setting a field to Null or `""`
/// removes it, so two objects that differ only in how they spell "not set"
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigObject {
    /// Discriminator selecting the polymorphic variant
    #[serde(rename = "type")]
    pub kind: String,
    /// Object identifier, unique within its resource type
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl ConfigObject {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style [`ConfigObject::set`]
    pub fn with(mut self, field: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(field, value.into());
        self
    }

    /// Set a field, normalizing absent values away
    pub fn set(&mut self, field: &str, value: AttributeValue) {
        match value.normalize() {
            AttributeValue::Null => {
                self.attributes.remove(field);
            }
            value => {
                self.attributes.insert(field.to_string(), value);
            }
        }
    }

    /// Value of a field, Null when unset
    pub fn get(&self, field: &str) -> &AttributeValue {
        self.attributes.get(field).unwrap_or(&NULL)
    }

    /// Whether a field holds a non-absent value
    pub fn is_set(&self, field: &str) -> bool {
        !self.get(field).is_absent()
    }

    /// Drop absent values that arrived through deserialization
    pub fn normalized(mut self) -> Self {
        self.attributes.retain(|_, value| !value.is_absent());
        self
    }

    /// An object of the same kind and id with no attributes
    pub fn empty_like(&self) -> Self {
        Self::new(self.kind.clone(), self.id.clone())
    }

    /// Apply operations locally, returning the patched object
    ///
    /// Add/Remove create the set when the field is unset. A set that loses
    /// its last element stays as an empty set.
    pub fn apply(&self, operations: &[Operation]) -> Result<Self> {
        let mut next = self.clone();

        for op in operations {
            if op.op == OperationKind::Replace {
                next.set(&op.field, op.value.clone());
                continue;
            }

            let element = op.value.as_text().ok_or_else(|| Error::TypeMismatch {
                field: op.field.clone(),
                expected: AttributeType::String,
                found: op.value.type_name(),
            })?;

            let mut set = match next.attributes.remove(&op.field) {
                None => BTreeSet::new(),
                Some(AttributeValue::StringSet(set)) => set,
                Some(other) => {
                    return Err(Error::TypeMismatch {
                        field: op.field.clone(),
                        expected: AttributeType::StringSet,
                        found: other.type_name(),
                    });
                }
            };

            if op.op == OperationKind::Add {
                set.insert(element.to_string());
            } else {
                set.remove(element);
            }
            next.attributes
                .insert(op.field.clone(), AttributeValue::StringSet(set));
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_normalizes_empty_to_absent() {
        let obj = ConfigObject::new("vault", "v1")
            .with("description", "")
            .with("vault_secret_path", "secret/ds");
        assert!(!obj.attributes.contains_key("description"));
        assert_eq!(obj.get("description"), &AttributeValue::Null);
        assert!(obj.is_set("vault_secret_path"));
    }

    #[test]
    fn test_set_null_clears_field() {
        let mut obj = ConfigObject::new("vault", "v1").with("description", "x");
        obj.set("description", AttributeValue::Null);
        assert!(obj.attributes.is_empty());
    }

    #[test]
    fn test_apply_operations() {
        let actual = ConfigObject::new("filter", "f1")
            .with("enabled", false)
            .with("include_attribute", AttributeValue::set(["b", "c"]));

        let ops = vec![
            Operation::replace("enabled", AttributeValue::Bool(true)),
            Operation::add("include_attribute", "a"),
            Operation::remove("include_attribute", "c"),
            Operation::add("audit_backend", "userRoot"),
        ];

        let patched = actual.apply(&ops).unwrap();
        assert_eq!(patched.get("enabled"), &AttributeValue::Bool(true));
        assert_eq!(
            patched.get("include_attribute"),
            &AttributeValue::set(["a", "b"])
        );
        assert_eq!(patched.get("audit_backend"), &AttributeValue::set(["userRoot"]));
        // source is untouched
        assert_eq!(actual.get("enabled"), &AttributeValue::Bool(false));
    }

    #[test]
    fn test_apply_add_to_scalar_is_type_mismatch() {
        let actual = ConfigObject::new("vault", "v1").with("description", "x");
        let err = actual
            .apply(&[Operation::add("description", "y")])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_deserialize_drops_nulls() {
        let json = r#"{"type":"vault","id":"v1","attributes":{"description":null,"vault_secret_field_name":"pw"}}"#;
        let obj: ConfigObject = serde_json::from_str(json).unwrap();
        let obj = obj.normalized();
        assert_eq!(obj.attributes.len(), 1);
        assert_eq!(obj.kind, "vault");
    }
}
