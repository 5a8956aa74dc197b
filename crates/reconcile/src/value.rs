//! Typed, null-aware attribute values
//!
//! The remote configuration API treats an empty string and a missing value
//! as the same thing. Every comparison in this crate goes through
//! [`AttributeValue::normalize`] or [`AttributeValue::equivalent`], which
//! apply that convention explicitly: `""` and [`AttributeValue::Null`] are
//! indistinguishable for String and Enum attributes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeType {
    String,
    Bool,
    StringSet,
    Enum,
}

impl AttributeType {
    /// Whether values of this type are diffed element by element
    pub fn is_set(&self) -> bool {
        matches!(self, Self::StringSet)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::StringSet => write!(f, "string-set"),
            Self::Enum => write!(f, "enum"),
        }
    }
}

/// A string known to be one of its attribute's allowed values
///
/// Can only be built through [`EnumValue::new`], which checks membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EnumValue(String);

impl EnumValue {
    /// Validate `value` against `allowed` for attribute `field`
    pub fn new<S: AsRef<str>>(field: &str, value: &str, allowed: &[S]) -> Result<Self> {
        if allowed.iter().any(|a| a.as_ref() == value) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::InvalidEnumValue {
                field: field.to_string(),
                value: value.to_string(),
                allowed: allowed.iter().map(|a| a.as_ref().to_string()).collect(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a single attribute
///
/// On the wire values are untagged: `null`, a bool, a string or an array of
/// strings. Enum values serialize as their string and are never produced by
/// deserialization; [`PolymorphicSchema::coerce`] turns strings into
/// validated enums.
///
/// [`PolymorphicSchema::coerce`]: crate::schema::PolymorphicSchema::coerce
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    String(String),
    StringSet(BTreeSet<String>),
    #[serde(skip_deserializing)]
    Enum(EnumValue),
}

impl AttributeValue {
    /// Build a string set; duplicates collapse
    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(items.into_iter().map(Into::into).collect())
    }

    /// Build an enum value, mapping `""` to Null per the wire convention
    pub fn enumeration<S: AsRef<str>>(field: &str, value: &str, allowed: &[S]) -> Result<Self> {
        if value.is_empty() {
            return Ok(Self::Null);
        }
        EnumValue::new(field, value, allowed).map(Self::Enum)
    }

    /// Map empty String/Enum values to Null; everything else is unchanged
    pub fn normalize(self) -> Self {
        if self.is_absent() { Self::Null } else { self }
    }

    /// Whether this value means "not specified": Null or an empty String/Enum
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::Enum(e) => e.as_str().is_empty(),
            Self::Bool(_) | Self::StringSet(_) => false,
        }
    }

    /// Type-aware equality after normalization
    ///
    /// String sets compare as sets. String and Enum share a wire
    /// representation, so they compare by text.
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self.is_absent(), other.is_absent()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            (false, false) => {}
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::StringSet(a), Self::StringSet(b)) => a == b,
            _ => match (self.as_text(), other.as_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Text of a String or Enum value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Enum(e) => Some(e.as_str()),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::StringSet(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the runtime type, used in type mismatch reports
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::StringSet(_) => "string-set",
            Self::Enum(_) => "enum",
        }
    }

    /// Whether this value may be stored in an attribute of type `ty`
    pub fn conforms_to(&self, ty: AttributeType) -> bool {
        matches!(
            (self, ty),
            (Self::Null, _)
                | (Self::String(_), AttributeType::String)
                | (Self::Bool(_), AttributeType::Bool)
                | (Self::StringSet(_), AttributeType::StringSet)
                | (Self::Enum(_), AttributeType::Enum)
        )
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<EnumValue> for AttributeValue {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Enum(e) => write!(f, "{e}"),
            Self::StringSet(items) => {
                let items: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEVERITIES: &[&str] = &["info", "minor", "warning", "error"];

    #[test]
    fn test_normalize_empty_string_is_null() {
        assert_eq!(AttributeValue::from("").normalize(), AttributeValue::Null);
        assert_eq!(
            AttributeValue::from("x").normalize(),
            AttributeValue::from("x")
        );
        assert_eq!(
            AttributeValue::from(false).normalize(),
            AttributeValue::Bool(false)
        );
    }

    #[test]
    fn test_normalize_keeps_empty_set() {
        let empty = AttributeValue::set(Vec::<String>::new());
        assert_eq!(empty.clone().normalize(), empty);
    }

    #[test]
    fn test_set_deduplicates() {
        let set = AttributeValue::set(["b", "a", "b"]);
        assert_eq!(set.as_set().map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_equivalent_null_and_empty() {
        assert!(AttributeValue::Null.equivalent(&AttributeValue::from("")));
        assert!(AttributeValue::from("").equivalent(&AttributeValue::Null));
        assert!(!AttributeValue::Null.equivalent(&AttributeValue::from("x")));
    }

    #[test]
    fn test_equivalent_sets_ignore_order() {
        let a = AttributeValue::set(["x", "y", "z"]);
        let b = AttributeValue::set(["z", "x", "y", "x"]);
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&AttributeValue::set(["x"])));
    }

    #[test]
    fn test_equivalent_enum_and_string_by_text() {
        let e = AttributeValue::enumeration("severity", "info", SEVERITIES).unwrap();
        assert!(e.equivalent(&AttributeValue::from("info")));
        assert!(!e.equivalent(&AttributeValue::from("minor")));
    }

    #[test]
    fn test_equivalent_is_type_aware() {
        assert!(!AttributeValue::from(true).equivalent(&AttributeValue::from("true")));
        assert!(!AttributeValue::set(["a"]).equivalent(&AttributeValue::from("a")));
    }

    #[test]
    fn test_enum_rejects_unknown_value() {
        let err = AttributeValue::enumeration("severity", "loud", SEVERITIES).unwrap_err();
        match err {
            Error::InvalidEnumValue {
                field,
                value,
                allowed,
            } => {
                assert_eq!(field, "severity");
                assert_eq!(value, "loud");
                assert_eq!(allowed.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_enum_is_null() {
        let v = AttributeValue::enumeration("severity", "", SEVERITIES).unwrap();
        assert_eq!(v, AttributeValue::Null);
    }

    #[test]
    fn test_conforms_to() {
        assert!(AttributeValue::Null.conforms_to(AttributeType::Bool));
        assert!(AttributeValue::from("x").conforms_to(AttributeType::String));
        assert!(!AttributeValue::from("x").conforms_to(AttributeType::Enum));
        assert!(AttributeValue::set(["a"]).conforms_to(AttributeType::StringSet));
    }

    #[test]
    fn test_untagged_json() {
        let v: AttributeValue = serde_json::from_str(r#"["b","a"]"#).unwrap();
        assert_eq!(v, AttributeValue::set(["a", "b"]));
        let v: AttributeValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, AttributeValue::Null);
        let v: AttributeValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttributeValue::Bool(true));

        let e = AttributeValue::enumeration("severity", "minor", SEVERITIES).unwrap();
        assert_eq!(serde_json::to_string(&e).unwrap(), r#""minor""#);
    }
}
