//! Error types for reconciliation.
//!
//! Schema and caller-input problems are reported by this crate; remote
//! failures are carried verbatim from the [`RemoteConfigClient`] so the
//! caller can decide between "drift, recreate" and "fail".
//!
//! [`RemoteConfigClient`]: crate::client::RemoteConfigClient

use crate::schema::Violation;
use crate::value::AttributeType;
use thiserror::Error;

/// Errors reported by a remote configuration client.
///
/// The core never retries or recovers from these; they surface unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote object does not exist
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Kind or resource type that was requested
        kind: String,
        /// Identifier of the missing object
        id: String,
    },

    /// A transient failure (connection reset, timeout, server busy)
    #[error("transient remote error: {message}")]
    Transient {
        /// Message from the client implementation
        message: String,
    },

    /// The remote side refused the request
    #[error("remote rejected request: {message}")]
    Rejected {
        /// Message from the client implementation
        message: String,
    },
}

impl RemoteError {
    /// Whether the remote object is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the failure is transient and may succeed when the caller tries again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Errors that can occur while validating, diffing or reconciling objects.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more schema, version or discriminator constraints are broken
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    /// A value does not match the declared attribute type
    #[error("attribute '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        /// Attribute name
        field: String,
        /// Type declared in the schema
        expected: AttributeType,
        /// Type name of the value that was supplied
        found: &'static str,
    },

    /// A string assigned to an enum attribute is outside its allowed set
    #[error("invalid value '{value}' for '{field}' (allowed: {})", .allowed.join(", "))]
    InvalidEnumValue {
        /// Attribute name
        field: String,
        /// Rejected value
        value: String,
        /// Values the attribute accepts
        allowed: Vec<String>,
    },

    /// A product version string could not be parsed
    #[error("invalid version '{0}' (expected major.minor.patch.build)")]
    InvalidVersion(String),

    /// A schema table is inconsistent (duplicate attribute, dangling kind, ...)
    #[error("invalid schema for '{resource}': {message}")]
    InvalidSchema {
        /// Resource type whose schema is broken
        resource: String,
        /// What is wrong with it
        message: String,
    },

    /// No schema is registered for a resource type
    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    /// The discriminator of a managed object changed
    #[error("cannot change type of '{id}' from '{from}' to '{to}' in place")]
    KindChanged {
        /// Object identifier
        id: String,
        /// Kind recorded in the last state
        from: String,
        /// Kind requested by the plan
        to: String,
    },

    /// Error surfaced from the remote configuration client
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error means the remote object no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_not_found())
    }

    /// Violations carried by a validation error, empty for other errors
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationReason;

    #[test]
    fn test_remote_error_helpers() {
        let not_found = RemoteError::NotFound {
            kind: "vault".into(),
            id: "v1".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        let transient = RemoteError::Transient {
            message: "connection reset".into(),
        };
        assert!(transient.is_transient());
        assert!(!Error::from(transient).is_not_found());
        assert!(Error::from(not_found).is_not_found());
    }

    #[test]
    fn test_validation_error_lists_every_violation() {
        let err = Error::Validation(vec![
            Violation::new("a", ViolationReason::Required),
            Violation::new("b", ViolationReason::UnknownAttribute),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("'a'"));
        assert!(msg.contains("'b'"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_invalid_enum_message_lists_allowed() {
        let err = Error::InvalidEnumValue {
            field: "severity".into(),
            value: "loud".into(),
            allowed: vec!["info".into(), "warning".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid value 'loud' for 'severity' (allowed: info, warning)"
        );
    }
}
