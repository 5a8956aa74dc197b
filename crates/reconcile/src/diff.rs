//! Attribute-level diff between a desired and an actual object

use crate::error::Result;
use crate::object::ConfigObject;
use crate::schema::PolymorphicSchema;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What an operation does to its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Add one element to a string set
    Add,
    /// Remove one element from a string set
    Remove,
    /// Replace a scalar value
    Replace,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// One attribute-level instruction for the remote patch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub field: String,
    pub op: OperationKind,
    pub value: AttributeValue,
}

impl Operation {
    pub fn add(field: &str, element: &str) -> Self {
        Self {
            field: field.to_string(),
            op: OperationKind::Add,
            value: AttributeValue::from(element),
        }
    }

    pub fn remove(field: &str, element: &str) -> Self {
        Self {
            field: field.to_string(),
            op: OperationKind::Remove,
            value: AttributeValue::from(element),
        }
    }

    pub fn replace(field: &str, value: AttributeValue) -> Self {
        Self {
            field: field.to_string(),
            op: OperationKind::Replace,
            value,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op, self.field, self.value)
    }
}

/// Compute the operations that turn `actual` into `desired`
///
/// Fields are visited in the schema's declaration order for `desired.kind`:
///
/// - string sets emit `Add` for each missing element, then `Remove` for each
///   extra one, both sorted; an unset desired set is left alone
/// - scalars emit one `Replace` when desired is set and not equivalent to
///   actual; an unset desired scalar is never touched, so server-assigned
///   values survive updates
///
/// Desired values are coerced to their declared type first, so a string
/// outside an enum's allowed set fails with
/// [`Error::InvalidEnumValue`](crate::Error::InvalidEnumValue). Actual values
/// may carry enums as plain strings, as the remote reports them. Anything
/// else that does not match its declared type fails the whole diff with
/// [`Error::TypeMismatch`](crate::Error::TypeMismatch).
pub fn diff(
    desired: &ConfigObject,
    actual: &ConfigObject,
    schema: &PolymorphicSchema,
) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();

    for attr in schema.fields_for(&desired.kind) {
        let want = attr.coerce(desired.get(&attr.name).clone().normalize())?;
        let have = actual.get(&attr.name).clone().normalize();
        attr.check_type(&have)?;

        if attr.attr_type.is_set() {
            let Some(want) = want.as_set() else {
                continue;
            };
            let empty = BTreeSet::new();
            let have = have.as_set().unwrap_or(&empty);

            // BTreeSet differences iterate in sorted order
            operations.extend(
                want.difference(have)
                    .map(|element| Operation::add(&attr.name, element)),
            );
            operations.extend(
                have.difference(want)
                    .map(|element| Operation::remove(&attr.name, element)),
            );
        } else if !want.is_absent() && !want.equivalent(&have) {
            operations.push(Operation::replace(&attr.name, want));
        }
    }

    Ok(operations)
}

/// Operation counts, for plan summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub replacements: usize,
}

impl DiffSummary {
    pub fn from_operations(operations: &[Operation]) -> Self {
        let mut summary = Self::default();
        for op in operations {
            match op.op {
                OperationKind::Add => summary.additions += 1,
                OperationKind::Remove => summary.removals += 1,
                OperationKind::Replace => summary.replacements += 1,
            }
        }
        summary
    }

    /// Total number of operations
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.replacements
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &DiffSummary) {
        self.additions += other.additions;
        self.removals += other.removals;
        self.replacements += other.replacements;
    }
}
