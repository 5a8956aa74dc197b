//! Reconciliation state machine
//!
//! A managed instance moves through
//! `Unmanaged -> (Create | Adopt) -> Managed -> Update* -> (Delete | Forget) -> Unmanaged`.
//! Adopt-only kinds always exist remotely: "create" fetches and patches the
//! existing object, and "delete" just stops tracking it.
//!
//! Every method performs at most one `get` and one mutating call, and all
//! operations of an update travel in a single patch request.

use crate::client::RemoteConfigClient;
use crate::diff::{Operation, diff};
use crate::error::{Error, Result};
use crate::object::ConfigObject;
use crate::schema::PolymorphicSchema;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Create a new remote object
    Create,
    /// Take over an object that always exists remotely
    Adopt,
    /// Patch a managed object
    Update,
    /// Managed object already matches
    NoOp,
    /// Delete the remote object
    Delete,
    /// Stop tracking an adopt-only object, leaving it in place
    Forget,
}

impl Transition {
    /// Whether the transition sends a mutating request
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp | Self::Forget)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Adopt => write!(f, "adopt"),
            Self::Update => write!(f, "update"),
            Self::NoOp => write!(f, "no-op"),
            Self::Delete => write!(f, "delete"),
            Self::Forget => write!(f, "forget"),
        }
    }
}

/// Plan-time view of what reconciliation would do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub transition: Transition,
    /// Operations that would be sent; for Create/Adopt, every specified field
    pub operations: Vec<Operation>,
}

/// Result of [`Reconciler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The server's response, or the unchanged last state
    pub object: ConfigObject,
    /// False when the diff was empty and no patch was sent
    pub operations_applied: bool,
    pub operations: Vec<Operation>,
}

/// Drives reconciliation of one resource type against a remote client
///
/// Holds no mutable state: one reconciler may serve many instances, and
/// several reconcilers may share a client across threads.
pub struct Reconciler<'a, C: RemoteConfigClient + ?Sized> {
    client: &'a C,
    schema: &'a PolymorphicSchema,
    product_version: Version,
}

impl<'a, C: RemoteConfigClient + ?Sized> Reconciler<'a, C> {
    pub fn new(client: &'a C, schema: &'a PolymorphicSchema, product_version: Version) -> Self {
        Self {
            client,
            schema,
            product_version,
        }
    }

    /// Validate and type `desired` before any remote call
    fn prepare(&self, desired: &ConfigObject) -> Result<ConfigObject> {
        self.schema.ensure_valid(desired, &self.product_version)?;
        self.schema.coerce(desired.clone())
    }

    /// Compute the transition and operations without talking to the remote
    pub fn plan(&self, desired: &ConfigObject, last: Option<&ConfigObject>) -> Result<PlannedChange> {
        let desired = self.prepare(desired)?;

        let (transition, operations) = match last {
            None => {
                let transition = if self.schema.is_adopt_only(&desired.kind) {
                    Transition::Adopt
                } else {
                    Transition::Create
                };
                let operations = diff(&desired, &desired.empty_like(), self.schema)?;
                (transition, operations)
            }
            Some(last) => {
                ensure_same_kind(&desired, last)?;
                let operations = diff(&desired, last, self.schema)?;
                let transition = if operations.is_empty() {
                    Transition::NoOp
                } else {
                    Transition::Update
                };
                (transition, operations)
            }
        };

        Ok(PlannedChange {
            transition,
            operations,
        })
    }

    /// Bring an unmanaged instance under management
    ///
    /// Ordinary kinds are created remotely. Adopt-only kinds are fetched,
    /// diffed and patched; they are never created.
    pub fn create(&self, desired: &ConfigObject) -> Result<ConfigObject> {
        let desired = self.prepare(desired)?;

        if self.schema.is_adopt_only(&desired.kind) {
            return self.adopt(&desired);
        }

        log::debug!(
            "Creating {} '{}' ({})",
            self.schema.resource,
            desired.id,
            desired.kind
        );
        let created = self.client.create(&desired.kind, &desired)?;
        Ok(created.normalized())
    }

    fn adopt(&self, desired: &ConfigObject) -> Result<ConfigObject> {
        log::debug!(
            "Adopting {} '{}' ({})",
            self.schema.resource,
            desired.id,
            desired.kind
        );
        let actual = self.client.get(&desired.kind, &desired.id)?.normalized();
        let operations = diff(desired, &actual, self.schema)?;

        if operations.is_empty() {
            log::info!(
                "Adopted {} '{}' already matches, no patch sent",
                self.schema.resource,
                desired.id
            );
            return Ok(actual);
        }

        let patched = self
            .client
            .patch(&desired.kind, &desired.id, &operations)?;
        Ok(patched.normalized())
    }

    /// Fetch the current remote object
    ///
    /// A missing object surfaces as [`RemoteError::NotFound`]; the caller
    /// decides whether that is drift or failure.
    ///
    /// [`RemoteError::NotFound`]: crate::RemoteError::NotFound
    pub fn read(&self, kind: &str, id: &str) -> Result<ConfigObject> {
        log::debug!("Reading {} '{}' ({})", self.schema.resource, id, kind);
        Ok(self.client.get(kind, id)?.normalized())
    }

    /// Converge a managed instance from `last_state` to `desired`
    ///
    /// An empty diff sends nothing and reports `operations_applied = false`.
    pub fn update(&self, desired: &ConfigObject, last_state: &ConfigObject) -> Result<UpdateOutcome> {
        let desired = self.prepare(desired)?;
        ensure_same_kind(&desired, last_state)?;

        let operations = diff(&desired, last_state, self.schema)?;
        if operations.is_empty() {
            log::info!(
                "No changes detected for {} '{}', skipping update",
                self.schema.resource,
                last_state.id
            );
            return Ok(UpdateOutcome {
                object: last_state.clone(),
                operations_applied: false,
                operations,
            });
        }

        log::debug!(
            "Patching {} '{}' with {} operation(s)",
            self.schema.resource,
            last_state.id,
            operations.len()
        );
        let object = self
            .client
            .patch(&last_state.kind, &last_state.id, &operations)?
            .normalized();

        Ok(UpdateOutcome {
            object,
            operations_applied: true,
            operations,
        })
    }

    /// Release a managed instance
    ///
    /// Adopt-only kinds are forgotten without any remote call.
    pub fn delete(&self, kind: &str, id: &str) -> Result<Transition> {
        if self.schema.is_adopt_only(kind) {
            log::debug!(
                "Forgetting {} '{}' ({}), remote object left in place",
                self.schema.resource,
                id,
                kind
            );
            return Ok(Transition::Forget);
        }

        log::debug!("Deleting {} '{}' ({})", self.schema.resource, id, kind);
        self.client.delete(kind, id)?;
        Ok(Transition::Delete)
    }
}

fn ensure_same_kind(desired: &ConfigObject, last: &ConfigObject) -> Result<()> {
    if desired.kind == last.kind {
        Ok(())
    } else {
        Err(Error::KindChanged {
            id: last.id.clone(),
            from: last.kind.clone(),
            to: desired.kind.clone(),
        })
    }
}
