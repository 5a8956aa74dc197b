//! # Reconcile
//!
//! Attribute-level reconciliation of remote configuration objects.
//!
//! Given the configuration a caller declares ("desired") and the last
//! configuration observed remotely ("actual"), this crate computes the
//! minimal set of attribute operations that make the remote object match,
//! while enforcing which attributes each kind carries and which product
//! versions support them.
//!
//! ## Core Concepts
//!
//! - **AttributeValue**: Null, String, Bool, StringSet or Enum, with the
//!   wire convention that `""` means "not set"
//! - **ConfigObject**: a kind discriminator, an id and typed attributes
//! - **PolymorphicSchema**: one table per resource type listing kinds and
//!   the attributes that apply to each
//! - **diff**: ordered Add/Remove/Replace operations between two objects
//! - **Reconciler**: Create/Adopt/Read/Update/Delete against an injected
//!   [`RemoteConfigClient`]
//!
//! ## Example
//!
//! ```
//! use reconcile::{
//!     AttributeSchema, ConfigObject, InMemoryClient, KindSpec, PolymorphicSchema, Reconciler,
//!     Version,
//! };
//!
//! let schema = PolymorphicSchema::new("passphrase_provider")
//!     .kind(KindSpec::new("environment-variable"))
//!     .attribute(AttributeSchema::bool("enabled").required())
//!     .attribute(AttributeSchema::string("environment_variable").required());
//!
//! let client = InMemoryClient::new();
//! let reconciler = Reconciler::new(&client, &schema, Version::new(9, 2, 0, 0));
//!
//! let desired = ConfigObject::new("environment-variable", "pin")
//!     .with("enabled", true)
//!     .with("environment_variable", "DS_PIN");
//! let state = reconciler.create(&desired)?;
//!
//! let outcome = reconciler.update(&desired, &state)?;
//! assert!(!outcome.operations_applied);
//! # Ok::<(), reconcile::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`RemoteConfigClient`]: transport to the configuration server
//! - [`SchemaCatalog`]: source of schema tables by resource type
//!
//! Nothing in this crate holds global state; clients and schemas are passed
//! to each [`Reconciler`].

pub mod catalog;
pub mod client;
pub mod diff;
pub mod error;
pub mod memory;
pub mod object;
pub mod reconciler;
pub mod schema;
pub mod value;
pub mod version;

// Re-export main types at crate root
pub use client::{RemoteConfigClient, RemoteResult};
pub use diff::{DiffSummary, Operation, OperationKind, diff};
pub use error::{Error, RemoteError, Result};
pub use memory::{Call, InMemoryClient};
pub use object::ConfigObject;
pub use reconciler::{PlannedChange, Reconciler, Transition, UpdateOutcome};
pub use schema::{
    AttributeSchema, Catalog, DISCRIMINATOR, KindSpec, PolymorphicSchema, SchemaCatalog,
    Violation, ViolationReason, validate,
};
pub use value::{AttributeType, AttributeValue, EnumValue};
pub use version::Version;
