//! Remote configuration client trait
//!
//! The reconciler talks to the remote configuration API only through this
//! trait, so it can be used without depending on a specific transport.
//! Timeouts, cancellation and retries belong to the implementation.

use crate::diff::Operation;
use crate::error::RemoteError;
use crate::object::ConfigObject;

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Provider of remote configuration objects
///
/// Implement this trait over whatever transport reaches the configuration
/// server. Each method is one blocking request/response exchange.
pub trait RemoteConfigClient: Send + Sync {
    /// Fetch an object, or [`RemoteError::NotFound`] if it does not exist
    fn get(&self, kind: &str, id: &str) -> RemoteResult<ConfigObject>;

    /// Create an object and return it as the server stored it
    fn create(&self, kind: &str, object: &ConfigObject) -> RemoteResult<ConfigObject>;

    /// Apply every operation in one atomic request
    fn patch(&self, kind: &str, id: &str, operations: &[Operation]) -> RemoteResult<ConfigObject>;

    /// Delete an object
    fn delete(&self, kind: &str, id: &str) -> RemoteResult<()>;
}
