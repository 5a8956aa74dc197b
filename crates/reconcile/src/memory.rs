//! In-memory remote configuration store
//!
//! A [`RemoteConfigClient`] that keeps objects in a map and records every
//! call it receives. Hosts use it as a local stand-in for the remote server
//! and cap the call log with [`InMemoryClient::with_call_limit`]; tests use
//! the log to assert exact remote traffic.

use crate::client::{RemoteConfigClient, RemoteResult};
use crate::diff::Operation;
use crate::error::RemoteError;
use crate::object::ConfigObject;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// A call received by [`InMemoryClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get {
        kind: String,
        id: String,
    },
    Create {
        kind: String,
        id: String,
    },
    Patch {
        kind: String,
        id: String,
        operations: Vec<Operation>,
    },
    Delete {
        kind: String,
        id: String,
    },
}

impl Call {
    /// Short method name, e.g. `"patch"`
    pub fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Create { .. } => "create",
            Self::Patch { .. } => "patch",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    objects: BTreeMap<(String, String), ConfigObject>,
    calls: VecDeque<Call>,
    call_limit: Option<usize>,
    call_count: usize,
    fail_next: Option<RemoteError>,
}

/// Map-backed client with a call log and failure injection
#[derive(Debug, Default)]
pub struct InMemoryClient {
    store: Mutex<Store>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client pre-populated with `objects`
    pub fn with_objects<I: IntoIterator<Item = ConfigObject>>(objects: I) -> Self {
        let client = Self::new();
        for object in objects {
            client.insert(object);
        }
        client
    }

    /// Keep only the most recent `limit` calls in the log
    ///
    /// [`InMemoryClient::call_count`] still counts every call.
    #[must_use]
    pub fn with_call_limit(self, limit: usize) -> Self {
        {
            let mut store = self.lock();
            store.call_limit = Some(limit);
            while store.calls.len() > limit {
                store.calls.pop_front();
            }
        }
        self
    }

    /// Put an object directly into the store, bypassing the call log
    pub fn insert(&self, object: ConfigObject) {
        let object = object.normalized();
        self.lock()
            .objects
            .insert((object.kind.clone(), object.id.clone()), object);
    }

    /// Every stored object, ordered by kind then id
    pub fn objects(&self) -> Vec<ConfigObject> {
        self.lock().objects.values().cloned().collect()
    }

    /// Look up a stored object without recording a call
    pub fn peek(&self, kind: &str, id: &str) -> Option<ConfigObject> {
        self.lock()
            .objects
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    /// Logged calls, oldest first
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Calls received since creation or the last [`InMemoryClient::clear_calls`]
    pub fn call_count(&self) -> usize {
        self.lock().call_count
    }

    pub fn clear_calls(&self) {
        let mut store = self.lock();
        store.calls.clear();
        store.call_count = 0;
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: RemoteError) {
        self.lock().fail_next = Some(error);
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record `call` and return the store, or the injected failure
    fn begin(&self, call: Call) -> RemoteResult<MutexGuard<'_, Store>> {
        let mut store = self.lock();
        store.call_count += 1;
        store.calls.push_back(call);
        if let Some(limit) = store.call_limit
            && store.calls.len() > limit
        {
            store.calls.pop_front();
        }
        let failure = store.fail_next.take();
        match failure {
            Some(error) => Err(error),
            None => Ok(store),
        }
    }
}

fn key(kind: &str, id: &str) -> (String, String) {
    (kind.to_string(), id.to_string())
}

fn not_found(kind: &str, id: &str) -> RemoteError {
    RemoteError::NotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

impl RemoteConfigClient for InMemoryClient {
    fn get(&self, kind: &str, id: &str) -> RemoteResult<ConfigObject> {
        let store = self.begin(Call::Get {
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        store
            .objects
            .get(&key(kind, id))
            .cloned()
            .ok_or_else(|| not_found(kind, id))
    }

    fn create(&self, kind: &str, object: &ConfigObject) -> RemoteResult<ConfigObject> {
        let mut store = self.begin(Call::Create {
            kind: kind.to_string(),
            id: object.id.clone(),
        })?;

        let key = key(kind, &object.id);
        if store.objects.contains_key(&key) {
            return Err(RemoteError::Rejected {
                message: format!("{kind} '{}' already exists", object.id),
            });
        }

        let mut stored = object.clone().normalized();
        stored.kind = kind.to_string();
        store.objects.insert(key, stored.clone());
        Ok(stored)
    }

    fn patch(&self, kind: &str, id: &str, operations: &[Operation]) -> RemoteResult<ConfigObject> {
        let mut store = self.begin(Call::Patch {
            kind: kind.to_string(),
            id: id.to_string(),
            operations: operations.to_vec(),
        })?;

        let key = key(kind, id);
        let current = store.objects.get(&key).ok_or_else(|| not_found(kind, id))?;
        let patched = current
            .apply(operations)
            .map_err(|e| RemoteError::Rejected {
                message: e.to_string(),
            })?;
        store.objects.insert(key, patched.clone());
        Ok(patched)
    }

    fn delete(&self, kind: &str, id: &str) -> RemoteResult<()> {
        let mut store = self.begin(Call::Delete {
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        store
            .objects
            .remove(&key(kind, id))
            .map(|_| ())
            .ok_or_else(|| not_found(kind, id))
    }
}
