//! Name-keyed extension registry.
//!
//! Every pluggable surface in the crate (codecs, selectors, balancers,
//! pools, transports) is a map from a name to an implementation with a
//! sentinel default: looking up an unknown name yields the default instead
//! of failing. Registries are populated during process initialization and
//! read-only at steady state; the lock is uncontended on the hot path.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A concurrent name → implementation map with a sentinel default.
pub struct Registry<T: ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
    default: Arc<T>,
}

impl<T: ?Sized> Registry<T> {
    /// Create a registry whose default is also registered under
    /// `default_name`.
    pub fn new(default_name: &str, default: Arc<T>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(default_name.to_string(), default.clone());
        Self { entries: RwLock::new(entries), default }
    }

    /// Register an implementation, replacing any prior entry with the same
    /// name.
    pub fn register(&self, name: impl Into<String>, value: Arc<T>) {
        self.entries.write().unwrap().insert(name.into(), value);
    }

    /// Look up an implementation by name, falling back to the default.
    pub fn get(&self, name: &str) -> Arc<T> {
        self.entries
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// The sentinel default.
    pub fn default_entry(&self) -> Arc<T> {
        self.default.clone()
    }
}
