use std::collections::HashMap;

use super::{Argon2Hasher, HashAlgorithm};
use crate::error::{Error, Result};

/// Immutable map from algorithm id to its default configuration.
///
/// Built once at startup and shared (usually behind an `Arc`) by every
/// engine; exactly one entry is the default for new hashes.
#[derive(Debug)]
pub struct HashRegistry {
    algorithms: HashMap<&'static str, Box<dyn HashAlgorithm>>,
    default_id: &'static str,
}

impl Default for HashRegistry {
    fn default() -> Self {
        Self::with_default(Argon2Hasher::default())
    }
}

impl HashRegistry {
    /// Creates the standard registry: Argon2id with default costs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose only entry, `default`, is used for new hashes.
    pub fn with_default<A: HashAlgorithm + 'static>(default: A) -> Self {
        let default_id = default.id();
        let mut algorithms: HashMap<&'static str, Box<dyn HashAlgorithm>> = HashMap::new();
        algorithms.insert(default_id, Box::new(default));

        Self {
            algorithms,
            default_id,
        }
    }

    /// Adds an algorithm that records may reference.
    ///
    /// An entry with the same id is replaced, including the default one.
    pub fn register<A: HashAlgorithm + 'static>(mut self, algorithm: A) -> Self {
        self.algorithms.insert(algorithm.id(), Box::new(algorithm));
        self
    }

    /// Looks up the default configuration registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAlgorithm`] if nothing is registered under `id`.
    pub fn get(&self, id: &str) -> Result<&dyn HashAlgorithm> {
        self.algorithms
            .get(id)
            .map(|a| a.as_ref())
            .ok_or_else(|| Error::UnknownAlgorithm(id.to_string()))
    }

    pub fn default_id(&self) -> &'static str {
        self.default_id
    }

    /// The algorithm new records are created with.
    pub fn default_algorithm(&self) -> &dyn HashAlgorithm {
        // with_default() inserts the entry and register() can only replace it
        self.algorithms[self.default_id].as_ref()
    }

    /// Registered algorithm ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.algorithms.keys().copied()
    }
}
