//! Pluggable credential hashing.
//!
//! A [`HashAlgorithm`] turns a secret and a salt into raw output plus an
//! encoded parameter string. The [`HashRegistry`] maps algorithm ids to
//! default configurations and the [`HashEngine`] ties them to the
//! self-describing record format.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::Result;

pub mod argon;
pub mod engine;
pub mod registry;

pub use argon::{Argon2Hasher, Argon2Mode};
pub use engine::{HashEngine, RecordInfo, VerifyOutcome};
pub use registry::HashRegistry;

/// Result of hashing a secret.
pub struct HashOutput {
    /// Parameters the output was produced with, joined by the algorithm's
    /// parameter separator.
    pub parameters: String,
    /// Raw hash bytes. Never stored; keys the record MAC.
    pub raw: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for HashOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashOutput")
            .field("parameters", &self.parameters)
            .field("raw", &"[REDACTED]")
            .finish()
    }
}

/// A hash backend addressed by id.
///
/// Implementations are immutable configuration values: [`configure`]
/// returns a new value and never touches `self`, so one registry default
/// can serve concurrent verifications with different stored parameters.
///
/// [`configure`]: HashAlgorithm::configure
pub trait HashAlgorithm: fmt::Debug + fmt::Display + Send + Sync {
    /// Algorithm id as written in the first record field.
    fn id(&self) -> &'static str;

    fn mode(&self) -> &str;

    /// Output size, in bytes, of a freshly created hash.
    fn default_hash_size(&self) -> u32;

    fn hash(&self, secret: &[u8], salt: &[u8]) -> Result<HashOutput>;

    /// Builds a configuration from a stored parameter string, producing
    /// `hash_size` bytes of output.
    fn configure(
        &self,
        parameters: &str,
        separator: char,
        hash_size: u32,
    ) -> Result<Box<dyn HashAlgorithm>>;
}
