//! Tamper-evident credential hashing and authenticated secret sealing.
//!
//! Two independent primitives for protecting secrets at rest:
//!
//! - [`HashEngine`] produces self-describing password hash records of the form
//!   `$argon2$id:4:65536$<salt>$<mac>`, verifies candidates against them and
//!   reports when a record should be recomputed with current defaults.
//! - [`AuthenticatedCipher`] seals byte payloads with XSalsa20-Poly1305 under
//!   random 32-byte keys, prefixing each message with its nonce.
//!
//! ```no_run
//! use credseal::HashEngine;
//!
//! let engine = HashEngine::default();
//! let record = engine.create(b"correct horse")?;
//! assert!(engine.verify(&record, b"correct horse")?);
//! # Ok::<(), credseal::Error>(())
//! ```

pub mod cipher;
mod error;
pub mod format;
pub mod hash;
pub mod random;
pub mod storage;

pub use crate::cipher::AuthenticatedCipher;
pub use crate::error::{Error, Result};
pub use crate::hash::{
    Argon2Hasher, Argon2Mode, HashAlgorithm, HashEngine, HashRegistry, RecordInfo, VerifyOutcome,
};
pub use crate::random::{OsRandom, RandomSource};
pub use crate::storage::AtomicFile;
