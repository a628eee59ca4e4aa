//! Secure random byte generation.

use crate::error::{Error, Result};

/// A source of cryptographically secure random bytes.
///
/// Implementations must either fill the whole buffer or fail; a short read
/// is never partial success.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;

    /// Returns exactly `length` random bytes.
    fn generate(&self, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.fill(&mut buf)?;
        Ok(buf)
    }
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf).map_err(|_| Error::InsufficientEntropy {
            requested: buf.len(),
        })
    }
}
