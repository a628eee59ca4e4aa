//! Authenticated secret sealing with XSalsa20-Poly1305.
//!
//! Sealed message layout:
//! ```text
//! NONCE (24) | TAG (16) | CIPHERTEXT
//! ```
//! The tag-first body is the NaCl `secretbox` layout, so messages sealed by
//! other secretbox implementations open here and vice versa.

use std::sync::Arc;

use crypto_secretbox::{
    XSalsa20Poly1305,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::random::{OsRandom, RandomSource};

/// Length of a symmetric key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the nonce (24 bytes for XSalsa20).
pub const NONCE_LEN: usize = 24;
/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;

/// Seals and opens byte payloads under caller-held 32-byte keys.
#[derive(Clone)]
pub struct AuthenticatedCipher {
    rng: Arc<dyn RandomSource>,
}

impl Default for AuthenticatedCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticatedCipher {
    pub fn new() -> Self {
        Self::with_random_source(Arc::new(OsRandom))
    }

    pub fn with_random_source(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Generates a fresh random key.
    pub fn generate_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        self.rng.fill(&mut key[..])?;
        Ok(key)
    }

    fn generate_nonce(&self) -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce)?;
        Ok(nonce)
    }

    /// Encrypts `plaintext` under a fresh nonce and returns `nonce || box`.
    ///
    /// # Errors
    ///
    /// Returns an error if no nonce can be generated or `key` is not
    /// [`KEY_LEN`] bytes.
    pub fn seal(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.generate_nonce()?;
        let cipher = secretbox(key)?;

        let ciphertext = cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .map_err(|_| Error::InvalidSize("plaintext too long to seal".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Opens a message produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the message is too short to
    /// hold a nonce and tag, or if the key or data do not authenticate.
    pub fn open(&self, sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::AuthenticationFailed);
        }

        let cipher = secretbox(key)?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        cipher
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::AuthenticationFailed)
    }
}

fn secretbox(key: &[u8]) -> Result<XSalsa20Poly1305> {
    XSalsa20Poly1305::new_from_slice(key).map_err(|_| Error::InvalidKeyOrNonceSize {
        expected: KEY_LEN,
        actual: key.len(),
    })
}
