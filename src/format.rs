//! Encoded hash record format.
//!
//! ```text
//! $<algorithm_id>$<param1:param2:...>$<base64(hash_size || salt)>$<base64(mac)>
//! ```
//!
//! The single byte in front of the salt records the raw hash output size,
//! not the salt length. The MAC covers everything up to and including the
//! fourth `$`.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{Error, Result};
use crate::hash::{HashAlgorithm, HashRegistry};

/// Record field delimiter.
pub const SEPARATOR: char = '$';
/// Delimiter inside the parameter field.
pub const PARAMETER_SEPARATOR: char = ':';
/// Minimum number of fields, counting the empty one before the leading `$`.
pub const MIN_HASH_PARTS: usize = 5;

/// A decoded record, borrowing from the record text and the registry.
#[derive(Debug)]
pub struct EncodedHash<'a> {
    record: &'a str,
    algorithm: &'a dyn HashAlgorithm,
    algorithm_id: &'a str,
    parameters: &'a str,
    salt: Vec<u8>,
    hash_size: u32,
    mac: &'a str,
}

impl<'a> EncodedHash<'a> {
    /// Registry default configuration for the record's algorithm.
    pub fn algorithm(&self) -> &'a dyn HashAlgorithm {
        self.algorithm
    }

    pub fn algorithm_id(&self) -> &'a str {
        self.algorithm_id
    }

    pub fn parameters(&self) -> &'a str {
        self.parameters
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Raw hash output size recovered from the salt's prefix byte.
    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// The MAC field as stored (base64 text).
    pub fn mac_field(&self) -> &'a str {
        self.mac
    }

    /// The record without its MAC field; this is exactly the MAC input.
    pub fn prefix(&self) -> &'a str {
        &self.record[..self.record.len() - self.mac.len()]
    }

    /// Decodes the stored MAC.
    pub fn mac_tag(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.mac)
            .map_err(|_| Error::MalformedRecord("mac is not valid base64"))
    }
}

/// Builds the MAC input: `$id$params$base64(hash_size || salt)$`.
///
/// # Errors
///
/// Returns an error if `hash_output_len` does not fit the one-byte prefix or
/// a field contains the record separator.
pub fn encode_prefix(
    algorithm_id: &str,
    parameters: &str,
    salt: &[u8],
    hash_output_len: usize,
) -> Result<String> {
    let hash_size = u8::try_from(hash_output_len).map_err(|_| {
        Error::InvalidSize(format!(
            "hash output of {hash_output_len} bytes does not fit the record length prefix"
        ))
    })?;

    if algorithm_id.contains(SEPARATOR) || parameters.contains(SEPARATOR) {
        return Err(Error::MalformedParameters(format!(
            "fields must not contain '{SEPARATOR}'"
        )));
    }

    let mut prefixed_salt = Vec::with_capacity(salt.len() + 1);
    prefixed_salt.push(hash_size);
    prefixed_salt.extend_from_slice(salt);

    Ok(format!(
        "{SEPARATOR}{algorithm_id}{SEPARATOR}{parameters}{SEPARATOR}{}{SEPARATOR}",
        STANDARD.encode(prefixed_salt)
    ))
}

/// Appends the encoded MAC to a prefix built by [`encode_prefix`].
pub fn finish(mut prefix: String, mac: &[u8]) -> String {
    prefix.push_str(&STANDARD.encode(mac));
    prefix
}

/// Encodes a complete record.
pub fn encode(
    algorithm_id: &str,
    parameters: &str,
    salt: &[u8],
    hash_output_len: usize,
    mac: &[u8],
) -> Result<String> {
    let prefix = encode_prefix(algorithm_id, parameters, salt, hash_output_len)?;
    Ok(finish(prefix, mac))
}

/// Parses a record and resolves its algorithm in `registry`.
///
/// # Errors
///
/// Returns an error if:
/// - The record has fewer than five fields or does not start with `$`
/// - The algorithm is not registered
/// - The salt field is empty, not base64, or carries no salt bytes
/// - The MAC field is empty
pub fn decode<'a>(record: &'a str, registry: &'a HashRegistry) -> Result<EncodedHash<'a>> {
    let parts: Vec<&str> = record.splitn(MIN_HASH_PARTS, SEPARATOR).collect();

    if parts.len() < MIN_HASH_PARTS {
        return Err(Error::MalformedRecord("too few fields"));
    }

    if !parts[0].is_empty() {
        return Err(Error::MalformedRecord("missing leading separator"));
    }

    let algorithm = registry.get(parts[1])?;

    if parts[3].is_empty() {
        return Err(Error::MalformedRecord("empty salt field"));
    }

    let mut salt = STANDARD
        .decode(parts[3])
        .map_err(|_| Error::MalformedRecord("salt is not valid base64"))?;

    if salt.len() < 2 {
        return Err(Error::MalformedRecord("salt field carries no salt"));
    }

    if parts[4].is_empty() {
        return Err(Error::MalformedRecord("empty mac field"));
    }

    let hash_size = u32::from(salt.remove(0));

    Ok(EncodedHash {
        record,
        algorithm,
        algorithm_id: parts[1],
        parameters: parts[2],
        salt,
        hash_size,
        mac: parts[4],
    })
}
