use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

use super::HashRegistry;
use crate::error::{Error, Result};
use crate::format::{self, EncodedHash, PARAMETER_SEPARATOR};
use crate::random::{OsRandom, RandomSource};

/// Salt length for new records, and the minimum accepted before a record
/// is considered stale.
pub const SALT_SIZE: usize = 10;

type HmacSha256 = Hmac<Sha256>;

/// Result of [`HashEngine::verify_and_rehash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The secret does not match the record.
    Rejected,
    /// The secret matches and the record is current.
    Verified,
    /// The secret matches; the record was stale and this replacement should
    /// be stored instead.
    Rehashed(String),
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Public, non-secret view of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    pub algorithm: String,
    pub mode: String,
    pub parameters: String,
    pub salt_len: usize,
    pub hash_size: u32,
    pub needs_rehash: bool,
}

/// Creates, verifies and ages encoded hash records.
#[derive(Clone)]
pub struct HashEngine {
    registry: Arc<HashRegistry>,
    rng: Arc<dyn RandomSource>,
}

impl Default for HashEngine {
    fn default() -> Self {
        Self::new(Arc::new(HashRegistry::default()))
    }
}

impl HashEngine {
    /// Creates an engine over `registry` that salts from the OS CSPRNG.
    pub fn new(registry: Arc<HashRegistry>) -> Self {
        Self::with_random_source(registry, Arc::new(OsRandom))
    }

    /// Creates an engine that draws salts from `rng`.
    pub fn with_random_source(registry: Arc<HashRegistry>, rng: Arc<dyn RandomSource>) -> Self {
        Self { registry, rng }
    }

    /// The registry records are decoded against.
    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }

    /// Hashes `secret` with the default algorithm and returns a new record.
    ///
    /// # Errors
    ///
    /// Propagates entropy and hashing failures unchanged.
    pub fn create(&self, secret: &[u8]) -> Result<String> {
        let algorithm = self.registry.default_algorithm();
        let salt = self.rng.generate(SALT_SIZE)?;

        let output = algorithm.hash(secret, &salt)?;
        let prefix = format::encode_prefix(
            algorithm.id(),
            &output.parameters,
            &salt,
            output.raw.len(),
        )?;

        let mac = record_mac(&output.raw, &prefix)?.finalize().into_bytes();

        debug!(
            algorithm = algorithm.id(),
            parameters = %output.parameters,
            "created hash record"
        );

        Ok(format::finish(prefix, &mac))
    }

    /// Checks `candidate` against `record`.
    ///
    /// Returns `Ok(false)` when the secret does not match.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be decoded, names an unknown
    /// algorithm, or carries parameters the algorithm rejects.
    pub fn verify(&self, record: &str, candidate: &[u8]) -> Result<bool> {
        self.verify_decoded(record, candidate)
            .inspect_err(|e| {
                if e.is_data_error() {
                    warn!(error = %e, "rejecting unreadable hash record");
                }
            })
    }

    fn verify_decoded(&self, record: &str, candidate: &[u8]) -> Result<bool> {
        let decoded = format::decode(record, &self.registry)?;
        let algorithm = decoded.algorithm().configure(
            decoded.parameters(),
            PARAMETER_SEPARATOR,
            decoded.hash_size(),
        )?;
        let expected = decoded.mac_tag()?;

        let output = algorithm.hash(candidate, decoded.salt())?;
        let valid = record_mac(&output.raw, decoded.prefix())?
            .verify_slice(&expected)
            .is_ok();

        debug!(algorithm = decoded.algorithm_id(), valid, "verified hash record");
        Ok(valid)
    }

    /// Whether `record` is weaker than what [`create`](Self::create) would
    /// produce now: a different algorithm or mode, a short salt, or a shorter
    /// hash output.
    ///
    /// # Errors
    ///
    /// Fails like [`verify`](Self::verify) on records that cannot be decoded.
    pub fn needs_rehash(&self, record: &str) -> Result<bool> {
        let decoded = format::decode(record, &self.registry)?;
        self.is_stale(&decoded)
    }

    fn is_stale(&self, decoded: &EncodedHash<'_>) -> Result<bool> {
        let stored = decoded.algorithm();
        let algorithm = stored.configure(
            decoded.parameters(),
            PARAMETER_SEPARATOR,
            stored.default_hash_size(),
        )?;
        let default = self.registry.default_algorithm();
        if algorithm.id() != default.id() || algorithm.mode() != default.mode() {
            return Ok(true);
        }

        Ok(decoded.salt().len() < SALT_SIZE || decoded.hash_size() < default.default_hash_size())
    }

    /// Verifies `candidate` and, when it matches a stale record, hashes it
    /// again with the current defaults.
    pub fn verify_and_rehash(&self, record: &str, candidate: &[u8]) -> Result<VerifyOutcome> {
        if !self.verify(record, candidate)? {
            return Ok(VerifyOutcome::Rejected);
        }

        if self.needs_rehash(record)? {
            debug!("upgrading stale hash record");
            return Ok(VerifyOutcome::Rehashed(self.create(candidate)?));
        }

        Ok(VerifyOutcome::Verified)
    }

    /// Decodes the public fields of `record` without checking any secret.
    ///
    /// # Errors
    ///
    /// Fails like [`needs_rehash`](Self::needs_rehash).
    pub fn inspect(&self, record: &str) -> Result<RecordInfo> {
        let decoded = format::decode(record, &self.registry)?;
        let needs_rehash = self.is_stale(&decoded)?;
        let mode = decoded
            .parameters()
            .split(PARAMETER_SEPARATOR)
            .next()
            .unwrap_or_default();

        Ok(RecordInfo {
            algorithm: decoded.algorithm_id().to_string(),
            mode: mode.to_string(),
            parameters: decoded.parameters().to_string(),
            salt_len: decoded.salt().len(),
            hash_size: decoded.hash_size(),
            needs_rehash,
        })
    }
}

/// HMAC-SHA256 over the record prefix, keyed by the raw hash output.
fn record_mac(raw_hash: &[u8], prefix: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(raw_hash)
        .map_err(|_| Error::InvalidSize("unusable MAC key".into()))?;
    mac.update(prefix.as_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use zeroize::Zeroizing;

    use super::*;
    use crate::hash::{Argon2Hasher, Argon2Mode, HashAlgorithm, HashOutput};
    use crate::random::testing::Exhausted;

    const LEGACY: &str =
        "$argon2$i:4:65536$IO+amcBFUXUETmI=$GpiSk2q1+y2DyfRVsg13BmIGE/oM0GLcM0SOs0s/H/s=";

    fn fast_argon(mode: Argon2Mode) -> Argon2Hasher {
        Argon2Hasher::new(mode, 1, 1024, 32).unwrap()
    }

    fn engine() -> HashEngine {
        HashEngine::new(Arc::new(HashRegistry::with_default(fast_argon(
            Argon2Mode::Id,
        ))))
    }

    /// Cheap non-Argon2 backend for registry and migration tests.
    #[derive(Debug)]
    struct Sha256Mac;

    impl fmt::Display for Sha256Mac {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("algo:hmac-sha256")
        }
    }

    impl HashAlgorithm for Sha256Mac {
        fn id(&self) -> &'static str {
            "hmac-sha256"
        }

        fn mode(&self) -> &str {
            "plain"
        }

        fn default_hash_size(&self) -> u32 {
            32
        }

        fn hash(&self, secret: &[u8], salt: &[u8]) -> Result<HashOutput> {
            let mut mac = HmacSha256::new_from_slice(salt).unwrap();
            mac.update(secret);
            Ok(HashOutput {
                parameters: "plain".into(),
                raw: Zeroizing::new(mac.finalize().into_bytes().to_vec()),
            })
        }

        fn configure(&self, _: &str, _: char, _: u32) -> Result<Box<dyn HashAlgorithm>> {
            Ok(Box::new(Sha256Mac))
        }
    }

    #[test]
    fn create_then_verify_accepts_same_secret() {
        let engine = engine();
        let record = engine.create(b"This is some random string +-").unwrap();

        assert!(engine.verify(&record, b"This is some random string +-").unwrap());
    }

    #[test]
    fn verify_rejects_other_secret() {
        let engine = engine();
        let record1 = engine.create(b"This is some random string +-").unwrap();
        let record2 = engine.create(b"This is another string").unwrap();

        assert!(!engine.verify(&record1, b"This is another string").unwrap());
        assert!(!engine.verify(&record2, b"This is some random string +-").unwrap());
        assert!(engine.verify(&record2, b"This is another string").unwrap());
    }

    #[test]
    fn same_secret_gives_distinct_records() {
        let engine = engine();
        let a = engine.create(b"Some string").unwrap();
        let b = engine.create(b"Some string").unwrap();

        assert_ne!(a, b);
        assert!(engine.verify(&a, b"Some string").unwrap());
        assert!(engine.verify(&b, b"Some string").unwrap());
    }

    #[test]
    fn record_names_default_algorithm() {
        let record = engine().create(b"pw").unwrap();
        assert!(record.starts_with("$argon2$id:1:1024$"));
        assert_eq!(record.split('$').count(), 5);
    }

    #[test]
    fn tampered_parameters_fail_verification() {
        let engine = engine();
        let record = engine.create(b"pw").unwrap();

        let downgraded = record.replacen("id:1:1024", "id:1:512", 1);
        assert!(!engine.verify(&downgraded, b"pw").unwrap());

        let mode_swapped = record.replacen("$id:", "$i:", 1);
        assert!(!engine.verify(&mode_swapped, b"pw").unwrap());
    }

    #[test]
    fn tampered_mac_fails_verification() {
        let engine = engine();
        let record = engine.create(b"pw").unwrap();
        let cut = record.rfind('$').unwrap() + 1;
        let forged = format!("{}{}", &record[..cut], "A".repeat(43) + "=");

        assert!(!engine.verify(&forged, b"pw").unwrap());
    }

    #[test]
    fn verify_propagates_structural_errors() {
        let engine = engine();

        assert!(matches!(
            engine.verify("$argon2$id:1:1024", b"pw"),
            Err(Error::MalformedRecord(_))
        ));
        assert!(matches!(
            engine.verify("$bcrypt$id:1:1024$IO+amcBFUXUETmI=$AAAA", b"pw"),
            Err(Error::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            engine.verify("$argon2$id:x:1024$IO+amcBFUXUETmI=$AAAA", b"pw"),
            Err(Error::MalformedParameters(_))
        ));
        assert!(matches!(
            engine.verify("$argon2$d:1:1024$IO+amcBFUXUETmI=$AAAA", b"pw"),
            Err(Error::UnsupportedMode(_))
        ));
    }

    #[test]
    fn fresh_record_does_not_need_rehash() {
        let engine = engine();
        let record = engine.create(b"Some string").unwrap();
        assert!(!engine.needs_rehash(&record).unwrap());
    }

    #[test]
    fn legacy_mode_needs_rehash() {
        assert!(HashEngine::default().needs_rehash(LEGACY).unwrap());
        assert!(engine().needs_rehash(LEGACY).unwrap());
    }

    #[test]
    fn short_salt_or_output_needs_rehash() {
        let engine = engine();
        let mac = [0u8; 32];

        let short_salt = format::encode("argon2", "id:1:1024", &[1u8; 8], 32, &mac).unwrap();
        assert!(engine.needs_rehash(&short_salt).unwrap());

        let short_output = format::encode("argon2", "id:1:1024", &[1u8; 10], 16, &mac).unwrap();
        assert!(engine.needs_rehash(&short_output).unwrap());

        let current = format::encode("argon2", "id:1:1024", &[1u8; 10], 32, &mac).unwrap();
        assert!(!engine.needs_rehash(&current).unwrap());
    }

    #[test]
    fn rehash_follows_configured_output_size() {
        let narrow = HashEngine::new(Arc::new(HashRegistry::with_default(
            Argon2Hasher::new(Argon2Mode::Id, 1, 1024, 16).unwrap(),
        )));
        let record = narrow.create(b"pw").unwrap();
        assert_eq!(narrow.inspect(&record).unwrap().hash_size, 16);
        assert!(!narrow.needs_rehash(&record).unwrap());
        assert!(narrow.verify(&record, b"pw").unwrap());

        let current = engine().create(b"pw").unwrap();
        let wide = HashEngine::new(Arc::new(HashRegistry::with_default(
            Argon2Hasher::new(Argon2Mode::Id, 1, 1024, 64).unwrap(),
        )));
        assert!(wide.needs_rehash(&current).unwrap());
        assert!(wide.verify(&current, b"pw").unwrap());

        match wide.verify_and_rehash(&current, b"pw").unwrap() {
            VerifyOutcome::Rehashed(upgraded) => {
                assert_eq!(wide.inspect(&upgraded).unwrap().hash_size, 64);
                assert!(!wide.needs_rehash(&upgraded).unwrap());
            }
            other => panic!("expected rehash, got {other:?}"),
        }
    }

    #[test]
    fn other_default_algorithm_marks_argon2_stale() {
        let registry = HashRegistry::with_default(Sha256Mac).register(fast_argon(Argon2Mode::Id));
        let engine = HashEngine::new(Arc::new(registry));

        let fresh = engine.create(b"pw").unwrap();
        assert!(fresh.starts_with("$hmac-sha256$plain$"));
        assert!(engine.verify(&fresh, b"pw").unwrap());
        assert!(!engine.needs_rehash(&fresh).unwrap());

        assert!(engine.needs_rehash(LEGACY).unwrap());
    }

    #[test]
    fn verify_and_rehash_upgrades_stale_record() {
        let old = HashEngine::new(Arc::new(HashRegistry::with_default(fast_argon(
            Argon2Mode::I,
        ))));
        let record = old.create(b"pw").unwrap();

        let engine = engine();
        assert_eq!(
            engine.verify_and_rehash(&record, b"nope").unwrap(),
            VerifyOutcome::Rejected
        );

        match engine.verify_and_rehash(&record, b"pw").unwrap() {
            VerifyOutcome::Rehashed(new_record) => {
                assert!(new_record.starts_with("$argon2$id:"));
                assert!(engine.verify(&new_record, b"pw").unwrap());
                assert_eq!(
                    engine.verify_and_rehash(&new_record, b"pw").unwrap(),
                    VerifyOutcome::Verified
                );
            }
            other => panic!("expected rehash, got {other:?}"),
        }
    }

    #[test]
    fn inspect_reports_public_fields() {
        let info = engine().inspect(LEGACY).unwrap();

        assert_eq!(info.algorithm, "argon2");
        assert_eq!(info.mode, "i");
        assert_eq!(info.parameters, "i:4:65536");
        assert_eq!(info.salt_len, 10);
        assert_eq!(info.hash_size, 32);
        assert!(info.needs_rehash);
    }

    #[test]
    fn exhausted_entropy_fails_create() {
        let engine = HashEngine::with_random_source(
            Arc::new(HashRegistry::with_default(fast_argon(Argon2Mode::Id))),
            Arc::new(Exhausted),
        );
        assert!(matches!(
            engine.create(b"pw"),
            Err(Error::InsufficientEntropy { requested: SALT_SIZE })
        ));
    }

    #[test]
    fn engine_is_usable_across_threads() {
        let engine = engine();
        let record = engine.create(b"shared").unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let record = record.clone();
                std::thread::spawn(move || engine.verify(&record, b"shared").unwrap())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
