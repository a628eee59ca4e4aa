use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::{HashAlgorithm, HashOutput};
use crate::error::{Error, Result};

/// Id written into records produced by [`Argon2Hasher`].
pub const ARGON2_ID: &str = "argon2";

const ARGON_NUM_PARAMETERS: usize = 3;
const ARGON_DEFAULT_TIME_COST: u32 = 4;
const ARGON_DEFAULT_MEMORY_KIB: u32 = 64 * 1024; // 64 MiB
const ARGON_DEFAULT_HASH_SIZE: u32 = 32;
// Not part of the record, so every verifier must agree on it.
const ARGON_LANES: u32 = 1;

/// Argon2 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argon2Mode {
    /// Argon2i
    I,
    /// Argon2id
    Id,
}

impl Argon2Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::I => "i",
            Self::Id => "id",
        }
    }

    fn algorithm(&self) -> Algorithm {
        match self {
            Self::I => Algorithm::Argon2i,
            Self::Id => Algorithm::Argon2id,
        }
    }
}

impl FromStr for Argon2Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "i" => Ok(Self::I),
            "id" => Ok(Self::Id),
            other => Err(Error::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for Argon2Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argon2 configuration: mode, passes, memory and output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Hasher {
    mode: Argon2Mode,
    time_cost: u32,
    memory_cost_kib: u32,
    hash_size: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            mode: Argon2Mode::Id,
            time_cost: ARGON_DEFAULT_TIME_COST,
            memory_cost_kib: ARGON_DEFAULT_MEMORY_KIB,
            hash_size: ARGON_DEFAULT_HASH_SIZE,
        }
    }
}

impl Argon2Hasher {
    pub fn new(
        mode: Argon2Mode,
        time_cost: u32,
        memory_cost_kib: u32,
        hash_size: u32,
    ) -> Result<Self> {
        let hasher = Self {
            mode,
            time_cost,
            memory_cost_kib,
            hash_size,
        };
        hasher.validate()?;
        Ok(hasher)
    }

    pub fn argon_mode(&self) -> Argon2Mode {
        self.mode
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn memory_cost_kib(&self) -> u32 {
        self.memory_cost_kib
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    pub fn validate(&self) -> Result<()> {
        if self.hash_size == 0 {
            return Err(Error::InvalidSize("argon2 hash size must be >= 1".into()));
        }
        if self.time_cost == 0 {
            return Err(Error::InvalidSize("argon2 time cost must be >= 1".into()));
        }
        if self.memory_cost_kib == 0 {
            return Err(Error::InvalidSize("argon2 memory cost must be >= 1".into()));
        }
        self.params().map(drop)
    }

    fn params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost_kib,
            self.time_cost,
            ARGON_LANES,
            Some(self.hash_size as usize),
        )
        .map_err(|e| Error::InvalidSize(format!("argon2 rejected parameters: {e}")))
    }

    fn encoded_params(&self) -> String {
        format!("{}:{}:{}", self.mode, self.time_cost, self.memory_cost_kib)
    }
}

/// Parses one cost field; negative and zero values are size errors,
/// anything non-numeric is a parameter error.
fn parse_cost(field: &str, name: &str) -> Result<u32> {
    let value: i64 = field
        .parse()
        .map_err(|_| Error::MalformedParameters(format!("{name} is not a number: '{field}'")))?;
    if value <= 0 {
        return Err(Error::InvalidSize(format!("argon2 {name} must be >= 1")));
    }
    u32::try_from(value)
        .map_err(|_| Error::MalformedParameters(format!("{name} out of range: {value}")))
}

impl HashAlgorithm for Argon2Hasher {
    fn id(&self) -> &'static str {
        ARGON2_ID
    }

    fn mode(&self) -> &str {
        self.mode.as_str()
    }

    fn default_hash_size(&self) -> u32 {
        self.hash_size
    }

    fn hash(&self, secret: &[u8], salt: &[u8]) -> Result<HashOutput> {
        let argon2 = Argon2::new(self.mode.algorithm(), Version::V0x13, self.params()?);

        let mut raw = Zeroizing::new(vec![0u8; self.hash_size as usize]);
        argon2
            .hash_password_into(secret, salt, &mut raw)
            .map_err(|e| Error::Hashing(format!("argon2 failed: {e}")))?;

        Ok(HashOutput {
            parameters: self.encoded_params(),
            raw,
        })
    }

    fn configure(
        &self,
        parameters: &str,
        separator: char,
        hash_size: u32,
    ) -> Result<Box<dyn HashAlgorithm>> {
        let fields: Vec<&str> = parameters.split(separator).collect();
        if fields.len() < ARGON_NUM_PARAMETERS {
            return Err(Error::MalformedParameters(format!(
                "expected {ARGON_NUM_PARAMETERS} fields, got {}",
                fields.len()
            )));
        }

        let time_cost = parse_cost(fields[1], "time cost")?;
        let memory_cost_kib = parse_cost(fields[2], "memory cost")?;
        let mode: Argon2Mode = fields[0].parse()?;

        Ok(Box::new(Self::new(
            mode,
            time_cost,
            memory_cost_kib,
            hash_size,
        )?))
    }
}

impl fmt::Display for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "algo:{ARGON2_ID} mode:{} passes:{} memory:{}",
            self.mode, self.time_cost, self.memory_cost_kib
        )
    }
}
