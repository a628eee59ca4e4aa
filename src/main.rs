use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use credseal::{
    Argon2Hasher, Argon2Mode, AtomicFile, AuthenticatedCipher, HashEngine, HashRegistry,
    VerifyOutcome, cipher::KEY_LEN,
};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 variant for new hashes, i or id (default: id)
    #[arg(long = "argon-mode", global = true, env = "CREDSEAL_ARGON_MODE")]
    mode: Option<String>,

    /// Argon2 time cost / passes (default: 4)
    #[arg(long = "argon-time", global = true, env = "CREDSEAL_ARGON_TIME")]
    time_cost: Option<u32>,

    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem", global = true, env = "CREDSEAL_ARGON_MEM")]
    mem_cost_kib: Option<u32>,
}

impl Argon2Args {
    fn to_hasher(&self) -> Result<Argon2Hasher> {
        let default = Argon2Hasher::default();

        let mode = match &self.mode {
            Some(mode) => mode.parse::<Argon2Mode>()?,
            None => default.argon_mode(),
        };

        Ok(Argon2Hasher::new(
            mode,
            self.time_cost.unwrap_or(default.time_cost()),
            self.mem_cost_kib.unwrap_or(default.memory_cost_kib()),
            default.hash_size(),
        )?)
    }

    fn to_engine(&self) -> Result<HashEngine> {
        let registry = HashRegistry::with_default(self.to_hasher()?);
        Ok(HashEngine::new(Arc::new(registry)))
    }
}

#[derive(Debug, clap::Args)]
struct KeyArgs {
    /// File holding the hex-encoded key
    #[arg(long, value_name = "PATH")]
    key_file: Option<PathBuf>,

    /// Hex-encoded key
    #[arg(long, env = "CREDSEAL_KEY", hide_env_values = true)]
    key: Option<String>,
}

impl KeyArgs {
    fn load(&self) -> Result<Zeroizing<Vec<u8>>> {
        let encoded = match (&self.key_file, &self.key) {
            (Some(path), _) => Zeroizing::new(
                String::from_utf8(AtomicFile::new(path.clone()).read()?)
                    .context("key file is not text")?,
            ),
            (None, Some(key)) => Zeroizing::new(key.clone()),
            (None, None) => bail!("no key provided; use --key-file or CREDSEAL_KEY"),
        };

        let key = Zeroizing::new(hex::decode(encoded.trim()).context("key is not valid hex")?);
        if key.len() != KEY_LEN {
            bail!("key must be {KEY_LEN} bytes, got {}", key.len());
        }
        Ok(key)
    }
}

#[derive(Debug, Parser)]
#[command(name = "credseal")]
#[command(
    version,
    about = "Tamper-evident credential hashing and authenticated secret sealing."
)]
struct Cli {
    #[command(flatten)]
    argon2: Argon2Args,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hashes a secret into a new record
    Hash,

    /// Checks a secret against a record
    #[command(arg_required_else_help = true)]
    Verify {
        record: String,

        /// Print a replacement record when the stored one is stale
        #[arg(long, default_value_t = false)]
        rehash: bool,
    },

    /// Reports whether a record is weaker than current defaults
    #[command(arg_required_else_help = true)]
    NeedsRehash { record: String },

    /// Prints the public fields of a record as JSON
    #[command(arg_required_else_help = true)]
    Inspect { record: String },

    /// Generates a random encryption key
    Keygen {
        /// Write the key to a file (owner-only) instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Encrypts data, printing nonce and ciphertext as hex
    Seal {
        #[command(flatten)]
        key: KeyArgs,

        /// Read plaintext from a file instead of stdin
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Write the sealed hex to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Decrypts a hex sealed message
    Open {
        #[command(flatten)]
        key: KeyArgs,

        /// Read sealed hex from a file instead of stdin
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<PathBuf>) -> Result<Zeroizing<Vec<u8>>> {
    match path {
        Some(p) => Ok(Zeroizing::new(AtomicFile::new(p).read()?)),
        None => {
            let mut buf = Zeroizing::new(Vec::new());
            io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Cli::parse();

    match args.command {
        Commands::Hash => {
            let engine = args.argon2.to_engine()?;
            let secret = auth::read_secret()?;
            println!("{}", engine.create(secret.as_bytes())?);
        }
        Commands::Verify { record, rehash } => {
            let engine = args.argon2.to_engine()?;
            let secret = auth::read_secret()?;

            let outcome = if rehash {
                engine.verify_and_rehash(&record, secret.as_bytes())
            } else {
                engine
                    .verify(&record, secret.as_bytes())
                    .map(|valid| {
                        if valid {
                            VerifyOutcome::Verified
                        } else {
                            VerifyOutcome::Rejected
                        }
                    })
            }
            .context("cannot verify against this record")?;

            match outcome {
                VerifyOutcome::Rejected => {
                    println!("invalid");
                    std::process::exit(1);
                }
                VerifyOutcome::Verified => println!("valid"),
                VerifyOutcome::Rehashed(new_record) => {
                    println!("valid");
                    println!("{new_record}");
                }
            }
        }
        Commands::NeedsRehash { record } => {
            let engine = args.argon2.to_engine()?;
            let stale = engine.needs_rehash(&record)?;
            println!("{}", if stale { "yes" } else { "no" });
        }
        Commands::Inspect { record } => {
            let engine = args.argon2.to_engine()?;
            let info = engine.inspect(&record)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Keygen { output } => {
            let key = AuthenticatedCipher::new().generate_key()?;
            let encoded = Zeroizing::new(hex::encode(&key[..]));
            match output {
                Some(path) => {
                    AtomicFile::new(path.clone()).private().write(encoded.as_bytes())?;
                    println!("key written to {}", path.display());
                }
                None => println!("{}", encoded.as_str()),
            }
        }
        Commands::Seal { key, input, output } => {
            let key = key.load()?;
            let plaintext = read_input(input)?;
            let sealed = hex::encode(AuthenticatedCipher::new().seal(&plaintext, &key)?);
            match output {
                Some(path) => AtomicFile::new(path).write(sealed.as_bytes())?,
                None => println!("{sealed}"),
            }
        }
        Commands::Open { key, input } => {
            let key = key.load()?;
            let encoded = read_input(input)?;
            let sealed = hex::decode(String::from_utf8_lossy(&encoded).trim())
                .context("sealed message is not valid hex")?;
            let plaintext = AuthenticatedCipher::new().open(&sealed, &key)?;
            io::stdout().write_all(&plaintext)?;
        }
    }

    Ok(())
}
