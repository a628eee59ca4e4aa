use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("OS random generator could not supply {requested} bytes")]
    InsufficientEntropy { requested: usize },

    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("malformed hash record: {0}")]
    MalformedRecord(&'static str),

    #[error("malformed hash parameters: {0}")]
    MalformedParameters(String),

    #[error("unsupported hash mode '{0}'")]
    UnsupportedMode(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("incorrect key or nonce size: expected {expected} bytes, got {actual}")]
    InvalidKeyOrNonceSize { expected: usize, actual: usize },

    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    #[error("hashing failed: {0}")]
    Hashing(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error points at a broken or hostile stored record rather
    /// than at a wrong secret or a transient environment problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAlgorithm(_)
                | Self::MalformedRecord(_)
                | Self::MalformedParameters(_)
                | Self::UnsupportedMode(_)
                | Self::InvalidSize(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_problems_are_data_errors() {
        assert!(Error::MalformedRecord("too few fields").is_data_error());
        assert!(Error::UnknownAlgorithm("bcrypt".into()).is_data_error());
        assert!(Error::UnsupportedMode("d".into()).is_data_error());
    }

    #[test]
    fn runtime_problems_are_not_data_errors() {
        assert!(!Error::InsufficientEntropy { requested: 10 }.is_data_error());
        assert!(!Error::AuthenticationFailed.is_data_error());
    }

    #[test]
    fn messages_do_not_leak_more_than_the_kind() {
        let msg = Error::InvalidKeyOrNonceSize {
            expected: 32,
            actual: 22,
        }
        .to_string();
        assert_eq!(msg, "incorrect key or nonce size: expected 32 bytes, got 22");
    }
}
