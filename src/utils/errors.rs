use thiserror::Error;

/// Unified error type for the voting ledger
#[derive(Error, Debug)]
pub enum BallotError {
    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Voter {0} is not registered")]
    NotRegistered(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rsa::Error> for BallotError {
    fn from(e: rsa::Error) -> Self {
        BallotError::CryptoError(e.to_string())
    }
}

impl From<serde_json::Error> for BallotError {
    fn from(e: serde_json::Error) -> Self {
        BallotError::CodecError(e.to_string())
    }
}

impl From<base64::DecodeError> for BallotError {
    fn from(e: base64::DecodeError) -> Self {
        BallotError::CodecError(e.to_string())
    }
}

/// Convenience alias
pub type Result<T> = std::result::Result<T, BallotError>;
