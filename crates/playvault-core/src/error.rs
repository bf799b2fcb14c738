//! Error types shared across Playvault crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")] Invalid(String),
    #[error("amount overflow")] Overflow,
    #[error("unsupported decimals: {0}")] UnsupportedDecimals(u8),
    #[error("decimals mismatch: {left} vs {right}")] DecimalsMismatch { left: u8, right: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("invalid seed length: {0}")] InvalidSeedLength(usize),
}

/// Failures reported by an external collaborator (RPC node, quote service,
/// wallet endpoint). Never retried by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("unauthorized")] Unauthorized,
    #[error("not found: {0}")] NotFound(String),
    #[error("transport: {0}")] Transport(String),
    #[error("timeout")] Timeout,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("I/O error: {0}")] Io(String),
    #[error("corrupted record for {owner}: {reason}")] Corrupted { owner: String, reason: String },
    #[error("serialization: {0}")] Serialization(String),
}
