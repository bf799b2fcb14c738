//! Wallet error types.

use playvault_core::error::{CryptoError, PersistenceError, RemoteError};
use thiserror::Error;

/// Envelope cipher failures.
///
/// Every decryption failure is reported as
/// [`CipherError::AuthenticationFailure`] whatever input was wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Data key is not exactly 32 bytes of base64 or hex.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Ciphertext, IV or tag did not verify under the key.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Encryption could not be performed.
    #[error("encryption: {0}")]
    Encryption(String),
}

/// Wallet credential store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No live record for this owner.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// The record's expiry has passed. It has been deleted.
    #[error("record expired: {0}")]
    RecordExpired(String),

    /// Seed does not derive the public key stored alongside it.
    #[error("key mismatch for {0}")]
    KeyMismatch(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl CredentialError {
    /// True for both a missing and an expired record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_) | Self::RecordExpired(_))
    }
}

/// Session key cache failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A key-dependent operation ran before `load` completed.
    #[error("key not loaded")]
    KeyNotLoaded,

    /// `load` was called with an owner other than the session's.
    #[error("session belongs to {expected}, not {got}")]
    OwnerMismatch { expected: String, got: String },

    /// The wallet endpoint answered without a decrypted seed.
    #[error("wallet endpoint did not return a decrypted seed")]
    DecryptionDenied,

    /// The fetched seed does not derive the advertised public key.
    #[error("fetched seed does not match the advertised public key")]
    KeyMismatch,

    /// The session was cleared while the load was in flight.
    #[error("session cleared during load")]
    Cleared,

    #[error("wallet fetch failed: {0}")]
    Fetch(#[from] RemoteError),
}

/// Signing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// No session key is loaded for this owner.
    #[error("key unavailable")]
    KeyUnavailable,

    #[error("encoding: {0}")]
    Encoding(String),
}

impl From<SessionError> for SignerError {
    fn from(_: SessionError) -> Self {
        // Callers see a single failure mode regardless of the session cause.
        SignerError::KeyUnavailable
    }
}
