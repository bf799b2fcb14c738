//! # playvault-wallet — key custody and session signing.
//!
//! Keeps wallet seeds encrypted at rest, decrypts them into an
//! owner-scoped session cache on login, and signs messages and
//! transactions with the cached key.
//!
//! # Modules
//!
//! - [`error`] — cipher, credential, session and signer errors
//! - [`cipher`] — AES-256-GCM envelope encryption of seeds
//! - [`keys`] — decrypted key material held in session memory
//! - [`persistence`] — in-memory and JSON-file wallet row storage
//! - [`store`] — wallet credential store with read-time expiry
//! - [`fetcher`] — wallet endpoint backed by a credential store
//! - [`session`] — per-owner session key cache with deduplicated loads
//! - [`signer`] — message and transaction signing
//! - [`registry`] — login/logout lifecycle and the sign request handler

pub mod cipher;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod signer;
pub mod store;

pub use cipher::{EnvelopeKey, decrypt, encrypt};
pub use error::{CipherError, CredentialError, SessionError, SignerError};
pub use fetcher::LocalWalletFetcher;
pub use keys::DecryptedKeyMaterial;
pub use persistence::{JsonFilePersistence, MemoryPersistence};
pub use registry::SessionRegistry;
pub use session::SessionKeyCache;
pub use signer::{SignPayload, SignRequest, SignResponse, SignedMessage, Signer};
pub use store::{CredentialStore, NewWallet, SeedInput};
