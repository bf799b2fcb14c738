//! Owner-scoped session key cache.
//!
//! A [`SessionKeyCache`] is created for one owner at login and dropped at
//! logout. It fetches the owner's decrypted seed once and keeps the derived
//! signing key in memory until [`SessionKeyCache::clear`].
//!
//! ## Load deduplication
//!
//! Loads serialize on an async gate. A caller that queued behind an attempt
//! which completed while it waited takes that attempt's result instead of
//! fetching again, so N concurrent `load` calls cost one fetch and all see
//! the same success or error.
//!
//! ## Clearing
//!
//! `clear` bumps an epoch under the key write lock. A load that began under
//! an older epoch drops its key instead of installing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use playvault_core::crypto::{PublicKey, Signature};
use playvault_core::traits::WalletFetcher;
use playvault_core::types::{AccountId, FetchedSecret, OwnerId, WalletFetchRequest};

use crate::error::SessionError;
use crate::keys::DecryptedKeyMaterial;

#[derive(Default)]
struct LoadLedger {
    attempts: u64,
    last_failure: Option<SessionError>,
}

pub struct SessionKeyCache {
    owner: OwnerId,
    fetcher: Arc<dyn WalletFetcher>,
    key: RwLock<Option<DecryptedKeyMaterial>>,
    epoch: AtomicU64,
    attempts: AtomicU64,
    load_gate: tokio::sync::Mutex<LoadLedger>,
}

impl SessionKeyCache {
    pub fn new(owner: OwnerId, fetcher: Arc<dyn WalletFetcher>) -> Self {
        Self {
            owner,
            fetcher,
            key: RwLock::new(None),
            epoch: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            load_gate: tokio::sync::Mutex::new(LoadLedger::default()),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Fetch and install the owner's key. Idempotent once loaded.
    pub async fn load(&self, owner: &OwnerId) -> Result<(), SessionError> {
        if owner != &self.owner {
            return Err(SessionError::OwnerMismatch {
                expected: self.owner.to_string(),
                got: owner.to_string(),
            });
        }
        if self.is_loaded() {
            return Ok(());
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut ledger = self.load_gate.lock().await;

        if self.is_loaded() {
            return Ok(());
        }
        if ledger.attempts != observed {
            // An attempt finished while this call was queued.
            return match &ledger.last_failure {
                Some(err) => Err(err.clone()),
                None => Err(SessionError::Cleared),
            };
        }

        let epoch = self.epoch.load(Ordering::Acquire);
        debug!(owner = %self.owner, "fetching session key");
        let fetched = self.fetch_key().await;

        ledger.attempts += 1;
        self.attempts.store(ledger.attempts, Ordering::Release);

        let outcome = fetched.and_then(|material| self.install(material, epoch));
        match &outcome {
            Ok(()) => info!(owner = %self.owner, "session key loaded"),
            Err(err) => warn!(owner = %self.owner, error = %err, "session key load failed"),
        }
        ledger.last_failure = outcome.as_ref().err().cloned();
        outcome
    }

    async fn fetch_key(&self) -> Result<DecryptedKeyMaterial, SessionError> {
        let response = self
            .fetcher
            .fetch_wallet(WalletFetchRequest {
                owner_id: self.owner.clone(),
                decrypt: true,
            })
            .await?;

        let seed = match response.secret {
            FetchedSecret::Plaintext(seed) => seed,
            FetchedSecret::Encrypted(_) => return Err(SessionError::DecryptionDenied),
        };
        let material = DecryptedKeyMaterial::new(&seed, response.account_id);
        if material.public_key() != response.public_key {
            return Err(SessionError::KeyMismatch);
        }
        Ok(material)
    }

    fn install(&self, material: DecryptedKeyMaterial, epoch: u64) -> Result<(), SessionError> {
        let mut slot = self.key.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return Err(SessionError::Cleared);
        }
        *slot = Some(material);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.key.read().is_some()
    }

    /// Run `f` against the loaded key.
    pub fn with_key<R>(
        &self,
        f: impl FnOnce(&DecryptedKeyMaterial) -> R,
    ) -> Result<R, SessionError> {
        let guard = self.key.read();
        let material = guard.as_ref().ok_or(SessionError::KeyNotLoaded)?;
        Ok(f(material))
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature, SessionError> {
        self.with_key(|k| k.sign(message))
    }

    pub fn public_key(&self) -> Result<PublicKey, SessionError> {
        self.with_key(|k| k.public_key())
    }

    pub fn account_id(&self) -> Result<AccountId, SessionError> {
        self.with_key(|k| k.account_id().clone())
    }

    /// Drop the key. Its bytes are zeroized as it drops.
    pub fn clear(&self) {
        let mut slot = self.key.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if slot.take().is_some() {
            info!(owner = %self.owner, "session key cleared");
        }
    }
}

impl std::fmt::Debug for SessionKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyCache")
            .field("owner", &self.owner)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
