//! Wallet credential store.
//!
//! Records live in a [`WalletPersistence`] backend with a read-through
//! `DashMap` cache in front. Seeds are only ever persisted encrypted under
//! the store's [`EnvelopeKey`].
//!
//! Expiry is enforced when a record is read: an expired row is deleted and
//! reported as not found. Nothing sweeps in the background.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use playvault_core::constants::Network;
use playvault_core::crypto::{KeyPair, PublicKey, SecretSeed};
use playvault_core::traits::WalletPersistence;
use playvault_core::types::{AccountId, EncryptedSeed, OwnerId, WalletRecord};

use crate::cipher::{self, EnvelopeKey};
use crate::error::CredentialError;
use crate::keys::DecryptedKeyMaterial;

/// Seed supplied to [`CredentialStore::put`].
#[derive(Debug)]
pub enum SeedInput {
    /// Already sealed under the store's data key.
    Encrypted(EncryptedSeed),
    /// Plaintext seed. Encrypted before it reaches persistence and
    /// zeroized when the input is dropped.
    Plaintext(SecretSeed),
}

/// A wallet to store for an owner.
#[derive(Debug)]
pub struct NewWallet {
    pub account_id: AccountId,
    pub public_key: PublicKey,
    pub seed: SeedInput,
    pub network: Network,
    pub expires_at: DateTime<Utc>,
}

pub struct CredentialStore<P> {
    persistence: P,
    key: EnvelopeKey,
    cache: DashMap<OwnerId, WalletRecord>,
}

impl<P: WalletPersistence> CredentialStore<P> {
    pub fn new(persistence: P, key: EnvelopeKey) -> Self {
        Self {
            persistence,
            key,
            cache: DashMap::new(),
        }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Number of records currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Fetch the live record for `owner`, updating `last_used_at`.
    pub fn get(&self, owner: &OwnerId) -> Result<WalletRecord, CredentialError> {
        self.get_at(owner, Utc::now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    pub fn get_at(
        &self,
        owner: &OwnerId,
        now: DateTime<Utc>,
    ) -> Result<WalletRecord, CredentialError> {
        match self.live_record(owner, now) {
            Err(CredentialError::RecordExpired(id)) => Err(CredentialError::RecordNotFound(id)),
            other => other,
        }
    }

    /// Store a wallet for `owner`, replacing any existing one.
    ///
    /// The seed must derive `wallet.public_key`. A plaintext seed is sealed
    /// here and dropped before this returns.
    pub fn put(&self, owner: &OwnerId, wallet: NewWallet) -> Result<WalletRecord, CredentialError> {
        let NewWallet {
            account_id,
            public_key,
            seed,
            network,
            expires_at,
        } = wallet;

        let encrypted_seed = match seed {
            SeedInput::Plaintext(seed) => {
                ensure_derives(&seed, &public_key, owner)?;
                cipher::encrypt_seed(&seed, &self.key)?
            }
            SeedInput::Encrypted(sealed) => {
                let seed = cipher::decrypt_seed(&sealed, &self.key)?;
                ensure_derives(&seed, &public_key, owner)?;
                sealed
            }
        };

        let now = Utc::now();
        let record = WalletRecord {
            owner_id: owner.clone(),
            account_id,
            public_key,
            encrypted_seed,
            network,
            created_at: now,
            last_used_at: now,
            expires_at,
        };
        self.persistence.save(&record)?;
        self.cache.insert(owner.clone(), record.clone());
        info!(owner = %owner, account = %record.account_id, "wallet stored");
        Ok(record)
    }

    /// Generate a fresh keypair for `owner` and store it sealed.
    pub fn provision(
        &self,
        owner: &OwnerId,
        account_id: AccountId,
        network: Network,
        ttl: Duration,
    ) -> Result<WalletRecord, CredentialError> {
        let seed = SecretSeed::generate();
        let public_key = KeyPair::from_seed(&seed).public_key();
        self.put(
            owner,
            NewWallet {
                account_id,
                public_key,
                seed: SeedInput::Plaintext(seed),
                network,
                expires_at: Utc::now() + ttl,
            },
        )
    }

    /// Drop the cached copy. The next read goes to persistence.
    pub fn invalidate(&self, owner: &OwnerId) {
        if self.cache.remove(owner).is_some() {
            debug!(owner = %owner, "wallet cache entry invalidated");
        }
    }

    /// Delete the record and its cached copy. Returns whether a row existed.
    pub fn revoke(&self, owner: &OwnerId) -> Result<bool, CredentialError> {
        self.cache.remove(owner);
        let existed = self.persistence.delete(owner)?;
        if existed {
            info!(owner = %owner, "wallet revoked");
        }
        Ok(existed)
    }

    /// Decrypt the owner's key.
    ///
    /// An expired record surfaces as [`CredentialError::RecordExpired`].
    pub fn open(&self, owner: &OwnerId) -> Result<DecryptedKeyMaterial, CredentialError> {
        let (record, seed) = self.unseal(owner)?;
        Ok(DecryptedKeyMaterial::new(&seed, record.account_id))
    }

    /// Live record plus its verified plaintext seed.
    pub(crate) fn unseal(
        &self,
        owner: &OwnerId,
    ) -> Result<(WalletRecord, SecretSeed), CredentialError> {
        let record = self.live_record(owner, Utc::now())?;
        let seed = cipher::decrypt_seed(&record.encrypted_seed, &self.key).inspect_err(|_| {
            warn!(owner = %owner, "wallet seed failed authentication");
        })?;
        ensure_derives(&seed, &record.public_key, owner)?;
        Ok((record, seed))
    }

    fn live_record(
        &self,
        owner: &OwnerId,
        now: DateTime<Utc>,
    ) -> Result<WalletRecord, CredentialError> {
        let cached = self.cache.get(owner).map(|entry| entry.value().clone());
        let mut record = match cached {
            Some(record) => record,
            None => self
                .persistence
                .load(owner)?
                .ok_or_else(|| CredentialError::RecordNotFound(owner.to_string()))?,
        };

        if record.is_expired_at(now) {
            self.cache.remove(owner);
            self.persistence.delete(owner)?;
            info!(owner = %owner, expires_at = %record.expires_at, "expired wallet removed");
            return Err(CredentialError::RecordExpired(owner.to_string()));
        }

        record.last_used_at = now;
        self.persistence.save(&record)?;
        self.cache.insert(owner.clone(), record.clone());
        Ok(record)
    }
}

fn ensure_derives(
    seed: &SecretSeed,
    public_key: &PublicKey,
    owner: &OwnerId,
) -> Result<(), CredentialError> {
    if &KeyPair::from_seed(seed).public_key() != public_key {
        return Err(CredentialError::KeyMismatch(owner.to_string()));
    }
    Ok(())
}
