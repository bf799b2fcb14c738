//! Wallet endpoint served from a local credential store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use playvault_core::error::RemoteError;
use playvault_core::traits::{WalletFetcher, WalletPersistence};
use playvault_core::types::{FetchedSecret, WalletFetchRequest, WalletFetchResponse};

use crate::error::CredentialError;
use crate::store::CredentialStore;

/// Answers wallet fetches from a [`CredentialStore`].
///
/// Decryption is only performed when the fetcher was built with
/// `allow_decrypt`; otherwise a decrypt request is `Unauthorized`.
pub struct LocalWalletFetcher<P> {
    store: Arc<CredentialStore<P>>,
    allow_decrypt: bool,
}

impl<P: WalletPersistence> LocalWalletFetcher<P> {
    pub fn new(store: Arc<CredentialStore<P>>, allow_decrypt: bool) -> Self {
        Self {
            store,
            allow_decrypt,
        }
    }
}

fn to_remote(err: CredentialError) -> RemoteError {
    match err {
        CredentialError::RecordNotFound(owner) | CredentialError::RecordExpired(owner) => {
            RemoteError::NotFound(owner)
        }
        other => RemoteError::Transport(other.to_string()),
    }
}

#[async_trait]
impl<P: WalletPersistence + 'static> WalletFetcher for LocalWalletFetcher<P> {
    async fn fetch_wallet(
        &self,
        request: WalletFetchRequest,
    ) -> Result<WalletFetchResponse, RemoteError> {
        let owner = request.owner_id;
        if request.decrypt {
            if !self.allow_decrypt {
                warn!(owner = %owner, "decrypting fetch refused");
                return Err(RemoteError::Unauthorized);
            }
            let (record, seed) = self.store.unseal(&owner).map_err(to_remote)?;
            debug!(owner = %owner, "wallet fetched with decrypted seed");
            return Ok(WalletFetchResponse {
                account_id: record.account_id,
                public_key: record.public_key,
                secret: FetchedSecret::Plaintext(seed),
            });
        }

        let record = self.store.get(&owner).map_err(to_remote)?;
        Ok(WalletFetchResponse {
            account_id: record.account_id,
            public_key: record.public_key,
            secret: FetchedSecret::Encrypted(record.encrypted_seed),
        })
    }
}
