//! Trait interfaces for the external collaborators.
//!
//! - [`WalletPersistence`]: opaque storage of wallet rows
//! - [`WalletFetcher`]: the wallet endpoint used by session key caches
//! - [`QuoteSource`]: advisory swap quotes
//! - [`TransactionSubmitter`]: signs-in, outcome-out chain submission
//! - [`ChainView`]: read-only balance and storage-registration queries
//!
//! None of these are retried by the callers; failures propagate as-is.

use async_trait::async_trait;

use crate::error::{PersistenceError, RemoteError};
use crate::types::{
    AccountId, OwnerId, QuoteRequest, QuoteResponse, SignedTransaction, TokenInfo, TxOutcome,
    WalletFetchRequest, WalletFetchResponse, WalletRecord,
};

/// Storage of wallet rows keyed by owner.
///
/// Implementations persist exactly what they are given; encryption is the
/// credential store's job.
pub trait WalletPersistence: Send + Sync {
    /// Read the row for `owner`. Returns `None` if absent.
    fn load(&self, owner: &OwnerId) -> Result<Option<WalletRecord>, PersistenceError>;

    /// Insert or replace the row for `record.owner_id`.
    fn save(&self, record: &WalletRecord) -> Result<(), PersistenceError>;

    /// Delete the row for `owner`. Returns whether a row existed.
    fn delete(&self, owner: &OwnerId) -> Result<bool, PersistenceError>;
}

/// Network fetch of an owner's wallet, optionally with the seed decrypted.
#[async_trait]
pub trait WalletFetcher: Send + Sync {
    async fn fetch_wallet(
        &self,
        request: WalletFetchRequest,
    ) -> Result<WalletFetchResponse, RemoteError>;
}

/// Source of advisory swap quotes. Responses only inform `minimum_receive`.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, RemoteError>;
}

/// Chain submission. Resolves once the transaction is confirmed or rejected.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, tx: SignedTransaction) -> Result<TxOutcome, RemoteError>;
}

/// Read-only chain queries needed for planning.
#[async_trait]
pub trait ChainView: Send + Sync {
    /// Balance of `token` held by `account`, in minor units.
    async fn balance(&self, account: &AccountId, token: &TokenInfo) -> Result<u128, RemoteError>;

    /// Whether `account` has registered storage on `contract`.
    async fn is_registered(&self, contract: &str, account: &AccountId)
    -> Result<bool, RemoteError>;
}
