//! In-process fakes for the swap collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use playvault_core::crypto::{KeyPair, SecretSeed};
use playvault_core::error::RemoteError;
use playvault_core::traits::{ChainView, QuoteSource, TransactionSubmitter, WalletFetcher};
use playvault_core::types::{
    AccountId, ActionKind, FetchedSecret, OwnerId, QuoteRequest, QuoteResponse,
    SignedTransaction, TokenInfo, TxOutcome, TxStatus, WalletFetchRequest, WalletFetchResponse,
};
use playvault_wallet::{SessionKeyCache, Signer};

pub const ACCOUNT: &str = "alice.near";

struct StaticWallet;

#[async_trait]
impl WalletFetcher for StaticWallet {
    async fn fetch_wallet(
        &self,
        _request: WalletFetchRequest,
    ) -> Result<WalletFetchResponse, RemoteError> {
        let seed = SecretSeed::from_bytes([41; 32]);
        Ok(WalletFetchResponse {
            account_id: AccountId::new(ACCOUNT),
            public_key: KeyPair::from_seed(&seed).public_key(),
            secret: FetchedSecret::Plaintext(seed),
        })
    }
}

pub async fn loaded_signer() -> Signer {
    let session = Arc::new(SessionKeyCache::new(
        OwnerId::new("alice"),
        Arc::new(StaticWallet),
    ));
    session.load(&OwnerId::new("alice")).await.unwrap();
    Signer::new(session)
}

pub fn unloaded_signer() -> Signer {
    Signer::new(Arc::new(SessionKeyCache::new(
        OwnerId::new("alice"),
        Arc::new(StaticWallet),
    )))
}

pub fn usdc() -> TokenInfo {
    TokenInfo::fungible("usdc.near", "USDC", 6)
}

/// Quotes `amount * rate`. Amount "1" answers slowly.
pub struct FakeQuotes {
    pub rate: u64,
    pub fail: bool,
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, RemoteError> {
        let delay = if request.amount_in == "1" { 60 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if self.fail {
            return Err(RemoteError::Transport("quote service down".into()));
        }
        let n: u64 = request.amount_in.parse().unwrap_or(0);
        Ok(QuoteResponse {
            expected_out: (n * self.rate).to_string(),
        })
    }
}

pub struct FakeChain {
    pub balance: u128,
    pub registered: bool,
}

#[async_trait]
impl ChainView for FakeChain {
    async fn balance(&self, _account: &AccountId, _token: &TokenInfo) -> Result<u128, RemoteError> {
        Ok(self.balance)
    }

    async fn is_registered(
        &self,
        _contract: &str,
        _account: &AccountId,
    ) -> Result<bool, RemoteError> {
        Ok(self.registered)
    }
}

/// Records every submission. Fails the first transaction containing
/// `fail_on`; the swap transaction reports `received`. Each submission
/// waits `delay`.
#[derive(Default)]
pub struct FakeSubmitter {
    pub fail_on: Option<ActionKind>,
    pub received: Option<u128>,
    pub delay: Duration,
    pub submitted: Mutex<Vec<SignedTransaction>>,
}

impl FakeSubmitter {
    pub fn kinds(&self) -> Vec<Vec<ActionKind>> {
        self.submitted
            .lock()
            .iter()
            .map(|tx| tx.transaction.actions.iter().map(|a| a.kind()).collect())
            .collect()
    }
}

#[async_trait]
impl TransactionSubmitter for FakeSubmitter {
    async fn submit(&self, tx: SignedTransaction) -> Result<TxOutcome, RemoteError> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        let kinds: Vec<ActionKind> = tx.transaction.actions.iter().map(|a| a.kind()).collect();
        let hash = tx.hash.clone();
        self.submitted.lock().push(tx);

        if self.fail_on.is_some_and(|k| kinds.contains(&k)) {
            return Ok(TxOutcome {
                hash,
                status: TxStatus::Failure {
                    reason: "execution reverted".into(),
                },
            });
        }
        let received = if kinds.contains(&ActionKind::FunctionCall) {
            self.received
        } else {
            None
        };
        Ok(TxOutcome {
            hash,
            status: TxStatus::Success { received },
        })
    }
}
