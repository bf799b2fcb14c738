//! Shared collaborators and fixtures for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use playvault_core::constants::Network;
use playvault_core::error::RemoteError;
use playvault_core::traits::{
    ChainView, QuoteSource, TransactionSubmitter, WalletFetcher, WalletPersistence,
};
use playvault_core::types::{
    AccountId, ActionKind, OwnerId, QuoteRequest, QuoteResponse, SignedTransaction, TokenInfo,
    TxOutcome, TxStatus, WalletFetchRequest, WalletFetchResponse, WalletRecord,
};
use playvault_swap::{SwapOrchestrator, SwapSettings};
use playvault_wallet::{
    CredentialStore, EnvelopeKey, LocalWalletFetcher, MemoryPersistence, SessionRegistry, Signer,
};

pub fn usdc() -> TokenInfo {
    TokenInfo::fungible("usdc.near", "USDC", 6)
}

pub fn data_key() -> EnvelopeKey {
    EnvelopeKey::from_bytes([0x5A; 32])
}

/// A memory-backed store holding one provisioned wallet.
pub fn store_with_wallet(
    owner: &str,
    account: &str,
) -> (Arc<CredentialStore<MemoryPersistence>>, WalletRecord) {
    let store = Arc::new(CredentialStore::new(MemoryPersistence::new(), data_key()));
    let record = store
        .provision(
            &OwnerId::new(owner),
            AccountId::new(account),
            Network::Mainnet,
            chrono::Duration::days(1),
        )
        .unwrap();
    (store, record)
}

/// Wraps a fetcher and counts calls.
pub struct CountingFetcher<F> {
    inner: F,
    delay: Duration,
    calls: AtomicUsize,
}

impl<F> CountingFetcher<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F: WalletFetcher> WalletFetcher for CountingFetcher<F> {
    async fn fetch_wallet(
        &self,
        request: WalletFetchRequest,
    ) -> Result<WalletFetchResponse, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_wallet(request).await
    }
}

/// Quotes `amount * rate`, with a per-amount response delay.
pub struct ScriptedQuotes {
    pub rate: u64,
    pub delays_ms: HashMap<String, u64>,
}

impl ScriptedQuotes {
    pub fn new(rate: u64) -> Self {
        Self {
            rate,
            delays_ms: HashMap::new(),
        }
    }

    pub fn with_delay(mut self, amount: &str, ms: u64) -> Self {
        self.delays_ms.insert(amount.to_string(), ms);
        self
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, RemoteError> {
        let delay = self.delays_ms.get(&request.amount_in).copied().unwrap_or(1);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let n: u64 = request
            .amount_in
            .parse()
            .map_err(|_| RemoteError::Transport(format!("bad amount {}", request.amount_in)))?;
        Ok(QuoteResponse {
            expected_out: (n * self.rate).to_string(),
        })
    }
}

/// Balances by token id and the contracts the account is registered on.
#[derive(Default)]
pub struct MockChain {
    pub balances: HashMap<String, u128>,
    pub registered: HashSet<String>,
}

impl MockChain {
    pub fn with_balance(mut self, token_id: &str, minor: u128) -> Self {
        self.balances.insert(token_id.to_string(), minor);
        self
    }

    pub fn registered_on(mut self, contract: &str) -> Self {
        self.registered.insert(contract.to_string());
        self
    }
}

#[async_trait]
impl ChainView for MockChain {
    async fn balance(&self, _account: &AccountId, token: &TokenInfo) -> Result<u128, RemoteError> {
        Ok(self.balances.get(&token.id).copied().unwrap_or(0))
    }

    async fn is_registered(
        &self,
        contract: &str,
        _account: &AccountId,
    ) -> Result<bool, RemoteError> {
        Ok(self.registered.contains(contract))
    }
}

/// Records submissions; fails the first transaction containing `fail_on`.
#[derive(Default)]
pub struct RecordingSubmitter {
    pub fail_on: Option<ActionKind>,
    pub swap_received: Option<u128>,
    pub submitted: Mutex<Vec<SignedTransaction>>,
}

impl RecordingSubmitter {
    pub fn failing_on(kind: ActionKind) -> Self {
        Self {
            fail_on: Some(kind),
            ..Default::default()
        }
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl TransactionSubmitter for RecordingSubmitter {
    async fn submit(&self, tx: SignedTransaction) -> Result<TxOutcome, RemoteError> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        let kinds: Vec<ActionKind> = tx.transaction.actions.iter().map(|a| a.kind()).collect();
        let hash = tx.hash.clone();
        self.submitted.lock().push(tx);

        let status = if self.fail_on.is_some_and(|k| kinds.contains(&k)) {
            TxStatus::Failure {
                reason: "execution reverted".to_string(),
            }
        } else if kinds.contains(&ActionKind::FunctionCall) {
            TxStatus::Success {
                received: self.swap_received,
            }
        } else {
            TxStatus::Success { received: None }
        };
        Ok(TxOutcome { hash, status })
    }
}

/// A logged-in owner wired to a swap orchestrator.
pub struct SwapStack {
    pub registry: SessionRegistry,
    pub record: WalletRecord,
    pub signer: Signer,
    pub submitter: Arc<RecordingSubmitter>,
    pub orchestrator: SwapOrchestrator,
}

impl SwapStack {
    pub async fn new(
        quotes: ScriptedQuotes,
        chain: MockChain,
        submitter: RecordingSubmitter,
    ) -> Self {
        let (store, record) = store_with_wallet("alice", "alice.near");
        let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store, true)));
        let owner = OwnerId::new("alice");
        registry.login(&owner).await.unwrap();
        let signer = registry.signer(&owner).unwrap();

        let submitter = Arc::new(submitter);
        let orchestrator = SwapOrchestrator::new(
            SwapSettings::for_network(Network::Mainnet),
            signer.clone(),
            Arc::new(quotes),
            Arc::new(chain),
            submitter.clone(),
        );
        Self {
            registry,
            record,
            signer,
            submitter,
            orchestrator,
        }
    }
}

/// Whether `persistence` still holds a row for `owner`.
pub fn has_row<P: WalletPersistence>(persistence: &P, owner: &str) -> bool {
    persistence
        .load(&OwnerId::new(owner))
        .map(|row| row.is_some())
        .unwrap_or(false)
}
