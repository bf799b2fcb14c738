//! End-to-end tests: provisioning through login, signing and swaps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use playvault_core::constants::{NATIVE_TOKEN_ID, Network, STORAGE_DEPOSIT, SWAP_ATTACHED_DEPOSIT};
use playvault_core::crypto::{KeyPair, SecretSeed, Signature};
use playvault_core::error::RemoteError;
use playvault_core::types::{AccountId, ActionKind, OwnerId};
use playvault_swap::{StepOutcome, SwapError, SwapState};
use playvault_tests::helpers::{
    CountingFetcher, MockChain, RecordingSubmitter, ScriptedQuotes, SwapStack, data_key, has_row,
    store_with_wallet, usdc,
};
use playvault_wallet::{
    CredentialError, CredentialStore, JsonFilePersistence, LocalWalletFetcher, NewWallet,
    SeedInput, SessionError, SessionKeyCache, SessionRegistry, SignPayload, SignRequest, Signer,
    SignerError,
};

// ------------------------------------------------------------------------------------------------
// Custody and signing
// ------------------------------------------------------------------------------------------------

#[tokio::test]
async fn provision_login_sign_logout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::new(
        JsonFilePersistence::open(dir.path()).unwrap(),
        data_key(),
    ));
    let owner = OwnerId::new("alice");
    let record = store
        .provision(
            &owner,
            AccountId::new("alice.near"),
            Network::Testnet,
            chrono::Duration::hours(1),
        )
        .unwrap();

    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store.clone(), true)));
    registry.login(&owner).await.unwrap();

    let response = registry
        .handle_sign(&SignRequest {
            owner_id: owner.clone(),
            message: SignPayload::Text("hello".to_string()),
        })
        .unwrap();
    assert_eq!(response.public_key, record.public_key.to_string());
    let signature = Signature::from_base64(&response.signature).unwrap();
    assert!(Signer::verify(&record.public_key, b"hello", &signature));

    assert!(registry.logout(&owner));
    let err = registry
        .handle_sign(&SignRequest {
            owner_id: owner,
            message: SignPayload::Bytes(vec![1, 2, 3]),
        })
        .unwrap_err();
    assert_eq!(err, SignerError::KeyUnavailable);
}

#[tokio::test]
async fn record_survives_reopen_of_store() {
    let dir = tempfile::tempdir().unwrap();
    let owner = OwnerId::new("bob");
    let public_key = {
        let store = CredentialStore::new(JsonFilePersistence::open(dir.path()).unwrap(), data_key());
        store
            .provision(
                &owner,
                AccountId::new("bob.near"),
                Network::Mainnet,
                chrono::Duration::days(1),
            )
            .unwrap()
            .public_key
    };

    let reopened = CredentialStore::new(JsonFilePersistence::open(dir.path()).unwrap(), data_key());
    let key = reopened.open(&owner).unwrap();
    assert_eq!(key.public_key(), public_key);
    assert_eq!(key.account_id().as_str(), "bob.near");
}

#[tokio::test]
async fn wrong_data_key_cannot_log_in() {
    let dir = tempfile::tempdir().unwrap();
    let owner = OwnerId::new("carol");
    CredentialStore::new(JsonFilePersistence::open(dir.path()).unwrap(), data_key())
        .provision(
            &owner,
            AccountId::new("carol.near"),
            Network::Mainnet,
            chrono::Duration::days(1),
        )
        .unwrap();

    let foreign = Arc::new(CredentialStore::new(
        JsonFilePersistence::open(dir.path()).unwrap(),
        playvault_wallet::EnvelopeKey::from_bytes([0x11; 32]),
    ));
    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(foreign, true)));

    let err = registry.login(&owner).await.unwrap_err();
    assert!(matches!(err, SessionError::Fetch(RemoteError::Transport(_))));
    assert_eq!(registry.active_sessions(), 0);
    assert!(registry.signer(&owner).is_err());
}

#[tokio::test]
async fn expired_wallet_is_deleted_and_login_fails() {
    let owner = OwnerId::new("dave");
    let (store, _) = store_with_wallet("someone-else", "else.near");
    let seed = SecretSeed::from_bytes([3; 32]);
    store
        .put(
            &owner,
            NewWallet {
                account_id: AccountId::new("dave.near"),
                public_key: KeyPair::from_seed(&seed).public_key(),
                seed: SeedInput::Plaintext(seed),
                network: Network::Mainnet,
                expires_at: Utc::now() - chrono::Duration::seconds(1),
            },
        )
        .unwrap();
    assert!(has_row(store.persistence(), "dave"));

    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store.clone(), true)));
    let err = registry.login(&owner).await.unwrap_err();
    assert_eq!(err, SessionError::Fetch(RemoteError::NotFound("dave".to_string())));
    assert!(!has_row(store.persistence(), "dave"));
    assert!(matches!(store.get(&owner), Err(CredentialError::RecordNotFound(_))));
}

#[tokio::test]
async fn revoked_wallet_cannot_log_in_again() {
    let (store, _) = store_with_wallet("erin", "erin.near");
    let owner = OwnerId::new("erin");
    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store.clone(), true)));

    registry.login(&owner).await.unwrap();
    assert!(store.revoke(&owner).unwrap());
    // The loaded session keeps its key until logout.
    assert!(registry.signer(&owner).is_ok());

    registry.logout(&owner);
    let err = registry.login(&owner).await.unwrap_err();
    assert!(matches!(err, SessionError::Fetch(RemoteError::NotFound(_))));
}

#[tokio::test]
async fn endpoint_without_decrypt_permission_fails_closed() {
    let (store, _) = store_with_wallet("frank", "frank.near");
    let registry = SessionRegistry::new(Arc::new(LocalWalletFetcher::new(store, false)));
    let owner = OwnerId::new("frank");

    let err = registry.login(&owner).await.unwrap_err();
    assert_eq!(err, SessionError::Fetch(RemoteError::Unauthorized));
    assert_eq!(registry.active_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_fetch_once() {
    let (store, record) = store_with_wallet("gina", "gina.near");
    let fetcher = Arc::new(CountingFetcher::new(
        LocalWalletFetcher::new(store, true),
        Duration::from_millis(30),
    ));
    let owner = OwnerId::new("gina");
    let session = Arc::new(SessionKeyCache::new(owner.clone(), fetcher.clone()));

    let mut handles = Vec::new();
    for _ in 0..12 {
        let session = Arc::clone(&session);
        let owner = owner.clone();
        handles.push(tokio::spawn(async move { session.load(&owner).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(session.public_key().unwrap(), record.public_key);
}

// ------------------------------------------------------------------------------------------------
// Swaps
// ------------------------------------------------------------------------------------------------

#[tokio::test]
async fn native_to_token_swap_signs_every_transaction() {
    let stack = SwapStack::new(
        ScriptedQuotes::new(4),
        MockChain::default().with_balance(NATIVE_TOKEN_ID, u128::MAX),
        RecordingSubmitter::default(),
    )
    .await;
    let orch = &stack.orchestrator;

    orch.request_quote(&playvault_core::types::TokenInfo::native(), &usdc(), "3")
        .await
        .unwrap()
        .unwrap();
    let plan = orch.plan().await.unwrap();
    assert!(plan.has_wrap());
    assert!(plan.has_registration());
    assert!(!plan.has_unwrap());
    assert_eq!(plan.minimum_receive.to_human_string(), "11.94");

    let report = orch.execute().await.unwrap();
    assert_eq!(report.state, SwapState::Succeeded);

    let submitted = stack.submitter.submitted();
    assert_eq!(submitted.len(), 3);
    for tx in &submitted {
        assert_eq!(tx.transaction.signer_id, "alice.near");
        assert_eq!(tx.transaction.public_key, stack.record.public_key.to_bytes());
        let hash = tx.transaction.hash().unwrap();
        assert_eq!(tx.hash, hex::encode(hash));
        assert!(Signer::verify(&stack.record.public_key, &hash, &tx.signature));
    }
}

#[tokio::test]
async fn native_spend_is_bounded_by_balance() {
    let three_near = 3_000_000_000_000_000_000_000_000u128;
    let outlay = three_near + STORAGE_DEPOSIT + SWAP_ATTACHED_DEPOSIT;
    let stack = SwapStack::new(
        ScriptedQuotes::new(4),
        MockChain::default().with_balance(NATIVE_TOKEN_ID, outlay - 1),
        RecordingSubmitter::default(),
    )
    .await;
    let orch = &stack.orchestrator;

    orch.request_quote(&playvault_core::types::TokenInfo::native(), &usdc(), "3")
        .await
        .unwrap()
        .unwrap();
    let err = orch.plan().await.unwrap_err();
    assert_eq!(
        err,
        SwapError::InsufficientBalance {
            have: outlay - 1,
            need: outlay
        }
    );
    assert!(stack.submitter.submitted().is_empty());
}

#[tokio::test]
async fn token_to_native_swap_unwraps_received_amount() {
    let received = 7_500_000_000_000_000_000_000_000u128;
    let stack = SwapStack::new(
        ScriptedQuotes::new(2),
        MockChain::default()
            .with_balance("usdc.near", u128::MAX)
            .with_balance(NATIVE_TOKEN_ID, u128::MAX),
        RecordingSubmitter {
            swap_received: Some(received),
            ..Default::default()
        },
    )
    .await;
    let orch = &stack.orchestrator;

    orch.request_quote(&usdc(), &playvault_core::types::TokenInfo::native(), "4")
        .await
        .unwrap()
        .unwrap();
    let plan = orch.plan().await.unwrap();
    assert_eq!(plan.kinds(), vec![ActionKind::FunctionCall, ActionKind::Unwrap]);

    let report = orch.execute().await.unwrap();
    assert_eq!(report.state, SwapState::Succeeded);
    assert_eq!(report.received.unwrap().minor(), received);

    let submitted = stack.submitter.submitted();
    let last = submitted.last().unwrap();
    match &last.transaction.actions[0] {
        playvault_core::types::Action::Unwrap { amount, .. } => assert_eq!(*amount, received),
        other => panic!("expected unwrap, got {other:?}"),
    }
}

#[tokio::test]
async fn superseded_quote_never_reaches_plan() {
    let stack = SwapStack::new(
        ScriptedQuotes::new(10).with_delay("1", 80),
        MockChain::default()
            .with_balance(NATIVE_TOKEN_ID, u128::MAX)
            .registered_on("usdc.near"),
        RecordingSubmitter::default(),
    )
    .await;
    let orch = &stack.orchestrator;
    let native = playvault_core::types::TokenInfo::native();
    let usdc = usdc();

    let (stale, fresh) = tokio::join!(orch.request_quote(&native, &usdc, "1"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        orch.request_quote(&native, &usdc, "2").await
    });
    assert!(stale.unwrap().is_none());
    assert_eq!(fresh.unwrap().unwrap().expected_out.to_human_string(), "20");

    let plan = orch.plan().await.unwrap();
    assert_eq!(plan.expected_out.to_human_string(), "20");
    assert!(!plan.has_registration());
}

#[tokio::test]
async fn logout_mid_flow_fails_the_swap_closed() {
    let stack = SwapStack::new(
        ScriptedQuotes::new(1),
        MockChain::default().with_balance(NATIVE_TOKEN_ID, u128::MAX),
        RecordingSubmitter::default(),
    )
    .await;
    let orch = &stack.orchestrator;

    orch.request_quote(&playvault_core::types::TokenInfo::native(), &usdc(), "1")
        .await
        .unwrap()
        .unwrap();
    orch.plan().await.unwrap();

    stack.registry.logout(&OwnerId::new("alice"));
    assert!(stack.signer.sign(b"x").is_err());

    let report = orch.execute().await.unwrap();
    assert_eq!(report.state, SwapState::Failed);
    assert_eq!(report.failed_step, Some(0));
    assert!(stack.submitter.submitted().is_empty());
}

#[tokio::test]
async fn unwrap_failure_leaves_partial_report() {
    let stack = SwapStack::new(
        ScriptedQuotes::new(3),
        MockChain::default()
            .with_balance("usdc.near", u128::MAX)
            .with_balance(NATIVE_TOKEN_ID, u128::MAX),
        RecordingSubmitter::failing_on(ActionKind::Unwrap),
    )
    .await;
    let orch = &stack.orchestrator;

    orch.request_quote(&usdc(), &playvault_core::types::TokenInfo::native(), "1")
        .await
        .unwrap()
        .unwrap();
    orch.plan().await.unwrap();
    let report = orch.execute().await.unwrap();

    assert_eq!(report.state, SwapState::PartiallyFailed);
    assert!(matches!(report.steps[0].outcome, StepOutcome::Succeeded { .. }));
    let failed = report.failed().unwrap();
    assert!(failed.kinds.contains(&ActionKind::Unwrap));
    assert!(orch.reset().is_ok());
    assert_eq!(orch.state(), SwapState::Idle);
}
