//! Core data model: wallet records, tokens, actions and transactions.
//!
//! All on-chain values are integer minor units (`u128`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{NATIVE_DECIMALS, NATIVE_TOKEN_ID, Network};
use crate::crypto::{PublicKey, SecretSeed, Signature, sha256};

/// Identity key of a wallet owner (the application's user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Chain account identifier (e.g. `alice.near`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Serde helper storing byte vectors as standard base64 text.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// `{ciphertext, iv, auth_tag}` triple produced by the envelope cipher.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSeed {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub auth_tag: Vec<u8>,
}

impl fmt::Debug for EncryptedSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedSeed")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("iv_len", &self.iv.len())
            .field("auth_tag_len", &self.auth_tag.len())
            .finish()
    }
}

/// A persisted wallet row. Holds only the encrypted seed: there is no
/// field that can carry plaintext key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub owner_id: OwnerId,
    pub account_id: AccountId,
    pub public_key: PublicKey,
    pub encrypted_seed: EncryptedSeed,
    pub network: Network,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WalletRecord {
    /// A record whose expiry is at or before `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A fungible token as seen by the swap planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token id: the contract account, or [`NATIVE_TOKEN_ID`] for the native asset.
    pub id: String,
    pub symbol: String,
    pub decimals: u8,
    /// Whether holders must register storage on the token contract first.
    #[serde(default = "default_requires_registration")]
    pub requires_registration: bool,
}

fn default_requires_registration() -> bool {
    true
}

impl TokenInfo {
    /// The chain's native asset.
    pub fn native() -> Self {
        Self {
            id: NATIVE_TOKEN_ID.to_string(),
            symbol: "NEAR".to_string(),
            decimals: NATIVE_DECIMALS,
            requires_registration: false,
        }
    }

    pub fn fungible(id: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            decimals,
            requires_registration: true,
        }
    }

    pub fn is_native(&self) -> bool {
        self.id == NATIVE_TOKEN_ID
    }
}

/// A chain call made by the contract-call action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct FunctionCall {
    pub contract: String,
    pub method: String,
    /// JSON-encoded call arguments.
    pub args: String,
    pub gas_budget: u64,
    pub deposit_amount: u128,
}

/// One step of a swap plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Register `account_id` for storage on a token contract.
    RegisterAccount {
        contract: String,
        account_id: String,
        deposit: u128,
    },
    /// Convert native asset into its fungible-token form.
    Wrap { contract: String, amount: u128 },
    /// Convert the fungible-token form back into the native asset.
    Unwrap { contract: String, amount: u128 },
    FunctionCall(FunctionCall),
}

/// Coarse classification of an [`Action`], used in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RegisterAccount,
    Wrap,
    Unwrap,
    FunctionCall,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RegisterAccount => "register_account",
            Self::Wrap => "wrap",
            Self::Unwrap => "unwrap",
            Self::FunctionCall => "function_call",
        };
        f.write_str(s)
    }
}

impl Action {
    /// Contract that receives this action.
    pub fn receiver(&self) -> &str {
        match self {
            Self::RegisterAccount { contract, .. }
            | Self::Wrap { contract, .. }
            | Self::Unwrap { contract, .. } => contract,
            Self::FunctionCall(call) => &call.contract,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::RegisterAccount { .. } => ActionKind::RegisterAccount,
            Self::Wrap { .. } => ActionKind::Wrap,
            Self::Unwrap { .. } => ActionKind::Unwrap,
            Self::FunctionCall(_) => ActionKind::FunctionCall,
        }
    }
}

/// An unsigned chain transaction: one receiver, one or more actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: [u8; 32],
    pub receiver_id: String,
    pub actions: Vec<Action>,
}

impl Transaction {
    /// Canonical bytes that are hashed and signed.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(self, bincode::config::standard())
    }

    /// SHA-256 of the canonical bytes. Also used as the transaction id.
    pub fn hash(&self) -> Result<[u8; 32], bincode::error::EncodeError> {
        Ok(sha256(&self.signing_bytes()?))
    }
}

/// A transaction together with its signature over [`Transaction::hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
    /// Hex-encoded transaction hash.
    pub hash: String,
}

/// Result of one submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    /// Executed. `received` carries the amount credited to the signer when
    /// the chain reports it (e.g. the swap output).
    Success { received: Option<u128> },
    Failure { reason: String },
}

/// Chain-level outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub hash: String,
    pub status: TxStatus,
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TxStatus::Success { .. })
    }
}

/// Request sent to the wallet-fetch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFetchRequest {
    pub owner_id: OwnerId,
    /// Ask the endpoint to return the plaintext seed.
    pub decrypt: bool,
}

/// Secret part of a wallet-fetch response.
#[derive(Debug)]
pub enum FetchedSecret {
    Encrypted(EncryptedSeed),
    /// Sensitive from the instant it is received. Never log.
    Plaintext(SecretSeed),
}

/// Response of the wallet-fetch endpoint.
#[derive(Debug)]
pub struct WalletFetchResponse {
    pub account_id: AccountId,
    pub public_key: PublicKey,
    pub secret: FetchedSecret,
}

/// Quote request for a token pair and human-readable input amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
}

/// Advisory quote: the expected output as a human-readable amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub expected_out: String,
}
