//! Message and transaction signing with a session key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use playvault_core::crypto::{self, PublicKey, Signature};
use playvault_core::types::{AccountId, Action, OwnerId, SignedTransaction, Transaction};

use crate::error::SignerError;
use crate::session::SessionKeyCache;

/// A signature together with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub signature: Signature,
    pub public_key: PublicKey,
}

/// Message body of a sign request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SignPayload {
    Text(String),
    /// Raw bytes, base64 on the wire.
    Bytes(#[serde(with = "playvault_core::types::base64_bytes")] Vec<u8>),
}

impl SignPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub owner_id: OwnerId,
    pub message: SignPayload,
}

/// `public_key` is `ed25519:<base58>`; `signature` is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub public_key: String,
    pub signature: String,
}

impl From<SignedMessage> for SignResponse {
    fn from(signed: SignedMessage) -> Self {
        Self {
            public_key: signed.public_key.to_string(),
            signature: signed.signature.to_base64(),
        }
    }
}

/// Signs with whatever key the session currently holds.
#[derive(Debug, Clone)]
pub struct Signer {
    session: Arc<SessionKeyCache>,
}

impl Signer {
    pub fn new(session: Arc<SessionKeyCache>) -> Self {
        Self { session }
    }

    /// Sign `message` whole. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Result<SignedMessage, SignerError> {
        let (signature, public_key) = self
            .session
            .with_key(|key| (key.sign(message), key.public_key()))?;
        Ok(SignedMessage {
            signature,
            public_key,
        })
    }

    pub fn derive_public_key(&self) -> Result<PublicKey, SignerError> {
        Ok(self.session.public_key()?)
    }

    pub fn account_id(&self) -> Result<AccountId, SignerError> {
        Ok(self.session.account_id()?)
    }

    /// Assemble an unsigned transaction from the session's account.
    pub fn transaction(
        &self,
        receiver_id: impl Into<String>,
        actions: Vec<Action>,
    ) -> Result<Transaction, SignerError> {
        let (signer_id, public_key) = self
            .session
            .with_key(|key| (key.account_id().to_string(), key.public_key().to_bytes()))?;
        Ok(Transaction {
            signer_id,
            public_key,
            receiver_id: receiver_id.into(),
            actions,
        })
    }

    /// Sign the SHA-256 hash of the transaction's canonical encoding.
    pub fn sign_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<SignedTransaction, SignerError> {
        let hash = transaction
            .hash()
            .map_err(|e| SignerError::Encoding(e.to_string()))?;
        let signature = self.session.with_key(|key| key.sign(&hash))?;
        Ok(SignedTransaction {
            transaction,
            signature,
            hash: hex::encode(hash),
        })
    }

    /// Check `signature` over `message`.
    pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        crypto::verify(public_key, message, signature).is_ok()
    }
}
