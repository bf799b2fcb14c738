//! Decrypted key material held in session memory.

use std::fmt;

use playvault_core::crypto::{KeyPair, PublicKey, SecretSeed, Signature};
use playvault_core::types::AccountId;

/// A decrypted signing key plus the account it signs for.
///
/// The underlying ed25519 signing key is zeroized on drop. Not `Clone`,
/// not `Serialize`, and `Debug` shows only public data.
pub struct DecryptedKeyMaterial {
    keypair: KeyPair,
    account_id: AccountId,
}

impl DecryptedKeyMaterial {
    pub fn new(seed: &SecretSeed, account_id: AccountId) -> Self {
        Self {
            keypair: KeyPair::from_seed(seed),
            account_id,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Sign a fully assembled message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }
}

impl fmt::Debug for DecryptedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedKeyMaterial")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
