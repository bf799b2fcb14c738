//! AES-256-GCM envelope encryption of wallet seeds.
//!
//! Each call to [`encrypt`] draws a fresh 96-bit IV from the OS RNG. The
//! authentication tag is kept detached so records store the
//! `{ciphertext, iv, auth_tag}` triple separately.
//!
//! The data key is supplied as text, either standard base64 or hex
//! (optionally `0x`-prefixed), and must decode to exactly 32 bytes.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use playvault_core::constants::{AUTH_TAG_LEN, DATA_KEY_LEN, IV_LEN};
use playvault_core::crypto::SecretSeed;
use playvault_core::types::EncryptedSeed;

use crate::error::CipherError;

/// 256-bit data key for the envelope cipher. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey {
    bytes: [u8; DATA_KEY_LEN],
}

impl EnvelopeKey {
    /// Generate a random data key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; DATA_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; DATA_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Parse a base64 or hex encoded key.
    pub fn parse(text: &str) -> Result<Self, CipherError> {
        let text = text.trim();
        let hex_body = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);

        let decoded = if hex_body.len() == DATA_KEY_LEN * 2
            && hex_body.bytes().all(|b| b.is_ascii_hexdigit())
        {
            Zeroizing::new(
                hex::decode(hex_body)
                    .map_err(|_| CipherError::InvalidKeyFormat("malformed hex".into()))?,
            )
        } else {
            Zeroizing::new(BASE64.decode(text).map_err(|_| {
                CipherError::InvalidKeyFormat("expected base64 or hex".into())
            })?)
        };

        let bytes: [u8; DATA_KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            CipherError::InvalidKeyFormat(format!(
                "expected {DATA_KEY_LEN} bytes, got {}",
                decoded.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Base64 encoding of the key, for operators provisioning configuration.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.bytes))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(&self.bytes).map_err(|e| CipherError::Encryption(e.to_string()))
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &EnvelopeKey) -> Result<EncryptedSeed, CipherError> {
    use rand::RngCore;
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = key.cipher()?;
    // Wiped on drop if encryption fails with plaintext still in place.
    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut *buffer)
        .map_err(|e| CipherError::Encryption(e.to_string()))?;

    Ok(EncryptedSeed {
        ciphertext: std::mem::take(&mut *buffer),
        iv: iv.to_vec(),
        auth_tag: tag.to_vec(),
    })
}

/// Decrypt and authenticate. Pure: no state is touched.
///
/// Every failure, including malformed IV or tag lengths, is reported as
/// [`CipherError::AuthenticationFailure`].
pub fn decrypt(
    ciphertext: &[u8],
    iv: &[u8],
    auth_tag: &[u8],
    key: &EnvelopeKey,
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if iv.len() != IV_LEN || auth_tag.len() != AUTH_TAG_LEN {
        return Err(CipherError::AuthenticationFailure);
    }
    let cipher = key
        .cipher()
        .map_err(|_| CipherError::AuthenticationFailure)?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut *buffer,
            Tag::from_slice(auth_tag),
        )
        .map_err(|_| CipherError::AuthenticationFailure)?;
    Ok(buffer)
}

/// Encrypt a signing seed.
pub fn encrypt_seed(seed: &SecretSeed, key: &EnvelopeKey) -> Result<EncryptedSeed, CipherError> {
    encrypt(seed.as_bytes(), key)
}

/// Decrypt a signing seed. A plaintext of the wrong length is treated as an
/// authentication failure.
pub fn decrypt_seed(sealed: &EncryptedSeed, key: &EnvelopeKey) -> Result<SecretSeed, CipherError> {
    let plaintext = decrypt(&sealed.ciphertext, &sealed.iv, &sealed.auth_tag, key)?;
    SecretSeed::from_slice(&plaintext).map_err(|_| CipherError::AuthenticationFailure)
}
