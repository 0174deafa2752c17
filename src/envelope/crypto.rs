//! Development crypto provider.
//!
//! XChaCha20-Poly1305 sealing with an HKDF-SHA256 key derived from the
//! recipient verification key, plus Ed25519 sender authentication carried
//! inside the sealed frame. Suitable for tests and local development;
//! deployments inject their own [`CryptoProvider`] implementation.

use crate::core::{Error, Result};
use crate::envelope::CryptoProvider;
use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use tokio::sync::RwLock;

const NONCE_LEN: usize = 24;
const KEY_INFO: &[u8] = b"pactum-envelope-v1";

/// Inner frame sealed under the recipient-derived key.
#[derive(Serialize, Deserialize)]
struct SealedFrame {
    payload: Vec<u8>,
    sender_key: Option<String>,
    signature: Option<Vec<u8>>,
}

/// In-memory key store implementing the sealing primitive.
pub struct DevCryptoProvider {
    keys: RwLock<HashMap<String, SigningKey>>,
}

impl DevCryptoProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn cipher_for(recipient_key: &str) -> Result<XChaCha20Poly1305> {
        let hk = Hkdf::<Sha256>::new(None, recipient_key.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KEY_INFO, &mut okm)
            .map_err(|err| Error::Internal(format!("key derivation failed: {err}")))?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(&okm)))
    }

    fn verifying_key(verkey: &str) -> Result<VerifyingKey> {
        let bytes = hex::decode(verkey)
            .map_err(|_| Error::UnknownKey(verkey.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::UnknownKey(verkey.to_string()))?;
        Ok(VerifyingKey::from_bytes(&bytes)?)
    }
}

impl Default for DevCryptoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CryptoProvider for DevCryptoProvider {
    async fn create_key(&self) -> Result<String> {
        use rand::RngCore;
        let mut csprng = rand::rngs::OsRng;
        let mut secret_key_bytes = [0u8; 32];
        csprng.fill_bytes(&mut secret_key_bytes);
        let signing_key = SigningKey::from_bytes(&secret_key_bytes);

        let verkey = hex::encode(signing_key.verifying_key().to_bytes());
        self.keys.write().await.insert(verkey.clone(), signing_key);
        Ok(verkey)
    }

    async fn seal(
        &self,
        payload: &[u8],
        sender_key: Option<&str>,
        recipient_key: &str,
    ) -> Result<Vec<u8>> {
        let signature = match sender_key {
            Some(verkey) => {
                let keys = self.keys.read().await;
                let signing_key = keys
                    .get(verkey)
                    .ok_or_else(|| Error::UnknownKey(verkey.to_string()))?;
                Some(signing_key.sign(payload).to_bytes().to_vec())
            }
            None => None,
        };

        let frame = SealedFrame {
            payload: payload.to_vec(),
            sender_key: sender_key.map(str::to_string),
            signature,
        };
        let frame_bytes = bincode::serialize(&frame)?;

        use rand::RngCore;
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let cipher = Self::cipher_for(recipient_key)?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), frame_bytes.as_slice())
            .map_err(|_| Error::Internal("envelope encryption failed".to_string()))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    async fn unseal(
        &self,
        ciphertext: &[u8],
        recipient_key: &str,
    ) -> Result<(Vec<u8>, Option<String>)> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(Error::DecryptionFailure("ciphertext too short".to_string()));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        let cipher = Self::cipher_for(recipient_key)?;
        let frame_bytes = cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| {
                Error::DecryptionFailure("envelope not sealed for this recipient key".to_string())
            })?;

        let frame: SealedFrame = bincode::deserialize(&frame_bytes)
            .map_err(|err| Error::DeserializationFailure(err.to_string()))?;

        if let Some(sender_key) = &frame.sender_key {
            let signature = frame
                .signature
                .as_deref()
                .ok_or_else(|| Error::DecryptionFailure("missing sender signature".to_string()))?;
            let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| {
                Error::DecryptionFailure("invalid sender signature length".to_string())
            })?;
            let verifying_key = Self::verifying_key(sender_key)?;
            verifying_key.verify(&frame.payload, &Signature::from_bytes(&sig_bytes))?;
        }

        Ok((frame.payload, frame.sender_key))
    }
}
