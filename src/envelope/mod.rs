//! Sealed message envelopes.
//!
//! An envelope is an addressed, sealed container for one protocol message:
//! opaque ciphertext bound to a recipient verification key, optionally
//! authenticated under a sender key. Sealing never transmits; the caller
//! hands the envelope to a router. The sealing primitive itself is an
//! injected [`CryptoProvider`].

mod crypto;

pub use crypto::DevCryptoProvider;

use crate::core::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Addressed, sealed container for a protocol message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque ciphertext produced by the crypto provider.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// Verification key the payload is sealed for.
    #[serde(rename = "recipientKey")]
    pub recipient_key: String,
    /// Sender verification key; absent in anonymous mode.
    #[serde(rename = "senderKey", skip_serializing_if = "Option::is_none")]
    pub sender_key: Option<String>,
}

/// Injected cryptographic sealing primitive.
///
/// Implementations must guarantee that unsealing with a key other than the
/// one sealed for fails, and must report the authenticated sender key (or
/// its absence) on unseal.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Create a key pair, returning the verification key identifier.
    async fn create_key(&self) -> Result<String>;

    /// Seal payload bytes for a recipient key. `sender_key = Some(..)`
    /// selects sender-authenticated mode; `None` seals anonymously.
    async fn seal(
        &self,
        payload: &[u8],
        sender_key: Option<&str>,
        recipient_key: &str,
    ) -> Result<Vec<u8>>;

    /// Unseal ciphertext with the recipient key, returning the payload
    /// bytes and the authenticated sender key if one was used.
    async fn unseal(&self, ciphertext: &[u8], recipient_key: &str)
        -> Result<(Vec<u8>, Option<String>)>;
}

/// Seals and unseals typed payloads via the injected crypto provider.
#[derive(Clone)]
pub struct EnvelopeService {
    crypto: Arc<dyn CryptoProvider>,
}

impl EnvelopeService {
    /// Create an envelope service over a crypto provider.
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// The underlying crypto provider.
    pub fn crypto(&self) -> &Arc<dyn CryptoProvider> {
        &self.crypto
    }

    /// Serialize and seal a payload for a recipient key.
    pub async fn seal<T: Serialize + Sync>(
        &self,
        payload: &T,
        sender_key: Option<&str>,
        recipient_key: &str,
    ) -> Result<Envelope> {
        let bytes = serde_json::to_vec(payload)?;
        let ciphertext = self.crypto.seal(&bytes, sender_key, recipient_key).await?;
        Ok(Envelope {
            ciphertext,
            recipient_key: recipient_key.to_string(),
            sender_key: sender_key.map(str::to_string),
        })
    }

    /// Unseal an envelope and decode the payload as `T`.
    ///
    /// Returns the payload together with the sender key recovered in
    /// authenticated mode (`None` means the message arrived anonymously and
    /// the sender's identity must not be trusted). The envelope is not
    /// mutated.
    pub async fn unseal<T: DeserializeOwned>(
        &self,
        envelope: &Envelope,
        recipient_key: &str,
    ) -> Result<(T, Option<String>)> {
        let (bytes, sender_key) = self
            .crypto
            .unseal(&envelope.ciphertext, recipient_key)
            .await?;
        let payload = serde_json::from_slice(&bytes)
            .map_err(|err| Error::DeserializationFailure(err.to_string()))?;
        Ok((payload, sender_key))
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
