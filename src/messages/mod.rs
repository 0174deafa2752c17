//! Protocol message types.
//!
//! Every message carries a string `@type` discriminator, stable across
//! versions of a given shape; it is the dispatcher's routing key.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Connection invitation.
pub const CONNECTION_INVITATION: &str = "https://didcomm.org/connections/1.0/invitation";
/// Connection request.
pub const CONNECTION_REQUEST: &str = "https://didcomm.org/connections/1.0/request";
/// Connection response.
pub const CONNECTION_RESPONSE: &str = "https://didcomm.org/connections/1.0/response";
/// Credential offer.
pub const CREDENTIAL_OFFER: &str = "https://didcomm.org/issue-credential/1.0/offer";
/// Credential request.
pub const CREDENTIAL_REQUEST: &str = "https://didcomm.org/issue-credential/1.0/request";
/// Issued credential.
pub const CREDENTIAL_ISSUE: &str = "https://didcomm.org/issue-credential/1.0/issue";
/// Proof request.
pub const PROOF_REQUEST: &str = "https://didcomm.org/present-proof/1.0/request";
/// Proof presentation.
pub const PROOF_PRESENTATION: &str = "https://didcomm.org/present-proof/1.0/presentation";
/// Forward through a routing intermediary.
pub const ROUTING_FORWARD: &str = "https://didcomm.org/routing/1.0/forward";

/// Read the `@type` discriminator from a decoded message body.
pub fn message_type_of(body: &serde_json::Value) -> Result<&str> {
    body.get("@type")
        .and_then(|value| value.as_str())
        .ok_or(Error::MissingMessageType)
}

/// Invitation to connect, delivered out of band.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionInvitation {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Inviter's connection key; the invitee seals its request for it.
    #[serde(rename = "connectionKey")]
    pub connection_key: String,
    /// Inviter's service endpoint.
    pub endpoint: String,
}

impl ConnectionInvitation {
    /// Create an invitation message.
    pub fn new(connection_key: &str, endpoint: &str) -> Self {
        Self {
            msg_type: CONNECTION_INVITATION.to_string(),
            connection_key: connection_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Connection request from invitee to inviter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionRequest {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Invitee's pairwise DID.
    pub did: String,
    /// Invitee's pairwise verification key.
    pub verkey: String,
    /// Invitee's service endpoint.
    pub endpoint: String,
}

impl ConnectionRequest {
    /// Create a connection request message.
    pub fn new(did: &str, verkey: &str, endpoint: &str) -> Self {
        Self {
            msg_type: CONNECTION_REQUEST.to_string(),
            did: did.to_string(),
            verkey: verkey.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Connection response from inviter to invitee.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionResponse {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Inviter's pairwise DID.
    pub did: String,
    /// Inviter's pairwise verification key.
    pub verkey: String,
}

impl ConnectionResponse {
    /// Create a connection response message.
    pub fn new(did: &str, verkey: &str) -> Self {
        Self {
            msg_type: CONNECTION_RESPONSE.to_string(),
            did: did.to_string(),
            verkey: verkey.to_string(),
        }
    }
}

/// Credential offer from issuer to holder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialOfferMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Offer payload from the credential math provider.
    #[serde(rename = "offerJson")]
    pub offer_json: String,
}

impl CredentialOfferMessage {
    /// Create a credential offer message.
    pub fn new(offer_json: &str) -> Self {
        Self {
            msg_type: CREDENTIAL_OFFER.to_string(),
            offer_json: offer_json.to_string(),
        }
    }
}

/// Credential request from holder to issuer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRequestMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Offer the request answers; carries the correlating nonce.
    #[serde(rename = "offerJson")]
    pub offer_json: String,
    /// Request payload from the credential math provider.
    #[serde(rename = "requestJson")]
    pub request_json: String,
    /// Attribute values the holder asks to be credentialed over.
    #[serde(rename = "valuesJson")]
    pub values_json: String,
}

impl CredentialRequestMessage {
    /// Create a credential request message.
    pub fn new(offer_json: &str, request_json: &str, values_json: &str) -> Self {
        Self {
            msg_type: CREDENTIAL_REQUEST.to_string(),
            offer_json: offer_json.to_string(),
            request_json: request_json.to_string(),
            values_json: values_json.to_string(),
        }
    }
}

/// Issued credential from issuer to holder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialIssueMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Credential payload from the credential math provider.
    #[serde(rename = "credentialJson")]
    pub credential_json: String,
    /// Revocation registry the credential was issued under, if revocable.
    #[serde(rename = "revocationRegistryId", skip_serializing_if = "Option::is_none")]
    pub revocation_registry_id: Option<String>,
}

impl CredentialIssueMessage {
    /// Create an issued-credential message.
    pub fn new(credential_json: &str, revocation_registry_id: Option<&str>) -> Self {
        Self {
            msg_type: CREDENTIAL_ISSUE.to_string(),
            credential_json: credential_json.to_string(),
            revocation_registry_id: revocation_registry_id.map(str::to_string),
        }
    }
}

/// Proof request from verifier to prover.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofRequestMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Proof request payload; carries the correlating nonce.
    #[serde(rename = "requestJson")]
    pub request_json: String,
}

impl ProofRequestMessage {
    /// Create a proof request message.
    pub fn new(request_json: &str) -> Self {
        Self {
            msg_type: PROOF_REQUEST.to_string(),
            request_json: request_json.to_string(),
        }
    }
}

/// Proof presentation from prover to verifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofPresentationMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Request the presentation answers.
    #[serde(rename = "requestJson")]
    pub request_json: String,
    /// Presentation payload from the credential math provider.
    #[serde(rename = "proofJson")]
    pub proof_json: String,
}

impl ProofPresentationMessage {
    /// Create a proof presentation message.
    pub fn new(request_json: &str, proof_json: &str) -> Self {
        Self {
            msg_type: PROOF_PRESENTATION.to_string(),
            request_json: request_json.to_string(),
            proof_json: proof_json.to_string(),
        }
    }
}

/// Wrapper asking a routing intermediary to pass a sealed envelope on to
/// the recipient key it is addressed to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardMessage {
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Recipient verification key the inner envelope is sealed for.
    pub to: String,
    /// The sealed envelope being forwarded, as serialized.
    pub msg: serde_json::Value,
}

impl ForwardMessage {
    /// Wrap a sealed envelope for a routing intermediary.
    pub fn new(to: &str, msg: serde_json::Value) -> Self {
        Self {
            msg_type: ROUTING_FORWARD.to_string(),
            to: to.to_string(),
            msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_is_stable_on_the_wire() {
        let msg = ConnectionRequest::new("did:pactum:bob", "bob-vk", "http://bob");
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire.get("@type").unwrap(), CONNECTION_REQUEST);
    }

    #[test]
    fn test_message_type_of_reads_discriminator() {
        let body = serde_json::json!({"@type": CREDENTIAL_OFFER, "offerJson": "{}"});
        assert_eq!(message_type_of(&body).unwrap(), CREDENTIAL_OFFER);
    }

    #[test]
    fn test_message_type_of_missing_discriminator() {
        let body = serde_json::json!({"offerJson": "{}"});
        assert!(matches!(
            message_type_of(&body).unwrap_err(),
            Error::MissingMessageType
        ));
    }

    #[test]
    fn test_forward_message_wraps_envelope() {
        let inner = serde_json::json!({"ciphertext": "AAAA", "recipientKey": "vk"});
        let msg = ForwardMessage::new("vk", inner.clone());
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire.get("@type").unwrap(), ROUTING_FORWARD);
        assert_eq!(wire.get("to").unwrap(), "vk");
        assert_eq!(wire.get("msg").unwrap(), &inner);
    }

    #[test]
    fn test_issue_message_omits_absent_registry() {
        let msg = CredentialIssueMessage::new("{}", None);
        let wire = serde_json::to_value(&msg).unwrap();
        assert!(wire.get("revocationRegistryId").is_none());
    }
}
