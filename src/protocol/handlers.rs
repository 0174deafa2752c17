//! Message handlers bridging the dispatcher to the protocol services.
//!
//! Each handler covers one protocol family. The shape match ends with an
//! `UnsupportedMessageType` arm so a handler registered under a
//! discriminator it does not actually implement fails that one dispatch
//! instead of poisoning the rest.

use crate::core::{Error, Result};
use crate::dispatch::{AgentContext, MessageHandler};
use crate::messages::{
    message_type_of, ConnectionRequest, ConnectionResponse, CredentialIssueMessage,
    CredentialOfferMessage, CredentialRequestMessage, ProofPresentationMessage,
    ProofRequestMessage, CONNECTION_REQUEST, CONNECTION_RESPONSE, CREDENTIAL_ISSUE,
    CREDENTIAL_OFFER, CREDENTIAL_REQUEST, PROOF_PRESENTATION, PROOF_REQUEST,
};
use crate::protocol::{ConnectionService, CredentialService, ProofService};
use async_trait::async_trait;
use std::sync::Arc;

fn decode<T: serde::de::DeserializeOwned>(message: serde_json::Value) -> Result<T> {
    serde_json::from_value(message).map_err(|err| Error::DeserializationFailure(err.to_string()))
}

/// Resolve the connection a message arrived over: the transport-supplied
/// id when present, otherwise the record owning the unsealing key.
async fn resolve_connection_id(
    connections: &ConnectionService,
    context: &AgentContext,
) -> Result<String> {
    if let Some(connection_id) = &context.connection_id {
        return Ok(connection_id.clone());
    }
    let recipient_key = context
        .recipient_key
        .as_deref()
        .ok_or_else(|| Error::Internal("message context carries no recipient key".to_string()))?;
    Ok(connections.resolve_by_my_verkey(recipient_key).await?.id)
}

/// Handles connection handshake messages.
pub struct ConnectionHandler {
    connections: Arc<ConnectionService>,
}

impl ConnectionHandler {
    /// Create a connection handler.
    pub fn new(connections: Arc<ConnectionService>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl MessageHandler for ConnectionHandler {
    fn supported_types(&self) -> &[&'static str] {
        &[CONNECTION_REQUEST, CONNECTION_RESPONSE]
    }

    async fn handle(&self, message: serde_json::Value, context: &AgentContext) -> Result<()> {
        let msg_type = message_type_of(&message)?.to_string();
        let connection_id = resolve_connection_id(&self.connections, context).await?;

        match msg_type.as_str() {
            CONNECTION_REQUEST => {
                let request: ConnectionRequest = decode(message)?;
                self.connections.process_request(&connection_id, &request).await
            }
            CONNECTION_RESPONSE => {
                let response: ConnectionResponse = decode(message)?;
                self.connections.process_response(&connection_id, &response).await
            }
            other => Err(Error::UnsupportedMessageType(other.to_string())),
        }
    }
}

/// Handles credential issuance messages.
pub struct CredentialHandler {
    connections: Arc<ConnectionService>,
    credentials: Arc<CredentialService>,
}

impl CredentialHandler {
    /// Create a credential handler.
    pub fn new(connections: Arc<ConnectionService>, credentials: Arc<CredentialService>) -> Self {
        Self {
            connections,
            credentials,
        }
    }
}

#[async_trait]
impl MessageHandler for CredentialHandler {
    fn supported_types(&self) -> &[&'static str] {
        &[CREDENTIAL_OFFER, CREDENTIAL_REQUEST, CREDENTIAL_ISSUE]
    }

    async fn handle(&self, message: serde_json::Value, context: &AgentContext) -> Result<()> {
        let msg_type = message_type_of(&message)?.to_string();
        let connection_id = resolve_connection_id(&self.connections, context).await?;

        match msg_type.as_str() {
            CREDENTIAL_OFFER => {
                let offer: CredentialOfferMessage = decode(message)?;
                self.credentials.store_offer(&offer, &connection_id).await?;
                Ok(())
            }
            CREDENTIAL_REQUEST => {
                let request: CredentialRequestMessage = decode(message)?;
                self.credentials
                    .store_credential_request(&request, &connection_id)
                    .await?;
                Ok(())
            }
            CREDENTIAL_ISSUE => {
                let credential: CredentialIssueMessage = decode(message)?;
                self.credentials
                    .store_credential(&credential, &connection_id)
                    .await?;
                Ok(())
            }
            other => Err(Error::UnsupportedMessageType(other.to_string())),
        }
    }
}

/// Handles proof presentation messages.
pub struct ProofHandler {
    connections: Arc<ConnectionService>,
    proofs: Arc<ProofService>,
}

impl ProofHandler {
    /// Create a proof handler.
    pub fn new(connections: Arc<ConnectionService>, proofs: Arc<ProofService>) -> Self {
        Self { connections, proofs }
    }
}

#[async_trait]
impl MessageHandler for ProofHandler {
    fn supported_types(&self) -> &[&'static str] {
        &[PROOF_REQUEST, PROOF_PRESENTATION]
    }

    async fn handle(&self, message: serde_json::Value, context: &AgentContext) -> Result<()> {
        let msg_type = message_type_of(&message)?.to_string();
        let connection_id = resolve_connection_id(&self.connections, context).await?;

        match msg_type.as_str() {
            PROOF_REQUEST => {
                let request: ProofRequestMessage = decode(message)?;
                self.proofs.store_proof_request(&request, &connection_id).await?;
                Ok(())
            }
            PROOF_PRESENTATION => {
                let presentation: ProofPresentationMessage = decode(message)?;
                self.proofs.store_proof(&presentation, &connection_id).await?;
                Ok(())
            }
            other => Err(Error::UnsupportedMessageType(other.to_string())),
        }
    }
}
