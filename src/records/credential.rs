//! Credential records and the offer/request/issue/revoke lifecycle.

use crate::core::{new_record_id, now, Timestamp};
use crate::fsm::{Stateful, TransitionTable};
use crate::records::{RecordKind, TagMap, WalletRecord};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a credential exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialState {
    /// Offer created (issuer) or stored (holder).
    Offered,
    /// Credential request received or sent.
    Requested,
    /// Credential issued and delivered.
    Issued,
    /// Credential revoked by the issuer.
    Revoked,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialState::Offered => write!(f, "Offered"),
            CredentialState::Requested => write!(f, "Requested"),
            CredentialState::Issued => write!(f, "Issued"),
            CredentialState::Revoked => write!(f, "Revoked"),
        }
    }
}

/// Triggers that advance a credential record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialTrigger {
    /// A credential request arrived for, or was sent against, the offer.
    Request,
    /// The credential was issued or stored.
    Issue,
    /// The issuer revoked the credential.
    Revoke,
}

impl std::fmt::Display for CredentialTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialTrigger::Request => write!(f, "Request"),
            CredentialTrigger::Issue => write!(f, "Issue"),
            CredentialTrigger::Revoke => write!(f, "Revoke"),
        }
    }
}

/// A credential exchange with a connected peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Record identifier.
    pub id: String,
    state: CredentialState,
    /// Connection this exchange runs over.
    pub connection_id: String,
    /// Credential definition id the offer was created from.
    pub definition_id: String,
    /// Schema id, parsed from the offer.
    pub schema_id: Option<String>,
    /// Offer nonce, used to correlate the peer's request.
    pub nonce: Option<String>,
    /// Offer payload from the credential math provider.
    pub offer_json: String,
    /// Request payload, once received or created.
    pub request_json: Option<String>,
    /// Attribute values the credential is issued over.
    pub values_json: Option<String>,
    /// Holder-side request metadata needed to store the credential.
    pub request_metadata_json: Option<String>,
    /// Wallet credential id assigned when the holder stores it.
    pub credential_id: Option<String>,
    /// Issuer-side revocation id within the revocation registry.
    pub revocation_id: Option<String>,
    /// Creation timestamp.
    pub created: Timestamp,
}

impl CredentialRecord {
    /// Create a new credential record at the `Offered` state.
    pub fn new(connection_id: &str, definition_id: &str, offer_json: &str) -> Self {
        Self {
            id: new_record_id(),
            state: CredentialState::Offered,
            connection_id: connection_id.to_string(),
            definition_id: definition_id.to_string(),
            schema_id: None,
            nonce: None,
            offer_json: offer_json.to_string(),
            request_json: None,
            values_json: None,
            request_metadata_json: None,
            credential_id: None,
            revocation_id: None,
            created: now(),
        }
    }

    /// The transition table governing credential records.
    ///
    /// Issue and Revoke from `Offered`, and Revoke from `Requested`, are
    /// deliberately absent: a credential can only be revoked once issued.
    pub fn transitions() -> TransitionTable<CredentialState, CredentialTrigger> {
        TransitionTable::new()
            .allow(
                CredentialState::Offered,
                CredentialTrigger::Request,
                CredentialState::Requested,
            )
            .allow(
                CredentialState::Requested,
                CredentialTrigger::Issue,
                CredentialState::Issued,
            )
            .allow(
                CredentialState::Issued,
                CredentialTrigger::Revoke,
                CredentialState::Revoked,
            )
    }
}

impl Stateful for CredentialRecord {
    type State = CredentialState;
    type Trigger = CredentialTrigger;

    fn state(&self) -> CredentialState {
        self.state
    }

    fn set_state(&mut self, state: CredentialState) {
        self.state = state;
    }
}

impl WalletRecord for CredentialRecord {
    const KIND: RecordKind = RecordKind::Credential;

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert("connectionId".to_string(), self.connection_id.clone());
        tags.insert("definitionId".to_string(), self.definition_id.clone());
        if let Some(nonce) = &self.nonce {
            tags.insert("nonce".to_string(), nonce.clone());
        }
        if let Some(schema_id) = &self.schema_id {
            tags.insert("schemaId".to_string(), schema_id.clone());
        }
        tags
    }
}
