//! Proof records and the request/present/verify lifecycle.

use crate::core::{new_record_id, now, Timestamp};
use crate::fsm::{Stateful, TransitionTable};
use crate::records::{RecordKind, TagMap, WalletRecord};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a proof presentation exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofState {
    /// Proof request created (verifier) or stored (prover).
    Requested,
    /// Presentation created or received.
    Presented,
    /// Presentation verified by the verifier.
    Verified,
}

impl std::fmt::Display for ProofState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofState::Requested => write!(f, "Requested"),
            ProofState::Presented => write!(f, "Presented"),
            ProofState::Verified => write!(f, "Verified"),
        }
    }
}

/// Triggers that advance a proof record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofTrigger {
    /// A presentation was created or received for the request.
    Present,
    /// The verifier checked the presentation.
    Verify,
}

impl std::fmt::Display for ProofTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProofTrigger::Present => write!(f, "Present"),
            ProofTrigger::Verify => write!(f, "Verify"),
        }
    }
}

/// A proof presentation exchange with a connected peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Record identifier.
    pub id: String,
    state: ProofState,
    /// Connection this exchange runs over.
    pub connection_id: String,
    /// Proof request payload.
    pub request_json: String,
    /// Request nonce, used to correlate the presentation.
    pub nonce: Option<String>,
    /// Presentation payload, once created or received.
    pub proof_json: Option<String>,
    /// Creation timestamp.
    pub created: Timestamp,
}

impl ProofRecord {
    /// Create a new proof record at the `Requested` state.
    pub fn new(connection_id: &str, request_json: &str) -> Self {
        Self {
            id: new_record_id(),
            state: ProofState::Requested,
            connection_id: connection_id.to_string(),
            request_json: request_json.to_string(),
            nonce: None,
            proof_json: None,
            created: now(),
        }
    }

    /// The transition table governing proof records.
    pub fn transitions() -> TransitionTable<ProofState, ProofTrigger> {
        TransitionTable::new()
            .allow(ProofState::Requested, ProofTrigger::Present, ProofState::Presented)
            .allow(ProofState::Presented, ProofTrigger::Verify, ProofState::Verified)
    }
}

impl Stateful for ProofRecord {
    type State = ProofState;
    type Trigger = ProofTrigger;

    fn state(&self) -> ProofState {
        self.state
    }

    fn set_state(&mut self, state: ProofState) {
        self.state = state;
    }
}

impl WalletRecord for ProofRecord {
    const KIND: RecordKind = RecordKind::Proof;

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert("connectionId".to_string(), self.connection_id.clone());
        if let Some(nonce) = &self.nonce {
            tags.insert("nonce".to_string(), nonce.clone());
        }
        tags
    }
}
