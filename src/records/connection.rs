//! Connection records and the pairwise handshake lifecycle.

use crate::core::{new_record_id, now, Timestamp};
use crate::fsm::{Stateful, TransitionTable};
use crate::records::{RecordKind, TagMap, WalletRecord};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a pairwise connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Invitation created or received, handshake not started.
    Invited,
    /// Invitation accepted, awaiting the peer's response.
    Negotiating,
    /// Handshake complete on both sides.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Invited => write!(f, "Invited"),
            ConnectionState::Negotiating => write!(f, "Negotiating"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Triggers that advance a connection record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionTrigger {
    /// Invitee accepts a received invitation.
    InvitationAccept,
    /// Inviter processes the peer's connection request.
    Request,
    /// Invitee processes the peer's connection response.
    Response,
}

impl std::fmt::Display for ConnectionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionTrigger::InvitationAccept => write!(f, "InvitationAccept"),
            ConnectionTrigger::Request => write!(f, "Request"),
            ConnectionTrigger::Response => write!(f, "Response"),
        }
    }
}

/// A pairwise connection with a peer agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Record identifier.
    pub id: String,
    state: ConnectionState,
    /// Our DID for this pairwise relationship.
    pub my_did: String,
    /// Our verification key for this pairwise relationship.
    pub my_verkey: String,
    /// Peer DID, known once the handshake exchange starts.
    pub their_did: Option<String>,
    /// Peer verification key.
    pub their_verkey: Option<String>,
    /// Peer service endpoint for outbound envelopes.
    pub endpoint: Option<String>,
    /// Creation timestamp.
    pub created: Timestamp,
}

impl ConnectionRecord {
    /// Create a new connection record at the `Invited` state.
    pub fn new(my_did: &str, my_verkey: &str) -> Self {
        Self {
            id: new_record_id(),
            state: ConnectionState::Invited,
            my_did: my_did.to_string(),
            my_verkey: my_verkey.to_string(),
            their_did: None,
            their_verkey: None,
            endpoint: None,
            created: now(),
        }
    }

    /// The transition table governing connection records.
    ///
    /// `Invited --Request--> Connected` is the skip-negotiation path taken
    /// by the inviter, who never observes the Negotiating state.
    pub fn transitions() -> TransitionTable<ConnectionState, ConnectionTrigger> {
        TransitionTable::new()
            .allow(
                ConnectionState::Invited,
                ConnectionTrigger::InvitationAccept,
                ConnectionState::Negotiating,
            )
            .allow(
                ConnectionState::Invited,
                ConnectionTrigger::Request,
                ConnectionState::Connected,
            )
            .allow(
                ConnectionState::Negotiating,
                ConnectionTrigger::Response,
                ConnectionState::Connected,
            )
    }
}

impl Stateful for ConnectionRecord {
    type State = ConnectionState;
    type Trigger = ConnectionTrigger;

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }
}

impl WalletRecord for ConnectionRecord {
    const KIND: RecordKind = RecordKind::Connection;

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert("myVerkey".to_string(), self.my_verkey.clone());
        if let Some(their_verkey) = &self.their_verkey {
            tags.insert("theirVerkey".to_string(), their_verkey.clone());
        }
        tags
    }
}
