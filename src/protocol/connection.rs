//! Connection service: pairwise handshake between two agents.
//!
//! Inviter: `create_invitation` -> (out of band) -> `process_request`
//! advances Invited straight to Connected and sends a response. Invitee:
//! `accept_invitation` advances to Negotiating and sends a request;
//! `process_response` completes the handshake.

use crate::core::{Error, Result};
use crate::envelope::EnvelopeService;
use crate::fsm::{Stateful, TransitionTable};
use crate::messages::{ConnectionInvitation, ConnectionRequest, ConnectionResponse};
use crate::protocol::{external_call, ServiceConfig};
use crate::provider::RouterService;
use crate::records::{ConnectionRecord, ConnectionState, ConnectionTrigger, RecordKind};
use crate::store::{SearchQuery, Wallet};
use std::sync::Arc;
use tracing::info;

/// Derive a pairwise DID from a fresh verification key. Truncates by
/// character, since an injected provider may return non-ASCII key ids.
fn did_from_verkey(verkey: &str) -> String {
    let short: String = verkey.chars().take(16).collect();
    format!("did:pactum:{short}")
}

/// Orchestrates the connection protocol for one agent.
pub struct ConnectionService {
    wallet: Arc<Wallet>,
    envelope: EnvelopeService,
    router: Arc<dyn RouterService>,
    endpoint: String,
    config: ServiceConfig,
    table: TransitionTable<ConnectionState, ConnectionTrigger>,
}

impl ConnectionService {
    /// Create a connection service.
    ///
    /// `endpoint` is this agent's own service endpoint, advertised in
    /// invitations and requests so peers can route envelopes back.
    pub fn new(
        wallet: Arc<Wallet>,
        envelope: EnvelopeService,
        router: Arc<dyn RouterService>,
        endpoint: &str,
        config: ServiceConfig,
    ) -> Self {
        Self {
            wallet,
            envelope,
            router,
            endpoint: endpoint.to_string(),
            config,
            table: ConnectionRecord::transitions(),
        }
    }

    /// Create an invitation for a new peer.
    ///
    /// Adds a record at `Invited` and returns it with the invitation
    /// message to deliver out of band.
    pub async fn create_invitation(&self) -> Result<(String, ConnectionInvitation)> {
        let verkey = self.envelope.crypto().create_key().await?;
        let record = ConnectionRecord::new(&did_from_verkey(&verkey), &verkey);
        self.wallet.add(&record).await?;

        info!(connection_id = %record.id, "created connection invitation");
        Ok((record.id.clone(), ConnectionInvitation::new(&verkey, &self.endpoint)))
    }

    /// Accept a received invitation.
    ///
    /// Creates a record, advances it to `Negotiating` and forwards a
    /// connection request sealed for the inviter's connection key.
    pub async fn accept_invitation(&self, invitation: &ConnectionInvitation) -> Result<String> {
        let verkey = self.envelope.crypto().create_key().await?;
        let mut record = ConnectionRecord::new(&did_from_verkey(&verkey), &verkey);
        record.endpoint = Some(invitation.endpoint.clone());
        self.table
            .apply(&mut record, ConnectionTrigger::InvitationAccept)?;

        let request = ConnectionRequest::new(&record.my_did, &record.my_verkey, &self.endpoint);
        let sealed = self
            .envelope
            .seal(&request, Some(&record.my_verkey), &invitation.connection_key)
            .await?;
        external_call(
            self.config.external_timeout,
            "router",
            self.router.forward(sealed, &invitation.endpoint),
        )
        .await?;

        self.wallet.add(&record).await?;
        info!(connection_id = %record.id, "accepted connection invitation");
        Ok(record.id)
    }

    /// Process a peer's connection request (inviter side).
    ///
    /// Records the peer's keys, forwards a connection response, and
    /// advances the record from `Invited` directly to `Connected`.
    pub async fn process_request(
        &self,
        connection_id: &str,
        request: &ConnectionRequest,
    ) -> Result<()> {
        let _guard = self
            .wallet
            .lock_record(RecordKind::Connection, connection_id)
            .await;
        let mut record: ConnectionRecord = self.wallet.get(connection_id).await?;

        // Fail fast before any external I/O.
        if self
            .table
            .next(record.state(), ConnectionTrigger::Request)
            .is_none()
        {
            return Err(Error::InvalidTransition {
                state: record.state().to_string(),
                trigger: ConnectionTrigger::Request.to_string(),
            });
        }

        record.their_did = Some(request.did.clone());
        record.their_verkey = Some(request.verkey.clone());
        record.endpoint = Some(request.endpoint.clone());

        let response = ConnectionResponse::new(&record.my_did, &record.my_verkey);
        let sealed = self
            .envelope
            .seal(&response, Some(&record.my_verkey), &request.verkey)
            .await?;
        external_call(
            self.config.external_timeout,
            "router",
            self.router.forward(sealed, &request.endpoint),
        )
        .await?;

        self.table.apply(&mut record, ConnectionTrigger::Request)?;
        self.wallet.update(&record).await?;
        info!(connection_id, "connection established (inviter)");
        Ok(())
    }

    /// Process a peer's connection response (invitee side), completing the
    /// handshake.
    pub async fn process_response(
        &self,
        connection_id: &str,
        response: &ConnectionResponse,
    ) -> Result<()> {
        let _guard = self
            .wallet
            .lock_record(RecordKind::Connection, connection_id)
            .await;
        let mut record: ConnectionRecord = self.wallet.get(connection_id).await?;

        record.their_did = Some(response.did.clone());
        record.their_verkey = Some(response.verkey.clone());

        self.table.apply(&mut record, ConnectionTrigger::Response)?;
        self.wallet.update(&record).await?;
        info!(connection_id, "connection established (invitee)");
        Ok(())
    }

    /// Get a connection record by id.
    pub async fn get(&self, connection_id: &str) -> Result<ConnectionRecord> {
        self.wallet.get(connection_id).await
    }

    /// List connection records matching a tag query.
    pub async fn list(&self, query: &SearchQuery, limit: usize) -> Result<Vec<ConnectionRecord>> {
        self.wallet.search(query, limit).await
    }

    /// Resolve the connection whose pairwise key an envelope was sealed
    /// for. Fails with `AmbiguousMatch` if more than one record claims the
    /// key.
    pub async fn resolve_by_my_verkey(&self, verkey: &str) -> Result<ConnectionRecord> {
        self.wallet
            .search_single(&SearchQuery::new().eq("myVerkey", verkey))
            .await
    }

    /// Peer verkey and endpoint of a connected record; fails if the
    /// handshake has not progressed far enough to know them.
    pub fn peer_route(record: &ConnectionRecord) -> Result<(String, String)> {
        let their_verkey = record
            .their_verkey
            .clone()
            .ok_or_else(|| Error::Internal(format!("connection {} has no peer key", record.id)))?;
        let endpoint = record.endpoint.clone().ok_or_else(|| {
            Error::Internal(format!("connection {} has no peer endpoint", record.id))
        })?;
        Ok((their_verkey, endpoint))
    }
}
