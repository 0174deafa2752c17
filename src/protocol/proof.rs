//! Proof presentation service.
//!
//! Verifier: `request_proof` -> `store_proof` -> `verify_proof`. Prover:
//! `store_proof_request` -> `create_proof`.

use crate::core::{Error, Result};
use crate::envelope::EnvelopeService;
use crate::fsm::{Stateful, TransitionTable};
use crate::messages::{ProofPresentationMessage, ProofRequestMessage};
use crate::protocol::{external_call, required_json_field, ConnectionService, ServiceConfig};
use crate::provider::{CredentialMathService, RouterService};
use crate::records::{ProofRecord, ProofState, ProofTrigger, RecordKind};
use crate::store::{SearchQuery, Wallet};
use std::sync::Arc;
use tracing::info;

/// Orchestrates the present-proof protocol for one agent.
pub struct ProofService {
    wallet: Arc<Wallet>,
    envelope: EnvelopeService,
    connections: Arc<ConnectionService>,
    math: Arc<dyn CredentialMathService>,
    router: Arc<dyn RouterService>,
    config: ServiceConfig,
    table: TransitionTable<ProofState, ProofTrigger>,
}

impl ProofService {
    /// Create a proof service.
    pub fn new(
        wallet: Arc<Wallet>,
        envelope: EnvelopeService,
        connections: Arc<ConnectionService>,
        math: Arc<dyn CredentialMathService>,
        router: Arc<dyn RouterService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            wallet,
            envelope,
            connections,
            math,
            router,
            config,
            table: ProofRecord::transitions(),
        }
    }

    fn guard(&self, record: &ProofRecord, trigger: ProofTrigger) -> Result<()> {
        if self.table.next(record.state(), trigger).is_none() {
            return Err(Error::InvalidTransition {
                state: record.state().to_string(),
                trigger: trigger.to_string(),
            });
        }
        Ok(())
    }

    /// Request a proof from a connected peer (verifier side).
    pub async fn request_proof(&self, connection_id: &str, request_json: &str) -> Result<String> {
        let connection = self.connections.get(connection_id).await?;
        let (their_verkey, endpoint) = ConnectionService::peer_route(&connection)?;

        let mut record = ProofRecord::new(connection_id, request_json);
        record.nonce = Some(required_json_field(request_json, "nonce")?);

        let message = ProofRequestMessage::new(request_json);
        let sealed = self
            .envelope
            .seal(&message, Some(&connection.my_verkey), &their_verkey)
            .await?;
        external_call(
            self.config.external_timeout,
            "router",
            self.router.forward(sealed, &endpoint),
        )
        .await?;

        self.wallet.add(&record).await?;
        info!(proof_id = %record.id, connection_id, "requested proof");
        Ok(record.id)
    }

    /// Store a received proof request (prover side).
    pub async fn store_proof_request(
        &self,
        request: &ProofRequestMessage,
        connection_id: &str,
    ) -> Result<String> {
        let mut record = ProofRecord::new(connection_id, &request.request_json);
        record.nonce = Some(required_json_field(&request.request_json, "nonce")?);

        self.wallet.add(&record).await?;
        info!(proof_id = %record.id, connection_id, "stored proof request");
        Ok(record.id)
    }

    /// Build and forward a presentation for a stored request (prover side).
    pub async fn create_proof(
        &self,
        proof_id: &str,
        requested_credentials_json: &str,
    ) -> Result<()> {
        let _guard = self.wallet.lock_record(RecordKind::Proof, proof_id).await;
        let mut record: ProofRecord = self.wallet.get(proof_id).await?;
        self.guard(&record, ProofTrigger::Present)?;

        let connection = self.connections.get(&record.connection_id).await?;
        let (their_verkey, endpoint) = ConnectionService::peer_route(&connection)?;

        let proof_json = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math
                .prover_create_proof(&record.request_json, requested_credentials_json),
        )
        .await?;

        let message = ProofPresentationMessage::new(&record.request_json, &proof_json);
        let sealed = self
            .envelope
            .seal(&message, Some(&connection.my_verkey), &their_verkey)
            .await?;
        external_call(
            self.config.external_timeout,
            "router",
            self.router.forward(sealed, &endpoint),
        )
        .await?;

        record.proof_json = Some(proof_json);
        self.table.apply(&mut record, ProofTrigger::Present)?;
        self.wallet.update(&record).await?;
        info!(proof_id, "created proof presentation");
        Ok(())
    }

    /// Store a received presentation (verifier side).
    ///
    /// Correlates to the outstanding request by the nonce tag; more than
    /// one match fails with `AmbiguousMatch`.
    pub async fn store_proof(
        &self,
        presentation: &ProofPresentationMessage,
        _connection_id: &str,
    ) -> Result<String> {
        let nonce = required_json_field(&presentation.request_json, "nonce")?;
        let found: ProofRecord = self
            .wallet
            .search_single(&SearchQuery::new().eq("nonce", &nonce))
            .await?;

        let _guard = self.wallet.lock_record(RecordKind::Proof, &found.id).await;
        let mut record: ProofRecord = self.wallet.get(&found.id).await?;

        record.proof_json = Some(presentation.proof_json.clone());
        self.table.apply(&mut record, ProofTrigger::Present)?;
        self.wallet.update(&record).await?;
        info!(proof_id = %record.id, "stored proof presentation");
        Ok(record.id)
    }

    /// Verify a stored presentation (verifier side).
    ///
    /// The record only advances to `Verified` when the presentation is
    /// cryptographically valid; an invalid one leaves it at `Presented`.
    pub async fn verify_proof(&self, proof_id: &str) -> Result<bool> {
        let _guard = self.wallet.lock_record(RecordKind::Proof, proof_id).await;
        let mut record: ProofRecord = self.wallet.get(proof_id).await?;
        self.guard(&record, ProofTrigger::Verify)?;

        let proof_json = record
            .proof_json
            .clone()
            .ok_or_else(|| Error::Internal(format!("proof {proof_id} has no presentation")))?;
        let valid = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math
                .verifier_verify_proof(&record.request_json, &proof_json),
        )
        .await?;

        if valid {
            self.table.apply(&mut record, ProofTrigger::Verify)?;
            self.wallet.update(&record).await?;
        }
        info!(proof_id, valid, "verified proof presentation");
        Ok(valid)
    }

    /// Get a proof record by id.
    pub async fn get(&self, proof_id: &str) -> Result<ProofRecord> {
        self.wallet.get(proof_id).await
    }

    /// List proof records matching a tag query.
    pub async fn list(&self, query: &SearchQuery, limit: usize) -> Result<Vec<ProofRecord>> {
        self.wallet.search(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{DevCryptoProvider, Envelope};
    use crate::provider::stub::{ChannelRouter, StubCredentialMath};
    use crate::records::{ConnectionRecord, ConnectionTrigger};
    use crate::store::WalletConfig;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        service: ProofService,
        outbound: mpsc::UnboundedReceiver<(Envelope, String)>,
        wallet: Arc<Wallet>,
        envelope: EnvelopeService,
    }

    async fn fixture() -> Fixture {
        let wallet = Arc::new(Wallet::open(WalletConfig::new("test")).await.unwrap());
        let envelope = EnvelopeService::new(Arc::new(DevCryptoProvider::new()));
        let (router, outbound) = ChannelRouter::new();
        let router = Arc::new(router);
        let connections = Arc::new(ConnectionService::new(
            wallet.clone(),
            envelope.clone(),
            router.clone(),
            "http://agent",
            ServiceConfig::default(),
        ));
        let service = ProofService::new(
            wallet.clone(),
            envelope.clone(),
            connections,
            Arc::new(StubCredentialMath::new()),
            router,
            ServiceConfig::default(),
        );
        Fixture {
            service,
            outbound,
            wallet,
            envelope,
        }
    }

    async fn connected(fx: &Fixture) -> String {
        let my_verkey = fx.envelope.crypto().create_key().await.unwrap();
        let peer_verkey = fx.envelope.crypto().create_key().await.unwrap();
        let mut record = ConnectionRecord::new("did:pactum:me", &my_verkey);
        record.their_did = Some("did:pactum:peer".to_string());
        record.their_verkey = Some(peer_verkey);
        record.endpoint = Some("http://peer".to_string());
        let table = ConnectionRecord::transitions();
        table
            .apply(&mut record, ConnectionTrigger::InvitationAccept)
            .unwrap();
        table.apply(&mut record, ConnectionTrigger::Response).unwrap();
        fx.wallet.add(&record).await.unwrap();
        record.id
    }

    fn request() -> String {
        json!({"nonce": "n-1", "requested_attributes": {"attr1": {"name": "name"}}}).to_string()
    }

    #[tokio::test]
    async fn test_request_proof_forwards_and_persists() {
        let mut fx = fixture().await;
        let connection_id = connected(&fx).await;

        let proof_id = fx.service.request_proof(&connection_id, &request()).await.unwrap();
        let record = fx.service.get(&proof_id).await.unwrap();
        assert_eq!(record.state(), ProofState::Requested);
        assert_eq!(record.nonce.as_deref(), Some("n-1"));

        let (_, endpoint) = fx.outbound.recv().await.unwrap();
        assert_eq!(endpoint, "http://peer");
    }

    #[tokio::test]
    async fn test_prover_creates_and_sends_presentation() {
        let mut fx = fixture().await;
        let connection_id = connected(&fx).await;

        let message = ProofRequestMessage::new(&request());
        let proof_id = fx
            .service
            .store_proof_request(&message, &connection_id)
            .await
            .unwrap();

        fx.service
            .create_proof(&proof_id, r#"{"attr1":"cred-1"}"#)
            .await
            .unwrap();
        let record = fx.service.get(&proof_id).await.unwrap();
        assert_eq!(record.state(), ProofState::Presented);
        assert!(record.proof_json.is_some());

        let (_, endpoint) = fx.outbound.recv().await.unwrap();
        assert_eq!(endpoint, "http://peer");
    }

    #[tokio::test]
    async fn test_store_and_verify_valid_proof() {
        let fx = fixture().await;
        let connection_id = connected(&fx).await;
        let proof_id = fx.service.request_proof(&connection_id, &request()).await.unwrap();

        // Presentation echoing the request nonce, as the stub prover builds.
        let presentation = ProofPresentationMessage::new(
            &request(),
            &json!({"nonce": "n-1", "requested": {}}).to_string(),
        );
        let stored_id = fx
            .service
            .store_proof(&presentation, &connection_id)
            .await
            .unwrap();
        assert_eq!(stored_id, proof_id);

        assert!(fx.service.verify_proof(&proof_id).await.unwrap());
        let record = fx.service.get(&proof_id).await.unwrap();
        assert_eq!(record.state(), ProofState::Verified);
    }

    #[tokio::test]
    async fn test_invalid_proof_stays_presented() {
        let fx = fixture().await;
        let connection_id = connected(&fx).await;
        let proof_id = fx.service.request_proof(&connection_id, &request()).await.unwrap();

        let presentation = ProofPresentationMessage::new(
            &request(),
            &json!({"nonce": "wrong", "requested": {}}).to_string(),
        );
        fx.service
            .store_proof(&presentation, &connection_id)
            .await
            .unwrap();

        assert!(!fx.service.verify_proof(&proof_id).await.unwrap());
        let record = fx.service.get(&proof_id).await.unwrap();
        assert_eq!(record.state(), ProofState::Presented);

        // Still at Presented, so verification can be retried.
        assert!(!fx.service.verify_proof(&proof_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_before_presentation_is_rejected() {
        let fx = fixture().await;
        let connection_id = connected(&fx).await;
        let proof_id = fx.service.request_proof(&connection_id, &request()).await.unwrap();

        let err = fx.service.verify_proof(&proof_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }
}
