//! Credential service: offer, request, issue, store and revoke.
//!
//! Issuer side: `create_offer`/`send_offer` -> `store_credential_request`
//! -> `issue_credential` -> optionally `revoke_credential`. Holder side:
//! `store_offer` -> `accept_offer` -> `store_credential`.

use crate::core::{Error, Result};
use crate::envelope::{Envelope, EnvelopeService};
use crate::fsm::{Stateful, TransitionTable};
use crate::messages::{CredentialIssueMessage, CredentialOfferMessage, CredentialRequestMessage};
use crate::protocol::{external_call, required_json_field, ConnectionService, ServiceConfig};
use crate::provider::{CredentialMathService, LedgerService, RouterService};
use crate::records::{
    ConnectionRecord, CredentialRecord, CredentialState, CredentialTrigger, DefinitionRecord,
    RecordKind,
};
use crate::store::{SearchQuery, Wallet};
use std::sync::Arc;
use tracing::info;

/// Orchestrates the credential issuance protocol for one agent.
pub struct CredentialService {
    wallet: Arc<Wallet>,
    envelope: EnvelopeService,
    connections: Arc<ConnectionService>,
    ledger: Arc<dyn LedgerService>,
    math: Arc<dyn CredentialMathService>,
    router: Arc<dyn RouterService>,
    config: ServiceConfig,
    table: TransitionTable<CredentialState, CredentialTrigger>,
}

impl CredentialService {
    /// Create a credential service.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet: Arc<Wallet>,
        envelope: EnvelopeService,
        connections: Arc<ConnectionService>,
        ledger: Arc<dyn LedgerService>,
        math: Arc<dyn CredentialMathService>,
        router: Arc<dyn RouterService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            wallet,
            envelope,
            connections,
            ledger,
            math,
            router,
            config,
            table: CredentialRecord::transitions(),
        }
    }

    fn guard(&self, record: &CredentialRecord, trigger: CredentialTrigger) -> Result<()> {
        if self.table.next(record.state(), trigger).is_none() {
            return Err(Error::InvalidTransition {
                state: record.state().to_string(),
                trigger: trigger.to_string(),
            });
        }
        Ok(())
    }

    async fn build_offer(
        &self,
        definition_id: &str,
        connection: &ConnectionRecord,
    ) -> Result<(CredentialRecord, CredentialOfferMessage)> {
        let offer_json = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math.issuer_create_offer(definition_id),
        )
        .await?;

        let mut record = CredentialRecord::new(&connection.id, definition_id, &offer_json);
        record.nonce = Some(required_json_field(&offer_json, "nonce")?);
        record.schema_id = Some(required_json_field(&offer_json, "schema_id")?);
        Ok((record, CredentialOfferMessage::new(&offer_json)))
    }

    /// Create a credential offer (issuer side).
    ///
    /// Adds a record at `Offered` and returns its id together with the
    /// sealed offer envelope; the caller decides how to deliver it.
    pub async fn create_offer(
        &self,
        definition_id: &str,
        connection_id: &str,
    ) -> Result<(String, Envelope)> {
        info!(definition_id, connection_id, "creating credential offer");
        let connection = self.connections.get(connection_id).await?;
        let (their_verkey, _endpoint) = ConnectionService::peer_route(&connection)?;

        let (record, offer) = self.build_offer(definition_id, &connection).await?;
        self.wallet.add(&record).await?;

        let sealed = self
            .envelope
            .seal(&offer, Some(&connection.my_verkey), &their_verkey)
            .await?;
        Ok((record.id, sealed))
    }

    /// Create and forward a credential offer (issuer side).
    pub async fn send_offer(&self, definition_id: &str, connection_id: &str) -> Result<String> {
        info!(definition_id, connection_id, "sending credential offer");
        let connection = self.connections.get(connection_id).await?;
        let (their_verkey, endpoint) = ConnectionService::peer_route(&connection)?;

        let (record, offer) = self.build_offer(definition_id, &connection).await?;
        let sealed = self
            .envelope
            .seal(&offer, Some(&connection.my_verkey), &their_verkey)
            .await?;
        external_call(
            self.config.external_timeout,
            "router",
            self.router.forward(sealed, &endpoint),
        )
        .await?;

        self.wallet.add(&record).await?;
        Ok(record.id)
    }

    /// Store a received credential offer (holder side).
    pub async fn store_offer(
        &self,
        offer: &CredentialOfferMessage,
        connection_id: &str,
    ) -> Result<String> {
        let definition_id = required_json_field(&offer.offer_json, "cred_def_id")?;
        let mut record = CredentialRecord::new(connection_id, &definition_id, &offer.offer_json);
        record.nonce = Some(required_json_field(&offer.offer_json, "nonce")?);
        // The schemaId tag drives store_credential's correlation; an offer
        // without it would persist a record that can never be matched.
        record.schema_id = Some(required_json_field(&offer.offer_json, "schema_id")?);

        self.wallet.add(&record).await?;
        info!(credential_id = %record.id, connection_id, "stored credential offer");
        Ok(record.id)
    }

    /// Accept a stored offer (holder side): create a credential request via
    /// the math provider, forward it, and advance to `Requested`.
    pub async fn accept_offer(&self, credential_id: &str, values_json: &str) -> Result<()> {
        let _guard = self
            .wallet
            .lock_record(RecordKind::Credential, credential_id)
            .await;
        let mut record: CredentialRecord = self.wallet.get(credential_id).await?;
        self.guard(&record, CredentialTrigger::Request)?;

        let connection = self.connections.get(&record.connection_id).await?;
        let (their_verkey, endpoint) = ConnectionService::peer_route(&connection)?;

        let definition_json = external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger
                .lookup_definition(&connection.my_did, &record.definition_id),
        )
        .await?;
        let request = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math
                .prover_create_request(&connection.my_did, &record.offer_json, &definition_json),
        )
        .await?;

        let message =
            CredentialRequestMessage::new(&record.offer_json, &request.request_json, values_json);
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

        record.request_json = Some(request.request_json);
        record.request_metadata_json = Some(request.metadata_json);
        record.values_json = Some(values_json.to_string());
        self.table.apply(&mut record, CredentialTrigger::Request)?;
        self.wallet.update(&record).await?;
        info!(credential_id, "accepted credential offer");
        Ok(())
    }

    /// Store a received credential request (issuer side).
    ///
    /// The request is correlated to the offer record by the nonce tag; a
    /// nonce matching more than one record fails with `AmbiguousMatch`.
    pub async fn store_credential_request(
        &self,
        request: &CredentialRequestMessage,
        connection_id: &str,
    ) -> Result<String> {
        info!(connection_id, "storing credential request");
        let nonce = required_json_field(&request.offer_json, "nonce")?;
        let found: CredentialRecord = self
            .wallet
            .search_single(&SearchQuery::new().eq("nonce", &nonce))
            .await?;

        let _guard = self
            .wallet
            .lock_record(RecordKind::Credential, &found.id)
            .await;
        let mut record: CredentialRecord = self.wallet.get(&found.id).await?;

        record.request_json = Some(request.request_json.clone());
        record.values_json = Some(request.values_json.clone());
        self.table.apply(&mut record, CredentialTrigger::Request)?;
        self.wallet.update(&record).await?;
        Ok(record.id)
    }

    /// Issue a credential against a stored request (issuer side).
    ///
    /// When the definition is revocable, the registry delta is published to
    /// the ledger before the record advances. The sealed credential is
    /// forwarded to the holder, then the record moves to `Issued`.
    pub async fn issue_credential(&self, credential_id: &str) -> Result<()> {
        let _guard = self
            .wallet
            .lock_record(RecordKind::Credential, credential_id)
            .await;
        let mut record: CredentialRecord = self.wallet.get(credential_id).await?;
        self.guard(&record, CredentialTrigger::Issue)?;

        let definition: DefinitionRecord = self
            .wallet
            .search_single(&SearchQuery::new().eq("definitionId", &record.definition_id))
            .await?;
        let connection = self.connections.get(&record.connection_id).await?;
        let (their_verkey, endpoint) = ConnectionService::peer_route(&connection)?;

        let request_json = record
            .request_json
            .clone()
            .ok_or_else(|| Error::Internal(format!("credential {credential_id} has no request")))?;
        let values_json = record
            .values_json
            .clone()
            .ok_or_else(|| Error::Internal(format!("credential {credential_id} has no values")))?;

        let registry_id = definition.revocation_registry_id.as_deref();
        let issued = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math.issuer_create_credential(
                &record.offer_json,
                &request_json,
                &values_json,
                registry_id,
            ),
        )
        .await?;

        if let (Some(registry_id), Some(delta)) = (registry_id, &issued.registry_delta_json) {
            external_call(
                self.config.external_timeout,
                "ledger",
                self.ledger.send_revocation_registry_entry(
                    &connection.my_did,
                    registry_id,
                    delta,
                ),
            )
            .await?;
        }

        let message = CredentialIssueMessage::new(&issued.credential_json, registry_id);
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

        record.revocation_id = issued.revocation_id;
        self.table.apply(&mut record, CredentialTrigger::Issue)?;
        self.wallet.update(&record).await?;
        info!(credential_id, "issued credential");
        Ok(())
    }

    /// Store a received credential (holder side).
    ///
    /// Correlates to the local record by schemaId/definitionId/connectionId
    /// tags; more than one match fails with `AmbiguousMatch`.
    pub async fn store_credential(
        &self,
        credential: &CredentialIssueMessage,
        connection_id: &str,
    ) -> Result<String> {
        let definition_id = required_json_field(&credential.credential_json, "cred_def_id")?;
        let schema_id = required_json_field(&credential.credential_json, "schema_id")?;

        let found: CredentialRecord = self
            .wallet
            .search_single(
                &SearchQuery::new()
                    .eq("schemaId", &schema_id)
                    .eq("definitionId", &definition_id)
                    .eq("connectionId", connection_id),
            )
            .await?;

        let _guard = self
            .wallet
            .lock_record(RecordKind::Credential, &found.id)
            .await;
        let mut record: CredentialRecord = self.wallet.get(&found.id).await?;
        self.guard(&record, CredentialTrigger::Issue)?;

        let connection = self.connections.get(connection_id).await?;
        let metadata = record.request_metadata_json.clone().ok_or_else(|| {
            Error::Internal(format!("credential {} has no request metadata", record.id))
        })?;

        let definition_json = external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger
                .lookup_definition(&connection.my_did, &definition_id),
        )
        .await?;

        let registry_definition_json = match &credential.revocation_registry_id {
            Some(registry_id) => Some(
                external_call(
                    self.config.external_timeout,
                    "ledger",
                    self.ledger
                        .lookup_revocation_registry(&connection.my_did, registry_id),
                )
                .await?,
            ),
            None => None,
        };

        let stored_id = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math.prover_store_credential(
                &metadata,
                &credential.credential_json,
                &definition_json,
                registry_definition_json.as_deref(),
            ),
        )
        .await?;

        record.credential_id = Some(stored_id);
        self.table.apply(&mut record, CredentialTrigger::Issue)?;
        self.wallet.update(&record).await?;
        info!(credential_id = %record.id, "stored issued credential");
        Ok(record.id)
    }

    /// Revoke an issued credential (issuer side).
    pub async fn revoke_credential(&self, credential_id: &str) -> Result<()> {
        let _guard = self
            .wallet
            .lock_record(RecordKind::Credential, credential_id)
            .await;
        let mut record: CredentialRecord = self.wallet.get(credential_id).await?;
        self.guard(&record, CredentialTrigger::Revoke)?;

        let definition: DefinitionRecord = self
            .wallet
            .search_single(&SearchQuery::new().eq("definitionId", &record.definition_id))
            .await?;
        let registry_id = definition.revocation_registry_id.clone().ok_or_else(|| {
            Error::Internal(format!(
                "definition {} does not support revocation",
                definition.definition_id
            ))
        })?;
        let revocation_id = record.revocation_id.clone().ok_or_else(|| {
            Error::Internal(format!("credential {credential_id} has no revocation id"))
        })?;
        let connection = self.connections.get(&record.connection_id).await?;

        let delta = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math.issuer_revoke_credential(&registry_id, &revocation_id),
        )
        .await?;
        external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger
                .send_revocation_registry_entry(&connection.my_did, &registry_id, &delta),
        )
        .await?;

        self.table.apply(&mut record, CredentialTrigger::Revoke)?;
        self.wallet.update(&record).await?;
        info!(credential_id, "revoked credential");
        Ok(())
    }

    /// Get a credential record by id.
    pub async fn get(&self, credential_id: &str) -> Result<CredentialRecord> {
        self.wallet.get(credential_id).await
    }

    /// List credential records matching a tag query.
    pub async fn list(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CredentialRecord>> {
        self.wallet.search(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::DevCryptoProvider;
    use crate::messages::CredentialOfferMessage;
    use crate::provider::stub::{ChannelRouter, StubCredentialMath, StubLedger};
    use crate::records::ConnectionTrigger;
    use crate::store::WalletConfig;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const ISSUER_DID: &str = "did:pactum:issuer";

    struct Fixture {
        wallet: Arc<Wallet>,
        envelope: EnvelopeService,
        ledger: Arc<StubLedger>,
        math: Arc<StubCredentialMath>,
        connections: Arc<ConnectionService>,
        service: CredentialService,
        outbound: mpsc::UnboundedReceiver<(Envelope, String)>,
    }

    async fn fixture() -> Fixture {
        fixture_sharing(Arc::new(StubLedger::new()), Arc::new(StubCredentialMath::new())).await
    }

    async fn fixture_sharing(
        ledger: Arc<StubLedger>,
        math: Arc<StubCredentialMath>,
    ) -> Fixture {
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
        let service = CredentialService::new(
            wallet.clone(),
            envelope.clone(),
            connections.clone(),
            ledger.clone(),
            math.clone(),
            router,
            ServiceConfig::default(),
        );
        Fixture {
            wallet,
            envelope,
            ledger,
            math,
            connections,
            service,
            outbound,
        }
    }

    /// Put a fully connected record straight into the wallet.
    async fn connected(fx: &Fixture) -> (String, String) {
        let my_verkey = fx.envelope.crypto().create_key().await.unwrap();
        let peer_verkey = fx.envelope.crypto().create_key().await.unwrap();
        let mut record = ConnectionRecord::new(ISSUER_DID, &my_verkey);
        record.their_did = Some("did:pactum:peer".to_string());
        record.their_verkey = Some(peer_verkey.clone());
        record.endpoint = Some("http://peer".to_string());
        let table = ConnectionRecord::transitions();
        table
            .apply(&mut record, ConnectionTrigger::InvitationAccept)
            .unwrap();
        table.apply(&mut record, ConnectionTrigger::Response).unwrap();
        fx.wallet.add(&record).await.unwrap();
        (record.id, peer_verkey)
    }

    async fn register_definition(fx: &Fixture, revocable: bool) -> DefinitionRecord {
        let schema = fx
            .math
            .issuer_create_schema(ISSUER_DID, "degree", "1.0", &["name".to_string()])
            .await
            .unwrap();
        fx.ledger
            .register_schema(ISSUER_DID, &schema.schema_json)
            .await
            .unwrap();
        let definition = fx
            .math
            .issuer_create_definition(ISSUER_DID, &schema.schema_json, revocable)
            .await
            .unwrap();
        fx.ledger
            .register_definition(ISSUER_DID, &definition.definition_json)
            .await
            .unwrap();

        let mut record = DefinitionRecord::new(&definition.definition_id, &schema.schema_id, revocable);
        if revocable {
            let registry = fx
                .math
                .issuer_create_revocation_registry(ISSUER_DID, &definition.definition_id)
                .await
                .unwrap();
            fx.ledger
                .register_revocation_registry(ISSUER_DID, &registry.registry_json)
                .await
                .unwrap();
            record.revocation_registry_id = Some(registry.registry_id);
        }
        fx.wallet.add(&record).await.unwrap();
        record
    }

    /// Drive an issuer-side record to `Requested` via a peer request.
    async fn requested(fx: &mut Fixture, definition_id: &str, connection_id: &str) -> String {
        let credential_id = fx
            .service
            .send_offer(definition_id, connection_id)
            .await
            .unwrap();
        fx.outbound.recv().await.unwrap();

        let record = fx.service.get(&credential_id).await.unwrap();
        let request = CredentialRequestMessage::new(
            &record.offer_json,
            r#"{"blinded":"ms"}"#,
            r#"{"name":"alice"}"#,
        );
        fx.service
            .store_credential_request(&request, connection_id)
            .await
            .unwrap();
        credential_id
    }

    #[tokio::test]
    async fn test_send_offer_forwards_and_persists_offered() {
        let mut fx = fixture().await;
        let (connection_id, peer_verkey) = connected(&fx).await;
        let definition = register_definition(&fx, false).await;

        let credential_id = fx
            .service
            .send_offer(&definition.definition_id, &connection_id)
            .await
            .unwrap();

        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Offered);
        assert!(record.nonce.is_some());
        assert_eq!(record.schema_id.as_deref(), Some(definition.schema_id.as_str()));

        let (sealed, endpoint) = fx.outbound.recv().await.unwrap();
        assert_eq!(endpoint, "http://peer");
        assert_eq!(sealed.recipient_key, peer_verkey);
    }

    #[tokio::test]
    async fn test_store_credential_request_correlates_by_nonce() {
        let mut fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;
        let definition = register_definition(&fx, false).await;

        let credential_id = requested(&mut fx, &definition.definition_id, &connection_id).await;

        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Requested);
        assert_eq!(record.request_json.as_deref(), Some(r#"{"blinded":"ms"}"#));
        assert_eq!(record.values_json.as_deref(), Some(r#"{"name":"alice"}"#));
    }

    #[tokio::test]
    async fn test_issue_from_offered_fails_before_io() {
        let mut fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;
        let definition = register_definition(&fx, false).await;

        let credential_id = fx
            .service
            .send_offer(&definition.definition_id, &connection_id)
            .await
            .unwrap();
        fx.outbound.recv().await.unwrap();

        let err = fx.service.issue_credential(&credential_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        // The guard fired first; nothing was forwarded.
        assert!(fx.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_issue_credential_delivers_and_advances() {
        let mut fx = fixture().await;
        let (connection_id, peer_verkey) = connected(&fx).await;
        let definition = register_definition(&fx, false).await;
        let credential_id = requested(&mut fx, &definition.definition_id, &connection_id).await;

        fx.service.issue_credential(&credential_id).await.unwrap();

        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Issued);
        assert!(record.revocation_id.is_none());
        assert!(fx.ledger.registry_entries().await.is_empty());

        let (sealed, endpoint) = fx.outbound.recv().await.unwrap();
        assert_eq!(endpoint, "http://peer");
        assert_eq!(sealed.recipient_key, peer_verkey);
    }

    #[tokio::test]
    async fn test_revocable_issue_and_revoke_publish_registry_entries() {
        let mut fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;
        let definition = register_definition(&fx, true).await;
        let credential_id = requested(&mut fx, &definition.definition_id, &connection_id).await;

        fx.service.issue_credential(&credential_id).await.unwrap();
        let record = fx.service.get(&credential_id).await.unwrap();
        assert!(record.revocation_id.is_some());
        assert_eq!(fx.ledger.registry_entries().await.len(), 1);

        fx.service.revoke_credential(&credential_id).await.unwrap();
        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Revoked);
        assert_eq!(fx.ledger.registry_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_revoke_before_issue_is_rejected() {
        let mut fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;
        let definition = register_definition(&fx, true).await;
        let credential_id = requested(&mut fx, &definition.definition_id, &connection_id).await;

        let err = fx.service.revoke_credential(&credential_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert!(fx.ledger.registry_entries().await.is_empty());
    }

    struct StalledRouter;

    #[async_trait::async_trait]
    impl crate::provider::RouterService for StalledRouter {
        async fn forward(&self, _envelope: Envelope, _endpoint: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_issue_timeout_leaves_record_retryable() {
        let mut fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;
        let definition = register_definition(&fx, false).await;
        let credential_id = requested(&mut fx, &definition.definition_id, &connection_id).await;

        // Same wallet, but every forward stalls past the timeout.
        let stalled = CredentialService::new(
            fx.wallet.clone(),
            fx.envelope.clone(),
            fx.connections.clone(),
            fx.ledger.clone(),
            fx.math.clone(),
            Arc::new(StalledRouter),
            ServiceConfig::with_timeout(Duration::from_millis(20)),
        );

        let err = stalled.issue_credential(&credential_id).await.unwrap_err();
        assert!(matches!(err, Error::ExternalServiceFailure { .. }));

        // Nothing was persisted, so the step can simply be retried.
        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Requested);

        fx.service.issue_credential(&credential_id).await.unwrap();
        let record = fx.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Issued);
    }

    #[tokio::test]
    async fn test_store_offer_without_schema_id_fails_fast() {
        let fx = fixture().await;
        let (connection_id, _peer) = connected(&fx).await;

        // An offer missing schema_id must be rejected up front; accepting it
        // would persist a record store_credential can never correlate.
        let offer = CredentialOfferMessage::new(r#"{"nonce":"n-1","cred_def_id":"def-1"}"#);
        let err = fx
            .service
            .store_offer(&offer, &connection_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeserializationFailure(_)));

        let records = fx
            .service
            .list(&SearchQuery::new().eq("connectionId", &connection_id), 10)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_holder_store_accept_and_store_credential() {
        let ledger = Arc::new(StubLedger::new());
        let math = Arc::new(StubCredentialMath::new());
        let issuer = fixture_sharing(ledger.clone(), math.clone()).await;
        let definition = register_definition(&issuer, false).await;

        let mut holder = fixture_sharing(ledger, math.clone()).await;
        let (connection_id, _peer) = connected(&holder).await;

        let offer_json = math
            .issuer_create_offer(&definition.definition_id)
            .await
            .unwrap();
        let offer = CredentialOfferMessage::new(&offer_json);
        let credential_id = holder
            .service
            .store_offer(&offer, &connection_id)
            .await
            .unwrap();

        let record = holder.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Offered);
        assert_eq!(record.definition_id, definition.definition_id);

        holder
            .service
            .accept_offer(&credential_id, r#"{"name":"alice"}"#)
            .await
            .unwrap();
        let record = holder.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Requested);
        assert!(record.request_metadata_json.is_some());

        let (sealed, endpoint) = holder.outbound.recv().await.unwrap();
        assert_eq!(endpoint, "http://peer");
        assert!(!sealed.ciphertext.is_empty());

        let issued = math
            .issuer_create_credential(
                &record.offer_json,
                record.request_json.as_deref().unwrap(),
                r#"{"name":"alice"}"#,
                None,
            )
            .await
            .unwrap();
        let message = CredentialIssueMessage::new(&issued.credential_json, None);
        let stored_id = holder
            .service
            .store_credential(&message, &connection_id)
            .await
            .unwrap();
        assert_eq!(stored_id, credential_id);

        let record = holder.service.get(&credential_id).await.unwrap();
        assert_eq!(record.state(), CredentialState::Issued);
        assert!(record.credential_id.is_some());
    }
}
