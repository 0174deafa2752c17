//! In-memory collaborator stubs for tests and local development.

use crate::core::{Error, Result};
use crate::envelope::Envelope;
use crate::provider::{
    CreatedCredentialRequest, CreatedDefinition, CreatedRevocationRegistry, CreatedSchema,
    CredentialMathService, IssuedCredential, LedgerService, RouterService,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory ledger: registered payloads keyed by id.
#[derive(Default)]
pub struct StubLedger {
    schemas: RwLock<HashMap<String, String>>,
    definitions: RwLock<HashMap<String, String>>,
    registries: RwLock<HashMap<String, String>>,
    entries: RwLock<Vec<(String, String)>>,
}

impl StubLedger {
    /// Create an empty stub ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Revocation registry entries published so far, as (registry id, delta).
    pub async fn registry_entries(&self) -> Vec<(String, String)> {
        self.entries.read().await.clone()
    }
}

fn id_of(payload: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    value
        .get("id")
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::external("ledger", "payload missing id field"))
}

#[async_trait]
impl LedgerService for StubLedger {
    async fn register_schema(&self, _issuer_did: &str, schema_json: &str) -> Result<()> {
        let id = id_of(schema_json)?;
        self.schemas
            .write()
            .await
            .insert(id, schema_json.to_string());
        Ok(())
    }

    async fn lookup_schema(&self, _submitter_did: &str, schema_id: &str) -> Result<String> {
        self.schemas
            .read()
            .await
            .get(schema_id)
            .cloned()
            .ok_or_else(|| Error::external("ledger", format!("schema {schema_id} not registered")))
    }

    async fn register_definition(&self, _issuer_did: &str, definition_json: &str) -> Result<()> {
        let id = id_of(definition_json)?;
        self.definitions
            .write()
            .await
            .insert(id, definition_json.to_string());
        Ok(())
    }

    async fn lookup_definition(&self, _submitter_did: &str, definition_id: &str) -> Result<String> {
        self.definitions
            .read()
            .await
            .get(definition_id)
            .cloned()
            .ok_or_else(|| {
                Error::external("ledger", format!("definition {definition_id} not registered"))
            })
    }

    async fn register_revocation_registry(
        &self,
        _issuer_did: &str,
        registry_json: &str,
    ) -> Result<()> {
        let id = id_of(registry_json)?;
        self.registries
            .write()
            .await
            .insert(id, registry_json.to_string());
        Ok(())
    }

    async fn send_revocation_registry_entry(
        &self,
        _issuer_did: &str,
        registry_id: &str,
        entry_json: &str,
    ) -> Result<()> {
        self.entries
            .write()
            .await
            .push((registry_id.to_string(), entry_json.to_string()));
        Ok(())
    }

    async fn lookup_revocation_registry(
        &self,
        _submitter_did: &str,
        registry_id: &str,
    ) -> Result<String> {
        self.registries
            .read()
            .await
            .get(registry_id)
            .cloned()
            .ok_or_else(|| {
                Error::external("ledger", format!("registry {registry_id} not registered"))
            })
    }
}

/// Deterministic-enough math provider stub: opaque JSON in, opaque JSON out.
#[derive(Default)]
pub struct StubCredentialMath {
    definition_schemas: RwLock<HashMap<String, String>>,
}

impl StubCredentialMath {
    /// Create a stub math provider.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialMathService for StubCredentialMath {
    async fn issuer_create_schema(
        &self,
        issuer_did: &str,
        name: &str,
        version: &str,
        attributes: &[String],
    ) -> Result<CreatedSchema> {
        let schema_id = format!("{issuer_did}:2:{name}:{version}");
        let schema_json = json!({
            "id": schema_id,
            "name": name,
            "version": version,
            "attrNames": attributes,
        })
        .to_string();
        Ok(CreatedSchema {
            schema_id,
            schema_json,
        })
    }

    async fn issuer_create_definition(
        &self,
        issuer_did: &str,
        schema_json: &str,
        revocable: bool,
    ) -> Result<CreatedDefinition> {
        let schema: serde_json::Value = serde_json::from_str(schema_json)?;
        let schema_id = schema
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or("unknown")
            .to_string();
        let definition_id = format!("{issuer_did}:3:CL:{}", Uuid::new_v4());
        self.definition_schemas
            .write()
            .await
            .insert(definition_id.clone(), schema_id.clone());
        let definition_json = json!({
            "id": definition_id,
            "schemaId": schema_id,
            "revocable": revocable,
        })
        .to_string();
        Ok(CreatedDefinition {
            definition_id,
            definition_json,
        })
    }

    async fn issuer_create_revocation_registry(
        &self,
        issuer_did: &str,
        definition_id: &str,
    ) -> Result<CreatedRevocationRegistry> {
        let registry_id = format!("{issuer_did}:4:{definition_id}:CL_ACCUM");
        let registry_json = json!({
            "id": registry_id,
            "credDefId": definition_id,
        })
        .to_string();
        Ok(CreatedRevocationRegistry {
            registry_id,
            registry_json,
        })
    }

    async fn issuer_create_offer(&self, definition_id: &str) -> Result<String> {
        let schema_id = self
            .definition_schemas
            .read()
            .await
            .get(definition_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        Ok(json!({
            "nonce": Uuid::new_v4().to_string(),
            "cred_def_id": definition_id,
            "schema_id": schema_id,
        })
        .to_string())
    }

    async fn issuer_create_credential(
        &self,
        offer_json: &str,
        request_json: &str,
        values_json: &str,
        registry_id: Option<&str>,
    ) -> Result<IssuedCredential> {
        let offer: serde_json::Value = serde_json::from_str(offer_json)?;
        let _request: serde_json::Value = serde_json::from_str(request_json)?;
        let values: serde_json::Value = serde_json::from_str(values_json)?;
        let credential_json = json!({
            "cred_def_id": offer.get("cred_def_id"),
            "schema_id": offer.get("schema_id"),
            "rev_reg_id": registry_id,
            "values": values,
        })
        .to_string();
        Ok(IssuedCredential {
            credential_json,
            revocation_id: registry_id.map(|_| Uuid::new_v4().to_string()),
            registry_delta_json: registry_id.map(|_| json!({"issued": 1}).to_string()),
        })
    }

    async fn issuer_revoke_credential(
        &self,
        _registry_id: &str,
        revocation_id: &str,
    ) -> Result<String> {
        Ok(json!({"revoked": revocation_id}).to_string())
    }

    async fn prover_create_request(
        &self,
        prover_did: &str,
        offer_json: &str,
        _definition_json: &str,
    ) -> Result<CreatedCredentialRequest> {
        let offer: serde_json::Value = serde_json::from_str(offer_json)?;
        Ok(CreatedCredentialRequest {
            request_json: json!({
                "prover_did": prover_did,
                "nonce": offer.get("nonce"),
                "cred_def_id": offer.get("cred_def_id"),
            })
            .to_string(),
            metadata_json: json!({"master_secret_blinding": Uuid::new_v4().to_string()})
                .to_string(),
        })
    }

    async fn prover_store_credential(
        &self,
        _metadata_json: &str,
        _credential_json: &str,
        _definition_json: &str,
        _registry_definition_json: Option<&str>,
    ) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn prover_create_proof(
        &self,
        request_json: &str,
        requested_credentials_json: &str,
    ) -> Result<String> {
        let request: serde_json::Value = serde_json::from_str(request_json)?;
        let requested: serde_json::Value = serde_json::from_str(requested_credentials_json)?;
        Ok(json!({
            "nonce": request.get("nonce"),
            "requested": requested,
        })
        .to_string())
    }

    async fn verifier_verify_proof(&self, request_json: &str, proof_json: &str) -> Result<bool> {
        let request: serde_json::Value = serde_json::from_str(request_json)?;
        let proof: serde_json::Value = serde_json::from_str(proof_json)?;
        Ok(request.get("nonce") == proof.get("nonce"))
    }
}

/// Router that captures forwarded envelopes on a channel.
///
/// Lets a test (or an in-process loopback transport) observe every outbound
/// envelope together with its destination endpoint.
pub struct ChannelRouter {
    sender: mpsc::UnboundedSender<(Envelope, String)>,
}

impl ChannelRouter {
    /// Create a router and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Envelope, String)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl RouterService for ChannelRouter {
    async fn forward(&self, envelope: Envelope, endpoint: &str) -> Result<()> {
        self.sender
            .send((envelope, endpoint.to_string()))
            .map_err(|_| Error::external("router", "outbound channel closed"))
    }
}
