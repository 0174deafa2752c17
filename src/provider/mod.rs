//! External collaborator interfaces.
//!
//! The ledger, the credential math provider, and the outbound router are
//! opaque collaborators: the core calls them through these traits and wraps
//! any failure in `ExternalServiceFailure` without retrying. All payloads
//! they exchange are opaque JSON strings.

pub mod stub;

pub use stub::{ChannelRouter, StubCredentialMath, StubLedger};

use crate::core::Result;
use crate::envelope::Envelope;
use async_trait::async_trait;

/// Distributed registry for schemas, definitions, and revocation state.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Register a schema on the ledger.
    async fn register_schema(&self, issuer_did: &str, schema_json: &str) -> Result<()>;

    /// Look up a registered schema by id, returning its payload.
    async fn lookup_schema(&self, submitter_did: &str, schema_id: &str) -> Result<String>;

    /// Register a credential definition on the ledger.
    async fn register_definition(&self, issuer_did: &str, definition_json: &str) -> Result<()>;

    /// Look up a registered credential definition by id.
    async fn lookup_definition(&self, submitter_did: &str, definition_id: &str) -> Result<String>;

    /// Register a revocation registry definition.
    async fn register_revocation_registry(
        &self,
        issuer_did: &str,
        registry_json: &str,
    ) -> Result<()>;

    /// Publish a revocation registry delta entry.
    async fn send_revocation_registry_entry(
        &self,
        issuer_did: &str,
        registry_id: &str,
        entry_json: &str,
    ) -> Result<()>;

    /// Look up a revocation registry definition by id.
    async fn lookup_revocation_registry(
        &self,
        submitter_did: &str,
        registry_id: &str,
    ) -> Result<String>;
}

/// A schema produced by the credential math provider.
#[derive(Clone, Debug)]
pub struct CreatedSchema {
    /// Ledger schema id.
    pub schema_id: String,
    /// Schema payload to register.
    pub schema_json: String,
}

/// A credential definition produced by the credential math provider.
#[derive(Clone, Debug)]
pub struct CreatedDefinition {
    /// Ledger credential definition id.
    pub definition_id: String,
    /// Definition payload to register.
    pub definition_json: String,
}

/// A revocation registry produced by the credential math provider.
#[derive(Clone, Debug)]
pub struct CreatedRevocationRegistry {
    /// Revocation registry id.
    pub registry_id: String,
    /// Registry definition payload to register.
    pub registry_json: String,
}

/// A holder-side credential request.
#[derive(Clone, Debug)]
pub struct CreatedCredentialRequest {
    /// Request payload to send to the issuer.
    pub request_json: String,
    /// Metadata the holder needs later to store the credential.
    pub metadata_json: String,
}

/// An issued credential.
#[derive(Clone, Debug)]
pub struct IssuedCredential {
    /// Credential payload to deliver to the holder.
    pub credential_json: String,
    /// Issuer-side revocation id, when issued under a registry.
    pub revocation_id: Option<String>,
    /// Registry delta to publish, when issued under a registry.
    pub registry_delta_json: Option<String>,
}

/// Anonymous-credential cryptographic operations (opaque math provider).
#[async_trait]
pub trait CredentialMathService: Send + Sync {
    /// Create a schema payload.
    async fn issuer_create_schema(
        &self,
        issuer_did: &str,
        name: &str,
        version: &str,
        attributes: &[String],
    ) -> Result<CreatedSchema>;

    /// Create a credential definition from a schema.
    async fn issuer_create_definition(
        &self,
        issuer_did: &str,
        schema_json: &str,
        revocable: bool,
    ) -> Result<CreatedDefinition>;

    /// Create a revocation registry for a definition.
    async fn issuer_create_revocation_registry(
        &self,
        issuer_did: &str,
        definition_id: &str,
    ) -> Result<CreatedRevocationRegistry>;

    /// Create a credential offer for a definition. The returned payload
    /// carries `nonce`, `cred_def_id` and `schema_id` fields.
    async fn issuer_create_offer(&self, definition_id: &str) -> Result<String>;

    /// Issue a credential against an offer and request.
    async fn issuer_create_credential(
        &self,
        offer_json: &str,
        request_json: &str,
        values_json: &str,
        registry_id: Option<&str>,
    ) -> Result<IssuedCredential>;

    /// Revoke an issued credential, returning the registry delta.
    async fn issuer_revoke_credential(
        &self,
        registry_id: &str,
        revocation_id: &str,
    ) -> Result<String>;

    /// Create a credential request answering an offer.
    async fn prover_create_request(
        &self,
        prover_did: &str,
        offer_json: &str,
        definition_json: &str,
    ) -> Result<CreatedCredentialRequest>;

    /// Store an issued credential, returning the wallet credential id.
    async fn prover_store_credential(
        &self,
        metadata_json: &str,
        credential_json: &str,
        definition_json: &str,
        registry_definition_json: Option<&str>,
    ) -> Result<String>;

    /// Create a proof presentation answering a proof request.
    async fn prover_create_proof(
        &self,
        request_json: &str,
        requested_credentials_json: &str,
    ) -> Result<String>;

    /// Verify a proof presentation against its request.
    async fn verifier_verify_proof(&self, request_json: &str, proof_json: &str) -> Result<bool>;
}

/// Outbound delivery of sealed envelopes; transport is out of scope.
#[async_trait]
pub trait RouterService: Send + Sync {
    /// Forward a sealed envelope to a peer endpoint.
    async fn forward(&self, envelope: Envelope, endpoint: &str) -> Result<()>;
}
