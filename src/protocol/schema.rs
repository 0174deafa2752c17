//! Schema and credential definition service (issuer side).

use crate::core::Result;
use crate::protocol::{external_call, ServiceConfig};
use crate::provider::{CredentialMathService, LedgerService};
use crate::records::{DefinitionRecord, SchemaRecord};
use crate::store::{SearchQuery, Wallet};
use std::sync::Arc;
use tracing::info;

/// Creates and tracks ledger-registered schemas and definitions.
pub struct SchemaService {
    wallet: Arc<Wallet>,
    ledger: Arc<dyn LedgerService>,
    math: Arc<dyn CredentialMathService>,
    config: ServiceConfig,
}

impl SchemaService {
    /// Create a schema service.
    pub fn new(
        wallet: Arc<Wallet>,
        ledger: Arc<dyn LedgerService>,
        math: Arc<dyn CredentialMathService>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            wallet,
            ledger,
            math,
            config,
        }
    }

    /// Create a schema, register it on the ledger and record it locally.
    /// Returns the ledger schema id.
    pub async fn create_schema(
        &self,
        issuer_did: &str,
        name: &str,
        version: &str,
        attributes: &[String],
    ) -> Result<String> {
        let created = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math
                .issuer_create_schema(issuer_did, name, version, attributes),
        )
        .await?;
        external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger.register_schema(issuer_did, &created.schema_json),
        )
        .await?;

        let mut record = SchemaRecord::new(&created.schema_id);
        record.schema_json = Some(created.schema_json);
        self.wallet.add(&record).await?;
        info!(schema_id = %created.schema_id, "registered schema");
        Ok(created.schema_id)
    }

    /// Create a credential definition for a registered schema; when
    /// `revocable`, also provision its revocation registry. Returns the
    /// ledger definition id.
    pub async fn create_credential_definition(
        &self,
        issuer_did: &str,
        schema_id: &str,
        revocable: bool,
    ) -> Result<String> {
        let schema_json = external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger.lookup_schema(issuer_did, schema_id),
        )
        .await?;
        let definition = external_call(
            self.config.external_timeout,
            "credential-math",
            self.math
                .issuer_create_definition(issuer_did, &schema_json, revocable),
        )
        .await?;
        external_call(
            self.config.external_timeout,
            "ledger",
            self.ledger
                .register_definition(issuer_did, &definition.definition_json),
        )
        .await?;

        let mut record = DefinitionRecord::new(&definition.definition_id, schema_id, revocable);
        if revocable {
            let registry = external_call(
                self.config.external_timeout,
                "credential-math",
                self.math
                    .issuer_create_revocation_registry(issuer_did, &definition.definition_id),
            )
            .await?;
            external_call(
                self.config.external_timeout,
                "ledger",
                self.ledger
                    .register_revocation_registry(issuer_did, &registry.registry_json),
            )
            .await?;
            record.revocation_registry_id = Some(registry.registry_id);
        }

        self.wallet.add(&record).await?;
        info!(definition_id = %definition.definition_id, revocable, "registered credential definition");
        Ok(definition.definition_id)
    }

    /// List locally recorded schemas.
    pub async fn list_schemas(&self, limit: usize) -> Result<Vec<SchemaRecord>> {
        self.wallet.search(&SearchQuery::new(), limit).await
    }

    /// List locally recorded credential definitions.
    pub async fn list_definitions(&self, limit: usize) -> Result<Vec<DefinitionRecord>> {
        self.wallet.search(&SearchQuery::new(), limit).await
    }

    /// Look up the local record of a credential definition.
    pub async fn get_definition(&self, definition_id: &str) -> Result<DefinitionRecord> {
        self.wallet
            .search_single(&SearchQuery::new().eq("definitionId", definition_id))
            .await
    }
}
