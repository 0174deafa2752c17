//! Schema and credential definition records.
//!
//! These track ledger-registered artifacts; they have no guarded lifecycle,
//! only identity and tags.

use crate::core::{new_record_id, now, Timestamp};
use crate::records::{RecordKind, TagMap, WalletRecord};
use serde::{Deserialize, Serialize};

/// A schema registered on the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaRecord {
    /// Record identifier.
    pub id: String,
    /// Ledger schema id.
    pub schema_id: String,
    /// Schema payload as registered.
    pub schema_json: Option<String>,
    /// Creation timestamp.
    pub created: Timestamp,
}

impl SchemaRecord {
    /// Create a new schema record.
    pub fn new(schema_id: &str) -> Self {
        Self {
            id: new_record_id(),
            schema_id: schema_id.to_string(),
            schema_json: None,
            created: now(),
        }
    }
}

impl WalletRecord for SchemaRecord {
    const KIND: RecordKind = RecordKind::Schema;

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert("schemaId".to_string(), self.schema_id.clone());
        tags
    }
}

/// A credential definition registered on the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefinitionRecord {
    /// Record identifier.
    pub id: String,
    /// Ledger credential definition id.
    pub definition_id: String,
    /// Schema the definition was created from.
    pub schema_id: String,
    /// Whether credentials issued under this definition can be revoked.
    pub revocable: bool,
    /// Revocation registry id, present when revocable.
    pub revocation_registry_id: Option<String>,
    /// Creation timestamp.
    pub created: Timestamp,
}

impl DefinitionRecord {
    /// Create a new definition record.
    pub fn new(definition_id: &str, schema_id: &str, revocable: bool) -> Self {
        Self {
            id: new_record_id(),
            definition_id: definition_id.to_string(),
            schema_id: schema_id.to_string(),
            revocable,
            revocation_registry_id: None,
            created: now(),
        }
    }
}

impl WalletRecord for DefinitionRecord {
    const KIND: RecordKind = RecordKind::Definition;

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> TagMap {
        let mut tags = TagMap::new();
        tags.insert("definitionId".to_string(), self.definition_id.clone());
        tags
    }
}
