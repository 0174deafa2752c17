//! Wallet record types and their lifecycle tables.
//!
//! Each protocol instance is tracked as a durable record: an id, a guarded
//! lifecycle state, protocol payload fields, and a tag projection used for
//! search. Tags are denormalized from the record body on every persist.

pub mod connection;
pub mod credential;
pub mod proof;
pub mod schema;

pub use connection::{ConnectionRecord, ConnectionState, ConnectionTrigger};
pub use credential::{CredentialRecord, CredentialState, CredentialTrigger};
pub use proof::{ProofRecord, ProofState, ProofTrigger};
pub use schema::{DefinitionRecord, SchemaRecord};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Searchable key/value attributes projected from a record body.
pub type TagMap = BTreeMap<String, String>;

/// Record kind discriminator; one store namespace per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Connection,
    Credential,
    Proof,
    Schema,
    Definition,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Connection => write!(f, "connection"),
            RecordKind::Credential => write!(f, "credential"),
            RecordKind::Proof => write!(f, "proof"),
            RecordKind::Schema => write!(f, "schema"),
            RecordKind::Definition => write!(f, "definition"),
        }
    }
}

/// A record that can be persisted in the wallet store.
///
/// The tag projection returned by [`WalletRecord::tags`] is recomputed and
/// written atomically with the body on every add/update.
pub trait WalletRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Store namespace this record lives in.
    const KIND: RecordKind;

    /// Unique record identifier.
    fn id(&self) -> &str;

    /// Searchable tag projection of this record.
    fn tags(&self) -> TagMap {
        TagMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_display() {
        assert_eq!(RecordKind::Connection.to_string(), "connection");
        assert_eq!(RecordKind::Credential.to_string(), "credential");
        assert_eq!(RecordKind::Definition.to_string(), "definition");
    }
}
