//! Protocol services.
//!
//! Thin orchestrators composing the record store, the state machine engine,
//! the envelope protocol and the external collaborators. Each protocol step
//! loads or creates a record, calls collaborators as needed, applies a
//! trigger and persists - with all slow external calls completed before the
//! apply+persist unit, so a timed-out call leaves the record in its
//! pre-operation persisted state and the step can be retried.

pub mod connection;
pub mod credential;
pub mod handlers;
pub mod proof;
pub mod schema;

pub use connection::ConnectionService;
pub use credential::CredentialService;
pub use handlers::{ConnectionHandler, CredentialHandler, ProofHandler};
pub use proof::ProofService;
pub use schema::SchemaService;

use crate::core::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Per-service configuration.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    /// Timeout applied to every ledger, math provider and router call.
    /// `None` waits indefinitely.
    pub external_timeout: Option<Duration>,
}

impl ServiceConfig {
    /// Configuration with an external-call timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            external_timeout: Some(timeout),
        }
    }
}

/// Run an external collaborator call under the configured timeout.
pub(crate) async fn external_call<T>(
    timeout: Option<Duration>,
    service: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::external(service, "call timed out")),
        },
        None => call.await,
    }
}

/// Read a string field out of an opaque JSON payload.
pub(crate) fn json_field(payload: &str, field: &str) -> Result<Option<String>> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|err| Error::DeserializationFailure(err.to_string()))?;
    Ok(value
        .get(field)
        .and_then(|field| field.as_str())
        .map(str::to_string))
}

/// Like [`json_field`] but the field is required.
pub(crate) fn required_json_field(payload: &str, field: &str) -> Result<String> {
    json_field(payload, field)?.ok_or_else(|| {
        Error::DeserializationFailure(format!("payload missing required field {field}"))
    })
}
