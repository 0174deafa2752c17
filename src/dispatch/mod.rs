//! Handler registry and inbound message dispatcher.
//!
//! Handlers declare the message-type discriminators they support; the
//! dispatcher is built once at startup and stays constant for the process
//! lifetime. Inbound envelopes are unsealed, the `@type` field is read, and
//! the matching handler invoked - or dispatch fails with
//! `UnsupportedMessageType` without processing the message further.

use crate::core::{Error, Result};
use crate::envelope::{Envelope, EnvelopeService};
use crate::messages::message_type_of;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-message context passed to handlers.
#[derive(Clone, Debug, Default)]
pub struct AgentContext {
    /// Connection the message arrived over, when the transport knows it.
    pub connection_id: Option<String>,
    /// Authenticated sender key recovered on unseal; `None` for anonymous
    /// envelopes, whose claimed sender must not be trusted.
    pub sender_key: Option<String>,
    /// Recipient key the envelope was unsealed with.
    pub recipient_key: Option<String>,
}

/// A capability that handles protocol messages, one at a time.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Message-type discriminators this handler supports.
    fn supported_types(&self) -> &[&'static str];

    /// Process one decoded message body.
    async fn handle(&self, message: serde_json::Value, context: &AgentContext) -> Result<()>;
}

/// Builder collecting handlers before the registry is frozen.
pub struct DispatcherBuilder {
    envelope: EnvelopeService,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl DispatcherBuilder {
    /// Register a handler for every message type it supports.
    pub fn register(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        for msg_type in handler.supported_types() {
            self.handlers.insert((*msg_type).to_string(), handler.clone());
        }
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            envelope: self.envelope,
            handlers: self.handlers,
        }
    }
}

/// Routes inbound envelopes to registered handlers.
pub struct Dispatcher {
    envelope: EnvelopeService,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl Dispatcher {
    /// Start building a dispatcher over an envelope service.
    pub fn builder(envelope: EnvelopeService) -> DispatcherBuilder {
        DispatcherBuilder {
            envelope,
            handlers: HashMap::new(),
        }
    }

    /// Message types with a registered handler.
    pub fn registered_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Unseal an inbound envelope and route it to the matching handler.
    pub async fn dispatch(
        &self,
        envelope: &Envelope,
        recipient_key: &str,
        context: AgentContext,
    ) -> Result<()> {
        let (body, sender_key) = self
            .envelope
            .unseal::<serde_json::Value>(envelope, recipient_key)
            .await?;
        let msg_type = message_type_of(&body)?;

        let handler = self
            .handlers
            .get(msg_type)
            .ok_or_else(|| Error::UnsupportedMessageType(msg_type.to_string()))?;

        tracing::debug!(message_type = msg_type, "dispatching inbound message");

        let context = AgentContext {
            sender_key,
            recipient_key: Some(recipient_key.to_string()),
            ..context
        };
        handler.handle(body, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::DevCryptoProvider;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        types: Vec<&'static str>,
        calls: AtomicUsize,
        last_sender: tokio::sync::Mutex<Option<String>>,
    }

    impl CountingHandler {
        fn new(types: Vec<&'static str>) -> Self {
            Self {
                types,
                calls: AtomicUsize::new(0),
                last_sender: tokio::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        fn supported_types(&self) -> &[&'static str] {
            &self.types
        }

        async fn handle(&self, _message: serde_json::Value, context: &AgentContext) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_sender.lock().await = context.sender_key.clone();
            Ok(())
        }
    }

    fn envelope_service() -> EnvelopeService {
        EnvelopeService::new(Arc::new(DevCryptoProvider::new()))
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_matching_handler() {
        let service = envelope_service();
        let sender = service.crypto().create_key().await.unwrap();
        let recipient = service.crypto().create_key().await.unwrap();

        let handler = Arc::new(CountingHandler::new(vec!["test/1.0/ping"]));
        let dispatcher = Dispatcher::builder(service.clone())
            .register(handler.clone())
            .build();

        let sealed = service
            .seal(&json!({"@type": "test/1.0/ping"}), Some(&sender), &recipient)
            .await
            .unwrap();

        dispatcher
            .dispatch(&sealed, &recipient, AgentContext::default())
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            handler.last_sender.lock().await.as_deref(),
            Some(sender.as_str())
        );
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_without_invoking_handlers() {
        let service = envelope_service();
        let recipient = service.crypto().create_key().await.unwrap();

        let handler = Arc::new(CountingHandler::new(vec!["test/1.0/ping"]));
        let dispatcher = Dispatcher::builder(service.clone())
            .register(handler.clone())
            .build();

        let sealed = service
            .seal(&json!({"@type": "test/1.0/pong"}), None, &recipient)
            .await
            .unwrap();

        let err = dispatcher
            .dispatch(&sealed, &recipient, AgentContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMessageType(_)));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_discriminator_fails() {
        let service = envelope_service();
        let recipient = service.crypto().create_key().await.unwrap();
        let dispatcher = Dispatcher::builder(service.clone()).build();

        let sealed = service
            .seal(&json!({"body": 1}), None, &recipient)
            .await
            .unwrap();

        let err = dispatcher
            .dispatch(&sealed, &recipient, AgentContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingMessageType));
    }

    #[tokio::test]
    async fn test_one_handler_may_cover_multiple_types() {
        let service = envelope_service();
        let recipient = service.crypto().create_key().await.unwrap();

        let handler = Arc::new(CountingHandler::new(vec!["test/1.0/a", "test/1.0/b"]));
        let dispatcher = Dispatcher::builder(service.clone())
            .register(handler.clone())
            .build();

        for msg_type in ["test/1.0/a", "test/1.0/b"] {
            let sealed = service
                .seal(&json!({"@type": msg_type}), None, &recipient)
                .await
                .unwrap();
            dispatcher
                .dispatch(&sealed, &recipient, AgentContext::default())
                .await
                .unwrap();
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }
}
