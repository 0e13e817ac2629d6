//! Domain event publication.
//!
//! Events are fire-and-forget: callers log a failed publish and carry on.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Publishes each event as JSON on its own NATS subject.
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(event.subject().to_string(), payload.into())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Used when no broker is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        tracing::debug!(subject = event.subject(), "no broker configured, dropping event");
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn subjects(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::subject).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|e| PublishError::Transport(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}
