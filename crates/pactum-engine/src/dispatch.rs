//! Event channel
//!
//! Commands publish recorded domain events after the aggregate is persisted.
//! Publishing is best-effort: a dispatcher failure is logged and never rolls
//! back the financial state change that already happened.

use pactum_types::{DomainEvent, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Downstream channel for domain events
#[async_trait::async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}

/// Default dispatcher: writes each event to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait::async_trait]
impl EventDispatcher for LoggingDispatcher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        info!("Event {} at {}", event.name(), event.occurred_at());
        Ok(())
    }
}

/// Test dispatcher that keeps every published event in order
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    published: Arc<RwLock<Vec<DomainEvent>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<DomainEvent> {
        self.published.read().await.clone()
    }

    /// Names of the published events, in publish order
    pub async fn published_names(&self) -> Vec<&'static str> {
        self.published.read().await.iter().map(|e| e.name()).collect()
    }

    pub async fn clear(&self) {
        self.published.write().await.clear();
    }
}

#[async_trait::async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        self.published.write().await.push(event.clone());
        Ok(())
    }
}
