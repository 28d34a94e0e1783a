//! Event system for account synchronization.
//!
//! This module defines the event types, event handler trait, and the event dispatcher used while
//! driving a transaction feed into an account. Feed events are converted into sync events, which
//! registered handlers then act on. This keeps reading the feed separate from updating the
//! ledger, and lets logging or metrics handlers sit next to the one that writes.

use crate::feed::{FeedEntry, FeedEvent};
use crate::primitives::BlockHash;
use crate::wallet::WalletSyncError;

/// Events that occur during account synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A relevant transaction was observed
    TransactionReceived { entry: FeedEntry },
    /// The chain head moved
    HeadAdvanced { sequence: u32, block_hash: BlockHash },
    /// The feed is exhausted
    SyncCompleted,
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects or state updates.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Every handler sees every event, in registration order.
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// A failing handler does not stop the others from running; the first failure is returned
    /// once all of them have seen the event.
    pub async fn dispatch(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
        let mut first_error = None;
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Convert a feed event to sync events.
pub fn convert_feed_event(event: FeedEvent) -> Vec<SyncEvent> {
    match event {
        FeedEvent::Transaction(entry) => vec![SyncEvent::TransactionReceived { entry }],
        FeedEvent::Head {
            sequence,
            block_hash,
        } => vec![SyncEvent::HeadAdvanced {
            sequence,
            block_hash,
        }],
    }
}
