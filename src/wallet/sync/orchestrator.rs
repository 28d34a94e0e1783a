//! Account sync orchestrator and integration point for all sync services.
//!
//! This module defines the `AccountSyncOrchestrator`, which drives a transaction feed into an
//! [`Account`]. It converts feed events into sync events, dispatches them to the registered
//! handlers, tracks the chain head and reports the resulting balance.
//!
//! The orchestrator is responsible for:
//! - Wiring the transaction processor, progress tracker and account together
//! - Applying every observed transaction to the account with its chain status
//! - Deleting transactions whose expiration the head has passed
//!
//! The `AccountEventHandler` is where feed events become ledger mutations. Each transaction
//! observation commits on its own; the expirations found at one head update share a scope.

use crate::feed::{FeedError, FeedEvent};
use crate::primitives::{NATIVE_TOKEN_DECIMALS, Transaction};
use crate::utils::format_token_amount;
use crate::wallet::account::balance::confirmation_range;
use crate::wallet::sync::{
    events::{EventDispatcher, SyncEvent, SyncEventHandler, convert_feed_event},
    progress_tracker::{SyncProgressTracker, SyncStats},
    transaction_processor::TransactionProcessor,
};
use crate::wallet::{Account, Balance, WalletSyncError};

use futures::{Stream, StreamExt};
use itertools::Itertools;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Configuration for the sync service
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding the account stores
    pub data_dir: PathBuf,
    /// JSON-lines feed to replay
    pub feed_path: PathBuf,
    /// Account to sync; a fresh one is created when unset
    pub account_name: Option<String>,
    /// Blocks required on top of a transaction's block before it counts as confirmed
    pub minimum_confirmations: u32,
    /// Whether to delete transactions once the head passes their expiration
    pub expire_transactions: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            feed_path: PathBuf::from("feed.jsonl"),
            account_name: None,
            minimum_confirmations: 2,
            expire_transactions: true,
        }
    }
}

impl SyncConfig {
    /// Build a config from `LEDGER_*` environment variables, keeping defaults for anything
    /// unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("LEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            feed_path: std::env::var("LEDGER_FEED")
                .map(PathBuf::from)
                .unwrap_or(defaults.feed_path),
            account_name: std::env::var("LEDGER_ACCOUNT").ok(),
            minimum_confirmations: std::env::var("LEDGER_MIN_CONFIRMATIONS")
                .ok()
                .and_then(|s| match s.parse() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Ignoring LEDGER_MIN_CONFIRMATIONS={:?}: {}", s, e);
                        None
                    }
                })
                .unwrap_or(defaults.minimum_confirmations),
            expire_transactions: std::env::var("LEDGER_EXPIRE_TRANSACTIONS")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(defaults.expire_transactions),
        }
    }
}

/// Main account sync orchestrator.
///
/// Owns a shared handle to the account so the caller can keep querying it between runs.
pub struct AccountSyncOrchestrator {
    account: Arc<Mutex<Account>>,
    transaction_processor: TransactionProcessor,
    progress_tracker: Arc<Mutex<SyncProgressTracker>>,
    config: SyncConfig,
}

impl AccountSyncOrchestrator {
    pub fn new(account: Arc<Mutex<Account>>, config: SyncConfig) -> Self {
        Self {
            account,
            transaction_processor: TransactionProcessor::new(),
            progress_tracker: Arc::new(Mutex::new(SyncProgressTracker::new())),
            config,
        }
    }

    pub fn account(&self) -> Arc<Mutex<Account>> {
        self.account.clone()
    }

    /// Drive every event of `events` into the account.
    ///
    /// Stops at the first event that cannot be read or applied. Everything applied before it
    /// stays committed; the failing observation itself leaves the account untouched.
    pub async fn sync<S>(&mut self, mut events: S) -> Result<SyncStats, WalletSyncError>
    where
        S: Stream<Item = Result<FeedEvent, FeedError>> + Unpin,
    {
        info!("Starting account synchronization");

        let mut event_dispatcher = EventDispatcher::new();
        event_dispatcher.register_handler(Box::new(AccountEventHandler {
            account: self.account.clone(),
            transaction_processor: self.transaction_processor.clone(),
            progress_tracker: self.progress_tracker.clone(),
            expire_transactions: self.config.expire_transactions,
        }));

        while let Some(event) = events.next().await {
            for sync_event in convert_feed_event(event?) {
                event_dispatcher.dispatch(&sync_event).await?;
            }
            self.progress_tracker.lock().await.log_progress(false);
        }

        event_dispatcher.dispatch(&SyncEvent::SyncCompleted).await?;

        let mut progress_tracker = self.progress_tracker.lock().await;
        progress_tracker.log_progress(true);
        let stats = progress_tracker.get_stats();
        info!("Account synchronization completed: {}", stats.summary());
        Ok(stats)
    }

    /// Balance at the latest head seen, using the configured confirmation depth.
    ///
    /// Before any head is known every mined note counts as confirmed.
    pub async fn get_current_balance(&self) -> Balance {
        let head = self.progress_tracker.lock().await.head_sequence();
        let account = self.account.lock().await;

        let balance = match head {
            Some(head) => {
                let (start, end) = confirmation_range(head, self.config.minimum_confirmations);
                account.get_balance(start, end)
            }
            None => account.get_balance(0, 0),
        };

        info!(
            "Account {} balance: {} confirmed, {} unconfirmed",
            account.name,
            format_token_amount(balance.confirmed, NATIVE_TOKEN_DECIMALS),
            format_token_amount(balance.unconfirmed, NATIVE_TOKEN_DECIMALS)
        );
        balance
    }
}

/// Event handler that applies sync events to the account.
struct AccountEventHandler {
    account: Arc<Mutex<Account>>,
    transaction_processor: TransactionProcessor,
    progress_tracker: Arc<Mutex<SyncProgressTracker>>,
    expire_transactions: bool,
}

impl AccountEventHandler {
    /// Delete every unmined transaction whose expiration `head_sequence` has reached.
    async fn expire_transactions(&self, head_sequence: u32) -> Result<usize, WalletSyncError> {
        let mut account = self.account.lock().await;

        let expired: Vec<Transaction> = account
            .get_expired_transactions(head_sequence)
            .sorted_by_key(|record| (record.transaction.expiration(), record.hash()))
            .map(|record| record.transaction.clone())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let mut scope = account.begin();
        for transaction in &expired {
            if let Err(e) = account.delete_transaction(transaction, Some(&mut scope)).await {
                account.abort(scope);
                return Err(e.into());
            }
        }
        account.commit(scope).await?;

        info!(
            "Deleted {} transactions expired at sequence {}",
            expired.len(),
            head_sequence
        );
        Ok(expired.len())
    }
}

#[async_trait::async_trait]
impl SyncEventHandler for AccountEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
        match event {
            SyncEvent::TransactionReceived { entry } => {
                let transaction = self.transaction_processor.process_transaction(entry)?;
                self.account
                    .lock()
                    .await
                    .sync_transaction(&transaction, &entry.notes, entry.status, None)
                    .await?;
                self.progress_tracker
                    .lock()
                    .await
                    .record_status(&entry.status);
            }
            SyncEvent::HeadAdvanced {
                sequence,
                block_hash,
            } => {
                debug!("Head at sequence {} ({})", sequence, block_hash);
                self.progress_tracker
                    .lock()
                    .await
                    .record_head(*sequence, *block_hash);

                if self.expire_transactions {
                    let expired = self.expire_transactions(*sequence).await?;
                    self.progress_tracker.lock().await.record_expired(expired);
                }
            }
            SyncEvent::SyncCompleted => {
                debug!("Feed exhausted");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "AccountEventHandler"
    }
}
