//! Progress tracking for account synchronization.
//!
//! This module provides the `SyncProgressTracker`, which follows a feed as it is driven into an
//! account. It remembers the latest chain head, counts observations per status and expirations,
//! and produces statistics for the end-of-run summary.

use crate::primitives::BlockHash;
use crate::wallet::SyncStatus;
use tracing::info;

/// Service for tracking synchronization progress
#[derive(Debug, Clone, Default)]
pub struct SyncProgressTracker {
    /// Latest head reported by the feed
    head: Option<(u32, BlockHash)>,
    /// Transactions observed as mined
    mined: usize,
    /// Transactions observed as pending
    pending: usize,
    /// Transactions observed as removed from the chain
    removed: usize,
    /// Transactions deleted after expiring
    expired: usize,
    /// Number of observations at the last progress log
    last_logged: usize,
}

impl SyncProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction observation with its status
    pub fn record_status(&mut self, status: &SyncStatus) {
        match status {
            SyncStatus::Mined { .. } => self.mined += 1,
            SyncStatus::Pending { .. } => self.pending += 1,
            SyncStatus::Removed => self.removed += 1,
        }
    }

    /// Record a new chain head. Heads may move backwards on a reorg.
    pub fn record_head(&mut self, sequence: u32, block_hash: BlockHash) {
        self.head = Some((sequence, block_hash));
    }

    /// Record transactions deleted because they expired
    pub fn record_expired(&mut self, count: usize) {
        self.expired += count;
    }

    pub fn head_sequence(&self) -> Option<u32> {
        self.head.map(|(sequence, _)| sequence)
    }

    fn observed(&self) -> usize {
        self.mined + self.pending + self.removed
    }

    /// Log progress every 100 observations or when forced
    pub fn log_progress(&mut self, force: bool) {
        let since_last_log = self.observed().saturating_sub(self.last_logged);
        if force || since_last_log >= 100 {
            info!(
                "Sync progress: {} transactions observed ({} mined, {} pending, {} removed), head {:?}",
                self.observed(),
                self.mined,
                self.pending,
                self.removed,
                self.head_sequence()
            );
            self.last_logged = self.observed();
        }
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            head_sequence: self.head_sequence(),
            head_hash: self.head.map(|(_, hash)| hash),
            mined: self.mined,
            pending: self.pending,
            removed: self.removed,
            expired: self.expired,
        }
    }
}

/// Statistics about the sync progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub head_sequence: Option<u32>,
    pub head_hash: Option<BlockHash>,
    pub mined: usize,
    pub pending: usize,
    pub removed: usize,
    pub expired: usize,
}

impl SyncStats {
    pub fn transactions_observed(&self) -> usize {
        self.mined + self.pending + self.removed
    }

    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Synced to {}: {} transactions ({} mined, {} pending, {} removed){}",
            match self.head_sequence {
                Some(sequence) => format!("sequence {}", sequence),
                None => "unknown head".to_string(),
            },
            self.transactions_observed(),
            self.mined,
            self.pending,
            self.removed,
            if self.expired == 0 {
                String::new()
            } else {
                format!(", {} expired", self.expired)
            }
        )
    }
}
