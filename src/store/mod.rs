//! Persistence layer for account ledgers.
//!
//! The engine never writes to a backend directly. Every point write is staged on a
//! [`StoreTransaction`] and handed to [`LedgerStore::commit`], which applies the whole batch or
//! none of it. Loading happens through streams that are rebuilt on every call, so a fresh pass
//! over the persisted data is always available.
//!
//! - `batch`: staged write operations and the per-account record snapshot they apply to.
//! - `repositories`: the `LedgerStore` trait and the file-backed implementation.
//! - `memory`: an in-memory implementation, used by tests and short-lived tooling.

/// Staged writes and the record snapshot they apply to
pub mod batch;
/// In-memory store
pub mod memory;
/// Store trait and file-backed store
pub mod repositories;

pub use batch::{AccountRecords, StoreOp, StoreTransaction};
pub use memory::MemoryLedgerStore;
pub use repositories::{FileLedgerStore, LedgerStore};

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	SerializationError(#[from] bincode::Error),

	#[error("Metadata error: {0}")]
	MetadataError(#[from] serde_json::Error),

	#[error("Commit failed: {0}")]
	CommitFailed(String),
}
