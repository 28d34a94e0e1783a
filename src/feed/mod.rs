//! Transaction feed produced by a chain-sync component.
//!
//! The ledger does not follow the chain itself. Something upstream scans blocks and the mempool,
//! trial-decrypts outputs and emits one event per observed transaction (with its chain status)
//! plus head updates. This module defines that feed and reads it from JSON-lines files.

/// JSON-lines feed reader
mod reader;
/// Feed event definitions
mod types;

pub use reader::FeedReader;
pub use types::*;
