//! Types for the transaction feed

use crate::primitives::{BlockHash, DecryptedOutput, TransactionHash};
use crate::wallet::types::SyncStatus;

use serde::{Deserialize, Serialize};

/// One observation of a transaction relevant to the account.
///
/// The transaction itself travels as hex-encoded bincode in `raw`, the way the chain-sync
/// component forwards it; `hash` is repeated in clear so entries can be logged without decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
	/// The transaction hash.
	pub hash: TransactionHash,
	/// Hex-encoded bincode transaction.
	pub raw: String,
	/// Notes decrypted out of the transaction by the account's keys.
	#[serde(default)]
	pub notes: Vec<DecryptedOutput>,
	/// Where the transaction currently sits.
	pub status: SyncStatus,
}

/// Events carried by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedEvent {
	/// A transaction was observed with a (possibly new) status.
	Transaction(FeedEntry),
	/// The chain head moved, forwards or backwards.
	#[serde(rename_all = "camelCase")]
	Head {
		sequence: u32,
		block_hash: BlockHash,
	},
}

/// Error types for feed reading
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("JSON parse error on line {line}: {source}")]
	JsonError {
		line: usize,
		#[source]
		source: serde_json::Error,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_head_and_transaction() {
		let head: FeedEvent = serde_json::from_str(&format!(
			r#"{{"type":"head","sequence":12,"blockHash":"{}"}}"#,
			"0c".repeat(32)
		))
		.expect("Failed parsing head event");
		assert_eq!(
			head,
			FeedEvent::Head {
				sequence: 12,
				block_hash: BlockHash([12; 32]),
			}
		);

		let entry: FeedEvent = serde_json::from_str(&format!(
			r#"{{"type":"transaction","hash":"{}","raw":"00","status":{{"state":"pending","submittedSequence":4}}}}"#,
			"01".repeat(32)
		))
		.expect("Failed parsing transaction event");
		match entry {
			FeedEvent::Transaction(entry) => {
				assert_eq!(
					entry.status,
					SyncStatus::Pending {
						submitted_sequence: 4
					}
				);
				assert!(entry.notes.is_empty());
			}
			other => panic!("Unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_parse_removed_status() {
		let status: SyncStatus =
			serde_json::from_str(r#"{"state":"removed"}"#).expect("Failed parsing status");
		assert_eq!(status, SyncStatus::Removed);
	}
}
