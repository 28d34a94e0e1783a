use crate::feed::FeedEntry;
use crate::primitives::Transaction;
use crate::wallet::WalletSyncError;
use tracing::{debug, error};

#[derive(Clone, Default)]
pub struct TransactionProcessor;

impl TransactionProcessor {
	pub fn new() -> Self {
		Self
	}

	/// Parse raw transaction hex into a Transaction
	pub fn parse_transaction(&self, raw_hex: &str) -> Result<Transaction, WalletSyncError> {
		let tx_bytes = hex::decode(raw_hex).map_err(|e| {
			error!("[PARSE_TRANSACTION] Failed to decode hex: {}", e);
			WalletSyncError::ParseError(format!("Failed to decode hex: {}", e))
		})?;

		let transaction: Transaction = bincode::deserialize(&tx_bytes).map_err(|e| {
			error!(
				"[PARSE_TRANSACTION] Failed to deserialize transaction: {}",
				e
			);
			WalletSyncError::ParseError(format!("Failed to deserialize transaction: {}", e))
		})?;

		Ok(transaction)
	}

	/// Encode a transaction the way feed entries carry it
	pub fn encode_transaction(&self, transaction: &Transaction) -> Result<String, WalletSyncError> {
		let bytes = bincode::serialize(transaction).map_err(|e| {
			WalletSyncError::ParseError(format!("Failed to serialize transaction: {}", e))
		})?;
		Ok(hex::encode(bytes))
	}

	/// Process a feed entry into a parsed transaction, checking it is the one the entry names
	pub fn process_transaction(&self, entry: &FeedEntry) -> Result<Transaction, WalletSyncError> {
		debug!(
			"Processing transaction: {} (status: {:?})",
			entry.hash, entry.status
		);

		let transaction = self.parse_transaction(&entry.raw)?;
		if transaction.hash() != entry.hash {
			return Err(WalletSyncError::ParseError(format!(
				"Feed entry {} carries transaction {}",
				entry.hash,
				transaction.hash()
			)));
		}

		Ok(transaction)
	}
}
