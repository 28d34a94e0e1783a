use crate::feed::FeedError;
use crate::primitives::{BlockHash, Note, Nullifier, PublicAddress, Transaction, TransactionHash};
use crate::store::StoreError;

use serde::{Deserialize, Serialize};

pub type AccountId = String;

/// Key material of an account. Carried opaquely; derivation lives outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKeys {
	pub spending_key: String,
	pub incoming_view_key: String,
	pub outgoing_view_key: String,
}

/// Identity and keys of an account, without any of its ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountValue {
	pub id: AccountId,
	pub name: String,
	pub keys: AccountKeys,
	pub public_address: PublicAddress,
}

/// A note owned by the account, as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedNote {
	pub account_id: AccountId,
	pub nullifier: Option<Nullifier>,
	/// Position in the note tree, set once the note is on chain.
	pub index: Option<u64>,
	pub note: Note,
	pub spent: bool,
	pub transaction_hash: TransactionHash,
}

impl DecryptedNote {
	pub fn value(&self) -> i128 {
		i128::from(self.note.value())
	}
}

/// A transaction known to the account, together with where it currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
	pub transaction: Transaction,
	pub block_hash: Option<BlockHash>,
	pub sequence: Option<u32>,
	pub submitted_sequence: Option<u32>,
}

impl TransactionRecord {
	pub fn hash(&self) -> TransactionHash {
		self.transaction.hash()
	}

	pub fn is_mined(&self) -> bool {
		self.block_hash.is_some()
	}

	pub fn is_pending(&self) -> bool {
		self.block_hash.is_none() && self.submitted_sequence.is_some()
	}

	/// Neither on chain nor in the mempool.
	pub fn is_removed(&self) -> bool {
		self.block_hash.is_none() && self.submitted_sequence.is_none()
	}

	/// A block hash without a sequence cannot be placed in the sequence index.
	pub fn check(&self) -> Result<(), LedgerError> {
		if self.block_hash.is_some() && self.sequence.is_none() {
			return Err(LedgerError::Invariant(format!(
				"Transaction {} has a block hash but no sequence",
				self.hash()
			)));
		}
		Ok(())
	}
}

/// Chain status delivered alongside an observed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncStatus {
	/// Included in the block `block_hash` at `sequence`.
	#[serde(rename_all = "camelCase")]
	Mined { block_hash: BlockHash, sequence: u32 },
	/// Broadcast to the mempool at `submitted_sequence`.
	#[serde(rename_all = "camelCase")]
	Pending { submitted_sequence: u32 },
	/// Neither on chain nor in the mempool (expired or rolled back).
	Removed,
}

impl SyncStatus {
	pub fn block_hash(&self) -> Option<BlockHash> {
		match self {
			SyncStatus::Mined { block_hash, .. } => Some(*block_hash),
			_ => None,
		}
	}

	pub fn sequence(&self) -> Option<u32> {
		match self {
			SyncStatus::Mined { sequence, .. } => Some(*sequence),
			_ => None,
		}
	}

	pub fn submitted_sequence(&self) -> Option<u32> {
		match self {
			SyncStatus::Pending { submitted_sequence } => Some(*submitted_sequence),
			_ => None,
		}
	}
}

/// Status of a transaction relative to a chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
	/// Mined, but not yet buried under enough blocks.
	Unconfirmed,
	Confirmed,
	Pending,
	Expired,
	Unknown,
}

/// Balance of an account at a given head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
	pub unconfirmed: i128,
	pub confirmed: i128,
}

/// Errors raised by the account ledger engine
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("Store error: {0}")]
	Store(#[from] StoreError),

	/// The indices disagree with each other. Indicates upstream corruption or a caller bypassing
	/// the synchronization protocol.
	#[error("Ledger invariant violated: {0}")]
	Invariant(String),

	#[error("Scope error: {0}")]
	ScopeError(String),
}

/// Errors raised while driving a feed into an account
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Ledger error: {0}")]
	LedgerError(#[from] LedgerError),

	#[error("Feed error: {0}")]
	FeedError(#[from] FeedError),

	#[error("Transaction parse error: {0}")]
	ParseError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
