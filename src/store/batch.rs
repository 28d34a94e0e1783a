use crate::primitives::{NoteHash, Nullifier, TransactionHash};
use crate::store::StoreError;
use crate::wallet::types::{AccountId, DecryptedNote, TransactionRecord};

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;

/// A single staged write against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
	SaveDecryptedNote {
		account_id: AccountId,
		hash: NoteHash,
		note: DecryptedNote,
	},
	DeleteDecryptedNote {
		account_id: AccountId,
		hash: NoteHash,
	},
	SaveNullifierNoteHash {
		account_id: AccountId,
		nullifier: Nullifier,
		note_hash: NoteHash,
	},
	DeleteNullifier {
		account_id: AccountId,
		nullifier: Nullifier,
	},
	SaveTransaction {
		account_id: AccountId,
		hash: TransactionHash,
		record: TransactionRecord,
	},
	DeleteTransaction {
		account_id: AccountId,
		hash: TransactionHash,
	},
	SaveUnconfirmedBalance {
		account_id: AccountId,
		balance: i128,
	},
	/// Drop every note, nullifier and transaction of the account and zero its balance.
	ClearAccount {
		account_id: AccountId,
	},
}

impl StoreOp {
	pub fn account_id(&self) -> &str {
		match self {
			StoreOp::SaveDecryptedNote { account_id, .. }
			| StoreOp::DeleteDecryptedNote { account_id, .. }
			| StoreOp::SaveNullifierNoteHash { account_id, .. }
			| StoreOp::DeleteNullifier { account_id, .. }
			| StoreOp::SaveTransaction { account_id, .. }
			| StoreOp::DeleteTransaction { account_id, .. }
			| StoreOp::SaveUnconfirmedBalance { account_id, .. }
			| StoreOp::ClearAccount { account_id } => account_id,
		}
	}
}

/// Write operations grouped for a single atomic commit.
///
/// Nothing reaches the backend until the batch is passed to
/// [`LedgerStore::commit`](crate::store::LedgerStore::commit). Dropping the batch discards it.
#[derive(Debug, Clone, Default)]
pub struct StoreTransaction {
	ops: Vec<StoreOp>,
}

impl StoreTransaction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn save_decrypted_note(&mut self, account_id: &str, hash: NoteHash, note: DecryptedNote) {
		self.ops.push(StoreOp::SaveDecryptedNote {
			account_id: account_id.to_string(),
			hash,
			note,
		});
	}

	pub fn delete_decrypted_note(&mut self, account_id: &str, hash: NoteHash) {
		self.ops.push(StoreOp::DeleteDecryptedNote {
			account_id: account_id.to_string(),
			hash,
		});
	}

	pub fn save_nullifier_note_hash(
		&mut self,
		account_id: &str,
		nullifier: Nullifier,
		note_hash: NoteHash,
	) {
		self.ops.push(StoreOp::SaveNullifierNoteHash {
			account_id: account_id.to_string(),
			nullifier,
			note_hash,
		});
	}

	pub fn delete_nullifier(&mut self, account_id: &str, nullifier: Nullifier) {
		self.ops.push(StoreOp::DeleteNullifier {
			account_id: account_id.to_string(),
			nullifier,
		});
	}

	pub fn save_transaction(
		&mut self,
		account_id: &str,
		hash: TransactionHash,
		record: TransactionRecord,
	) {
		self.ops.push(StoreOp::SaveTransaction {
			account_id: account_id.to_string(),
			hash,
			record,
		});
	}

	pub fn delete_transaction(&mut self, account_id: &str, hash: TransactionHash) {
		self.ops.push(StoreOp::DeleteTransaction {
			account_id: account_id.to_string(),
			hash,
		});
	}

	pub fn save_unconfirmed_balance(&mut self, account_id: &str, balance: i128) {
		self.ops.push(StoreOp::SaveUnconfirmedBalance {
			account_id: account_id.to_string(),
			balance,
		});
	}

	pub fn clear_account(&mut self, account_id: &str) {
		self.ops.push(StoreOp::ClearAccount {
			account_id: account_id.to_string(),
		});
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	/// Accounts touched by this batch, in a stable order.
	pub fn account_ids(&self) -> BTreeSet<&str> {
		self.ops.iter().map(StoreOp::account_id).collect()
	}

	pub fn into_ops(self) -> Vec<StoreOp> {
		self.ops
	}
}

/// Everything persisted for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountRecords {
	pub decrypted_notes: HashMap<NoteHash, DecryptedNote>,
	pub nullifier_to_note_hash: HashMap<Nullifier, NoteHash>,
	pub transactions: HashMap<TransactionHash, TransactionRecord>,
	pub unconfirmed_balance: i128,
}

impl AccountRecords {
	/// Apply one staged write. Ops for other accounts must be filtered out by the caller.
	pub fn apply(&mut self, op: StoreOp) {
		match op {
			StoreOp::SaveDecryptedNote { hash, note, .. } => {
				self.decrypted_notes.insert(hash, note);
			}
			StoreOp::DeleteDecryptedNote { hash, .. } => {
				self.decrypted_notes.remove(&hash);
			}
			StoreOp::SaveNullifierNoteHash {
				nullifier,
				note_hash,
				..
			} => {
				self.nullifier_to_note_hash.insert(nullifier, note_hash);
			}
			StoreOp::DeleteNullifier { nullifier, .. } => {
				self.nullifier_to_note_hash.remove(&nullifier);
			}
			StoreOp::SaveTransaction { hash, record, .. } => {
				self.transactions.insert(hash, record);
			}
			StoreOp::DeleteTransaction { hash, .. } => {
				self.transactions.remove(&hash);
			}
			StoreOp::SaveUnconfirmedBalance { balance, .. } => {
				self.unconfirmed_balance = balance;
			}
			StoreOp::ClearAccount { .. } => {
				*self = Self::default();
			}
		}
	}
}

/// Turn a pending snapshot read into a stream over a part of it.
///
/// The snapshot is only read once the stream is first polled. Each call builds a new stream, so
/// loaders stay restartable.
pub(crate) fn stream_records<'a, T, F, I>(
	records: impl Future<Output = Result<AccountRecords, StoreError>> + Send + 'a,
	select: F,
) -> BoxStream<'a, Result<T, StoreError>>
where
	F: FnOnce(AccountRecords) -> I + Send + 'a,
	I: IntoIterator<Item = T>,
	T: Send + 'a,
{
	stream::once(async move {
		let items: Vec<Result<T, StoreError>> = match records.await {
			Ok(records) => select(records).into_iter().map(Ok).collect(),
			Err(e) => vec![Err(e)],
		};
		stream::iter(items)
	})
	.flatten()
	.boxed()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_apply_clear_resets_balance() {
		let mut records = AccountRecords::default();
		records.apply(StoreOp::SaveUnconfirmedBalance {
			account_id: "a".to_string(),
			balance: 42,
		});
		records.apply(StoreOp::SaveNullifierNoteHash {
			account_id: "a".to_string(),
			nullifier: Nullifier([1; 32]),
			note_hash: NoteHash([2; 32]),
		});
		assert_eq!(records.unconfirmed_balance, 42);

		records.apply(StoreOp::ClearAccount {
			account_id: "a".to_string(),
		});
		assert_eq!(records, AccountRecords::default());
	}

	#[test]
	fn test_account_ids_are_deduplicated() {
		let mut batch = StoreTransaction::new();
		batch.save_unconfirmed_balance("b", 1);
		batch.delete_nullifier("a", Nullifier([0; 32]));
		batch.save_unconfirmed_balance("b", 2);
		assert_eq!(batch.len(), 3);
		assert_eq!(batch.account_ids().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
	}
}
