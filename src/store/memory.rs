//! In-memory ledger store.

use crate::primitives::{NoteHash, Nullifier, TransactionHash};
use crate::store::StoreError;
use crate::store::batch::{AccountRecords, StoreTransaction, stream_records};
use crate::store::repositories::LedgerStore;
use crate::wallet::types::{DecryptedNote, TransactionRecord};

use futures::stream::BoxStream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Ledger store backed by a map per account. Nothing survives the process.
#[derive(Default)]
pub struct MemoryLedgerStore {
	accounts: Mutex<HashMap<String, AccountRecords>>,
	commits: AtomicUsize,
	fail_next_commit: AtomicBool,
}

impl MemoryLedgerStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of batches committed so far.
	pub fn commit_count(&self) -> usize {
		self.commits.load(Ordering::SeqCst)
	}

	/// Make the next commit fail without applying anything.
	pub fn fail_next_commit(&self) {
		self.fail_next_commit.store(true, Ordering::SeqCst);
	}

	/// Copy of everything persisted for an account.
	pub async fn snapshot(&self, account_id: &str) -> AccountRecords {
		self.accounts
			.lock()
			.await
			.get(account_id)
			.cloned()
			.unwrap_or_default()
	}

	async fn read_records(&self, account_id: &str) -> Result<AccountRecords, StoreError> {
		Ok(self.snapshot(account_id).await)
	}
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedgerStore {
	fn load_decrypted_notes<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(NoteHash, DecryptedNote), StoreError>> {
		stream_records(self.read_records(account_id), |records| {
			records.decrypted_notes
		})
	}

	fn load_nullifier_to_note_hash<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(Nullifier, NoteHash), StoreError>> {
		stream_records(self.read_records(account_id), |records| {
			records.nullifier_to_note_hash
		})
	}

	fn load_transactions<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(TransactionHash, TransactionRecord), StoreError>> {
		stream_records(self.read_records(account_id), |records| records.transactions)
	}

	async fn get_unconfirmed_balance(&self, account_id: &str) -> Result<i128, StoreError> {
		Ok(self.snapshot(account_id).await.unconfirmed_balance)
	}

	async fn commit(&self, transaction: StoreTransaction) -> Result<(), StoreError> {
		if self.fail_next_commit.swap(false, Ordering::SeqCst) {
			return Err(StoreError::CommitFailed(
				"Injected commit failure".to_string(),
			));
		}

		let mut accounts = self.accounts.lock().await;
		for op in transaction.into_ops() {
			accounts
				.entry(op.account_id().to_string())
				.or_default()
				.apply(op);
		}
		self.commits.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
