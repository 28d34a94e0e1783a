//! Account ledger engine.
//!
//! An [`Account`] owns the in-memory [`LedgerIndices`] for one account and the handle to the store
//! they mirror. All mutation goes through the engine so the indices and the store move together:
//!
//! - `sync`: observing a transaction (pending, mined or removed) and updating notes and nullifiers.
//! - `deletion`: forgetting a transaction and the notes it created.
//! - `balance`: unconfirmed and confirmed balance queries.
//! - `journal`: atomic scopes and their undo journal.
//! - `indices`: the containers themselves.
//!
//! Mutating calls take `&mut self`. Callers that share an account between tasks must serialize
//! access themselves (for instance behind a `tokio::sync::Mutex`).

/// Balance computation
pub mod balance;
/// Forgetting transactions
mod deletion;
/// In-memory indices
pub mod indices;
/// Atomic scopes
pub mod journal;
/// Transaction synchronization
mod sync;

pub use indices::{LedgerIndices, Placement};
pub use journal::LedgerTransaction;

use crate::primitives::{NoteHash, Nullifier, PublicAddress, TransactionHash};
use crate::store::{LedgerStore, StoreTransaction};
use crate::wallet::types::{
	AccountId, AccountKeys, AccountValue, DecryptedNote, LedgerError, TransactionRecord,
	TransactionStatus,
};
use journal::UndoOp;

use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Account {
	pub id: AccountId,
	pub name: String,
	pub keys: AccountKeys,
	pub public_address: PublicAddress,
	indices: LedgerIndices,
	store: Arc<dyn LedgerStore>,
}

impl Account {
	/// Create an account with empty indices. Call [`Account::load`] to pick up persisted state.
	pub fn new(value: AccountValue, store: Arc<dyn LedgerStore>) -> Self {
		Self {
			id: value.id,
			name: value.name,
			keys: value.keys,
			public_address: value.public_address,
			indices: LedgerIndices::default(),
			store,
		}
	}

	pub fn value(&self) -> AccountValue {
		AccountValue {
			id: self.id.clone(),
			name: self.name.clone(),
			keys: self.keys.clone(),
			public_address: self.public_address,
		}
	}

	pub fn indices(&self) -> &LedgerIndices {
		&self.indices
	}

	// Scopes

	/// Open a scope that can span several mutating calls.
	pub fn begin(&self) -> LedgerTransaction {
		LedgerTransaction::new()
	}

	/// Persist every write staged in `txn`. If the store rejects the batch, the in-memory changes
	/// made through the scope are rolled back before the error is returned.
	pub async fn commit(&mut self, mut txn: LedgerTransaction) -> Result<(), LedgerError> {
		txn.bind(&self.id)?;
		let (store_txn, journal) = txn.into_parts();
		if store_txn.is_empty() {
			return Ok(());
		}

		let writes = store_txn.len();
		if let Err(e) = self.store.commit(store_txn).await {
			warn!(
				"Commit of {} writes for account {} failed, rolling back {} index changes: {}",
				writes,
				self.id,
				journal.len(),
				e
			);
			journal.rollback(&mut self.indices);
			return Err(e.into());
		}

		debug!("Committed {} writes for account {}", writes, self.id);
		Ok(())
	}

	/// Discard `txn`, undoing its in-memory changes.
	pub fn abort(&mut self, txn: LedgerTransaction) {
		let (_, journal) = txn.into_parts();
		if journal.len() > 0 {
			debug!(
				"Aborting scope for account {}, rolling back {} index changes",
				self.id,
				journal.len()
			);
		}
		journal.rollback(&mut self.indices);
	}

	/// Finish a call that may have opened its own scope. Caller-supplied scopes are left to the
	/// caller to commit or abort.
	async fn settle<T>(
		&mut self,
		owned: Option<LedgerTransaction>,
		result: Result<T, LedgerError>,
	) -> Result<T, LedgerError> {
		match (owned, result) {
			(Some(txn), Ok(value)) => {
				self.commit(txn).await?;
				Ok(value)
			}
			(Some(txn), Err(e)) => {
				self.abort(txn);
				Err(e)
			}
			(None, result) => result,
		}
	}

	// Journaled writes. Each one updates an index slot, records its previous value and stages the
	// matching store write.

	fn write_note(&mut self, txn: &mut LedgerTransaction, hash: NoteHash, note: DecryptedNote) {
		txn.store.save_decrypted_note(&self.id, hash, note.clone());
		let previous = self.indices.set_note(hash, Some(note));
		txn.record(UndoOp::Note { hash, previous });
	}

	fn remove_note(&mut self, txn: &mut LedgerTransaction, hash: NoteHash) {
		self.write_placement(txn, hash, None);
		txn.store.delete_decrypted_note(&self.id, hash);
		let previous = self.indices.set_note(hash, None);
		txn.record(UndoOp::Note { hash, previous });
	}

	fn write_placement(
		&mut self,
		txn: &mut LedgerTransaction,
		hash: NoteHash,
		placement: Option<Placement>,
	) {
		let previous = self.indices.set_placement(hash, placement);
		if previous != placement {
			txn.record(UndoOp::Placement { hash, previous });
		}
	}

	fn write_nullifier(
		&mut self,
		txn: &mut LedgerTransaction,
		nullifier: Nullifier,
		note_hash: Option<NoteHash>,
	) {
		match note_hash {
			Some(note_hash) => txn
				.store
				.save_nullifier_note_hash(&self.id, nullifier, note_hash),
			None => txn.store.delete_nullifier(&self.id, nullifier),
		}
		let previous = self.indices.set_nullifier(nullifier, note_hash);
		txn.record(UndoOp::Nullifier {
			nullifier,
			previous,
		});
	}

	fn write_transaction(
		&mut self,
		txn: &mut LedgerTransaction,
		hash: TransactionHash,
		record: Option<TransactionRecord>,
	) {
		match &record {
			Some(record) => txn.store.save_transaction(&self.id, hash, record.clone()),
			None => txn.store.delete_transaction(&self.id, hash),
		}
		let previous = self.indices.set_transaction(hash, record);
		txn.record(UndoOp::Transaction { hash, previous });
	}

	fn write_balance(&mut self, txn: &mut LedgerTransaction, balance: i128) {
		txn.store.save_unconfirmed_balance(&self.id, balance);
		let previous = self.indices.set_unconfirmed_balance(balance);
		txn.record(UndoOp::Balance { previous });
	}

	/// Placement a note should have given the current record of its owning transaction.
	fn placement_for(&self, note: &DecryptedNote) -> Result<Placement, LedgerError> {
		let record = self
			.indices
			.get_transaction(&note.transaction_hash)
			.ok_or_else(|| {
				LedgerError::Invariant(format!(
					"Note belongs to unknown transaction {}",
					note.transaction_hash
				))
			})?;
		Placement::for_record(record).ok_or_else(|| {
			LedgerError::Invariant(format!(
				"Transaction {} has a block hash but no sequence",
				note.transaction_hash
			))
		})
	}

	// Queries

	pub fn get_decrypted_note(&self, hash: &NoteHash) -> Option<&DecryptedNote> {
		self.indices.get_note(hash)
	}

	pub fn get_note_hash(&self, nullifier: &Nullifier) -> Option<NoteHash> {
		self.indices.get_note_hash(nullifier)
	}

	pub fn get_notes(&self) -> impl Iterator<Item = (&NoteHash, &DecryptedNote)> {
		self.indices.notes()
	}

	pub fn get_unspent_notes(&self) -> impl Iterator<Item = (&NoteHash, &DecryptedNote)> {
		self.indices.unspent_notes()
	}

	pub fn get_transaction(&self, hash: &TransactionHash) -> Option<&TransactionRecord> {
		self.indices.get_transaction(hash)
	}

	pub fn has_transaction(&self, hash: &TransactionHash) -> bool {
		self.indices.get_transaction(hash).is_some()
	}

	/// Iterate over the current transaction records. Every call starts a fresh pass.
	pub fn get_transactions(&self) -> impl Iterator<Item = &TransactionRecord> {
		self.indices.transactions()
	}

	/// Transactions not on chain that can still be mined at `head_sequence`.
	pub fn get_pending_transactions(
		&self,
		head_sequence: u32,
	) -> impl Iterator<Item = &TransactionRecord> {
		self.indices.transactions().filter(move |record| {
			!record.is_mined() && !is_expired(record.transaction.expiration(), head_sequence)
		})
	}

	/// Transactions not on chain whose expiration has passed at `head_sequence`.
	pub fn get_expired_transactions(
		&self,
		head_sequence: u32,
	) -> impl Iterator<Item = &TransactionRecord> {
		self.indices.transactions().filter(move |record| {
			!record.is_mined() && is_expired(record.transaction.expiration(), head_sequence)
		})
	}

	pub fn get_transaction_status(
		&self,
		hash: &TransactionHash,
		head_sequence: u32,
		minimum_confirmations: u32,
	) -> TransactionStatus {
		let Some(record) = self.indices.get_transaction(hash) else {
			return TransactionStatus::Unknown;
		};

		match record.sequence {
			Some(sequence) if record.is_mined() => {
				if head_sequence.saturating_sub(sequence) >= minimum_confirmations {
					TransactionStatus::Confirmed
				} else {
					TransactionStatus::Unconfirmed
				}
			}
			_ if is_expired(record.transaction.expiration(), head_sequence) => {
				TransactionStatus::Expired
			}
			_ => TransactionStatus::Pending,
		}
	}

	// Bulk operations

	/// Rebuild every index from the store, replacing whatever is in memory.
	pub async fn load(&mut self) -> Result<(), LedgerError> {
		let mut indices = LedgerIndices::default();

		let mut transactions = self.store.load_transactions(&self.id);
		while let Some(entry) = transactions.next().await {
			let (hash, record) = entry?;
			record.check()?;
			indices.set_transaction(hash, Some(record));
		}
		drop(transactions);

		let mut nullifiers = self.store.load_nullifier_to_note_hash(&self.id);
		while let Some(entry) = nullifiers.next().await {
			let (nullifier, note_hash) = entry?;
			indices.set_nullifier(nullifier, Some(note_hash));
		}
		drop(nullifiers);

		let mut notes = self.store.load_decrypted_notes(&self.id);
		while let Some(entry) = notes.next().await {
			let (hash, note) = entry?;
			let placement = indices
				.get_transaction(&note.transaction_hash)
				.and_then(Placement::for_record)
				.ok_or_else(|| {
					LedgerError::Invariant(format!(
						"Stored note {} has no placeable transaction {}",
						hash, note.transaction_hash
					))
				})?;
			indices.set_note(hash, Some(note));
			indices.set_placement(hash, Some(placement));
		}
		drop(notes);

		if let Some((nullifier, note_hash)) = indices
			.nullifiers()
			.find(|(_, note_hash)| indices.get_note(note_hash).is_none())
		{
			return Err(LedgerError::Invariant(format!(
				"Stored nullifier {} points at missing note {}",
				nullifier, note_hash
			)));
		}

		let balance = self.store.get_unconfirmed_balance(&self.id).await?;
		indices.set_unconfirmed_balance(balance);

		info!(
			"Loaded account {}: {} notes, {} transactions, unconfirmed balance {}",
			self.id,
			indices.note_count(),
			indices.transaction_count(),
			balance
		);
		self.indices = indices;
		Ok(())
	}

	/// Write the full contents of every index to the store in one batch.
	pub async fn save(&self) -> Result<(), LedgerError> {
		let mut batch = StoreTransaction::new();
		for record in self.indices.transactions() {
			batch.save_transaction(&self.id, record.hash(), record.clone());
		}
		for (nullifier, note_hash) in self.indices.nullifiers() {
			batch.save_nullifier_note_hash(&self.id, *nullifier, *note_hash);
		}
		for (hash, note) in self.indices.notes() {
			batch.save_decrypted_note(&self.id, *hash, note.clone());
		}
		batch.save_unconfirmed_balance(&self.id, self.indices.unconfirmed_balance());

		let writes = batch.len();
		self.store.commit(batch).await?;
		info!("Saved account {} ({} writes)", self.id, writes);
		Ok(())
	}

	/// Forget every note, nullifier and transaction and zero the balance, in memory and in the
	/// store. Memory is only cleared once the store has accepted the reset.
	pub async fn reset(&mut self) -> Result<(), LedgerError> {
		let mut batch = StoreTransaction::new();
		batch.clear_account(&self.id);
		batch.save_unconfirmed_balance(&self.id, 0);
		self.store.commit(batch).await?;

		self.indices.clear();
		info!("Reset account {}", self.id);
		Ok(())
	}
}

/// Expiration 0 never expires.
fn is_expired(expiration: u32, head_sequence: u32) -> bool {
	expiration != 0 && expiration <= head_sequence
}
