use super::{Account, LedgerTransaction};
use crate::primitives::{DecryptedOutput, NoteHash, Nullifier, Transaction};
use crate::wallet::types::{DecryptedNote, LedgerError, SyncStatus, TransactionRecord};

use tracing::{debug, info};

impl Account {
	/// Record an observation of `transaction` with its chain `status`.
	///
	/// Upserts the transaction record, registers the notes the account receives in it and flips
	/// the spent flag of every owned note the transaction spends: spent unless the transaction is
	/// being removed, in which case those notes become spendable again. All of it lands in one
	/// scope: `scope` if given (left open for the caller), otherwise a scope committed here.
	pub async fn sync_transaction(
		&mut self,
		transaction: &Transaction,
		decrypted_notes: &[DecryptedOutput],
		status: SyncStatus,
		scope: Option<&mut LedgerTransaction>,
	) -> Result<(), LedgerError> {
		let mut owned = None;
		let txn = match scope {
			Some(txn) => txn,
			None => owned.insert(self.begin()),
		};
		let result = self.apply_sync(txn, transaction, decrypted_notes, status);
		self.settle(owned, result).await
	}

	/// Store `note` under `note_hash`, adjusting the unconfirmed balance when its spent flag
	/// changes.
	pub async fn update_decrypted_note(
		&mut self,
		note_hash: NoteHash,
		note: DecryptedNote,
		scope: Option<&mut LedgerTransaction>,
	) -> Result<(), LedgerError> {
		let mut owned = None;
		let txn = match scope {
			Some(txn) => txn,
			None => owned.insert(self.begin()),
		};
		let result = txn
			.bind(&self.id)
			.and_then(|()| self.apply_note_update(txn, note_hash, note));
		self.settle(owned, result).await
	}

	pub async fn update_nullifier_note_hash(
		&mut self,
		nullifier: Nullifier,
		note_hash: NoteHash,
		scope: Option<&mut LedgerTransaction>,
	) -> Result<(), LedgerError> {
		let mut owned = None;
		let txn = match scope {
			Some(txn) => txn,
			None => owned.insert(self.begin()),
		};
		let result = txn.bind(&self.id).map(|()| {
			if self.indices.get_note_hash(&nullifier) != Some(note_hash) {
				self.write_nullifier(txn, nullifier, Some(note_hash));
			}
		});
		self.settle(owned, result).await
	}

	pub async fn delete_nullifier(
		&mut self,
		nullifier: Nullifier,
		scope: Option<&mut LedgerTransaction>,
	) -> Result<(), LedgerError> {
		let mut owned = None;
		let txn = match scope {
			Some(txn) => txn,
			None => owned.insert(self.begin()),
		};
		let result = txn.bind(&self.id).map(|()| {
			if self.indices.get_note_hash(&nullifier).is_some() {
				self.write_nullifier(txn, nullifier, None);
			}
		});
		self.settle(owned, result).await
	}

	fn apply_sync(
		&mut self,
		txn: &mut LedgerTransaction,
		transaction: &Transaction,
		decrypted_notes: &[DecryptedOutput],
		status: SyncStatus,
	) -> Result<(), LedgerError> {
		txn.bind(&self.id)?;
		let hash = transaction.hash();
		let existing = self.indices.get_transaction(&hash).cloned();

		let block_hash = status.block_hash();
		let submitted_sequence = existing
			.as_ref()
			.and_then(|record| record.submitted_sequence)
			.or(status.submitted_sequence());
		let is_removing = submitted_sequence.is_none() && block_hash.is_none();

		let record = TransactionRecord {
			transaction: transaction.clone(),
			block_hash,
			sequence: status.sequence(),
			submitted_sequence,
		};
		record.check()?;

		let changed = match &existing {
			None => true,
			Some(previous) => {
				previous.transaction != *transaction
					|| previous.block_hash != block_hash
					|| previous.submitted_sequence != submitted_sequence
			}
		};

		if changed {
			debug!(
				"Account {}: recording transaction {} as {:?}",
				self.id, hash, status
			);
			self.write_transaction(txn, hash, Some(record));

			// Notes already stored for this transaction follow it on or off the chain
			for note_hash in self.indices.notes_for_transaction(&hash) {
				if let Some(note) = self.indices.get_note(&note_hash) {
					let placement = self.placement_for(note)?;
					self.write_placement(txn, note_hash, Some(placement));
				}
			}
		}

		for output in decrypted_notes.iter().filter(|output| !output.for_spender) {
			if let Some(nullifier) = output.nullifier {
				if self.indices.get_note_hash(&nullifier) != Some(output.hash) {
					self.write_nullifier(txn, nullifier, Some(output.hash));
				}
			}

			// A note already spent by a known transaction stays spent
			let spent = self
				.indices
				.get_note(&output.hash)
				.is_some_and(|note| note.spent);
			let note = DecryptedNote {
				account_id: self.id.clone(),
				nullifier: output.nullifier,
				index: output.index,
				note: output.note.clone(),
				spent,
				transaction_hash: hash,
			};
			self.apply_note_update(txn, output.hash, note)?;
		}

		for spend in transaction.spends() {
			let Some(note_hash) = self.indices.get_note_hash(&spend.nullifier) else {
				continue;
			};
			let note = self.indices.get_note(&note_hash).cloned().ok_or_else(|| {
				LedgerError::Invariant(format!(
					"Nullifier {} spent by {} maps to unknown note {}",
					spend.nullifier, hash, note_hash
				))
			})?;

			if note.spent == is_removing {
				info!(
					"Account {}: note {} {} by transaction {}",
					self.id,
					note_hash,
					if is_removing { "unspent" } else { "spent" },
					hash
				);
			}
			self.apply_note_update(
				txn,
				note_hash,
				DecryptedNote {
					spent: !is_removing,
					..note
				},
			)?;
		}

		Ok(())
	}

	pub(super) fn apply_note_update(
		&mut self,
		txn: &mut LedgerTransaction,
		note_hash: NoteHash,
		note: DecryptedNote,
	) -> Result<(), LedgerError> {
		let placement = self.placement_for(&note)?;
		let existing = self.indices.get_note(&note_hash);

		if existing == Some(&note) && self.indices.placement(&note_hash) == Some(placement) {
			return Ok(());
		}

		// Value moves only when the spent flag flips. A note first seen as spent was never counted.
		let delta = match existing {
			Some(previous) if previous.spent == note.spent => 0,
			Some(_) if note.spent => -note.value(),
			Some(_) => note.value(),
			None if note.spent => 0,
			None => note.value(),
		};

		if delta != 0 {
			let balance = self.indices.unconfirmed_balance() + delta;
			self.write_balance(txn, balance);
		}
		self.write_note(txn, note_hash, note);
		self.write_placement(txn, note_hash, Some(placement));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::super::test_utils::*;
	use crate::primitives::{NoteHash, Nullifier};
	use crate::store::MemoryLedgerStore;
	use crate::wallet::account::{Account, Placement};
	use crate::wallet::types::{LedgerError, SyncStatus};
	use std::sync::Arc;

	const RECEIVED: NoteHash = NoteHash([1; 32]);
	const NULLIFIER: Nullifier = Nullifier([2; 32]);

	fn mined(block: u8, sequence: u32) -> SyncStatus {
		SyncStatus::Mined {
			block_hash: super::super::test_utils::block(block),
			sequence,
		}
	}

	/// Account holding one mined note of value 5 at sequence 10.
	async fn funded_account() -> (Account, Arc<MemoryLedgerStore>) {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store.clone());
		account
			.sync_transaction(
				&transaction(1, &[], &[RECEIVED]),
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(1, 10),
				None,
			)
			.await
			.expect("Failed syncing receive");
		(account, store)
	}

	#[tokio::test]
	async fn test_mined_receive_counts_towards_balance() {
		let (account, _) = funded_account().await;

		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert_eq!(account.get_balance(5, 12).confirmed, 0);
		assert_eq!(account.get_balance(11, 12).confirmed, 5);

		let record = account
			.get_transaction(&transaction(1, &[], &[]).hash)
			.expect("Missing record");
		assert_eq!(record.block_hash, Some(block(1)));
		assert_eq!(record.sequence, Some(10));
		assert_eq!(
			account.indices().placement(&RECEIVED),
			Some(Placement::Chain(10))
		);
		assert_eq!(account.indices().non_chain_notes().count(), 0);
	}

	#[tokio::test]
	async fn test_spend_then_reorg_restores_note() {
		let (mut account, _) = funded_account().await;
		let spend = transaction(2, &[NULLIFIER], &[]);

		account
			.sync_transaction(&spend, &[], mined(2, 11), None)
			.await
			.expect("Failed syncing spend");
		assert_eq!(account.get_unconfirmed_balance(), 0);
		assert!(account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unspent_notes().count(), 0);

		account
			.sync_transaction(&spend, &[], SyncStatus::Removed, None)
			.await
			.expect("Failed removing spend");
		assert!(!account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert!(account.get_transaction(&spend.hash).unwrap().is_removed());
	}

	#[tokio::test]
	async fn test_identical_observation_writes_nothing() {
		let (mut account, store) = funded_account().await;
		let commits = store.commit_count();

		account
			.sync_transaction(
				&transaction(1, &[], &[RECEIVED]),
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(1, 10),
				None,
			)
			.await
			.expect("Failed re-syncing receive");

		assert_eq!(store.commit_count(), commits);
		assert_eq!(account.get_unconfirmed_balance(), 5);
	}

	#[tokio::test]
	async fn test_pending_to_mined_moves_note_and_keeps_submitted_sequence() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store.clone());
		let receive = transaction(1, &[], &[RECEIVED]);
		let outputs = [output(RECEIVED, Some(NULLIFIER), 5)];

		account
			.sync_transaction(
				&receive,
				&outputs,
				SyncStatus::Pending {
					submitted_sequence: 7,
				},
				None,
			)
			.await
			.unwrap();
		assert_eq!(
			account.indices().placement(&RECEIVED),
			Some(Placement::NonChain)
		);
		assert_eq!(account.get_balance(0, 8).confirmed, 0);

		// mined without re-sending the notes
		account
			.sync_transaction(&receive, &[], mined(3, 8), None)
			.await
			.unwrap();

		let record = account.get_transaction(&receive.hash).unwrap();
		assert_eq!(record.submitted_sequence, Some(7));
		assert_eq!(record.sequence, Some(8));
		assert_eq!(
			account.indices().placement(&RECEIVED),
			Some(Placement::Chain(8))
		);
		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert_eq!(account.get_balance(9, 12).confirmed, 5);

		let persisted = store.snapshot("alice").await;
		assert_eq!(persisted.transactions[&receive.hash].sequence, Some(8));
	}

	#[tokio::test]
	async fn test_spender_notes_are_not_counted() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store);
		let change = NoteHash([3; 32]);
		let mut sent = output(NoteHash([4; 32]), None, 40);
		sent.for_spender = true;

		account
			.sync_transaction(
				&transaction(1, &[], &[change, sent.hash]),
				&[output(change, None, 2), sent],
				mined(1, 1),
				None,
			)
			.await
			.unwrap();

		assert_eq!(account.get_notes().count(), 1);
		assert_eq!(account.get_unconfirmed_balance(), 2);
	}

	#[tokio::test]
	async fn test_update_only_index_does_not_double_count() {
		let (mut account, _) = funded_account().await;
		let mut note = account.get_decrypted_note(&RECEIVED).unwrap().clone();
		note.index = Some(42);

		account
			.update_decrypted_note(RECEIVED, note, None)
			.await
			.expect("Failed updating note");

		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert_eq!(account.get_decrypted_note(&RECEIVED).unwrap().index, Some(42));
	}

	#[tokio::test]
	async fn test_dangling_nullifier_is_invariant_violation() {
		let (mut account, store) = funded_account().await;
		let dangling = Nullifier([9; 32]);
		account
			.update_nullifier_note_hash(dangling, NoteHash([8; 32]), None)
			.await
			.unwrap();
		let commits = store.commit_count();

		let result = account
			.sync_transaction(&transaction(5, &[dangling], &[]), &[], mined(5, 12), None)
			.await;

		assert!(matches!(result, Err(LedgerError::Invariant(_))));
		// the aborted call left neither memory nor store changed
		assert!(account.get_transaction(&transaction(5, &[], &[]).hash).is_none());
		assert_eq!(store.commit_count(), commits);
	}

	#[tokio::test]
	async fn test_failed_commit_rolls_back_indices() {
		let (mut account, store) = funded_account().await;
		store.fail_next_commit();

		let result = account
			.sync_transaction(&transaction(2, &[NULLIFIER], &[]), &[], mined(2, 11), None)
			.await;

		assert!(matches!(result, Err(LedgerError::Store(_))));
		assert!(!account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert!(account.get_transaction(&transaction(2, &[], &[]).hash).is_none());
		assert_eq!(store.snapshot("alice").await.unconfirmed_balance, 5);
	}

	#[tokio::test]
	async fn test_shared_scope_commits_once() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store.clone());
		let mut txn = account.begin();

		account
			.sync_transaction(
				&transaction(1, &[], &[RECEIVED]),
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(1, 10),
				Some(&mut txn),
			)
			.await
			.unwrap();
		account
			.sync_transaction(
				&transaction(2, &[NULLIFIER], &[]),
				&[],
				mined(2, 11),
				Some(&mut txn),
			)
			.await
			.unwrap();

		// visible in memory, not yet persisted
		assert_eq!(account.get_unconfirmed_balance(), 0);
		assert_eq!(store.commit_count(), 0);

		account.commit(txn).await.expect("Failed committing scope");
		assert_eq!(store.commit_count(), 1);
		let persisted = store.snapshot("alice").await;
		assert!(persisted.decrypted_notes[&RECEIVED].spent);
		assert_eq!(persisted.unconfirmed_balance, 0);
	}

	#[tokio::test]
	async fn test_aborted_scope_restores_indices() {
		let (mut account, store) = funded_account().await;
		let mut txn = account.begin();

		account
			.sync_transaction(
				&transaction(2, &[NULLIFIER], &[]),
				&[],
				mined(2, 11),
				Some(&mut txn),
			)
			.await
			.unwrap();
		assert_eq!(account.get_unconfirmed_balance(), 0);

		account.abort(txn);
		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert!(!account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(store.snapshot("alice").await.unconfirmed_balance, 5);
	}
}
