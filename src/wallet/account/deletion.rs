use super::{Account, LedgerTransaction};
use crate::primitives::{Nullifier, Spend, Transaction, TransactionHash};
use crate::wallet::types::{DecryptedNote, LedgerError};

use tracing::info;

impl Account {
	/// Permanently forget `transaction`, the notes it created for this account and their
	/// nullifiers.
	///
	/// Notes the transaction spent become unspent again. Meant for transactions the wallet has
	/// given up on (expired past their horizon); reorgs go through
	/// [`Account::sync_transaction`] with [`SyncStatus::Removed`](crate::wallet::SyncStatus).
	pub async fn delete_transaction(
		&mut self,
		transaction: &Transaction,
		scope: Option<&mut LedgerTransaction>,
	) -> Result<(), LedgerError> {
		let mut owned = None;
		let txn = match scope {
			Some(txn) => txn,
			None => owned.insert(self.begin()),
		};
		let result = self.apply_delete(txn, transaction);
		self.settle(owned, result).await
	}

	fn apply_delete(
		&mut self,
		txn: &mut LedgerTransaction,
		transaction: &Transaction,
	) -> Result<(), LedgerError> {
		txn.bind(&self.id)?;
		let hash = transaction.hash();

		// A removed record's spends were already released when it left the chain
		let holds_spends = self
			.indices
			.get_transaction(&hash)
			.is_some_and(|record| !record.is_removed());

		let released: &[Spend] = if holds_spends {
			transaction.spends()
		} else {
			&[]
		};

		// Release what this transaction was spending unless a live transaction spends it too
		for spend in released {
			if self.live_spenders(&spend.nullifier, &hash) > 0 {
				continue;
			}
			let Some(note_hash) = self.indices.get_note_hash(&spend.nullifier) else {
				continue;
			};
			let note = self.indices.get_note(&note_hash).cloned().ok_or_else(|| {
				LedgerError::Invariant(format!(
					"Nullifier {} spent by {} maps to unknown note {}",
					spend.nullifier, hash, note_hash
				))
			})?;
			if note.spent && note.transaction_hash != hash {
				self.apply_note_update(
					txn,
					note_hash,
					DecryptedNote {
						spent: false,
						..note
					},
				)?;
			}
		}

		let mut owned_notes = self.indices.notes_for_transaction(&hash);
		for note_hash in transaction.notes() {
			if !owned_notes.contains(note_hash)
				&& self
					.indices
					.get_note(note_hash)
					.is_some_and(|note| note.transaction_hash == hash)
			{
				owned_notes.push(*note_hash);
			}
		}

		for note_hash in &owned_notes {
			let Some(note) = self.indices.get_note(note_hash).cloned() else {
				continue;
			};

			if note.spent {
				if let Some(nullifier) = note.nullifier {
					self.check_single_spender(&nullifier, &hash)?;
				}
				self.apply_note_update(
					txn,
					*note_hash,
					DecryptedNote {
						spent: false,
						..note.clone()
					},
				)?;
			}

			// The note is unspent at this point, so its value leaves the balance with it
			let balance = self.indices.unconfirmed_balance() - note.value();
			self.write_balance(txn, balance);
			self.remove_note(txn, *note_hash);

			if let Some(nullifier) = note.nullifier {
				if self.indices.get_note_hash(&nullifier) == Some(*note_hash) {
					self.write_nullifier(txn, nullifier, None);
				}
			}
		}

		if self.indices.get_transaction(&hash).is_some() {
			self.write_transaction(txn, hash, None);
		}

		info!(
			"Account {}: deleted transaction {} and {} owned notes",
			self.id,
			hash,
			owned_notes.len()
		);
		Ok(())
	}

	/// Transactions other than `excluding` that spend `nullifier` and are still pending or mined.
	fn live_spenders(&self, nullifier: &Nullifier, excluding: &TransactionHash) -> usize {
		self.indices
			.transactions()
			.filter(|record| record.hash() != *excluding && !record.is_removed())
			.filter(|record| {
				record
					.transaction
					.spends()
					.iter()
					.any(|spend| spend.nullifier == *nullifier)
			})
			.count()
	}

	/// A nullifier can only ever be published once, so at most one live transaction spends it.
	fn check_single_spender(
		&self,
		nullifier: &Nullifier,
		excluding: &TransactionHash,
	) -> Result<(), LedgerError> {
		let spenders = self.live_spenders(nullifier, excluding);

		if spenders > 1 {
			return Err(LedgerError::Invariant(format!(
				"Nullifier {} is spent by {} transactions",
				nullifier, spenders
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::super::test_utils::*;
	use crate::primitives::{NoteHash, Nullifier, Transaction};
	use crate::store::MemoryLedgerStore;
	use crate::wallet::account::Account;
	use crate::wallet::types::{LedgerError, SyncStatus};
	use std::sync::Arc;

	const RECEIVED: NoteHash = NoteHash([1; 32]);
	const NULLIFIER: Nullifier = Nullifier([2; 32]);

	fn mined(sequence: u32) -> SyncStatus {
		SyncStatus::Mined {
			block_hash: block(sequence as u8),
			sequence,
		}
	}

	#[tokio::test]
	async fn test_delete_after_reorg_removes_note() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store.clone());
		let receive = transaction(1, &[], &[RECEIVED]);
		let spend = transaction(2, &[NULLIFIER], &[]);

		account
			.sync_transaction(
				&receive,
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(10),
				None,
			)
			.await
			.unwrap();
		account
			.sync_transaction(&spend, &[], mined(11), None)
			.await
			.unwrap();
		account
			.sync_transaction(&spend, &[], SyncStatus::Removed, None)
			.await
			.unwrap();
		assert_eq!(account.get_unconfirmed_balance(), 5);

		account
			.delete_transaction(&receive, None)
			.await
			.expect("Failed deleting receive");

		assert!(account.get_decrypted_note(&RECEIVED).is_none());
		assert_eq!(account.get_note_hash(&NULLIFIER), None);
		assert!(account.get_transaction(&receive.hash).is_none());
		assert_eq!(account.get_unconfirmed_balance(), 0);
		assert_eq!(account.indices().notes_in_sequences(0..100).count(), 0);

		let persisted = store.snapshot("alice").await;
		assert!(persisted.decrypted_notes.is_empty());
		assert!(persisted.nullifier_to_note_hash.is_empty());
		assert!(!persisted.transactions.contains_key(&receive.hash));
		assert_eq!(persisted.unconfirmed_balance, 0);
	}

	#[tokio::test]
	async fn test_delete_spent_note_keeps_balance_consistent() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store);
		let receive = transaction(1, &[], &[RECEIVED]);
		let other = NoteHash([3; 32]);

		account
			.sync_transaction(
				&receive,
				&[
					output(RECEIVED, Some(NULLIFIER), 5),
					output(other, Some(Nullifier([4; 32])), 7),
				],
				mined(10),
				None,
			)
			.await
			.unwrap();
		account
			.sync_transaction(&transaction(2, &[NULLIFIER], &[]), &[], mined(11), None)
			.await
			.unwrap();
		assert_eq!(account.get_unconfirmed_balance(), 7);

		account.delete_transaction(&receive, None).await.unwrap();

		assert_eq!(account.get_notes().count(), 0);
		assert_eq!(account.get_unconfirmed_balance(), 0);
	}

	#[tokio::test]
	async fn test_delete_spender_releases_notes() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store);
		let spend = transaction(2, &[NULLIFIER], &[]);

		account
			.sync_transaction(
				&transaction(1, &[], &[RECEIVED]),
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(10),
				None,
			)
			.await
			.unwrap();
		account
			.sync_transaction(
				&spend,
				&[],
				SyncStatus::Pending {
					submitted_sequence: 11,
				},
				None,
			)
			.await
			.unwrap();
		assert_eq!(account.get_unconfirmed_balance(), 0);

		account.delete_transaction(&spend, None).await.unwrap();

		assert!(!account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unconfirmed_balance(), 5);
		assert!(!account.has_transaction(&spend.hash));
	}

	/// Receive mined at 10, spent at 11, that spend reorged away and the note spent again at 12.
	async fn respent_after_reorg() -> (Account, Transaction, Transaction) {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store);
		let receive = transaction(1, &[], &[RECEIVED]);
		let reorged = transaction(2, &[NULLIFIER], &[]);

		account
			.sync_transaction(
				&receive,
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(10),
				None,
			)
			.await
			.unwrap();
		account
			.sync_transaction(&reorged, &[], mined(11), None)
			.await
			.unwrap();
		account
			.sync_transaction(&reorged, &[], SyncStatus::Removed, None)
			.await
			.unwrap();
		account
			.sync_transaction(&transaction(3, &[NULLIFIER], &[]), &[], mined(12), None)
			.await
			.unwrap();
		assert!(account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unconfirmed_balance(), 0);

		(account, receive, reorged)
	}

	#[tokio::test]
	async fn test_delete_removed_spender_keeps_note_spent() {
		let (mut account, _, reorged) = respent_after_reorg().await;

		account.delete_transaction(&reorged, None).await.unwrap();

		assert!(!account.has_transaction(&reorged.hash));
		assert!(account.get_decrypted_note(&RECEIVED).unwrap().spent);
		assert_eq!(account.get_unconfirmed_balance(), 0);
	}

	#[tokio::test]
	async fn test_delete_receive_ignores_removed_spender() {
		let (mut account, receive, _) = respent_after_reorg().await;

		account
			.delete_transaction(&receive, None)
			.await
			.expect("Removed spender should not count as a second spend");

		assert!(account.get_decrypted_note(&RECEIVED).is_none());
		assert_eq!(account.get_note_hash(&NULLIFIER), None);
		assert_eq!(account.get_unconfirmed_balance(), 0);
	}

	#[tokio::test]
	async fn test_double_spent_nullifier_is_rejected() {
		let store = Arc::new(MemoryLedgerStore::new());
		let mut account = account(store);
		let receive = transaction(1, &[], &[RECEIVED]);

		account
			.sync_transaction(
				&receive,
				&[output(RECEIVED, Some(NULLIFIER), 5)],
				mined(10),
				None,
			)
			.await
			.unwrap();
		for n in [2, 3] {
			account
				.sync_transaction(&transaction(n, &[NULLIFIER], &[]), &[], mined(11), None)
				.await
				.unwrap();
		}

		let result = account.delete_transaction(&receive, None).await;
		assert!(matches!(result, Err(LedgerError::Invariant(_))));
		assert!(account.get_decrypted_note(&RECEIVED).is_some());
		assert!(account.has_transaction(&receive.hash));
	}
}
