//! In-memory indices over an account's notes, nullifiers and transactions.
//!
//! The indices are plain containers. They never consult the store and never decide anything on
//! their own: the account engine mutates them through the setters below and journals the previous
//! value of every slot it touches so a failed scope can be rolled back.

use crate::primitives::{NoteHash, Nullifier, TransactionHash};
use crate::wallet::types::{DecryptedNote, TransactionRecord};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

/// Where a note sits relative to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
	/// Owning transaction is mined at this sequence.
	Chain(u32),
	/// Owning transaction has no block hash.
	NonChain,
}

impl Placement {
	pub fn for_record(record: &TransactionRecord) -> Option<Self> {
		match (record.block_hash, record.sequence) {
			(Some(_), Some(sequence)) => Some(Placement::Chain(sequence)),
			(Some(_), None) => None,
			(None, _) => Some(Placement::NonChain),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct LedgerIndices {
	decrypted_notes: HashMap<NoteHash, DecryptedNote>,
	nullifier_to_note_hash: HashMap<Nullifier, NoteHash>,
	sequence_to_note_hashes: BTreeMap<u32, HashSet<NoteHash>>,
	/// Reverse of `sequence_to_note_hashes`, so a note can leave its bucket without a scan.
	note_hash_to_sequence: HashMap<NoteHash, u32>,
	non_chain_note_hashes: HashSet<NoteHash>,
	/// Notes grouped by owning transaction, kept in step with `decrypted_notes`.
	transaction_to_note_hashes: HashMap<TransactionHash, HashSet<NoteHash>>,
	transactions: HashMap<TransactionHash, TransactionRecord>,
	unconfirmed_balance: i128,
}

impl LedgerIndices {
	pub fn get_note(&self, hash: &NoteHash) -> Option<&DecryptedNote> {
		self.decrypted_notes.get(hash)
	}

	pub fn get_note_hash(&self, nullifier: &Nullifier) -> Option<NoteHash> {
		self.nullifier_to_note_hash.get(nullifier).copied()
	}

	pub fn get_transaction(&self, hash: &TransactionHash) -> Option<&TransactionRecord> {
		self.transactions.get(hash)
	}

	pub fn notes(&self) -> impl Iterator<Item = (&NoteHash, &DecryptedNote)> {
		self.decrypted_notes.iter()
	}

	pub fn unspent_notes(&self) -> impl Iterator<Item = (&NoteHash, &DecryptedNote)> {
		self.decrypted_notes.iter().filter(|(_, note)| !note.spent)
	}

	pub fn nullifiers(&self) -> impl Iterator<Item = (&Nullifier, &NoteHash)> {
		self.nullifier_to_note_hash.iter()
	}

	pub fn transactions(&self) -> impl Iterator<Item = &TransactionRecord> {
		self.transactions.values()
	}

	/// Notes whose owning transaction is `hash`.
	pub fn notes_for_transaction(&self, hash: &TransactionHash) -> Vec<NoteHash> {
		self.transaction_to_note_hashes
			.get(hash)
			.map(|hashes| hashes.iter().copied().collect())
			.unwrap_or_default()
	}

	/// Notes confirmed at a sequence within `range`.
	pub fn notes_in_sequences(&self, range: Range<u32>) -> impl Iterator<Item = &DecryptedNote> {
		// BTreeMap::range panics on an inverted range
		let range = range.start..range.end.max(range.start);
		self.sequence_to_note_hashes
			.range(range)
			.flat_map(|(_, hashes)| hashes.iter())
			.filter_map(|hash| self.decrypted_notes.get(hash))
	}

	pub fn non_chain_notes(&self) -> impl Iterator<Item = &DecryptedNote> {
		self.non_chain_note_hashes
			.iter()
			.filter_map(|hash| self.decrypted_notes.get(hash))
	}

	pub fn placement(&self, hash: &NoteHash) -> Option<Placement> {
		if let Some(sequence) = self.note_hash_to_sequence.get(hash) {
			return Some(Placement::Chain(*sequence));
		}
		self.non_chain_note_hashes
			.contains(hash)
			.then_some(Placement::NonChain)
	}

	pub fn unconfirmed_balance(&self) -> i128 {
		self.unconfirmed_balance
	}

	pub fn note_count(&self) -> usize {
		self.decrypted_notes.len()
	}

	pub fn transaction_count(&self) -> usize {
		self.transactions.len()
	}

	/// Set or remove a note, returning what was there before. Placement is left untouched.
	pub fn set_note(&mut self, hash: NoteHash, note: Option<DecryptedNote>) -> Option<DecryptedNote> {
		if let Some(note) = &note {
			self.transaction_to_note_hashes
				.entry(note.transaction_hash)
				.or_default()
				.insert(hash);
		}

		let previous = match note {
			Some(note) => self.decrypted_notes.insert(hash, note),
			None => self.decrypted_notes.remove(&hash),
		};

		if let Some(previous) = &previous {
			let moved = self
				.decrypted_notes
				.get(&hash)
				.is_none_or(|note| note.transaction_hash != previous.transaction_hash);
			if moved {
				let owner = previous.transaction_hash;
				if let Some(hashes) = self.transaction_to_note_hashes.get_mut(&owner) {
					hashes.remove(&hash);
					if hashes.is_empty() {
						self.transaction_to_note_hashes.remove(&owner);
					}
				}
			}
		}
		previous
	}

	pub fn set_nullifier(
		&mut self,
		nullifier: Nullifier,
		note_hash: Option<NoteHash>,
	) -> Option<NoteHash> {
		match note_hash {
			Some(note_hash) => self.nullifier_to_note_hash.insert(nullifier, note_hash),
			None => self.nullifier_to_note_hash.remove(&nullifier),
		}
	}

	pub fn set_transaction(
		&mut self,
		hash: TransactionHash,
		record: Option<TransactionRecord>,
	) -> Option<TransactionRecord> {
		match record {
			Some(record) => self.transactions.insert(hash, record),
			None => self.transactions.remove(&hash),
		}
	}

	/// Move a note between the sequence index and the non-chain set, returning its old placement.
	pub fn set_placement(&mut self, hash: NoteHash, placement: Option<Placement>) -> Option<Placement> {
		let previous = self.placement(&hash);
		if previous == placement {
			return previous;
		}

		match previous {
			Some(Placement::Chain(sequence)) => {
				self.note_hash_to_sequence.remove(&hash);
				if let Some(hashes) = self.sequence_to_note_hashes.get_mut(&sequence) {
					hashes.remove(&hash);
					if hashes.is_empty() {
						self.sequence_to_note_hashes.remove(&sequence);
					}
				}
			}
			Some(Placement::NonChain) => {
				self.non_chain_note_hashes.remove(&hash);
			}
			None => {}
		}

		match placement {
			Some(Placement::Chain(sequence)) => {
				self.note_hash_to_sequence.insert(hash, sequence);
				self.sequence_to_note_hashes
					.entry(sequence)
					.or_default()
					.insert(hash);
			}
			Some(Placement::NonChain) => {
				self.non_chain_note_hashes.insert(hash);
			}
			None => {}
		}

		previous
	}

	pub fn set_unconfirmed_balance(&mut self, balance: i128) -> i128 {
		std::mem::replace(&mut self.unconfirmed_balance, balance)
	}

	pub fn clear(&mut self) {
		*self = Self::default();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives::{Note, PublicAddress};

	fn note(value: u64, spent: bool) -> DecryptedNote {
		DecryptedNote {
			account_id: "account".to_string(),
			nullifier: None,
			index: None,
			note: Note::new(PublicAddress([7; 32]), value, ""),
			spent,
			transaction_hash: TransactionHash([1; 32]),
		}
	}

	#[test]
	fn test_placement_moves_between_indices() {
		let mut indices = LedgerIndices::default();
		let hash = NoteHash([1; 32]);
		indices.set_note(hash, Some(note(5, false)));

		assert_eq!(indices.set_placement(hash, Some(Placement::NonChain)), None);
		assert_eq!(indices.non_chain_notes().count(), 1);

		assert_eq!(
			indices.set_placement(hash, Some(Placement::Chain(10))),
			Some(Placement::NonChain)
		);
		assert_eq!(indices.non_chain_notes().count(), 0);
		assert_eq!(indices.notes_in_sequences(10..11).count(), 1);

		indices.set_placement(hash, Some(Placement::Chain(12)));
		assert_eq!(indices.notes_in_sequences(0..12).count(), 0);
		assert_eq!(indices.placement(&hash), Some(Placement::Chain(12)));

		indices.set_placement(hash, None);
		assert_eq!(indices.placement(&hash), None);
		assert!(indices.sequence_to_note_hashes.is_empty());
	}

	#[test]
	fn test_inverted_range_is_empty() {
		let mut indices = LedgerIndices::default();
		let hash = NoteHash([2; 32]);
		indices.set_note(hash, Some(note(1, false)));
		indices.set_placement(hash, Some(Placement::Chain(3)));
		assert_eq!(indices.notes_in_sequences(5..2).count(), 0);
	}

	#[test]
	fn test_notes_follow_owning_transaction() {
		let mut indices = LedgerIndices::default();
		let first = TransactionHash([1; 32]);
		let second = TransactionHash([2; 32]);
		let hash = NoteHash([3; 32]);

		indices.set_note(hash, Some(note(4, false)));
		indices.set_note(NoteHash([4; 32]), Some(note(6, false)));
		assert_eq!(indices.notes_for_transaction(&first).len(), 2);

		// updating in place keeps the note under its transaction
		indices.set_note(hash, Some(note(4, true)));
		assert_eq!(indices.notes_for_transaction(&first).len(), 2);

		let mut moved = note(4, false);
		moved.transaction_hash = second;
		indices.set_note(hash, Some(moved));
		assert_eq!(indices.notes_for_transaction(&first), vec![NoteHash([4; 32])]);
		assert_eq!(indices.notes_for_transaction(&second), vec![hash]);

		indices.set_note(hash, None);
		assert!(indices.notes_for_transaction(&second).is_empty());
		assert!(!indices.transaction_to_note_hashes.contains_key(&second));
	}

	#[test]
	fn test_unspent_notes_filters_spent() {
		let mut indices = LedgerIndices::default();
		indices.set_note(NoteHash([1; 32]), Some(note(1, false)));
		indices.set_note(NoteHash([2; 32]), Some(note(2, true)));
		assert_eq!(indices.unspent_notes().count(), 1);
		assert_eq!(indices.notes().count(), 2);
	}
}
