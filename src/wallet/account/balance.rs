//! Balance queries.
//!
//! The unconfirmed balance is maintained incrementally by the engine and read in O(1). The
//! confirmed balance is derived from it by subtracting unspent notes that are too recent or not on
//! chain at all, which only scans the recent sequence buckets and the non-chain set.

use super::Account;
use super::indices::LedgerIndices;
use crate::wallet::types::{Balance, DecryptedNote};

/// Half-open sequence range holding the notes that still lack `minimum_confirmations` blocks on
/// top of their own when the chain head is at `head_sequence`. The head block itself is included.
pub fn confirmation_range(head_sequence: u32, minimum_confirmations: u32) -> (u32, u32) {
	let end = head_sequence.saturating_add(1);
	(end.saturating_sub(minimum_confirmations), end)
}

/// Confirmed and unconfirmed balance for the notes in `indices`.
pub fn calculate_balance(
	indices: &LedgerIndices,
	confirmation_start_sequence: u32,
	head_sequence: u32,
) -> Balance {
	let unconfirmed = indices.unconfirmed_balance();

	let recent = sum_unspent(indices.notes_in_sequences(confirmation_start_sequence..head_sequence));
	let off_chain = sum_unspent(indices.non_chain_notes());

	Balance {
		unconfirmed,
		confirmed: unconfirmed - recent - off_chain,
	}
}

fn sum_unspent<'a>(notes: impl Iterator<Item = &'a DecryptedNote>) -> i128 {
	notes
		.filter(|note| !note.spent)
		.map(DecryptedNote::value)
		.sum()
}

impl Account {
	pub fn get_unconfirmed_balance(&self) -> i128 {
		self.indices.unconfirmed_balance()
	}

	/// Balance where notes mined in `[confirmation_start_sequence, head_sequence)` or not mined
	/// at all are excluded from the confirmed amount.
	pub fn get_balance(&self, confirmation_start_sequence: u32, head_sequence: u32) -> Balance {
		calculate_balance(&self.indices, confirmation_start_sequence, head_sequence)
	}
}
