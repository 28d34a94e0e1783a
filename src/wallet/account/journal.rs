//! Atomic scopes spanning the in-memory indices and the store.
//!
//! A [`LedgerTransaction`] pairs the staged store writes with an undo journal of every index slot
//! the engine overwrote. Committing hands the store writes to the backend; aborting, or a failed
//! commit, replays the journal backwards so the indices match the store again.

use super::indices::{LedgerIndices, Placement};
use crate::primitives::{NoteHash, Nullifier, TransactionHash};
use crate::store::StoreTransaction;
use crate::wallet::types::{AccountId, DecryptedNote, LedgerError, TransactionRecord};

/// Previous value of one index slot.
#[derive(Debug, Clone)]
pub(crate) enum UndoOp {
	Note {
		hash: NoteHash,
		previous: Option<DecryptedNote>,
	},
	Placement {
		hash: NoteHash,
		previous: Option<Placement>,
	},
	Nullifier {
		nullifier: Nullifier,
		previous: Option<NoteHash>,
	},
	Transaction {
		hash: TransactionHash,
		previous: Option<TransactionRecord>,
	},
	Balance {
		previous: i128,
	},
}

impl UndoOp {
	fn revert(self, indices: &mut LedgerIndices) {
		match self {
			UndoOp::Note { hash, previous } => {
				indices.set_note(hash, previous);
			}
			UndoOp::Placement { hash, previous } => {
				indices.set_placement(hash, previous);
			}
			UndoOp::Nullifier {
				nullifier,
				previous,
			} => {
				indices.set_nullifier(nullifier, previous);
			}
			UndoOp::Transaction { hash, previous } => {
				indices.set_transaction(hash, previous);
			}
			UndoOp::Balance { previous } => {
				indices.set_unconfirmed_balance(previous);
			}
		}
	}
}

/// An open atomic scope over one account's ledger.
///
/// Obtain one from [`Account::begin`](super::Account::begin), pass it to any number of mutating
/// calls, then finish it with [`Account::commit`](super::Account::commit) or
/// [`Account::abort`](super::Account::abort). A scope belongs to the first account that writes
/// through it.
#[derive(Debug, Default)]
pub struct LedgerTransaction {
	account_id: Option<AccountId>,
	pub(crate) store: StoreTransaction,
	journal: Vec<UndoOp>,
}

impl LedgerTransaction {
	pub fn new() -> Self {
		Self::default()
	}

	/// Tie the scope to `account_id`, rejecting use from another account.
	pub(crate) fn bind(&mut self, account_id: &str) -> Result<(), LedgerError> {
		match &self.account_id {
			Some(bound) if bound != account_id => Err(LedgerError::ScopeError(format!(
				"Scope opened for account {} used by account {}",
				bound, account_id
			))),
			Some(_) => Ok(()),
			None => {
				self.account_id = Some(account_id.to_string());
				Ok(())
			}
		}
	}

	pub(crate) fn record(&mut self, op: UndoOp) {
		self.journal.push(op);
	}

	pub(crate) fn into_parts(self) -> (StoreTransaction, Journal) {
		(self.store, Journal(self.journal))
	}
}

/// Undo entries of a finished scope, newest last.
pub(crate) struct Journal(Vec<UndoOp>);

impl Journal {
	pub(crate) fn len(&self) -> usize {
		self.0.len()
	}

	pub(crate) fn rollback(self, indices: &mut LedgerIndices) {
		for op in self.0.into_iter().rev() {
			op.revert(indices);
		}
	}
}
