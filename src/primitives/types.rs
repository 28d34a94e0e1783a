use super::hashes::{NoteHash, Nullifier, PublicAddress, TransactionHash};
use serde::{Deserialize, Serialize};

/// Plaintext of a note once decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
	pub owner: PublicAddress,
	pub value: u64,
	#[serde(default)]
	pub memo: String,
}

impl Note {
	pub fn new(owner: PublicAddress, value: u64, memo: impl Into<String>) -> Self {
		Self {
			owner,
			value,
			memo: memo.into(),
		}
	}

	pub fn value(&self) -> u64 {
		self.value
	}
}

/// A spend inside a transaction, identified by the nullifier it publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spend {
	pub nullifier: Nullifier,
}

/// A transaction as seen by the wallet: its spends and the hashes of the notes it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub hash: TransactionHash,
	#[serde(default)]
	pub fee: u64,
	/// Sequence after which the transaction can no longer be mined. 0 means it never expires.
	#[serde(default)]
	pub expiration: u32,
	#[serde(default)]
	pub spends: Vec<Spend>,
	#[serde(default)]
	pub notes: Vec<NoteHash>,
}

impl Transaction {
	pub fn hash(&self) -> TransactionHash {
		self.hash
	}

	pub fn spends(&self) -> &[Spend] {
		&self.spends
	}

	pub fn notes(&self) -> &[NoteHash] {
		&self.notes
	}

	pub fn expiration(&self) -> u32 {
		self.expiration
	}
}

/// A note decrypted out of a transaction by one of the account's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedOutput {
	/// Position in the note tree, once known.
	#[serde(default)]
	pub index: Option<u64>,
	/// Only present when the account holds the spending key for the note.
	#[serde(default)]
	pub nullifier: Option<Nullifier>,
	pub hash: NoteHash,
	/// Decrypted with the outgoing view key, i.e. only visible because this account signed the spend.
	#[serde(default)]
	pub for_spender: bool,
	pub note: Note,
}
