//! Accounts, their ledger engine and the sync driver that feeds them.

pub mod account;
pub mod sync;
pub mod types;

pub use account::{Account, LedgerTransaction};
pub use sync::{AccountSyncOrchestrator, SyncConfig};
pub use types::*;

use rand::Rng;

/// Random identifier for a new account.
pub fn generate_account_id() -> AccountId {
	let mut id = [0u8; 16];
	rand::rng().fill(&mut id);
	hex::encode(id)
}
