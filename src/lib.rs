//! Account-local ledger index for a shielded wallet.
//!
//! The [`wallet::Account`] engine keeps decrypted notes, nullifiers and transaction records for
//! one account in memory, mirrors every change into a [`store::LedgerStore`] and answers balance
//! queries. The [`feed`] and [`wallet::sync`] modules drive it from a stream of observed
//! transactions.

pub mod feed;
pub mod primitives;
pub mod store;
pub mod utils;
pub mod wallet;
