//!
//! Utility module for the ledger sync service.
//!
//! Re-exports formatting helpers used when logging balances.
/// Utility functions for formatting and display
pub mod index;

pub use index::format_token_amount;
