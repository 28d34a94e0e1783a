//! Value types for notes and transactions.
//!
//! These are the already-decrypted, already-verified shapes the ledger consumes. Nothing in
//! here performs cryptography: hashes and nullifiers are carried as opaque 32-byte values and
//! rendered as lowercase hex wherever they are serialized.

/// Hash and nullifier newtypes
mod hashes;
/// Notes and transactions
mod types;

pub use hashes::*;
pub use types::*;

/// Fractional digits of the native token's base unit
pub const NATIVE_TOKEN_DECIMALS: u32 = 8;
