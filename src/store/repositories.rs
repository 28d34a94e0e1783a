use crate::primitives::{NoteHash, Nullifier, TransactionHash};
use crate::store::StoreError;
use crate::store::batch::{AccountRecords, StoreTransaction, stream_records};
use crate::wallet::types::{DecryptedNote, TransactionRecord};

use futures::stream::BoxStream;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Durable storage for account ledgers
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
	/// Stream every persisted note of the account. Each call starts a new pass.
	fn load_decrypted_notes<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(NoteHash, DecryptedNote), StoreError>>;

	fn load_nullifier_to_note_hash<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(Nullifier, NoteHash), StoreError>>;

	fn load_transactions<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(TransactionHash, TransactionRecord), StoreError>>;

	async fn get_unconfirmed_balance(&self, account_id: &str) -> Result<i128, StoreError>;

	/// Apply every write in `transaction`, or none of them.
	async fn commit(&self, transaction: StoreTransaction) -> Result<(), StoreError>;
}

/// File-based implementation of LedgerStore.
///
/// Each account lives in one bincode snapshot plus a small JSON metadata sidecar. A commit
/// rewrites the snapshot through a temporary file and a rename, so readers only ever observe a
/// complete batch.
pub struct FileLedgerStore {
	data_dir: PathBuf,
	/// Serializes commits so two batches never interleave their read-modify-write.
	write_lock: Mutex<()>,
}

impl FileLedgerStore {
	pub fn new(data_dir: PathBuf) -> Self {
		Self {
			data_dir,
			write_lock: Mutex::new(()),
		}
	}

	/// Create the data directory if needed.
	pub async fn open(data_dir: PathBuf) -> Result<Self, StoreError> {
		tokio::fs::create_dir_all(&data_dir).await?;
		Ok(Self::new(data_dir))
	}

	fn get_account_filename(&self, account_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("account_{}.bin", hex::encode(account_id.as_bytes())))
	}

	fn get_metadata_filename(&self, account_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("account_{}.meta.json", hex::encode(account_id.as_bytes())))
	}

	async fn read_records(&self, account_id: &str) -> Result<AccountRecords, StoreError> {
		let filename = self.get_account_filename(account_id);
		if !tokio::fs::try_exists(&filename).await? {
			return Ok(AccountRecords::default());
		}

		let bytes = tokio::fs::read(&filename).await?;
		let records: AccountRecords = bincode::deserialize(&bytes)?;
		Ok(records)
	}

	async fn write_records(
		&self,
		account_id: &str,
		records: &AccountRecords,
	) -> Result<(), StoreError> {
		let bytes = bincode::serialize(records)?;

		let filename = self.get_account_filename(account_id);
		let temp_filename = filename.with_extension("bin.tmp");
		tokio::fs::write(&temp_filename, &bytes).await?;
		tokio::fs::rename(&temp_filename, &filename).await?;

		let metadata = serde_json::json!({
			"account_id": account_id,
			"updated_at": chrono::Utc::now().to_rfc3339(),
			"notes": records.decrypted_notes.len(),
			"transactions": records.transactions.len(),
			"unconfirmed_balance": records.unconfirmed_balance.to_string(),
		});
		tokio::fs::write(
			self.get_metadata_filename(account_id),
			serde_json::to_string_pretty(&metadata)?,
		)
		.await?;

		Ok(())
	}
}

#[async_trait::async_trait]
impl LedgerStore for FileLedgerStore {
	fn load_decrypted_notes<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(NoteHash, DecryptedNote), StoreError>> {
		stream_records(self.read_records(account_id), |records| {
			records.decrypted_notes
		})
	}

	fn load_nullifier_to_note_hash<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(Nullifier, NoteHash), StoreError>> {
		stream_records(self.read_records(account_id), |records| {
			records.nullifier_to_note_hash
		})
	}

	fn load_transactions<'a>(
		&'a self,
		account_id: &'a str,
	) -> BoxStream<'a, Result<(TransactionHash, TransactionRecord), StoreError>> {
		stream_records(self.read_records(account_id), |records| records.transactions)
	}

	async fn get_unconfirmed_balance(&self, account_id: &str) -> Result<i128, StoreError> {
		Ok(self.read_records(account_id).await?.unconfirmed_balance)
	}

	async fn commit(&self, transaction: StoreTransaction) -> Result<(), StoreError> {
		let _guard = self.write_lock.lock().await;

		let account_ids: Vec<String> = transaction
			.account_ids()
			.into_iter()
			.map(str::to_string)
			.collect();
		let ops = transaction.into_ops();

		// Stage every touched account before writing any of them
		let mut staged = Vec::with_capacity(account_ids.len());
		for account_id in account_ids {
			let mut records = self.read_records(&account_id).await?;
			for op in ops.iter().filter(|op| op.account_id() == account_id) {
				records.apply(op.clone());
			}
			staged.push((account_id, records));
		}

		for (account_id, records) in &staged {
			self.write_records(account_id, records).await?;
			debug!(
				"Committed {} ops for account {}",
				ops.iter()
					.filter(|op| op.account_id() == account_id.as_str())
					.count(),
				account_id
			);
		}

		info!(
			"Committed {} ops across {} accounts to {:?}",
			ops.len(),
			staged.len(),
			self.data_dir
		);
		Ok(())
	}
}
