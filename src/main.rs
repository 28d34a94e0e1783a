use shielded_ledger_sync::feed::FeedReader;
use shielded_ledger_sync::primitives::{NATIVE_TOKEN_DECIMALS, PublicAddress};
use shielded_ledger_sync::store::FileLedgerStore;
use shielded_ledger_sync::utils::format_token_amount;
use shielded_ledger_sync::wallet::{
	Account, AccountKeys, AccountSyncOrchestrator, AccountValue, SyncConfig, generate_account_id,
};

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting ledger sync service");
	let config = SyncConfig::from_env();

	let store = match FileLedgerStore::open(config.data_dir.clone()).await {
		Ok(store) => Arc::new(store),
		Err(e) => {
			error!("Failed to open ledger store at {:?}: {}", config.data_dir, e);
			return;
		}
	};

	let id = config
		.account_name
		.clone()
		.unwrap_or_else(generate_account_id);
	let mut account = Account::new(
		AccountValue {
			id: id.clone(),
			name: config
				.account_name
				.clone()
				.unwrap_or_else(|| "default".to_string()),
			keys: AccountKeys::default(),
			public_address: PublicAddress::default(),
		},
		store,
	);

	if let Err(e) = account.load().await {
		error!("Failed to load account {}: {}", id, e);
		return;
	}
	info!(
		"Loaded account {} with unconfirmed balance {}",
		id,
		format_token_amount(account.get_unconfirmed_balance(), NATIVE_TOKEN_DECIMALS)
	);

	let feed = FeedReader::new(config.feed_path.clone());
	let mut orchestrator = AccountSyncOrchestrator::new(Arc::new(Mutex::new(account)), config);

	match orchestrator.sync(feed.events()).await {
		Ok(stats) => info!("{}", stats.summary()),
		Err(e) => error!("Failed to sync account {}: {}", id, e),
	}

	let balance = orchestrator.get_current_balance().await;
	info!(
		"Final balance: {} confirmed, {} unconfirmed",
		format_token_amount(balance.confirmed, NATIVE_TOKEN_DECIMALS),
		format_token_amount(balance.unconfirmed, NATIVE_TOKEN_DECIMALS)
	);
}
