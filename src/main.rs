use rand::Rng;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::keypair::keypair_from_seed;
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tracing::{error, info, warn};

use solana_stake_sync::config::{wallet_keypair_from_env, EngineConfig};
use solana_stake_sync::ledger::RpcLedgerClient;
use solana_stake_sync::position::SnapshotReader;
use solana_stake_sync::sync::SyncService;
use solana_stake_sync::transaction::{CustodialSigner, TransactionOrchestrator, TOKEN_DECIMALS};
use solana_stake_sync::utils::format_token_amount;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("solana_stake_sync=debug".parse().unwrap())
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting stake sync engine");

	let config = match EngineConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Failed to load configuration: {}", e);
			return;
		}
	};

	let wallet = match wallet_keypair_from_env() {
		Ok(Some(keypair)) => keypair,
		Ok(None) => {
			info!("No wallet configured, generating a throwaway keypair");
			generate_throwaway_wallet()
		}
		Err(e) => {
			error!("Failed to load wallet key: {}", e);
			return;
		}
	};
	let owner = wallet.pubkey();
	info!("Wallet: {}", owner);

	let ledger = Arc::new(RpcLedgerClient::new(config.rpc_url.clone()));
	let reader = SnapshotReader::new(ledger.clone(), config.program_id, owner);
	info!("Watching position {}", reader.position_address());

	let sync_service = SyncService::start(reader, config.poll_interval);
	let mut snapshots = sync_service.subscribe();

	if snapshots.changed().await.is_err() {
		error!("Sync loop terminated before the first snapshot");
		return;
	}
	let snapshot = match snapshots.borrow().clone() {
		Some(snapshot) => snapshot,
		None => {
			error!("Sync loop published an empty snapshot");
			return;
		}
	};

	info!(
		"Wallet balance: {} SOL",
		format_token_amount(snapshot.wallet_balance, TOKEN_DECIMALS)
	);
	match &snapshot.position {
		Some(position) => info!(
			"Position: staked {} SOL, {} checkpointed points, {} claimable as of {}",
			format_token_amount(position.staked_amount, TOKEN_DECIMALS),
			position.total_points,
			snapshot.claimable_points,
			snapshot.as_of,
		),
		None => info!("Position not initialized yet"),
	}
	for soft_error in &snapshot.soft_errors {
		warn!("Degraded read: {}", soft_error);
	}

	let mut orchestrator =
		TransactionOrchestrator::new(ledger, Arc::new(wallet), config.program_id)
			.with_fee_buffer(config.fee_buffer)
			.with_confirm_timeout(config.confirm_timeout)
			.with_refresh_handle(sync_service.refresh_handle());

	match CustodialSigner::from_env() {
		Ok(Some(custodian)) => {
			info!("Custodial payout signer: {}", custodian.pubkey());
			orchestrator = orchestrator.with_custodian(custodian);
		}
		Ok(None) => info!("No custodial signer configured, claims are disabled"),
		Err(e) => {
			error!("Failed to load custodial key: {}", e);
			return;
		}
	}

	if let Ok(raw) = std::env::var("STAKE_DEMO_LAMPORTS") {
		let amount: u64 = match raw.trim().parse() {
			Ok(amount) => amount,
			Err(e) => {
				error!("Invalid STAKE_DEMO_LAMPORTS: {}", e);
				return;
			}
		};

		info!(
			"Staking {} SOL",
			format_token_amount(amount, TOKEN_DECIMALS)
		);
		match orchestrator.stake(&snapshot, amount).await {
			Ok(signature) => {
				info!("Stake confirmed: {}", signature);

				// The confirmation forced a refresh; wait for it to land.
				if snapshots.changed().await.is_ok() {
					if let Some(refreshed) = snapshots.borrow().clone() {
						info!(
							"Refreshed snapshot: staked {:?}, {} claimable points",
							refreshed.position.as_ref().map(|p| p.staked_amount),
							refreshed.claimable_points,
						);
					}
				}
			}
			Err(e) => {
				error!("Stake failed: {}", e);
			}
		}
	}

	sync_service.stop().await;
	info!("Stake sync engine stopped");
}

fn generate_throwaway_wallet() -> Keypair {
	let mut seed = [0u8; 32];
	rand::rng().fill(&mut seed);
	keypair_from_seed(&seed).expect("Failed to derive keypair from random seed")
}
