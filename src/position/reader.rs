use crate::ledger::LedgerClient;
use crate::position::accrual::accrue;
use crate::position::codec::StakePosition;
use crate::position::derive_position_address;

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Point-in-time view of one wallet's staking state.
///
/// Rebuilt wholesale on every poll and replaced atomically by the sync
/// loop; nothing mutates a published snapshot in place.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
	/// Last decoded position, or `None` while the position account does not
	/// exist (or cannot be decoded as one).
	pub position: Option<StakePosition>,
	/// Wallet balance in smallest units, fetched independently of the
	/// position.
	pub wallet_balance: u64,
	/// Checkpointed points plus points accrued since the checkpoint,
	/// computed locally. Never persisted remotely.
	pub claimable_points: u64,
	/// When this snapshot was computed. Display only.
	pub as_of: DateTime<Utc>,
	/// Reads that degraded to a default this round (transient RPC
	/// failures). Empty on a fully healthy read.
	pub soft_errors: Vec<String>,
}

/// Reads authoritative remote state and produces [`LiveSnapshot`]s.
#[derive(Clone)]
pub struct SnapshotReader {
	ledger: Arc<dyn LedgerClient>,
	owner: Pubkey,
	position_address: Pubkey,
}

impl SnapshotReader {
	/// Create a reader for `owner`'s position under `program_id`.
	pub fn new(ledger: Arc<dyn LedgerClient>, program_id: Pubkey, owner: Pubkey) -> Self {
		let (position_address, _bump) = derive_position_address(&program_id, &owner);
		Self {
			ledger,
			owner,
			position_address,
		}
	}

	/// The wallet this reader watches.
	pub fn owner(&self) -> Pubkey {
		self.owner
	}

	/// The derived position address this reader watches.
	pub fn position_address(&self) -> Pubkey {
		self.position_address
	}

	/// Fetch position and wallet balance, fold in live accrual, and return
	/// a consistent snapshot.
	///
	/// Infallible by design: the two fetches run concurrently and each
	/// degrades independently (absent position, zero balance) with the
	/// failure recorded in `soft_errors`. A missing or undecodable position
	/// account is not an error at all — it reads as "not yet initialized".
	pub async fn read_snapshot(&self) -> LiveSnapshot {
		let (account, balance) = tokio::join!(
			self.ledger.account_data(&self.position_address),
			self.ledger.balance(&self.owner),
		);

		let mut soft_errors = Vec::new();

		let position = match account {
			Ok(Some(bytes)) => match StakePosition::decode(&bytes) {
				Ok(position) => Some(position),
				Err(e) => {
					debug!(
						"Position account {} not decodable ({}), treating as uninitialized",
						self.position_address, e
					);
					None
				}
			},
			Ok(None) => None,
			Err(e) => {
				warn!("Position read failed: {}", e);
				soft_errors.push(format!("position read failed: {e}"));
				None
			}
		};

		let wallet_balance = match balance {
			Ok(lamports) => lamports,
			Err(e) => {
				warn!("Balance read failed: {}", e);
				soft_errors.push(format!("balance read failed: {e}"));
				0
			}
		};

		let now = Utc::now().timestamp().max(0) as u64;
		let claimable_points = position
			.as_ref()
			.map(|p| accrue(p.staked_amount, p.last_updated_time, p.total_points, now))
			.unwrap_or(0);

		LiveSnapshot {
			position,
			wallet_balance,
			claimable_points,
			as_of: Utc::now(),
			soft_errors,
		}
	}
}
