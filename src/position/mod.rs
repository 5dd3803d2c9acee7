//! Stake position state: wire codec, address derivation, reward accrual and
//! the remote state reader that folds them into a point-in-time snapshot.

/// Client-side reward accrual
pub mod accrual;
/// Fixed-layout account codec
pub mod codec;
/// Point-in-time snapshot reader
pub mod reader;

pub use codec::{DecodeError, StakePosition};
pub use reader::{LiveSnapshot, SnapshotReader};

use solana_sdk::pubkey::Pubkey;

/// Fixed textual seed of the position's derived address.
pub const POSITION_SEED: &[u8] = b"stake_position";

/// Derive the position address for `owner` under `program_id`.
///
/// Pure; every component that references the position (existence checks,
/// reads, transaction account lists) goes through this one derivation.
pub fn derive_position_address(program_id: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POSITION_SEED, owner.as_ref()], program_id)
}
