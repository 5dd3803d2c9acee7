//! Staking instruction builders
//!
//! This module assembles the four program instructions and the custodial
//! payout transfer with the exact account lists and argument encoding the
//! remote program expects. Argument encoding is an 8-byte instruction
//! discriminator followed by a little-endian `u64` where an amount exists.

use crate::position::derive_position_address;

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

/// SHA-256 prefix of `"global:initialize"`.
pub const INITIALIZE_DISCRIMINATOR: [u8; 8] = [0xaf, 0xaf, 0x6d, 0x1f, 0x0d, 0x98, 0x9b, 0xed];
/// SHA-256 prefix of `"global:stake"`.
pub const STAKE_DISCRIMINATOR: [u8; 8] = [0xce, 0xb0, 0xca, 0x12, 0xc8, 0xd1, 0xb3, 0x6c];
/// SHA-256 prefix of `"global:unstake"`.
pub const UNSTAKE_DISCRIMINATOR: [u8; 8] = [0x5a, 0x5f, 0x6b, 0x2a, 0xcd, 0x7c, 0x32, 0xe1];
/// SHA-256 prefix of `"global:claim"`.
pub const CLAIM_DISCRIMINATOR: [u8; 8] = [0x3e, 0xc6, 0xd6, 0xc1, 0xd5, 0x9f, 0x6c, 0xd2];

/// Builder for the staking program's instructions.
///
/// Holds the program identity; every account list references the position
/// through the shared address derivation.
#[derive(Debug, Clone)]
pub struct StakeInstructionBuilder {
	program_id: Pubkey,
}

impl StakeInstructionBuilder {
	/// Creates a builder for `program_id`
	pub fn new(program_id: Pubkey) -> Self {
		Self { program_id }
	}

	/// Create the position account for `owner`.
	///
	/// Accounts:
	/// 0. `[signer, writable]` — payer, who must also be the owner-to-be
	/// 1. `[writable]`         — derived position address (to be created)
	/// 2. `[]`                 — system allocator
	pub fn initialize(&self, owner: &Pubkey) -> Instruction {
		let (position, _bump) = derive_position_address(&self.program_id, owner);
		log::info!("Building initialize for position {position}");

		Instruction::new_with_bytes(
			self.program_id,
			&INITIALIZE_DISCRIMINATOR,
			vec![
				AccountMeta::new(*owner, true),
				AccountMeta::new(position, false),
				AccountMeta::new_readonly(system_program::id(), false),
			],
		)
	}

	/// Stake `amount` smallest units.
	///
	/// Accounts:
	/// 0. `[signer, writable]` — user
	/// 1. `[writable]`         — derived position address
	/// 2. `[]`                 — system allocator
	pub fn stake(&self, owner: &Pubkey, amount: u64) -> Instruction {
		let (position, _bump) = derive_position_address(&self.program_id, owner);
		log::info!("Building stake of {amount} into position {position}");

		Instruction::new_with_bytes(
			self.program_id,
			&with_amount(STAKE_DISCRIMINATOR, amount),
			vec![
				AccountMeta::new(*owner, true),
				AccountMeta::new(position, false),
				AccountMeta::new_readonly(system_program::id(), false),
			],
		)
	}

	/// Unstake `amount` smallest units.
	///
	/// Same account list as [`StakeInstructionBuilder::stake`].
	pub fn unstake(&self, owner: &Pubkey, amount: u64) -> Instruction {
		let (position, _bump) = derive_position_address(&self.program_id, owner);
		log::info!("Building unstake of {amount} from position {position}");

		Instruction::new_with_bytes(
			self.program_id,
			&with_amount(UNSTAKE_DISCRIMINATOR, amount),
			vec![
				AccountMeta::new(*owner, true),
				AccountMeta::new(position, false),
				AccountMeta::new_readonly(system_program::id(), false),
			],
		)
	}

	/// Checkpoint and consume the accrued points.
	///
	/// Accounts:
	/// 0. `[signer, writable]` — user
	/// 1. `[writable]`         — derived position address
	pub fn claim(&self, owner: &Pubkey) -> Instruction {
		let (position, _bump) = derive_position_address(&self.program_id, owner);
		log::info!("Building claim for position {position}");

		Instruction::new_with_bytes(
			self.program_id,
			&CLAIM_DISCRIMINATOR,
			vec![
				AccountMeta::new(*owner, true),
				AccountMeta::new(position, false),
			],
		)
	}

	/// Payout transfer from the custodial balance to the user's wallet.
	///
	/// Not a program instruction: a plain system transfer, signed by the
	/// custodial key and submitted as its own transaction.
	pub fn payout(&self, custodian: &Pubkey, destination: &Pubkey, lamports: u64) -> Instruction {
		log::info!("Building payout of {lamports} lamports to {destination}");
		solana_system_interface::instruction::transfer(custodian, destination, lamports)
	}
}

fn with_amount(discriminator: [u8; 8], amount: u64) -> Vec<u8> {
	let mut data = Vec::with_capacity(16);
	data.extend_from_slice(&discriminator);
	data.extend_from_slice(&amount.to_le_bytes());
	data
}
