//! Wire codec for the on-ledger stake position account.
//!
//! The remote program stores positions in a fixed positional layout with no
//! length prefixes or field tags; the layout below is the binding contract
//! and is decoded by hand rather than through a schema crate.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// 8-byte account-type discriminator (SHA-256 prefix of
/// `"account:StakePosition"`).
pub const POSITION_DISCRIMINATOR: [u8; 8] = [0x4e, 0xa5, 0x1e, 0x6f, 0xab, 0x7d, 0x0b, 0xdc];

/// Minimum serialized size of a position account.
pub const POSITION_MIN_LEN: usize = 65;

const OWNER_RANGE: core::ops::Range<usize> = 8..40;
const STAKED_AMOUNT_OFFSET: usize = 40;
const TOTAL_POINTS_OFFSET: usize = 48;
const LAST_UPDATED_OFFSET: usize = 56;
const BUMP_OFFSET: usize = 64;

/// Decoded stake position account.
///
/// Mutated only by the remote program; the client re-derives live accrual
/// from `last_updated_time` between checkpoints but never writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePosition {
    /// Wallet that owns the position.
    pub owner: Pubkey,
    /// Currently staked balance, in smallest units.
    pub staked_amount: u64,
    /// Points checkpointed by the remote program.
    pub total_points: u64,
    /// Unix timestamp (seconds) of the last remote checkpoint.
    pub last_updated_time: u64,
    /// Bump byte of the derived address, echoed back as-is.
    pub bump: u8,
}

/// Failure to decode raw account bytes into a [`StakePosition`].
///
/// Callers treat both variants as "position not yet initialized"; neither is
/// surfaced as a user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("account data truncated: {len} bytes, need at least {POSITION_MIN_LEN}")]
    Truncated { len: usize },

    #[error("account discriminator does not match a stake position")]
    SchemaMismatch,
}

impl StakePosition {
    /// Decode the fixed little-endian account layout.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < POSITION_MIN_LEN {
            return Err(DecodeError::Truncated { len: data.len() });
        }
        if data[..8] != POSITION_DISCRIMINATOR {
            return Err(DecodeError::SchemaMismatch);
        }

        let mut owner = [0u8; 32];
        owner.copy_from_slice(&data[OWNER_RANGE]);

        Ok(Self {
            owner: Pubkey::new_from_array(owner),
            staked_amount: read_u64(data, STAKED_AMOUNT_OFFSET),
            total_points: read_u64(data, TOTAL_POINTS_OFFSET),
            last_updated_time: read_u64(data, LAST_UPDATED_OFFSET),
            bump: data[BUMP_OFFSET],
        })
    }

    /// Encode to the exact inverse of [`StakePosition::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(POSITION_MIN_LEN);
        data.extend_from_slice(&POSITION_DISCRIMINATOR);
        data.extend_from_slice(self.owner.as_ref());
        data.extend_from_slice(&self.staked_amount.to_le_bytes());
        data.extend_from_slice(&self.total_points.to_le_bytes());
        data.extend_from_slice(&self.last_updated_time.to_le_bytes());
        data.push(self.bump);
        data
    }
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}
