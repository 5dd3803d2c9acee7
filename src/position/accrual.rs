//! Reward accrual, re-derived client-side.
//!
//! The remote program checkpoints points with the same formula during
//! stake/unstake/claim; this module recomputes the value between
//! checkpoints so the UI never shows a number the ledger would disagree
//! with. Integer arithmetic only: two calls with identical inputs must
//! return identical output.

/// Smallest units per whole token. Divisor of the accrual formula.
pub const UNIT_DIVISOR: u64 = 1_000_000_000;

/// Points owed as of `now`, given the last remote checkpoint.
///
/// Returns `total_points` unchanged when nothing is staked or when `now`
/// does not lie strictly after the checkpoint (no backdating, no negative
/// accrual). The product `staked_amount * elapsed` is computed in 128 bits;
/// division truncates toward zero, matching the remote program.
pub fn accrue(staked_amount: u64, last_updated_time: u64, total_points: u64, now: u64) -> u64 {
    if staked_amount == 0 || now <= last_updated_time {
        return total_points;
    }

    let elapsed = now - last_updated_time;
    let earned = (staked_amount as u128 * elapsed as u128) / UNIT_DIVISOR as u128;

    total_points.saturating_add(earned.min(u64::MAX as u128) as u64)
}
