//! Client-side staking engine for a remote ledger program.
//!
//! Reads and decodes the on-ledger stake position, re-derives the same
//! time-based point accrual the program computes, orchestrates the four
//! staking operations with fresh-blockhash discipline, and reconciles
//! optimistic local state against authoritative remote state on a polling
//! cadence.

pub mod config;
pub mod ledger;
pub mod position;
pub mod sync;
pub mod transaction;
pub mod utils;
