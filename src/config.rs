//! Engine configuration.
//!
//! Everything comes from the environment: endpoints and tunables have
//! defaults, key material does not and is never embedded in source.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;
use std::time::Duration;

/// Default cluster RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// Deployed staking program identity.
pub const DEFAULT_PROGRAM_ID: &str = "C6ayqxTRJo8q85LeWAiQFisobjuaXwjooYVyv7Dtscpv";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cluster RPC endpoint.
    pub rpc_url: String,

    /// Staking program identity.
    pub program_id: Pubkey,

    /// Sync loop polling interval.
    pub poll_interval: Duration,

    /// Upper bound on a confirmation wait.
    pub confirm_timeout: Duration,

    /// Lamport headroom required on top of a stake amount.
    pub fee_buffer: u64,
}

impl EngineConfig {
    /// Build a configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url =
            std::env::var("STAKE_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());

        let program_id = match std::env::var("STAKE_PROGRAM_ID") {
            Ok(raw) => Pubkey::from_str(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                key: "STAKE_PROGRAM_ID",
                message: e.to_string(),
            })?,
            Err(_) => Pubkey::from_str(DEFAULT_PROGRAM_ID).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "STAKE_PROGRAM_ID",
                    message: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            rpc_url,
            program_id,
            poll_interval: Duration::from_secs(env_u64(
                "STAKE_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            confirm_timeout: Duration::from_secs(env_u64(
                "STAKE_CONFIRM_TIMEOUT_SECS",
                DEFAULT_CONFIRM_TIMEOUT_SECS,
            )?),
            fee_buffer: env_u64("STAKE_FEE_BUFFER_LAMPORTS", DEFAULT_FEE_BUFFER_LAMPORTS)?,
        })
    }
}

/// Load the wallet keypair from `STAKE_WALLET_KEY` (64-byte hex), if set.
pub fn wallet_keypair_from_env() -> Result<Option<Keypair>, ConfigError> {
    let raw = match std::env::var("STAKE_WALLET_KEY") {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };
    let bytes = hex::decode(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: "STAKE_WALLET_KEY",
        message: e.to_string(),
    })?;
    let keypair = Keypair::from_bytes(&bytes).map_err(|e| ConfigError::InvalidValue {
        key: "STAKE_WALLET_KEY",
        message: e.to_string(),
    })?;
    Ok(Some(keypair))
}

fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}
