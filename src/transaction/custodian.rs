//! Custodial payout signer.
//!
//! The payout source is controlled by a server-held key, never the end
//! user's wallet. The key is a scoped, injected credential: loaded once
//! from a deployment secret at startup, owned by the orchestrator, and
//! released with it on teardown. It is never embedded in source.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::fmt;

const KEYPAIR_HEX_LEN: usize = 128;

/// Environment variable carrying the 64-byte hex custodian keypair.
pub const CUSTODIAN_KEY_ENV: &str = "STAKE_CUSTODIAN_KEY";

#[derive(Debug, thiserror::Error)]
pub enum CustodianKeyError {
    #[error("custodian key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("custodian key must be {KEYPAIR_HEX_LEN} hex characters, got {0}")]
    WrongLength(usize),

    #[error("custodian key bytes do not form a keypair: {0}")]
    InvalidKeypair(String),
}

/// Server-held signer authorizing payout transfers.
pub struct CustodialSigner {
    keypair: Keypair,
}

impl CustodialSigner {
    /// Load the custodian key from [`CUSTODIAN_KEY_ENV`], if set.
    pub fn from_env() -> Result<Option<Self>, CustodianKeyError> {
        match std::env::var(CUSTODIAN_KEY_ENV) {
            Ok(raw) => Ok(Some(Self::from_hex(raw.trim())?)),
            Err(_) => Ok(None),
        }
    }

    /// Parse a 64-byte keypair from its hex encoding.
    pub fn from_hex(raw: &str) -> Result<Self, CustodianKeyError> {
        if raw.len() != KEYPAIR_HEX_LEN {
            return Err(CustodianKeyError::WrongLength(raw.len()));
        }
        let bytes = hex::decode(raw)?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| CustodianKeyError::InvalidKeypair(e.to_string()))?;
        Ok(Self { keypair })
    }

    /// Wrap an already-loaded keypair. Used by tests and embedders that
    /// manage the secret themselves.
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Public identity of the custodial balance.
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub(crate) fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

// The secret must never leak through logs.
impl fmt::Debug for CustodialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodialSigner")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
