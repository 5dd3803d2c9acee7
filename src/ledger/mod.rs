//! Remote ledger access for the staking engine.
//!
//! The ledger is a swappable capability: the engine talks to
//! [`LedgerClient`] and never to a concrete transport, so the same
//! orchestrator and sync loop run against the live JSON-RPC client or the
//! deterministic in-memory ledger used in tests.

/// Live JSON-RPC client
mod client;
/// Deterministic in-memory ledger
mod memory;
/// Shared ledger data types and errors
mod types;

pub use client::RpcLedgerClient;
pub use memory::InMemoryLedger;
pub use types::*;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

/// Capability interface to the remote ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Raw bytes of the account at `address`, or `None` if it does not
    /// exist. Absence is not an error.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    /// Balance of `address` in smallest units. Missing accounts read as
    /// zero.
    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Freshly issued recency token. Must be fetched immediately before
    /// signing; stale tokens are rejected by the remote nodes.
    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Submit a fully signed transaction. Never retried internally: a
    /// retry must go back through [`LedgerClient::latest_blockhash`].
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    /// Confirmation status of a submitted signature, or `None` while the
    /// cluster has not yet observed it.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;
}
