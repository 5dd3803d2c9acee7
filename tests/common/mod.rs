//! Shared test helpers for the staking engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use solana_stake_sync::ledger::InMemoryLedger;
use solana_stake_sync::position::reader::{LiveSnapshot, SnapshotReader};
use solana_stake_sync::transaction::{CustodialSigner, TransactionOrchestrator};

/// Ledger clock the in-memory ledger starts at.
pub const LEDGER_EPOCH: u64 = 1_700_000_000;

/// One whole token in smallest units.
pub const ONE_TOKEN: u64 = 1_000_000_000;

/// Fully wired engine against an in-memory ledger.
pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub wallet: Arc<Keypair>,
    pub custodian: Pubkey,
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub program_id: Pubkey,
}

impl Harness {
    pub fn owner(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(self.ledger.clone(), self.program_id, self.owner())
    }

    pub async fn snapshot(&self) -> LiveSnapshot {
        self.reader().read_snapshot().await
    }
}

/// Build a harness with a funded custodian configured.
pub fn harness() -> Harness {
    let program_id = Pubkey::new_unique();
    let ledger = Arc::new(InMemoryLedger::new(program_id));
    let wallet = Arc::new(Keypair::new());
    let custodian_keypair = Keypair::new();
    let custodian = custodian_keypair.pubkey();

    let orchestrator = Arc::new(
        TransactionOrchestrator::new(ledger.clone(), wallet.clone(), program_id)
            .with_custodian(CustodialSigner::from_keypair(custodian_keypair))
            .with_confirm_timeout(Duration::from_secs(2)),
    );

    Harness {
        ledger,
        wallet,
        custodian,
        orchestrator,
        program_id,
    }
}

/// Build a harness without a custodial signer.
pub fn harness_without_custodian() -> Harness {
    let program_id = Pubkey::new_unique();
    let ledger = Arc::new(InMemoryLedger::new(program_id));
    let wallet = Arc::new(Keypair::new());

    let orchestrator = Arc::new(
        TransactionOrchestrator::new(ledger.clone(), wallet.clone(), program_id)
            .with_confirm_timeout(Duration::from_secs(2)),
    );

    Harness {
        ledger,
        wallet,
        custodian: Pubkey::new_unique(),
        orchestrator,
        program_id,
    }
}
