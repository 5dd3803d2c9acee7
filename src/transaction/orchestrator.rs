//! Operation orchestrator and integration point for the four staking
//! operations.
//!
//! This module defines the `TransactionOrchestrator`, which drives every
//! user-initiated operation (initialize, stake, unstake, claim-and-payout)
//! through one state machine:
//!
//! `IDLE → BUILDING → AWAITING_SIGNATURE → SUBMITTED → CONFIRMING →
//! {CONFIRMED | FAILED}`
//!
//! The orchestrator is responsible for:
//! - Validating every operation locally before any network call
//! - Sequencing initialize-before-stake when the position does not exist
//! - Attaching a freshly fetched recency token immediately before signing
//! - Enforcing the single-in-flight rule per wallet session
//! - Running the two-leg claim (program claim, then custodial payout) and
//!   surfacing the window between them as a distinct failure
//! - Forcing a sync refresh after every confirmed operation

use crate::ledger::LedgerClient;
use crate::position::accrual::UNIT_DIVISOR;
use crate::position::reader::LiveSnapshot;
use crate::sync::RefreshHandle;
use crate::transaction::builder::StakeInstructionBuilder;
use crate::transaction::custodian::CustodialSigner;
use crate::transaction::sender::TransactionSender;
use crate::transaction::{OperationError, MIN_CLAIM_POINTS, POINTS_PER_UNIT};

use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

const DEFAULT_FEE_BUFFER: u64 = 10_000;
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Progression of the operation currently (or last) driven by the
/// orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    Building,
    AwaitingSignature,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
}

/// Result of a completed claim-and-payout.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    /// Signature of the program claim instruction.
    pub claim_signature: Signature,
    /// Signature of the custodial payout transfer.
    pub payout_signature: Signature,
    /// Points consumed by the claim, as estimated at submission time.
    pub claimed_points: u64,
    /// Lamports paid out of the custodial balance.
    pub payout_lamports: u64,
}

/// Drives the four staking operations against the ledger.
pub struct TransactionOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<Keypair>,
    builder: StakeInstructionBuilder,
    sender: TransactionSender,
    custodian: Option<CustodialSigner>,
    refresh: Option<RefreshHandle>,
    fee_buffer: u64,
    in_flight: Mutex<()>,
    phase_tx: watch::Sender<OperationPhase>,
}

impl TransactionOrchestrator {
    /// Create an orchestrator for `wallet` against `program_id`.
    pub fn new(ledger: Arc<dyn LedgerClient>, wallet: Arc<Keypair>, program_id: Pubkey) -> Self {
        let (phase_tx, _phase_rx) = watch::channel(OperationPhase::Idle);
        Self {
            sender: TransactionSender::new(ledger.clone(), DEFAULT_CONFIRM_TIMEOUT),
            ledger,
            wallet,
            builder: StakeInstructionBuilder::new(program_id),
            custodian: None,
            refresh: None,
            fee_buffer: DEFAULT_FEE_BUFFER,
            in_flight: Mutex::new(()),
            phase_tx,
        }
    }

    /// Sets the custodial payout signer
    pub fn with_custodian(mut self, custodian: CustodialSigner) -> Self {
        self.custodian = Some(custodian);
        self
    }

    /// Sets the sync refresh handle poked after each confirmation
    pub fn with_refresh_handle(mut self, refresh: RefreshHandle) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Sets the lamport headroom required on top of a stake amount
    pub fn with_fee_buffer(mut self, fee_buffer: u64) -> Self {
        self.fee_buffer = fee_buffer;
        self
    }

    /// Sets the confirmation timeout
    pub fn with_confirm_timeout(mut self, confirm_timeout: Duration) -> Self {
        self.sender = TransactionSender::new(self.ledger.clone(), confirm_timeout);
        self
    }

    /// Subscribe to phase transitions for progress display.
    pub fn phase(&self) -> watch::Receiver<OperationPhase> {
        self.phase_tx.subscribe()
    }

    /// Create the position account.
    pub async fn initialize(&self, snapshot: &LiveSnapshot) -> Result<Signature, OperationError> {
        let _slot = self.claim_slot()?;
        if snapshot.position.is_some() {
            return self.finish(Err(OperationError::Validation(
                "position is already initialized".to_string(),
            )));
        }
        let result = self.run_initialize().await;
        self.finish(result)
    }

    /// Stake `amount` smallest units, initializing the position first if
    /// it does not exist yet.
    pub async fn stake(
        &self,
        snapshot: &LiveSnapshot,
        amount: u64,
    ) -> Result<Signature, OperationError> {
        let _slot = self.claim_slot()?;
        let result = self.run_stake(snapshot, amount).await;
        self.finish(result)
    }

    /// Unstake `amount` smallest units.
    pub async fn unstake(
        &self,
        snapshot: &LiveSnapshot,
        amount: u64,
    ) -> Result<Signature, OperationError> {
        let _slot = self.claim_slot()?;
        let result = self.run_unstake(snapshot, amount).await;
        self.finish(result)
    }

    /// Claim the accrued points and pay them out from the custodial
    /// balance.
    pub async fn claim(&self, snapshot: &LiveSnapshot) -> Result<ClaimOutcome, OperationError> {
        let _slot = self.claim_slot()?;
        let result = self.run_claim(snapshot).await;
        self.finish(result)
    }

    fn claim_slot(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, OperationError> {
        self.in_flight.try_lock().map_err(|_| {
            debug!("Operation rejected: another operation is in flight");
            OperationError::OperationInFlight
        })
    }

    fn set_phase(&self, phase: OperationPhase) {
        debug!("Operation phase: {:?}", phase);
        self.phase_tx.send_replace(phase);
    }

    fn finish<T>(&self, result: Result<T, OperationError>) -> Result<T, OperationError> {
        match &result {
            Ok(_) => {
                self.set_phase(OperationPhase::Confirmed);
                if let Some(refresh) = &self.refresh {
                    refresh.request();
                }
            }
            Err(e) => {
                self.set_phase(OperationPhase::Failed);
                warn!("Operation failed: {}", e);
            }
        }
        result
    }

    async fn run_initialize(&self) -> Result<Signature, OperationError> {
        self.set_phase(OperationPhase::Building);
        let instruction = self.builder.initialize(&self.wallet.pubkey());
        self.submit_signed(&[instruction], &self.wallet).await
    }

    async fn run_stake(
        &self,
        snapshot: &LiveSnapshot,
        amount: u64,
    ) -> Result<Signature, OperationError> {
        if amount == 0 {
            return Err(OperationError::Validation(
                "stake amount must be positive".to_string(),
            ));
        }
        let required = amount.saturating_add(self.fee_buffer);
        if snapshot.wallet_balance < required {
            return Err(OperationError::Validation(format!(
                "insufficient wallet balance: {} lamports available, {} required including fee buffer",
                snapshot.wallet_balance, required
            )));
        }

        if snapshot.position.is_none() {
            // Hard sequencing dependency: the stake instruction is not
            // even built until the position exists.
            info!("Position not initialized, running initialize first");
            self.run_initialize().await?;
        }

        self.set_phase(OperationPhase::Building);
        let instruction = self.builder.stake(&self.wallet.pubkey(), amount);
        self.submit_signed(&[instruction], &self.wallet).await
    }

    async fn run_unstake(
        &self,
        snapshot: &LiveSnapshot,
        amount: u64,
    ) -> Result<Signature, OperationError> {
        if amount == 0 {
            return Err(OperationError::Validation(
                "unstake amount must be positive".to_string(),
            ));
        }
        let staked = match &snapshot.position {
            Some(position) => position.staked_amount,
            None => {
                return Err(OperationError::Validation(
                    "position is not initialized".to_string(),
                ));
            }
        };
        if amount > staked {
            return Err(OperationError::Validation(format!(
                "unstake amount {amount} exceeds staked balance {staked}"
            )));
        }

        self.set_phase(OperationPhase::Building);
        let instruction = self.builder.unstake(&self.wallet.pubkey(), amount);
        self.submit_signed(&[instruction], &self.wallet).await
    }

    async fn run_claim(&self, snapshot: &LiveSnapshot) -> Result<ClaimOutcome, OperationError> {
        if snapshot.position.is_none() {
            return Err(OperationError::Validation(
                "position is not initialized".to_string(),
            ));
        }
        let custodian = self.custodian.as_ref().ok_or_else(|| {
            OperationError::Validation("custodial payout signer is not configured".to_string())
        })?;

        // Both gates run before the claim instruction is built: a claim
        // that cannot pay out must not consume points on the ledger.
        let points = snapshot.claimable_points;
        if points < MIN_CLAIM_POINTS {
            return Err(OperationError::BelowMinimumClaim {
                points,
                minimum: MIN_CLAIM_POINTS,
            });
        }
        let payout_units = points / POINTS_PER_UNIT;
        if payout_units == 0 {
            return Err(OperationError::BelowClaimThreshold { points });
        }
        let payout_lamports = payout_units.checked_mul(UNIT_DIVISOR).ok_or_else(|| {
            OperationError::Validation(format!("payout of {payout_units} whole units overflows"))
        })?;

        self.set_phase(OperationPhase::Building);
        let claim_instruction = self.builder.claim(&self.wallet.pubkey());
        let claim_signature = self.submit_signed(&[claim_instruction], &self.wallet).await?;

        // The ledger has consumed the points. From here on, any failure
        // leaves them consumed with no payout sent; that window is
        // surfaced as its own error and never as a plain network fault.
        let payout_instruction =
            self.builder
                .payout(&custodian.pubkey(), &self.wallet.pubkey(), payout_lamports);
        let payout_signature = match self
            .submit_signed(&[payout_instruction], custodian.keypair())
            .await
        {
            Ok(signature) => signature,
            Err(e) => {
                error!(
                    "Payout failed after claim {} was confirmed: {}",
                    claim_signature, e
                );
                return Err(OperationError::PayoutAfterClaimFailed(e.to_string()));
            }
        };

        info!(
            "Claimed {} points, paid out {} lamports",
            points, payout_lamports
        );
        Ok(ClaimOutcome {
            claim_signature,
            payout_signature,
            claimed_points: points,
            payout_lamports,
        })
    }

    /// Sign with `payer` and drive one transaction through submission and
    /// confirmation.
    ///
    /// The recency token is fetched here, immediately before signing, and
    /// used exactly once.
    async fn submit_signed(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
    ) -> Result<Signature, OperationError> {
        self.set_phase(OperationPhase::AwaitingSignature);
        let blockhash = self
            .ledger
            .latest_blockhash()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        let message = Message::new(instructions, Some(&payer.pubkey()));
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(&[payer], blockhash)
            .map_err(|e| OperationError::UserRejected(e.to_string()))?;

        self.set_phase(OperationPhase::Submitted);
        let signature = self.sender.submit(&transaction).await?;

        self.set_phase(OperationPhase::Confirming);
        self.sender.confirm(&signature).await?;
        Ok(signature)
    }
}
